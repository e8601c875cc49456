use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

/// Face, shoulder, menu and stick-click buttons of an Xbox-style pad.
///
/// The discriminant is the bit position in the report's button bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Button {
    A = 0,
    B = 1,
    X = 2,
    Y = 3,
    #[serde(rename = "LB")]
    LeftBumper = 4,
    #[serde(rename = "RB")]
    RightBumper = 5,
    Back = 6,
    Start = 7,
    #[serde(rename = "LSTICK")]
    LeftStick = 8,
    #[serde(rename = "RSTICK")]
    RightStick = 9,
}

impl Button {
    pub const ALL: [Button; 10] = [
        Button::A,
        Button::B,
        Button::X,
        Button::Y,
        Button::LeftBumper,
        Button::RightBumper,
        Button::Back,
        Button::Start,
        Button::LeftStick,
        Button::RightStick,
    ];

    pub fn bit(self) -> u16 {
        1 << (self as u16)
    }

    pub fn name(self) -> &'static str {
        match self {
            Button::A => "A",
            Button::B => "B",
            Button::X => "X",
            Button::Y => "Y",
            Button::LeftBumper => "LB",
            Button::RightBumper => "RB",
            Button::Back => "BACK",
            Button::Start => "START",
            Button::LeftStick => "LSTICK",
            Button::RightStick => "RSTICK",
        }
    }
}

impl FromStr for Button {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Button::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

/// Set of pressed buttons, stored as the wire bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ButtonSet(u16);

impl ButtonSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, button: Button) {
        self.0 |= button.bit();
    }

    pub fn remove(&mut self, button: Button) {
        self.0 &= !button.bit();
    }

    pub fn set(&mut self, button: Button, pressed: bool) {
        if pressed {
            self.insert(button)
        } else {
            self.remove(button)
        }
    }

    pub fn contains(&self, button: Button) -> bool {
        self.0 & button.bit() != 0
    }

    pub fn bits(&self) -> u16 {
        self.0
    }
}

impl FromIterator<Button> for ButtonSet {
    fn from_iter<I: IntoIterator<Item = Button>>(iter: I) -> Self {
        let mut set = ButtonSet::empty();
        for button in iter {
            set.insert(button);
        }
        set
    }
}

/// Hat switch direction. Discriminant is the value sent on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DPad {
    Up = 0,
    UpRight = 1,
    Right = 2,
    DownRight = 3,
    Down = 4,
    DownLeft = 5,
    Left = 6,
    UpLeft = 7,
    #[default]
    Neutral = 8,
}

impl DPad {
    pub const ALL: [DPad; 9] = [
        DPad::Up,
        DPad::UpRight,
        DPad::Right,
        DPad::DownRight,
        DPad::Down,
        DPad::DownLeft,
        DPad::Left,
        DPad::UpLeft,
        DPad::Neutral,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DPad::Up => "UP",
            DPad::UpRight => "UP_RIGHT",
            DPad::Right => "RIGHT",
            DPad::DownRight => "DOWN_RIGHT",
            DPad::Down => "DOWN",
            DPad::DownLeft => "DOWN_LEFT",
            DPad::Left => "LEFT",
            DPad::UpLeft => "UP_LEFT",
            DPad::Neutral => "NEUTRAL",
        }
    }
}

impl FromStr for DPad {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DPad::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown control name: {0}")]
pub struct UnknownName(pub String);

/// Analog stick position, each axis normalized to [-1, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stick {
    pub x: f32,
    pub y: f32,
}

impl Stick {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Logical controller state at one instant.
///
/// Values outside their nominal range are accepted here and clamped by the
/// report codec.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputSnapshot {
    pub buttons: ButtonSet,
    pub left_stick: Stick,
    pub right_stick: Stick,
    /// Normalized to [0, 1]
    pub left_trigger: f32,
    /// Normalized to [0, 1]
    pub right_trigger: f32,
    pub dpad: DPad,
}

impl InputSnapshot {
    pub fn with_button(mut self, button: Button) -> Self {
        self.buttons.insert(button);
        self
    }

    pub fn with_left_stick(mut self, x: f32, y: f32) -> Self {
        self.left_stick = Stick::new(x, y);
        self
    }

    pub fn with_right_stick(mut self, x: f32, y: f32) -> Self {
        self.right_stick = Stick::new(x, y);
        self
    }

    pub fn with_triggers(mut self, left: f32, right: f32) -> Self {
        self.left_trigger = left;
        self.right_trigger = right;
        self
    }

    pub fn with_dpad(mut self, dpad: DPad) -> Self {
        self.dpad = dpad;
        self
    }
}

/// Opaque identifier of a remote host as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Advertising,
    /// Link up, bonding not yet complete
    Connected,
    /// Bonded and notifying: the only state in which reports are sent
    Bonded,
    Disconnecting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Advertising => "advertising",
            SessionState::Connected => "connected",
            SessionState::Bonded => "bonded",
            SessionState::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of the peripheral session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub active: bool,
    pub state: SessionState,
    pub bonded_device_id: Option<DeviceId>,
    pub last_report_sent_at: Option<SystemTime>,
    pub reports_sent: u64,
    pub reports_dropped: u64,
}

/// Outcome of a single `send_report` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Session is not bonded; nothing was handed to the transport
    NotConnected,
    /// Transport could not take the report right now; it was discarded
    Dropped,
}

/// Reply shape of the orchestrator's start/stop calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    pub message: String,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_names_parse_case_insensitively() {
        assert_eq!("start".parse::<Button>().unwrap(), Button::Start);
        assert_eq!("LSTICK".parse::<Button>().unwrap(), Button::LeftStick);
        assert!("GUIDE".parse::<Button>().is_err());
    }

    #[test]
    fn button_set_tracks_bits() {
        let mut set: ButtonSet = [Button::A, Button::RightStick].into_iter().collect();
        assert_eq!(set.bits(), 0x0201);
        set.set(Button::A, false);
        assert!(!set.contains(Button::A));
        assert!(set.contains(Button::RightStick));
    }

    #[test]
    fn dpad_defaults_to_neutral() {
        assert_eq!(InputSnapshot::default().dpad, DPad::Neutral);
        assert_eq!("down_left".parse::<DPad>().unwrap(), DPad::DownLeft);
    }

    #[test]
    fn session_state_serializes_snake_case() {
        let json = serde_json::to_string(&SessionState::Advertising).unwrap();
        assert_eq!(json, "\"advertising\"");
    }
}
