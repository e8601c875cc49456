//! Gamepad Input Report Codec
//!
//! Maps an [`InputSnapshot`] onto the fixed 20-byte input report declared by
//! the gamepad report descriptor.
//!
//! # Report Layout (20 bytes)
//!
//! ```text
//! [0-1]   : Button bitmask (u16 little-endian)
//!           bit 0: A        bit 5: RB
//!           bit 1: B        bit 6: BACK
//!           bit 2: X        bit 7: START
//!           bit 3: Y        bit 8: LSTICK
//!           bit 4: LB       bit 9: RSTICK
//!           bits 10-15 reserved, zero
//! [2]     : Left trigger  (0-255)
//! [3]     : Right trigger (0-255)
//! [4]     : Left stick X  (0-255, 128 = center)
//! [5]     : Left stick Y
//! [6]     : Right stick X
//! [7]     : Right stick Y
//! [8]     : D-pad (0 = up, clockwise to 7 = up-left, 8 = neutral)
//! [9-19]  : Reserved, zero
//! ```

use crate::domain::models::InputSnapshot;

/// Length of every encoded input report.
pub const REPORT_LEN: usize = 20;

/// A named byte range within the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportField {
    pub name: &'static str,
    pub offset: usize,
    pub len: usize,
}

impl ReportField {
    const fn new(name: &'static str, offset: usize, len: usize) -> Self {
        Self { name, offset, len }
    }

    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Byte layout produced by [`encode`], in report order.
pub const REPORT_LAYOUT: [ReportField; 5] = [
    ReportField::new("buttons", 0, 2),
    ReportField::new("triggers", 2, 2),
    ReportField::new("sticks", 4, 4),
    ReportField::new("dpad", 8, 1),
    ReportField::new("reserved", 9, 11),
];

/// An encoded input report, ready to be pushed as a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HidReport([u8; REPORT_LEN]);

impl HidReport {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> [u8; REPORT_LEN] {
        self.0
    }
}

/// Encode a snapshot. Total: out-of-range and NaN inputs are clamped.
pub fn encode(snapshot: &InputSnapshot) -> HidReport {
    let mut report = [0u8; REPORT_LEN];

    report[0..2].copy_from_slice(&snapshot.buttons.bits().to_le_bytes());

    report[2] = quantize_trigger(snapshot.left_trigger);
    report[3] = quantize_trigger(snapshot.right_trigger);

    report[4] = quantize_axis(snapshot.left_stick.x);
    report[5] = quantize_axis(snapshot.left_stick.y);
    report[6] = quantize_axis(snapshot.right_stick.x);
    report[7] = quantize_axis(snapshot.right_stick.y);

    report[8] = snapshot.dpad as u8;

    HidReport(report)
}

/// `round((clamp(v, -1, 1) + 1) * 127.5)`, rounding half away from zero.
/// NaN encodes as center.
pub fn quantize_axis(value: f32) -> u8 {
    let value = if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    };
    ((value + 1.0) * 127.5).round().clamp(0.0, 255.0) as u8
}

/// `round(clamp(v, 0, 1) * 255)`, rounding half away from zero.
/// NaN encodes as released.
pub fn quantize_trigger(value: f32) -> u8 {
    let value = if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    };
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}
