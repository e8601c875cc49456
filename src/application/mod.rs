//! Process-level wiring around the peripheral session.

pub mod controller_mode;
pub mod report_pump;

pub use controller_mode::ControllerMode;
pub use report_pump::pump_reports;
