pub mod env_config;
pub mod kiosk_config;

pub use env_config::Config;
pub use kiosk_config::{KioskConfiguration, ShiftWindow};
