/// 設定とその検証
pub mod config;
pub mod config_validation;

pub use config::{ConfigError, SensorConfig, EXPECTED_XVCLK_HZ};
