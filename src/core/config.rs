use crate::core::config_validation::{
    parse_bus_max_retries, parse_i2c_address, parse_initial_size, ValidationError,
};

/// OV2710 が要求する入力クロック周波数（Hz）
pub const EXPECTED_XVCLK_HZ: u32 = 24_000_000;

/// センサー設定
///
/// この構造体はビルド時に`cfg.toml`ファイルの `[ov2710-sensor]` セクションから
/// 読み込まれた設定を保持します。
#[toml_cfg::toml_config]
pub struct Config {
    #[default(24_000_000)]
    xvclk_hz: u32,

    #[default(0x36)] // SID ピン Low 時のアドレス
    i2c_address: u8,

    #[default(0)] // 失敗時のみ再送。0 で即座にエラー
    bus_max_retries: u8,

    #[default(1920)]
    initial_width: u32,

    #[default(1080)]
    initial_height: u32,
}

/// 設定エラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("無効なI2Cアドレス: 0x{0:02x}")]
    InvalidI2cAddress(u8),
    #[error("bus_max_retries の値が無効です (0-5): {0}")]
    InvalidBusRetries(u8),
    #[error("初期解像度が無効です: {width}x{height}")]
    InvalidInitialSize { width: u32, height: u32 },
}

/// 実行時のセンサー設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorConfig {
    /// 入力クロック（xvclk）周波数（Hz）
    pub xvclk_hz: u32,

    /// センサーの7bit I2Cアドレス
    pub i2c_address: u8,

    /// 転送失敗時の再送回数
    pub bus_max_retries: u8,

    /// アタッチ直後にネゴシエートする解像度
    pub initial_width: u32,
    pub initial_height: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig {
            xvclk_hz: EXPECTED_XVCLK_HZ,
            i2c_address: 0x36,
            bus_max_retries: 0,
            initial_width: 1920,
            initial_height: 1080,
        }
    }
}

impl SensorConfig {
    /// 設定ファイルから設定をロードします
    pub fn load() -> Result<Self, ConfigError> {
        // toml_cfg によって生成された定数
        let config = CONFIG;

        let i2c_address = parse_i2c_address(config.i2c_address).map_err(map_validation_error)?;
        let bus_max_retries =
            parse_bus_max_retries(config.bus_max_retries).map_err(map_validation_error)?;
        let (initial_width, initial_height) =
            parse_initial_size(config.initial_width, config.initial_height)
                .map_err(map_validation_error)?;

        Ok(SensorConfig {
            // クロック周波数の照合はアタッチ時に行う
            xvclk_hz: config.xvclk_hz,
            i2c_address,
            bus_max_retries,
            initial_width,
            initial_height,
        })
    }

    pub fn with_xvclk_hz(mut self, hz: u32) -> Self {
        self.xvclk_hz = hz;
        self
    }

    pub fn with_bus_max_retries(mut self, retries: u8) -> Self {
        self.bus_max_retries = retries;
        self
    }

    pub fn with_initial_size(mut self, width: u32, height: u32) -> Self {
        self.initial_width = width;
        self.initial_height = height;
        self
    }
}

fn map_validation_error(err: ValidationError) -> ConfigError {
    match err {
        ValidationError::InvalidI2cAddress(v) => ConfigError::InvalidI2cAddress(v),
        ValidationError::TooManyRetries(v) => ConfigError::InvalidBusRetries(v),
        ValidationError::ZeroDimension { width, height } => {
            ConfigError::InvalidInitialSize { width, height }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_build_time_defaults() {
        // cfg.toml が無い場合は toml_cfg のデフォルト値がそのまま使われる
        let loaded = SensorConfig::load();
        assert!(loaded.is_ok());
        assert_eq!(SensorConfig::default().xvclk_hz, EXPECTED_XVCLK_HZ);
    }

    #[test]
    fn test_builder_overrides() {
        let config = SensorConfig::default()
            .with_xvclk_hz(19_200_000)
            .with_bus_max_retries(2)
            .with_initial_size(1280, 720);
        assert_eq!(config.xvclk_hz, 19_200_000);
        assert_eq!(config.bus_max_retries, 2);
        assert_eq!((config.initial_width, config.initial_height), (1280, 720));
    }

    #[test]
    fn test_validation_error_mapping() {
        let err = map_validation_error(ValidationError::TooManyRetries(9));
        assert!(matches!(err, ConfigError::InvalidBusRetries(9)));
    }
}
