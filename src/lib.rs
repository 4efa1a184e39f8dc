//! OV2710 イメージセンサー制御コア
//!
//! 電源シーケンス、キャプチャモード/フォーマットのネゴシエーション、
//! 画質コントロール（ゲイン・露出・反転・テストパターン）、
//! ストリーミング状態機械をレジスタバス越しに駆動します。

pub mod core;
pub mod error;
pub mod hardware;
pub mod power;

// テストとホスト上のブリングアップで使用するモック実装
pub mod mock;

pub use crate::core::{ConfigError, SensorConfig};
pub use error::{ErrorKind, SensorError, SensorResult};
pub use hardware::camera::{
    BayerOrder, ControlId, CoupledPolicy, Format, FormatWhich, ModeDescriptor, ModeId, Ov2710,
    SensorState,
};
pub use hardware::{I2cRegisterBus, RegisterAccess, RegisterBus, Registers, Transfer};
pub use power::{GpioPowerControl, PowerControl, PowerSequencer, Sequencer, StdDelay};
