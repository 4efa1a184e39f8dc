/// 画質コントロール（ゲイン・露出・反転・テストパターン）
pub mod controls;
/// フォーマットとベイヤー並び
pub mod format;
/// キャプチャモードのカタログとレジスタテーブル
pub mod modes;
/// OV2710 レジスタマップ
pub mod ov2710_regs;
/// ストリーミング状態機械
pub mod sensor;
pub mod stream;

pub use controls::{ControlId, ControlSet, CoupledPolicy, Flip};
pub use format::{BayerOrder, Format, FormatWhich, FrameInterval, FrameSizeRange};
pub use modes::{ModeDescriptor, ModeId, MODES};
pub use sensor::{Ov2710, SensorState};
