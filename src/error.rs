/// センサー制御コアの結果型
pub type SensorResult<T> = Result<T, SensorError>;

/// エラーの分類
///
/// ホストフレームワークはこの分類だけを見てエラーコードに変換します。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// レジスタバスの転送失敗
    Transport,
    /// 不正な引数（幅、コントロールID、値の範囲）
    InvalidArgument,
    /// ストリーミング中のため変更不可
    Busy,
    /// 電源レール/クロックの取得・有効化に失敗
    ResourceUnavailable,
    /// 入力クロック周波数が期待値と異なる
    ConfigMismatch,
    /// チップIDが OV2710 ではない
    ChipIdMismatch,
}

/// センサー制御コアのエラー
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("register bus transfer failed: reg=0x{reg:04x}: {reason}")]
    Transport { reg: u16, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("device busy: {0}")]
    Busy(&'static str),

    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("wrong xvclk frequency {actual} Hz, expected: {expected} Hz")]
    ConfigMismatch { actual: u32, expected: u32 },

    #[error("unexpected chip id 0x{actual:04x}, expected: 0x{expected:04x}")]
    ChipIdMismatch { actual: u16, expected: u16 },

    /// モードテーブル適用中の書き込み失敗（位置情報付き）
    #[error("{mode}: table write #{index} (reg=0x{reg:04x}) failed")]
    TableWrite {
        mode: &'static str,
        index: usize,
        reg: u16,
        #[source]
        source: Box<SensorError>,
    },
}

impl SensorError {
    /// エラーの分類を返す
    ///
    /// `TableWrite` は内側のエラーの分類を引き継ぎます。
    pub fn kind(&self) -> ErrorKind {
        match self {
            SensorError::Transport { .. } => ErrorKind::Transport,
            SensorError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SensorError::Busy(_) => ErrorKind::Busy,
            SensorError::ResourceUnavailable(_) => ErrorKind::ResourceUnavailable,
            SensorError::ConfigMismatch { .. } => ErrorKind::ConfigMismatch,
            SensorError::ChipIdMismatch { .. } => ErrorKind::ChipIdMismatch,
            SensorError::TableWrite { source, .. } => source.kind(),
        }
    }

    pub(crate) fn transport(reg: u16, err: impl std::fmt::Debug) -> Self {
        SensorError::Transport {
            reg,
            reason: format!("{:?}", err),
        }
    }
}
