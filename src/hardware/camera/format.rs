use super::modes::{ModeDescriptor, FRAME_RATE};

/// 10bit Bayer の画素並び
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BayerOrder {
    Bggr,
    Grbg,
    Gbrg,
    Rggb,
}

/// `(vflip << 1) | hflip` で引く並び順
const HV_FLIP_BAYER_ORDER: [BayerOrder; 4] = [
    BayerOrder::Bggr,
    BayerOrder::Grbg,
    BayerOrder::Gbrg,
    BayerOrder::Rggb,
];

impl BayerOrder {
    pub fn from_flips(vflip: bool, hflip: bool) -> Self {
        let index = (usize::from(vflip) << 1) | usize::from(hflip);
        HV_FLIP_BAYER_ORDER[index]
    }

    /// メディアバスのフォーマットコード（MEDIA_BUS_FMT_S*10_1X10）
    pub fn media_bus_code(self) -> u32 {
        match self {
            BayerOrder::Bggr => 0x3007,
            BayerOrder::Grbg => 0x300a,
            BayerOrder::Gbrg => 0x300e,
            BayerOrder::Rggb => 0x300f,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colorspace {
    Srgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOrder {
    /// プログレッシブ
    None,
}

/// ネゴシエート済みのフォーマット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    pub code: BayerOrder,
    pub width: u32,
    pub height: u32,
    pub colorspace: Colorspace,
    pub field: FieldOrder,
}

impl Format {
    pub fn for_mode(mode: &ModeDescriptor, code: BayerOrder) -> Self {
        Self {
            code,
            width: mode.width,
            height: mode.height,
            colorspace: Colorspace::Srgb,
            field: FieldOrder::None,
        }
    }
}

/// フォーマット設定の対象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatWhich {
    /// 解決結果だけを返し、デバイス状態は変えない
    Try,
    /// デバイスのフォーマットとして採用する
    Active,
}

/// フレーム間隔（秒 = numerator / denominator）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInterval {
    pub numerator: u32,
    pub denominator: u32,
}

impl Default for FrameInterval {
    fn default() -> Self {
        Self {
            numerator: 1,
            denominator: FRAME_RATE,
        }
    }
}

/// 列挙用のフレームサイズ範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSizeRange {
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
}
