//! OV2710 レジスタマップ

/// レジスタテーブルの (アドレス, 値) の組
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegWrite {
    pub reg: u16,
    pub value: u8,
}

impl RegWrite {
    pub const fn new(reg: u16, value: u8) -> Self {
        Self { reg, value }
    }
}

pub const REG_VALUE_8BIT: usize = 1;
pub const REG_VALUE_16BIT: usize = 2;
pub const REG_VALUE_24BIT: usize = 3;

// システム制御
pub const STREAM_CTRL: u16 = 0x3008;
pub const STREAM_CTRL_RESET: u8 = 1 << 7;
pub const STREAM_CTRL_SLEEP: u8 = 1 << 6;
/// ストリーミング中の STREAM_CTRL の値（モードテーブルはスタンバイで終わる）
pub const STREAM_CTRL_STREAMING: u8 = 0x02;
pub const STREAM_CTRL_STANDBY: u8 = STREAM_CTRL_STREAMING | STREAM_CTRL_SLEEP;

pub const CHIP_ID_HIGH: u16 = 0x300a;
pub const CHIP_ID_LOW: u16 = 0x300b;
pub const OV2710_CHIP_ID: u16 = 0x2710;

// AEC/AGC
pub const R_MANUAL: u16 = 0x3503;
pub const R_MANUAL_EXPOSURE: u8 = 1 << 0;
pub const R_MANUAL_GAIN: u8 = 1 << 1;
/// 24bit。下位4bitはライン未満の端数
pub const EXPOSURE_PK_HIGH: u16 = 0x3500;
pub const EXPOSURE_FRACTION_BITS: u32 = 4;
pub const GAIN_PK: u16 = 0x350a;

// タイミング/反転
pub const TIMING_FORMAT1: u16 = 0x3820;
pub const TIMING_FORMAT2: u16 = 0x3821;
/// FORMAT1 が垂直反転、FORMAT2 が水平反転
pub const FORMAT_FLIP_BIT: u8 = 1 << 2;

// ISP テストパターン
pub const ISP_CTRL00: u16 = 0x5080;
pub const ISP_CTRL00_TEST_ENABLE: u8 = 1 << 7;
pub const ISP_CTRL00_TEST_SELECT: u8 = 0x03;
