//! 画質コントロール（ゲイン・露出・反転・テストパターン）
//!
//! ここではレジスタへの書き込みだけを扱います。
//! ロックとストリーミング/電源状態の確認はセンサー側で行います。

use log::debug;

use super::format::BayerOrder;
use super::ov2710_regs::{
    EXPOSURE_FRACTION_BITS, EXPOSURE_PK_HIGH, FORMAT_FLIP_BIT, GAIN_PK, ISP_CTRL00,
    ISP_CTRL00_TEST_ENABLE, ISP_CTRL00_TEST_SELECT, REG_VALUE_16BIT, REG_VALUE_24BIT, R_MANUAL,
    R_MANUAL_EXPOSURE, R_MANUAL_GAIN, TIMING_FORMAT1, TIMING_FORMAT2,
};
use crate::error::{SensorError, SensorResult};
use crate::hardware::registers::RegisterAccess;

pub const GAIN_MAX: u16 = 2047;
pub const EXPOSURE_MAX: u32 = 32767;

pub const TEST_PATTERN_MENU: [&str; 5] = [
    "Disabled",
    "Color Bars",
    "Random Data",
    "Square",
    "Black Image",
];

/// コントロール識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlId {
    AutoGain,
    Gain,
    AutoExposure,
    Exposure,
    HFlip,
    VFlip,
    TestPattern,
}

impl ControlId {
    pub const ALL: [ControlId; 7] = [
        ControlId::AutoGain,
        ControlId::Gain,
        ControlId::AutoExposure,
        ControlId::Exposure,
        ControlId::HFlip,
        ControlId::VFlip,
        ControlId::TestPattern,
    ];

    pub fn from_index(index: u32) -> SensorResult<Self> {
        Self::ALL
            .get(index as usize)
            .copied()
            .ok_or_else(|| SensorError::InvalidArgument(format!("unknown control {}", index)))
    }
}

/// 自動/手動が対になったコントロールの状態
///
/// 手動レジスタへの書き込みは `Manual { fresh: true, .. }` のときだけ起こる。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoupledPolicy<T> {
    /// 自動制御中。手動値は次に手動へ戻るまで保持するだけ
    Auto { stashed: T },
    /// 手動制御中。`fresh` は未適用の値が呼び出し側から渡されたことを示す
    Manual { value: T, fresh: bool },
}

impl<T: Copy> CoupledPolicy<T> {
    pub fn is_auto(&self) -> bool {
        matches!(self, CoupledPolicy::Auto { .. })
    }

    pub fn value(&self) -> T {
        match *self {
            CoupledPolicy::Auto { stashed } => stashed,
            CoupledPolicy::Manual { value, .. } => value,
        }
    }

    pub fn set_auto(&mut self, auto: bool) {
        *self = match (*self, auto) {
            (CoupledPolicy::Manual { value, .. }, true) => CoupledPolicy::Auto { stashed: value },
            (CoupledPolicy::Auto { stashed }, false) => CoupledPolicy::Manual {
                value: stashed,
                fresh: false,
            },
            (current, _) => current,
        };
    }

    pub fn set_value(&mut self, new_value: T) {
        match self {
            CoupledPolicy::Auto { stashed } => *stashed = new_value,
            CoupledPolicy::Manual { value, fresh } => {
                *value = new_value;
                *fresh = true;
            }
        }
    }

    /// 手動レジスタへ書くべき値
    pub fn pending_value(&self) -> Option<T> {
        match *self {
            CoupledPolicy::Manual { value, fresh: true } => Some(value),
            _ => None,
        }
    }

    pub fn mark_applied(&mut self) {
        if let CoupledPolicy::Manual { fresh, .. } = self {
            *fresh = false;
        }
    }

    pub fn mark_fresh(&mut self) {
        if let CoupledPolicy::Manual { fresh, .. } = self {
            *fresh = true;
        }
    }

    /// ハードウェアから読んだ値でキャッシュを更新する（未適用の値は上書きしない）
    pub fn observe(&mut self, hw_value: T) {
        match self {
            CoupledPolicy::Auto { stashed } => *stashed = hw_value,
            CoupledPolicy::Manual {
                value,
                fresh: false,
            } => *value = hw_value,
            CoupledPolicy::Manual { fresh: true, .. } => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flip {
    Horizontal,
    Vertical,
}

impl Flip {
    fn register(self) -> u16 {
        match self {
            Flip::Vertical => TIMING_FORMAT1,
            Flip::Horizontal => TIMING_FORMAT2,
        }
    }
}

/// 全コントロールのキャッシュ値
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlSet {
    pub gain: CoupledPolicy<u16>,
    pub exposure: CoupledPolicy<u32>,
    pub hflip: bool,
    pub vflip: bool,
    pub test_pattern: u8,
}

impl Default for ControlSet {
    fn default() -> Self {
        Self {
            gain: CoupledPolicy::Auto { stashed: 0 },
            exposure: CoupledPolicy::Auto { stashed: 0 },
            hflip: false,
            vflip: false,
            test_pattern: 0,
        }
    }
}

pub fn check_gain(value: i64) -> SensorResult<u16> {
    u16::try_from(value)
        .ok()
        .filter(|v| *v <= GAIN_MAX)
        .ok_or_else(|| SensorError::InvalidArgument(format!("gain {} out of 0..={}", value, GAIN_MAX)))
}

pub fn check_exposure(value: i64) -> SensorResult<u32> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v <= EXPOSURE_MAX)
        .ok_or_else(|| {
            SensorError::InvalidArgument(format!("exposure {} out of 0..={}", value, EXPOSURE_MAX))
        })
}

pub fn check_test_pattern(value: i64) -> SensorResult<u8> {
    u8::try_from(value)
        .ok()
        .filter(|v| usize::from(*v) < TEST_PATTERN_MENU.len())
        .ok_or_else(|| SensorError::InvalidArgument(format!("test pattern {} not in menu", value)))
}

impl ControlSet {
    pub fn flip(&self, which: Flip) -> bool {
        match which {
            Flip::Horizontal => self.hflip,
            Flip::Vertical => self.vflip,
        }
    }

    pub fn set_flip(&mut self, which: Flip, enable: bool) {
        match which {
            Flip::Horizontal => self.hflip = enable,
            Flip::Vertical => self.vflip = enable,
        }
    }

    /// キャッシュ上の反転状態から決まる並び順
    pub fn cached_bayer_order(&self) -> BayerOrder {
        BayerOrder::from_flips(self.vflip, self.hflip)
    }

    /// 手動ゲインビットを `auto` に合わせ、手動かつ未適用の値があれば書き込む
    pub fn program_gain<R: RegisterAccess>(&mut self, regs: &mut R, auto: bool) -> SensorResult<()> {
        regs.modify_reg(R_MANUAL, R_MANUAL_GAIN, if auto { 0 } else { R_MANUAL_GAIN })?;
        if auto {
            return Ok(());
        }

        if let Some(gain) = self.gain.pending_value() {
            debug!("gain <- {}", gain);
            regs.write_reg(GAIN_PK, REG_VALUE_16BIT, u32::from(gain))?;
            self.gain.mark_applied();
        }
        Ok(())
    }

    pub fn program_exposure<R: RegisterAccess>(
        &mut self,
        regs: &mut R,
        auto: bool,
    ) -> SensorResult<()> {
        regs.modify_reg(
            R_MANUAL,
            R_MANUAL_EXPOSURE,
            if auto { 0 } else { R_MANUAL_EXPOSURE },
        )?;
        if auto {
            return Ok(());
        }

        if let Some(exposure) = self.exposure.pending_value() {
            debug!("exposure <- {}", exposure);
            regs.write_reg(
                EXPOSURE_PK_HIGH,
                REG_VALUE_24BIT,
                exposure << EXPOSURE_FRACTION_BITS,
            )?;
            self.exposure.mark_applied();
        }
        Ok(())
    }

    pub fn read_gain<R: RegisterAccess>(regs: &mut R) -> SensorResult<u16> {
        Ok(regs.read_reg(GAIN_PK, REG_VALUE_16BIT)? as u16)
    }

    pub fn read_exposure<R: RegisterAccess>(regs: &mut R) -> SensorResult<u32> {
        Ok(regs.read_reg(EXPOSURE_PK_HIGH, REG_VALUE_24BIT)? >> EXPOSURE_FRACTION_BITS)
    }

    /// 反転ビットを書き換え、ハードウェアから並び順を読み直す
    pub fn program_flip<R: RegisterAccess>(
        regs: &mut R,
        which: Flip,
        enable: bool,
    ) -> SensorResult<BayerOrder> {
        regs.modify_reg(
            which.register(),
            FORMAT_FLIP_BIT,
            if enable { FORMAT_FLIP_BIT } else { 0 },
        )?;
        Self::read_bayer_order(regs)
    }

    pub fn read_bayer_order<R: RegisterAccess>(regs: &mut R) -> SensorResult<BayerOrder> {
        let format1 = regs.read_reg8(TIMING_FORMAT1)?;
        let format2 = regs.read_reg8(TIMING_FORMAT2)?;
        let vflip = format1 & FORMAT_FLIP_BIT != 0;
        let hflip = format2 & FORMAT_FLIP_BIT != 0;
        Ok(BayerOrder::from_flips(vflip, hflip))
    }

    pub fn program_test_pattern<R: RegisterAccess>(regs: &mut R, index: u8) -> SensorResult<()> {
        if index == 0 {
            return regs.modify_reg(ISP_CTRL00, ISP_CTRL00_TEST_ENABLE, 0);
        }

        regs.modify_reg(ISP_CTRL00, ISP_CTRL00_TEST_SELECT, index - 1)?;
        regs.modify_reg(ISP_CTRL00, ISP_CTRL00_TEST_ENABLE, ISP_CTRL00_TEST_ENABLE)
    }

    /// 反転ビットをキャッシュ値で書き直す（モードテーブルは反転ビットを初期化する）
    pub fn restore_orientation<R: RegisterAccess>(&self, regs: &mut R) -> SensorResult<BayerOrder> {
        Self::program_flip(regs, Flip::Vertical, self.vflip)?;
        Self::program_flip(regs, Flip::Horizontal, self.hflip)
    }

    /// 全コントロールを未適用扱いにしてハードウェアへ反映する
    pub fn setup<R: RegisterAccess>(&mut self, regs: &mut R) -> SensorResult<BayerOrder> {
        let order = self.restore_orientation(regs)?;
        Self::program_test_pattern(regs, self.test_pattern)?;

        self.exposure.mark_fresh();
        let auto_exposure = self.exposure.is_auto();
        self.program_exposure(regs, auto_exposure)?;

        self.gain.mark_fresh();
        let auto_gain = self.gain.is_auto();
        self.program_gain(regs, auto_gain)?;

        Ok(order)
    }
}
