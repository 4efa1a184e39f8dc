//! キャプチャモードのカタログとレジスタテーブル

use log::{debug, error};

use super::ov2710_regs::{RegWrite, REG_VALUE_8BIT};
use crate::error::{SensorError, SensorResult};
use crate::hardware::registers::RegisterAccess;

/// 全モードの最大解像度
pub const WIDTH_MAX: u32 = 1920;
pub const HEIGHT_MAX: u32 = 1080;
/// 全モード共通のフレームレート
pub const FRAME_RATE: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeId {
    Mode720p1280x720,
    ModeHd1920x1080,
}

impl ModeId {
    pub fn descriptor(self) -> &'static ModeDescriptor {
        match self {
            ModeId::Mode720p1280x720 => &MODES[0],
            ModeId::ModeHd1920x1080 => &MODES[1],
        }
    }

    pub fn from_index(index: usize) -> Option<ModeId> {
        MODES.get(index).map(|mode| mode.id)
    }
}

/// キャプチャモードの定義（不変）
#[derive(Debug, PartialEq, Eq)]
pub struct ModeDescriptor {
    pub name: &'static str,
    pub id: ModeId,
    pub width: u32,
    pub height: u32,
    pub regs: &'static [RegWrite],
}

/// 宣言順のモード一覧。`find_nearest` の同点は先頭側を選ぶ
pub static MODES: [ModeDescriptor; 2] = [
    ModeDescriptor {
        name: "mode_720p_1280_720",
        id: ModeId::Mode720p1280x720,
        width: 1280,
        height: 720,
        regs: &SETTING_60FPS_720P_1280_720,
    },
    ModeDescriptor {
        name: "mode_hd_1920_1080",
        id: ModeId::ModeHd1920x1080,
        width: 1920,
        height: 1080,
        regs: &SETTING_30FPS_HD_1920_1080,
    },
];

/// 電源投入後にベースのレジスタ状態を復元するモード
pub const INIT_MODE: ModeId = ModeId::ModeHd1920x1080;

/// `|w - mw| + |h - mh|` が最小のモードを返す
pub fn find_nearest(width: u32, height: u32) -> &'static ModeDescriptor {
    let mut best = &MODES[0];
    let mut best_dist = u32::MAX;

    for mode in MODES.iter() {
        let dist = mode.width.abs_diff(width) + mode.height.abs_diff(height);
        if dist == 0 {
            return mode;
        }
        if dist < best_dist {
            best_dist = dist;
            best = mode;
        }
    }

    best
}

/// モードのレジスタテーブルを順に書き込む
///
/// 最初に失敗した書き込みで中断する。それまでの書き込みは戻さない。
pub fn apply<R: RegisterAccess>(regs: &mut R, mode: &ModeDescriptor) -> SensorResult<()> {
    debug!("loading {} ({} registers)", mode.name, mode.regs.len());

    for (index, entry) in mode.regs.iter().enumerate() {
        regs.write_reg(entry.reg, REG_VALUE_8BIT, u32::from(entry.value))
            .map_err(|source| {
                error!(
                    "{}: write #{} reg=0x{:04x} failed: {}",
                    mode.name, index, entry.reg, source
                );
                SensorError::TableWrite {
                    mode: mode.name,
                    index,
                    reg: entry.reg,
                    source: Box::new(source),
                }
            })?;
    }

    Ok(())
}

const fn rw(reg: u16, value: u8) -> RegWrite {
    RegWrite::new(reg, value)
}

// テーブルはスタンバイ (0x3008 = 0x42) のまま終わる。ストリーム開始は stream_enable で行う
static SETTING_60FPS_720P_1280_720: [RegWrite; 116] = [
    rw(0x3103, 0x93), rw(0x3008, 0x82), rw(0x3008, 0x42), rw(0x3017, 0x7f),
    rw(0x3018, 0xfc), rw(0x3706, 0x61), rw(0x3712, 0x0c), rw(0x3630, 0x6d),
    rw(0x3801, 0xb4), rw(0x3621, 0x04), rw(0x3604, 0x60), rw(0x3603, 0xa7),
    rw(0x3631, 0x26), rw(0x3600, 0x04), rw(0x3620, 0x37), rw(0x3623, 0x00),
    rw(0x3702, 0x9e), rw(0x3703, 0x5c), rw(0x3704, 0x40), rw(0x370d, 0x0f),
    rw(0x3713, 0x9f), rw(0x3714, 0x4c), rw(0x3710, 0x9e), rw(0x3801, 0xc4),
    rw(0x3605, 0x05), rw(0x3606, 0x3f), rw(0x302d, 0x90), rw(0x370b, 0x40),
    rw(0x3716, 0x31), rw(0x3707, 0x52), rw(0x380d, 0x74), rw(0x5181, 0x20),
    rw(0x518f, 0x00), rw(0x4301, 0xff), rw(0x4303, 0x00), rw(0x3a00, 0x78),
    rw(0x300f, 0x88), rw(0x3011, 0x28), rw(0x3a1a, 0x06), rw(0x3a18, 0x00),
    rw(0x3a19, 0x7a), rw(0x3a13, 0x54), rw(0x382e, 0x0f), rw(0x381a, 0x1a),
    rw(0x401d, 0x02), rw(0x381c, 0x10), rw(0x381d, 0xb0), rw(0x381e, 0x02),
    rw(0x381f, 0xec), rw(0x3800, 0x01), rw(0x3820, 0x0a), rw(0x3821, 0x2a),
    rw(0x3804, 0x05), rw(0x3805, 0x10), rw(0x3802, 0x00), rw(0x3803, 0x04),
    rw(0x3806, 0x02), rw(0x3807, 0xe0), rw(0x3808, 0x05), rw(0x3809, 0x10),
    rw(0x380a, 0x02), rw(0x380b, 0xe0), rw(0x380e, 0x02), rw(0x380f, 0xf0),
    rw(0x380c, 0x07), rw(0x380d, 0x00), rw(0x3810, 0x10), rw(0x3811, 0x06),
    rw(0x5688, 0x03), rw(0x5684, 0x05), rw(0x5685, 0x00), rw(0x5686, 0x02),
    rw(0x5687, 0xd0), rw(0x3a08, 0x1b), rw(0x3a09, 0xe6), rw(0x3a0a, 0x17),
    rw(0x3a0b, 0x40), rw(0x3a0e, 0x01), rw(0x3a0d, 0x02), rw(0x3011, 0x0a),
    rw(0x300f, 0x8a), rw(0x3017, 0x00), rw(0x3018, 0x00), rw(0x4800, 0x24),
    rw(0x300e, 0x04), rw(0x4801, 0x0f), rw(0x300f, 0xc3), rw(0x3a0f, 0x40),
    rw(0x3a10, 0x38), rw(0x3a1b, 0x48), rw(0x3a1e, 0x30), rw(0x3a11, 0x90),
    rw(0x3a1f, 0x10), rw(0x3010, 0x10), rw(0x3a0e, 0x02), rw(0x3a0d, 0x03),
    rw(0x3a08, 0x0d), rw(0x3a09, 0xf3), rw(0x3a0a, 0x0b), rw(0x3a0b, 0xa0),
    rw(0x300f, 0xc3), rw(0x3011, 0x0e), rw(0x3012, 0x02), rw(0x380c, 0x07),
    rw(0x380d, 0x6a), rw(0x3703, 0x5c), rw(0x3704, 0x40), rw(0x3801, 0xbc),
    rw(0x3503, 0x17), rw(0x3500, 0x00), rw(0x3501, 0x00), rw(0x3502, 0x00),
    rw(0x350a, 0x00), rw(0x350b, 0x00), rw(0x5001, 0x4e), rw(0x5000, 0x5f),
];

static SETTING_30FPS_HD_1920_1080: [RegWrite; 113] = [
    rw(0x3103, 0x93), rw(0x3008, 0x82), rw(0x3008, 0x42), rw(0x3017, 0x7f),
    rw(0x3018, 0xfc), rw(0x3706, 0x61), rw(0x3712, 0x0c), rw(0x3630, 0x6d),
    rw(0x3801, 0xb4), rw(0x3621, 0x04), rw(0x3604, 0x60), rw(0x3603, 0xa7),
    rw(0x3631, 0x26), rw(0x3600, 0x04), rw(0x3620, 0x37), rw(0x3623, 0x00),
    rw(0x3702, 0x9e), rw(0x3703, 0x5c), rw(0x3704, 0x40), rw(0x370d, 0x0f),
    rw(0x3713, 0x9f), rw(0x3714, 0x4c), rw(0x3710, 0x9e), rw(0x3801, 0xc4),
    rw(0x3605, 0x05), rw(0x3606, 0x3f), rw(0x302d, 0x90), rw(0x370b, 0x40),
    rw(0x3716, 0x31), rw(0x3707, 0x52), rw(0x380d, 0x74), rw(0x5181, 0x20),
    rw(0x518f, 0x00), rw(0x4301, 0xff), rw(0x4303, 0x00), rw(0x3a00, 0x78),
    rw(0x300f, 0x88), rw(0x3011, 0x28), rw(0x3a1a, 0x06), rw(0x3a18, 0x00),
    rw(0x3a19, 0x7a), rw(0x3a13, 0x54), rw(0x382e, 0x0f), rw(0x381a, 0x1a),
    rw(0x401d, 0x02), rw(0x381c, 0x00), rw(0x381d, 0x02), rw(0x381e, 0x04),
    rw(0x381f, 0x38), rw(0x3820, 0x00), rw(0x3821, 0x98), rw(0x3800, 0x01),
    rw(0x3802, 0x00), rw(0x3803, 0x0a), rw(0x3804, 0x07), rw(0x3805, 0x90),
    rw(0x3806, 0x04), rw(0x3807, 0x40), rw(0x3808, 0x07), rw(0x3809, 0x90),
    rw(0x380a, 0x04), rw(0x380b, 0x40), rw(0x380e, 0x04), rw(0x380f, 0x50),
    rw(0x380c, 0x09), rw(0x380d, 0x74), rw(0x3810, 0x08), rw(0x3811, 0x02),
    rw(0x5688, 0x03), rw(0x5684, 0x07), rw(0x5685, 0xa0), rw(0x5686, 0x04),
    rw(0x5687, 0x43), rw(0x3011, 0x0a), rw(0x300f, 0x8a), rw(0x3017, 0x00),
    rw(0x3018, 0x00), rw(0x4800, 0x24), rw(0x300e, 0x04), rw(0x4801, 0x0f),
    rw(0x300f, 0xc3), rw(0x3010, 0x00), rw(0x3011, 0x0a), rw(0x3012, 0x01),
    rw(0x3a0f, 0x40), rw(0x3a10, 0x38), rw(0x3a1b, 0x48), rw(0x3a1e, 0x30),
    rw(0x3a11, 0x90), rw(0x3a1f, 0x10), rw(0x3a0e, 0x03), rw(0x3a0d, 0x04),
    rw(0x3a08, 0x14), rw(0x3a09, 0xc0), rw(0x3a0a, 0x11), rw(0x3a0b, 0x40),
    rw(0x300f, 0xc3), rw(0x3010, 0x00), rw(0x3011, 0x0e), rw(0x3012, 0x02),
    rw(0x380c, 0x09), rw(0x380d, 0xec), rw(0x3703, 0x61), rw(0x3704, 0x44),
    rw(0x3801, 0xd2), rw(0x3503, 0x17), rw(0x3500, 0x00), rw(0x3501, 0x00),
    rw(0x3502, 0x00), rw(0x350a, 0x00), rw(0x350b, 0x00), rw(0x5001, 0x4e),
    rw(0x5000, 0x5f),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hardware::registers::Registers;
    use crate::hardware::camera::ov2710_regs::{
        STREAM_CTRL, STREAM_CTRL_STANDBY, STREAM_CTRL_STREAMING,
    };
    use crate::mock::MockRegisterBus;

    #[test]
    fn test_exact_match_selects_itself() {
        for mode in MODES.iter() {
            assert_eq!(find_nearest(mode.width, mode.height), mode);
        }
    }

    #[test]
    fn test_nearest_size() {
        assert_eq!(find_nearest(1280, 720).id, ModeId::Mode720p1280x720);
        assert_eq!(find_nearest(1920, 1080).id, ModeId::ModeHd1920x1080);
        assert_eq!(find_nearest(640, 480).id, ModeId::Mode720p1280x720);
        assert_eq!(find_nearest(800, 600).id, ModeId::Mode720p1280x720);
        assert_eq!(find_nearest(4096, 2160).id, ModeId::ModeHd1920x1080);
    }

    #[test]
    fn test_tie_breaks_to_first_entry() {
        // 720p と 1080p の中点: 距離は両方 500
        assert_eq!(find_nearest(1600, 900).id, ModeId::Mode720p1280x720);
    }

    #[test]
    fn test_descriptor_lookup() {
        assert_eq!(ModeId::Mode720p1280x720.descriptor().width, 1280);
        assert_eq!(ModeId::ModeHd1920x1080.descriptor().height, 1080);
        assert_eq!(ModeId::from_index(1), Some(ModeId::ModeHd1920x1080));
        assert_eq!(ModeId::from_index(2), None);
        assert_eq!(INIT_MODE.descriptor().name, "mode_hd_1920_1080");
    }

    #[test]
    fn test_apply_writes_table_in_order() {
        let bus = MockRegisterBus::new();
        let mut regs = Registers::new(bus.clone());
        let mode = ModeId::Mode720p1280x720.descriptor();

        apply(&mut regs, mode).unwrap();

        let expected: Vec<(u16, u8)> = mode.regs.iter().map(|w| (w.reg, w.value)).collect();
        assert_eq!(bus.write_sequence(), expected);
    }

    #[test]
    fn test_tables_end_in_standby() {
        for mode in MODES.iter() {
            let stream_writes: Vec<u8> = mode
                .regs
                .iter()
                .filter(|w| w.reg == STREAM_CTRL)
                .map(|w| w.value)
                .collect();
            assert_eq!(stream_writes.last(), Some(&STREAM_CTRL_STANDBY), "{}", mode.name);
            assert!(!stream_writes.contains(&STREAM_CTRL_STREAMING), "{}", mode.name);
        }
    }

    #[test]
    fn test_apply_reports_failing_position() {
        let bus = MockRegisterBus::new();
        bus.set_fail_writes_to(Some(0x3017));
        let mut regs = Registers::new(bus.clone());
        let mode = ModeId::ModeHd1920x1080.descriptor();

        let err = apply(&mut regs, mode).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        match err {
            SensorError::TableWrite {
                mode: name,
                index,
                reg,
                ..
            } => {
                assert_eq!(name, "mode_hd_1920_1080");
                assert_eq!(index, 3);
                assert_eq!(reg, 0x3017);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // 失敗前の3件は適用済みのまま
        assert_eq!(bus.write_count(), 3);
    }
}
