use super::ov2710_regs::{STREAM_CTRL, STREAM_CTRL_STANDBY, STREAM_CTRL_STREAMING};
use crate::error::SensorResult;
use crate::hardware::registers::RegisterAccess;

/// スリープビットを落としてフレーム出力を開始する
pub fn stream_enable<R: RegisterAccess>(regs: &mut R) -> SensorResult<()> {
    regs.write_reg8(STREAM_CTRL, STREAM_CTRL_STREAMING)
}

/// スタンバイに戻す
pub fn stream_disable<R: RegisterAccess>(regs: &mut R) -> SensorResult<()> {
    regs.write_reg8(STREAM_CTRL, STREAM_CTRL_STANDBY)
}
