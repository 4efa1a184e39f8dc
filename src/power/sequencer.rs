use embedded_hal::delay::DelayNs;
use embedded_hal::digital::PinState;
use log::{debug, error, info, warn};

use crate::error::{SensorError, SensorResult};
use crate::hardware::camera::ov2710_regs::{STREAM_CTRL, STREAM_CTRL_RESET};
use crate::hardware::camera::stream::{stream_disable, stream_enable};
use crate::hardware::registers::RegisterAccess;

/// リセットパルスの半周期
const RESET_SETTLE_US: u32 = 5_000;
/// ソフトリセット完了までの時間
const SOFT_RESET_SETTLE_US: u32 = 1_000;
/// LP-11 遷移のためのストリーミングパルス幅
const LP11_PULSE_US: u32 = 1_000;

/// 電源レール・リセット線・クロックのプラットフォーム抽象
pub trait PowerControl {
    type Error: std::fmt::Debug;

    /// 全電源（DOVDD, DVDD, AVDD）を有効化する。失敗時に一部だけ有効なまま残さないこと
    fn rail_enable(&mut self) -> Result<(), Self::Error>;

    fn rail_disable(&mut self) -> Result<(), Self::Error>;

    fn has_reset_line(&self) -> bool;

    /// `High` でリセット状態に保持する
    fn set_reset(&mut self, level: PinState) -> Result<(), Self::Error>;

    fn clock_enable(&mut self) -> Result<(), Self::Error>;

    fn clock_disable(&mut self);
}

/// センサーの状態機械から使う電源シーケンサのインターフェース
pub trait PowerSequencer {
    /// 電源オンのアイドル状態にする。既にオンなら何もしない
    fn power_on<R: RegisterAccess>(&mut self, regs: &mut R) -> SensorResult<()>;

    /// `power_on` の逆順で落とす。既にオフなら何もしない
    fn power_off(&mut self) -> SensorResult<()>;

    fn is_powered(&self) -> bool;
}

/// `PowerControl` とブロッキングディレイによる電源シーケンサ
#[derive(Debug)]
pub struct Sequencer<P, D> {
    power: P,
    delay: D,
    powered: bool,
}

impl<P: PowerControl, D: DelayNs> Sequencer<P, D> {
    pub fn new(power: P, delay: D) -> Self {
        Self {
            power,
            delay,
            powered: false,
        }
    }

    fn unavailable(what: &str, err: P::Error) -> SensorError {
        error!("failed to {}: {:?}", what, err);
        SensorError::ResourceUnavailable(format!("failed to {}: {:?}", what, err))
    }

    fn assert_reset(&mut self) -> SensorResult<()> {
        self.power
            .set_reset(PinState::High)
            .map_err(|e| Self::unavailable("assert reset", e))?;
        self.delay.delay_us(RESET_SETTLE_US);
        Ok(())
    }

    fn release_reset(&mut self) -> SensorResult<()> {
        self.power
            .set_reset(PinState::Low)
            .map_err(|e| Self::unavailable("release reset", e))?;
        self.delay.delay_us(RESET_SETTLE_US);
        Ok(())
    }

    fn reset_device<R: RegisterAccess>(&mut self, regs: &mut R) -> SensorResult<()> {
        if self.power.has_reset_line() {
            self.assert_reset()?;
            return self.release_reset();
        }

        regs.write_reg8(STREAM_CTRL, STREAM_CTRL_RESET)
            .inspect_err(|_| error!("sensor soft reset failed"))?;
        self.delay.delay_us(SOFT_RESET_SETTLE_US);
        Ok(())
    }

    /// ストリームを開始せずにクロックレーンを LP-11 にする
    fn enter_lp11<R: RegisterAccess>(&mut self, regs: &mut R) -> SensorResult<()> {
        stream_enable(regs)?;
        self.delay.delay_us(LP11_PULSE_US);
        stream_disable(regs)
    }

    /// レール投入後に失敗した場合、電源オフ状態に戻す
    fn unwind_rails(&mut self) {
        if self.power.has_reset_line() {
            if let Err(e) = self.power.set_reset(PinState::High) {
                warn!("reset assert during unwind failed: {:?}", e);
            }
        }
        if let Err(e) = self.power.rail_disable() {
            warn!("rail disable during unwind failed: {:?}", e);
        }
    }
}

impl<P: PowerControl, D: DelayNs> PowerSequencer for Sequencer<P, D> {
    fn power_on<R: RegisterAccess>(&mut self, regs: &mut R) -> SensorResult<()> {
        if self.powered {
            return Ok(());
        }

        self.power
            .rail_enable()
            .map_err(|e| Self::unavailable("enable regulators", e))?;

        if let Err(e) = self.reset_device(regs) {
            self.unwind_rails();
            return Err(e);
        }

        if let Err(e) = self.power.clock_enable() {
            self.unwind_rails();
            return Err(Self::unavailable("enable xvclk", e));
        }

        self.powered = true;

        if let Err(e) = self.enter_lp11(regs) {
            warn!("LP-11 pulse failed, powering down: {}", e);
            if let Err(off_err) = self.power_off() {
                warn!("power off after LP-11 failure: {}", off_err);
            }
            return Err(e);
        }

        info!("sensor powered on");
        Ok(())
    }

    fn power_off(&mut self) -> SensorResult<()> {
        if !self.powered {
            return Ok(());
        }

        self.power.clock_disable();
        let reset = if self.power.has_reset_line() {
            self.assert_reset()
        } else {
            Ok(())
        };
        let rails = self
            .power
            .rail_disable()
            .map_err(|e| Self::unavailable("disable regulators", e));
        self.powered = false;

        debug!("sensor powered off");
        reset.and(rails)
    }

    fn is_powered(&self) -> bool {
        self.powered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hardware::registers::Registers;
    use crate::mock::{MockDelay, MockPowerControl, MockRegisterBus, PowerEvent};

    type MockSequencer = Sequencer<MockPowerControl, MockDelay>;

    fn sequencer(reset_line: bool) -> (MockSequencer, MockPowerControl, MockDelay) {
        let power = MockPowerControl::new(reset_line);
        let delay = MockDelay::new();
        (Sequencer::new(power.clone(), delay.clone()), power, delay)
    }

    #[test]
    fn test_power_on_with_reset_line() {
        let (mut seq, power, delay) = sequencer(true);
        let bus = MockRegisterBus::new();
        let mut regs = Registers::new(bus.clone());

        seq.power_on(&mut regs).unwrap();

        assert!(seq.is_powered());
        assert_eq!(
            power.get_events(),
            vec![
                PowerEvent::RailsOn,
                PowerEvent::Reset(PinState::High),
                PowerEvent::Reset(PinState::Low),
                PowerEvent::ClockOn,
            ]
        );
        // ソフトリセットは使わない。LP-11 パルスの2回だけ
        assert_eq!(bus.writes_to(STREAM_CTRL), vec![vec![0x02], vec![0x42]]);
        assert_eq!(delay.total_us(), 11_000);
    }

    #[test]
    fn test_power_on_soft_reset() {
        let (mut seq, power, _delay) = sequencer(false);
        let bus = MockRegisterBus::new();
        let mut regs = Registers::new(bus.clone());

        seq.power_on(&mut regs).unwrap();

        assert_eq!(
            power.get_events(),
            vec![PowerEvent::RailsOn, PowerEvent::ClockOn]
        );
        assert_eq!(
            bus.writes_to(STREAM_CTRL),
            vec![vec![0x80], vec![0x02], vec![0x42]]
        );
    }

    #[test]
    fn test_power_cycle_is_idempotent() {
        let (mut seq, power, _delay) = sequencer(true);
        let mut regs = Registers::new(MockRegisterBus::new());

        seq.power_on(&mut regs).unwrap();
        seq.power_on(&mut regs).unwrap();
        assert_eq!(
            power
                .get_events()
                .iter()
                .filter(|e| **e == PowerEvent::RailsOn)
                .count(),
            1
        );

        power.clear_events();
        seq.power_off().unwrap();
        seq.power_off().unwrap();
        assert!(!seq.is_powered());
        assert_eq!(
            power.get_events(),
            vec![
                PowerEvent::ClockOff,
                PowerEvent::Reset(PinState::High),
                PowerEvent::RailsOff,
            ]
        );
    }

    #[test]
    fn test_rail_failure_stays_off() {
        let (mut seq, power, _delay) = sequencer(true);
        power.set_rail_error(true);
        let bus = MockRegisterBus::new();
        let mut regs = Registers::new(bus.clone());

        let err = seq.power_on(&mut regs).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
        assert!(!seq.is_powered());
        assert!(power.get_events().is_empty());
        assert!(bus.get_log().is_empty());
    }

    #[test]
    fn test_clock_failure_unwinds_rails() {
        let (mut seq, power, _delay) = sequencer(false);
        power.set_clock_error(true);
        let mut regs = Registers::new(MockRegisterBus::new());

        let err = seq.power_on(&mut regs).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
        assert!(!seq.is_powered());
        assert_eq!(
            power.get_events(),
            vec![PowerEvent::RailsOn, PowerEvent::RailsOff]
        );
    }

    #[test]
    fn test_soft_reset_failure_unwinds_rails() {
        let (mut seq, power, _delay) = sequencer(false);
        let bus = MockRegisterBus::new();
        bus.set_fail_writes_to(Some(STREAM_CTRL));
        let mut regs = Registers::new(bus);

        let err = seq.power_on(&mut regs).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(!seq.is_powered());
        assert_eq!(
            power.get_events(),
            vec![PowerEvent::RailsOn, PowerEvent::RailsOff]
        );
    }
}
