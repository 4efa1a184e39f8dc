//! テスト用のハードウェアモック
//!
//! 実際のセンサー・電源回路を使わずにレジスタバスと電源制御をシミュレートします。
//! 状態は `Arc<Mutex<..>>` で共有されるため、センサーに所有権を渡した後でも
//! クローン側から記録を検証できます。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::PinState;

use crate::core::SensorConfig;
use crate::error::SensorResult;
use crate::hardware::bus::{RegisterBus, Transfer};
use crate::hardware::camera::ov2710_regs::{CHIP_ID_HIGH, CHIP_ID_LOW, OV2710_CHIP_ID};
use crate::hardware::camera::Ov2710;
use crate::hardware::registers::Registers;
use crate::power::{PowerControl, Sequencer};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// モックバスのエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBusError {
    /// 注入された転送エラー
    Injected,
    /// 指定アドレスへの書き込みを拒否
    Nack(u16),
}

/// 記録されたバス転送
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    Write { reg: u16, data: Vec<u8> },
    Read { reg: u16, len: usize },
}

/// レジスタファイルを持つモックレジスタバス
///
/// 複数バイトの転送はアドレスを自動インクリメントして連続レジスタに作用します。
/// 失敗した転送は記録されません。
#[derive(Debug, Clone, Default)]
pub struct MockRegisterBus {
    pub registers: Arc<Mutex<HashMap<u16, u8>>>,
    pub log: Arc<Mutex<Vec<BusOp>>>,
    /// 次のN回の転送を失敗させる
    pub fail_next: Arc<Mutex<u32>>,
    /// このアドレスへの書き込みを失敗させ続ける
    pub fail_writes_to: Arc<Mutex<Option<u16>>>,
}

impl MockRegisterBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// チップIDレジスタが OV2710 を示すモック
    pub fn ov2710() -> Self {
        let bus = Self::new();
        let [high, low] = OV2710_CHIP_ID.to_be_bytes();
        bus.set_register(CHIP_ID_HIGH, high);
        bus.set_register(CHIP_ID_LOW, low);
        bus
    }

    pub fn set_register(&self, reg: u16, value: u8) {
        lock(&self.registers).insert(reg, value);
    }

    pub fn register(&self, reg: u16) -> u8 {
        lock(&self.registers).get(&reg).copied().unwrap_or(0)
    }

    pub fn fail_next_transfers(&self, count: u32) {
        *lock(&self.fail_next) = count;
    }

    pub fn set_fail_writes_to(&self, reg: Option<u16>) {
        *lock(&self.fail_writes_to) = reg;
    }

    pub fn get_log(&self) -> Vec<BusOp> {
        lock(&self.log).clone()
    }

    pub fn clear_log(&self) {
        lock(&self.log).clear();
    }

    /// 指定アドレスへの書き込みペイロードを順に返す
    pub fn writes_to(&self, reg: u16) -> Vec<Vec<u8>> {
        lock(&self.log)
            .iter()
            .filter_map(|op| match op {
                BusOp::Write { reg: r, data } if *r == reg => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// 記録された書き込み (アドレス, 先頭バイト) の列
    pub fn write_sequence(&self) -> Vec<(u16, u8)> {
        lock(&self.log)
            .iter()
            .filter_map(|op| match op {
                BusOp::Write { reg, data } => data.first().map(|v| (*reg, *v)),
                BusOp::Read { .. } => None,
            })
            .collect()
    }

    pub fn write_count(&self) -> usize {
        lock(&self.log)
            .iter()
            .filter(|op| matches!(op, BusOp::Write { .. }))
            .count()
    }
}

impl RegisterBus for MockRegisterBus {
    type Error = MockBusError;

    fn transfer(&mut self, address: [u8; 2], payload: Transfer<'_>) -> Result<(), Self::Error> {
        let reg = u16::from_be_bytes(address);
        {
            let mut fail_next = lock(&self.fail_next);
            if *fail_next > 0 {
                *fail_next -= 1;
                return Err(MockBusError::Injected);
            }
        }

        match payload {
            Transfer::Write(data) => {
                if *lock(&self.fail_writes_to) == Some(reg) {
                    return Err(MockBusError::Nack(reg));
                }
                let mut registers = lock(&self.registers);
                for (offset, byte) in data.iter().enumerate() {
                    registers.insert(reg.wrapping_add(offset as u16), *byte);
                }
                lock(&self.log).push(BusOp::Write {
                    reg,
                    data: data.to_vec(),
                });
            }
            Transfer::Read(buf) => {
                let registers = lock(&self.registers);
                for (offset, byte) in buf.iter_mut().enumerate() {
                    *byte = registers
                        .get(&reg.wrapping_add(offset as u16))
                        .copied()
                        .unwrap_or(0);
                }
                lock(&self.log).push(BusOp::Read {
                    reg,
                    len: buf.len(),
                });
            }
        }
        Ok(())
    }
}

/// 電源制御モックのエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockPowerError {
    Rails,
    Clock,
}

/// 記録された電源イベント
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEvent {
    RailsOn,
    RailsOff,
    Reset(PinState),
    ClockOn,
    ClockOff,
}

/// 電源レール・リセット線・クロックのモック
#[derive(Debug, Clone)]
pub struct MockPowerControl {
    pub events: Arc<Mutex<Vec<PowerEvent>>>,
    pub simulate_rail_error: Arc<Mutex<bool>>,
    pub simulate_clock_error: Arc<Mutex<bool>>,
    has_reset_line: bool,
}

impl MockPowerControl {
    pub fn new(has_reset_line: bool) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            simulate_rail_error: Arc::new(Mutex::new(false)),
            simulate_clock_error: Arc::new(Mutex::new(false)),
            has_reset_line,
        }
    }

    pub fn get_events(&self) -> Vec<PowerEvent> {
        lock(&self.events).clone()
    }

    pub fn clear_events(&self) {
        lock(&self.events).clear();
    }

    pub fn set_rail_error(&self, enable: bool) {
        *lock(&self.simulate_rail_error) = enable;
    }

    pub fn set_clock_error(&self, enable: bool) {
        *lock(&self.simulate_clock_error) = enable;
    }

    fn record(&self, event: PowerEvent) {
        lock(&self.events).push(event);
    }
}

impl PowerControl for MockPowerControl {
    type Error = MockPowerError;

    fn rail_enable(&mut self) -> Result<(), Self::Error> {
        if *lock(&self.simulate_rail_error) {
            return Err(MockPowerError::Rails);
        }
        self.record(PowerEvent::RailsOn);
        Ok(())
    }

    fn rail_disable(&mut self) -> Result<(), Self::Error> {
        self.record(PowerEvent::RailsOff);
        Ok(())
    }

    fn has_reset_line(&self) -> bool {
        self.has_reset_line
    }

    fn set_reset(&mut self, level: PinState) -> Result<(), Self::Error> {
        self.record(PowerEvent::Reset(level));
        Ok(())
    }

    fn clock_enable(&mut self) -> Result<(), Self::Error> {
        if *lock(&self.simulate_clock_error) {
            return Err(MockPowerError::Clock);
        }
        self.record(PowerEvent::ClockOn);
        Ok(())
    }

    fn clock_disable(&mut self) {
        self.record(PowerEvent::ClockOff);
    }
}

/// 待ち時間を記録するだけのディレイ
#[derive(Debug, Clone, Default)]
pub struct MockDelay {
    pub delays_ns: Arc<Mutex<Vec<u32>>>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_us(&self) -> u64 {
        lock(&self.delays_ns)
            .iter()
            .map(|ns| u64::from(*ns) / 1_000)
            .sum()
    }

    pub fn count(&self) -> usize {
        lock(&self.delays_ns).len()
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        lock(&self.delays_ns).push(ns);
    }
}

/// モックハードウェア上のセンサー
pub type MockSensor = Ov2710<Registers<MockRegisterBus>, Sequencer<MockPowerControl, MockDelay>>;

/// モック一式。センサーに渡した後もクローン経由で記録を検証できる
#[derive(Debug, Clone)]
pub struct MockRig {
    pub bus: MockRegisterBus,
    pub power: MockPowerControl,
    pub delay: MockDelay,
}

impl MockRig {
    pub fn new(has_reset_line: bool) -> Self {
        Self {
            bus: MockRegisterBus::ov2710(),
            power: MockPowerControl::new(has_reset_line),
            delay: MockDelay::new(),
        }
    }

    pub fn attach(&self, config: &SensorConfig) -> SensorResult<MockSensor> {
        let regs = Registers::from_config(self.bus.clone(), config);
        let sequencer = Sequencer::new(self.power.clone(), self.delay.clone());
        Ov2710::attach(regs, sequencer, config)
    }
}
