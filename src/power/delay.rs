use embedded_hal::delay::DelayNs;
use std::time::Duration;

/// `std::thread::sleep` によるブロッキングディレイ
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}
