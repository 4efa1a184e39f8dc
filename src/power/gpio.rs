use embedded_hal::digital::{OutputPin, PinState};

use super::sequencer::PowerControl;

/// GPIO で電源を制御する場合のエラー
#[derive(Debug)]
pub enum GpioPowerError<E> {
    /// ピン操作の失敗
    Pin(E),
}

/// GPIO で駆動する電源制御
///
/// - `supply_en`: レギュレータ（DOVDD/DVDD/AVDD）を一括で有効化するピン
/// - `reset`: リセット線（無い基板ではソフトリセットを使う）
/// - `clock_en`: xvclk 発振器のイネーブルピン
pub struct GpioPowerControl<EN, RST, CLK> {
    supply_en: EN,
    reset: Option<RST>,
    clock_en: CLK,
}

impl<EN, RST, CLK, E> GpioPowerControl<EN, RST, CLK>
where
    EN: OutputPin<Error = E>,
    RST: OutputPin<Error = E>,
    CLK: OutputPin<Error = E>,
{
    pub fn new(supply_en: EN, reset: Option<RST>, clock_en: CLK) -> Self {
        Self {
            supply_en,
            reset,
            clock_en,
        }
    }

    /// ピンを返却する
    pub fn release(self) -> (EN, Option<RST>, CLK) {
        (self.supply_en, self.reset, self.clock_en)
    }
}

impl<EN, RST, CLK, E> PowerControl for GpioPowerControl<EN, RST, CLK>
where
    EN: OutputPin<Error = E>,
    RST: OutputPin<Error = E>,
    CLK: OutputPin<Error = E>,
    E: std::fmt::Debug,
{
    type Error = GpioPowerError<E>;

    fn rail_enable(&mut self) -> Result<(), Self::Error> {
        self.supply_en.set_high().map_err(GpioPowerError::Pin)
    }

    fn rail_disable(&mut self) -> Result<(), Self::Error> {
        self.supply_en.set_low().map_err(GpioPowerError::Pin)
    }

    fn has_reset_line(&self) -> bool {
        self.reset.is_some()
    }

    fn set_reset(&mut self, level: PinState) -> Result<(), Self::Error> {
        match self.reset.as_mut() {
            Some(pin) => pin.set_state(level).map_err(GpioPowerError::Pin),
            None => Ok(()),
        }
    }

    fn clock_enable(&mut self) -> Result<(), Self::Error> {
        self.clock_en.set_high().map_err(GpioPowerError::Pin)
    }

    fn clock_disable(&mut self) {
        if let Err(e) = self.clock_en.set_low() {
            log::warn!("xvclk disable failed: {:?}", e);
        }
    }
}
