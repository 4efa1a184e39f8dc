/// 電源シーケンス
pub mod delay;
pub mod gpio;
pub mod sequencer;

pub use delay::StdDelay;
pub use gpio::GpioPowerControl;
pub use sequencer::{PowerControl, PowerSequencer, Sequencer};
