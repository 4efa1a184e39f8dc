use embedded_hal::i2c::I2c;

use crate::core::SensorConfig;

/// 1回のバス転送の方向とペイロード
#[derive(Debug)]
pub enum Transfer<'a> {
    /// アドレスに続けてペイロードを送信する
    Write(&'a [u8]),
    /// アドレスを送信した後、バッファ長だけ読み出す
    Read(&'a mut [u8]),
}

/// アドレス付きのレジスタバス
///
/// このトレイトを実装することで、実機用とテスト用(Mock)の
/// 実装を切り替えることができます。
pub trait RegisterBus {
    type Error: std::fmt::Debug;

    /// 16bitレジスタアドレス（ビッグエンディアン）に対して1回の転送を行う
    fn transfer(&mut self, address: [u8; 2], payload: Transfer<'_>) -> Result<(), Self::Error>;
}

/// embedded-hal の I2C をレジスタバスとして使うアダプタ
#[derive(Debug)]
pub struct I2cRegisterBus<I2C> {
    i2c: I2C,
    device_address: u8,
}

impl<I2C: I2c> I2cRegisterBus<I2C> {
    pub fn new(i2c: I2C, device_address: u8) -> Self {
        Self {
            i2c,
            device_address,
        }
    }

    /// 設定のI2Cアドレスで作成する
    pub fn from_config(i2c: I2C, config: &SensorConfig) -> Self {
        Self::new(i2c, config.i2c_address)
    }

    pub fn device_address(&self) -> u8 {
        self.device_address
    }

    /// I2C ペリフェラルを返却する
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> RegisterBus for I2cRegisterBus<I2C> {
    type Error = I2C::Error;

    fn transfer(&mut self, address: [u8; 2], payload: Transfer<'_>) -> Result<(), Self::Error> {
        match payload {
            // アドレスと値を1つの連続したトランザクションで送る
            Transfer::Write(data) => {
                let frame = [address.as_slice(), data].concat();
                self.i2c.write(self.device_address, &frame)
            }
            Transfer::Read(buf) => self.i2c.write_read(self.device_address, &address, buf),
        }
    }
}
