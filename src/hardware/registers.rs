use log::{error, warn};

use super::bus::{RegisterBus, Transfer};
use crate::core::SensorConfig;
use crate::error::{SensorError, SensorResult};

/// 1回のアクセスで扱えるレジスタ値の最大バイト数
pub const MAX_REG_WIDTH: usize = 4;

fn check_width(width: usize) -> SensorResult<()> {
    if (1..=MAX_REG_WIDTH).contains(&width) {
        Ok(())
    } else {
        Err(SensorError::InvalidArgument(format!(
            "register width {} out of range 1..={}",
            width, MAX_REG_WIDTH
        )))
    }
}

/// 値を `width` バイトのビッグエンディアンに右詰めでエンコードする
///
/// `width` バイトに収まらない上位ビットは切り捨てられる。
pub fn encode_value(width: usize, value: u32) -> SensorResult<Vec<u8>> {
    check_width(width)?;
    Ok(value.to_be_bytes()[MAX_REG_WIDTH - width..].to_vec())
}

/// ビッグエンディアンのバイト列（1-4バイト）を値にデコードする
pub fn decode_value(bytes: &[u8]) -> SensorResult<u32> {
    check_width(bytes.len())?;
    let mut buf = [0u8; MAX_REG_WIDTH];
    buf[MAX_REG_WIDTH - bytes.len()..].copy_from_slice(bytes);
    Ok(u32::from_be_bytes(buf))
}

/// レジスタアクセス層のインターフェース
pub trait RegisterAccess {
    /// `width` バイトの値を書き込む
    fn write_reg(&mut self, reg: u16, width: usize, value: u32) -> SensorResult<()>;

    /// `width` バイトの値を読み出す
    fn read_reg(&mut self, reg: u16, width: usize) -> SensorResult<u32>;

    /// 8bitレジスタの `mask` のビットだけを書き換える
    fn modify_reg(&mut self, reg: u16, mask: u8, value: u8) -> SensorResult<()> {
        let current = self.read_reg(reg, 1)? as u8;
        let next = (current & !mask) | (value & mask);
        self.write_reg(reg, 1, u32::from(next))
    }

    fn write_reg8(&mut self, reg: u16, value: u8) -> SensorResult<()> {
        self.write_reg(reg, 1, u32::from(value))
    }

    fn read_reg8(&mut self, reg: u16) -> SensorResult<u8> {
        Ok(self.read_reg(reg, 1)? as u8)
    }
}

/// レジスタバス上のレジスタアクセス実装
///
/// 転送が失敗した場合のみ `max_retries` 回まで再送する。
/// 成功した転送は繰り返さない。
#[derive(Debug)]
pub struct Registers<B> {
    bus: B,
    max_retries: u8,
}

impl<B: RegisterBus> Registers<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            max_retries: 0,
        }
    }

    pub fn from_config(bus: B, config: &SensorConfig) -> Self {
        Self::new(bus).with_max_retries(config.bus_max_retries)
    }

    pub fn with_max_retries(mut self, max_retries: u8) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    fn with_retry<F>(&mut self, reg: u16, op: &str, mut transfer: F) -> SensorResult<()>
    where
        F: FnMut(&mut B) -> Result<(), B::Error>,
    {
        let mut attempt: u8 = 0;
        loop {
            match transfer(&mut self.bus) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "{} retry {}/{}: reg=0x{:04x}: {:?}",
                        op, attempt, self.max_retries, reg, e
                    );
                }
                Err(e) => {
                    error!("{} error: reg=0x{:04x}: {:?}", op, reg, e);
                    return Err(SensorError::transport(reg, e));
                }
            }
        }
    }
}

impl<B: RegisterBus> RegisterAccess for Registers<B> {
    fn write_reg(&mut self, reg: u16, width: usize, value: u32) -> SensorResult<()> {
        let data = encode_value(width, value)?;
        let address = reg.to_be_bytes();
        self.with_retry(reg, "write", |bus| {
            bus.transfer(address, Transfer::Write(&data))
        })
    }

    fn read_reg(&mut self, reg: u16, width: usize) -> SensorResult<u32> {
        check_width(width)?;
        let mut data = [0u8; MAX_REG_WIDTH];
        let address = reg.to_be_bytes();
        self.with_retry(reg, "read", |bus| {
            bus.transfer(address, Transfer::Read(&mut data[..width]))
        })?;
        decode_value(&data[..width])
    }
}
