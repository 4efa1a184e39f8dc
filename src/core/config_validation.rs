#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    InvalidI2cAddress(u8),
    TooManyRetries(u8),
    ZeroDimension { width: u32, height: u32 },
}

/// バス再送回数の上限
pub const MAX_BUS_RETRIES: u8 = 5;

pub fn parse_i2c_address(value: u8) -> Result<u8, ValidationError> {
    // 7bitアドレスのみ。0x00-0x07 と 0x78-0x7F は予約済み
    if (0x08..=0x77).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::InvalidI2cAddress(value))
    }
}

pub fn parse_bus_max_retries(value: u8) -> Result<u8, ValidationError> {
    if value <= MAX_BUS_RETRIES {
        Ok(value)
    } else {
        Err(ValidationError::TooManyRetries(value))
    }
}

pub fn parse_initial_size(width: u32, height: u32) -> Result<(u32, u32), ValidationError> {
    if width == 0 || height == 0 {
        return Err(ValidationError::ZeroDimension { width, height });
    }
    Ok((width, height))
}
