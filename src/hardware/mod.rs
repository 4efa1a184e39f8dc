/// レジスタバスとレジスタアクセス層
pub mod bus;
pub mod registers;
/// OV2710 カメラ制御
pub mod camera;

pub use bus::{I2cRegisterBus, RegisterBus, Transfer};
pub use registers::{decode_value, encode_value, RegisterAccess, Registers};
