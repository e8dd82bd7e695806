use esp_idf_hal::i2c::I2cDriver;
use esp_idf_sys::EspError;
use log::{info, warn};

/// MCP9808 digital temperature sensor, default I2C address.
const MCP9808_ADDR: u8 = 0x18;

const REG_AMBIENT_TEMP: u8 = 0x05;
const REG_MANUF_ID: u8 = 0x06;
const REG_DEVICE_ID: u8 = 0x07;

const MANUF_ID: u16 = 0x0054;
const DEVICE_ID_MSB: u8 = 0x04;

const I2C_TIMEOUT_MS: u32 = 100;

pub struct Mcp9808 {
    addr: u8,
}

impl Mcp9808 {
    /// Probe the sensor by checking manufacturer and device IDs.
    /// Returns None if it does not answer or identifies as something else.
    pub fn init(i2c: &mut I2cDriver<'_>) -> Option<Self> {
        let dev = Self { addr: MCP9808_ADDR };

        let manuf = match dev.read_reg16(i2c, REG_MANUF_ID) {
            Ok(v) => v,
            Err(e) => {
                warn!("MCP9808 not answering at 0x{:02X}: {}", MCP9808_ADDR, e);
                return None;
            }
        };
        let device = dev.read_reg16(i2c, REG_DEVICE_ID).ok()?;

        if manuf != MANUF_ID || (device >> 8) as u8 != DEVICE_ID_MSB {
            warn!(
                "Unexpected IDs at 0x{:02X}: manuf={:#06X} device={:#06X}",
                MCP9808_ADDR, manuf, device
            );
            return None;
        }

        info!("MCP9808 found at 0x{:02X}", MCP9808_ADDR);
        Some(dev)
    }

    /// Read the ambient temperature in Celsius.
    pub fn read_celsius(&self, i2c: &mut I2cDriver<'_>) -> Result<f32, EspError> {
        let raw = self.read_reg16(i2c, REG_AMBIENT_TEMP)?;
        Ok(convert_ambient(raw))
    }

    fn read_reg16(&self, i2c: &mut I2cDriver<'_>, reg: u8) -> Result<u16, EspError> {
        let mut buf = [0u8; 2];
        i2c.write_read(self.addr, &[reg], &mut buf, I2C_TIMEOUT_MS)?;
        Ok(u16::from_be_bytes(buf))
    }
}

/// Convert the raw ambient temperature register to Celsius: 13-bit signed
/// value, 0.0625 C per LSB, sign in bit 12 (upper 3 bits are alert flags).
fn convert_ambient(raw: u16) -> f32 {
    let magnitude = (raw & 0x0FFF) as f32 / 16.0;
    if raw & 0x1000 != 0 {
        magnitude - 256.0
    } else {
        magnitude
    }
}

/// Display conversion; the sensor itself always reports Celsius.
pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_positive_readings() {
        // 0x0195 = 405 LSB = 25.3125 C
        assert_eq!(convert_ambient(0x0195), 25.3125);
        assert_eq!(convert_ambient(0x0000), 0.0);
    }

    #[test]
    fn converts_negative_readings() {
        // -0.0625 C encodes as sign bit + 0xFFF
        assert_eq!(convert_ambient(0x1FFF), -0.0625);
        // -25.25 C: 256 - 25.25 = 230.75 C magnitude = 0xE6C
        assert_eq!(convert_ambient(0x1E6C), -25.25);
    }

    #[test]
    fn alert_flags_do_not_disturb_the_value() {
        assert_eq!(convert_ambient(0x0195 | 0xE000), 25.3125);
    }

    #[test]
    fn fahrenheit_conversion() {
        assert_eq!(celsius_to_fahrenheit(0.0), 32.0);
        assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
        assert!((celsius_to_fahrenheit(22.4) - 72.32).abs() < 1e-4);
    }
}
