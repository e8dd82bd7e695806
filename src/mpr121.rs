use esp_idf_hal::i2c::I2cDriver;
use esp_idf_sys::EspError;
use log::{debug, info};

/// MPR121 capacitive touch controller, default I2C address.
const MPR121_ADDR: u8 = 0x5A;

pub const NUM_PADS: usize = 12;

// Registers
const REG_TOUCH_STATUS: u8 = 0x00;
const REG_MHD_RISING: u8 = 0x2B;
const REG_NHD_RISING: u8 = 0x2C;
const REG_NCL_RISING: u8 = 0x2D;
const REG_FDL_RISING: u8 = 0x2E;
const REG_MHD_FALLING: u8 = 0x2F;
const REG_NHD_FALLING: u8 = 0x30;
const REG_NCL_FALLING: u8 = 0x31;
const REG_FDL_FALLING: u8 = 0x32;
const REG_TOUCH_TH_BASE: u8 = 0x41;
const REG_RELEASE_TH_BASE: u8 = 0x42;
const REG_DEBOUNCE: u8 = 0x5B;
const REG_CONFIG1: u8 = 0x5C;
const REG_CONFIG2: u8 = 0x5D;
const REG_ECR: u8 = 0x5E;
const REG_SOFT_RESET: u8 = 0x80;

const SOFT_RESET_MAGIC: u8 = 0x63;
const TOUCH_THRESHOLD: u8 = 12;
const RELEASE_THRESHOLD: u8 = 6;
// Run mode, all 12 electrodes enabled, baseline tracking from current value.
const ECR_RUN_ALL: u8 = 0x8F;

const I2C_TIMEOUT_MS: u32 = 100;

pub struct Mpr121 {
    addr: u8,
}

impl Mpr121 {
    /// Reset and configure the controller for 12-pad scanning.
    pub fn init(i2c: &mut I2cDriver<'_>) -> Result<Self, EspError> {
        let dev = Self { addr: MPR121_ADDR };

        dev.write_reg(i2c, REG_SOFT_RESET, SOFT_RESET_MAGIC)?;
        std::thread::sleep(std::time::Duration::from_millis(1));

        // Stop mode while configuring.
        dev.write_reg(i2c, REG_ECR, 0x00)?;

        for pad in 0..NUM_PADS as u8 {
            dev.write_reg(i2c, REG_TOUCH_TH_BASE + 2 * pad, TOUCH_THRESHOLD)?;
            dev.write_reg(i2c, REG_RELEASE_TH_BASE + 2 * pad, RELEASE_THRESHOLD)?;
        }

        // Baseline filter defaults from the NXP datasheet.
        dev.write_reg(i2c, REG_MHD_RISING, 0x01)?;
        dev.write_reg(i2c, REG_NHD_RISING, 0x01)?;
        dev.write_reg(i2c, REG_NCL_RISING, 0x0E)?;
        dev.write_reg(i2c, REG_FDL_RISING, 0x00)?;
        dev.write_reg(i2c, REG_MHD_FALLING, 0x01)?;
        dev.write_reg(i2c, REG_NHD_FALLING, 0x05)?;
        dev.write_reg(i2c, REG_NCL_FALLING, 0x01)?;
        dev.write_reg(i2c, REG_FDL_FALLING, 0x00)?;

        dev.write_reg(i2c, REG_DEBOUNCE, 0x00)?;
        dev.write_reg(i2c, REG_CONFIG1, 0x10)?; // 16uA charge current
        dev.write_reg(i2c, REG_CONFIG2, 0x20)?; // 0.5us encoding, 1ms period

        dev.write_reg(i2c, REG_ECR, ECR_RUN_ALL)?;

        info!("MPR121 ready at 0x{:02X} ({} pads)", MPR121_ADDR, NUM_PADS);
        Ok(dev)
    }

    /// Scan all pads. One fresh boolean per channel, index order 0..11.
    pub fn scan(&self, i2c: &mut I2cDriver<'_>) -> Result<[bool; NUM_PADS], EspError> {
        let mut raw = [0u8; 2];
        i2c.write_read(self.addr, &[REG_TOUCH_STATUS], &mut raw, I2C_TIMEOUT_MS)?;
        let mask = u16::from_le_bytes(raw);
        debug!("MPR121 touch mask = {:#05X}", mask & 0x0FFF);
        Ok(decode_touch_mask(mask))
    }

    fn write_reg(&self, i2c: &mut I2cDriver<'_>, reg: u8, value: u8) -> Result<(), EspError> {
        i2c.write(self.addr, &[reg, value], I2C_TIMEOUT_MS)
    }
}

/// Bits 0-11 of the touch status word map to pads 0-11; the top nibble
/// carries flags and is ignored.
fn decode_touch_mask(mask: u16) -> [bool; NUM_PADS] {
    let mut pads = [false; NUM_PADS];
    for (i, pad) in pads.iter_mut().enumerate() {
        *pad = mask & (1 << i) != 0;
    }
    pads
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_empty_mask() {
        assert_eq!(decode_touch_mask(0x0000), [false; NUM_PADS]);
    }

    #[test]
    fn decodes_individual_pads() {
        let pads = decode_touch_mask(0b0000_1000_1000);
        assert!(pads[3]);
        assert!(pads[7]);
        assert_eq!(pads.iter().filter(|&&p| p).count(), 2);
    }

    #[test]
    fn ignores_flag_bits_above_pad_11() {
        let pads = decode_touch_mask(0xF000);
        assert_eq!(pads, [false; NUM_PADS]);
    }

    #[test]
    fn decodes_all_pads_active() {
        assert_eq!(decode_touch_mask(0x0FFF), [true; NUM_PADS]);
    }
}
