use embedded_graphics::{
    draw_target::DrawTarget,
    geometry::{OriginDimensions, Size},
    mono_font::MonoTextStyle,
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
    Pixel,
};
use esp_idf_hal::i2c::I2cDriver;
use esp_idf_sys::EspError;
use log::info;
use profont::PROFONT_7_POINT;

/// SSD1306 OLED, default I2C address.
const SSD1306_ADDR: u8 = 0x3C;

/// Panel dimensions. Change HEIGHT to 64 for the taller module.
pub const WIDTH: usize = 128;
pub const HEIGHT: usize = 32;
const PAGES: usize = HEIGHT / 8;

const CONTROL_CMD: u8 = 0x00;
const CONTROL_DATA: u8 = 0x40;
const I2C_TIMEOUT_MS: u32 = 100;

// Multiplex ratio and COM pin layout differ between the two panel heights.
const MUX_RATIO: u8 = (HEIGHT - 1) as u8;
const COM_PINS: u8 = if HEIGHT == 64 { 0x12 } else { 0x02 };

/// 1bpp page-mapped framebuffer for the SSD1306, rendered with
/// embedded-graphics and flushed over raw I2C. The panel shows exactly what
/// the last `set_text` wrote; there is no incremental update.
pub struct Ssd1306 {
    addr: u8,
    buf: [u8; WIDTH * PAGES],
}

impl Ssd1306 {
    pub fn new() -> Self {
        Self {
            addr: SSD1306_ADDR,
            buf: [0u8; WIDTH * PAGES],
        }
    }

    /// Send the panel init sequence and clear the screen.
    pub fn init(&mut self, i2c: &mut I2cDriver<'_>) -> Result<(), EspError> {
        let init_cmds: &[&[u8]] = &[
            &[0xAE],            // display off
            &[0xD5, 0x80],      // clock divide ratio
            &[0xA8, MUX_RATIO], // multiplex ratio
            &[0xD3, 0x00],      // display offset
            &[0x40],            // start line 0
            &[0x8D, 0x14],      // charge pump on
            &[0x20, 0x00],      // horizontal addressing mode
            &[0xA1],            // segment remap
            &[0xC8],            // COM scan direction remapped
            &[0xDA, COM_PINS],  // COM pins configuration
            &[0x81, 0x8F],      // contrast
            &[0xD9, 0xF1],      // pre-charge period
            &[0xDB, 0x40],      // VCOMH deselect level
            &[0xA4],            // resume from RAM content
            &[0xA6],            // normal (non-inverted) display
            &[0xAF],            // display on
        ];
        for cmd in init_cmds {
            self.command(i2c, cmd)?;
        }

        self.buf.fill(0);
        self.flush(i2c)?;
        info!("SSD1306 {}x{} ready at 0x{:02X}", WIDTH, HEIGHT, SSD1306_ADDR);
        Ok(())
    }

    /// Replace the label text wholesale and push it to the panel. Embedded
    /// newlines start new lines; anything past the panel edge is clipped.
    pub fn set_text(&mut self, i2c: &mut I2cDriver<'_>, text: &str) -> Result<(), EspError> {
        self.draw_text(text);
        self.flush(i2c)
    }

    /// Render `text` into the framebuffer, replacing previous content.
    pub fn draw_text(&mut self, text: &str) {
        self.buf.fill(0);
        let style = MonoTextStyle::new(&PROFONT_7_POINT, BinaryColor::On);
        Text::with_baseline(text, Point::zero(), style, Baseline::Top)
            .draw(self)
            .ok();
    }

    /// Push the whole framebuffer to the panel.
    pub fn flush(&self, i2c: &mut I2cDriver<'_>) -> Result<(), EspError> {
        // Reset the RAM window; horizontal addressing then auto-advances.
        self.command(i2c, &[0x21, 0x00, (WIDTH - 1) as u8])?;
        self.command(i2c, &[0x22, 0x00, (PAGES - 1) as u8])?;

        let mut chunk = [0u8; 65];
        chunk[0] = CONTROL_DATA;
        for part in self.buf.chunks(64) {
            chunk[1..=part.len()].copy_from_slice(part);
            i2c.write(self.addr, &chunk[..=part.len()], I2C_TIMEOUT_MS)?;
        }
        Ok(())
    }

    fn command(&self, i2c: &mut I2cDriver<'_>, cmd: &[u8]) -> Result<(), EspError> {
        let mut msg = [0u8; 4];
        msg[0] = CONTROL_CMD;
        msg[1..=cmd.len()].copy_from_slice(cmd);
        i2c.write(self.addr, &msg[..=cmd.len()], I2C_TIMEOUT_MS)
    }

    #[cfg(test)]
    fn pixel(&self, x: usize, y: usize) -> bool {
        self.buf[(y / 8) * WIDTH + x] & (1 << (y % 8)) != 0
    }
}

impl OriginDimensions for Ssd1306 {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}

impl DrawTarget for Ssd1306 {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            let (x, y) = (point.x, point.y);
            if x >= 0 && y >= 0 && (x as usize) < WIDTH && (y as usize) < HEIGHT {
                let idx = (y as usize / 8) * WIDTH + x as usize;
                let bit = 1 << (y as usize % 8);
                if color == BinaryColor::On {
                    self.buf[idx] |= bit;
                } else {
                    self.buf[idx] &= !bit;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixels_land_in_the_right_page() {
        let mut d = Ssd1306::new();
        Pixel(Point::new(3, 9), BinaryColor::On).draw(&mut d).unwrap();
        assert!(d.pixel(3, 9));
        assert_eq!(d.buf[WIDTH + 3], 1 << 1);
    }

    #[test]
    fn out_of_bounds_draws_are_clipped() {
        let mut d = Ssd1306::new();
        Pixel(Point::new(-1, 0), BinaryColor::On).draw(&mut d).unwrap();
        Pixel(Point::new(WIDTH as i32, 0), BinaryColor::On).draw(&mut d).unwrap();
        Pixel(Point::new(0, HEIGHT as i32), BinaryColor::On).draw(&mut d).unwrap();
        assert!(d.buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn draw_text_overwrites_previous_content() {
        let mut d = Ssd1306::new();
        d.draw_text("8888888888");
        let first: Vec<u8> = d.buf.to_vec();
        d.draw_text(" ");
        assert_ne!(first, d.buf.to_vec());
        assert!(d.buf.iter().all(|&b| b == 0), "blank text leaves a blank buffer");
    }

    #[test]
    fn text_renders_some_pixels() {
        let mut d = Ssd1306::new();
        d.draw_text("12:34:56 PM");
        assert!(d.buf.iter().any(|&b| b != 0));
    }
}
