use esp_idf_hal::gpio::OutputPin;
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::rmt::config::TransmitConfig;
use esp_idf_hal::rmt::{PinState, Pulse, RmtChannel, TxRmtDriver, VariableLengthSignal};
use esp_idf_sys::EspError;
use log::info;
use smart_leds::{brightness, RGB8};
use std::time::Duration;

pub const NUM_LEDS: usize = 20;

pub const OFF: RGB8 = RGB8::new(0, 0, 0);
pub const RED: RGB8 = RGB8::new(255, 0, 0);

/// WS2812 strip driven through the RMT peripheral. Colors are buffered in
/// `fill` and only hit the wire on an explicit `write`.
pub struct LedStrip<'d> {
    tx: TxRmtDriver<'d>,
    pixels: [RGB8; NUM_LEDS],
    brightness: u8,
    t0: (Pulse, Pulse),
    t1: (Pulse, Pulse),
}

impl<'d> LedStrip<'d> {
    pub fn new<C: RmtChannel>(
        channel: impl Peripheral<P = C> + 'd,
        pin: impl Peripheral<P = impl OutputPin> + 'd,
        brightness: u8,
    ) -> Result<Self, EspError> {
        let config = TransmitConfig::new().clock_divider(1);
        let tx = TxRmtDriver::new(channel, pin, &config)?;

        // WS2812 bit timing at the RMT counter clock.
        let ticks_hz = tx.counter_clock()?;
        let t0 = (
            Pulse::new_with_duration(ticks_hz, PinState::High, &Duration::from_nanos(350))?,
            Pulse::new_with_duration(ticks_hz, PinState::Low, &Duration::from_nanos(800))?,
        );
        let t1 = (
            Pulse::new_with_duration(ticks_hz, PinState::High, &Duration::from_nanos(700))?,
            Pulse::new_with_duration(ticks_hz, PinState::Low, &Duration::from_nanos(600))?,
        );

        info!("LED strip ready ({} pixels)", NUM_LEDS);
        Ok(Self {
            tx,
            pixels: [OFF; NUM_LEDS],
            brightness,
            t0,
            t1,
        })
    }

    /// Set every buffered pixel to `color`. Does not touch the hardware.
    pub fn fill(&mut self, color: RGB8) {
        self.pixels = [color; NUM_LEDS];
    }

    /// Push the buffered colors out. Blocks for the duration of the frame
    /// (~600us for 20 pixels); the 100ms loop cadence more than covers the
    /// WS2812 latch gap between frames.
    pub fn write(&mut self) -> Result<(), EspError> {
        let mut signal = VariableLengthSignal::new();
        for pixel in brightness(self.pixels.iter().copied(), self.brightness) {
            // Wire order is GRB, most significant bit first.
            let grb = ((pixel.g as u32) << 16) | ((pixel.r as u32) << 8) | pixel.b as u32;
            for bit in (0..24).rev() {
                let (hi, lo) = if grb & (1 << bit) != 0 { self.t1 } else { self.t0 };
                signal.push([&hi, &lo])?;
            }
        }
        self.tx.start_blocking(&signal)
    }
}
