mod clock;
mod config;
mod display;
mod http_client;
mod led_strip;
mod mcp9808;
mod mpr121;
mod status;
mod timeapi;
mod wifi;

use anyhow::{anyhow, Result};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs};
use esp_idf_svc::sntp::EspSntp;
use log::info;
use std::time::Duration;

use crate::display::Ssd1306;
use crate::led_strip::LedStrip;
use crate::mcp9808::Mcp9808;
use crate::mpr121::Mpr121;

// ── I2C ─────────────────────────────────────────────────────────────
const I2C_FREQ_HZ: u32 = 100_000;

// ── Timing ──────────────────────────────────────────────────────────
const TICK_MS: u64 = 100;

fn main() -> Result<()> {
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("BOOT — gatorpad-clock v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Peripherals + config ──
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let nvs = EspNvs::new(nvs_partition, config::NS, true)?;

    let cfg = config::Config::load(&nvs);
    cfg.ensure_credentials()?;

    // ── 2. LED strip ──
    // Bring the strip up first so stale colors from a previous run go dark.
    let mut strip = LedStrip::new(
        peripherals.rmt.channel0,
        peripherals.pins.gpio7,
        cfg.led_brightness,
    )?;
    strip.fill(led_strip::OFF);
    strip.write()?;

    // ── 3. I2C bus (touch controller, temperature sensor, display) ──
    let i2c_config = I2cConfig::new().baudrate(Hertz(I2C_FREQ_HZ));
    let mut i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio8,
        peripherals.pins.gpio9,
        &i2c_config,
    )?;

    // ── 4. Display + boot message ──
    let mut label = Ssd1306::new();
    label.init(&mut i2c)?;
    label.set_text(&mut i2c, "Starting...")?;

    // ── 5. Sensors ──
    let temp_sensor = Mcp9808::init(&mut i2c)
        .ok_or_else(|| anyhow!("MCP9808 temperature sensor not found on I2C bus"))?;
    let touch = Mpr121::init(&mut i2c)?;

    // ── 6. WiFi ──
    label.set_text(&mut i2c, &format!("Connecting to\n{}...", cfg.wifi_ssid))?;
    let link = wifi::connect(
        peripherals.modem,
        sysloop,
        &cfg.wifi_ssid,
        &cfg.wifi_pass,
        cfg.wifi_attempts,
        cfg.retry_ms,
    )?;
    // Keep the association alive for the lifetime of the process.
    let _wifi = link.wifi;

    // ── 7. Timezone offset (fetched once, immutable afterwards) ──
    label.set_text(&mut i2c, "Fetching UTC\noffset...")?;
    let utc_offset = timeapi::fetch_utc_offset(
        &cfg.time_url,
        cfg.http_attempts,
        Duration::from_millis(cfg.retry_ms as u64),
    )?;

    // ── 8. Clock sync ──
    // The handle must stay alive to keep periodic re-sync running.
    let _sntp = EspSntp::new_default()?;
    label.set_text(&mut i2c, "Waiting for\nclock sync...")?;
    clock::wait_for_clock();

    let local = clock::local_from_epoch(clock::epoch_now(), utc_offset);
    info!(
        "Local time: {:04}-{:02}-{:02} {}",
        local.year,
        local.month,
        local.day,
        clock::format_12h(&local)
    );
    info!("Startup complete (IP {}), entering main loop", link.ip_address);

    // ── 9. Main polling loop ──
    // Sensor faults inside the loop are logged and the iteration carries on
    // with the previous value; an unattended appliance should not halt on a
    // single bad bus transaction.
    let mut temp_f: f32 = 0.0;
    loop {
        let local = clock::local_from_epoch(clock::epoch_now(), utc_offset);
        let time_text = clock::format_12h(&local);

        match temp_sensor.read_celsius(&mut i2c) {
            Ok(celsius) => temp_f = mcp9808::celsius_to_fahrenheit(celsius),
            Err(e) => log::warn!("Temperature read failed: {}", e),
        }

        let touched = match touch.scan(&mut i2c) {
            Ok(pads) => pads,
            Err(e) => {
                log::warn!("Touch scan failed: {}", e);
                [false; mpr121::NUM_PADS]
            }
        };

        let text = status::compose_status(&time_text, temp_f, &touched);

        strip.fill(status::feedback_color(&touched));
        if let Err(e) = strip.write() {
            log::warn!("LED strip write failed: {}", e);
        }

        if let Err(e) = label.set_text(&mut i2c, &text) {
            log::warn!("Display write failed: {}", e);
        }
        info!("{}", text);

        std::thread::sleep(Duration::from_millis(TICK_MS));
    }
}
