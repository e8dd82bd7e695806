use anyhow::{bail, Result};
use esp_idf_svc::nvs::{EspNvs, NvsDefault};
use log::info;

pub const NS: &str = "gator_cfg";

const KEY_WIFI_SSID: &str = "wifi_ssid";
const KEY_WIFI_PASS: &str = "wifi_pass";
const KEY_TIME_URL: &str = "time_url";
const KEY_HTTP_ATTEMPTS: &str = "http_attempts";
const KEY_WIFI_ATTEMPTS: &str = "wifi_attempts";
const KEY_RETRY_MS: &str = "retry_ms";
const KEY_LED_BRIGHT: &str = "led_bright";

const DEFAULT_TIME_URL: &str = "https://worldtimeapi.org/api/timezone/America/New_York";
const DEFAULT_HTTP_ATTEMPTS: u8 = 3;
const DEFAULT_WIFI_ATTEMPTS: u8 = 10;
const DEFAULT_RETRY_MS: u16 = 500;
const DEFAULT_LED_BRIGHT: u8 = 217; // ~85% of full scale

pub struct Config {
    pub wifi_ssid: String,
    pub wifi_pass: String,
    pub time_url: String,
    /// Attempt ceiling for the time API fetch (startup-fatal on exhaustion).
    pub http_attempts: u8,
    /// Attempt ceiling for WiFi association (startup-fatal on exhaustion).
    pub wifi_attempts: u8,
    /// Base delay between retries; network retries back off from this value.
    pub retry_ms: u16,
    pub led_brightness: u8,
}

/// Read a string from NVS, returning None if the key is absent or on error.
fn nvs_get_str(nvs: &EspNvs<NvsDefault>, key: &str) -> Option<String> {
    // First call to learn the required buffer length.
    let len = match nvs.str_len(key) {
        Ok(Some(len)) => len,
        _ => return None,
    };

    let mut buf = vec![0u8; len];
    match nvs.get_str(key, &mut buf) {
        Ok(Some(val)) => {
            let s = val.trim_end_matches('\0').to_string();
            if s.is_empty() { None } else { Some(s) }
        }
        _ => None,
    }
}

impl Config {
    /// Load configuration from NVS. WiFi credentials fall back to the
    /// build-time `wifi.local.rs` values; everything else falls back to
    /// compiled defaults.
    pub fn load(nvs: &EspNvs<NvsDefault>) -> Config {
        let wifi_ssid = nvs_get_str(nvs, KEY_WIFI_SSID)
            .or_else(|| option_env!("LOCAL_WIFI_SSID").map(str::to_string))
            .unwrap_or_default();
        info!("NVS wifi_ssid = {:?}", wifi_ssid);

        let wifi_pass = nvs_get_str(nvs, KEY_WIFI_PASS)
            .or_else(|| option_env!("LOCAL_WIFI_PASS").map(str::to_string))
            .unwrap_or_default();
        info!("NVS wifi_pass = <{} chars>", wifi_pass.len());

        let time_url =
            nvs_get_str(nvs, KEY_TIME_URL).unwrap_or_else(|| DEFAULT_TIME_URL.to_string());
        info!("NVS time_url = {:?}", time_url);

        let http_attempts = nvs
            .get_u8(KEY_HTTP_ATTEMPTS)
            .unwrap_or(None)
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_HTTP_ATTEMPTS);
        info!("NVS http_attempts = {}", http_attempts);

        let wifi_attempts = nvs
            .get_u8(KEY_WIFI_ATTEMPTS)
            .unwrap_or(None)
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_WIFI_ATTEMPTS);
        info!("NVS wifi_attempts = {}", wifi_attempts);

        let retry_ms = nvs
            .get_u16(KEY_RETRY_MS)
            .unwrap_or(None)
            .filter(|&ms| ms > 0)
            .unwrap_or(DEFAULT_RETRY_MS);
        info!("NVS retry_ms = {}", retry_ms);

        let led_brightness = nvs
            .get_u8(KEY_LED_BRIGHT)
            .unwrap_or(None)
            .unwrap_or(DEFAULT_LED_BRIGHT);
        info!("NVS led_bright = {}", led_brightness);

        Config {
            wifi_ssid,
            wifi_pass,
            time_url,
            http_attempts,
            wifi_attempts,
            retry_ms,
            led_brightness,
        }
    }

    /// Missing credentials are a fatal startup condition; tell the operator
    /// where to put them instead of limping along without a network.
    pub fn ensure_credentials(&self) -> Result<()> {
        if self.wifi_ssid.is_empty() {
            bail!(
                "WiFi credentials are missing. Set `{}`/`{}` in NVS namespace `{}` \
                 or provide a wifi.local.rs next to Cargo.toml and rebuild.",
                KEY_WIFI_SSID,
                KEY_WIFI_PASS,
                NS
            );
        }
        Ok(())
    }
}
