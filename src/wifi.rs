use anyhow::{bail, Result};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::info;
use std::time::Duration;

const BACKOFF_CAP_MS: u64 = 8_000;

/// Established station connection. The EspWifi handle must be kept alive for
/// the lifetime of the process or the association drops.
pub struct WifiLink {
    pub wifi: Box<EspWifi<'static>>,
    pub ip_address: String,
}

/// Log association state from ESP-IDF internals (RSSI, channel, SSID).
fn log_wifi_diag(label: &str) {
    unsafe {
        let mut ap_info: esp_idf_sys::wifi_ap_record_t = core::mem::zeroed();
        if esp_idf_sys::esp_wifi_sta_get_ap_info(&mut ap_info) == esp_idf_sys::ESP_OK {
            let ssid = core::str::from_utf8(&ap_info.ssid)
                .unwrap_or("?")
                .trim_end_matches('\0');
            info!(
                "WiFi [{}]: assoc=YES rssi={} ch={} ssid={}",
                label, ap_info.rssi, ap_info.primary, ssid
            );
        } else {
            info!("WiFi [{}]: assoc=NO", label);
        }
    }
}

/// Delay before retry `attempt` (1-based): base doubled per failure, capped.
fn backoff_delay(base_ms: u16, attempt: u8) -> Duration {
    let shift = attempt.saturating_sub(1).min(4) as u32;
    Duration::from_millis(((base_ms as u64) << shift).min(BACKOFF_CAP_MS))
}

/// Associate with the configured access point, retrying with capped
/// exponential backoff up to `max_attempts`. Exhaustion is an error; the
/// appliance cannot do anything useful without the network time lookup.
pub fn connect(
    modem: Modem,
    sysloop: EspSystemEventLoop,
    ssid: &str,
    password: &str,
    max_attempts: u8,
    retry_base_ms: u16,
) -> Result<WifiLink> {
    let mut esp_wifi = EspWifi::new(modem, sysloop.clone(), None)?;

    let auth = if password.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    };

    let mut wifi_ssid = heapless::String::<32>::new();
    let mut wifi_pass = heapless::String::<64>::new();
    wifi_ssid.push_str(ssid).ok();
    wifi_pass.push_str(password).ok();

    esp_wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: wifi_ssid,
        password: wifi_pass,
        auth_method: auth,
        ..Default::default()
    }))?;

    let mut blocking_wifi = BlockingWifi::wrap(&mut esp_wifi, sysloop)?;

    blocking_wifi.start()?;
    info!("WiFi connecting to '{}'...", ssid);

    let mut connected = false;
    for attempt in 1..=max_attempts {
        match blocking_wifi.connect() {
            Ok(_) => {
                info!("WiFi connect OK on attempt {}", attempt);
                log_wifi_diag("connect OK");
                connected = true;
                break;
            }
            Err(e) => {
                log::warn!(
                    "WiFi connect attempt {}/{} failed: {}",
                    attempt, max_attempts, e
                );
                if attempt < max_attempts {
                    // Full stop/start cycle to reset radio state before retry.
                    let _ = blocking_wifi.disconnect();
                    blocking_wifi.stop().ok();
                    std::thread::sleep(backoff_delay(retry_base_ms, attempt));
                    blocking_wifi.start().ok();
                }
            }
        }
    }

    if !connected {
        bail!("WiFi association failed after {} attempts", max_attempts);
    }

    info!("WiFi associated, waiting for IP address...");
    blocking_wifi.wait_netif_up()?;

    let ip_info = blocking_wifi.wifi().sta_netif().get_ip_info()?;
    info!("WiFi connected — IP: {}", ip_info.ip);

    drop(blocking_wifi);

    let mac = esp_wifi.get_mac(esp_idf_svc::wifi::WifiDeviceId::Sta)?;
    info!(
        "MAC addr: {:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );

    Ok(WifiLink {
        wifi: Box::new(esp_wifi),
        ip_address: ip_info.ip.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base() {
        assert_eq!(backoff_delay(500, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(500, 2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(500, 3), Duration::from_millis(2000));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff_delay(1000, 8), Duration::from_millis(BACKOFF_CAP_MS));
        assert_eq!(backoff_delay(60000, 2), Duration::from_millis(BACKOFF_CAP_MS));
    }
}
