//! Device configuration document and partial updates

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration shared between the camera and the control app
///
/// Serialized with camelCase keys, which is what the device firmware reads.
/// Missing keys in a stored document fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceConfig {
    /// Wi-Fi network name
    pub ssid: String,
    /// Wi-Fi password
    pub password: String,
    /// Phone number alerted by the device
    pub phone_number: String,
    /// Hour (0-23) the capture window opens
    pub start_hour: u8,
    /// Hour (0-23) the capture window closes
    pub end_hour: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            ssid: "Mon_SSID_WiFi".into(),
            password: "Mon_MotDePasse_WiFi".into(),
            phone_number: "+261000000000".into(),
            start_hour: 18,
            end_hour: 6,
        }
    }
}

impl DeviceConfig {
    /// Apply `patch` field by field; absent fields keep their value
    pub fn merged(&self, patch: &ConfigPatch) -> DeviceConfig {
        DeviceConfig {
            ssid: patch.ssid.clone().unwrap_or_else(|| self.ssid.clone()),
            password: patch
                .password
                .clone()
                .unwrap_or_else(|| self.password.clone()),
            phone_number: patch
                .phone_number
                .clone()
                .unwrap_or_else(|| self.phone_number.clone()),
            start_hour: hour_or(patch.start_hour, self.start_hour),
            end_hour: hour_or(patch.end_hour, self.end_hour),
        }
    }
}

fn hour_or(patch: Option<i64>, current: u8) -> u8 {
    patch
        .and_then(|h| u8::try_from(h).ok())
        .filter(|h| *h <= 23)
        .unwrap_or(current)
}

/// A partial configuration update
///
/// Hours are wide integers so out-of-range values reach [`validate`]
/// instead of failing deserialization.
///
/// [`validate`]: ConfigPatch::validate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    /// New network name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
    /// New network password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// New phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    /// New window start hour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_hour: Option<i64>,
    /// New window end hour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_hour: Option<i64>,
}

impl ConfigPatch {
    /// Reject hours outside 0-23
    pub fn validate(&self) -> Result<()> {
        for (name, hour) in [("startHour", self.start_hour), ("endHour", self.end_hour)] {
            if let Some(h) = hour {
                if !(0..=23).contains(&h) {
                    return Err(Error::InvalidConfig(format!(
                        "{} must be between 0 and 23, got {}",
                        name, h
                    )));
                }
            }
        }
        Ok(())
    }
}
