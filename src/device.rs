//! Device-control collaborator.
//!
//! Connecting a player device is not a database operation: a separate HTTP
//! service performs it. The console only needs two calls:
//! - `POST {base}/v1/devices/connect/{mac}`
//! - `POST {base}/v1/devices/disconnect/{mac}`
//!
//! The service emits no change events, so callers patch the snapshot
//! themselves after a successful call.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::store::Store;

/// Errors returned by device-control calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The base URL or the device address could not form a URL.
    InvalidUrl(String),
    /// The request did not complete.
    Request(String),
    /// The service answered with a non-success status.
    Status(u16),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::InvalidUrl(msg) => write!(f, "invalid device URL: {}", msg),
            DeviceError::Request(msg) => write!(f, "device request failed: {}", msg),
            DeviceError::Status(code) => write!(f, "device service returned HTTP {}", code),
        }
    }
}

impl std::error::Error for DeviceError {}

/// Connects and disconnects devices by MAC address.
pub trait DeviceControl: Send + Sync {
    fn connect(&self, mac: &str) -> Result<(), DeviceError>;
    fn disconnect(&self, mac: &str) -> Result<(), DeviceError>;
}

/// Device-control over HTTP.
pub struct HttpDeviceControl {
    base: Url,
    client: reqwest::blocking::Client,
}

impl HttpDeviceControl {
    /// `base` may carry a scheme (`https://host:port`) or be a bare
    /// `host:port`, in which case plain HTTP is used.
    pub fn new(base: &str, timeout: Duration) -> Result<Self, DeviceError> {
        let with_scheme = if base.starts_with("http://") || base.starts_with("https://") {
            base.to_string()
        } else {
            format!("http://{}", base)
        };
        let base = Url::parse(&with_scheme).map_err(|e| DeviceError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(DeviceError::InvalidUrl(with_scheme));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeviceError::Request(e.to_string()))?;
        Ok(Self { base, client })
    }

    /// URL of `action` for `mac`; the MAC is encoded as a single path segment.
    fn endpoint(&self, action: &str, mac: &str) -> Result<Url, DeviceError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| DeviceError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(["v1", "devices", action, mac]);
        Ok(url)
    }

    fn post(&self, action: &str, mac: &str) -> Result<(), DeviceError> {
        let url = self.endpoint(action, mac)?;
        debug!(%url, "device request");
        let resp = self
            .client
            .post(url.clone())
            .send()
            .map_err(|e| DeviceError::Request(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "device request rejected");
            return Err(DeviceError::Status(status.as_u16()));
        }
        Ok(())
    }
}

impl DeviceControl for HttpDeviceControl {
    fn connect(&self, mac: &str) -> Result<(), DeviceError> {
        self.post("connect", mac)
    }

    fn disconnect(&self, mac: &str) -> Result<(), DeviceError> {
        self.post("disconnect", mac)
    }
}

/// Device-control that flips the `connected` column through the store.
///
/// Used by demo mode, where no device service exists. The resulting change
/// event converges the snapshot like any other server-side update.
pub struct StoreDevices {
    store: Arc<dyn Store>,
    table: String,
}

impl StoreDevices {
    pub fn new(store: Arc<dyn Store>, table: &str) -> Self {
        Self {
            store,
            table: table.to_string(),
        }
    }

    fn set_connected(&self, mac: &str, connected: bool) -> Result<(), DeviceError> {
        let rows = self
            .store
            .select(&self.table)
            .map_err(|e| DeviceError::Request(e.to_string()))?;
        let row = rows
            .iter()
            .find(|r| r.mac.as_deref() == Some(mac))
            .ok_or(DeviceError::Status(404))?;

        let mut fields = Map::new();
        fields.insert("connected".to_string(), Value::Bool(connected));
        self.store
            .merge(&row.id, &fields)
            .map_err(|e| DeviceError::Request(e.to_string()))
    }
}

impl DeviceControl for StoreDevices {
    fn connect(&self, mac: &str) -> Result<(), DeviceError> {
        self.set_connected(mac, true)
    }

    fn disconnect(&self, mac: &str) -> Result<(), DeviceError> {
        self.set_connected(mac, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordId;
    use crate::store::MemoryStore;

    fn control(base: &str) -> HttpDeviceControl {
        HttpDeviceControl::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_endpoint_layout() {
        let c = control("http://devices.local:8080");
        assert_eq!(
            c.endpoint("connect", "3C:22:FB:10:00:01").unwrap().as_str(),
            "http://devices.local:8080/v1/devices/connect/3C:22:FB:10:00:01"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_adds_scheme() {
        let c = control("devices.local:8080/api/");
        assert_eq!(
            c.endpoint("disconnect", "aa").unwrap().as_str(),
            "http://devices.local:8080/api/v1/devices/disconnect/aa"
        );
    }

    #[test]
    fn test_mac_is_a_single_segment() {
        let c = control("http://h");
        let url = c.endpoint("connect", "a/b c?d").unwrap();
        assert_eq!(url.as_str(), "http://h/v1/devices/connect/a%2Fb%20c%3Fd");
        assert_eq!(url.path_segments().unwrap().count(), 4);
    }

    #[test]
    fn test_invalid_base() {
        assert!(matches!(
            HttpDeviceControl::new("http://", Duration::from_secs(1)),
            Err(DeviceError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_store_devices_writes_connected_flag() {
        let store = Arc::new(MemoryStore::demo_devices());
        let devices = StoreDevices::new(store.clone(), "devices");

        devices.connect("3C:22:FB:10:00:02").unwrap();
        devices.disconnect("3C:22:FB:10:00:01").unwrap();

        let rows = store.rows("devices");
        let get = |key: &str| {
            rows.iter()
                .find(|r| r.id == RecordId::new("devices", key))
                .unwrap()
                .connected
        };
        assert!(get("d2"));
        assert!(!get("d1"));
        assert_eq!(devices.connect("00:00"), Err(DeviceError::Status(404)));
    }
}
