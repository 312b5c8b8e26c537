// src/gps/gpsd.rs
//! GPSD position provider

use super::{
    provider::{PositionProvider, PositionWatch, ProviderResult},
    stream,
};
use crate::{
    error::{ProviderError, Result, TrackerError},
    tracking::state::TrackPoint,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::{collections::HashMap, time::Duration};
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::TcpStream,
    sync::mpsc,
};

pub const DEFAULT_GPSD_HOST: &str = "localhost";
pub const DEFAULT_GPSD_PORT: u16 = 2947;

const FIRST_FIX_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct GpsdMessage {
    class: String,
    #[serde(flatten)]
    data: HashMap<String, serde_json::Value>,
}

/// Connect to a gpsd daemon and return a stream reader
pub async fn connect_gpsd(host: &str, port: u16) -> Result<BufReader<TcpStream>> {
    let mut stream = TcpStream::connect(format!("{}:{}", host, port))
        .await
        .map_err(|e| TrackerError::Connection(format!("Failed to connect to gpsd at {}:{}: {}", host, port, e)))?;

    // Send WATCH command to start receiving JSON data
    let watch_cmd = "?WATCH={\"enable\":true,\"json\":true}\n";
    stream
        .write_all(watch_cmd.as_bytes())
        .await
        .map_err(|e| TrackerError::Connection(format!("Failed to send WATCH command: {}", e)))?;

    Ok(BufReader::new(stream))
}

/// Parse a single line of gpsd JSON into a fix.
///
/// Returns `Ok(None)` for messages that are not a TPV with a 2D/3D fix.
pub fn parse_gpsd_fix(line: &str) -> Result<Option<TrackPoint>> {
    let msg: GpsdMessage = serde_json::from_str(line)
        .map_err(|e| TrackerError::Parse(format!("Failed to parse gpsd JSON: {}", e)))?;

    match msg.class.as_str() {
        "TPV" => Ok(parse_tpv_message(&msg.data)),
        "VERSION" => {
            if let Some(version) = msg.data.get("release").and_then(|v| v.as_str()) {
                log::info!("Connected to gpsd version: {}", version);
            }
            Ok(None)
        }
        _ => Ok(None),
    }
}

/// Parse TPV (Time Position Velocity) message
fn parse_tpv_message(msg_data: &HashMap<String, serde_json::Value>) -> Option<TrackPoint> {
    // mode 0/1 means no fix yet
    if let Some(mode) = msg_data.get("mode").and_then(|v| v.as_u64()) {
        if mode < 2 {
            return None;
        }
    }

    let lat = msg_data.get("lat").and_then(|v| v.as_f64())?;
    let lon = msg_data.get("lon").and_then(|v| v.as_f64())?;

    let timestamp_ms = msg_data
        .get("time")
        .and_then(|v| v.as_str())
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc).timestamp_millis())
        .unwrap_or_else(|| Utc::now().timestamp_millis());

    Some(TrackPoint::new(lat, lon, timestamp_ms))
}

fn parse_line(line: &str) -> Option<TrackPoint> {
    match parse_gpsd_fix(line) {
        Ok(point) => point,
        Err(e) => {
            log::debug!("Skipping gpsd line: {}", e);
            None
        }
    }
}

/// Position provider backed by a gpsd daemon
#[derive(Debug, Clone)]
pub struct GpsdProvider {
    host: String,
    port: u16,
}

impl GpsdProvider {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    async fn connect(&self) -> ProviderResult<BufReader<TcpStream>> {
        connect_gpsd(&self.host, self.port)
            .await
            .map_err(ProviderError::from)
    }
}

impl Default for GpsdProvider {
    fn default() -> Self {
        Self::new(DEFAULT_GPSD_HOST, DEFAULT_GPSD_PORT)
    }
}

#[async_trait]
impl PositionProvider for GpsdProvider {
    fn name(&self) -> &str {
        "gpsd"
    }

    /// gpsd has no permission model; a reachable daemon counts as granted
    async fn request_foreground_permission(&self) -> ProviderResult<()> {
        self.connect().await.map(|_| ())
    }

    async fn current_position(&self) -> ProviderResult<TrackPoint> {
        let mut reader = self.connect().await?;
        stream::first_fix(&mut reader, parse_line, FIRST_FIX_TIMEOUT)
            .await
            .ok_or_else(|| ProviderError::Unavailable("gpsd reported no fix".to_string()))
    }

    async fn watch_position(
        &self,
        updates: mpsc::UnboundedSender<TrackPoint>,
    ) -> ProviderResult<PositionWatch> {
        let reader = self.connect().await?;
        let task = stream::spawn_fix_reader(reader, "gpsd", parse_line, updates);
        Ok(PositionWatch::new(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tpv_parsing() {
        let json = r#"{"class":"TPV","device":"/dev/ttyUSB0","mode":3,"time":"2023-01-01T12:00:00.000Z","ept":0.005,"lat":48.117,"lon":11.517,"alt":545.4,"epx":15.319,"epy":17.054,"epv":124.484,"track":10.3797,"speed":0.091,"climb":10.7,"eps":34.11,"epc":248.97}"#;

        let point = parse_gpsd_fix(json).unwrap().unwrap();

        assert_eq!(point.latitude, 48.117);
        assert_eq!(point.longitude, 11.517);
        assert_eq!(point.timestamp_ms, 1_672_574_400_000);
    }

    #[test]
    fn test_tpv_without_fix() {
        let json = r#"{"class":"TPV","device":"/dev/ttyUSB0","mode":1,"time":"2023-01-01T12:00:00.000Z"}"#;
        assert_eq!(parse_gpsd_fix(json).unwrap(), None);
    }

    #[test]
    fn test_sky_is_ignored() {
        let json = r#"{"class":"SKY","device":"/dev/ttyUSB0","hdop":1.2,"satellites":[{"PRN":1,"ss":42,"used":true}]}"#;
        assert_eq!(parse_gpsd_fix(json).unwrap(), None);
    }

    #[test]
    fn test_invalid_json() {
        let invalid_json = r#"{"invalid": json"#;

        let result = parse_gpsd_fix(invalid_json);
        assert!(result.is_err());
        assert!(parse_line(invalid_json).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_daemon_is_unavailable() {
        // Port 1 on localhost is practically never a gpsd
        let provider = GpsdProvider::new("127.0.0.1", 1);
        let result = provider.request_foreground_permission().await;
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
    }
}
