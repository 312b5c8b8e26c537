// src/gps/nmea.rs
//! NMEA sentence parsing and the serial NMEA position provider

use super::{
    provider::{PositionProvider, PositionWatch, ProviderResult},
    stream,
};
use crate::{
    error::{ProviderError, Result, TrackerError},
    tracking::state::TrackPoint,
};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use std::time::Duration;
use tokio::{io::BufReader, sync::mpsc};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

pub const DEFAULT_BAUDRATE: u32 = 9600;

const FIRST_FIX_TIMEOUT: Duration = Duration::from_secs(10);

/// Parse a single NMEA sentence into a fix.
///
/// Only RMC and GGA sentences with a valid fix produce a point.
pub fn parse_nmea_fix(line: &str) -> Option<TrackPoint> {
    let sentence = line.split('*').next().unwrap_or(line);
    let parts: Vec<&str> = sentence.split(',').collect();

    if line.starts_with("$GPRMC") || line.starts_with("$GNRMC") {
        parse_rmc(&parts)
    } else if line.starts_with("$GPGGA") || line.starts_with("$GNGGA") {
        parse_gga(&parts)
    } else {
        None
    }
}

/// RMC (Recommended Minimum) carries a full date, so it gives exact timestamps
fn parse_rmc(parts: &[&str]) -> Option<TrackPoint> {
    if parts.len() < 10 || parts[2] != "A" {
        return None;
    }

    let latitude = parse_coordinate(parts[3], parts[4], "S")?;
    let longitude = parse_coordinate(parts[5], parts[6], "W")?;
    let time = parse_time(parts[1])?;
    let date = NaiveDate::parse_from_str(parts[9], "%d%m%y").ok()?;

    let timestamp_ms = date.and_time(time).and_utc().timestamp_millis();
    Some(TrackPoint::new(latitude, longitude, timestamp_ms))
}

/// GGA only has a time of day; it is placed on today's UTC date
fn parse_gga(parts: &[&str]) -> Option<TrackPoint> {
    if parts.len() < 7 {
        return None;
    }

    // Fix quality 0 = invalid
    match parts[6].parse::<u8>() {
        Ok(quality) if quality > 0 => {}
        _ => return None,
    }

    let latitude = parse_coordinate(parts[2], parts[3], "S")?;
    let longitude = parse_coordinate(parts[4], parts[5], "W")?;
    let timestamp_ms = match parse_time(parts[1]) {
        Some(time) => Utc::now().date_naive().and_time(time).and_utc().timestamp_millis(),
        None => Utc::now().timestamp_millis(),
    };

    Some(TrackPoint::new(latitude, longitude, timestamp_ms))
}

/// Convert `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere into decimal degrees
fn parse_coordinate(value: &str, hemisphere: &str, negative: &str) -> Option<f64> {
    if value.is_empty() || hemisphere.is_empty() {
        return None;
    }

    let raw = value.parse::<f64>().ok()?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let decimal = degrees + minutes / 60.0;

    Some(if hemisphere == negative { -decimal } else { decimal })
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    if value.len() < 6 {
        return None;
    }
    NaiveTime::parse_from_str(value, "%H%M%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H%M%S"))
        .ok()
}

/// Position provider reading NMEA sentences from a serial GPS receiver
#[derive(Debug, Clone)]
pub struct SerialNmeaProvider {
    port: String,
    baudrate: u32,
}

impl SerialNmeaProvider {
    pub fn new(port: impl Into<String>, baudrate: u32) -> Self {
        Self {
            port: port.into(),
            baudrate,
        }
    }

    fn open(&self) -> Result<BufReader<SerialStream>> {
        let serial = tokio_serial::new(&self.port, self.baudrate)
            .timeout(Duration::from_millis(1000))
            .open_native_async()
            .map_err(|e| TrackerError::Connection(format!("Failed to open serial port {}: {}", self.port, e)))?;

        log::info!("Opened {} at {} baud", self.port, self.baudrate);
        Ok(BufReader::new(serial))
    }
}

#[async_trait]
impl PositionProvider for SerialNmeaProvider {
    fn name(&self) -> &str {
        "serial"
    }

    /// A serial receiver needs no permission, only a port that exists
    async fn request_foreground_permission(&self) -> ProviderResult<()> {
        let ports = tokio_serial::available_ports().map_err(TrackerError::from)?;
        if ports.iter().any(|p| p.port_name == self.port) {
            Ok(())
        } else {
            Err(ProviderError::Unavailable(format!("serial port {} not found", self.port)))
        }
    }

    async fn current_position(&self) -> ProviderResult<TrackPoint> {
        let mut reader = self.open()?;
        stream::first_fix(&mut reader, parse_nmea_fix, FIRST_FIX_TIMEOUT)
            .await
            .ok_or_else(|| ProviderError::Unavailable("receiver reported no fix".to_string()))
    }

    async fn watch_position(
        &self,
        updates: mpsc::UnboundedSender<TrackPoint>,
    ) -> ProviderResult<PositionWatch> {
        let reader = self.open()?;
        let task = stream::spawn_fix_reader(reader, "serial GPS", parse_nmea_fix, updates);
        Ok(PositionWatch::new(task))
    }
}

/// List available serial ports
pub fn list_serial_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| TrackerError::Other(format!("Failed to list serial ports: {}", e)))?;

    Ok(ports
        .into_iter()
        .map(|port| format!("{} - {:?}", port.port_name, port.port_type))
        .collect())
}
