// src/gps/mod.rs
//! Position providers: the capability trait plus gpsd and serial NMEA sources

pub mod gpsd;
pub mod nmea;
pub mod provider;
pub mod stream;

pub use gpsd::GpsdProvider;
pub use nmea::SerialNmeaProvider;
pub use provider::{PositionProvider, PositionWatch, ProviderResult};
