// src/gps/stream.rs
//! Line-oriented fix readers shared by the gpsd and serial providers

use crate::tracking::state::TrackPoint;
use std::time::Duration;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::mpsc,
    task::JoinHandle,
    time::timeout,
};

/// Parses one line of provider output into a fix, if it carries one
pub type LineParser = fn(&str) -> Option<TrackPoint>;

/// Read lines until one yields a fix or `limit` elapses
pub async fn first_fix<R>(reader: &mut R, parse: LineParser, limit: Duration) -> Option<TrackPoint>
where
    R: AsyncBufRead + Unpin,
{
    let read = async {
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => return None, // EOF
                Ok(_) => {
                    if let Some(point) = parse(line.trim()) {
                        return Some(point);
                    }
                }
                Err(e) => {
                    log::warn!("Error reading position stream: {}", e);
                    return None;
                }
            }
        }
    };

    timeout(limit, read).await.ok().flatten()
}

/// Spawn a reader task forwarding every parsed fix into `updates`.
///
/// The task ends on EOF, on a read error, or once the receiving side
/// has been dropped.
pub fn spawn_fix_reader<R>(
    mut reader: R,
    source: &'static str,
    parse: LineParser,
    updates: mpsc::UnboundedSender<TrackPoint>,
) -> JoinHandle<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    log::info!("{} stream closed", source);
                    break;
                }
                Ok(_) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if let Some(point) = parse(line) {
                        log::debug!("{} fix {:.6},{:.6}", source, point.latitude, point.longitude);
                        if updates.send(point).is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    log::warn!("Error reading from {}: {}", source, e);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    fn parse_pair(line: &str) -> Option<TrackPoint> {
        let (lat, lon) = line.split_once(',')?;
        Some(TrackPoint::new(lat.parse().ok()?, lon.parse().ok()?, 0))
    }

    #[tokio::test]
    async fn test_first_fix_skips_noise() {
        let mut reader = BufReader::new(&b"hello\n\n48.1,11.5\n49.0,12.0\n"[..]);
        let point = first_fix(&mut reader, parse_pair, Duration::from_secs(1)).await;
        assert_eq!(point, Some(TrackPoint::new(48.1, 11.5, 0)));
    }

    #[tokio::test]
    async fn test_first_fix_eof() {
        let mut reader = BufReader::new(&b"garbage\n"[..]);
        assert!(first_fix(&mut reader, parse_pair, Duration::from_secs(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_reader_forwards_fixes() {
        let reader = BufReader::new(&b"1.0,2.0\nnoise\n3.0,4.0\n"[..]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_fix_reader(reader, "test", parse_pair, tx).await.unwrap();

        assert_eq!(rx.recv().await, Some(TrackPoint::new(1.0, 2.0, 0)));
        assert_eq!(rx.recv().await, Some(TrackPoint::new(3.0, 4.0, 0)));
        assert_eq!(rx.recv().await, None);
    }
}
