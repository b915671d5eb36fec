//! Meter list compression: JSON, then gzip, then standard base64.

use std::io::{self, Read, Write};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::sim::types::MeterState;

/// Encodes a meter list as base64(gzip(JSON)).
///
/// # Errors
///
/// Returns an `io::Error` if serialization or compression fails.
pub fn compress_meters(meters: &[MeterState]) -> io::Result<String> {
    let json = serde_json::to_vec(meters)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    let bytes = encoder.finish()?;
    Ok(STANDARD.encode(bytes))
}

/// Reverses [`compress_meters`].
///
/// # Errors
///
/// Returns an `io::Error` of kind `InvalidData` for bad base64, gzip, or JSON.
pub fn decompress_meters(blob: &str) -> io::Result<Vec<MeterState>> {
    let bytes = STANDARD
        .decode(blob)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut json = Vec::new();
    GzDecoder::new(bytes.as_slice()).read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}
