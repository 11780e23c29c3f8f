//! Decoder for the encoded polyline format used by the directions API:
//! zig-zag signed deltas at 1e5 precision, packed in 5-bit chunks offset by 63.

use crate::error::AppError;
use crate::models::driver::Coordinate;

const PRECISION: f64 = 1e5;

pub fn decode(encoded: &str) -> Result<Vec<Coordinate>, AppError> {
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;
    let mut points = Vec::new();

    while index < bytes.len() {
        lat += next_delta(bytes, &mut index)?;
        lng += next_delta(bytes, &mut index)?;

        points.push(Coordinate::new(
            lat as f64 / PRECISION,
            lng as f64 / PRECISION,
        )?);
    }

    Ok(points)
}

fn next_delta(bytes: &[u8], index: &mut usize) -> Result<i64, AppError> {
    let mut result: i64 = 0;
    let mut shift = 0;

    loop {
        let byte = *bytes
            .get(*index)
            .ok_or_else(|| AppError::Routing("truncated polyline".to_string()))?;
        *index += 1;

        if !(63..=126).contains(&byte) {
            return Err(AppError::Routing(format!(
                "invalid polyline character at offset {}",
                *index - 1
            )));
        }
        if shift > 60 {
            return Err(AppError::Routing("polyline value overflow".to_string()));
        }

        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;

        if chunk < 0x20 {
            break;
        }
    }

    Ok(if result & 1 == 1 { !(result >> 1) } else { result >> 1 })
}
