//! # Relay Frame Encoder
//!
//! Encodes a combined record into the comma-separated line sent to the
//! downstream relay.
//!
//! ```text
//! bus_hum,bus_temp,bus_press,bus_alt,line_hum,line_temp,line_press,line_wind\n
//! ```
//!
//! Absent values are empty fields, the same rendering the CSV log uses.

use crate::record::{render_value, CombinedRecord};

/// Number of values in a relay frame
pub const RELAY_FIELD_COUNT: usize = 8;

/// Field separator
pub const RELAY_SEPARATOR: char = ',';

/// Frame terminator
pub const RELAY_TERMINATOR: &str = "\n";

/// Encode a record's eight values, without terminator
///
/// # Examples
///
/// ```
/// use sensor_bridge::record::{CombinedRecord, LineReading, RawBusReading};
/// use sensor_bridge::relay::encoder::encode_record;
///
/// let line = LineReading { wind_speed_ms: Some(0.06), ..LineReading::absent() };
/// let record = CombinedRecord::now(RawBusReading::absent(), line);
/// assert_eq!(encode_record(&record), ",,,,,,,0.06");
/// ```
pub fn encode_record(record: &CombinedRecord) -> String {
    record
        .values()
        .iter()
        .map(|v| render_value(*v))
        .collect::<Vec<_>>()
        .join(&RELAY_SEPARATOR.to_string())
}

/// Encode a record as a complete newline-terminated frame
pub fn encode_frame(record: &CombinedRecord) -> Vec<u8> {
    let mut frame = encode_record(record);
    frame.push_str(RELAY_TERMINATOR);
    frame.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{LineReading, RawBusReading};

    fn full_record() -> CombinedRecord {
        let bus = RawBusReading {
            humidity_pct: Some(50.0),
            temperature_c: Some(26.0),
            pressure_mbar: Some(1009.01),
            temperature2_c: Some(22.05),
            altitude_m: Some(123.45),
        };
        let line = LineReading {
            temperature_c: Some(22.05),
            humidity_pct: Some(50.23),
            pressure_mbar: Some(1009.01),
            wind_speed_ms: Some(0.06),
        };
        CombinedRecord::now(bus, line)
    }

    fn decode(encoded: &str) -> Vec<Option<f64>> {
        encoded
            .split(RELAY_SEPARATOR)
            .map(|field| {
                if field.is_empty() {
                    None
                } else {
                    Some(field.parse::<f64>().unwrap())
                }
            })
            .collect()
    }

    #[test]
    fn test_encode_field_order() {
        assert_eq!(
            encode_record(&full_record()),
            "50,26,1009.01,123.45,50.23,22.05,1009.01,0.06"
        );
    }

    #[test]
    fn test_secondary_bus_temperature_not_relayed() {
        let encoded = encode_record(&full_record());
        assert_eq!(encoded.split(RELAY_SEPARATOR).count(), RELAY_FIELD_COUNT);
    }

    #[test]
    fn test_encode_all_absent() {
        let record = CombinedRecord::now(RawBusReading::absent(), LineReading::absent());
        assert_eq!(encode_record(&record), ",,,,,,,");
    }

    #[test]
    fn test_split_recovers_values() {
        let record = full_record();
        assert_eq!(decode(&encode_record(&record)), record.values().to_vec());
    }

    #[test]
    fn test_split_recovers_values_with_absent_fields() {
        let bus = RawBusReading {
            pressure_mbar: Some(1013.25),
            ..RawBusReading::absent()
        };
        let line = LineReading {
            temperature_c: Some(-3.5),
            ..LineReading::absent()
        };
        let record = CombinedRecord::now(bus, line);

        let decoded = decode(&encode_record(&record));
        assert_eq!(decoded.len(), RELAY_FIELD_COUNT);
        assert_eq!(decoded, record.values().to_vec());
    }

    #[test]
    fn test_encode_frame_terminated() {
        let frame = encode_frame(&full_record());
        assert_eq!(frame.last(), Some(&b'\n'));
        assert_eq!(frame.iter().filter(|&&b| b == b'\n').count(), 1);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let record = full_record();
        assert_eq!(encode_frame(&record), encode_frame(&record.clone()));
    }
}
