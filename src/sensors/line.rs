//! # Anemometer Line Parser
//!
//! Parses one ASCII line from the ultrasonic anemometer:
//!
//! ```text
//! S 00.06 D 187 U 00.01 V 00.06 W 00.00 T 22.05 H 50.23 P 1009.01
//! ```
//!
//! Tokens come in `(label, value)` pairs. `S`, `T`, `H` and `P` are kept,
//! `D` (wind direction) and any other label are skipped with their value.

use tracing::warn;

use crate::record::LineReading;

/// Parse an anemometer line
///
/// Never fails. An empty line yields an all-absent reading. A value that is
/// not a number stops the scan; fields assigned before it are kept. A
/// trailing label without a value is ignored.
///
/// # Examples
///
/// ```
/// use sensor_bridge::sensors::line::parse_line;
///
/// let reading = parse_line("S 00.06 D 187 T 22.05 H 50.23 P 1009.01");
/// assert_eq!(reading.temperature_c, Some(22.05));
/// assert_eq!(reading.wind_speed_ms, Some(0.06));
/// ```
pub fn parse_line(line: &str) -> LineReading {
    let mut reading = LineReading::absent();
    let tokens: Vec<&str> = line.split_whitespace().collect();

    for pair in tokens.chunks_exact(2) {
        let (label, value) = (pair[0], pair[1]);

        let field = match label {
            "S" => &mut reading.wind_speed_ms,
            "T" => &mut reading.temperature_c,
            "H" => &mut reading.humidity_pct,
            "P" => &mut reading.pressure_mbar,
            _ => continue,
        };

        match value.parse::<f64>() {
            Ok(v) => *field = Some(v),
            Err(e) => {
                warn!("Malformed anemometer value {:?} for {}: {} (line: {:?})", value, label, e, line);
                break;
            }
        }
    }

    reading
}
