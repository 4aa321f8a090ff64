use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info};
use ndarray::Array2;

use crate::config::{CHANNELS, NUM_CHANNELS};
use crate::error::ForecastError;

/// Timestamp formats accepted in the input table, tried in order.
const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M",
];

/// Header names recognized as the timestamp column (case-insensitive).
const TIMESTAMP_HEADERS: [&str; 4] = ["timestamp", "time", "date", "datetime"];

/// A clean, ordered weather series over the six required channels.
///
/// Invariants after construction: rows sorted by timestamp ascending, every
/// channel present in [`CHANNELS`] order, no missing values remain.
#[derive(Debug, Clone)]
pub struct WeatherTable {
    pub timestamps: Vec<NaiveDateTime>,
    /// (rows, channels), channel order matching [`CHANNELS`].
    pub values: Array2<f64>,
}

impl WeatherTable {
    /// Load a CSV file from disk. See [`from_reader`](Self::from_reader).
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self, ForecastError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Parse a CSV table into a [`WeatherTable`].
    ///
    /// The table must carry a timestamp-like column and the six channels
    /// named in [`CHANNELS`]; any other columns are dropped. Schema errors
    /// are reported before any row is processed, naming the offending
    /// column. Missing or unparseable numeric cells are carried forward from
    /// the last valid observation; a leading gap with nothing to fill from
    /// is fatal.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ForecastError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();

        let timestamp_idx = headers
            .iter()
            .position(|h| {
                TIMESTAMP_HEADERS
                    .iter()
                    .any(|name| h.eq_ignore_ascii_case(name))
            })
            .ok_or(ForecastError::MissingTimestampColumn)?;

        let mut channel_indices = [0usize; NUM_CHANNELS];
        for (c, channel) in CHANNELS.iter().enumerate() {
            channel_indices[c] = headers
                .iter()
                .position(|h| h == *channel)
                .ok_or_else(|| ForecastError::MissingColumn(channel.to_string()))?;
        }

        let mut rows: Vec<(NaiveDateTime, [Option<f64>; NUM_CHANNELS])> = Vec::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            let raw_timestamp = record.get(timestamp_idx).unwrap_or("");
            let timestamp =
                parse_timestamp(raw_timestamp).ok_or_else(|| ForecastError::BadTimestamp {
                    row: line + 1,
                    value: raw_timestamp.to_string(),
                })?;

            let mut observation = [None; NUM_CHANNELS];
            for (c, &idx) in channel_indices.iter().enumerate() {
                observation[c] = record.get(idx).and_then(parse_cell);
            }
            rows.push((timestamp, observation));
        }

        rows.sort_by_key(|(timestamp, _)| *timestamp);

        let values = forward_fill(&rows)?;
        let timestamps = rows.into_iter().map(|(timestamp, _)| timestamp).collect();

        let table = WeatherTable { timestamps, values };
        info!(
            "loaded weather table: {} rows x {} channels",
            table.values.nrows(),
            NUM_CHANNELS
        );
        Ok(table)
    }

    pub fn num_rows(&self) -> usize {
        self.values.nrows()
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(timestamp);
        }
    }
    // Date-only inputs resolve to midnight.
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Empty and unparseable cells are missing; pandas-style coerce-then-fill.
fn parse_cell(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Carry the last valid observation forward in time, per channel.
///
/// No backward fill and no interpolation; a leading missing value has
/// nothing to fill from and violates the no-missing-values invariant.
fn forward_fill(
    rows: &[(NaiveDateTime, [Option<f64>; NUM_CHANNELS])],
) -> Result<Array2<f64>, ForecastError> {
    let mut values = Array2::zeros((rows.len(), NUM_CHANNELS));
    let mut last_valid: [Option<f64>; NUM_CHANNELS] = [None; NUM_CHANNELS];
    let mut filled = 0usize;

    for (i, (_, observation)) in rows.iter().enumerate() {
        for c in 0..NUM_CHANNELS {
            let value = match observation[c] {
                Some(value) => {
                    last_valid[c] = Some(value);
                    value
                }
                None => {
                    filled += 1;
                    last_valid[c].ok_or_else(|| ForecastError::LeadingGap {
                        column: CHANNELS[c].to_string(),
                    })?
                }
            };
            values[[i, c]] = value;
        }
    }

    if filled > 0 {
        debug!("forward-filled {} missing cells", filled);
    }
    Ok(values)
}
