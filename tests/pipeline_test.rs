use chrono::NaiveDate;
use ndarray::Array2;
use std::io::Cursor;

use weathercast::{
    ForecastError, PipelineConfig, WeatherTable, CHANNELS, NUM_CHANNELS,
};

/// Build an in-memory table with hourly timestamps. `temperature(i)` sets
/// the Temperature channel; every other channel is held constant.
fn synthetic_table(rows: usize, temperature: impl Fn(usize) -> f64) -> WeatherTable {
    let base = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let timestamps = (0..rows)
        .map(|i| base + chrono::Duration::hours(i as i64))
        .collect();

    let constants = [0.0, 12.0, 55.0, 1013.0, 3.5, 8.0];
    let values = Array2::from_shape_fn((rows, NUM_CHANNELS), |(i, c)| {
        if c == 0 {
            temperature(i)
        } else {
            constants[c]
        }
    });

    WeatherTable { timestamps, values }
}

#[test]
fn test_end_to_end_linear_trend() {
    // 200 rows, Temperature rising linearly, everything else constant.
    let table = synthetic_table(200, |i| 10.0 + 0.1 * i as f64);
    let config = PipelineConfig {
        sequence_length: 24,
        max_epochs: 100,
        batch_size: 16,
    };

    let report = weathercast::run(&table, &config).unwrap();

    assert!(report.evaluation.is_finite());
    assert!(report.training.epochs_run >= 1);
    assert!(report.training.epochs_run <= config.max_epochs);
    assert!(report.training.best_validation_loss.is_finite());

    // 200 rows and L=24 give 176 samples; 20% of those are the test split.
    assert_eq!(report.evaluation.actual.nrows(), 35);
    assert_eq!(report.evaluation.actual.ncols(), NUM_CHANNELS);

    // The model must track the held-out linear trend, not just the mean.
    assert!(
        report.evaluation.mae < 0.5,
        "MAE {} too high for the linear trend",
        report.evaluation.mae
    );
}

#[test]
fn test_constant_channels_restored_exactly() {
    // Zero-variance channels pass through scaling untouched: the inverse
    // maps any prediction back to the fitted constant, so the evaluation
    // must report them in exact physical units.
    let table = synthetic_table(120, |i| (i as f64 * 0.3).sin() * 5.0 + 15.0);
    let config = PipelineConfig {
        sequence_length: 12,
        max_epochs: 5,
        batch_size: 16,
    };

    let report = weathercast::run(&table, &config).unwrap();

    let (actual, predicted) = report.evaluation.channel_series("Wind Gust").unwrap();
    assert!(actual.iter().all(|&v| v == 12.0));
    assert!(predicted.iter().all(|&v| v == 12.0));
}

#[test]
fn test_channel_series_for_designated_channel() {
    let table = synthetic_table(120, |i| 10.0 + 0.05 * i as f64);
    let config = PipelineConfig {
        sequence_length: 12,
        max_epochs: 3,
        batch_size: 16,
    };

    let report = weathercast::run(&table, &config).unwrap();
    let (actual, predicted) = report.evaluation.channel_series("Temperature").unwrap();
    assert_eq!(actual.len(), predicted.len());
    assert_eq!(actual.len(), report.evaluation.actual.nrows());
}

#[test]
fn test_insufficient_rows_fail_before_training() {
    let table = synthetic_table(20, |i| i as f64);
    let config = PipelineConfig {
        sequence_length: 24,
        ..PipelineConfig::default()
    };

    match weathercast::run(&table, &config) {
        Err(ForecastError::InsufficientData {
            rows,
            sequence_length,
        }) => {
            assert_eq!(rows, 20);
            assert_eq!(sequence_length, 24);
        }
        other => panic!("expected InsufficientData, got {other:?}"),
    }
}

#[test]
fn test_out_of_range_config_rejected() {
    let table = synthetic_table(100, |i| i as f64);

    let config = PipelineConfig {
        sequence_length: 0,
        ..PipelineConfig::default()
    };
    assert!(matches!(
        weathercast::run(&table, &config),
        Err(ForecastError::InvalidConfig(_))
    ));

    let config = PipelineConfig {
        max_epochs: 0,
        ..PipelineConfig::default()
    };
    assert!(matches!(
        weathercast::run(&table, &config),
        Err(ForecastError::InvalidConfig(_))
    ));
}

#[test]
fn test_missing_column_is_fatal_before_any_processing() {
    // "Soil Temperature" absent: the loader must fail naming that column,
    // without producing a table for any later stage to touch.
    let mut header: Vec<&str> = vec!["Timestamp"];
    header.extend(CHANNELS.iter().filter(|c| **c != "Soil Temperature"));
    let csv = format!("{}\n2024-01-01T00:00,1.0,2.0,3.0,4.0,5.0\n", header.join(","));

    match WeatherTable::from_reader(Cursor::new(csv)) {
        Err(ForecastError::MissingColumn(name)) => assert_eq!(name, "Soil Temperature"),
        other => panic!("expected MissingColumn, got {other:?}"),
    }
}

#[test]
fn test_forward_fill_feeds_the_pipeline() {
    // One interior gap in Wind Gust: after preprocessing the cell equals
    // the preceding row's value exactly, and the pipeline runs on it.
    let mut csv = String::from(
        "Timestamp,Temperature,Wind Gust,Cloud Cover Total,\
         Mean Sea Level Pressure,Evapotranspiration,Soil Temperature\n",
    );
    for i in 0..60 {
        let gust = if i == 30 {
            String::new()
        } else {
            format!("{:.1}", 10.0 + (i % 7) as f64)
        };
        csv.push_str(&format!(
            "2024-01-{:02}T{:02}:00,{:.1},{},50.0,1010.0,2.0,7.0\n",
            1 + i / 24,
            i % 24,
            5.0 + i as f64 * 0.2,
            gust
        ));
    }

    let table = WeatherTable::from_reader(Cursor::new(csv)).unwrap();
    assert_eq!(table.values[[30, 1]], table.values[[29, 1]]);

    let config = PipelineConfig {
        sequence_length: 8,
        max_epochs: 2,
        batch_size: 8,
    };
    let report = weathercast::run(&table, &config).unwrap();
    assert!(report.evaluation.is_finite());
}

#[test]
fn test_scaler_is_shared_across_partitions() {
    // The evaluation's actual values must be exact originals, which only
    // holds when the inverse uses the scaler fitted on the full table.
    let table = synthetic_table(100, |i| -5.0 + 0.25 * i as f64);
    let config = PipelineConfig {
        sequence_length: 10,
        max_epochs: 2,
        batch_size: 16,
    };

    let report = weathercast::run(&table, &config).unwrap();
    let (actual, _) = report.evaluation.channel_series("Temperature").unwrap();

    // Every actual value is one of the original readings.
    for value in actual {
        let offset = (value + 5.0) / 0.25;
        assert!((offset - offset.round()).abs() < 1e-6);
        assert!((0.0..100.0).contains(&offset));
    }
}
