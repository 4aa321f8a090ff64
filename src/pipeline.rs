use log::info;
use serde::Serialize;

use crate::config::{
    PipelineConfig, DENSE_SIZE, DROPOUT_RATE, HIDDEN_SIZE_1, HIDDEN_SIZE_2, NUM_CHANNELS,
    SPLIT_FRACTION, SPLIT_SEED,
};
use crate::data::WeatherTable;
use crate::error::ForecastError;
use crate::evaluate::{evaluate, EvaluationReport};
use crate::model::network::ForecastNetwork;
use crate::model::trainer::{create_trainer, TrainingReport};
use crate::scaler::MinMaxScaler;
use crate::split::{split, SplitPolicy};
use crate::windowing::make_windows;

/// Everything a single run produces.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub training: TrainingReport,
    pub evaluation: EvaluationReport,
}

/// Run the full pipeline: scale, window, split, train, evaluate.
///
/// The scaler is fitted exactly once over the whole table before any split,
/// and the same instance maps the test results back to physical units. The
/// table, scaler, windows and model are owned by this run and dropped at
/// its end; nothing is persisted.
pub fn run(table: &WeatherTable, config: &PipelineConfig) -> Result<RunReport, ForecastError> {
    config.validate()?;

    info!(
        "starting run: {} rows, sequence length {}",
        table.num_rows(),
        config.sequence_length
    );

    let (scaler, scaled) = MinMaxScaler::fit_transform(&table.values);
    let samples = make_windows(&scaled, config.sequence_length)?;
    info!("created {} window samples", samples.len());

    let sets = split(
        samples,
        SPLIT_FRACTION,
        SplitPolicy::Random { seed: SPLIT_SEED },
    )?;

    let network = ForecastNetwork::new(
        NUM_CHANNELS,
        HIDDEN_SIZE_1,
        HIDDEN_SIZE_2,
        DENSE_SIZE,
        DROPOUT_RATE,
    );
    let mut trainer = create_trainer(network);
    let training = trainer.train(
        &sets.train,
        &sets.validation,
        config.max_epochs,
        config.batch_size,
    )?;

    let mut network = trainer.into_network();
    let evaluation = evaluate(&mut network, &sets.test, &scaler, config.batch_size);

    if !evaluation.is_finite() {
        return Err(ForecastError::TrainingDiverged {
            epoch: training.epochs_run,
            loss: f64::NAN,
        });
    }

    info!(
        "run complete: MAE {:.4}, RMSE {:.4}, R² {:.4}",
        evaluation.mae, evaluation.rmse, evaluation.r2
    );

    Ok(RunReport {
        training,
        evaluation,
    })
}
