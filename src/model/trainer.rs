use log::{debug, info};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use crate::config::{CLIP_NORM, LEARNING_RATE, MIN_DELTA, PATIENCE, SPLIT_SEED};
use crate::error::ForecastError;
use crate::loss::{LossFunction, MSELoss};
use crate::model::network::ForecastNetwork;
use crate::optimizers::{Adam, Optimizer};
use crate::windowing::WindowSample;

/// A mini-batch in the network's timestep-major layout.
pub struct Batch {
    /// One (channels, batch) matrix per time step.
    pub steps: Vec<Array2<f64>>,
    /// (channels, batch) targets.
    pub targets: Array2<f64>,
}

/// Assemble the samples at `indices` into one batch.
pub fn collate(samples: &[WindowSample], indices: &[usize]) -> Batch {
    let batch = indices.len();
    let sequence_length = samples[indices[0]].input.nrows();
    let channels = samples[indices[0]].input.ncols();

    let mut steps = vec![Array2::zeros((channels, batch)); sequence_length];
    let mut targets = Array2::zeros((channels, batch));

    for (b, &idx) in indices.iter().enumerate() {
        let sample = &samples[idx];
        for t in 0..sequence_length {
            for c in 0..channels {
                steps[t][[c, b]] = sample.input[[t, c]];
            }
        }
        for c in 0..channels {
            targets[[c, b]] = sample.target[c];
        }
    }

    Batch { steps, targets }
}

/// Loss figures recorded after each epoch.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub validation_loss: f64,
}

/// Outcome of a completed training run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub epochs_run: usize,
    pub best_epoch: usize,
    pub best_validation_loss: f64,
    pub stopped_early: bool,
    pub history: Vec<TrainingMetrics>,
}

/// Tracks validation loss across epochs and decides when to stop.
///
/// An epoch counts as an improvement only if its validation loss undercuts
/// the best seen by more than `min_delta`; `patience` consecutive
/// non-improving epochs trigger the stop.
pub struct EarlyStopper {
    patience: usize,
    min_delta: f64,
    best_loss: f64,
    best_epoch: usize,
    stale_epochs: usize,
}

/// What the stopper concluded about the latest epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDecision {
    /// New best validation loss; snapshot the weights.
    Improved,
    /// No improvement yet, keep training.
    Wait,
    /// Patience exhausted, stop and restore the best snapshot.
    Stop,
}

impl EarlyStopper {
    pub fn new(patience: usize, min_delta: f64) -> Self {
        EarlyStopper {
            patience,
            min_delta,
            best_loss: f64::INFINITY,
            best_epoch: 0,
            stale_epochs: 0,
        }
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    pub fn best_epoch(&self) -> usize {
        self.best_epoch
    }

    pub fn observe(&mut self, epoch: usize, validation_loss: f64) -> StopDecision {
        if validation_loss < self.best_loss - self.min_delta {
            self.best_loss = validation_loss;
            self.best_epoch = epoch;
            self.stale_epochs = 0;
            return StopDecision::Improved;
        }

        self.stale_epochs += 1;
        if self.stale_epochs >= self.patience {
            StopDecision::Stop
        } else {
            StopDecision::Wait
        }
    }
}

/// Mini-batch trainer with early stopping and best-weights restoration.
pub struct Trainer<L: LossFunction, O: Optimizer> {
    network: ForecastNetwork,
    loss_function: L,
    optimizer: O,
}

/// Create the pipeline's trainer: MSE loss, Adam at the fixed learning rate.
pub fn create_trainer(network: ForecastNetwork) -> Trainer<MSELoss, Adam> {
    Trainer::new(network, MSELoss, Adam::new(LEARNING_RATE))
}

impl<L: LossFunction, O: Optimizer> Trainer<L, O> {
    pub fn new(network: ForecastNetwork, loss_function: L, optimizer: O) -> Self {
        Trainer {
            network,
            loss_function,
            optimizer,
        }
    }

    /// Give up the trainer and keep the trained network.
    pub fn into_network(self) -> ForecastNetwork {
        self.network
    }

    /// Train for up to `max_epochs`, validating after each epoch.
    ///
    /// The live network and the best-validated snapshot are kept as two
    /// distinct values; the snapshot replaces the live weights only once
    /// training completes. Non-finite losses abort the run.
    pub fn train(
        &mut self,
        train: &[WindowSample],
        validation: &[WindowSample],
        max_epochs: usize,
        batch_size: usize,
    ) -> Result<TrainingReport, ForecastError> {
        let mut stopper = EarlyStopper::new(PATIENCE, MIN_DELTA);
        let mut best_snapshot: Option<ForecastNetwork> = None;
        let mut history = Vec::new();
        let mut stopped_early = false;

        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut rng = StdRng::seed_from_u64(SPLIT_SEED);

        info!(
            "training on {} samples, validating on {} ({} epochs max, batch size {})",
            train.len(),
            validation.len(),
            max_epochs,
            batch_size
        );

        let mut epochs_run = 0;
        for epoch in 0..max_epochs {
            epochs_run = epoch + 1;
            self.network.train();
            order.shuffle(&mut rng);

            let mut epoch_loss = 0.0;
            let mut seen = 0usize;
            for chunk in order.chunks(batch_size) {
                let batch = collate(train, chunk);
                let (prediction, cache) = self.network.forward_with_cache(&batch.steps);

                let loss = self.loss_function.compute_loss(&prediction, &batch.targets);
                let dy = self.loss_function.compute_gradient(&prediction, &batch.targets);

                let mut gradients = self.network.backward(&dy, &cache);
                clip_gradients(&mut gradients.matrices_mut(), CLIP_NORM);
                self.network.update_parameters(&gradients, &mut self.optimizer);

                epoch_loss += loss * chunk.len() as f64;
                seen += chunk.len();
            }
            epoch_loss /= seen as f64;

            if !epoch_loss.is_finite() {
                return Err(ForecastError::TrainingDiverged {
                    epoch,
                    loss: epoch_loss,
                });
            }

            self.network.eval();
            let validation_loss = self.validation_loss(validation, batch_size);
            if !validation_loss.is_finite() {
                return Err(ForecastError::TrainingDiverged {
                    epoch,
                    loss: validation_loss,
                });
            }

            debug!(
                "epoch {}: train loss {:.6}, val loss {:.6}",
                epoch, epoch_loss, validation_loss
            );
            history.push(TrainingMetrics {
                epoch,
                train_loss: epoch_loss,
                validation_loss,
            });

            match stopper.observe(epoch, validation_loss) {
                StopDecision::Improved => {
                    best_snapshot = Some(self.network.clone());
                }
                StopDecision::Wait => {}
                StopDecision::Stop => {
                    info!(
                        "early stopping at epoch {} (best val loss {:.6} at epoch {})",
                        epoch,
                        stopper.best_loss(),
                        stopper.best_epoch()
                    );
                    stopped_early = true;
                    break;
                }
            }
        }

        // Swap in the best-validated weights, not the final epoch's.
        if let Some(snapshot) = best_snapshot {
            self.network = snapshot;
        }
        self.network.eval();

        Ok(TrainingReport {
            epochs_run,
            best_epoch: stopper.best_epoch(),
            best_validation_loss: stopper.best_loss(),
            stopped_early,
            history,
        })
    }

    /// Average loss over a sample set, weighted by sample count.
    pub fn validation_loss(&mut self, samples: &[WindowSample], batch_size: usize) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }

        let indices: Vec<usize> = (0..samples.len()).collect();
        let mut total = 0.0;
        for chunk in indices.chunks(batch_size) {
            let batch = collate(samples, chunk);
            let prediction = self.network.predict(&batch.steps);
            total += self.loss_function.compute_loss(&prediction, &batch.targets)
                * chunk.len() as f64;
        }
        total / samples.len() as f64
    }
}

/// Clip each gradient matrix by its Frobenius norm.
fn clip_gradients(matrices: &mut [&mut Array2<f64>], max_norm: f64) {
    for matrix in matrices.iter_mut() {
        let norm = (&**matrix * &**matrix).sum().sqrt();
        if norm > max_norm {
            let scale = max_norm / norm;
            **matrix = matrix.map(|x| x * scale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    fn ramp_samples(n: usize, sequence_length: usize) -> Vec<WindowSample> {
        // Scaled linear ramp over 2 channels.
        (0..n)
            .map(|i| {
                let input = Array2::from_shape_fn((sequence_length, 2), |(t, _)| {
                    (i + t) as f64 / (n + sequence_length) as f64
                });
                let value = (i + sequence_length) as f64 / (n + sequence_length) as f64;
                WindowSample {
                    input,
                    target: arr1(&[value, value]),
                }
            })
            .collect()
    }

    fn small_network() -> ForecastNetwork {
        ForecastNetwork::new(2, 8, 8, 4, 0.0)
    }

    #[test]
    fn test_collate_layout() {
        let samples = ramp_samples(4, 3);
        let batch = collate(&samples, &[0, 2]);

        assert_eq!(batch.steps.len(), 3);
        assert_eq!(batch.steps[0].shape(), &[2, 2]);
        assert_eq!(batch.targets.shape(), &[2, 2]);
        // Column b of step t is sample indices[b]'s row t.
        assert_eq!(batch.steps[1][[0, 1]], samples[2].input[[1, 0]]);
        assert_eq!(batch.targets[[0, 1]], samples[2].target[0]);
    }

    #[test]
    fn test_training_reduces_loss() {
        let samples = ramp_samples(40, 6);
        let validation = ramp_samples(10, 6);
        let mut trainer = create_trainer(small_network());

        let report = trainer.train(&samples, &validation, 30, 8).unwrap();

        assert!(report.epochs_run >= 1);
        let first = report.history.first().unwrap().train_loss;
        let best = report.best_validation_loss;
        assert!(best.is_finite());
        assert!(best <= first + 1e-9);
    }

    #[test]
    fn test_nan_targets_surface_as_divergence() {
        let mut samples = ramp_samples(20, 4);
        samples[0].target[0] = f64::NAN;
        let validation = ramp_samples(5, 4);
        let mut trainer = create_trainer(small_network());

        match trainer.train(&samples, &validation, 5, 4) {
            Err(ForecastError::TrainingDiverged { epoch, .. }) => assert_eq!(epoch, 0),
            other => panic!("expected TrainingDiverged, got {other:?}"),
        }
    }

    #[test]
    fn test_best_snapshot_restored_after_stopping() {
        let train = ramp_samples(24, 4);
        // Validation targets disagree with the ramp, so validation loss
        // plateaus long before training does and patience runs out.
        let mut validation = ramp_samples(8, 4);
        for sample in &mut validation {
            sample.target.fill(0.3);
        }

        let mut trainer = create_trainer(small_network());
        let report = trainer.train(&train, &validation, 200, 8).unwrap();

        assert!(report.stopped_early);
        assert!(report.best_epoch + 1 < report.epochs_run);

        // The returned network carries the snapshot from the best epoch:
        // scoring it again reproduces the best validation loss, not the
        // final epoch's.
        let recomputed = trainer.validation_loss(&validation, 8);
        assert!((recomputed - report.best_validation_loss).abs() < 1e-9);
        let last = report.history.last().unwrap().validation_loss;
        assert!(recomputed <= last + 1e-9);
    }

    #[test]
    fn test_early_stopper_improvement_tracking() {
        let mut stopper = EarlyStopper::new(3, 1e-6);

        assert_eq!(stopper.observe(0, 1.0), StopDecision::Improved);
        assert_eq!(stopper.observe(1, 0.5), StopDecision::Improved);
        assert_eq!(stopper.observe(2, 0.6), StopDecision::Wait);
        assert_eq!(stopper.observe(3, 0.55), StopDecision::Wait);
        assert_eq!(stopper.observe(4, 0.51), StopDecision::Stop);

        assert_eq!(stopper.best_epoch(), 1);
        assert_eq!(stopper.best_loss(), 0.5);
    }

    #[test]
    fn test_early_stopper_min_delta() {
        let mut stopper = EarlyStopper::new(2, 0.1);

        assert_eq!(stopper.observe(0, 1.0), StopDecision::Improved);
        // 0.05 better than best, below min_delta: not an improvement.
        assert_eq!(stopper.observe(1, 0.95), StopDecision::Wait);
        assert_eq!(stopper.observe(2, 0.92), StopDecision::Stop);
        assert_eq!(stopper.best_loss(), 1.0);
    }

    #[test]
    fn test_clip_gradients_by_norm() {
        let mut big = Array2::from_elem((3, 3), 10.0);
        let mut small = Array2::from_elem((2, 2), 0.01);
        clip_gradients(&mut [&mut big, &mut small], 5.0);

        let big_norm = (&big * &big).sum().sqrt();
        assert!((big_norm - 5.0).abs() < 1e-9);
        assert_eq!(small[[0, 0]], 0.01); // untouched below the threshold
    }
}
