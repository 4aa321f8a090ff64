use ndarray::{Array2, Axis};

use crate::optimizers::Optimizer;

/// Gradients for the learnable batch-norm parameters.
#[derive(Clone, Debug)]
pub struct BatchNormGradients {
    pub gamma: Array2<f64>,
    pub beta: Array2<f64>,
}

/// Values cached during a training-mode forward pass.
#[derive(Clone)]
pub struct BatchNormCache {
    /// Normalized input before the affine transform, (features, batch).
    pub x_hat: Array2<f64>,
    /// 1 / sqrt(var + eps) per feature, (features, 1).
    pub inv_std: Array2<f64>,
}

/// Batch normalization over the batch axis of (features, batch) activations.
///
/// Training mode normalizes with the current mini-batch statistics and
/// updates exponential running estimates; evaluation mode normalizes with
/// the running estimates so single samples behave deterministically.
#[derive(Clone)]
pub struct BatchNorm {
    pub gamma: Array2<f64>,        // (features, 1), learnable scale
    pub beta: Array2<f64>,         // (features, 1), learnable shift
    pub running_mean: Array2<f64>, // (features, 1)
    pub running_var: Array2<f64>,  // (features, 1)
    pub num_features: usize,
    pub is_training: bool,
    momentum: f64,
    epsilon: f64,
}

impl BatchNorm {
    pub fn new(num_features: usize) -> Self {
        BatchNorm {
            gamma: Array2::ones((num_features, 1)),
            beta: Array2::zeros((num_features, 1)),
            running_mean: Array2::zeros((num_features, 1)),
            running_var: Array2::ones((num_features, 1)),
            num_features,
            is_training: true,
            momentum: 0.9,
            epsilon: 1e-5,
        }
    }

    pub fn train(&mut self) {
        self.is_training = true;
    }

    pub fn eval(&mut self) {
        self.is_training = false;
    }

    /// Forward pass returning the cache needed for the backward pass.
    pub fn forward_with_cache(&mut self, input: &Array2<f64>) -> (Array2<f64>, BatchNormCache) {
        let (mean, var) = if self.is_training {
            let batch = input.ncols() as f64;
            let mean = input
                .sum_axis(Axis(1))
                .insert_axis(Axis(1))
                .mapv(|x| x / batch);
            let centered = input - &mean;
            let var = (&centered * &centered)
                .sum_axis(Axis(1))
                .insert_axis(Axis(1))
                .mapv(|x| x / batch);

            self.running_mean = self.momentum * &self.running_mean + (1.0 - self.momentum) * &mean;
            self.running_var = self.momentum * &self.running_var + (1.0 - self.momentum) * &var;

            (mean, var)
        } else {
            (self.running_mean.clone(), self.running_var.clone())
        };

        let inv_std = var.mapv(|v| 1.0 / (v + self.epsilon).sqrt());
        let x_hat = (input - &mean) * &inv_std;
        let output = &x_hat * &self.gamma + &self.beta;

        let cache = BatchNormCache { x_hat, inv_std };
        (output, cache)
    }

    /// Backward pass for a training-mode forward.
    ///
    /// Returns parameter gradients and the gradient w.r.t. the input.
    pub fn backward(
        &self,
        grad_output: &Array2<f64>,
        cache: &BatchNormCache,
    ) -> (BatchNormGradients, Array2<f64>) {
        let batch = grad_output.ncols() as f64;

        let dgamma = (grad_output * &cache.x_hat)
            .sum_axis(Axis(1))
            .insert_axis(Axis(1));
        let dbeta = grad_output.sum_axis(Axis(1)).insert_axis(Axis(1));

        // dx = gamma * inv_std / B * (B*dy - sum(dy) - x_hat * sum(dy * x_hat))
        let term = grad_output * batch - &dbeta - &cache.x_hat * &dgamma;
        let scale = &self.gamma * &cache.inv_std / batch;
        let dx = term * &scale;

        let gradients = BatchNormGradients {
            gamma: dgamma,
            beta: dbeta,
        };
        (gradients, dx)
    }

    /// Apply gradients using the provided optimizer.
    pub fn update_parameters<O: Optimizer>(
        &mut self,
        gradients: &BatchNormGradients,
        optimizer: &mut O,
        prefix: &str,
    ) {
        optimizer.update(&format!("{}_gamma", prefix), &mut self.gamma, &gradients.gamma);
        optimizer.update(&format!("{}_beta", prefix), &mut self.beta, &gradients.beta);
    }
}
