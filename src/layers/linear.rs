use ndarray::{Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use crate::optimizers::Optimizer;

/// Holds gradients for linear layer parameters during backpropagation.
#[derive(Clone, Debug)]
pub struct LinearGradients {
    pub weight: Array2<f64>,
    pub bias: Array2<f64>,
}

/// A fully connected layer: output = weight · input + bias.
///
/// `weight` has shape (output_size, input_size), `bias` (output_size, 1);
/// inputs and outputs are (features, batch) matrices. The forward pass
/// caches its input for the backward pass.
#[derive(Clone, Debug)]
pub struct LinearLayer {
    pub weight: Array2<f64>,
    pub bias: Array2<f64>,
    pub input_size: usize,
    pub output_size: usize,
    input_cache: Option<Array2<f64>>,
}

impl LinearLayer {
    /// Create a new linear layer with Xavier/Glorot initialization.
    pub fn new(input_size: usize, output_size: usize) -> Self {
        let scale = (2.0 / (input_size + output_size) as f64).sqrt();
        let weight = Array2::random((output_size, input_size), Uniform::new(-scale, scale));
        let bias = Array2::zeros((output_size, 1));

        Self {
            weight,
            bias,
            input_size,
            output_size,
            input_cache: None,
        }
    }

    /// Forward pass; input is (input_size, batch).
    pub fn forward(&mut self, input: &Array2<f64>) -> Array2<f64> {
        debug_assert_eq!(input.nrows(), self.input_size);
        self.input_cache = Some(input.clone());
        // Bias broadcasts over the batch axis.
        &self.weight.dot(input) + &self.bias
    }

    /// Backward pass using the cached input.
    ///
    /// Returns (parameter gradients, gradient w.r.t. the input).
    pub fn backward(&self, grad_output: &Array2<f64>) -> (LinearGradients, Array2<f64>) {
        let input = self
            .input_cache
            .as_ref()
            .expect("backward called before forward");

        let weight_grad = grad_output.dot(&input.t());
        let bias_grad = grad_output.sum_axis(Axis(1)).insert_axis(Axis(1));
        let input_grad = self.weight.t().dot(grad_output);

        (
            LinearGradients {
                weight: weight_grad,
                bias: bias_grad,
            },
            input_grad,
        )
    }

    /// Update parameters using the provided optimizer.
    pub fn update_parameters<O: Optimizer>(
        &mut self,
        gradients: &LinearGradients,
        optimizer: &mut O,
        prefix: &str,
    ) {
        optimizer.update(&format!("{}_weight", prefix), &mut self.weight, &gradients.weight);
        optimizer.update(&format!("{}_bias", prefix), &mut self.bias, &gradients.bias);
    }
}
