use ndarray::{s, Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use crate::optimizers::Optimizer;
use crate::utils::sigmoid;

/// Holds gradients for all LSTM cell parameters during backpropagation.
#[derive(Clone)]
pub struct LstmGradients {
    pub w_ih: Array2<f64>,
    pub w_hh: Array2<f64>,
    pub b_ih: Array2<f64>,
    pub b_hh: Array2<f64>,
}

impl LstmGradients {
    /// Accumulate another step's gradients into this one (used across BPTT).
    pub fn accumulate(&mut self, other: &LstmGradients) {
        self.w_ih = &self.w_ih + &other.w_ih;
        self.w_hh = &self.w_hh + &other.w_hh;
        self.b_ih = &self.b_ih + &other.b_ih;
        self.b_hh = &self.b_hh + &other.b_hh;
    }
}

/// Caches intermediate values of one forward step for the backward pass.
#[derive(Clone)]
pub struct LstmCache {
    pub input: Array2<f64>,
    pub hx: Array2<f64>,
    pub cx: Array2<f64>,
    pub input_gate: Array2<f64>,
    pub forget_gate: Array2<f64>,
    pub cell_gate: Array2<f64>,
    pub output_gate: Array2<f64>,
    pub cy: Array2<f64>,
}

/// Batch-aware LSTM cell with trainable parameters.
///
/// Implements the standard LSTM equations:
/// - i_t = σ(W_xi·x_t + W_hi·h_t-1 + b_i)
/// - f_t = σ(W_xf·x_t + W_hf·h_t-1 + b_f)
/// - g_t = tanh(W_xg·x_t + W_hg·h_t-1 + b_g)
/// - o_t = σ(W_xo·x_t + W_ho·h_t-1 + b_o)
/// - c_t = f_t ⊙ c_t-1 + i_t ⊙ g_t
/// - h_t = o_t ⊙ tanh(c_t)
///
/// Inputs are (input_size, batch) matrices; states are (hidden_size, batch).
#[derive(Clone)]
pub struct LstmCell {
    pub w_ih: Array2<f64>, // (4*hidden_size, input_size)
    pub w_hh: Array2<f64>, // (4*hidden_size, hidden_size)
    pub b_ih: Array2<f64>, // (4*hidden_size, 1)
    pub b_hh: Array2<f64>, // (4*hidden_size, 1)
    pub input_size: usize,
    pub hidden_size: usize,
}

impl LstmCell {
    /// Creates a new LSTM cell with uniform weight initialization.
    pub fn new(input_size: usize, hidden_size: usize) -> Self {
        let dist = Uniform::new(-0.1, 0.1);

        LstmCell {
            w_ih: Array2::random((4 * hidden_size, input_size), dist),
            w_hh: Array2::random((4 * hidden_size, hidden_size), dist),
            b_ih: Array2::zeros((4 * hidden_size, 1)),
            b_hh: Array2::zeros((4 * hidden_size, 1)),
            input_size,
            hidden_size,
        }
    }

    /// Zeroed hidden and cell state for a batch of the given width.
    pub fn zero_state(&self, batch: usize) -> (Array2<f64>, Array2<f64>) {
        (
            Array2::zeros((self.hidden_size, batch)),
            Array2::zeros((self.hidden_size, batch)),
        )
    }

    pub fn forward(
        &self,
        input: &Array2<f64>,
        hx: &Array2<f64>,
        cx: &Array2<f64>,
    ) -> (Array2<f64>, Array2<f64>) {
        let (hy, cy, _) = self.forward_with_cache(input, hx, cx);
        (hy, cy)
    }

    /// Forward pass with caching for training.
    pub fn forward_with_cache(
        &self,
        input: &Array2<f64>,
        hx: &Array2<f64>,
        cx: &Array2<f64>,
    ) -> (Array2<f64>, Array2<f64>, LstmCache) {
        let h = self.hidden_size;

        // All four gates in one matrix: [input, forget, cell, output].
        // Biases are (4h, 1) and broadcast over the batch axis.
        let gates = self.w_ih.dot(input) + self.w_hh.dot(hx) + &self.b_ih + &self.b_hh;

        let input_gate = gates.slice(s![0..h, ..]).map(|&x| sigmoid(x));
        let forget_gate = gates.slice(s![h..2 * h, ..]).map(|&x| sigmoid(x));
        let cell_gate = gates.slice(s![2 * h..3 * h, ..]).map(|&x| x.tanh());
        let output_gate = gates.slice(s![3 * h..4 * h, ..]).map(|&x| sigmoid(x));

        let cy = &forget_gate * cx + &input_gate * &cell_gate;
        let hy = &output_gate * cy.map(|&x| x.tanh());

        let cache = LstmCache {
            input: input.clone(),
            hx: hx.clone(),
            cx: cx.clone(),
            input_gate,
            forget_gate,
            cell_gate,
            output_gate,
            cy: cy.clone(),
        };

        (hy, cy, cache)
    }

    /// Backward pass for one time step.
    ///
    /// `dhy`/`dcy` are the losses' gradients w.r.t. this step's hidden and
    /// cell outputs. Returns (parameter gradients, input gradient, previous
    /// hidden gradient, previous cell gradient).
    pub fn backward(
        &self,
        dhy: &Array2<f64>,
        dcy: &Array2<f64>,
        cache: &LstmCache,
    ) -> (LstmGradients, Array2<f64>, Array2<f64>, Array2<f64>) {
        let h = self.hidden_size;

        // Output gate: ∂L/∂o_t = ∂L/∂h_t ⊙ tanh(c_t)
        let tanh_cy = cache.cy.map(|&x| x.tanh());
        let do_t = dhy * &tanh_cy;
        let do_raw = &do_t * &cache.output_gate * cache.output_gate.map(|&x| 1.0 - x);

        // Cell state receives gradient from both the tanh path and dcy.
        let dcy_from_tanh = dhy * &cache.output_gate * cache.cy.map(|&x| 1.0 - x.tanh().powi(2));
        let dcy_total = dcy + dcy_from_tanh;

        // Forget gate: ∂L/∂f_t = ∂L/∂c_t ⊙ c_t-1
        let df_t = &dcy_total * &cache.cx;
        let df_raw = &df_t * &cache.forget_gate * cache.forget_gate.map(|&x| 1.0 - x);

        // Input gate: ∂L/∂i_t = ∂L/∂c_t ⊙ g_t
        let di_t = &dcy_total * &cache.cell_gate;
        let di_raw = &di_t * &cache.input_gate * cache.input_gate.map(|&x| 1.0 - x);

        // Cell gate: ∂L/∂g_t = ∂L/∂c_t ⊙ i_t
        let dg_t = &dcy_total * &cache.input_gate;
        let dg_raw = &dg_t * cache.cell_gate.map(|&x| 1.0 - x.powi(2));

        let batch = dhy.ncols();
        let mut dgates = Array2::zeros((4 * h, batch));
        dgates.slice_mut(s![0..h, ..]).assign(&di_raw);
        dgates.slice_mut(s![h..2 * h, ..]).assign(&df_raw);
        dgates.slice_mut(s![2 * h..3 * h, ..]).assign(&dg_raw);
        dgates.slice_mut(s![3 * h..4 * h, ..]).assign(&do_raw);

        // Bias gradients sum over the batch axis, kept as column vectors.
        let db = dgates.sum_axis(Axis(1)).insert_axis(Axis(1));

        let gradients = LstmGradients {
            w_ih: dgates.dot(&cache.input.t()),
            w_hh: dgates.dot(&cache.hx.t()),
            b_ih: db.clone(),
            b_hh: db,
        };

        let dx = self.w_ih.t().dot(&dgates);
        let dhx = self.w_hh.t().dot(&dgates);
        let dcx = &dcy_total * &cache.forget_gate;

        (gradients, dx, dhx, dcx)
    }

    /// Initialize zero gradients for accumulation.
    pub fn zero_gradients(&self) -> LstmGradients {
        LstmGradients {
            w_ih: Array2::zeros(self.w_ih.raw_dim()),
            w_hh: Array2::zeros(self.w_hh.raw_dim()),
            b_ih: Array2::zeros(self.b_ih.raw_dim()),
            b_hh: Array2::zeros(self.b_hh.raw_dim()),
        }
    }

    /// Apply gradients using the provided optimizer.
    pub fn update_parameters<O: Optimizer>(
        &mut self,
        gradients: &LstmGradients,
        optimizer: &mut O,
        prefix: &str,
    ) {
        optimizer.update(&format!("{}_w_ih", prefix), &mut self.w_ih, &gradients.w_ih);
        optimizer.update(&format!("{}_w_hh", prefix), &mut self.w_hh, &gradients.w_hh);
        optimizer.update(&format!("{}_b_ih", prefix), &mut self.b_ih, &gradients.b_ih);
        optimizer.update(&format!("{}_b_hh", prefix), &mut self.b_hh, &gradients.b_hh);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_forward_shapes() {
        let cell = LstmCell::new(3, 2);
        let input = arr2(&[[0.5], [0.1], [-0.3]]);
        let (hx, cx) = cell.zero_state(1);

        let (hy, cy) = cell.forward(&input, &hx, &cx);

        assert_eq!(hy.shape(), &[2, 1]);
        assert_eq!(cy.shape(), &[2, 1]);
    }

    #[test]
    fn test_forward_with_batch() {
        let cell = LstmCell::new(3, 4);
        let input = arr2(&[[0.5, 0.1], [0.2, -0.4], [-0.3, 0.9]]); // batch of 2
        let (hx, cx) = cell.zero_state(2);

        let (hy, cy) = cell.forward(&input, &hx, &cx);

        assert_eq!(hy.shape(), &[4, 2]);
        assert_eq!(cy.shape(), &[4, 2]);
    }

    #[test]
    fn test_backward_shapes() {
        let cell = LstmCell::new(2, 3);
        let input = arr2(&[[1.0, 0.2], [0.5, -0.1]]);
        let (hx, cx) = cell.zero_state(2);

        let (_, _, cache) = cell.forward_with_cache(&input, &hx, &cx);

        let dhy = Array2::ones((3, 2));
        let dcy = Array2::zeros((3, 2));
        let (gradients, dx, dhx, dcx) = cell.backward(&dhy, &dcy, &cache);

        assert_eq!(gradients.w_ih.shape(), &[12, 2]);
        assert_eq!(gradients.w_hh.shape(), &[12, 3]);
        assert_eq!(gradients.b_ih.shape(), &[12, 1]);
        assert_eq!(dx.shape(), &[2, 2]);
        assert_eq!(dhx.shape(), &[3, 2]);
        assert_eq!(dcx.shape(), &[3, 2]);
    }

    #[test]
    fn test_gradient_accumulation() {
        let cell = LstmCell::new(2, 2);
        let mut total = cell.zero_gradients();
        let input = arr2(&[[1.0], [0.5]]);
        let (hx, cx) = cell.zero_state(1);
        let (_, _, cache) = cell.forward_with_cache(&input, &hx, &cx);

        let dhy = Array2::ones((2, 1));
        let dcy = Array2::zeros((2, 1));
        let (step, _, _, _) = cell.backward(&dhy, &dcy, &cache);

        total.accumulate(&step);
        total.accumulate(&step);

        let twice = &step.w_ih * 2.0;
        assert!((&total.w_ih - &twice).map(|x| x.abs()).sum() < 1e-12);
    }
}
