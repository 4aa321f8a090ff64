use ndarray::Array2;

use crate::layers::{
    BatchNorm, BatchNormCache, BatchNormGradients, Dropout, LinearGradients, LinearLayer,
    LstmCache, LstmCell, LstmGradients,
};
use crate::optimizers::Optimizer;
use crate::utils::relu;

/// Everything cached by one forward pass over a window batch, enough for
/// full backpropagation through time.
pub struct ForwardCache {
    lstm1_caches: Vec<LstmCache>,
    dropout1_masks: Vec<Option<Array2<f64>>>,
    lstm2_caches: Vec<LstmCache>,
    dropout2_mask: Option<Array2<f64>>,
    norm_cache: BatchNormCache,
    /// Dense layer output before the ReLU.
    pre_activation: Array2<f64>,
}

/// Gradients for every trainable parameter of the network.
pub struct NetworkGradients {
    pub lstm1: LstmGradients,
    pub lstm2: LstmGradients,
    pub norm: BatchNormGradients,
    pub hidden: LinearGradients,
    pub output: LinearGradients,
}

impl NetworkGradients {
    /// Mutable references to every gradient matrix, for clipping.
    pub fn matrices_mut(&mut self) -> Vec<&mut Array2<f64>> {
        vec![
            &mut self.lstm1.w_ih,
            &mut self.lstm1.w_hh,
            &mut self.lstm1.b_ih,
            &mut self.lstm1.b_hh,
            &mut self.lstm2.w_ih,
            &mut self.lstm2.w_hh,
            &mut self.lstm2.b_ih,
            &mut self.lstm2.b_hh,
            &mut self.norm.gamma,
            &mut self.norm.beta,
            &mut self.hidden.weight,
            &mut self.hidden.bias,
            &mut self.output.weight,
            &mut self.output.bias,
        ]
    }
}

/// Sequence-to-vector regressor for multivariate next-step forecasting.
///
/// Layer stack: an LSTM processes the full window and feeds its hidden
/// sequence through dropout into a second LSTM; that layer's final hidden
/// state passes through dropout and batch normalization into a ReLU dense
/// layer, then a linear head with one output per channel and no activation.
/// Outputs live in the scaler's [0,1]-ish space and are not clipped.
#[derive(Clone)]
pub struct ForecastNetwork {
    lstm1: LstmCell,
    lstm2: LstmCell,
    dropout1: Dropout,
    dropout2: Dropout,
    norm: BatchNorm,
    hidden: LinearLayer,
    output: LinearLayer,
    pub input_size: usize,
    pub is_training: bool,
}

impl ForecastNetwork {
    pub fn new(
        input_size: usize,
        hidden_size_1: usize,
        hidden_size_2: usize,
        dense_size: usize,
        dropout_rate: f64,
    ) -> Self {
        ForecastNetwork {
            lstm1: LstmCell::new(input_size, hidden_size_1),
            lstm2: LstmCell::new(hidden_size_1, hidden_size_2),
            dropout1: Dropout::new(dropout_rate),
            dropout2: Dropout::new(dropout_rate),
            norm: BatchNorm::new(hidden_size_2),
            hidden: LinearLayer::new(hidden_size_2, dense_size),
            output: LinearLayer::new(dense_size, input_size),
            input_size,
            is_training: true,
        }
    }

    /// Switch dropout and batch norm to training behavior.
    pub fn train(&mut self) {
        self.is_training = true;
        self.dropout1.train();
        self.dropout2.train();
        self.norm.train();
    }

    /// Switch dropout off and batch norm to running statistics.
    pub fn eval(&mut self) {
        self.is_training = false;
        self.dropout1.eval();
        self.dropout2.eval();
        self.norm.eval();
    }

    /// Run a batch of windows through the network.
    ///
    /// `steps` is timestep-major: one (channels, batch) matrix per time
    /// step. Returns the (channels, batch) prediction for the step after
    /// the window, plus the cache for [`backward`](Self::backward).
    pub fn forward_with_cache(&mut self, steps: &[Array2<f64>]) -> (Array2<f64>, ForwardCache) {
        debug_assert!(!steps.is_empty());
        let batch = steps[0].ncols();

        let (mut h1, mut c1) = self.lstm1.zero_state(batch);
        let (mut h2, mut c2) = self.lstm2.zero_state(batch);

        let mut lstm1_caches = Vec::with_capacity(steps.len());
        let mut dropout1_masks = Vec::with_capacity(steps.len());
        let mut lstm2_caches = Vec::with_capacity(steps.len());

        for input in steps {
            let (h1_new, c1_new, cache1) = self.lstm1.forward_with_cache(input, &h1, &c1);
            let dropped = self.dropout1.forward(&h1_new);
            let (h2_new, c2_new, cache2) = self.lstm2.forward_with_cache(&dropped, &h2, &c2);

            lstm1_caches.push(cache1);
            dropout1_masks.push(self.dropout1.last_mask().cloned());
            lstm2_caches.push(cache2);

            h1 = h1_new;
            c1 = c1_new;
            h2 = h2_new;
            c2 = c2_new;
        }

        let dropped2 = self.dropout2.forward(&h2);
        let dropout2_mask = self.dropout2.last_mask().cloned();
        let (normed, norm_cache) = self.norm.forward_with_cache(&dropped2);
        let pre_activation = self.hidden.forward(&normed);
        let activated = pre_activation.mapv(relu);
        let prediction = self.output.forward(&activated);

        let cache = ForwardCache {
            lstm1_caches,
            dropout1_masks,
            lstm2_caches,
            dropout2_mask,
            norm_cache,
            pre_activation,
        };
        (prediction, cache)
    }

    /// Inference-only forward pass.
    pub fn predict(&mut self, steps: &[Array2<f64>]) -> Array2<f64> {
        let (prediction, _) = self.forward_with_cache(steps);
        prediction
    }

    /// Backpropagation through time from the loss gradient at the output.
    ///
    /// The loss touches only the prediction, so the recurrent gradient
    /// enters the stack at the final time step and is carried backwards
    /// through both LSTM layers.
    pub fn backward(&self, dy: &Array2<f64>, cache: &ForwardCache) -> NetworkGradients {
        let steps = cache.lstm1_caches.len();

        let (output_grads, d_activated) = self.output.backward(dy);

        // ReLU gate on the dense pre-activation.
        let relu_mask = cache.pre_activation.mapv(|x| if x > 0.0 { 1.0 } else { 0.0 });
        let d_pre = &d_activated * &relu_mask;

        let (hidden_grads, d_normed) = self.hidden.backward(&d_pre);
        let (norm_grads, d_dropped2) = self.norm.backward(&d_normed, &cache.norm_cache);

        // Gradient w.r.t. the second LSTM's final hidden state.
        let mut dh2 = self
            .dropout2
            .backward(&d_dropped2, cache.dropout2_mask.as_ref());
        let mut dc2 = Array2::zeros(dh2.raw_dim());

        let mut dh1: Array2<f64> = Array2::zeros((self.lstm1.hidden_size, dy.ncols()));
        let mut dc1: Array2<f64> = Array2::zeros((self.lstm1.hidden_size, dy.ncols()));

        let mut lstm1_grads = self.lstm1.zero_gradients();
        let mut lstm2_grads = self.lstm2.zero_gradients();

        for t in (0..steps).rev() {
            let (step_g2, dx2, dh2_prev, dc2_prev) =
                self.lstm2.backward(&dh2, &dc2, &cache.lstm2_caches[t]);
            lstm2_grads.accumulate(&step_g2);

            // dx2 is the gradient w.r.t. the dropped first-layer output.
            let d_h1_step = self
                .dropout1
                .backward(&dx2, cache.dropout1_masks[t].as_ref());
            let dh1_total = &dh1 + &d_h1_step;

            let (step_g1, _dx, dh1_prev, dc1_prev) =
                self.lstm1.backward(&dh1_total, &dc1, &cache.lstm1_caches[t]);
            lstm1_grads.accumulate(&step_g1);

            dh2 = dh2_prev;
            dc2 = dc2_prev;
            dh1 = dh1_prev;
            dc1 = dc1_prev;
        }

        NetworkGradients {
            lstm1: lstm1_grads,
            lstm2: lstm2_grads,
            norm: norm_grads,
            hidden: hidden_grads,
            output: output_grads,
        }
    }

    /// Update every parameter group using computed gradients.
    pub fn update_parameters<O: Optimizer>(
        &mut self,
        gradients: &NetworkGradients,
        optimizer: &mut O,
    ) {
        self.lstm1
            .update_parameters(&gradients.lstm1, optimizer, "lstm1");
        self.lstm2
            .update_parameters(&gradients.lstm2, optimizer, "lstm2");
        self.norm.update_parameters(&gradients.norm, optimizer, "norm");
        self.hidden
            .update_parameters(&gradients.hidden, optimizer, "hidden");
        self.output
            .update_parameters(&gradients.output, optimizer, "output");
    }
}
