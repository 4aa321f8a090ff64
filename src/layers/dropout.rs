use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

/// Inverted dropout for regularization.
///
/// During training, each activation is zeroed with probability
/// `dropout_rate` and survivors are rescaled by `1 / keep_prob` so the
/// expected activation is unchanged. In evaluation mode the layer is an
/// identity.
#[derive(Clone)]
pub struct Dropout {
    pub dropout_rate: f64,
    pub is_training: bool,
    mask: Option<Array2<f64>>,
}

impl Dropout {
    pub fn new(dropout_rate: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&dropout_rate),
            "Dropout rate must be between 0.0 and 1.0"
        );

        Dropout {
            dropout_rate,
            is_training: true,
            mask: None,
        }
    }

    pub fn train(&mut self) {
        self.is_training = true;
    }

    pub fn eval(&mut self) {
        self.is_training = false;
        self.mask = None;
    }

    /// Apply dropout, drawing a fresh mask when training.
    pub fn forward(&mut self, input: &Array2<f64>) -> Array2<f64> {
        if !self.is_training || self.dropout_rate == 0.0 {
            self.mask = None;
            return input.clone();
        }

        let keep_prob = 1.0 - self.dropout_rate;
        let dist = Uniform::new(0.0, 1.0);
        let mask =
            Array2::random(input.raw_dim(), dist).mapv(|x| if x < keep_prob { 1.0 } else { 0.0 });

        let output = input * &mask / keep_prob;
        self.mask = Some(mask);
        output
    }

    /// Mask drawn by the most recent training-mode forward call.
    pub fn last_mask(&self) -> Option<&Array2<f64>> {
        self.mask.as_ref()
    }

    /// Route a gradient back through a saved mask.
    pub fn backward(&self, grad_output: &Array2<f64>, mask: Option<&Array2<f64>>) -> Array2<f64> {
        match mask {
            Some(mask) => grad_output * mask / (1.0 - self.dropout_rate),
            None => grad_output.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_eval_mode_is_identity() {
        let mut dropout = Dropout::new(0.5);
        let input = arr2(&[[1.0, 2.0], [3.0, 4.0]]);

        dropout.eval();
        let output = dropout.forward(&input);
        assert_eq!(output, input);
        assert!(dropout.last_mask().is_none());
    }

    #[test]
    fn test_training_mode_zeroes_and_rescales() {
        let mut dropout = Dropout::new(0.5);
        let input = Array2::from_elem((10, 10), 1.0);

        dropout.train();
        let output = dropout.forward(&input);
        let mask = dropout.last_mask().unwrap();

        for (o, m) in output.iter().zip(mask.iter()) {
            if *m == 0.0 {
                assert_eq!(*o, 0.0);
            } else {
                assert!((o - 2.0).abs() < 1e-12); // 1.0 / keep_prob
            }
        }
    }

    #[test]
    fn test_backward_applies_same_mask() {
        let mut dropout = Dropout::new(0.5);
        let input = Array2::from_elem((4, 4), 1.0);

        dropout.train();
        let _ = dropout.forward(&input);
        let mask = dropout.last_mask().cloned();

        let grad = Array2::from_elem((4, 4), 1.0);
        let routed = dropout.backward(&grad, mask.as_ref());

        for (g, m) in routed.iter().zip(mask.unwrap().iter()) {
            if *m == 0.0 {
                assert_eq!(*g, 0.0);
            } else {
                assert!((g - 2.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_zero_rate_passthrough() {
        let mut dropout = Dropout::new(0.0);
        let input = arr2(&[[1.0, -2.0]]);
        assert_eq!(dropout.forward(&input), input);
    }
}
