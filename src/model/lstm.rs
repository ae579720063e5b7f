//! LSTM sequence regressor
//!
//! One LSTM layer over a window of feature rows followed by a dense head on
//! the last hidden state. The four gates share stacked weight matrices in the
//! order input, forget, candidate, output. Training runs full
//! backpropagation through time with Adam.

use super::config::{CellActivation, LSTMConfig};
use super::optimizer::{Adam, Moments};
use crate::error::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{s, Array1, Array2, Array3, Axis, Ix1, Ix2, Zip};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Samples per forward chunk at inference time
const PREDICT_CHUNK: usize = 256;

/// Activations kept from one forward step for the backward pass
struct StepCache {
    x: Array2<f64>,
    h_prev: Array2<f64>,
    c_prev: Array2<f64>,
    i: Array2<f64>,
    f: Array2<f64>,
    g_pre: Array2<f64>,
    g: Array2<f64>,
    o: Array2<f64>,
    c: Array2<f64>,
    c_act: Array2<f64>,
}

/// Parameter gradients, shaped like the model's parameters
struct Gradients {
    w: Array2<f64>,
    u: Array2<f64>,
    b: Array1<f64>,
    w_out: Array2<f64>,
    b_out: Array1<f64>,
}

impl Gradients {
    fn norm(&self) -> f64 {
        let sq = |a: f64, v: &f64| a + v * v;
        (self.w.iter().fold(0.0, sq)
            + self.u.iter().fold(0.0, sq)
            + self.b.iter().fold(0.0, sq)
            + self.w_out.iter().fold(0.0, sq)
            + self.b_out.iter().fold(0.0, sq))
        .sqrt()
    }

    /// Rescale so the global norm is at most `max_norm`
    fn clip(&mut self, max_norm: f64) {
        let norm = self.norm();
        if norm > max_norm && norm > 0.0 {
            let scale = max_norm / norm;
            self.w *= scale;
            self.u *= scale;
            self.b *= scale;
            self.w_out *= scale;
            self.b_out *= scale;
        }
    }
}

/// Adam state for every parameter tensor
struct OptimizerState {
    adam: Adam,
    w: Moments<Ix2>,
    u: Moments<Ix2>,
    b: Moments<Ix1>,
    w_out: Moments<Ix2>,
    b_out: Moments<Ix1>,
}

/// LSTM model for one-step-ahead regression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LSTM {
    /// Model configuration
    pub config: LSTMConfig,
    w: Array2<f64>,     // [4H, input]
    u: Array2<f64>,     // [4H, H]
    b: Array1<f64>,     // [4H]
    w_out: Array2<f64>, // [1, H]
    b_out: Array1<f64>, // [1]
    /// Mean training loss per epoch
    #[serde(skip)]
    pub loss_history: Vec<f64>,
    /// Validation loss per epoch, when validation data was given
    #[serde(skip)]
    pub val_loss_history: Vec<f64>,
}

impl LSTM {
    /// Create a model with seeded uniform weights
    pub fn new(config: LSTMConfig) -> Self {
        let hidden = config.hidden_size;
        let limit = (1.0 / hidden.max(1) as f64).sqrt();
        let dist = Uniform::new(-limit, limit);
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

        let w = Array2::random_using((4 * hidden, config.input_size), dist, &mut rng);
        let u = Array2::random_using((4 * hidden, hidden), dist, &mut rng);
        let mut b = Array1::zeros(4 * hidden);
        // forget gate starts open
        b.slice_mut(s![hidden..2 * hidden]).fill(1.0);
        let w_out = Array2::random_using((1, hidden), dist, &mut rng);

        Self {
            config,
            w,
            u,
            b,
            w_out,
            b_out: Array1::zeros(1),
            loss_history: Vec::new(),
            val_loss_history: Vec::new(),
        }
    }

    /// Forward pass over `[batch, seq_len, input]`.
    ///
    /// Returns the `[batch, 1]` output, the last hidden state and, when
    /// `keep_cache` is set, the per-step activations.
    fn run(&self, x: &Array3<f64>, keep_cache: bool) -> (Array2<f64>, Array2<f64>, Vec<StepCache>) {
        let (batch, seq_len, _) = x.dim();
        let hidden = self.config.hidden_size;
        let act = self.config.activation;

        let mut h: Array2<f64> = Array2::zeros((batch, hidden));
        let mut c: Array2<f64> = Array2::zeros((batch, hidden));
        let mut cache = Vec::with_capacity(if keep_cache { seq_len } else { 0 });

        for t in 0..seq_len {
            let x_t = x.slice(s![.., t, ..]).to_owned();
            let z = x_t.dot(&self.w.t()) + h.dot(&self.u.t()) + &self.b;

            let i = z.slice(s![.., 0..hidden]).mapv(sigmoid);
            let f = z.slice(s![.., hidden..2 * hidden]).mapv(sigmoid);
            let g_pre = z.slice(s![.., 2 * hidden..3 * hidden]).to_owned();
            let g = g_pre.mapv(|v| act.apply(v));
            let o = z.slice(s![.., 3 * hidden..4 * hidden]).mapv(sigmoid);

            let c_next = &f * &c + &i * &g;
            let c_act = c_next.mapv(|v| act.apply(v));
            let h_next = &o * &c_act;

            if keep_cache {
                cache.push(StepCache {
                    x: x_t,
                    h_prev: h,
                    c_prev: c,
                    i,
                    f,
                    g_pre,
                    g,
                    o,
                    c: c_next.clone(),
                    c_act,
                });
            }
            h = h_next;
            c = c_next;
        }

        let out = h.dot(&self.w_out.t()) + &self.b_out;
        (out, h, cache)
    }

    /// Forward pass returning `[batch, 1]`
    pub fn forward(&self, x: &Array3<f64>) -> Array2<f64> {
        self.run(x, false).0
    }

    /// Mean squared error
    pub fn compute_loss(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> f64 {
        let diff = predictions - targets;
        diff.mapv(|d| d * d).mean().unwrap_or(0.0)
    }

    /// Batch loss and parameter gradients by backpropagation through time
    fn gradients(&self, x: &Array3<f64>, y: &Array2<f64>) -> (f64, Gradients) {
        let (out, h_last, cache) = self.run(x, true);
        let batch = x.shape()[0].max(1) as f64;
        let hidden = self.config.hidden_size;
        let act = self.config.activation;

        let diff = &out - y;
        let loss = diff.mapv(|d| d * d).mean().unwrap_or(0.0);
        let d_out = diff * (2.0 / batch);

        let mut grads = Gradients {
            w: Array2::zeros(self.w.raw_dim()),
            u: Array2::zeros(self.u.raw_dim()),
            b: Array1::zeros(self.b.raw_dim()),
            w_out: d_out.t().dot(&h_last),
            b_out: d_out.sum_axis(Axis(0)),
        };

        let mut dh = d_out.dot(&self.w_out);
        let mut dc: Array2<f64> = Array2::zeros(dh.raw_dim());
        let mut dz: Array2<f64> = Array2::zeros((x.shape()[0], 4 * hidden));

        for step in cache.iter().rev() {
            let d_o = &dh * &step.c_act;
            let c_grad = Zip::from(&step.c)
                .and(&step.c_act)
                .map_collect(|&pre, &out| act.derivative(pre, out));
            let d_cell = dc + &dh * &step.o * &c_grad;

            let d_i = &d_cell * &step.g;
            let d_f = &d_cell * &step.c_prev;
            let d_g = &d_cell * &step.i;
            dc = &d_cell * &step.f;

            let g_grad = Zip::from(&step.g_pre)
                .and(&step.g)
                .map_collect(|&pre, &out| act.derivative(pre, out));

            dz.slice_mut(s![.., 0..hidden])
                .assign(&(d_i * &step.i.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., hidden..2 * hidden])
                .assign(&(d_f * &step.f.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., 2 * hidden..3 * hidden])
                .assign(&(d_g * &g_grad));
            dz.slice_mut(s![.., 3 * hidden..4 * hidden])
                .assign(&(d_o * &step.o.mapv(|v| v * (1.0 - v))));

            grads.w += &dz.t().dot(&step.x);
            grads.u += &dz.t().dot(&step.h_prev);
            grads.b += &dz.sum_axis(Axis(0));
            dh = dz.dot(&self.u);
        }

        (loss, grads)
    }

    fn apply(&mut self, grads: &Gradients, state: &mut OptimizerState) {
        state.adam.tick();
        state.adam.update(&mut self.w, &grads.w, &mut state.w);
        state.adam.update(&mut self.u, &grads.u, &mut state.u);
        state.adam.update(&mut self.b, &grads.b, &mut state.b);
        state.adam.update(&mut self.w_out, &grads.w_out, &mut state.w_out);
        state.adam.update(&mut self.b_out, &grads.b_out, &mut state.b_out);
    }

    fn check_input(&self, x: &Array3<f64>) -> Result<()> {
        if x.shape()[2] != self.config.input_size {
            return Err(Error::ShapeMismatch(format!(
                "expected {} features per step, got {}",
                self.config.input_size,
                x.shape()[2]
            )));
        }
        Ok(())
    }

    /// Train on prepared minibatches
    ///
    /// # Arguments
    ///
    /// * `batches` - `(x [batch, T, features], y [batch, 1])` pairs
    /// * `epochs` - Passes over the batches; batch order is reshuffled each epoch
    /// * `validation` - Optional held-out windows, evaluated after every epoch
    pub fn train(
        &mut self,
        batches: &[(Array3<f64>, Array2<f64>)],
        epochs: usize,
        validation: Option<(&Array3<f64>, &Array2<f64>)>,
    ) -> Result<()> {
        let n_samples: usize = batches.iter().map(|(x, _)| x.shape()[0]).sum();
        if n_samples == 0 {
            return Err(Error::InsufficientData(
                "no training windows for the sequence model".into(),
            ));
        }
        for (x, y) in batches {
            self.check_input(x)?;
            if x.shape()[0] != y.nrows() || y.ncols() != 1 {
                return Err(Error::ShapeMismatch(format!(
                    "batch of {} windows paired with targets of shape {:?}",
                    x.shape()[0],
                    y.shape()
                )));
            }
        }
        if let Some((vx, _)) = validation {
            self.check_input(vx)?;
        }

        let mut state = OptimizerState {
            adam: Adam::new(self.config.learning_rate),
            w: Moments::like(&self.w),
            u: Moments::like(&self.u),
            b: Moments::like(&self.b),
            w_out: Moments::like(&self.w_out),
            b_out: Moments::like(&self.b_out),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(1));
        let mut order: Vec<usize> = (0..batches.len()).collect();

        self.loss_history.clear();
        self.val_loss_history.clear();

        let pb = ProgressBar::new(epochs as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) Loss: {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );

        for epoch in 0..epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for &idx in &order {
                let (x, y) = &batches[idx];
                let (loss, mut grads) = self.gradients(x, y);
                if let Some(clip) = self.config.gradient_clip {
                    grads.clip(clip);
                }
                self.apply(&grads, &mut state);
                epoch_loss += loss * x.shape()[0] as f64;
            }

            let avg_loss = epoch_loss / n_samples as f64;
            self.loss_history.push(avg_loss);

            match validation {
                Some((vx, vy)) if vx.shape()[0] > 0 => {
                    let val_loss = self.evaluate(vx, vy)?;
                    self.val_loss_history.push(val_loss);
                    debug!(epoch = epoch + 1, loss = avg_loss, val_loss, "lstm epoch");
                }
                _ => debug!(epoch = epoch + 1, loss = avg_loss, "lstm epoch"),
            }

            pb.set_message(format!("{:.6}", avg_loss));
            pb.inc(1);
        }

        pb.finish_with_message("training complete");
        Ok(())
    }

    /// Predict one value per window; no windows gives an empty result
    pub fn predict(&self, x: &Array3<f64>) -> Result<Vec<f64>> {
        let n = x.shape()[0];
        if n == 0 {
            return Ok(Vec::new());
        }
        self.check_input(x)?;

        let mut predictions = Vec::with_capacity(n);
        for start in (0..n).step_by(PREDICT_CHUNK) {
            let end = (start + PREDICT_CHUNK).min(n);
            let chunk = x.slice(s![start..end, .., ..]).to_owned();
            predictions.extend(self.forward(&chunk).column(0).iter().copied());
        }
        Ok(predictions)
    }

    /// MSE on held-out windows
    pub fn evaluate(&self, x: &Array3<f64>, y: &Array2<f64>) -> Result<f64> {
        let predictions = self.predict(x)?;
        if predictions.len() != y.nrows() {
            return Err(Error::ShapeMismatch(format!(
                "{} predictions but {} targets",
                predictions.len(),
                y.nrows()
            )));
        }
        let predictions = Array2::from_shape_fn((predictions.len(), 1), |(i, _)| predictions[i]);
        Ok(self.compute_loss(&predictions, y))
    }

    /// Save the model to a bincode file
    pub fn save(&self, path: &Path) -> Result<()> {
        let encoded = bincode::serialize(self)?;
        std::fs::write(path, encoded)?;
        Ok(())
    }

    /// Load a model saved with [`LSTM::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let model: Self = bincode::deserialize(&data)?;
        Ok(model)
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::SequenceGenerator;
    use approx::assert_relative_eq;

    fn sine_windows(n: usize, steps: usize) -> (Array3<f64>, Array2<f64>) {
        let series: Vec<f64> = (0..n + steps).map(|i| (i as f64 * 0.3).sin()).collect();
        let x = Array2::from_shape_fn((series.len(), 1), |(i, _)| series[i]);
        SequenceGenerator::new(steps, 16)
            .prepare(&x, &series)
            .unwrap()
    }

    #[test]
    fn test_forward_shape() {
        let model = LSTM::new(LSTMConfig::new(3, 8));
        let x = Array3::from_elem((4, 5, 3), 0.1);
        assert_eq!(model.forward(&x).shape(), &[4, 1]);
    }

    #[test]
    fn test_seeded_init_is_reproducible() {
        let a = LSTM::new(LSTMConfig::new(2, 4).with_seed(7));
        let b = LSTM::new(LSTMConfig::new(2, 4).with_seed(7));
        let c = LSTM::new(LSTMConfig::new(2, 4).with_seed(8));
        assert_eq!(a.w, b.w);
        assert_ne!(a.w, c.w);
        assert_eq!(a.b.slice(s![4..8]).sum(), 4.0);
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let config = LSTMConfig::new(2, 3)
            .with_activation(CellActivation::Tanh)
            .with_seed(3);
        let model = LSTM::new(config);
        let x = Array3::from_shape_fn((2, 4, 2), |(b, t, f)| {
            ((b * 8 + t * 2 + f) as f64 * 0.37).sin()
        });
        let y = Array2::from_shape_vec((2, 1), vec![0.5, -0.25]).unwrap();

        let (_, grads) = model.gradients(&x, &y);
        let eps = 1e-6;
        let loss_at = |m: &LSTM| m.compute_loss(&m.forward(&x), &y);

        for &(r, c) in &[(0, 0), (4, 1), (7, 0), (11, 1)] {
            let mut plus = model.clone();
            plus.w[[r, c]] += eps;
            let mut minus = model.clone();
            minus.w[[r, c]] -= eps;
            let numeric = (loss_at(&plus) - loss_at(&minus)) / (2.0 * eps);
            assert_relative_eq!(grads.w[[r, c]], numeric, epsilon = 1e-7, max_relative = 1e-4);
        }

        for &(r, c) in &[(1, 2), (9, 0)] {
            let mut plus = model.clone();
            plus.u[[r, c]] += eps;
            let mut minus = model.clone();
            minus.u[[r, c]] -= eps;
            let numeric = (loss_at(&plus) - loss_at(&minus)) / (2.0 * eps);
            assert_relative_eq!(grads.u[[r, c]], numeric, epsilon = 1e-7, max_relative = 1e-4);
        }

        for k in 0..3 {
            let mut plus = model.clone();
            plus.w_out[[0, k]] += eps;
            let mut minus = model.clone();
            minus.w_out[[0, k]] -= eps;
            let numeric = (loss_at(&plus) - loss_at(&minus)) / (2.0 * eps);
            assert_relative_eq!(grads.w_out[[0, k]], numeric, epsilon = 1e-7, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_training_reduces_loss() {
        let (x, y) = sine_windows(96, 5);
        let batches = SequenceGenerator::new(5, 16).batches(&x, &y);

        let config = LSTMConfig::new(1, 8)
            .with_learning_rate(0.01)
            .with_activation(CellActivation::Tanh);
        let mut model = LSTM::new(config);
        let before = model.evaluate(&x, &y).unwrap();
        model.train(&batches, 30, Some((&x, &y))).unwrap();
        let after = model.evaluate(&x, &y).unwrap();

        assert_eq!(model.loss_history.len(), 30);
        assert_eq!(model.val_loss_history.len(), 30);
        assert!(after < before);
    }

    #[test]
    fn test_predict_empty_and_mismatched() {
        let model = LSTM::new(LSTMConfig::new(2, 4));
        assert!(model.predict(&Array3::zeros((0, 5, 2))).unwrap().is_empty());
        assert!(matches!(
            model.predict(&Array3::zeros((1, 5, 3))),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_train_without_windows_fails() {
        let mut model = LSTM::new(LSTMConfig::new(1, 4));
        assert!(matches!(
            model.train(&[], 1, None),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn test_save_load() {
        let (x, _) = sine_windows(10, 3);
        let model = LSTM::new(LSTMConfig::new(1, 4));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lstm.bin");

        model.save(&path).unwrap();
        let loaded = LSTM::load(&path).unwrap();

        assert_eq!(loaded.config, model.config);
        assert_eq!(loaded.predict(&x).unwrap(), model.predict(&x).unwrap());
    }
}
