//! Reconstruction-error detection via a small dense autoencoder.
//!
//! The encoder compresses the 4-dimensional standardized feature vector
//! through widths 8 then 4; the decoder expands back through 8 to 4. Hidden
//! layers use ReLU, the output layer is linear. The network is trained to
//! reproduce its input under mean-squared-error loss with the Adam
//! optimizer; days whose reconstruction error exceeds the 95th percentile of
//! the error distribution are flagged.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::features::{percentile, FeatureRow, FEATURE_DIM};

/// Layer widths, input to output. 4 → 8 → 4 → 8 → 4.
const LAYER_SIZES: [usize; 5] = [FEATURE_DIM, 8, 4, 8, FEATURE_DIM];

/// Adam first-moment decay.
const ADAM_BETA1: f64 = 0.9;
/// Adam second-moment decay.
const ADAM_BETA2: f64 = 0.999;
/// Adam denominator fuzz.
const ADAM_EPSILON: f64 = 1e-8;

// ── AutoencoderConfig ─────────────────────────────────────────────────────────

/// Training configuration for the autoencoder.
#[derive(Debug, Clone)]
pub struct AutoencoderConfig {
    /// Number of passes over the full dataset.
    pub epochs: usize,
    /// Mini-batch size.
    pub batch_size: usize,
    /// Adam learning rate.
    pub learning_rate: f64,
    /// Percentile of the reconstruction-error distribution used as the
    /// anomaly threshold.
    pub error_percentile: f64,
    /// RNG seed for weight init and epoch shuffling. Training is fully
    /// deterministic for a fixed seed.
    pub seed: u64,
}

impl Default for AutoencoderConfig {
    fn default() -> Self {
        Self {
            epochs: 40,
            batch_size: 16,
            learning_rate: 0.01,
            error_percentile: 95.0,
            seed: 42,
        }
    }
}

// ── DenseLayer ────────────────────────────────────────────────────────────────

/// One fully connected layer: `z = W·a + b`, weights indexed `[out][in]`.
struct DenseLayer {
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
}

impl DenseLayer {
    /// Glorot-uniform initialization from the shared RNG.
    fn new(fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
        let weights = (0..fan_out)
            .map(|_| (0..fan_in).map(|_| rng.gen_range(-limit..limit)).collect())
            .collect();
        Self {
            weights,
            biases: vec![0.0; fan_out],
        }
    }

    /// Pre-activation output `W·input + b`.
    fn affine(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(row, b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect()
    }
}

/// Per-layer gradient accumulator, same shapes as the layer parameters.
struct LayerGrads {
    w: Vec<Vec<f64>>,
    b: Vec<f64>,
}

impl LayerGrads {
    fn zeros_like(layer: &DenseLayer) -> Self {
        Self {
            w: layer.weights.iter().map(|row| vec![0.0; row.len()]).collect(),
            b: vec![0.0; layer.biases.len()],
        }
    }
}

/// Adam moment estimates for every parameter, plus the step counter.
struct AdamState {
    m: Vec<LayerGrads>,
    v: Vec<LayerGrads>,
    t: u64,
}

impl AdamState {
    fn new(layers: &[DenseLayer]) -> Self {
        Self {
            m: layers.iter().map(LayerGrads::zeros_like).collect(),
            v: layers.iter().map(LayerGrads::zeros_like).collect(),
            t: 0,
        }
    }

    /// One Adam update with bias-corrected moment estimates.
    fn step(&mut self, layers: &mut [DenseLayer], grads: &[LayerGrads], lr: f64) {
        self.t += 1;
        let bias1 = 1.0 - ADAM_BETA1.powi(self.t as i32);
        let bias2 = 1.0 - ADAM_BETA2.powi(self.t as i32);

        for (l, layer) in layers.iter_mut().enumerate() {
            for j in 0..layer.weights.len() {
                for i in 0..layer.weights[j].len() {
                    let g = grads[l].w[j][i];
                    let m = &mut self.m[l].w[j][i];
                    let v = &mut self.v[l].w[j][i];
                    *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
                    *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
                    let m_hat = *m / bias1;
                    let v_hat = *v / bias2;
                    layer.weights[j][i] -= lr * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
                }
                let g = grads[l].b[j];
                let m = &mut self.m[l].b[j];
                let v = &mut self.v[l].b[j];
                *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
                *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
                let m_hat = *m / bias1;
                let v_hat = *v / bias2;
                layer.biases[j] -= lr * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
            }
        }
    }
}

// ── Autoencoder ───────────────────────────────────────────────────────────────

/// A trained reconstruction network.
pub struct Autoencoder {
    layers: Vec<DenseLayer>,
}

impl Autoencoder {
    /// Train on `data` for the configured number of epochs.
    pub fn train(data: &[FeatureRow], config: &AutoencoderConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);

        let mut layers: Vec<DenseLayer> = LAYER_SIZES
            .windows(2)
            .map(|pair| DenseLayer::new(pair[0], pair[1], &mut rng))
            .collect();
        let mut adam = AdamState::new(&layers);

        let batch_size = config.batch_size.max(1);
        let mut indices: Vec<usize> = (0..data.len()).collect();

        for _ in 0..config.epochs {
            indices.shuffle(&mut rng);
            for batch in indices.chunks(batch_size) {
                let grads = batch_gradients(&layers, data, batch);
                adam.step(&mut layers, &grads, config.learning_rate);
            }
        }

        Self { layers }
    }

    /// Reconstruct `x` through the full encode/decode pass.
    pub fn reconstruct(&self, x: &FeatureRow) -> FeatureRow {
        let (activations, _) = forward(&self.layers, x);
        let output = activations.last().expect("network has layers");
        let mut out = [0.0_f64; FEATURE_DIM];
        out.copy_from_slice(output);
        out
    }

    /// Mean squared reconstruction error of `x` across the four features.
    pub fn reconstruction_error(&self, x: &FeatureRow) -> f64 {
        let recon = self.reconstruct(x);
        x.iter()
            .zip(&recon)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            / FEATURE_DIM as f64
    }

    /// Train on `data`, then flag every record whose reconstruction error
    /// exceeds the configured percentile of the error distribution.
    pub fn detect(data: &[FeatureRow], config: &AutoencoderConfig) -> Vec<bool> {
        if data.is_empty() {
            return Vec::new();
        }
        let model = Self::train(data, config);
        let errors: Vec<f64> = data.iter().map(|x| model.reconstruction_error(x)).collect();

        let mut sorted = errors.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).expect("errors are finite"));
        let threshold = percentile(&sorted, config.error_percentile);

        errors.iter().map(|&e| e > threshold).collect()
    }
}

// ── Forward / backward passes ─────────────────────────────────────────────────

/// Forward pass returning `(activations, pre_activations)`.
///
/// `activations[0]` is the input; `activations[l + 1]` the output of layer
/// `l`. Hidden layers apply ReLU, the final layer is linear.
fn forward(layers: &[DenseLayer], x: &FeatureRow) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let mut activations: Vec<Vec<f64>> = vec![x.to_vec()];
    let mut pre_activations: Vec<Vec<f64>> = Vec::with_capacity(layers.len());

    for (l, layer) in layers.iter().enumerate() {
        let z = layer.affine(activations.last().expect("non-empty"));
        let a = if l + 1 < layers.len() {
            z.iter().map(|&v| v.max(0.0)).collect()
        } else {
            z.clone()
        };
        pre_activations.push(z);
        activations.push(a);
    }

    (activations, pre_activations)
}

/// Mean gradient of the MSE reconstruction loss over one mini-batch.
fn batch_gradients(layers: &[DenseLayer], data: &[FeatureRow], batch: &[usize]) -> Vec<LayerGrads> {
    let mut grads: Vec<LayerGrads> = layers.iter().map(LayerGrads::zeros_like).collect();

    for &idx in batch {
        let x = &data[idx];
        let (activations, pre_activations) = forward(layers, x);
        let output = activations.last().expect("non-empty");

        // dL/dz for the linear output layer: L = mean((out − x)²).
        let mut delta: Vec<f64> = output
            .iter()
            .zip(x.iter())
            .map(|(o, t)| 2.0 * (o - t) / FEATURE_DIM as f64)
            .collect();

        for l in (0..layers.len()).rev() {
            for j in 0..delta.len() {
                for i in 0..activations[l].len() {
                    grads[l].w[j][i] += delta[j] * activations[l][i];
                }
                grads[l].b[j] += delta[j];
            }

            if l > 0 {
                // Propagate through layer l's weights and the previous
                // layer's ReLU.
                delta = (0..activations[l].len())
                    .map(|i| {
                        let upstream: f64 =
                            (0..delta.len()).map(|j| layers[l].weights[j][i] * delta[j]).sum();
                        if pre_activations[l - 1][i] > 0.0 {
                            upstream
                        } else {
                            0.0
                        }
                    })
                    .collect();
            }
        }
    }

    let scale = 1.0 / batch.len().max(1) as f64;
    for layer in &mut grads {
        for row in &mut layer.w {
            for g in row {
                *g *= scale;
            }
        }
        for g in &mut layer.b {
            *g *= scale;
        }
    }

    grads
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// A tight cluster with deterministic jitter plus one far outlier at the
    /// end.
    fn cluster_with_outlier(n: usize) -> Vec<FeatureRow> {
        let mut data: Vec<FeatureRow> = (0..n)
            .map(|i| {
                let jitter = (i % 7) as f64 * 0.01;
                [jitter, 1.0 - jitter, jitter * 0.5, 0.5 + jitter]
            })
            .collect();
        data.push([10.0, 10.0, 10.0, 10.0]);
        data
    }

    #[test]
    fn test_reconstruction_error_nonnegative() {
        let data = cluster_with_outlier(30);
        let model = Autoencoder::train(&data, &AutoencoderConfig::default());
        for point in &data {
            assert!(model.reconstruction_error(point) >= 0.0);
        }
    }

    #[test]
    fn test_outlier_has_highest_error() {
        let data = cluster_with_outlier(50);
        let model = Autoencoder::train(&data, &AutoencoderConfig::default());

        let errors: Vec<f64> = data.iter().map(|p| model.reconstruction_error(p)).collect();
        let outlier_error = errors[errors.len() - 1];
        let max_cluster_error = errors[..errors.len() - 1]
            .iter()
            .fold(f64::NEG_INFINITY, |acc, &e| acc.max(e));

        assert!(
            outlier_error > max_cluster_error,
            "outlier {outlier_error} vs cluster max {max_cluster_error}"
        );
    }

    #[test]
    fn test_detect_flags_about_five_percent() {
        let data = cluster_with_outlier(50);
        let flags = Autoencoder::detect(&data, &AutoencoderConfig::default());

        assert_eq!(flags.len(), data.len());
        let flagged = flags.iter().filter(|&&f| f).count();
        assert!((1..=5).contains(&flagged), "flagged = {flagged}");
        assert!(flags[data.len() - 1], "outlier must be flagged");
    }

    #[test]
    fn test_training_is_deterministic_for_fixed_seed() {
        let data = cluster_with_outlier(30);
        let config = AutoencoderConfig::default();

        let first = Autoencoder::train(&data, &config);
        let second = Autoencoder::train(&data, &config);

        for point in &data {
            let a = first.reconstruction_error(point);
            let b = second.reconstruction_error(point);
            assert!((a - b).abs() < 1e-15, "{a} != {b}");
        }
    }

    #[test]
    fn test_detect_empty_data() {
        let flags = Autoencoder::detect(&[], &AutoencoderConfig::default());
        assert!(flags.is_empty());
    }

    #[test]
    fn test_reconstruct_output_dimension() {
        let data = cluster_with_outlier(20);
        let model = Autoencoder::train(&data, &AutoencoderConfig::default());
        let recon = model.reconstruct(&data[0]);
        assert_eq!(recon.len(), FEATURE_DIM);
        assert!(recon.iter().all(|v| v.is_finite()));
    }
}
