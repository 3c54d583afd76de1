//! Synthetic samples for development runs and benchmarks.
//!
//! Actual values are Gaussian daily returns with an instrument-specific
//! volatility. Predictions are correlated with the actuals and scaled by a
//! model-specific dispersion factor, so some models come out conservative and
//! others aggressive. Every series is a pure function of
//! (seed, instrument, model).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use varlab_core::Sample;

use crate::config::SyntheticConfig;

/// Correlation between predicted and actual values.
const PREDICTION_CORRELATION: f64 = 0.6;

/// Deterministic sample for one (instrument, model) pair.
pub fn generate_sample(instrument: &str, model: &str, observations: usize, seed: u64) -> Sample {
    let mut rng = rng_for(seed, instrument, model);
    let volatility = 0.01 + 0.02 * unit_from_name(instrument);
    let dispersion = 0.6 + 0.8 * unit_from_name(model);
    let idio = (1.0 - PREDICTION_CORRELATION * PREDICTION_CORRELATION).sqrt();

    let mut actual = Vec::with_capacity(observations);
    let mut predicted = Vec::with_capacity(observations);
    for _ in 0..observations {
        let z = standard_normal(&mut rng);
        let e = standard_normal(&mut rng);
        actual.push(volatility * z);
        predicted.push(volatility * dispersion * (PREDICTION_CORRELATION * z + idio * e));
    }
    Sample::new(instrument, model, actual, predicted)
}

/// One sample per (instrument, model), in sorted key order.
pub fn generate_samples(instruments: &[String], config: &SyntheticConfig) -> Vec<Sample> {
    let mut samples: Vec<Sample> = instruments
        .iter()
        .flat_map(|instrument| {
            config.models.iter().map(move |model| {
                generate_sample(instrument, model, config.observations, config.seed)
            })
        })
        .collect();
    samples.sort_by(|a, b| (&a.instrument, &a.model).cmp(&(&b.instrument, &b.model)));
    samples
}

fn rng_for(seed: u64, instrument: &str, model: &str) -> StdRng {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(instrument.as_bytes());
    hasher.update(&[0]);
    hasher.update(model.as_bytes());
    StdRng::from_seed(*hasher.finalize().as_bytes())
}

/// Stable value in [0, 1] derived from a name.
fn unit_from_name(name: &str) -> f64 {
    let hash = blake3::hash(name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes) as f64 / u64::MAX as f64
}

/// Box–Muller transform.
fn standard_normal(rng: &mut StdRng) -> f64 {
    // 1 - U lies in (0, 1], keeping ln finite
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}
