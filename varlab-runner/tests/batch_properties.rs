//! Property tests for the batch runner.
//!
//! 1. Thread independence: table and dataset hash match for any worker count
//! 2. Accounting: every input sample is either a row or a failure

use proptest::prelude::*;
use varlab_core::Sample;
use varlab_runner::{generate_sample, run_batch, BatchOptions};

fn arb_samples() -> impl Strategy<Value = Vec<Sample>> {
    (1usize..6, 1usize..4, 0usize..120, any::<u64>()).prop_map(|(insts, models, n, seed)| {
        let mut samples = Vec::new();
        for i in 0..insts {
            for m in 0..models {
                samples.push(generate_sample(&format!("I{i}"), &format!("M{m}"), n, seed));
            }
        }
        samples
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn outcome_does_not_depend_on_thread_count(samples in arb_samples(), threads in 2usize..5) {
        let serial = run_batch(&samples, &BatchOptions { threads: 1, ..Default::default() }).unwrap();
        let parallel = run_batch(&samples, &BatchOptions { threads, ..Default::default() }).unwrap();

        prop_assert_eq!(&serial.table, &parallel.table);
        prop_assert_eq!(&serial.failures, &parallel.failures);
        prop_assert_eq!(serial.dataset_hash, parallel.dataset_hash);
    }

    #[test]
    fn every_sample_is_accounted_for(samples in arb_samples()) {
        let outcome = run_batch(&samples, &BatchOptions::default()).unwrap();
        prop_assert_eq!(outcome.success_count() + outcome.failure_count(), samples.len());
    }
}
