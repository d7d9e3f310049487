use datafusion_tdigest::error::SketchError;
use datafusion_tdigest::tdigest::TDigest;
use rand::seq::SliceRandom;

fn digest_of(values: &[f64]) -> TDigest {
    let mut digest = TDigest::new(100.0, 0).expect("valid config");
    for v in values {
        digest.update(*v);
    }
    digest
}

#[test]
fn test_invalid_configuration_rejected() {
    assert!(matches!(
        TDigest::new(0.0, 0),
        Err(SketchError::Configuration(_))
    ));
    assert!(matches!(
        TDigest::new(f64::NAN, 0),
        Err(SketchError::Configuration(_))
    ));
    assert!(matches!(
        TDigest::new(100.0, -1),
        Err(SketchError::Configuration(_))
    ));
}

#[test]
fn test_from_parts_length_mismatch() {
    let result = TDigest::from_parts(100.0, 0, vec![1.0, 2.0, 3.0], vec![1.0, 1.0]);
    assert!(matches!(result, Err(SketchError::Consistency(_))));
}

#[test]
fn test_update_conserves_mass_and_bounds_size() {
    let mut digest = TDigest::new(50.0, 0).expect("valid config");
    for i in 0..10_000 {
        digest.update(i as f64);
    }
    assert_eq!(digest.total_mass(), 10_000.0);
    digest.compress();
    assert_eq!(digest.total_mass(), 10_000.0);
    // centroid count is bounded by a function of compression, not input size
    assert!(digest.size() <= 101, "size {} too large", digest.size());
    assert_eq!(digest.centroid_positions().len(), digest.size());
    assert_eq!(digest.centroid_masses().len(), digest.size());
}

#[test]
fn test_centroid_positions_ascending() {
    let mut values: Vec<f64> = (0..5_000).map(|i| (i % 977) as f64).collect();
    values.shuffle(&mut rand::thread_rng());
    let mut digest = digest_of(&values);
    digest.compress();
    let positions = digest.centroid_positions();
    for pair in positions.windows(2) {
        assert!(pair[0] <= pair[1], "positions not ascending: {pair:?}");
    }
}

#[test]
fn test_nan_values_are_skipped() {
    let mut digest = digest_of(&[1.0, f64::NAN, 2.0]);
    digest.update(f64::NAN);
    assert_eq!(digest.total_mass(), 2.0);
}

#[test]
fn test_quantile_uniform() {
    let values: Vec<f64> = (1..=1000).map(|i| i as f64).collect();
    let digest = digest_of(&values);
    let median = digest.quantile(0.5);
    assert!(
        (median - 500.5).abs() < 25.0,
        "median estimate {median} too far off"
    );
    assert_eq!(digest.quantile(0.0), 1.0);
    assert_eq!(digest.quantile(1.0), 1000.0);
}

#[test]
fn test_empty_digest_quantile_is_nan() {
    let digest = TDigest::new(100.0, 0).expect("valid config");
    assert!(digest.quantile(0.5).is_nan());
    assert!(digest.cdf(0.5).is_nan());
}

#[test]
fn test_cdf_uniform() {
    let values: Vec<f64> = (1..=1000).map(|i| i as f64).collect();
    let digest = digest_of(&values);
    assert_eq!(digest.cdf(0.0), 0.0);
    assert_eq!(digest.cdf(2000.0), 1.0);
    let half = digest.cdf(500.0);
    assert!((half - 0.5).abs() < 0.05, "cdf(500) = {half}");
}

#[test]
fn test_discrete_mode_retains_exact_values() {
    let mut digest = TDigest::new(100.0, 10).expect("valid config");
    for v in [1.0, 2.0, 2.0, 3.0] {
        digest.update(v);
    }
    assert_eq!(digest.size(), 3);
    assert_eq!(digest.centroid_positions(), vec![1.0, 2.0, 3.0]);
    assert_eq!(digest.centroid_masses(), vec![1.0, 2.0, 1.0]);
    // discrete quantiles are retained values, never interpolations
    assert_eq!(digest.quantile(0.5), 2.0);
    assert_eq!(digest.quantile(1.0), 3.0);
}

#[test]
fn test_discrete_mode_merge_stays_exact_under_threshold() {
    let mut left = TDigest::new(100.0, 10).expect("valid config");
    left.update(1.0);
    left.update(2.0);
    let mut right = TDigest::new(100.0, 10).expect("valid config");
    right.update(2.0);
    right.update(5.0);
    left.merge_from(right);
    assert_eq!(left.centroid_positions(), vec![1.0, 2.0, 5.0]);
    assert_eq!(left.centroid_masses(), vec![1.0, 2.0, 1.0]);
}

#[test]
fn test_merge_commutes_on_mass() {
    let x = digest_of(&[1.0, 2.0]);
    let y = digest_of(&[3.0, 4.0]);

    let mut xy = x.clone();
    xy.merge_from(y.clone());
    assert_eq!(xy.total_mass(), 4.0);

    let mut yx = y;
    yx.merge_from(x);
    assert_eq!(yx.total_mass(), 4.0);
}

#[test]
fn test_merge_identity_element() {
    let s = digest_of(&[10.0, 20.0, 30.0]);
    let mut zero = TDigest::new(100.0, 0).expect("valid config");
    zero.merge_from(s.clone());
    assert_eq!(zero.total_mass(), s.total_mass());
    assert_eq!(zero.quantile(0.5), s.quantile(0.5));

    let mut s2 = s.clone();
    s2.merge_from(TDigest::new(100.0, 0).expect("valid config"));
    assert_eq!(s2, s);
}

#[test]
fn test_merge_order_independent_mass() {
    let values: Vec<f64> = (0..500).map(|i| (i as f64) * 0.25).collect();
    let chunks: Vec<TDigest> = values.chunks(71).map(digest_of).collect();

    // left fold in declaration order
    let mut forward = TDigest::new(100.0, 0).expect("valid config");
    for chunk in chunks.clone() {
        forward.merge_from(chunk);
    }
    assert_eq!(forward.total_mass(), 500.0);

    // left fold in shuffled order
    let mut shuffled = chunks.clone();
    shuffled.shuffle(&mut rand::thread_rng());
    let mut backward = TDigest::new(100.0, 0).expect("valid config");
    for chunk in shuffled {
        backward.merge_from(chunk);
    }
    assert_eq!(backward.total_mass(), 500.0);

    // pairwise merge tree
    let mut tree = chunks;
    while tree.len() > 1 {
        let mut next: Vec<TDigest> = Vec::new();
        for pair in tree.chunks(2) {
            let mut merged = pair[0].clone();
            if let Some(second) = pair.get(1) {
                merged.merge_from(second.clone());
            }
            next.push(merged);
        }
        tree = next;
    }
    assert_eq!(tree[0].total_mass(), 500.0);

    // all shapes land in the same approximation class
    let median = 500.0 * 0.25 / 2.0;
    for digest in [&forward, &backward, &tree[0]] {
        let estimate = digest.quantile(0.5);
        assert!(
            (estimate - median).abs() < 10.0,
            "median estimate {estimate} too far from {median}"
        );
    }
}
