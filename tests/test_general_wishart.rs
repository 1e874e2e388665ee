use polclass::core::decomposition::{CategoryPowers, Decomposition, PowerEvaluator};
use polclass::core::matrix::T3;
use polclass::core::{CancellationToken, GeneralWishart, PixelAssignment, PolClassifier, WishartConfig};
use polclass::io::{MatrixSource, QuadPolBands};
use polclass::types::{SarError, NO_DATA_CLASS};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn diag_t3(a: f64, b: f64, c: f64) -> T3 {
    T3::from_upper([[a, 0.0, 0.0], [0.0, b, 0.0], [0.0, 0.0, c]], [[0.0; 3]; 3])
}

/// 16x16 scene: surface (T11) top left, dihedral (T22) top right, volume
/// (T33) along the bottom. Power varies across pixels so the power buckets fill.
fn three_mechanism_scene() -> QuadPolBands {
    let rows: Vec<Vec<T3>> = (0..16)
        .map(|y| {
            (0..16)
                .map(|x| {
                    let s = 1.0 + 0.05 * ((x * 13 + y * 7) % 17) as f64;
                    if y >= 12 {
                        diag_t3(0.4, 0.3, 3.0).scaled(s)
                    } else if x < 8 {
                        diag_t3(4.0, 0.5, 0.3).scaled(s)
                    } else {
                        diag_t3(0.5, 4.0, 0.3).scaled(s)
                    }
                })
                .collect()
        })
        .collect();
    QuadPolBands::from_matrices(&rows).expect("Failed to build T3 scene")
}

fn pauli_config() -> WishartConfig {
    WishartConfig {
        window_size: 3,
        num_initial_classes: 24,
        num_final_classes: 12,
        decomposition: Decomposition::Pauli,
        tile_size: 5,
        ..Default::default()
    }
}

struct NanEvaluator;

impl PowerEvaluator for NanEvaluator {
    fn evaluate(&self, _t3: &T3) -> CategoryPowers {
        CategoryPowers::new(&[f64::NAN; 3])
    }
}

/// Four-channel stand-in for an external decomposition
struct DiagonalEvaluator;

impl PowerEvaluator for DiagonalEvaluator {
    fn evaluate(&self, t3: &T3) -> CategoryPowers {
        CategoryPowers::new(&[t3.re[0][0], t3.re[1][1], t3.re[2][2], 0.01])
    }
}

#[test]
fn test_labels_follow_dominant_mechanism() {
    init_logging();

    let classifier = GeneralWishart::new(three_mechanism_scene(), pauli_config()).expect("Failed to create classifier");
    assert_eq!(classifier.num_initial_clusters(), 8);
    assert_eq!(classifier.num_classes(), 25);

    let labels = classifier.classify().expect("Classification failed");
    assert!(labels.iter().all(|&l| l != NO_DATA_CLASS && l < classifier.num_classes()));

    // Pauli categories: 0 = T22 (dihedral), 1 = T33 (volume), 2 = T11 (surface)
    for y in 0..16 {
        for x in 0..16 {
            let label = labels[[y, x]];
            let range = if y >= 12 {
                9..=16
            } else if x < 8 {
                17..=24
            } else {
                1..=8
            };
            assert!(range.contains(&label), "pixel ({}, {}) has label {}", x, y, label);
        }
    }

    let model = classifier.model().expect("Model not available");
    assert_eq!(model.initial_population(), 256);
    assert!(model.num_clusters() <= 12);
    assert!(model.iterations() >= 1 && model.iterations() <= 3);
}

#[test]
fn test_pipeline_is_deterministic() {
    let first = GeneralWishart::new(three_mechanism_scene(), pauli_config())
        .expect("Failed to create classifier")
        .classify()
        .expect("Classification failed");
    let second = GeneralWishart::new(three_mechanism_scene(), pauli_config())
        .expect("Failed to create classifier")
        .classify()
        .expect("Classification failed");
    assert_eq!(first, second);
}

#[test]
fn test_all_nan_powers_give_no_data() {
    init_logging();

    let classifier = GeneralWishart::with_evaluator(three_mechanism_scene(), pauli_config(), Box::new(NanEvaluator))
        .expect("Failed to create classifier");
    let labels = classifier.classify().expect("Classification failed");
    assert!(labels.iter().all(|&l| l == NO_DATA_CLASS));

    let model = classifier.model().expect("Model not available");
    assert_eq!(model.initial_population(), 0);
    assert_eq!(model.num_clusters(), 0);
    assert_eq!(model.assignment(3, 3), PixelAssignment::Invalid);
}

#[test]
fn test_mixed_pixels_join_nearest_category() {
    init_logging();

    // a balanced stripe down the middle of the surface/dihedral scene
    let rows: Vec<Vec<T3>> = (0..12)
        .map(|y| {
            (0..12)
                .map(|x| {
                    let s = 1.0 + 0.1 * ((x + 2 * y) % 5) as f64;
                    match x {
                        0..=4 => diag_t3(4.0, 0.5, 0.3).scaled(s),
                        5 => T3::identity().scaled(s),
                        _ => diag_t3(0.5, 4.0, 0.3).scaled(s),
                    }
                })
                .collect()
        })
        .collect();
    let source = QuadPolBands::from_matrices(&rows).expect("Failed to build T3 scene");
    let config = WishartConfig {
        window_size: 1,
        num_initial_classes: 12,
        num_final_classes: 9,
        decomposition: Decomposition::Pauli,
        ..Default::default()
    };
    let classifier = GeneralWishart::new(source, config).expect("Failed to create classifier");
    let labels = classifier.classify().expect("Classification failed");
    let model = classifier.model().expect("Model not available");

    for y in 0..12 {
        assert!(matches!(model.assignment(5, y), PixelAssignment::Floating { .. }));
        assert_ne!(labels[[y, 5]], NO_DATA_CLASS);
        assert!(matches!(
            model.assignment(0, y),
            PixelAssignment::Fixed { category: 2, .. }
        ));
    }
}

#[test]
fn test_external_decomposition_requires_evaluator() {
    let config = WishartConfig {
        decomposition: Decomposition::Touzi,
        ..Default::default()
    };
    assert!(matches!(
        GeneralWishart::new(three_mechanism_scene(), config.clone()),
        Err(SarError::InvalidConfig(_))
    ));

    let classifier = GeneralWishart::with_evaluator(three_mechanism_scene(), config, Box::new(DiagonalEvaluator))
        .expect("Failed to create classifier");
    assert_eq!(classifier.num_initial_clusters(), 22);
    assert_eq!(classifier.num_classes(), 4 * 22 + 1);

    let coding = classifier.build_label_metadata();
    assert_eq!(coding.lookup(23).expect("Label 23 missing").name, "tau_1");

    let labels = classifier.classify().expect("Classification failed");
    assert!(labels.iter().all(|&l| l > 0 && l < classifier.num_classes()));
}

#[test]
fn test_evaluator_channel_mismatch_fails_sticky() {
    // four channels for a three-category decomposition
    let classifier = GeneralWishart::with_evaluator(three_mechanism_scene(), pauli_config(), Box::new(DiagonalEvaluator))
        .expect("Failed to create classifier");

    assert!(matches!(classifier.classify(), Err(SarError::Processing(_))));
    assert!(matches!(
        classifier.compute_tile(polclass::TileRect::new(0, 0, 4, 4)),
        Err(SarError::Processing(_))
    ));
}

#[test]
fn test_cancellation_aborts_classification() {
    let cancel = CancellationToken::new();
    let classifier = GeneralWishart::new(three_mechanism_scene(), pauli_config())
        .expect("Failed to create classifier")
        .with_cancellation(cancel.clone());
    cancel.cancel();

    assert!(matches!(classifier.classify(), Err(SarError::Cancelled { .. })));
}

#[test]
fn test_unknown_decomposition_name() {
    assert!(matches!(
        Decomposition::from_name("Krogager Decomposition"),
        Err(SarError::InvalidConfig(_))
    ));
}

#[test]
fn test_label_metadata() {
    let classifier = GeneralWishart::new(three_mechanism_scene(), WishartConfig::default())
        .expect("Failed to create classifier");
    assert_eq!(classifier.class_band_name(), "General_wishart_class");

    let coding = classifier.build_label_metadata();
    assert_eq!(coding.len(), 91);
    let first = coding.lookup(1).expect("Label 1 missing");
    assert_eq!(first.name, "vol_1");
    assert_eq!(first.description, "Volume 1");
    assert_eq!(coding.lookup(90).expect("Label 90 missing").name, "surf_30");
}

#[test]
fn test_partially_corrupt_pixel_is_excluded() {
    init_logging();

    let source = three_mechanism_scene();
    let mut rows: Vec<Vec<T3>> = (0..16).map(|y| (0..16).map(|x| source.pixel(x, y)).collect()).collect();
    // T12 is never read by the Pauli powers
    rows[2][2].re[0][1] = f64::NAN;
    let source = QuadPolBands::from_matrices(&rows).expect("Failed to build T3 scene");

    let classifier = GeneralWishart::new(source, pauli_config()).expect("Failed to create classifier");
    let labels = classifier.classify().expect("Classification failed");

    assert_eq!(labels[[2, 2]], NO_DATA_CLASS);
    assert_eq!(labels.iter().filter(|&&l| l == NO_DATA_CLASS).count(), 1);

    let model = classifier.model().expect("Model not available");
    assert_eq!(model.assignment(2, 2), PixelAssignment::Invalid);
    assert_eq!(model.initial_population(), 255);
    for center in model.centers().iter().flatten() {
        assert!(center.center().is_finite());
        assert!(center.log_det().is_finite());
    }
}
