use polclass::core::{Decomposition, HAlphaPlane, WishartConfig};
use polclass::types::MatrixKind;

#[test]
fn test_partial_json_uses_defaults() {
    let config: WishartConfig = serde_json::from_str(
        r#"{ "window_size": 7, "decomposition": "Yamaguchi", "h_alpha_plane": "Lee" }"#,
    )
    .expect("Failed to parse config");

    assert_eq!(config.window_size, 7);
    assert_eq!(config.decomposition, Decomposition::Yamaguchi);
    assert_eq!(config.h_alpha_plane, HAlphaPlane::Lee);
    assert_eq!(config.max_iterations, 3);
    assert_eq!(config.num_initial_classes, 90);
    assert_eq!(config.num_final_classes, 15);
    assert_eq!(config.tile_size, 256);
    assert!((config.mixed_category_threshold - 0.5).abs() < f64::EPSILON);

    // Yamaguchi has four categories
    assert!(config.validate(config.decomposition.num_categories()).is_ok());
    assert_eq!(config.num_initial_clusters(4), 22);
}

#[test]
fn test_config_round_trip() {
    let config = WishartConfig {
        num_final_classes: 9,
        decomposition: Decomposition::Cloude,
        ..Default::default()
    };
    let json = serde_json::to_string(&config).expect("Failed to serialize config");
    let back: WishartConfig = serde_json::from_str(&json).expect("Failed to parse config");
    assert_eq!(back, config);
}

#[test]
fn test_empty_json_is_default() {
    let config: WishartConfig = serde_json::from_str("{}").expect("Failed to parse config");
    assert_eq!(config, WishartConfig::default());
}

#[test]
fn test_unknown_decomposition_in_json_rejected() {
    let result = serde_json::from_str::<WishartConfig>(r#"{ "decomposition": "Krogager" }"#);
    assert!(result.is_err());
}

#[test]
fn test_matrix_kind_from_json() {
    let kind: MatrixKind = serde_json::from_str(r#""C3""#).expect("Failed to parse matrix kind");
    assert_eq!(kind, MatrixKind::C3);
    assert_eq!(kind.dimension(), 3);
}
