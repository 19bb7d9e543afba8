use hexwfc_rules::loader::load_catalog;
use hexwfc_rules::{AdjacencyRules, Direction, RuleError, StateId};
use std::io::Write;
use std::sync::Arc;

fn test_data_path(filename: &str) -> std::path::PathBuf {
    let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("catalog_data");
    path.push(filename);
    path
}

#[test]
fn test_load_valid_small() {
    let catalog = load_catalog(&test_data_path("valid_small.ron")).expect("catalog should load");
    assert_eq!(catalog.version(), 2);
    assert_eq!(catalog.len(), 4);
    assert_eq!(catalog.edge_labels(), vec!["grass", "path"]);

    let rules = AdjacencyRules::compile(Arc::new(catalog), None, 3).unwrap();
    // GRASS, PATH, PATH_END: 6 rotations * 3 levels; PATH_RAMP: 6 * 2
    assert_eq!(rules.state_count(), 3 * 18 + 12);

    let end = rules.catalog().lookup("PATH_END").unwrap();
    assert!(rules.prevents_chaining(end));

    // Every path edge is matched only by path edges at the same level.
    let path = rules.label_id("path").unwrap();
    for id in 0..rules.state_count() {
        for dir in Direction::ALL {
            let sig = rules.signature(StateId(id), dir);
            if sig.label != path {
                continue;
            }
            let slot = rules.state_slot(StateId(id), dir);
            for candidate in rules.compatible(slot, dir).iter_ones() {
                let theirs = rules.signature(StateId(candidate), dir.opposite());
                assert_eq!(theirs, sig);
            }
        }
    }
}

#[test]
fn test_load_invalid_dup_id() {
    let result = load_catalog(&test_data_path("invalid_dup_id.ron"));
    match result {
        Err(RuleError::DuplicateTile(id)) => assert_eq!(id, "A"),
        other => panic!("Expected DuplicateTile error, got {other:?}"),
    }
}

#[test]
fn test_load_invalid_neg_weight() {
    let result = load_catalog(&test_data_path("invalid_neg_weight.ron"));
    match result {
        Err(RuleError::InvalidTile { tile, reason }) => {
            assert_eq!(tile, "A");
            assert!(reason.contains("weight"));
        }
        other => panic!("Expected InvalidTile error, got {other:?}"),
    }
}

#[test]
fn test_load_missing_file() {
    let result = load_catalog(&test_data_path("does_not_exist.ron"));
    assert!(matches!(result, Err(RuleError::Io(_))));
}

#[test]
fn test_load_unsupported_extension() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "tiles: []").unwrap();
    let result = load_catalog(file.path());
    assert!(matches!(result, Err(RuleError::UnsupportedFormat(ext)) if ext == "yaml"));
}
