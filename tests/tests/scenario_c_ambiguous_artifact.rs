mod common;

use common::store_backed_model;

use fleetop_runtime_planner::{Error, resolve_model_location};

/// A group with more than one file matching its extension hints, and no narrower `files`
/// pattern of its own, is an `AmbiguousArtifact` error rather than an arbitrary pick.
#[test]
fn two_gguf_candidates_are_ambiguous() {
    let model = store_backed_model(&["*"]);
    let staged = vec![
        "chat/a.gguf".to_string(),
        "chat/b.gguf".to_string(),
        "chat/README.md".to_string(),
    ];

    let err = resolve_model_location("chat", &model, &staged, &[".gguf"]).unwrap_err();
    match err {
        Error::AmbiguousArtifact { group, candidates } => {
            assert_eq!(group, "chat");
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("expected AmbiguousArtifact, got {other:?}"),
    }
}

/// When the group's own `files` pattern already narrowed the stager's output to a single
/// file (the Model Stager having applied the glob before this ever runs), resolution trusts
/// that narrowing and skips the extension-hint scan entirely.
#[test]
fn narrower_pattern_disambiguates() {
    let model = store_backed_model(&["a.gguf"]);
    let staged = vec!["chat/a.gguf".to_string()];

    let location = resolve_model_location("chat", &model, &staged, &[".gguf"]).unwrap();
    assert_eq!(
        location,
        fleetop_runtime_planner::ModelLocation::Store {
            path: "chat/a.gguf".to_string(),
        }
    );
}
