//! Manifest payloads as the release history actually serves them.
//!
//! Shape selection and list validation are tested next to the parser; these
//! tests pin the looser wire conventions: advisory metadata, key-presence
//! dependency signaling, and scalar truthiness.

use ratchet_cli::core::RatchetError;
use ratchet_cli::manifest::Manifest;
use ratchet_cli::paths::ExclusionRules;
use ratchet_cli::test_utils::{rel, ver};

#[test]
fn realistic_payload_keeps_operations_and_drops_advisory_metadata() {
    let raw = br#"{
        "version": "2.3.0",
        "release_notes": "Rework of the sync engine.\nSee CHANGELOG for details.",
        "build_date": "2025-11-03T09:14:00Z",
        "min_app_version": "2.0.0",
        "req.txt": "requirements.txt",
        "codebase": {
            "directory": "codebase/code",
            "dependencies": "See requirements.txt in codebase",
            "files_add": ["sync/engine.py", "sync/retry.py"],
            "files_edit": ["app.py", "cli/commands.py"],
            "files_delete": ["sync/legacy.py"]
        }
    }"#;

    let manifest = Manifest::parse_json(raw, &ver("2.3.0")).unwrap();
    assert_eq!(manifest.version(), ver("2.3.0"));
    assert_eq!(manifest.files_add(), &[rel("sync/engine.py"), rel("sync/retry.py")]);
    assert_eq!(manifest.files_edit(), &[rel("app.py"), rel("cli/commands.py")]);
    assert_eq!(manifest.files_delete(), &[rel("sync/legacy.py")]);
    assert!(manifest.requires_dependency_install());
    assert_eq!(manifest.operation_count(), 6);
}

#[test]
fn metadata_only_payload_yields_an_empty_manifest() {
    let raw = br#"{ "version": "1.0.1", "release_notes": "docs only" }"#;

    let manifest = Manifest::parse_json(raw, &ver("1.0.1")).unwrap();
    assert!(manifest.files_add().is_empty());
    assert!(manifest.files_edit().is_empty());
    assert!(manifest.files_delete().is_empty());
    assert!(!manifest.requires_dependency_install());
    assert_eq!(manifest.operation_count(), 0);
}

#[test]
fn dependency_signal_follows_key_presence_not_value() {
    // Old payloads put an empty string under "req.txt"; the key itself is
    // the signal.
    let empty_value = br#"{ "req.txt": "", "files_edit": ["app.py"] }"#;
    let manifest = Manifest::parse_json(empty_value, &ver("1.0.2")).unwrap();
    assert!(manifest.requires_dependency_install());

    // JSON null reads as an absent key.
    let null_value = br#"{ "req.txt": null, "files_edit": ["app.py"] }"#;
    let manifest = Manifest::parse_json(null_value, &ver("1.0.2")).unwrap();
    assert!(!manifest.requires_dependency_install());
}

#[test]
fn dependency_value_truthiness_matches_the_release_history() {
    let cases: &[(&str, bool)] = &[
        (r#"{ "dependencies": true }"#, true),
        (r#"{ "dependencies": false }"#, false),
        (r#"{ "dependencies": 0 }"#, false),
        (r#"{ "dependencies": 0.0 }"#, false),
        (r#"{ "dependencies": 2 }"#, true),
        (r#"{ "dependencies": "" }"#, false),
        (r#"{ "dependencies": "0" }"#, true),
        (r#"{ "dependencies": {} }"#, false),
        (r#"{ "dependencies": { "requests": ">=2.31" } }"#, true),
        (r#"{ "dependencies": ["requests"] }"#, true),
    ];

    for (raw, expected) in cases {
        let manifest = Manifest::parse_json(raw.as_bytes(), &ver("1.0.2")).unwrap();
        assert_eq!(
            manifest.requires_dependency_install(),
            *expected,
            "wrong install signal for payload {raw}"
        );
    }
}

#[test]
fn dependency_only_step_counts_as_one_operation() {
    let raw = br#"{ "req.txt": "requirements.txt" }"#;

    let manifest = Manifest::parse_json(raw, &ver("1.3.0")).unwrap();
    assert_eq!(manifest.operation_count(), 1);
    assert!(manifest.files_add().is_empty());
}

#[test]
fn manifest_version_key_is_an_accepted_alias() {
    let raw = br#"{ "manifest_version": "1.4.0", "files_add": ["a.py"] }"#;

    let manifest = Manifest::parse_json(raw, &ver("1.4.0")).unwrap();
    assert_eq!(manifest.version(), ver("1.4.0"));
}

#[test]
fn blank_and_foreign_separator_entries_fail_validation() {
    for entry in ["   ", "lib\\\\util.py"] {
        let raw = format!(r#"{{ "files_add": ["{entry}"] }}"#);
        let error = Manifest::parse_json(raw.as_bytes(), &ver("1.0.1")).unwrap_err();
        assert!(
            matches!(
                error.downcast_ref::<RatchetError>(),
                Some(RatchetError::PathValidationFailed { .. })
            ),
            "expected PathValidationFailed for entry {entry:?}"
        );
    }
}

#[test]
fn overlap_error_names_the_duplicated_path() {
    let raw = br#"{
        "files_add": ["bin/app.py", "bin/worker.py"],
        "files_delete": ["bin/worker.py"]
    }"#;

    let error = Manifest::parse_json(raw, &ver("1.0.1")).unwrap_err();
    assert!(error.to_string().contains("bin/worker.py"));
}

#[test]
fn ensure_allowed_names_the_operation_and_the_rule() {
    let rules = ExclusionRules::from_patterns(["assets/"]).unwrap();
    let manifest = Manifest::new(
        ver("1.1.0"),
        vec![],
        vec![rel("assets/logo.png")],
        vec![],
        false,
    )
    .unwrap();

    let error = manifest.ensure_allowed(&rules).unwrap_err();
    let text = error.to_string();
    assert!(text.contains("refuses to edit protected path 'assets/logo.png'"), "got: {text}");
    assert!(text.contains("rule 'assets/'"), "got: {text}");
}
