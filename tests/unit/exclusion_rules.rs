//! Protected-path rules as embedders and the install scanner use them.
//!
//! The built-in pattern behaviors are covered next to the implementation;
//! these tests exercise custom rule sets and the raw-string matching used
//! when walking an existing installation.

use ratchet_cli::paths::exclusions::DEFAULT_EXCLUDE_PATTERNS;
use ratchet_cli::paths::{ExclusionRules, RelativePath};
use ratchet_cli::test_utils::rel;

#[test]
fn custom_rule_sets_do_not_inherit_the_defaults() {
    let rules = ExclusionRules::from_patterns(["plugins/", "*.sqlite", "settings.ini"]).unwrap();

    assert!(rules.is_protected(&rel("plugins")));
    assert!(rules.is_protected(&rel("plugins/extra/mod.py")));
    assert!(rules.is_protected(&rel("data/index.sqlite")));
    assert!(rules.is_protected(&rel("settings.ini")));
    assert!(rules.is_protected(&rel("profiles/work/settings.ini")));

    // Nothing from the default set applies unless it was passed in.
    assert!(!rules.is_protected(&rel("user_data/projects.db")));
    assert!(!rules.is_protected(&rel("version.txt")));
}

#[test]
fn defaults_can_be_extended_with_deployment_patterns() {
    let rules = ExclusionRules::from_patterns(
        DEFAULT_EXCLUDE_PATTERNS.iter().copied().chain(["licenses/"]),
    )
    .unwrap();

    assert!(rules.is_protected(&rel("licenses/site.lic")));
    assert!(rules.is_protected(&rel("user_data/projects.db")));
}

#[test]
fn question_mark_and_class_globs_match_file_names() {
    let rules = ExclusionRules::from_patterns(["v?.dat", "shard[0-9].bin"]).unwrap();

    assert!(rules.is_protected(&rel("v1.dat")));
    assert!(rules.is_protected(&rel("state/v2.dat")));
    assert!(rules.is_protected(&rel("shard7.bin")));
    assert!(!rules.is_protected(&rel("v10.dat")));
    assert!(!rules.is_protected(&rel("shardx.bin")));
}

#[test]
fn multi_component_prefixes_protect_only_their_subtree() {
    let rules = ExclusionRules::from_patterns(["data/cache/"]).unwrap();

    assert!(rules.is_protected(&rel("data/cache")));
    assert!(rules.is_protected(&rel("data/cache/page.bin")));
    assert!(!rules.is_protected(&rel("data/other/page.bin")));
    assert!(!rules.is_protected(&rel("data")));
}

#[test]
fn matching_rule_reports_the_first_hit_in_pattern_order() {
    let rules = ExclusionRules::from_patterns(["data/", "data/cache/"]).unwrap();

    assert_eq!(rules.matching_rule(&rel("data/cache/page.bin")), Some("data/"));
}

#[test]
fn raw_matching_normalizes_dot_and_empty_segments() {
    let rules = ExclusionRules::default();

    assert!(rules.is_protected_raw("./user_data/projects.db"));
    assert!(rules.is_protected_raw("logs//app.log"));
    assert!(rules.is_protected_raw("version.txt"));
    assert!(!rules.is_protected_raw("./src/app.py"));
}

#[test]
fn raw_matching_covers_names_that_fail_path_validation() {
    // Files found on disk never went through manifest validation, so the
    // scanner must classify names RelativePath refuses.
    let odd = "cache/session:1.tmp";
    assert!(RelativePath::new(odd).is_err());

    let rules = ExclusionRules::default();
    assert!(rules.is_protected_raw(odd));
}

#[test]
fn cloned_rules_match_like_the_original() {
    let rules = ExclusionRules::from_patterns(["reports/"]).unwrap();
    let copy = rules.clone();

    assert!(copy.is_protected(&rel("reports/q3.pdf")));
    assert_eq!(copy.matching_rule(&rel("reports/q3.pdf")), rules.matching_rule(&rel("reports/q3.pdf")));
}
