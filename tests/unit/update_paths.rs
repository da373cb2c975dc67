//! Version ordering, parsing, and update path computation.

use ratchet_cli::test_utils::ver;
use ratchet_cli::version::{ReleaseVersion, UpdateKind, path_between};

#[test]
fn path_walks_majors_then_minors_then_patches() {
    let steps = path_between(&ver("1.0.0"), &ver("2.1.3"));
    assert_eq!(
        steps,
        vec![ver("2.0.0"), ver("2.1.0"), ver("2.1.1"), ver("2.1.2"), ver("2.1.3")]
    );
}

#[test]
fn path_across_two_majors_lands_exactly_on_target() {
    let steps = path_between(&ver("1.2.3"), &ver("3.1.0"));
    assert_eq!(steps, vec![ver("2.0.0"), ver("3.0.0"), ver("3.1.0")]);
}

#[test]
fn path_within_one_minor_is_each_patch() {
    let steps = path_between(&ver("1.0.0"), &ver("1.0.3"));
    assert_eq!(steps, vec![ver("1.0.1"), ver("1.0.2"), ver("1.0.3")]);
}

#[test]
fn path_over_minors_resets_patch() {
    let steps = path_between(&ver("1.2.9"), &ver("1.4.1"));
    assert_eq!(steps, vec![ver("1.3.0"), ver("1.4.0"), ver("1.4.1")]);
}

#[test]
fn adjacent_versions_yield_a_single_step() {
    assert_eq!(path_between(&ver("1.0.0"), &ver("1.0.1")), vec![ver("1.0.1")]);
    assert_eq!(path_between(&ver("1.2.3"), &ver("2.0.0")), vec![ver("2.0.0")]);
}

#[test]
fn path_to_same_or_older_version_is_empty() {
    assert!(path_between(&ver("2.0.0"), &ver("2.0.0")).is_empty());
    assert!(path_between(&ver("2.0.0"), &ver("1.9.9")).is_empty());
}

#[test]
fn every_step_in_a_path_is_strictly_increasing() {
    let steps = path_between(&ver("0.9.5"), &ver("2.2.2"));
    let mut previous = ver("0.9.5");
    for step in &steps {
        assert!(*step > previous, "{step} does not follow {previous}");
        previous = *step;
    }
    assert_eq!(previous, ver("2.2.2"));
}

#[test]
fn parse_accepts_plain_and_v_prefixed_forms() {
    assert_eq!(ReleaseVersion::parse("1.2.3").unwrap(), ver("1.2.3"));
    assert_eq!(ReleaseVersion::parse("v1.2.3").unwrap(), ver("1.2.3"));
    assert_eq!(ReleaseVersion::parse("V1.2.3").unwrap(), ver("1.2.3"));
    assert_eq!(ReleaseVersion::parse("  2.0.0 ").unwrap(), ver("2.0.0"));
}

#[test]
fn parse_round_trips_through_display() {
    for text in ["0.0.1", "1.0.0", "1.2.3", "10.20.30", "999.999.999"] {
        let version = ReleaseVersion::parse(text).unwrap();
        assert_eq!(version.to_string(), text);
        assert_eq!(ReleaseVersion::parse(&version.to_string()).unwrap(), version);
    }
}

#[test]
fn parse_rejects_malformed_versions() {
    for text in ["", "1", "1.2", "1.2.3.4", "a.b.c", "1.2.x", "-1.2.3", "1.2.3-beta", "1.2.3+build5"] {
        assert!(ReleaseVersion::parse(text).is_err(), "{text:?} should be rejected");
    }
}

#[test]
fn ordering_is_numeric_not_lexicographic() {
    assert!(ver("1.10.0") > ver("1.9.0"));
    assert!(ver("2.0.0") > ver("1.99.99"));
    assert!(ver("0.0.10") > ver("0.0.9"));
}

#[test]
fn update_kind_matches_the_changed_component() {
    let current = ver("1.2.3");
    assert_eq!(ver("2.0.0").update_kind_from(&current), UpdateKind::Major);
    assert_eq!(ver("1.3.0").update_kind_from(&current), UpdateKind::Minor);
    assert_eq!(ver("1.2.4").update_kind_from(&current), UpdateKind::Patch);
    assert_eq!(ver("1.2.3").update_kind_from(&current), UpdateKind::Same);
    assert_eq!(ver("1.2.2").update_kind_from(&current), UpdateKind::Invalid);
    assert_eq!(ver("0.9.9").update_kind_from(&current), UpdateKind::Invalid);
}

#[test]
fn update_kind_agrees_with_path_emptiness() {
    let pairs = [
        ("1.0.0", "2.1.3"),
        ("1.2.3", "1.2.4"),
        ("3.0.0", "3.0.0"),
        ("2.5.0", "2.4.9"),
    ];
    for (from, to) in pairs {
        let kind = ver(to).update_kind_from(&ver(from));
        let path = path_between(&ver(from), &ver(to));
        match kind {
            UpdateKind::Same | UpdateKind::Invalid => {
                assert!(path.is_empty(), "{from} -> {to} should have no path");
            }
            _ => {
                assert_eq!(path.last(), Some(&ver(to)), "{from} -> {to} should end on target");
            }
        }
    }
}
