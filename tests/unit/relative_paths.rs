//! Manifest path validation.

use std::path::Path;

use ratchet_cli::paths::RelativePath;

#[test]
fn ordinary_relative_paths_are_accepted() {
    for text in [
        "main.py",
        "bin/app.py",
        "lib/nested/deep/module.py",
        "requirements.txt",
        "assets/logo v2.png",
        "dir.with.dots/file",
    ] {
        assert!(RelativePath::new(text).is_ok(), "{text:?} should be accepted");
    }
}

#[test]
fn traversal_and_absolute_paths_are_rejected() {
    for text in [
        "../etc/passwd",
        "a/../../b",
        "lib/../..",
        "/etc/passwd",
        "//server/share",
        "..",
    ] {
        assert!(RelativePath::new(text).is_err(), "{text:?} should be rejected");
    }
}

#[test]
fn foreign_separators_and_expansion_characters_are_rejected() {
    for text in [
        "windows\\style\\path",
        "mixed/and\\back",
        "~/.bashrc",
        "$HOME/file",
        "%APPDATA%/file",
        "C:/Windows/System32",
        "cmd`whoami`",
        "a;b",
        "a|b",
        "a&b",
    ] {
        assert!(RelativePath::new(text).is_err(), "{text:?} should be rejected");
    }
}

#[test]
fn empty_and_blank_paths_are_rejected() {
    assert!(RelativePath::new("").is_err());
    assert!(RelativePath::new("   ").is_err());
}

#[test]
fn join_under_stays_below_the_base_directory() {
    let base = Path::new("/opt/app");
    let joined = RelativePath::new("lib/util.py").unwrap().join_under(base);
    assert_eq!(joined, Path::new("/opt/app/lib/util.py"));
    assert!(joined.starts_with(base));
}

#[test]
fn components_skip_empty_and_current_dir_segments() {
    let path = RelativePath::new("./lib//util.py").unwrap();
    assert_eq!(path.components().collect::<Vec<_>>(), vec!["lib", "util.py"]);
    assert_eq!(path.file_name(), "util.py");
}

#[test]
fn display_preserves_the_wire_form() {
    let path = RelativePath::new("bin/tool.py").unwrap();
    assert_eq!(path.to_string(), "bin/tool.py");
    assert_eq!(path.as_str(), "bin/tool.py");
}
