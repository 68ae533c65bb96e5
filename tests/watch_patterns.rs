// tests/watch_patterns.rs

use std::error::Error;
use std::path::{Path, PathBuf};

use sympack::config::WatchSection;
use sympack::fs::MockFileSystem;
use sympack::watch::{ContentHashes, WatchPatterns, collect_matching_files};

type TestResult = Result<(), Box<dyn Error>>;

fn patterns(paths: &[&str], exts: &[&str]) -> WatchPatterns {
    let paths: Vec<String> = paths.iter().map(|s| s.to_string()).collect();
    let exts: Vec<String> = exts.iter().map(|s| s.to_string()).collect();
    WatchPatterns::new(&paths, &exts).expect("valid patterns")
}

#[test]
fn default_section_matches_sources_by_extension() -> TestResult {
    let p = WatchPatterns::from_section(&WatchSection::default())?;

    assert!(p.matches("src/index.ts"));
    assert!(p.matches("src/deep/nested/util.js"));
    assert!(!p.matches("src/styles.css"));
    assert!(!p.matches("src/Makefile"));
    assert!(!p.matches("test/index.ts"));
    assert!(!p.matches("index.ts"));
    Ok(())
}

#[test]
fn extensions_are_normalised() {
    let p = patterns(&["lib/**"], &[".TS", " mjs "]);
    assert_eq!(p.extensions(), &["ts".to_string(), "mjs".to_string()]);
    assert!(p.matches("lib/a.ts"));
    assert!(p.matches("lib/a.TS"));
    assert!(p.matches("lib/b.mjs"));
}

#[test]
fn invalid_glob_is_an_error() {
    let paths = vec!["src/[".to_string()];
    let exts = vec!["ts".to_string()];
    assert!(WatchPatterns::new(&paths, &exts).is_err());
}

#[test]
fn matches_path_relativises_against_root() {
    let p = patterns(&["src/**"], &["ts"]);
    let root = Path::new("/work/pkg");

    assert_eq!(
        p.matches_path(root, Path::new("/work/pkg/src/a.ts")),
        Some("src/a.ts".to_string())
    );
    assert_eq!(p.matches_path(root, Path::new("/work/pkg/src/a.md")), None);
    assert_eq!(p.matches_path(root, Path::new("/elsewhere/src/a.ts")), None);
}

#[test]
fn base_dirs_are_the_literal_glob_prefixes() {
    let p = patterns(&["src/**", "lib/*.ts", "src/generated/**", "./types/{a,b}.d.ts"], &["ts"]);
    assert_eq!(p.base_dirs(), vec!["lib", "src", "types"]);

    let p = patterns(&["config/app.ts", "scripts/**"], &["ts"]);
    assert_eq!(p.base_dirs(), vec!["config", "scripts"]);
}

#[test]
fn root_glob_covers_every_other_base() {
    let p = patterns(&["src/**", "**/*.ts"], &["ts"]);
    assert_eq!(p.base_dirs(), vec![String::new()]);

    let p = patterns(&["index.ts"], &["ts"]);
    assert_eq!(p.base_dirs(), vec![String::new()]);
}

#[test]
fn scan_collects_matching_files_and_skips_node_modules() -> TestResult {
    let fs = MockFileSystem::new();
    let root = PathBuf::from("/pkg");
    fs.add_file(root.join("src/index.ts"), "export {}");
    fs.add_file(root.join("src/util/math.js"), "module.exports = {}");
    fs.add_file(root.join("src/readme.md"), "# docs");
    fs.add_file(root.join("src/node_modules/dep/index.ts"), "");
    fs.add_file(root.join(".cache/src/x.ts"), "");
    fs.add_file(root.join("package.json"), "{}");

    let files = collect_matching_files(&fs, &root, &patterns(&["src/**"], &["ts", "js"]))?;

    assert_eq!(
        files,
        vec![root.join("src/index.ts"), root.join("src/util/math.js")]
    );
    Ok(())
}

#[test]
fn content_hashes_ignore_identical_saves() {
    let fs = MockFileSystem::new();
    let a = PathBuf::from("/pkg/src/a.ts");
    let b = PathBuf::from("/pkg/src/b.ts");
    fs.add_file(&a, "const a = 1;");

    let mut hashes = ContentHashes::new();
    hashes.seed(&fs, [&a]);
    assert_eq!(hashes.len(), 1);

    assert!(!hashes.has_changed(&fs, &a), "same bytes are not a change");

    fs.add_file(&a, "const a = 2;");
    assert!(hashes.has_changed(&fs, &a));
    assert!(!hashes.has_changed(&fs, &a));

    fs.add_file(&b, "new");
    assert!(hashes.has_changed(&fs, &b), "unknown file counts as changed");

    fs.remove_file(&a);
    assert!(hashes.has_changed(&fs, &a), "removal counts as changed");
    assert_eq!(hashes.len(), 1);
}
