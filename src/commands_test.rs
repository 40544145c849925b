use crate::commands::*;
use crate::config::{FindNewOptions, RecordOptions};
use crate::error::{FingerprintError, SmartError, SmartExpectedError};
use crate::fingerprint::hash_bytes;
use crate::progress::NoProgress;
use crate::testing::{self, payload, seeded_library, write_file, StubTagReader};
use std::fs;
use std::path::Path;

fn record_options(directory: &Path, db_path: &Path) -> RecordOptions {
    RecordOptions {
        directory: directory.to_path_buf(),
        db_path: db_path.to_path_buf(),
        reparse: false,
        dop: 4,
    }
}

fn find_new_options(directory: &Path, db_path: &Path) -> FindNewOptions {
    FindNewOptions {
        directory: directory.to_path_buf(),
        db_path: db_path.to_path_buf(),
        rehash: false,
        dop: 4,
        folders_only: false,
    }
}

fn output(buf: Vec<u8>) -> String {
    String::from_utf8(buf).unwrap()
}

#[test]
fn test_sum_prints_quoted_path_and_hash() {
    let dir = testing::init();
    let path = write_file(dir.path(), "song.mp3", &payload(5, 600));

    let mut out = Vec::new();
    sum(&mut out, &[path.clone()]).unwrap();
    let expected = format!("{:?}: {}\n", path, hash_bytes(&payload(5, 600)).unwrap());
    assert_eq!(output(out), expected);
}

#[test]
fn test_sum_expands_directories() {
    let dir = testing::init();
    let paths = seeded_library(dir.path());

    let mut out = Vec::new();
    sum(&mut out, &[dir.path().to_path_buf()]).unwrap();
    let out = output(out);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), paths.len());

    let first = hash_bytes(&payload(1, 4096)).unwrap();
    assert_eq!(lines.iter().filter(|l| l.ends_with(&first)).count(), 3);
    let mut sorted = lines.clone();
    sorted.sort();
    assert_eq!(lines, sorted);
}

#[test]
fn test_sum_stops_at_short_file() {
    let dir = testing::init();
    let good = write_file(dir.path(), "good.mp3", &payload(5, 600));
    let short = write_file(dir.path(), "short.mp3", &[0x90u8; 64]);
    let never = write_file(dir.path(), "never.mp3", &payload(6, 600));

    let mut out = Vec::new();
    let err = sum(&mut out, &[good, short, never]).unwrap_err();
    assert!(matches!(err, SmartError::Fingerprint(FingerprintError::TooShort { len: 64 })));
    assert_eq!(output(out).lines().count(), 1);
}

#[test]
fn test_record_then_find_new() {
    let dir = testing::init();
    let db = dir.path().join("catalog.sql");
    let lib = dir.path().join("lib");
    let paths = seeded_library(&lib);

    let mut out = Vec::new();
    find_new(&mut out, find_new_options(&lib, &db), &NoProgress).unwrap();
    let out = output(out);
    let mut expected: Vec<String> = paths
        .iter()
        .map(|p| fs::canonicalize(p).unwrap().display().to_string())
        .collect();
    expected.sort();
    expected.push("(5 new songs)".to_string());
    assert_eq!(out.lines().collect::<Vec<_>>(), expected);

    let mut out = Vec::new();
    record(
        &mut out,
        record_options(&lib, &db),
        &StubTagReader::default(),
        &NoProgress,
    )
    .unwrap();
    assert_eq!(output(out), "(5 songs recorded, 0 reused, 0 skipped)\n");

    let mut out = Vec::new();
    find_new(&mut out, find_new_options(&lib, &db), &NoProgress).unwrap();
    assert_eq!(output(out), "(0 new songs)\n");
}

#[test]
fn test_find_new_folders_only() {
    let dir = testing::init();
    let db = dir.path().join("catalog.sql");
    let lib = dir.path().join("lib");
    seeded_library(&lib);

    let mut out = Vec::new();
    let options = FindNewOptions {
        folders_only: true,
        ..find_new_options(&lib, &db)
    };
    find_new(&mut out, options, &NoProgress).unwrap();

    let root = fs::canonicalize(&lib).unwrap();
    let expected = format!(
        "{}\n{}\n{}\n(5 new songs)\n",
        root.join("a").display(),
        root.join("b").display(),
        root.join("c").display()
    );
    assert_eq!(output(out), expected);
}

#[test]
fn test_bad_input_does_not_create_database() {
    let dir = testing::init();
    let db = dir.path().join("catalog.sql");

    let mut out = Vec::new();
    let err = find_new(
        &mut out,
        find_new_options(&dir.path().join("missing"), &db),
        &NoProgress,
    )
    .unwrap_err();
    assert!(matches!(err, SmartError::Expected(SmartExpectedError::NotADirectory { .. })));

    let file = write_file(dir.path(), "file.mp3", &payload(1, 200));
    let err = record(
        &mut out,
        record_options(&file, &db),
        &StubTagReader::default(),
        &NoProgress,
    )
    .unwrap_err();
    assert!(matches!(err, SmartError::Expected(SmartExpectedError::NotADirectory { .. })));

    let options = RecordOptions {
        dop: 0,
        ..record_options(dir.path(), &db)
    };
    let err = record(&mut out, options, &StubTagReader::default(), &NoProgress).unwrap_err();
    assert!(matches!(
        err,
        SmartError::Expected(SmartExpectedError::InvalidParallelism { dop: 0 })
    ));

    assert!(out.is_empty());
    assert!(!db.exists());
}
