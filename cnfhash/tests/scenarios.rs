//! End-to-end scenarios over real files, including compressed input.
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use cnfhash::{gbdhash, isohash2, normalize_file, sanitize_file, IsoHash2Settings};

const REFERENCE: &str = "p cnf 3 2\n1 2 0\n-2 3 0\n";

fn write_cnf(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

fn isohash2_of(path: &Path) -> String {
    isohash2(path, &IsoHash2Settings::default()).unwrap()
}

#[test]
fn reference_instance_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_cnf(dir.path(), "reference.cnf", REFERENCE);

    let first = isohash2_of(&path);
    let second = isohash2_of(&path);

    assert_eq!(first, second);
    assert_eq!(first.len(), 16);
    assert!(first.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
}

#[test]
fn scrambled_copy_matches_reference() {
    let dir = tempfile::tempdir().unwrap();
    let reference = isohash2_of(&write_cnf(dir.path(), "reference.cnf", REFERENCE));

    // clause order and literal order permuted, variables renamed 1->3, 2->1, 3->2
    let scrambled = write_cnf(dir.path(), "scrambled.cnf", "2 -1 0\n1 3 0\n");
    assert_eq!(isohash2_of(&scrambled), reference);
}

#[test]
fn polarity_flipped_copy_differs() {
    let dir = tempfile::tempdir().unwrap();
    let reference = isohash2_of(&write_cnf(dir.path(), "reference.cnf", REFERENCE));

    let flipped = write_cnf(dir.path(), "flipped.cnf", "-1 -2 0\n2 -3 0\n");
    assert_ne!(isohash2_of(&flipped), reference);
}

#[test]
fn duplicated_clause_differs() {
    let dir = tempfile::tempdir().unwrap();
    let reference = isohash2_of(&write_cnf(dir.path(), "reference.cnf", REFERENCE));

    let duplicated = write_cnf(
        dir.path(),
        "duplicated.cnf",
        "p cnf 3 3\n1 2 0\n-2 3 0\n1 2 0\n",
    );
    assert_ne!(isohash2_of(&duplicated), reference);
}

#[test]
fn gzip_input_matches_plain_input() {
    let dir = tempfile::tempdir().unwrap();
    let reference = isohash2_of(&write_cnf(dir.path(), "reference.cnf", REFERENCE));

    let gz_path = dir.path().join("reference.cnf.gz");
    let mut encoder = flate2::write::GzEncoder::new(
        fs::File::create(&gz_path).unwrap(),
        flate2::Compression::default(),
    );
    encoder.write_all(REFERENCE.as_bytes()).unwrap();
    encoder.finish().unwrap();

    assert_eq!(isohash2_of(&gz_path), reference);
    assert_eq!(
        gbdhash(&gz_path).unwrap(),
        "0bfd50f6a60136c8f72c82c9c5fda669"
    );
}

#[test]
fn gbdhash_matches_md5_of_canonical_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_cnf(dir.path(), "reference.cnf", REFERENCE);
    assert_eq!(gbdhash(&path).unwrap(), "0bfd50f6a60136c8f72c82c9c5fda669");

    // comments, header values and whitespace are invisible to the identifier
    let noisy = write_cnf(
        dir.path(),
        "noisy.cnf",
        "c scrambled whitespace\np cnf 99 99\n1   2 0\n-2\n3 0\n",
    );
    assert_eq!(gbdhash(&noisy).unwrap(), "0bfd50f6a60136c8f72c82c9c5fda669");
}

#[test]
fn text_noise_does_not_change_isohash2() {
    let dir = tempfile::tempdir().unwrap();
    let reference = isohash2_of(&write_cnf(dir.path(), "reference.cnf", REFERENCE));

    let noisy = write_cnf(
        dir.path(),
        "noisy.cnf",
        "c comment\np cnf 3 2\n1 2 0\nc another\n-2 3 0\n",
    );
    assert_eq!(isohash2_of(&noisy), reference);
}

#[test]
fn normalizing_twice_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let messy = write_cnf(dir.path(), "messy.cnf", "c x\n1   2\n0\n  -2  3 0");

    let mut first = vec![];
    normalize_file(&messy, &mut first).unwrap();
    assert_eq!(String::from_utf8(first.clone()).unwrap(), REFERENCE);

    let normalized = write_cnf(
        dir.path(),
        "normalized.cnf",
        std::str::from_utf8(&first).unwrap(),
    );
    let mut second = vec![];
    normalize_file(&normalized, &mut second).unwrap();
    assert_eq!(first, second);
}

#[test]
fn sanitizing_twice_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let messy = write_cnf(dir.path(), "messy.cnf", "2 2 1 0\n3 -3 0\n-1 0\n");

    let mut first = vec![];
    sanitize_file(&messy, &mut first).unwrap();
    assert_eq!(
        String::from_utf8(first.clone()).unwrap(),
        "p cnf 2 2\n1 2 0\n-1 0\n"
    );

    let sanitized = write_cnf(
        dir.path(),
        "sanitized.cnf",
        std::str::from_utf8(&first).unwrap(),
    );
    let mut second = vec![];
    sanitize_file(&sanitized, &mut second).unwrap();
    assert_eq!(first, second);
}

#[test]
fn missing_file_reports_the_path() {
    let error = isohash2("no/such/file.cnf", &IsoHash2Settings::default()).unwrap_err();
    assert!(error.to_string().contains("no/such/file.cnf"));
}
