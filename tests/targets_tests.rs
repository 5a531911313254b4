use std::fs;

use hx_scan_rs::targets::{default_output_dir, load_targets_from_path};

#[test]
fn load_reads_file_and_skips_blanks() {
    let path = std::env::temp_dir().join(format!("hx-scan-rs-targets-{}.txt", std::process::id()));
    fs::write(&path, "example.com\n\n  10.0.0.1:9999  \nhttps://a.test/\nexample.com\n").unwrap();

    let targets = load_targets_from_path(&path).expect("load ok");
    assert_eq!(
        targets,
        vec!["example.com", "10.0.0.1:9999", "https://a.test/", "example.com"]
    );
    assert!(default_output_dir(&path).ends_with("_output"));
    fs::remove_file(&path).unwrap();
}

#[test]
fn missing_file_is_an_error() {
    let path = std::env::temp_dir().join("hx-scan-rs-definitely-missing.txt");
    let err = load_targets_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("failed to read targets file"));
}
