use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse target-list content into scan targets (IPs, domains or URLs).
///
/// - one target per line, surrounding whitespace trimmed
/// - blank lines are skipped
/// - order and duplicates are preserved; each occurrence is scanned
pub fn parse_targets_str(s: &str) -> Vec<String> {
    s.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load a target list from a file path. Errors if the file cannot be read.
pub fn load_targets_from_path(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read targets file: {}", path.as_ref().display()))?;
    Ok(parse_targets_str(&content))
}

/// Default output directory for an input file: `<stem>_output`.
pub fn default_output_dir(input: impl AsRef<Path>) -> String {
    let stem = input
        .as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scan".to_string());
    format!("{stem}_output")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_and_skips_blank_lines() {
        let input = "  example.com \n\n\t10.0.0.1:9999\n   \nhttps://a.test/path\n";
        assert_eq!(
            parse_targets_str(input),
            vec!["example.com", "10.0.0.1:9999", "https://a.test/path"]
        );
    }

    #[test]
    fn parse_keeps_duplicates_in_order() {
        let input = "b.test\na.test\nb.test\n";
        assert_eq!(parse_targets_str(input), vec!["b.test", "a.test", "b.test"]);
    }

    #[test]
    fn parse_handles_crlf() {
        assert_eq!(parse_targets_str("a.test\r\nb.test\r\n"), vec!["a.test", "b.test"]);
    }

    #[test]
    fn output_dir_from_stem() {
        assert_eq!(default_output_dir("lists/hosts.txt"), "hosts_output");
        assert_eq!(default_output_dir("targets"), "targets_output");
    }
}
