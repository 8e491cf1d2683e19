use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, trace};

use crate::types::{ChangedFiles, RevisionId};

/// Tool output that does not have the expected shape
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to parse tool output line {line_number} ({reason}): {line:?}")]
pub struct ParseError {
    /// 1-based line number within the tool output
    pub line_number: usize,
    /// The offending line, verbatim
    pub line: String,
    pub reason: &'static str,
}

/// Parse `list-changed-files` output into a path -> base revision map.
///
/// Every line must be `<path>;<revision>`. A `;` inside the path is written
/// as `\;`. The revision token `NULL` marks a newly added file. Blank lines
/// at the very end are ignored; anything else malformed fails the whole
/// parse and no partial map is returned. Duplicate paths: last one wins.
pub fn parse_changed_files<I, S>(lines: I) -> Result<ChangedFiles, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let lines: Vec<S> = lines.into_iter().collect();
    let content_len = lines
        .iter()
        .rposition(|l| !l.as_ref().trim().is_empty())
        .map_or(0, |i| i + 1);

    let mut result = ChangedFiles::new();

    for (index, line) in lines[..content_len].iter().enumerate() {
        let line: &str = line.as_ref();
        let (path, revision) = split_entry(line).map_err(|reason| ParseError {
            line_number: index + 1,
            line: line.to_string(),
            reason,
        })?;

        trace!(path = %path, revision = %revision, "Parsed changed file");
        result.insert(PathBuf::from(path), RevisionId::parse(revision));
    }

    debug!(entries = result.len(), "Parsed changed files");

    Ok(result)
}

/// Parse raw `list-changed-files` stdout.
///
/// Paths that are not valid UTF-8 cannot be handed back to the tool
/// unchanged, so such output fails with a `ParseError` on the offending line
/// instead of being decoded lossily.
pub fn parse_changed_output(stdout: &[u8]) -> Result<ChangedFiles, ParseError> {
    let text = std::str::from_utf8(stdout).map_err(|e| {
        let valid = &stdout[..e.valid_up_to()];
        let start = valid.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
        let end = stdout[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(stdout.len(), |i| start + i);

        ParseError {
            line_number: valid.iter().filter(|&&b| b == b'\n').count() + 1,
            line: String::from_utf8_lossy(&stdout[start..end])
                .trim_end_matches('\r')
                .to_string(),
            reason: "invalid UTF-8",
        }
    })?;

    parse_changed_files(text.lines())
}

/// Split one `<path>;<revision>` line.
///
/// Revisions never contain `;`, so the delimiter is the last `;` and a path
/// may end in a backslash (`C:\dir\;r1`). Any other `;` must be escaped.
fn split_entry(line: &str) -> Result<(String, &str), &'static str> {
    if line.is_empty() {
        return Err("empty line");
    }

    let delimiter = line.rfind(';').ok_or("missing ';' delimiter")?;
    let path = unescape_path(&line[..delimiter])?;
    let revision = &line[delimiter + 1..];

    if path.is_empty() {
        return Err("empty path");
    }
    if revision.is_empty() {
        return Err("empty revision");
    }

    Ok((path, revision))
}

/// Turn `\;` into `;`; other backslashes stay as they are
fn unescape_path(raw: &str) -> Result<String, &'static str> {
    let mut path = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&';') => {
                path.push(';');
                chars.next();
            }
            ';' => return Err("more than one ';' delimiter"),
            _ => path.push(c),
        }
    }

    Ok(path)
}

/// Parse `get-vcs-root` output.
///
/// The first non-blank line is the root. No output at all, or only blank
/// lines, means the directory is not under version control.
pub fn parse_root_line<I, S>(lines: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .find_map(|l| {
            let trimmed = l.as_ref().trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_parse_null_and_literal_revisions() {
        let parsed = parse_changed_files(["a.txt;NULL", "b.txt;r5"]).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[Path::new("a.txt")], RevisionId::Null);
        assert_eq!(
            parsed[Path::new("b.txt")],
            RevisionId::Text("r5".to_string())
        );
    }

    #[test]
    fn test_parse_absolute_paths() {
        let parsed = parse_changed_files([
            "/home/user/project/src/main.rs;4f2a9c1",
            "/home/user/project/README.md;NULL",
        ])
        .unwrap();

        assert_eq!(
            parsed[Path::new("/home/user/project/src/main.rs")].as_str(),
            "4f2a9c1"
        );
        assert!(parsed[Path::new("/home/user/project/README.md")].is_null());
    }

    #[test]
    fn test_parse_missing_semicolon_fails() {
        let err = parse_changed_files(["malformed-line-no-semicolon"]).unwrap_err();
        assert_eq!(err.line_number, 1);
        assert_eq!(err.line, "malformed-line-no-semicolon");
    }

    #[test]
    fn test_parse_error_discards_partial_results() {
        let err = parse_changed_files(["good.txt;r1", "bad line", "other.txt;r2"]).unwrap_err();
        assert_eq!(err.line_number, 2);
        assert!(err.to_string().contains("bad line"));
    }

    #[test]
    fn test_parse_empty_parts_fail() {
        assert_eq!(
            parse_changed_files([";r1"]).unwrap_err().reason,
            "empty path"
        );
        assert_eq!(
            parse_changed_files(["a.txt;"]).unwrap_err().reason,
            "empty revision"
        );
    }

    #[test]
    fn test_parse_extra_delimiter_fails() {
        let err = parse_changed_files(["a.txt;r1;r2"]).unwrap_err();
        assert_eq!(err.reason, "more than one ';' delimiter");
    }

    #[test]
    fn test_parse_escaped_semicolon_in_path() {
        let parsed = parse_changed_files([r"/tmp/odd\;name.txt;r9"]).unwrap();
        assert_eq!(parsed[Path::new("/tmp/odd;name.txt")].as_str(), "r9");
    }

    #[test]
    fn test_parse_keeps_other_backslashes() {
        let parsed = parse_changed_files([r"C:\work\a.txt;r1"]).unwrap();
        assert!(parsed.contains_key(Path::new(r"C:\work\a.txt")));
    }

    #[test]
    fn test_parse_path_ending_in_backslash() {
        let parsed = parse_changed_files([r"C:\dir\;r1", r"C:\odd\;name\;r2"]).unwrap();
        assert_eq!(parsed[Path::new(r"C:\dir\")].as_str(), "r1");
        assert_eq!(parsed[Path::new(r"C:\odd;name\")].as_str(), "r2");
    }

    #[test]
    fn test_parse_last_semicolon_is_delimiter() {
        // Even when escaped, the last ';' splits off the revision
        let parsed = parse_changed_files([r"a\;b\;c"]).unwrap();
        assert_eq!(parsed[Path::new(r"a;b\")].as_str(), "c");
    }

    #[test]
    fn test_parse_output_bytes() {
        let parsed = parse_changed_output(b"/repo/a.txt;r1\r\n/repo/b.txt;NULL\n").unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parsed[Path::new("/repo/b.txt")].is_null());
    }

    #[test]
    fn test_parse_output_rejects_invalid_utf8() {
        let err = parse_changed_output(b"/repo/a.txt;r1\n/repo/\xffbad.txt;r2\n/repo/c;r3\n")
            .unwrap_err();
        assert_eq!(err.line_number, 2);
        assert_eq!(err.reason, "invalid UTF-8");
        assert_eq!(err.line, "/repo/\u{fffd}bad.txt;r2");
    }

    #[test]
    fn test_parse_empty_input_is_empty_map() {
        let lines: Vec<String> = Vec::new();
        assert!(parse_changed_files(lines).unwrap().is_empty());
    }

    #[test]
    fn test_parse_ignores_trailing_blank_lines_only() {
        let parsed = parse_changed_files(["a.txt;r1", "", ""]).unwrap();
        assert_eq!(parsed.len(), 1);

        let err = parse_changed_files(["a.txt;r1", "", "b.txt;r2"]).unwrap_err();
        assert_eq!(err.line_number, 2);
        assert_eq!(err.reason, "empty line");
    }

    #[test]
    fn test_parse_duplicate_path_last_wins() {
        let parsed = parse_changed_files(["a.txt;r1", "a.txt;r2"]).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[Path::new("a.txt")].as_str(), "r2");
    }

    #[test]
    fn test_root_line_first_non_blank() {
        assert_eq!(
            parse_root_line(["", "  /repo/root  ", "/ignored"]),
            Some(PathBuf::from("/repo/root"))
        );
    }

    #[test]
    fn test_root_line_absent() {
        let none: [&str; 0] = [];
        assert_eq!(parse_root_line(none), None);
        assert_eq!(parse_root_line(["", "   "]), None);
    }
}
