use std::time::Duration;

/// Output captured from one external process run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    /// Exit code from the process (-1 when terminated by a signal)
    pub exit_code: i32,
    /// Raw stdout bytes, exactly as written by the process
    pub stdout: Vec<u8>,
    /// Stdout split into lines with line terminators removed
    pub stdout_lines: Vec<String>,
    /// Combined stderr output
    pub stderr: String,
    /// Duration of execution
    pub duration: Duration,
}

impl ProcessResult {
    pub fn new(exit_code: i32, stdout: Vec<u8>, stderr: Vec<u8>, duration: Duration) -> Self {
        let stdout_lines = split_lines(&stdout);
        Self {
            exit_code,
            stdout,
            stdout_lines,
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            duration,
        }
    }

    /// Build a result from already-decoded stdout text
    pub fn from_text(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Self::new(
            exit_code,
            stdout.as_bytes().to_vec(),
            stderr.as_bytes().to_vec(),
            Duration::ZERO,
        )
    }

    /// Check if the process exited successfully
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stderr with surrounding whitespace removed, for error messages
    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }
}

/// Split stdout into lines.
///
/// `\n` and `\r\n` terminators are removed. Empty lines are kept, including
/// blank lines at the end of the output; only the final terminator does not
/// open a new line.
fn split_lines(stdout: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines_strips_terminators() {
        let result = ProcessResult::from_text(0, "a;1\r\nb;2\n", "");
        assert_eq!(result.stdout_lines, vec!["a;1", "b;2"]);
    }

    #[test]
    fn test_split_lines_keeps_blank_lines() {
        let result = ProcessResult::from_text(0, "a\n\nb\n\n", "");
        assert_eq!(result.stdout_lines, vec!["a", "", "b", ""]);
    }

    #[test]
    fn test_empty_output_has_no_lines() {
        let result = ProcessResult::from_text(0, "", "");
        assert!(result.stdout_lines.is_empty());
        assert!(result.success());
    }

    #[test]
    fn test_raw_stdout_preserved() {
        let bytes = vec![0xff, 0x00, b'\n', 0x80];
        let result = ProcessResult::new(3, bytes.clone(), b" oops \n".to_vec(), Duration::ZERO);
        assert_eq!(result.stdout, bytes);
        assert_eq!(result.stderr_trimmed(), "oops");
        assert!(!result.success());
    }
}
