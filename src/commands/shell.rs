//! Shell command handler.
//!
//! Runs the raw command line through the host shell with no sandboxing.
//! This namespace is dangerous by design; it exists behind this seam so
//! the rest of the dispatcher treats it as just another fallible handler.

use tokio::process::Command;

use super::{CommandError, CommandReply};

/// How many trailing output lines a reply keeps.
const MAX_OUTPUT_LINES: usize = 15;

/// Execute the raw line via `sh -c` and format the reply.
///
/// Non-empty stderr wins over stdout; stdout is truncated to its final
/// [`MAX_OUTPUT_LINES`] lines (never the leading ones).
pub async fn run(line: &str) -> Result<CommandReply, CommandError> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(line)
        .output()
        .await
        .map_err(|e| CommandError::Execution(e.to_string()))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        let message = if stderr.trim().is_empty() {
            format!("command exited with {}", output.status)
        } else {
            stderr.trim_end().to_string()
        };
        return Err(CommandError::Execution(message));
    }
    if !stderr.trim().is_empty() {
        return Err(CommandError::Execution(stderr.trim_end().to_string()));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(CommandReply::Text(format!(
        "Output:\n{}",
        tail_lines(&stdout, MAX_OUTPUT_LINES)
    )))
}

/// Keep the last `max` newline-separated lines, in original order.
pub fn tail_lines(text: &str, max: usize) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let start = lines.len().saturating_sub(max);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_lines_short_input_unchanged() {
        assert_eq!(tail_lines("a\nb\nc", 15), "a\nb\nc");
        assert_eq!(tail_lines("", 15), "");
    }

    #[test]
    fn test_tail_lines_truncates_from_the_head() {
        let input: Vec<String> = (1..=20).map(|i| i.to_string()).collect();
        let expected: Vec<String> = (6..=20).map(|i| i.to_string()).collect();
        assert_eq!(tail_lines(&input.join("\n"), 15), expected.join("\n"));
    }

    #[test]
    fn test_tail_lines_counts_trailing_newline_as_line_break() {
        // "a\n" splits into ["a", ""], two entries, both kept.
        assert_eq!(tail_lines("a\n", 15), "a\n");
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        match run("echo hello").await.unwrap() {
            CommandReply::Text(text) => assert_eq!(text, "Output:\nhello\n"),
            other => panic!("expected text reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_truncates_long_output() {
        let reply = run("seq 1 40").await.unwrap();
        let CommandReply::Text(text) = reply else {
            panic!("expected text reply");
        };
        let body = text.strip_prefix("Output:\n").unwrap();
        // 40 numbered lines plus the trailing newline; the last 15
        // split entries are 27..=40 and the final empty string.
        let expected: Vec<String> = (27..=40).map(|i| i.to_string()).collect();
        assert_eq!(body, format!("{}\n", expected.join("\n")));
    }

    #[tokio::test]
    async fn test_run_prefers_stderr() {
        let result = run("echo out; echo err >&2").await;
        match result {
            Err(CommandError::Execution(message)) => assert_eq!(message, "err"),
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_nonzero_exit_is_an_error() {
        let result = run("exit 3").await;
        assert!(matches!(result, Err(CommandError::Execution(_))));
    }
}
