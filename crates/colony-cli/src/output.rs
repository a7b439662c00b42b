//! CI console output
//!
//! Commands write through [`OutputSink`]; [`ActionsConsole`] renders it in
//! the GitHub Actions workflow-command format.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

/// Where command results go
pub trait OutputSink {
    /// Plain progress line
    fn message(&mut self, line: &str) -> io::Result<()>;

    /// Final confirmation
    fn success(&mut self, line: &str) -> io::Result<()>;

    /// Failure, annotated for the CI runner
    fn error(&mut self, line: &str) -> io::Result<()>;

    /// Named step output
    fn set_output(&mut self, name: &str, value: &str) -> io::Result<()>;
}

/// GitHub Actions console
///
/// Outputs are appended to the `GITHUB_OUTPUT` file when the runner
/// provides one, otherwise printed as legacy `::set-output` commands.
pub struct ActionsConsole<W: Write> {
    out: W,
    output_file: Option<PathBuf>,
}

impl ActionsConsole<io::Stdout> {
    pub fn stdout() -> Self {
        let output_file = std::env::var_os("GITHUB_OUTPUT")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        ActionsConsole::new(io::stdout(), output_file)
    }
}

impl<W: Write> ActionsConsole<W> {
    pub fn new(out: W, output_file: Option<PathBuf>) -> Self {
        ActionsConsole { out, output_file }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text)?;
        self.out.flush()
    }
}

impl<W: Write> OutputSink for ActionsConsole<W> {
    fn message(&mut self, line: &str) -> io::Result<()> {
        self.line(line)
    }

    fn success(&mut self, line: &str) -> io::Result<()> {
        self.line(&format!("\u{1b}[32;1m{}\u{1b}[0m", line))
    }

    fn error(&mut self, line: &str) -> io::Result<()> {
        self.line(&format!("::error::{}", escape_command_data(line)))
    }

    fn set_output(&mut self, name: &str, value: &str) -> io::Result<()> {
        match &self.output_file {
            Some(path) => {
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                if value.contains('\n') {
                    let delimiter = heredoc_delimiter(value);
                    writeln!(file, "{}<<{}", name, delimiter)?;
                    writeln!(file, "{}", value)?;
                    writeln!(file, "{}", delimiter)
                } else {
                    writeln!(file, "{}={}", name, value)
                }
            }
            None => self.line(&format!(
                "::set-output name={}::{}",
                name,
                escape_command_data(value)
            )),
        }
    }
}

/// Workflow commands end at a newline; `%`, CR and LF must be encoded
fn escape_command_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn heredoc_delimiter(value: &str) -> String {
    let mut delimiter = String::from("COLONY_EOF");
    while value.contains(&delimiter) {
        delimiter.push('_');
    }
    delimiter
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console() -> ActionsConsole<Vec<u8>> {
        ActionsConsole::new(Vec::new(), None)
    }

    fn printed(console: ActionsConsole<Vec<u8>>) -> String {
        String::from_utf8(console.into_inner()).unwrap()
    }

    #[test]
    fn test_message_and_success_lines() {
        let mut c = console();
        c.message("Waiting for the Sandbox sb-1 to start...").unwrap();
        c.success("Sandbox sb-1 is active!").unwrap();
        assert_eq!(
            printed(c),
            "Waiting for the Sandbox sb-1 to start...\n\u{1b}[32;1mSandbox sb-1 is active!\u{1b}[0m\n"
        );
    }

    #[test]
    fn test_error_is_annotated() {
        let mut c = console();
        c.error("Unable to start sandbox: x: bad").unwrap();
        assert_eq!(printed(c), "::error::Unable to start sandbox: x: bad\n");
    }

    #[test]
    fn test_legacy_set_output_escapes_newlines() {
        let mut c = console();
        c.set_output("sandbox_id", "sb-1").unwrap();
        c.set_output("notes", "50%\ndone").unwrap();
        assert_eq!(
            printed(c),
            "::set-output name=sandbox_id::sb-1\n::set-output name=notes::50%25%0Adone\n"
        );
    }

    #[test]
    fn test_output_file_receives_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("github_output");
        let mut c = ActionsConsole::new(Vec::new(), Some(path.clone()));

        c.set_output("sandbox_id", "sb-1").unwrap();
        c.set_output("multi", "a\nb").unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "sandbox_id=sb-1\nmulti<<COLONY_EOF\na\nb\nCOLONY_EOF\n"
        );
        // Nothing leaks to the console
        assert!(printed(c).is_empty());
    }

    #[test]
    fn test_heredoc_delimiter_avoids_value() {
        assert_eq!(heredoc_delimiter("x\nCOLONY_EOF\ny"), "COLONY_EOF_");
    }
}
