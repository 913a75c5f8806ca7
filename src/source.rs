//! Input file selection.
//!
//! The path of the event file comes from a [`PathSupplier`]: the command
//! line when a path was given, otherwise an interactive prompt.

use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Yields the input path, or `None` when the user selected nothing.
pub trait PathSupplier {
    fn supply(&mut self) -> Result<Option<PathBuf>>;
}

impl<S: PathSupplier + ?Sized> PathSupplier for Box<S> {
    fn supply(&mut self) -> Result<Option<PathBuf>> {
        (**self).supply()
    }
}

/// Ask `supplier` once and drop it.
///
/// The supplier may hold the stdin lock; it is released before the
/// caller reads the table itself from stdin.
pub fn select_input<S: PathSupplier>(mut supplier: S) -> Result<Option<PathBuf>> {
    supplier.supply()
}

/// A path fixed up front (from the command line).
#[derive(Debug, Clone)]
pub struct FixedPath(pub PathBuf);

impl PathSupplier for FixedPath {
    fn supply(&mut self) -> Result<Option<PathBuf>> {
        Ok(Some(self.0.clone()))
    }
}

/// Asks for a path on a terminal.
pub struct PromptPath<R, W> {
    input: R,
    output: W,
    prompt: String,
}

impl<R: BufRead, W: Write> PromptPath<R, W> {
    pub fn new(input: R, output: W, prompt: impl Into<String>) -> Self {
        Self {
            input,
            output,
            prompt: prompt.into(),
        }
    }
}

impl<R: BufRead, W: Write> PathSupplier for PromptPath<R, W> {
    fn supply(&mut self) -> Result<Option<PathBuf>> {
        write!(self.output, "{} ", self.prompt).context("Failed to write prompt")?;
        self.output.flush().context("Failed to write prompt")?;

        let mut line = String::new();
        self.input
            .read_line(&mut line)
            .context("Failed to read input path")?;

        Ok(clean_answer(&line).map(PathBuf::from))
    }
}

/// Trim whitespace and one pair of surrounding quotes; empty means no answer.
fn clean_answer(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| {
            trimmed
                .strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
        })
        .unwrap_or(trimmed)
        .trim();

    if unquoted.is_empty() {
        None
    } else {
        Some(unquoted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::{Cursor, Read};
    use std::rc::Rc;

    /// Prompt input that records when it is dropped.
    struct TrackedInput {
        inner: Cursor<&'static str>,
        released: Rc<Cell<bool>>,
    }

    impl Read for TrackedInput {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl BufRead for TrackedInput {
        fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
            self.inner.fill_buf()
        }

        fn consume(&mut self, amt: usize) {
            self.inner.consume(amt)
        }
    }

    impl Drop for TrackedInput {
        fn drop(&mut self) {
            self.released.set(true);
        }
    }

    #[test]
    fn test_fixed_path() {
        let mut supplier = FixedPath(PathBuf::from("events.csv"));
        assert_eq!(supplier.supply().unwrap(), Some(PathBuf::from("events.csv")));
    }

    #[test]
    fn test_prompt_reads_answer() {
        let mut output = Vec::new();
        let answer = {
            let mut supplier = PromptPath::new(
                Cursor::new("  data/events.csv \n"),
                &mut output,
                "Select input file:",
            );
            supplier.supply().unwrap()
        };

        assert_eq!(answer, Some(PathBuf::from("data/events.csv")));
        assert_eq!(String::from_utf8(output).unwrap(), "Select input file: ");
    }

    #[test]
    fn test_prompt_empty_answer_is_none() {
        let mut supplier = PromptPath::new(Cursor::new("\n"), Vec::new(), "?");
        assert_eq!(supplier.supply().unwrap(), None);

        let mut supplier = PromptPath::new(Cursor::new(""), Vec::new(), "?");
        assert_eq!(supplier.supply().unwrap(), None);
    }

    #[test]
    fn test_clean_answer_strips_quotes() {
        assert_eq!(clean_answer("'/tmp/my events.csv'\n"), Some("/tmp/my events.csv"));
        assert_eq!(clean_answer("\"a.csv\""), Some("a.csv"));
        assert_eq!(clean_answer("\"\""), None);
        assert_eq!(clean_answer("\"a.csv"), Some("\"a.csv"));
    }

    #[test]
    fn test_select_input_releases_prompt_before_stdin_load() {
        let released = Rc::new(Cell::new(false));
        let input = TrackedInput {
            inner: Cursor::new("-\n"),
            released: Rc::clone(&released),
        };
        let supplier: Box<dyn PathSupplier> =
            Box::new(PromptPath::new(input, Vec::new(), "Select input file:"));

        let answer = select_input(supplier).unwrap();

        assert_eq!(answer, Some(PathBuf::from("-")));
        assert!(released.get());
    }
}
