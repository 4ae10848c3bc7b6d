//! Operator decision for the same-day duplicate gate.

use std::io::{self, BufRead, Write};

pub(crate) trait Confirm {
    /// Ask `question`; `true` means continue.
    fn confirm(&mut self, question: &str) -> bool;
}

/// `--yes`: always continue.
pub(crate) struct AutoConfirm;

impl Confirm for AutoConfirm {
    fn confirm(&mut self, question: &str) -> bool {
        tracing::info!(question, "auto-confirmed");
        true
    }
}

/// Reads a `y`/`yes` answer line by line. Anything else, including EOF or a
/// read error, declines.
pub(crate) struct LineConfirm<R, W> {
    input: R,
    output: W,
}

impl LineConfirm<io::StdinLock<'static>, io::Stdout> {
    pub(crate) fn stdin() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> LineConfirm<R, W> {
    pub(crate) fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirm for LineConfirm<R, W> {
    fn confirm(&mut self, question: &str) -> bool {
        if write!(self.output, "{question} [y/N] ").is_err() || self.output.flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(0) | Err(_) => false,
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        }
    }
}
