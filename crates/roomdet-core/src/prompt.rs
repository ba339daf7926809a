//! Line-oriented interactive prompts over any reader/writer pair.

use std::io::{self, BufRead, Stdin, StdinLock, Stdout, Write};

/// Interactive prompt. Production code wraps stdin/stdout; tests feed a
/// `Cursor` of scripted answers and capture the output in a `Vec<u8>`.
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl Prompt<StdinLock<'static>, Stdout> {
    /// Prompt bound to the process's stdin/stdout.
    pub fn stdio() -> Self {
        let stdin: Stdin = io::stdin();
        Self::new(stdin.lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `message` (no newline added) and read one line of input.
    ///
    /// Returns `None` at end of input. The trailing line terminator is
    /// stripped; any other whitespace is left for the caller.
    pub fn ask(&mut self, message: &str) -> io::Result<Option<String>> {
        write!(self.output, "{message}")?;
        self.output.flush()?;
        self.read_line()
    }

    /// Read one line without printing anything first.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Print a full line.
    pub fn say(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.output, "{message}")?;
        self.output.flush()
    }

    pub fn into_output(self) -> W {
        self.output
    }
}
