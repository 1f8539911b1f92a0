use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

/// Interactive I/O used by the menu and the chat sessions.
pub trait Console {
    /// Shows `prompt` and reads one line without its line terminator.
    /// Returns `None` at end of input.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;

    fn say(&mut self, line: &str);

    fn report_error(&mut self, line: &str);
}

#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        print!("{prompt}");
        io::stdout().flush().context("Failed to flush stdout")?;

        let line = read_lossy_line(&mut io::stdin().lock())?;
        if line.is_none() {
            println!();
        }
        Ok(line)
    }

    fn say(&mut self, line: &str) {
        println!("{line}");
    }

    fn report_error(&mut self, line: &str) {
        eprintln!("{line}");
    }
}

/// Reads up to the next newline. Bytes that are not UTF-8 are replaced
/// rather than treated as a read failure.
fn read_lossy_line(reader: &mut impl BufRead) -> Result<Option<String>> {
    let mut raw = Vec::new();
    let read = reader
        .read_until(b'\n', &mut raw)
        .context("Failed to read stdin")?;
    if read == 0 {
        return Ok(None);
    }

    let line = String::from_utf8_lossy(&raw);
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::read_lossy_line;

    #[test]
    fn lines_are_read_without_terminators_until_eof() {
        let mut input = Cursor::new(b"first\r\nsecond\nlast".to_vec());

        assert_eq!(read_lossy_line(&mut input).ok().flatten().as_deref(), Some("first"));
        assert_eq!(read_lossy_line(&mut input).ok().flatten().as_deref(), Some("second"));
        assert_eq!(read_lossy_line(&mut input).ok().flatten().as_deref(), Some("last"));
        assert!(matches!(read_lossy_line(&mut input), Ok(None)));
    }

    #[test]
    fn invalid_utf8_becomes_replacement_text() {
        let mut input = Cursor::new(b"\xff\xfe\nq\n".to_vec());

        let first = read_lossy_line(&mut input)
            .expect("invalid bytes should not fail the read")
            .expect("line should be present");
        assert_eq!(first, "\u{FFFD}\u{FFFD}");
        assert_eq!(read_lossy_line(&mut input).ok().flatten().as_deref(), Some("q"));
    }
}
