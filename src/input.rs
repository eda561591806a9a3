//! Standard input abstraction, so preprocessing and the CLI runner can be
//! driven by tests without a real pipe.

use std::io::{self, IsTerminal, Read};

/// Source of standard input.
pub trait StdinReader: Send + Sync {
    /// `true` if stdin is interactive, `false` if piped.
    fn is_terminal(&self) -> bool;

    /// Read all content from stdin.
    fn read_to_string(&self) -> io::Result<String>;
}

/// The process's real stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealStdin;

impl StdinReader for RealStdin {
    fn is_terminal(&self) -> bool {
        io::stdin().is_terminal()
    }

    fn read_to_string(&self) -> io::Result<String> {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    }
}

/// Stdin stand-in for tests.
#[derive(Debug, Clone)]
pub struct MockStdin {
    is_terminal: bool,
    content: Option<String>,
}

impl MockStdin {
    /// A terminal: nothing piped.
    pub fn terminal() -> Self {
        Self {
            is_terminal: true,
            content: None,
        }
    }

    /// Piped input with the given content.
    pub fn piped(content: impl Into<String>) -> Self {
        Self {
            is_terminal: false,
            content: Some(content.into()),
        }
    }
}

impl StdinReader for MockStdin {
    fn is_terminal(&self) -> bool {
        self.is_terminal
    }

    fn read_to_string(&self) -> io::Result<String> {
        Ok(self.content.clone().unwrap_or_default())
    }
}

/// Read stdin if it is piped and holds more than whitespace.
pub fn read_piped(reader: &dyn StdinReader) -> io::Result<Option<String>> {
    if reader.is_terminal() {
        return Ok(None);
    }
    let content = reader.read_to_string()?;
    if content.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_piped_skips_terminal() {
        assert_eq!(read_piped(&MockStdin::terminal()).unwrap(), None);
    }

    #[test]
    fn read_piped_skips_blank_input() {
        assert_eq!(read_piped(&MockStdin::piped("  \n")).unwrap(), None);
    }

    #[test]
    fn read_piped_returns_content() {
        assert_eq!(
            read_piped(&MockStdin::piped("a: 1\n")).unwrap().as_deref(),
            Some("a: 1\n")
        );
    }
}
