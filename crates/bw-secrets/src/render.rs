use std::{
    fmt,
    io::{self, Write},
};

use zeroize::Zeroizing;

/// Result of a successful command, written to stdout.
pub enum CommandOutput {
    Plain(String),
    Lines(Vec<String>),
    Secret(Zeroizing<String>),
}

impl fmt::Debug for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutput::Plain(text) => f.debug_tuple("Plain").field(text).finish(),
            CommandOutput::Lines(lines) => f.debug_tuple("Lines").field(lines).finish(),
            CommandOutput::Secret(_) => f.write_str("Secret(<redacted>)"),
        }
    }
}

impl From<&str> for CommandOutput {
    fn from(text: &str) -> Self {
        CommandOutput::Plain(text.to_owned())
    }
}
impl From<String> for CommandOutput {
    fn from(text: String) -> Self {
        CommandOutput::Plain(text)
    }
}
impl From<Vec<String>> for CommandOutput {
    fn from(lines: Vec<String>) -> Self {
        CommandOutput::Lines(lines)
    }
}

impl CommandOutput {
    pub fn render(&self, out: &mut impl Write) -> io::Result<()> {
        match self {
            CommandOutput::Plain(text) => writeln!(out, "{text}")?,
            CommandOutput::Lines(lines) => {
                for line in lines {
                    writeln!(out, "{line}")?;
                }
            }
            // Exactly the value and one newline, so `$(bw-secrets get name)` is the secret
            CommandOutput::Secret(value) => {
                out.write_all(value.as_bytes())?;
                out.write_all(b"\n")?;
            }
        }
        out.flush()
    }
}
