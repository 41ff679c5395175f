use std::fmt;

/// A control-connection reply: a three digit code and one or more text lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Reply {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            lines: vec![clean(message.into())],
        }
    }

    /// Multi-line reply: `NNN-first`, indented body lines, `NNN last`.
    pub fn multiline(code: u16, lines: Vec<String>) -> Self {
        let lines = lines.into_iter().map(clean).collect::<Vec<_>>();
        if lines.is_empty() {
            return Self::new(code, "");
        }
        Self { code, lines }
    }

    pub fn message(&self) -> &str {
        self.lines.last().map(String::as_str).unwrap_or("")
    }

    /// Serialises the reply with CRLF line endings.
    pub fn to_wire(&self) -> String {
        let mut out = String::new();
        let last = self.lines.len().saturating_sub(1);
        for (index, line) in self.lines.iter().enumerate() {
            if index == 0 && last > 0 {
                out.push_str(&format!("{}-{}\r\n", self.code, line));
            } else if index == last {
                out.push_str(&format!("{} {}\r\n", self.code, line));
            } else {
                out.push_str(&format!(" {}\r\n", line));
            }
        }
        out
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message())
    }
}

// A stray CR or LF would let a file name inject extra reply lines.
fn clean(line: String) -> String {
    if line.contains(['\r', '\n']) {
        line.replace(['\r', '\n'], " ")
    } else {
        line
    }
}
