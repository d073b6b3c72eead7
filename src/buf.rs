use std::fmt::{self, Write};

/// Text accumulator the generator appends assembly to.
#[derive(Debug, Default, Clone)]
pub struct Buf {
    text: String,
}

impl Buf {
    pub fn new() -> Buf {
        Buf::default()
    }

    pub fn append(&mut self, s: impl AsRef<str>) {
        self.text.push_str(s.as_ref());
    }

    pub fn line(&mut self, line: impl fmt::Display) {
        // writing into a String cannot fail
        let _ = writeln!(self.text, "{}", line);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}
