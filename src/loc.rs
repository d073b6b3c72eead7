use std::fmt;

/// Position of a token in the source: its line and the character offsets of
/// its first and last character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Loc {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

impl Loc {
    pub fn new(line: usize, start: usize, end: usize) -> Loc {
        Loc { line, start, end }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}-{}", self.line, self.start, self.end)
    }
}

pub trait Locatable {
    fn loc(&self) -> &Loc;
}
