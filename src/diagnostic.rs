//! Append-only collector for lexical, syntax and semantic errors.
//!
//! Every phase keeps running after a fault and records it here; the caller
//! checks `has_errors` between phases and stops the pipeline.

use crate::loc::{Loc, Locatable};
use derive_more::{Deref, IntoIterator};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Error at line {}: {message}", .loc.line)]
pub struct Diagnostic {
    pub message: String,
    pub loc: Loc,
}

#[derive(Debug, Clone, Default, Deref, IntoIterator)]
pub struct Diagnostics {
    #[into_iterator(owned, ref)]
    errors: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }

    pub fn report(&mut self, message: impl Into<String>, at: &impl Locatable) {
        self.report_at(message, *at.loc());
    }

    pub fn report_at(&mut self, message: impl Into<String>, loc: Loc) {
        let diagnostic = Diagnostic {
            message: message.into(),
            loc,
        };
        tracing::debug!(%diagnostic, "reported");
        self.errors.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.message.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Token, TokenPayload};

    #[test]
    fn keeps_reports_in_order_without_dedup() {
        let token = Token::new(TokenPayload::Semicolon, ";", Loc::new(3, 10, 10));
        let mut diagnostics = Diagnostics::new();
        assert!(!diagnostics.has_errors());

        diagnostics.report("Expected ';'", &token);
        diagnostics.report("Expected ';'", &token);
        diagnostics.report_at("Expected ')'", Loc::new(7, 0, 0));

        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.len(), 3);
        assert_eq!(
            diagnostics.messages(),
            vec!["Expected ';'", "Expected ';'", "Expected ')'"]
        );
        assert_eq!(diagnostics[2].loc.line, 7);
    }

    #[test]
    fn displays_line_and_message() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.report_at("Unexpected character '$'", Loc::new(4, 12, 12));
        let printed = diagnostics.iter().map(|e| e.to_string()).collect::<Vec<_>>();
        assert_eq!(printed, vec!["Error at line 4: Unexpected character '$'"]);
    }
}
