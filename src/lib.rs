pub mod asm;
pub mod ast;
pub mod buf;
pub mod diagnostic;
pub mod fold;
pub mod generator;
pub mod lexer;
pub mod loc;
pub mod parser;
pub mod token;

use diagnostic::Diagnostics;

fn checkpoint(diagnostics: &mut Diagnostics, next: &str) -> Result<(), Diagnostics> {
    if !diagnostics.has_errors() {
        return Ok(());
    }
    tracing::warn!(errors = diagnostics.len(), "stopping before {}", next);
    Err(std::mem::take(diagnostics))
}

/// Compile one source unit to assembly text. Each phase runs to completion;
/// any diagnostics it reports stop the pipeline before the next phase, and
/// semantic errors suppress the generated text.
pub fn compile(source: &str) -> Result<String, Diagnostics> {
    let mut diagnostics = Diagnostics::new();
    let tokens = lexer::tokenize(source, &mut diagnostics);
    checkpoint(&mut diagnostics, "parsing")?;
    let program = parser::parse(tokens, &mut diagnostics);
    checkpoint(&mut diagnostics, "code generation")?;
    let asm = generator::generate(&program, &mut diagnostics);
    checkpoint(&mut diagnostics, "output")?;
    Ok(asm)
}
