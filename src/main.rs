use clap::{Parser as ClapParser, ValueEnum};
use horizon::diagnostic::Diagnostics;
use horizon::{lexer, parser};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
enum CliError {
    #[error("cannot read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot write {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot read a line from the console")]
    Console(#[source] io::Error),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Emit {
    Tokens,
    Ast,
    Asm,
}

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Source file. Without it one line is read from standard input.
    input: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = Emit::Asm)]
    emit: Emit,
    /// Where to write the assembly, `<INPUT>.s` by default.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn read_source(input: Option<&Path>) -> Result<String, CliError> {
    let mut source = match input {
        Some(path) => std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?,
        None => {
            print!("> ");
            io::stdout().flush().map_err(CliError::Console)?;
            let mut line = String::new();
            io::stdin()
                .lock()
                .read_line(&mut line)
                .map_err(CliError::Console)?;
            line
        }
    };
    if source.ends_with('\n') {
        source.pop();
    }
    Ok(source)
}

fn fail(diagnostics: &Diagnostics) -> ! {
    for diagnostic in diagnostics {
        println!("{}", diagnostic);
    }
    std::process::exit(1);
}

fn output_path(args: &Args) -> Option<PathBuf> {
    if let Some(output) = &args.output {
        return Some(output.clone());
    }
    args.input.as_ref().map(|input| {
        let mut path = input.clone().into_os_string();
        path.push(".s");
        PathBuf::from(path)
    })
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let source = read_source(args.input.as_deref())?;
    tracing::debug!(bytes = source.len(), emit = ?args.emit, "read source");

    let mut diagnostics = Diagnostics::new();
    match args.emit {
        Emit::Tokens => {
            for token in lexer::tokenize(&source, &mut diagnostics) {
                println!("{}", token);
            }
            if diagnostics.has_errors() {
                fail(&diagnostics);
            }
        }
        Emit::Ast => {
            let tokens = lexer::tokenize(&source, &mut diagnostics);
            if diagnostics.has_errors() {
                fail(&diagnostics);
            }
            let program = parser::parse(tokens, &mut diagnostics);
            if diagnostics.has_errors() {
                fail(&diagnostics);
            }
            println!("{:#?}", program);
        }
        Emit::Asm => {
            let asm = match horizon::compile(&source) {
                Ok(asm) => asm,
                Err(diagnostics) => fail(&diagnostics),
            };
            print!("{}", asm);
            if let Some(path) = output_path(&args) {
                std::fs::write(&path, &asm).map_err(|source| CliError::Write {
                    path: path.clone(),
                    source,
                })?;
                tracing::info!(path = %path.display(), "wrote assembly");
            }
        }
    }

    Ok(())
}
