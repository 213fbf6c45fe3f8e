use std::io::{self, Write};

pub mod lex;
pub mod rt;
pub mod syntax;

/// The representation used by all numbers and their arithmetic operations.
pub type SlangNumber = f64;

/// A failure in any stage of the pipeline, all of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum Error<'src> {
    #[error("[LEXING ERROR] {0}")]
    Lex(#[from] lex::LexError),

    // The two variants below borrow from the source, so they can't be a `#[source]`
    #[error("[PARSING ERROR] {0}")]
    Parse(syntax::ParseError<'src>),

    #[error("[RUNTIME ERROR] {0}")]
    Runtime(rt::RuntimeError<'src>),
}

impl<'src> From<syntax::ParseError<'src>> for Error<'src> {
    fn from(error: syntax::ParseError<'src>) -> Self {
        Error::Parse(error)
    }
}

impl<'src> From<rt::RuntimeError<'src>> for Error<'src> {
    fn from(error: rt::RuntimeError<'src>) -> Self {
        Error::Runtime(error)
    }
}

/// Lexes, parses and interprets `source`, returning the result of its `main` function.
pub fn run(source: &str) -> Result<SlangNumber, Error<'_>> {
    run_with_output(source, io::stdout())
}

/// Like [`run`], with `print` writing to `output`.
pub fn run_with_output<W: Write>(source: &str, output: W) -> Result<SlangNumber, Error<'_>> {
    let tokens = lex::Lexer::new(source).lex()?;
    let module = syntax::Parser::new(&tokens).parse()?;
    Ok(rt::TreeWalker::with_output(output).interpret(&module)?)
}
