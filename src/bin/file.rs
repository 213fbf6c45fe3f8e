use slang::*;
use std::{env, fs, process::ExitCode, time};

fn main() -> ExitCode {
    // Skip the program name
    let mut args = env::args().skip(1);
    let Some(file_name) = args.next() else {
        println!("Usage: slang [script]");
        return ExitCode::FAILURE;
    };

    let buffer = match fs::read_to_string(&file_name) {
        Ok(buffer) => buffer,
        Err(error) => {
            eprintln!("Failed to read \"{file_name}\": {error}");
            return ExitCode::FAILURE;
        }
    };

    // Program output owns stdout, diagnostics go to stderr
    let start = time::Instant::now();
    let tokens = match lex::Lexer::new(&buffer).lex() {
        Ok(tokens) => tokens,
        Err(error) => return report(Error::from(error)),
    };
    eprintln!("[Lexing took: {:?}]", start.elapsed());

    let start = time::Instant::now();
    let module = match syntax::Parser::new(&tokens).parse() {
        Ok(module) => module,
        Err(error) => return report(Error::from(error)),
    };
    eprintln!("[Parsing took: {:?}]", start.elapsed());

    let start = time::Instant::now();
    match rt::interpret(&module) {
        Ok(value) => {
            eprintln!("[Interpreting took: {:?}]", start.elapsed());
            println!("{value:?}");
            ExitCode::SUCCESS
        }
        Err(error) => report(Error::from(error)),
    }
}

fn report(error: Error<'_>) -> ExitCode {
    eprintln!("{error}");
    ExitCode::FAILURE
}
