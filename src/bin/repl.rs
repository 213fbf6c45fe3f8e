use slang::*;

/// Every line is run as a standalone program, printing the result of its `main`.
fn main() -> Result<(), rustyline::error::ReadlineError> {
    let mut rl = rustyline::DefaultEditor::new()?;

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                rl.add_history_entry(line.as_str())?;

                match run(&line) {
                    Ok(value) => println!("{value:?}"),
                    Err(error) => eprintln!("{error}"),
                }
            }
            Err(error) => {
                println!("Bye! ({error})");
                break;
            }
        }
    }

    Ok(())
}
