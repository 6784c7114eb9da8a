use goober::evaluator::{self, Ns};
use goober::reader;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

fn main() {
    let mut rl = DefaultEditor::new().expect("could not initialize line editor");
    let mut ns = evaluator::default_ns();
    let prompt = format!("{}> ", ns.name);

    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);
                eval_line(&mut ns, line);
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(err) => {
                println!("error: {err}");
                break;
            }
        }
    }
}

/// Read every form on the line and evaluate them in order, printing each
/// result. A failure skips the rest of the line; the namespace keeps the
/// state from before the failing form.
fn eval_line(ns: &mut Ns, line: &str) {
    match reader::read(line) {
        Ok(forms) => {
            for form in forms {
                match evaluator::eval(ns, &form) {
                    Ok(value) => println!("{value}"),
                    Err(e) => {
                        println!("error: {e}");
                        break;
                    }
                }
            }
        }
        Err(e) => println!("error: {e}"),
    }
}
