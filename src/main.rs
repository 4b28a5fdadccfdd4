use osh::Interpreter;

fn main() {
    let mut shell = Interpreter::default();
    if let Err(err) = shell.repl() {
        eprintln!("osh: {err}");
        std::process::exit(1);
    }
}
