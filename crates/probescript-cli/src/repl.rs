use std::io::{self, BufRead as _, Write as _};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use probescript::{PrintHandle, ReplSession, StdPrint};

/// The interactive loop: one line at a time against a persistent session,
/// echoing each result in console form. `exit` leaves.
pub fn start() -> ExitCode {
    println!("Probescript REPL v{}", env!("CARGO_PKG_VERSION"));

    let writer: PrintHandle = Arc::new(Mutex::new(StdPrint));
    let session = ReplSession::new(writer);

    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let line = line.trim();
        if line.starts_with("exit") {
            break;
        }
        if line.is_empty() {
            continue;
        }

        match session.eval(line) {
            Ok(value) => println!("{}", value.to_console()),
            Err(err) => eprintln!("{err}"),
        }
    }

    ExitCode::SUCCESS
}
