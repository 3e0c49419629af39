use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::{env, fs, io};

use probescript::{run_tests, Context, RunMode, Runner};

mod indexer;
mod repl;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn show_help(program: &str) {
    println!(
        "Probescript v{VERSION}\n\
         Usage:\n  {program} [command] [args]\n\n\
         Available Commands:\n\
         \x20 run     Run a probescript file\n\
         \x20 repl    Start the probescript REPL\n\
         \x20 test    Run a file, then its registered prbtest tests\n\
         \x20 help    Shows this help menu\n\
         \x20 init    Initialize a new probescript project"
    );
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map_or("probescript", String::as_str);

    match args.get(1).map(String::as_str) {
        None | Some("help") => {
            show_help(program);
            ExitCode::SUCCESS
        }
        Some("repl") => repl::start(),
        Some("run") => run_command(&args, false),
        Some("test") => run_command(&args, true),
        Some("init") => init_command(),
        Some(other) => {
            eprintln!("Unknown command: {other}");
            eprintln!("Use {program} help to see commands");
            ExitCode::FAILURE
        }
    }
}

fn run_command(args: &[String], with_tests: bool) -> ExitCode {
    let Some(target) = args.get(2) else {
        eprintln!("Run command expects 1 argument, 0 given");
        return ExitCode::FAILURE;
    };

    let mut path = PathBuf::from(target);
    if !path.exists() {
        eprintln!("Module {} not found", path.display());
        return ExitCode::FAILURE;
    }

    let (modules, project, manifest) = indexer::index_modules(&path);

    // A directory target runs the project's `main` entry file.
    if path.is_dir() {
        if let Some(main) = &manifest.main {
            path = path.join(main);
        }
    }

    let source = match fs::read_to_string(&path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Error reading {}: {err}", path.display());
            return ExitCode::FAILURE;
        }
    };

    let mut ctx = Context::new(RunMode::Normal, "Main");
    ctx.filename = path
        .canonicalize()
        .unwrap_or_else(|_| path.clone())
        .display()
        .to_string();
    ctx.source = source;
    ctx.modules = modules.into_iter().collect();
    ctx.project = project;

    let runner = Runner::with_context(ctx);
    if let Err(err) = runner.run() {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    if with_tests {
        let failures = run_tests(runner.context());
        if !failures.is_empty() {
            eprintln!("FAIL  {}", path.display());
            eprintln!();
            for failure in &failures {
                eprintln!("{}: {}", failure.name, failure.message);
            }
            return ExitCode::FAILURE;
        }
        println!("PASS  {}", path.display());
    }

    ExitCode::SUCCESS
}

fn prompt_line(label: &str) -> String {
    print!("{label}");
    let _ = io::stdout().flush();
    let mut input = String::new();
    let _ = io::stdin().read_line(&mut input);
    input.trim().to_string()
}

fn init_command() -> ExitCode {
    println!("Probescript project initializer\n");
    let name = prompt_line("Project name: ");
    if name.is_empty() {
        eprintln!("Project name must not be empty");
        return ExitCode::FAILURE;
    }

    let mut main = prompt_line("\nMain file: (main.prb) ");
    if main.is_empty() {
        main = "main.prb".to_string();
    }

    if let Err(err) = fs::create_dir_all(&name) {
        eprintln!("Failed to create project directory: {err}");
        return ExitCode::FAILURE;
    }

    let main_file = "probe Main {\n\tMain() {\n\t\tconsole.println(\"Hello World!\");\n\t}\n};\n".to_string();
    let project_file = format!("{{\n\t\"name\": \"{name}\",\n\t\"main\": \"{main}\"\n}}\n");

    let project_dir = PathBuf::from(&name);
    if let Err(err) = fs::write(project_dir.join(&main), main_file) {
        eprintln!("Failed to write main file: {err}");
        return ExitCode::FAILURE;
    }
    if let Err(err) = fs::write(project_dir.join("project.json"), project_file) {
        eprintln!("Failed to write project.json: {err}");
        return ExitCode::FAILURE;
    }

    println!("Project initialized! Run it with probescript run {name}");
    ExitCode::SUCCESS
}
