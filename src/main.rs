//! Adder CLI: interactive console by default, file and stdin execution
//! modes for scripts.

use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process;

use adder::engine::{compile, new_namespace, CompileMode, Machine, Value};
use adder::linecache;
use adder::repl::{self, ReplConfig};
use adder::traceback::TracebackFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    eprintln!("adder v{}", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    adder [OPTIONS] [INPUT]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -h, --help       Print this help message");
    eprintln!("    -v, --version    Print version information");
    eprintln!("    --repl           Start the interactive console (default with no input)");
    eprintln!("    --debug          Show raw tracebacks, including engine frames");
    eprintln!();
    eprintln!("ARGUMENTS:");
    eprintln!("    [INPUT]          Input source file (use '-' for stdin)");
    eprintln!();
    eprintln!("EXAMPLES:");
    eprintln!("    adder");
    eprintln!("    adder script.py");
    eprintln!("    cat script.py | adder -");
}

fn print_version() {
    println!("adder {}", VERSION);
}

struct Options {
    input: Option<String>,
    repl_mode: bool,
    debug: bool,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();

    let mut input = None;
    let mut repl_mode = false;
    let mut debug = false;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                process::exit(0);
            }
            "--repl" => {
                repl_mode = true;
            }
            "--debug" => {
                debug = true;
            }
            arg if arg.starts_with('-') && arg != "-" => {
                return Err(format!("Unknown option: {}", arg));
            }
            arg => {
                if input.is_some() {
                    return Err("Multiple input files specified".to_string());
                }
                input = Some(arg.to_string());
            }
        }
        i += 1;
    }

    Ok(Options { input, repl_mode, debug })
}

fn read_input(input: &str) -> Result<String, String> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("Failed to read from stdin: {}", e))?;
        Ok(buffer)
    } else {
        let path = Path::new(input);
        if !path.exists() {
            return Err(format!("Input file not found: {}", input));
        }
        fs::read_to_string(path).map_err(|e| format!("Failed to read file '{}': {}", input, e))
    }
}

/// Execute a whole source file as a module body. Diagnostics go to
/// stderr; the exit code reports success or failure.
fn run_file(source: &str, filename: &str, config: &ReplConfig) -> i32 {
    linecache::register(filename, source);
    let filter = TracebackFilter::new(config.debug);
    let ns = new_namespace();
    ns.borrow_mut().insert("__name__".to_string(), Value::str("__main__"));
    let program = match compile(source, filename, CompileMode::Module) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("{}", filter.render_syntax(&err, filename));
            return 1;
        }
    };
    let mut machine = Machine::new(config.recursion_limit);
    match machine.exec_program(&program, &ns) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{}", filter.render(&err));
            1
        }
    }
}

fn main() {
    let options = match parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(if options.debug { tracing::Level::DEBUG } else { tracing::Level::WARN })
        .with_writer(io::stderr)
        .init();

    let mut config = ReplConfig::load();
    if options.debug {
        config.debug = true;
    }

    if options.repl_mode || options.input.is_none() {
        if let Err(e) = repl::run(config) {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
        return;
    }

    let input = options.input.as_deref().unwrap_or("-");
    let content = match read_input(input) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let filename = if input == "-" { "<stdin>" } else { input };
    process::exit(run_file(&content, filename, &config));
}
