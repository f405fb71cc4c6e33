use std::{
    cell::RefCell,
    io::{BufRead, Write},
    path::{Path, PathBuf},
    process::ExitCode,
    rc::Rc,
};

use brasiliana::{
    interpreter::Interpreter,
    tokenizer::{TokenType, Tokenizer},
};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::LevelFilter;

const DEFAULT_FILE: &str = "main.brasiliana";

#[derive(Debug, Parser)]
#[command(version, about, args_conflicts_with_subcommands = true)]
struct Cli {
    /// Program to run when no subcommand is given.
    file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a program.
    Run(FileArgs),
    /// Start an interactive session.
    Repl,
    /// Print the tokens of a program.
    Tokens(FileArgs),
    /// Print the parsed program.
    Ast(FileArgs),
}

#[derive(Debug, Args)]
struct FileArgs {
    file: PathBuf,
}

fn main() -> ExitCode {
    let args = Cli::parse();

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match args.command {
        Some(Command::Run(FileArgs { file })) => run_command(&file),
        Some(Command::Repl) => repl_command(),
        Some(Command::Tokens(FileArgs { file })) => tokens_command(&file),
        Some(Command::Ast(FileArgs { file })) => ast_command(&file),
        None => run_command(&args.file.unwrap_or_else(|| PathBuf::from(DEFAULT_FILE))),
    }
}

/// `BRASILIANA_LOG` (e.g. `debug`) overrides the `-v` count.
fn init_logging(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let level = std::env::var("BRASILIANA_LOG")
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(match verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        });

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{:<5}] [{}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Brasiliana(#[from] brasiliana::Error),
}

fn report(path: &Path, result: Result<(), CliError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("{e:?}");
            eprintln!("Erro ao ler ou executar o arquivo {}: {e}", path.display());
            ExitCode::FAILURE
        }
    }
}

fn run_command(path: &Path) -> ExitCode {
    log::info!("running {}", path.display());
    let result = std::fs::read_to_string(path)
        .map_err(CliError::from)
        .and_then(|source| {
            let mut interpreter = Interpreter::default();
            Ok(brasiliana::run(&source, &mut interpreter)?)
        });
    report(path, result)
}

fn repl_command() -> ExitCode {
    println!("Bem-vindo ao REPL Brasiliana!");
    println!("EOF to exit. (Ctrl+D on *nix, Ctrl+Z on Windows)");

    // The REPL and `lerEntrada` read from the same buffered handle.
    let stdin: Rc<RefCell<dyn BufRead>> =
        Rc::new(RefCell::new(std::io::BufReader::new(std::io::stdin())));
    let mut interpreter = Interpreter::new(Rc::new(RefCell::new(std::io::stdout())), stdin.clone());

    loop {
        print!("> ");
        if let Err(e) = std::io::stdout().flush() {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }

        let mut input = String::new();
        let read = stdin.borrow_mut().read_line(&mut input);
        match read {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if let Err(e) = brasiliana::run(input.trim(), &mut interpreter) {
            println!("Erro: {e}");
        }
    }

    ExitCode::SUCCESS
}

fn tokens_command(path: &Path) -> ExitCode {
    let result = std::fs::read_to_string(path)
        .map_err(CliError::from)
        .and_then(|source| Ok(print_tokens(&source)?));
    report(path, result)
}

fn print_tokens(source: &str) -> Result<(), brasiliana::Error> {
    let mut tokenizer = Tokenizer::new(source);
    let mut line = 0;
    loop {
        let token = tokenizer.token().map_err(brasiliana::Error::from)?;
        if token.position.line != line {
            print!("{:4} ", token.position.line);
            line = token.position.line;
        } else {
            print!("   | ");
        }

        println!(
            "{:>3} {:<24} {}",
            token.position.column,
            format!("{:?}", token.token_type),
            token.lexeme
        );

        if token.token_type == TokenType::Eof {
            break;
        }
    }

    Ok(())
}

fn ast_command(path: &Path) -> ExitCode {
    let result = std::fs::read_to_string(path)
        .map_err(CliError::from)
        .and_then(|source| {
            let program = brasiliana::parse(&source)?;
            print!("{program}");
            Ok(())
        });
    report(path, result)
}
