use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use lox::scanner::Scanner;
use lox::Lox;

/// Exit status for command-line usage errors.
const EXIT_USAGE: i32 = 64;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Option<Commands>,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs a Lox script
    Run { filename: PathBuf },

    /// Tokenizes a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print the tokens as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Starts an interactive session (the default without a subcommand)
    Repl,
}

/// Memory-maps `filename` and copies it out as UTF-8 text.
fn read_source(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);

    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let len = file
        .metadata()
        .context(format!("Failed to stat file {:?}", filename))?
        .len();

    // Mapping a zero-length file fails on some platforms.
    if len == 0 {
        return Ok(String::new());
    }

    // SAFETY: the map is read-only and dropped before this function returns.
    let mmap = unsafe { Mmap::map(&file) }.context(format!("Failed to map file {:?}", filename))?;
    let text = std::str::from_utf8(&mmap)
        .map_err(lox::LoxError::from)
        .context(format!("File {:?} is not valid UTF-8", filename))?;

    info!("Read {} bytes from {:?}", mmap.len(), filename);

    Ok(text.to_owned())
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let path = record.module_path().unwrap_or("<unnamed>");
            let module = path.strip_prefix("lox::").unwrap_or(path);
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn run_file(filename: &Path) -> Result<i32> {
    info!("Running Run subcommand");

    let source = read_source(filename)?;
    let mut session = Lox::new();
    let report = session.run(&source);

    report
        .write_to(io::stderr().lock())
        .context("Failed to write diagnostics")?;

    info!("Run finished with status {:?}", report.status());

    Ok(report.exit_code())
}

fn tokenize(filename: &Path, json: bool) -> Result<i32> {
    info!("Running Tokenize subcommand");

    let source = read_source(filename)?;
    let (tokens, errors) = Scanner::new(&source).scan_all();

    for e in &errors {
        debug!("Tokenization debug: {}", e);
        eprintln!("{}", e);
    }

    let mut stdout = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut stdout, &tokens).context("Failed to serialize tokens")?;
        writeln!(stdout)?;
    } else {
        for token in &tokens {
            writeln!(stdout, "{}", token)?;
        }
    }

    if !errors.is_empty() {
        debug!("Tokenization failed, exiting with code 65");
        return Ok(lox::lox::EXIT_STATIC_ERROR);
    }

    info!("Tokenization completed successfully");
    Ok(0)
}

/// Reads lines until EOF.  Definitions persist between lines and errors
/// never end the session.
fn repl() -> Result<i32> {
    info!("Starting REPL");

    let mut session = Lox::new().interactive(true);
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush prompt")?;

        line.clear();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .context("Failed to read from stdin")?;

        if read == 0 {
            println!();
            break;
        }

        let report = session.run(&line);
        report
            .write_to(io::stderr().lock())
            .context("Failed to write diagnostics")?;
    }

    info!("REPL finished");
    Ok(0)
}

fn main() -> Result<()> {
    let args: Cli = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { 0 };
            // Help and version output also come through here.
            let _ = e.print();
            std::process::exit(code);
        }
    };

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let code = match args.commands {
        Some(Commands::Run { filename }) => run_file(&filename)?,
        Some(Commands::Tokenize { filename, json }) => tokenize(&filename, json)?,
        Some(Commands::Repl) | None => repl()?,
    };

    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}
