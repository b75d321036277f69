//! cpre - C preprocessor command-line front end.
//!
//! Reads one C source file, runs the preprocessor, and prints the
//! resulting token stream to stdout. Diagnostics go to stderr through the
//! lexer's default sink; the exit code is non-zero when preprocessing was
//! poisoned by an error.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cpre_drv::{Config, FileConfig, Session};

/// cpre - preprocess a C source file and dump the token stream
#[derive(Parser, Debug)]
#[command(name = "cpre")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "C preprocessor and tokenizer", long_about = None)]
struct Cli {
    /// Input C source file
    input: PathBuf,

    /// Add a system include search directory (repeatable, searched in order)
    #[arg(short = 'I', value_name = "DIR")]
    include: Vec<PathBuf>,

    /// Add a library search directory
    #[arg(short = 'L', value_name = "DIR")]
    library: Vec<PathBuf>,

    /// Predefine a macro, NAME or NAME=VALUE
    #[arg(short = 'D', value_name = "NAME[=VALUE]")]
    define: Vec<String>,

    /// Undefine a macro before lexing starts
    #[arg(short = 'U', value_name = "NAME")]
    undef: Vec<String>,

    /// Register a name for __has_builtin
    #[arg(long, value_name = "NAME")]
    builtin: Vec<String>,

    /// Register a name for __has_feature
    #[arg(long, value_name = "NAME")]
    feature: Vec<String>,

    /// Register a name for __has_extension
    #[arg(long, value_name = "NAME")]
    extension: Vec<String>,

    /// Allow '$' in identifiers
    #[arg(long)]
    dollar_idents: bool,

    /// Allow the '\e' escape in character and string literals
    #[arg(long)]
    escape_e: bool,

    /// Reserve __VA_OPT__ handling in variadic macro bodies
    #[arg(long)]
    va_opt: bool,

    /// Read additional configuration from a TOML file
    #[arg(short, long, value_name = "FILE", env = "CPRE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose (debug-level) logging
    #[arg(short, long, env = "CPRE_VERBOSE")]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = Config {
        input: cli.input,
        include_paths: cli.include,
        library_paths: cli.library,
        defines: cli.define,
        undefs: cli.undef,
        builtins: cli.builtin,
        features: cli.feature,
        extensions: cli.extension,
        dollar_idents: cli.dollar_idents,
        escape_e: cli.escape_e,
        va_opt: cli.va_opt,
    };
    if let Some(path) = &cli.config {
        let file = FileConfig::load(path)?;
        config.apply_file(&file);
    }

    let session = Session::new(config);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let clean = session.run(&mut out)?;
    out.flush()?;
    Ok(clean)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
