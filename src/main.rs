use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::{Parser, Subcommand};
use clap_stdin::FileOrStdin;
use tracing_subscriber::EnvFilter;

/// Compiles Jack classes to VM code.
#[derive(Debug, Parser)]
#[command(name = "jackc", version, about)]
struct Args {
    /// Log each compiled class and subroutine
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile a .jack file, or every .jack file under a directory, to
    /// sibling .vm files
    Build {
        path: PathBuf,

        /// Number of files compiled in parallel
        #[arg(short, long, default_value_t = 1)]
        jobs: usize,
    },
    /// Compile one class read from a file or stdin and print the VM code
    Emit {
        #[arg(default_value = "-")]
        input: FileOrStdin,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "jackc=debug" } else { "jackc=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Build { path, jobs } => {
            let report = jackc::driver::build(&path, jobs)
                .with_context(|| format!("failed to build {}", path.display()))?;
            for (source, err) in &report.failed {
                eprintln!("{}: {err}", source.display());
            }
            if !report.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Emit { input } => {
            let name = input.filename().to_string();
            let source = input
                .contents()
                .with_context(|| format!("failed to read {name}"))?;
            let vm = jackc::compile_to_string(&source).with_context(|| format!("in {name}"))?;
            print!("{vm}");
        }
    }

    Ok(ExitCode::SUCCESS)
}
