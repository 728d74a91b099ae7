use std::path::PathBuf;

use clap::Parser;
use jemu_vm::Slot;

mod cli;
mod logger;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "jemu", about = "Java bytecode method interpreter")]
struct Args {
    /// Turn on verbose logging. Repeat to increase verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Sets the logging to write to a file.
    #[arg(short, long)]
    log_file: Option<PathBuf>,

    /// Selects the subcommand.
    #[command(subcommand)]
    action: Action,
}

#[derive(clap::Subcommand, Debug)]
enum Action {
    /// Executes the bytecode of a single method and prints the returned value.
    Run {
        /// Path to the method bytecode. Files ending in `.hex` are read as
        /// hexadecimal text.
        file: PathBuf,

        /// Number of local variable slots (default: 16).
        #[arg(long, default_value_t = 16)]
        locals: usize,

        /// Argument stored into the next local, as KIND:VALUE
        /// (int, long, float, double, bool, str) or `null`.
        #[arg(long = "arg", value_parser = cli::parse_slot)]
        args: Vec<Slot>,

        /// Stop after N instructions (default: run until return or Ctrl+C).
        #[arg(long)]
        max_steps: Option<u64>,

        /// Write the local variables to the specified file after execution.
        #[arg(long)]
        dump_locals: Option<PathBuf>,
    },
    /// Prints the instructions in a bytecode file as JSON.
    Disassemble {
        /// Path to the method bytecode.
        file: PathBuf,
    },
    /// Runs the bytecode many times in fresh frames and reports timing statistics.
    Benchmark {
        /// Path to the method bytecode.
        file: PathBuf,

        /// Number of local variable slots (default: 16).
        #[arg(long, default_value_t = 16)]
        locals: usize,

        /// Argument stored into the next local, as KIND:VALUE.
        #[arg(long = "arg", value_parser = cli::parse_slot)]
        args: Vec<Slot>,

        /// Number of measured runs (default: 10000).
        #[arg(long, default_value_t = 10000)]
        cycles: u64,

        /// Number of warmup runs before measurement (default: 1000).
        #[arg(long, default_value_t = 1000)]
        warmup: u64,

        /// Fail when a single run exceeds N instructions (default: no limit,
        /// stop with Ctrl+C).
        #[arg(long)]
        max_steps: Option<u64>,
    },
    /// Prints the version number of the interpreter.
    Version,
}

pub fn main() -> Result<(), String> {
    let args = Args::parse();

    logger::configure(args.verbose, args.log_file)?;

    match args.action {
        Action::Run {
            file,
            locals,
            args,
            max_steps,
            dump_locals,
        } => cli::run(&file, locals, &args, max_steps, dump_locals.as_deref()),
        Action::Disassemble { file } => cli::disassemble(&file),
        Action::Benchmark {
            file,
            locals,
            args,
            cycles,
            warmup,
            max_steps,
        } => cli::benchmark(&file, locals, &args, cycles, warmup, max_steps),
        Action::Version => {
            println!("jemu version {VERSION}");
            Ok(())
        }
    }
}
