use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod analysis;
mod backend;
mod config;
mod error;
mod frontend;
mod ir;
mod opt;

use config::{CompilerConfig, RegisterAllocation};
use error::CompileError;

#[derive(Parser)]
#[command(name = "jmmc")]
#[command(about = "Compiles a Java-- class to Jasmin assembly")]
#[command(version)]
struct Cli {
    /// Source file (.jmm)
    source: PathBuf,

    /// Output file (default: <Class>.j next to the source)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run constant propagation and folding before lowering
    #[arg(short = 'O', long)]
    optimize: bool,

    /// Register allocation: 'off', '0' for as few registers as possible, or a register budget
    #[arg(short, long, default_value = "off", allow_hyphen_values = true)]
    registers: RegisterAllocation,

    /// Print the lowered IR to stdout
    #[arg(long)]
    dump_ir: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    if cli.source.extension().and_then(|e| e.to_str()) != Some("jmm") {
        println!("Error parsing arguments: source file must have a .jmm extension");
        process::exit(1);
    }

    let source_code = fs::read_to_string(&cli.source).unwrap_or_else(|err| {
        println!("Error reading source file: {err}");
        process::exit(1);
    });

    let config = CompilerConfig {
        optimize: cli.optimize,
        register_allocation: cli.registers,
    };

    let compilation = backend::compile_source(&source_code, &config).unwrap_or_else(|err| {
        report(&err);
        process::exit(1);
    });

    for diagnostic in &compilation.diagnostics {
        warn!("{}", diagnostic);
    }

    if cli.dump_ir {
        print!("{}", compilation.unit);
    }

    let destination = cli
        .output
        .unwrap_or_else(|| default_destination(&cli.source, &compilation.unit.name));

    fs::write(&destination, &compilation.assembly).unwrap_or_else(|err| {
        println!("Error writing to destination file: {err}");
        process::exit(1);
    });

    info!("Wrote {}", destination.display());
    println!("Compilation successful!");
}

fn report(err: &CompileError) {
    match err {
        CompileError::Parse(errors) => {
            for e in errors {
                println!("Parse error {}", e);
            }
        }
        CompileError::Semantic(errors) => {
            for e in errors {
                println!("Semantic error: {}", e);
            }
        }
        CompileError::Format(e) => println!("Error during code generation: {}", e),
    }
}

fn default_destination(source: &Path, class_name: &str) -> PathBuf {
    source.with_file_name(format!("{}.j", class_name))
}
