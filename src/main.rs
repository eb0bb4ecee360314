use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod config;
mod jit;
mod loader;
mod vm;

use config::BackendConfig;
use jit::Backend;
use vm::ArgPack;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "A trace JIT backend for a two-lane stack machine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a trace document and run it against an argument pack
    Run {
        /// The trace document to compile
        file: PathBuf,

        /// Integer-lane inputs, comma separated
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        ints: Vec<i64>,

        /// Number of null reference-lane inputs
        #[arg(long, default_value = "0")]
        objs: usize,

        /// Log JIT compilation events
        #[arg(long)]
        trace_jit: bool,

        /// Dump the emitted method before running
        #[arg(long)]
        dump: bool,
    },
    /// Compile a trace document and print the emitted method
    Dump {
        /// The trace document to compile
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run { file, ints, objs, trace_jit, dump } => {
            run_trace(&file, ints, objs, trace_jit, dump)
        }
        Commands::Dump { file } => dump_trace(&file),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}

fn run_trace(
    file: &Path,
    ints: Vec<i64>,
    objs: usize,
    trace_jit: bool,
    dump: bool,
) -> Result<(), String> {
    let trace = loader::load_trace(file).map_err(|e| e.to_string())?;
    let config = BackendConfig { trace_compile: trace_jit, dump_code: dump };
    let backend = Backend::with_config(config).map_err(|e| e.to_string())?;
    let compiled = backend.compile_loop(&loop_name(file), &trace).map_err(|e| e.to_string())?;

    let mut pack = ArgPack { ints, objs: vec![None; objs] };
    compiled.invoke(&mut pack).map_err(|e| e.to_string())?;

    println!("ints: {:?}", pack.ints);
    let objs: Vec<&str> =
        pack.objs.iter().map(|o| if o.is_some() { "<object>" } else { "null" }).collect();
    println!("objs: {:?}", objs);
    Ok(())
}

fn dump_trace(file: &Path) -> Result<(), String> {
    let trace = loader::load_trace(file).map_err(|e| e.to_string())?;
    let backend = Backend::new().map_err(|e| e.to_string())?;
    let compiled = backend.compile_loop(&loop_name(file), &trace).map_err(|e| e.to_string())?;
    print!("{}", compiled.image());
    Ok(())
}

/// Name the compiled loop after the document's file stem.
fn loop_name(file: &Path) -> String {
    file.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "loop".to_string())
}
