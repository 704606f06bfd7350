//! metastage - CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metastage::util::config::{load_config, StageConfig};
use metastage::util::diagnostic::{DiagnosticRenderer, EmitterConfig};
use metastage::util::logger::{self, LogLevel};
use metastage::util::span::SourceFile;
use metastage::vm::{VMConfig, VM};
use metastage::{CompileError, Compiler, NAME, VERSION};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// A two-stage (meta / object) partial evaluator
#[derive(Parser, Debug)]
#[command(name = "metastage")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./metastage.toml when present)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Disable coloured diagnostics
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate and run a source file
    Run {
        /// Source file to run
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Translate and run code given on the command line
    Eval {
        /// Code to evaluate
        #[arg(value_name = "CODE")]
        code: String,
    },

    /// Translate a source file without running it
    Check {
        /// Source file to check
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print the meta-stage store as JSON afterwards
        #[arg(long)]
        store: bool,
    },

    /// Print the residual program
    Emit {
        /// Source file to translate
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Emit JSON instead of source syntax
        #[arg(long)]
        json: bool,
    },

    /// Print version information
    Version,
}

/// A compile error already rendered to stderr
#[derive(Debug, thiserror::Error)]
#[error("translation failed")]
struct Reported;

fn main() -> ExitCode {
    let args = Args::parse();

    match execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if err.downcast_ref::<Reported>().is_none() {
                eprintln!("error: {:#}", err);
            }
            ExitCode::FAILURE
        }
    }
}

fn execute(args: Args) -> Result<()> {
    let mut config = load_config(args.config.as_deref()).context("Failed to load config")?;
    if args.no_color {
        config.diagnostics.colors = false;
    }

    if args.verbose {
        logger::init_cli(true);
    } else {
        logger::init_with_level(LogLevel::parse(&config.log.level).unwrap_or(LogLevel::Warn));
    }
    tracing::debug!("{} version {} on {}", NAME, VERSION, std::env::consts::OS);

    match args.command {
        Commands::Run { file } => {
            let source = read_source(&file)?;
            run_source(&config, &file.display().to_string(), &source)
                .with_context(|| format!("Failed to run: {}", file.display()))?;
        }
        Commands::Eval { code } => {
            run_source(&config, "<eval>", &code).context("Failed to evaluate code")?;
        }
        Commands::Check { file, store } => {
            let source = read_source(&file)?;
            let name = file.display().to_string();
            let mut compiler = Compiler::with_config(config.clone());
            let translation = compile(&mut compiler, &config, &name, &source)?;
            print_meta_output(&config, &translation.meta_output);
            if store {
                let snapshot = compiler.store().snapshot();
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            eprintln!("Check passed!");
        }
        Commands::Emit { file, json } => {
            let source = read_source(&file)?;
            let name = file.display().to_string();
            let mut compiler = Compiler::with_config(config.clone());
            let translation = compile(&mut compiler, &config, &name, &source)?;
            if json {
                println!("{}", translation.program.to_json()?);
            } else {
                print!("{}", translation.program);
            }
        }
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
        }
    }

    Ok(())
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Translate, print compile-time output, then run the residual program
fn run_source(
    config: &StageConfig,
    name: &str,
    source: &str,
) -> Result<()> {
    let mut compiler = Compiler::with_config(config.clone());
    let translation = compile(&mut compiler, config, name, source)?;
    print_meta_output(config, &translation.meta_output);

    let mut vm = VM::with_config(
        &translation.program,
        VMConfig {
            echo_output: true,
            ..VMConfig::default()
        },
    );
    vm.run()?;
    Ok(())
}

/// Compile, rendering any error as a diagnostic on stderr
fn compile(
    compiler: &mut Compiler,
    config: &StageConfig,
    name: &str,
    source: &str,
) -> Result<metastage::staging::Translation> {
    compiler.compile(source).map_err(|err| {
        report(config, name, source, &err);
        Reported.into()
    })
}

fn report(
    config: &StageConfig,
    name: &str,
    source: &str,
    err: &CompileError,
) {
    let renderer = DiagnosticRenderer::with_config(EmitterConfig::from(&config.diagnostics));
    let source_file = SourceFile::new(name, source);
    eprint!("{}", renderer.render(&err.to_diagnostic(), Some(&source_file)));
}

fn print_meta_output(
    config: &StageConfig,
    lines: &[String],
) {
    if config.translation.echo_meta_output {
        for line in lines {
            println!("{}", line);
        }
    }
}
