use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser as ClapParser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use nightvm::{CodeChunk, Runtime, Value, VmConfig};

#[derive(ClapParser, Debug)]
#[command(name = "nightvm", version, about = "Run and inspect NightVM bytecode (NVBC)")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute an .nvbc chunk and print its result.
    Run {
        #[arg(value_name = "FILE")]
        input: PathBuf,
        /// TOML file with VM limits.
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
        /// Print the result as JSON instead of its printed form.
        #[arg(long)]
        json: bool,
        /// Arguments passed to the chunk, readable with LOAD_ARG.
        #[arg(value_name = "ARGS", trailing_var_arg = true)]
        args: Vec<String>,
    },
    /// Print a listing of an .nvbc chunk.
    Disasm {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("NIGHTVM_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            input,
            config,
            json,
            args,
        } => {
            let config = match config {
                Some(path) => VmConfig::load(&path)?,
                None => VmConfig::default(),
            };
            nightvm::init(config).context("failed to initialize runtime")?;
            let chunk = read_chunk(&input)?;
            let args: Vec<Value> = args.iter().map(|raw| parse_arg(raw)).collect();
            debug!(file = %input.display(), argc = args.len(), "running chunk");

            let runtime = Runtime::default();
            let result = runtime
                .run_with_args(&chunk, args)
                .with_context(|| format!("runtime error in {}", input.display()))?;

            if json {
                println!("{}", serde_json::to_string(&result)?);
            } else {
                println!("{result}");
            }
        }
        Command::Disasm { input } => {
            let chunk = read_chunk(&input)?;
            println!("-- constants --");
            for (idx, constant) in chunk.constants().iter().enumerate() {
                println!("{idx:4}  {constant}");
            }
            println!("-- code --");
            print!("{}", chunk.disassemble());
        }
    }
    Ok(())
}

fn read_chunk(path: &Path) -> anyhow::Result<CodeChunk> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    CodeChunk::read(&mut BufReader::new(file))
        .with_context(|| format!("failed to load {}", path.display()))
}

// Command-line arguments are ints, floats, booleans, nil, or strings.
fn parse_arg(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(x) = raw.parse::<f64>() {
        return Value::Float(x);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "nil" => Value::Nil,
        other => Value::from(other),
    }
}
