use anyhow::{Context, Result};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use std::fs;
use std::path::PathBuf;
use tracing::info;

use uselessc::generator::disassemble;

struct CompileArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    abi: Option<PathBuf>,
    asm: bool,
}

impl CompileArgs {
    fn from_matches(matches: &ArgMatches<'_>) -> Result<Self> {
        let input = PathBuf::from(matches.value_of("INPUT").context("Missing input file")?);
        let write = matches.is_present("write");

        // `--write` fills in whichever output path was not given explicitly.
        let output = matches
            .value_of("output")
            .map(PathBuf::from)
            .or_else(|| write.then(|| input.with_extension("bin")));
        let abi = matches
            .value_of("abi")
            .map(PathBuf::from)
            .or_else(|| write.then(|| input.with_extension("abi.json")));

        Ok(Self { input, output, abi, asm: matches.is_present("asm") })
    }
}

fn main() -> Result<()> {
    init_logger()?;

    let matches = App::new("uselessc")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compiles Useless contracts to EVM bytecode and ABI")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("compile")
                .about("Compile a Useless contract to EVM bytecode and ABI")
                .arg(
                    Arg::with_name("INPUT")
                        .help("Input .useless file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("output")
                        .short("o")
                        .long("output")
                        .value_name("FILE")
                        .help("Output bytecode to a file")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("abi")
                        .short("a")
                        .long("abi")
                        .value_name("FILE")
                        .help("Output ABI to a file")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("write")
                        .short("w")
                        .long("write")
                        .help("Write outputs next to the input as .bin and .abi.json"),
                )
                .arg(
                    Arg::with_name("asm")
                        .long("asm")
                        .help("Print a disassembly of the runtime code"),
                ),
        )
        .get_matches();

    if let Some(matches) = matches.subcommand_matches("compile") {
        compile(CompileArgs::from_matches(matches)?)?;
    }

    Ok(())
}

fn init_logger() -> Result<()> {
    use tracing_subscriber::prelude::*;

    tracing_subscriber::Registry::default()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to install logger")
}

fn compile(args: CompileArgs) -> Result<()> {
    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read input file: {}", args.input.display()))?;

    let artifact = uselessc::compile(&source)
        .with_context(|| format!("Failed to compile {}", args.input.display()))?;
    info!(functions = artifact.abi.len(), "compiled {}", args.input.display());

    let abi = serde_json::to_string_pretty(&artifact.abi).context("Failed to serialize ABI")?;

    match &args.output {
        Some(path) => {
            fs::write(path, &artifact.bytecode)
                .with_context(|| format!("Failed to write output file: {}", path.display()))?;
            println!("Bytecode written to {}", path.display());
        }
        None => println!("Bytecode: {}", artifact.bytecode),
    }

    match &args.abi {
        Some(path) => {
            fs::write(path, &abi)
                .with_context(|| format!("Failed to write ABI file: {}", path.display()))?;
            println!("ABI written to {}", path.display());
        }
        None => println!("ABI: {abi}"),
    }

    if args.asm {
        let runtime = hex::decode(artifact.runtime.trim_start_matches("0x"))
            .context("Failed to decode runtime code")?;
        for instruction in disassemble(&runtime) {
            println!("{instruction}");
        }
    }

    Ok(())
}
