use anyhow::{bail, Context, Result};
use clap::Parser;
use emu86_core::logging::{LogConfig, LogLevel};
use emu86_core::{CpuModel, RunOutcome, System};
use emu86_pc::{PcConfig, PcSystem};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "emu86", about = "Run decoded 80x86 programs on an emulated IBM PC")]
struct Args {
    /// JSON program listing to run
    program: Option<PathBuf>,

    /// Run the built-in Hello World demo instead of a listing
    #[arg(long, default_value_t = false, conflicts_with = "program")]
    demo: bool,

    /// Machine configuration (JSON); missing file means defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// CPU model: 8086, 8088, 80186, 80188, 80286 or 80386
    #[arg(long)]
    cpu: Option<String>,

    /// Instruction budget for the run (0 = unbounded)
    #[arg(long)]
    max_steps: Option<u64>,

    /// Core log level: off, error, warn, info, debug, trace
    #[arg(long)]
    log_level: Option<String>,

    /// Write core logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Keystrokes queued for the program before it starts
    #[arg(long)]
    input: Option<String>,

    /// Print the program listing before running
    #[arg(long, default_value_t = false)]
    list: bool,

    /// Dump save-state to this file as JSON
    #[arg(long)]
    save: Option<PathBuf>,

    /// Don't echo console output or print the run summary
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

/// File config with command-line overrides applied
fn build_config(args: &Args) -> Result<PcConfig> {
    let mut config = match &args.config {
        Some(path) => PcConfig::load(path)?,
        None => PcConfig::default(),
    };
    if let Some(name) = &args.cpu {
        config.cpu_model = CpuModel::from_name(name)
            .with_context(|| format!("unknown CPU model '{}'", name))?;
    }
    if let Some(steps) = args.max_steps {
        config.max_steps = (steps > 0).then_some(steps);
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    config.echo = !args.quiet;
    Ok(config)
}

fn configure_logging(config: &PcConfig, log_file: Option<&PathBuf>) -> Result<LogLevel> {
    let level = config.log_level()?;
    let log_config = LogConfig::global();
    log_config.set_global_level(level);
    if let Some(path) = log_file {
        log_config
            .set_log_file(path.clone())
            .with_context(|| format!("cannot open log file {}", path.display()))?;
    }
    Ok(level)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = build_config(&args)?;
    let level = configure_logging(&config, args.log_file.as_ref())?;
    log::debug!("core log level {:?}, CPU {}", level, config.cpu_model.name());

    let mut sys = PcSystem::with_config(config);
    if args.demo {
        let (segment, origin) = (sys.config().load_segment, sys.config().origin);
        sys.load_program(emu86_pc::demo::hello_world(segment, origin)?)?;
    } else if let Some(path) = &args.program {
        sys.load_listing_from_path(path)
            .with_context(|| format!("cannot load program {}", path.display()))?;
    } else {
        bail!("No program given; pass a JSON listing or --demo");
    }

    if args.list {
        for instruction in sys.program().instructions() {
            println!(
                "{:04X}:{:04X}  {}",
                instruction.segment, instruction.offset, instruction.opcode
            );
        }
    }

    if let Some(input) = &args.input {
        sys.feed_input(input.as_bytes());
    }

    let result = sys.run();

    // Save even after a failure so the faulting state can be inspected
    if let Some(path) = &args.save {
        let state = sys.save_state();
        let mut f = File::create(path)?;
        write!(f, "{}", serde_json::to_string_pretty(&state)?)?;
        log::info!("save-state written to {}", path.display());
    }

    let regs = sys.registers();
    match result {
        Ok(outcome) => {
            if !args.quiet {
                println!();
                let how = match outcome {
                    RunOutcome::Halted => "halted",
                    RunOutcome::Completed => "completed",
                };
                println!(
                    "Program {} after {} instructions (exit code {})",
                    how,
                    sys.instructions_executed(),
                    sys.exit_code()
                        .map_or_else(|| "none".to_string(), |c| c.to_string())
                );
            }
        }
        Err(err) => {
            eprintln!();
            eprintln!(
                "Stopped at {:04X}:{:04X} after {} instructions",
                regs.cs,
                regs.ip,
                sys.instructions_executed()
            );
            return Err(err.into());
        }
    }

    if let Some(code) = sys.exit_code().filter(|&c| c != 0) {
        std::process::exit(code as i32);
    }
    Ok(())
}
