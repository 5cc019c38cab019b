mod cli;

use clap::Parser;
use cli::Cli;
use easyerr::{Error, ResultExt};
use glimmer::{Config, Emulator, EmulatorError};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    time::Instant,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read the BIOS")]
    Bios { source: std::io::Error },
    #[error("failed to open the save state file")]
    StateFile { source: std::io::Error },
    #[error("emulation failed")]
    Emulator { source: EmulatorError },
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let args = cli.args;

    let bios = std::fs::read(&args.bios).context(CliCtx::Bios)?;
    let config = Config {
        bios,
        icache: args.icache,
        ..Config::default()
    };

    let mut emulator = Emulator::new(config).context(CliCtx::Emulator)?;
    if let Some(path) = &args.load_state {
        let mut reader = BufReader::new(File::open(path).context(CliCtx::StateFile)?);
        emulator
            .load_state(&mut reader)
            .context(CliCtx::Emulator)?;
        info!(path = %path.display(), "loaded save state");
    }

    let start = Instant::now();
    for _ in 0..args.frames {
        emulator.run_frame().context(CliCtx::Emulator)?;
    }

    let elapsed = start.elapsed();
    info!(
        frames = args.frames,
        elapsed = ?elapsed,
        cycles = emulator.cpu().cycles(),
        "done"
    );

    let stdout = &emulator.ps2().memory.kernel_stdout;
    if !stdout.is_empty() {
        println!("{stdout}");
    }

    if let Some(path) = &args.save_state {
        let mut writer = BufWriter::new(File::create(path).context(CliCtx::StateFile)?);
        emulator
            .save_state(&mut writer)
            .context(CliCtx::Emulator)?;
        writer.flush().context(CliCtx::StateFile)?;
        info!(path = %path.display(), "wrote save state");
    }

    Ok(())
}
