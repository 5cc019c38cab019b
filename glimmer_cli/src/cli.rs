use clap::{Args, Parser};
use std::path::PathBuf;

fn clap_styles() -> clap::builder::Styles {
    use clap::builder::styling::{AnsiColor, Color, Style};
    let heading = Style::new()
        .bold()
        .underline()
        .fg_color(Some(Color::Ansi(AnsiColor::Cyan)));

    clap::builder::Styles::styled()
        .header(heading)
        .usage(heading)
        .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlue))))
        .invalid(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightRed))))
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::White))))
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the BIOS to boot.
    pub bios: PathBuf,
    /// Number of frames to run.
    #[arg(short, long, default_value_t = 60)]
    pub frames: u64,
    /// Save state to load before running.
    #[arg(short, long)]
    pub load_state: Option<PathBuf>,
    /// Where to write a save state once done.
    #[arg(short, long)]
    pub save_state: Option<PathBuf>,
    /// Model instruction cache timing.
    #[arg(long)]
    pub icache: bool,
}

/// glimmer ps2 emulator (headless)
#[derive(Debug, Parser)]
#[command(name = "glimmer")]
#[command(styles = clap_styles())]
pub struct Cli {
    #[command(flatten)]
    pub args: RunArgs,
}
