use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "duofade",
    about = "Crossfading duotone image viewer with snapshot and video export",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the built-in pulse profiles and color schemes.
    Presets,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Image files, directories, or URLs forming the default category.
    #[arg(value_name = "IMAGE")]
    pub images: Vec<String>,

    /// TOML manifest describing categories, pulse profiles, and color schemes.
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Window width in pixels.
    #[arg(long, default_value_t = 1080)]
    pub width: u32,

    /// Window height in pixels.
    #[arg(long, default_value_t = 1080)]
    pub height: u32,

    /// Blur tap spread in pixels.
    #[arg(long, default_value_t = 1.0)]
    pub blur: f32,

    /// Luma threshold for the duotone split, 0-1.
    #[arg(long, default_value_t = 0.85)]
    pub threshold: f32,

    /// Color scheme to start with, by name.
    #[arg(long)]
    pub scheme: Option<String>,

    /// Pulse profile to start with, by name.
    #[arg(long)]
    pub profile: Option<String>,

    /// Walk a pre-shuffled permutation instead of uniform random picks.
    #[arg(long)]
    pub shuffle: bool,

    /// Seed for the selection policy, for reproducible runs.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Scale applied to the fading-out slot's opacity, (0-1].
    #[arg(long, default_value_t = 1.0)]
    pub fade_out_scale: f32,

    /// Capture frame rate for video recording.
    #[arg(long, default_value_t = 30)]
    pub record_fps: u32,

    /// Transcode recordings to MP4 with ffmpeg instead of keeping raw frames.
    #[arg(long)]
    pub transcode: bool,

    /// ffmpeg binary used for transcoding.
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Directory receiving snapshots and recordings.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

pub fn parse() -> Cli {
    Cli::parse()
}
