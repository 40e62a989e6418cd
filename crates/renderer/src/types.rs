use std::path::PathBuf;

use playlist::{Playlist, PulseProfile, SelectionMode};

/// Number of texture slots blended per frame.
pub(crate) const SLOT_COUNT: usize = 2;

/// Fatal engine failures. Everything else (image loads, capture) is
/// recoverable and stays local to its component.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("shader compilation failed: {0}")]
    Shader(String),
    #[error("graphics context failure: {0}")]
    Graphics(String),
}

/// Named duotone color pair, normalized 0-1 RGB.
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub name: String,
    pub primary: [f32; 3],
    pub secondary: [f32; 3],
}

/// Live effect parameters fed to the fragment shader.
#[derive(Debug, Clone, Copy)]
pub struct EffectSettings {
    /// Blur tap spread in pixels.
    pub blur_radius: f32,
    /// Luma threshold for the duotone split, 0-1.
    pub threshold: f32,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            blur_radius: 1.0,
            threshold: 0.85,
        }
    }
}

/// Video capture settings.
#[derive(Debug, Clone)]
pub struct RecordOptions {
    /// Capture frame rate; frames between ticks are not recorded.
    pub fps: u32,
    /// Hand recordings to ffmpeg instead of writing raw frames.
    pub transcode: bool,
    /// ffmpeg binary used when `transcode` is set.
    pub ffmpeg_binary: PathBuf,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            fps: 30,
            transcode: false,
            ffmpeg_binary: PathBuf::from("ffmpeg"),
        }
    }
}

/// Immutable configuration passed to the engine at start-up.
#[derive(Clone)]
pub struct EngineConfig {
    /// Window surface size in physical pixels.
    pub surface_size: (u32, u32),
    /// Selectable image categories; the first one starts active. Never empty.
    pub categories: Vec<Playlist>,
    /// Selectable fade pacing profiles; the first one starts active. Never empty.
    pub profiles: Vec<PulseProfile>,
    /// Selectable duotone color schemes; the first one starts active. Never empty.
    pub schemes: Vec<ColorScheme>,
    /// Initial blur/threshold values.
    pub effects: EffectSettings,
    /// Next-image selection policy.
    pub selection: SelectionMode,
    /// Optional seed for reproducible selection; random otherwise.
    pub selection_seed: Option<u64>,
    /// Scale applied to the fading-out slot's opacity, (0, 1].
    pub fade_out_scale: f32,
    /// Video capture settings.
    pub record: RecordOptions,
    /// Directory receiving snapshots and recordings.
    pub output_dir: PathBuf,
}
