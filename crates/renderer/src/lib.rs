//! Rendering engine for duofade.
//!
//! The crate glues the winit preview window, the `wgpu` pipeline, and the
//! crossfade state machine together. The overall flow is:
//!
//! ```text
//!   CLI / duofade
//!          │ EngineConfig
//!          ▼
//!   Viewer::run ──▶ winit event loop ──▶ Engine::render_frame()
//!                        │                      │
//!                        │ keyboard             ├─▶ Crossfader (triggers, mixes)
//!                        └─▶ Command ──────────▶├─▶ SlotLoader (async decode)
//!                                               ├─▶ FadeUniforms ─▶ GPU UBO
//!                                               └─▶ Readback ─▶ capture crate
//! ```
//!
//! `Engine` owns all GPU resources (surface, device, pipelines, the two
//! texture slots) plus the animation clock and recording session, while
//! [`Viewer`] is the thin entry point that opens the window and drives the
//! event loop.

mod context;
mod crossfade;
mod engine;
mod pipeline;
mod readback;
mod textures;
mod timeline;
mod types;
mod uniforms;
mod window;

use anyhow::Result;

pub use textures::LoadError;
pub use types::{ColorScheme, EffectSettings, EngineConfig, EngineError, RecordOptions};

/// High-level entry point that owns the chosen configuration.
pub struct Viewer {
    config: EngineConfig,
}

impl Viewer {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Opens the preview window and runs until it is closed or a fatal
    /// graphics error stops the loop.
    pub fn run(self) -> Result<()> {
        window::run(self.config)
    }
}
