//! The winit preview window and its keyboard bindings.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use crate::engine::{Command, Engine, FrameError};
use crate::types::EngineConfig;

pub(crate) fn run(config: EngineConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    let window_size =
        winit::dpi::PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title("duofade")
        .with_inner_size(window_size)
        .build(&event_loop)
        .context("failed to create preview window")?;
    let window = Arc::new(window);

    let mut engine = Engine::new(window.as_ref(), &config)?;
    window.request_redraw();

    event_loop
        .run(move |event, elwt| {
            // Drive redraws via vblank by waiting between events.
            elwt.set_control_flow(ControlFlow::Wait);

            match event {
                Event::WindowEvent { window_id, event } if window_id == window.id() => {
                    match event {
                        WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                            elwt.exit();
                        }
                        WindowEvent::Resized(new_size) => {
                            engine.resize(new_size);
                        }
                        WindowEvent::ScaleFactorChanged {
                            mut inner_size_writer,
                            ..
                        } => {
                            // Keep the current logical size when the scale factor changes.
                            let _ = inner_size_writer.request_inner_size(engine.size());
                        }
                        WindowEvent::KeyboardInput { event, .. } => {
                            if event.state == ElementState::Pressed && !event.repeat {
                                if let Some(command) = map_key(&event.logical_key) {
                                    engine.handle_command(command, Instant::now());
                                }
                            }
                        }
                        WindowEvent::RedrawRequested => {
                            match engine.render_frame(Instant::now()) {
                                Ok(()) => {}
                                Err(FrameError::Surface(
                                    wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated,
                                )) => {
                                    engine.resize(engine.size());
                                }
                                Err(FrameError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                                    tracing::error!("surface out of memory; stopping render loop");
                                    elwt.exit();
                                }
                                Err(FrameError::Surface(wgpu::SurfaceError::Timeout)) => {
                                    tracing::warn!("surface timeout; retrying next frame");
                                }
                                Err(FrameError::Surface(other)) => {
                                    tracing::warn!(?other, "surface error; retrying next frame");
                                }
                                Err(FrameError::Fatal(err)) => {
                                    tracing::error!(error = %err, "fatal graphics error; stopping render loop");
                                    elwt.exit();
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Event::AboutToWait => {
                    // Schedule the next frame once winit is about to wait for events again.
                    window.request_redraw();
                }
                _ => {}
            }
        })
        .map_err(|err| anyhow!("event loop error: {err}"))
}

/// Keyboard surface: Space pauses, arrows navigate, S/R capture, P/C cycle
/// presets, -/= and [/] nudge blur and threshold, digits pick a category.
fn map_key(key: &Key) -> Option<Command> {
    match key {
        Key::Named(NamedKey::Space) => Some(Command::TogglePause),
        Key::Named(NamedKey::ArrowRight) => Some(Command::Advance),
        Key::Named(NamedKey::ArrowLeft) => Some(Command::Rewind),
        Key::Character(text) => match text.as_str() {
            "s" | "S" => Some(Command::Snapshot),
            "r" | "R" => Some(Command::ToggleRecording),
            "p" | "P" => Some(Command::CyclePulseProfile),
            "c" | "C" => Some(Command::CycleColorScheme),
            "-" => Some(Command::AdjustBlur(-0.5)),
            "=" | "+" => Some(Command::AdjustBlur(0.5)),
            "[" => Some(Command::AdjustThreshold(-0.05)),
            "]" => Some(Command::AdjustThreshold(0.05)),
            digit @ ("1" | "2" | "3" | "4" | "5" | "6" | "7" | "8" | "9") => {
                let index: usize = digit.parse().ok()?;
                Some(Command::SelectCategory(index - 1))
            }
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::SmolStr;

    #[test]
    fn keys_map_to_commands() {
        assert_eq!(
            map_key(&Key::Named(NamedKey::Space)),
            Some(Command::TogglePause)
        );
        assert_eq!(
            map_key(&Key::Named(NamedKey::ArrowRight)),
            Some(Command::Advance)
        );
        assert_eq!(
            map_key(&Key::Character(SmolStr::new("r"))),
            Some(Command::ToggleRecording)
        );
        assert_eq!(
            map_key(&Key::Character(SmolStr::new("3"))),
            Some(Command::SelectCategory(2))
        );
        assert_eq!(map_key(&Key::Character(SmolStr::new("z"))), None);
    }
}
