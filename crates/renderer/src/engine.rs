//! Per-frame orchestration: trigger arbitration, load polling, uniform
//! updates, the draw itself, and the capture path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context as AnyhowContext, Result};
use capture::{FfmpegTranscoder, FrameSpec, RecordingSession, ToggleOutcome, Transcoder};
use playlist::{Playlist, PulseProfile};
use winit::dpi::PhysicalSize;

use crate::context::GpuContext;
use crate::crossfade::{select_trigger, Crossfader, LoadRequest, NavDirection, Trigger};
use crate::pipeline::{self, PipelineLayouts};
use crate::readback::Readback;
use crate::textures::{LoadPoll, SlotLoader, SlotTexture};
use crate::types::{ColorScheme, EffectSettings, EngineConfig, EngineError, SLOT_COUNT};
use crate::uniforms::FadeUniforms;

/// Small slack so a capture tick just under the interval still fires.
const CAPTURE_PACING_SLACK: Duration = Duration::from_micros(250);

/// Runtime inputs delivered by the window layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Command {
    TogglePause,
    Advance,
    Rewind,
    Snapshot,
    ToggleRecording,
    SelectCategory(usize),
    CyclePulseProfile,
    CycleColorScheme,
    AdjustBlur(f32),
    AdjustThreshold(f32),
}

/// Why a frame could not be presented. Surface errors may be transient;
/// `Fatal` stops the render loop.
#[derive(Debug)]
pub(crate) enum FrameError {
    Surface(wgpu::SurfaceError),
    Fatal(EngineError),
}

impl From<wgpu::SurfaceError> for FrameError {
    fn from(value: wgpu::SurfaceError) -> Self {
        FrameError::Surface(value)
    }
}

pub(crate) struct Engine {
    context: GpuContext,
    layouts: PipelineLayouts,
    pipeline: wgpu::RenderPipeline,
    capture_pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniforms: FadeUniforms,
    slots: [SlotTexture; SLOT_COUNT],
    slot_bind_group: wgpu::BindGroup,
    loader: SlotLoader,
    fader: Crossfader,
    readback: Readback,
    recording: RecordingSession,
    snapshot_requested: bool,
    pending_category: Option<usize>,
    pending_manual: Option<NavDirection>,
    categories: Vec<Playlist>,
    profiles: Vec<PulseProfile>,
    schemes: Vec<ColorScheme>,
    active_profile: usize,
    active_scheme: usize,
    effects: EffectSettings,
    output_dir: PathBuf,
    record_fps: u32,
    capture_interval: Duration,
    capture_accumulator: Duration,
    last_capture_tick: Option<Instant>,
}

impl Engine {
    pub(crate) fn new<T>(target: &T, config: &EngineConfig) -> Result<Self>
    where
        T: raw_window_handle::HasDisplayHandle + raw_window_handle::HasWindowHandle,
    {
        anyhow::ensure!(
            !config.categories.is_empty(),
            "engine needs at least one image category"
        );
        anyhow::ensure!(
            !config.profiles.is_empty(),
            "engine needs at least one pulse profile"
        );
        anyhow::ensure!(
            !config.schemes.is_empty(),
            "engine needs at least one color scheme"
        );
        std::fs::create_dir_all(&config.output_dir).with_context(|| {
            format!(
                "failed to create output directory {}",
                config.output_dir.display()
            )
        })?;

        let size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
        let context = GpuContext::new(target, size)?;

        let module = pipeline::compile_shader(&context.device)?;
        let layouts = PipelineLayouts::new(&context.device);
        let main_pipeline =
            pipeline::build_pipeline(&context.device, &layouts, &module, context.surface_format);
        let capture_pipeline =
            pipeline::build_pipeline(&context.device, &layouts, &module, Readback::FORMAT);

        let uniforms = FadeUniforms::new(
            context.size.width,
            context.size.height,
            &config.effects,
            &config.schemes[0],
        );
        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform buffer"),
            size: std::mem::size_of::<FadeUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("uniform bind group"),
                layout: &layouts.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

        let slots = [
            SlotTexture::placeholder(&context.device, &context.queue, 0),
            SlotTexture::placeholder(&context.device, &context.queue, 1),
        ];
        let slot_bind_group = pipeline::build_slot_bind_group(&context.device, &layouts, &slots);

        let (fader, requests) = Crossfader::new(
            config.categories[0].clone(),
            config.profiles[0].clone(),
            config.selection,
            config.selection_seed,
            config.fade_out_scale,
            Instant::now(),
        );
        let mut loader = SlotLoader::new();
        for request in requests {
            loader.request(request.slot, request.index, request.source);
        }

        let readback = Readback::new(&context.device, context.size.width, context.size.height);
        let transcoder: Option<Arc<dyn Transcoder>> = config.record.transcode.then(|| {
            Arc::new(FfmpegTranscoder::new(config.record.ffmpeg_binary.clone()))
                as Arc<dyn Transcoder>
        });
        let recording = RecordingSession::new(config.output_dir.clone(), transcoder);

        let record_fps = config.record.fps.max(1);
        Ok(Self {
            context,
            layouts,
            pipeline: main_pipeline,
            capture_pipeline,
            uniform_buffer,
            uniform_bind_group,
            uniforms,
            slots,
            slot_bind_group,
            loader,
            fader,
            readback,
            recording,
            snapshot_requested: false,
            pending_category: None,
            pending_manual: None,
            categories: config.categories.clone(),
            profiles: config.profiles.clone(),
            schemes: config.schemes.clone(),
            active_profile: 0,
            active_scheme: 0,
            effects: config.effects,
            output_dir: config.output_dir.clone(),
            record_fps,
            capture_interval: Duration::from_secs_f64(1.0 / f64::from(record_fps)),
            capture_accumulator: Duration::ZERO,
            last_capture_tick: None,
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.context.resize(new_size);
        self.uniforms.set_resolution(new_size.width, new_size.height);
        if self.recording.is_recording() {
            // Keep the captured stream's geometry stable for the raw blob.
            tracing::debug!("resized during recording; capture keeps its original dimensions");
        } else {
            self.readback = Readback::new(&self.context.device, new_size.width, new_size.height);
        }
    }

    pub(crate) fn handle_command(&mut self, command: Command, now: Instant) {
        match command {
            Command::TogglePause => {
                if self.fader.is_paused() {
                    self.fader.resume(now);
                    tracing::info!("animation resumed");
                } else {
                    self.fader.pause(now);
                    tracing::info!("animation paused");
                }
            }
            Command::Advance => self.pending_manual = Some(NavDirection::Forward),
            Command::Rewind => self.pending_manual = Some(NavDirection::Back),
            Command::Snapshot => self.snapshot_requested = true,
            Command::ToggleRecording => {
                let (width, height) = self.readback.size();
                let spec = FrameSpec {
                    width,
                    height,
                    fps: self.record_fps,
                };
                if self.recording.toggle(spec) == ToggleOutcome::Started {
                    self.capture_accumulator = Duration::ZERO;
                    self.last_capture_tick = None;
                }
            }
            Command::SelectCategory(index) => {
                if index < self.categories.len() {
                    self.pending_category = Some(index);
                } else {
                    tracing::debug!(index, "no such category");
                }
            }
            Command::CyclePulseProfile => {
                self.active_profile = (self.active_profile + 1) % self.profiles.len();
                self.fader
                    .set_profile(self.profiles[self.active_profile].clone());
            }
            Command::CycleColorScheme => {
                self.active_scheme = (self.active_scheme + 1) % self.schemes.len();
                let scheme = &self.schemes[self.active_scheme];
                tracing::info!(scheme = %scheme.name, "color scheme changed");
                self.uniforms.set_scheme(scheme);
            }
            Command::AdjustBlur(delta) => {
                self.effects.blur_radius = (self.effects.blur_radius + delta).clamp(0.0, 20.0);
                self.uniforms.set_effects(&self.effects);
            }
            Command::AdjustThreshold(delta) => {
                self.effects.threshold = (self.effects.threshold + delta).clamp(0.0, 1.0);
                self.uniforms.set_effects(&self.effects);
            }
        }
    }

    /// State-machine work for this frame: settle a finished fade, process at
    /// most one fade trigger, poll texture loads, drive the recorder.
    fn advance_state(&mut self, now: Instant) {
        self.fader.settle_if_finished(now);

        match select_trigger(
            self.pending_category.take(),
            self.pending_manual.take(),
            self.fader.auto_due(now),
        ) {
            Some(Trigger::Playlist(category)) => {
                let playlist = self.categories[category].clone();
                let requests = self.fader.set_playlist(playlist);
                for request in requests {
                    self.issue_load(request);
                }
            }
            Some(Trigger::Manual(direction)) => {
                if let Some(request) = self.fader.navigate(direction, now) {
                    self.issue_load(request);
                }
            }
            Some(Trigger::Auto) => {
                if let Some(request) = self.fader.advance_auto(now) {
                    self.issue_load(request);
                }
            }
            None => {}
        }

        for slot in 0..SLOT_COUNT {
            match self.loader.poll(slot) {
                LoadPoll::Idle | LoadPoll::Pending => {}
                LoadPoll::Ready { index, image } => {
                    self.slots[slot] = SlotTexture::upload(
                        &self.context.device,
                        &self.context.queue,
                        slot,
                        &image,
                    );
                    self.slot_bind_group = pipeline::build_slot_bind_group(
                        &self.context.device,
                        &self.layouts,
                        &self.slots,
                    );
                    self.fader.on_load_complete(slot, index, now);
                }
                LoadPoll::Failed { index, error } => {
                    tracing::warn!(slot, error = %error, "texture load failed");
                    if let Some(retry) = self.fader.on_load_failed(slot, index, now) {
                        self.issue_load(retry);
                    }
                }
            }
        }

        self.recording.poll();
    }

    fn issue_load(&mut self, request: LoadRequest) {
        tracing::debug!(
            slot = request.slot,
            index = request.index,
            source = %request.source,
            "requesting texture"
        );
        self.loader
            .request(request.slot, request.index, request.source);
    }

    /// Paces recording captures to the configured frame rate.
    fn capture_due(&mut self, now: Instant) -> bool {
        if !self.recording.is_recording() {
            return false;
        }
        let Some(last) = self.last_capture_tick.replace(now) else {
            return true;
        };
        self.capture_accumulator += now.saturating_duration_since(last);
        if self.capture_accumulator + CAPTURE_PACING_SLACK < self.capture_interval {
            false
        } else {
            // Subtract a single interval to avoid a burst after long gaps.
            self.capture_accumulator = self
                .capture_accumulator
                .saturating_sub(self.capture_interval);
            true
        }
    }

    pub(crate) fn render_frame(&mut self, now: Instant) -> Result<(), FrameError> {
        self.advance_state(now);

        self.uniforms.set_opacities(self.fader.opacities(now));
        self.context.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&self.uniforms),
        );

        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("render encoder"),
                });

        encode_pass(
            &mut encoder,
            &view,
            &self.pipeline,
            &self.uniform_bind_group,
            &self.slot_bind_group,
        );

        let record_due = self.capture_due(now);
        let want_capture = self.snapshot_requested || record_due;
        if want_capture {
            encode_pass(
                &mut encoder,
                self.readback.view(),
                &self.capture_pipeline,
                &self.uniform_bind_group,
                &self.slot_bind_group,
            );
            self.readback.encode_copy(&mut encoder);
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        if want_capture {
            let pixels = self
                .readback
                .read(&self.context.device)
                .map_err(FrameError::Fatal)?;
            let (width, height) = self.readback.size();
            if self.snapshot_requested {
                self.snapshot_requested = false;
                if let Err(err) = capture::write_snapshot(&self.output_dir, width, height, &pixels)
                {
                    tracing::warn!(error = %err, "snapshot failed");
                }
            }
            if record_due {
                self.recording.push_chunk(pixels);
            }
        }

        Ok(())
    }
}

fn encode_pass(
    encoder: &mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
    render_pipeline: &wgpu::RenderPipeline,
    uniform_bind_group: &wgpu::BindGroup,
    slot_bind_group: &wgpu::BindGroup,
) {
    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("crossfade pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color {
                    r: 0.9,
                    g: 0.9,
                    b: 0.9,
                    a: 1.0,
                }),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        occlusion_query_set: None,
        timestamp_writes: None,
    });
    render_pass.set_pipeline(render_pipeline);
    render_pass.set_bind_group(0, uniform_bind_group, &[]);
    render_pass.set_bind_group(1, slot_bind_group, &[]);
    render_pass.draw(0..3, 0..1);
}
