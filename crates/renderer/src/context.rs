use anyhow::{anyhow, Context as AnyhowContext, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

/// Owns the wgpu instance/surface/device wiring and knows how to rebuild
/// swapchain state when the window resizes.
pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    pub surface_format: wgpu::TextureFormat,
}

impl GpuContext {
    pub(crate) fn new<T>(target: &T, initial_size: PhysicalSize<u32>) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let window_handle = target
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;

        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .context("failed to create rendering surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let limits = adapter.limits();
        let max_dimension = limits.max_texture_dimension_2d;
        let requested_width = initial_size.width.max(1);
        let requested_height = initial_size.height.max(1);
        if requested_width > max_dimension || requested_height > max_dimension {
            anyhow::bail!(
                "GPU max texture dimension is {max_dimension}, requested surface is {requested_width}x{requested_height}"
            );
        }

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("duofade device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits.clone(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        let present_mode = surface_caps
            .present_modes
            .iter()
            .copied()
            .find(|mode| *mode == wgpu::PresentMode::Fifo)
            .unwrap_or(surface_caps.present_modes[0]);

        let size = PhysicalSize::new(requested_width, requested_height);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        tracing::debug!(
            ?surface_format,
            ?present_mode,
            width = size.width,
            height = size.height,
            "initialised GPU surface"
        );

        Ok(Self {
            _instance: instance,
            surface,
            device,
            queue,
            config,
            size,
            surface_format,
        })
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }
}
