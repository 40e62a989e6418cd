use std::borrow::Cow;

use crate::textures::SlotTexture;
use crate::types::{EngineError, SLOT_COUNT};

const SHADER_WGSL: &str = include_str!("shader.wgsl");

/// Compiles the embedded crossfade shader, failing fast on validation
/// errors: a broken shader aborts engine start-up entirely.
pub(crate) fn compile_shader(device: &wgpu::Device) -> Result<wgpu::ShaderModule, EngineError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("crossfade shader"),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(SHADER_WGSL)),
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(EngineError::Shader(error.to_string()));
    }
    Ok(module)
}

/// Bind group layouts shared by every pipeline variant: group 0 carries the
/// uniform block, group 1 the two slot texture/sampler pairs.
pub(crate) struct PipelineLayouts {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub slot_layout: wgpu::BindGroupLayout,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let mut slot_entries = Vec::with_capacity(SLOT_COUNT * 2);
        for index in 0..SLOT_COUNT {
            slot_entries.push(wgpu::BindGroupLayoutEntry {
                binding: (index as u32) * 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            slot_entries.push(wgpu::BindGroupLayoutEntry {
                binding: (index as u32) * 2 + 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }
        let slot_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("slot layout"),
            entries: &slot_entries,
        });

        Self {
            uniform_layout,
            slot_layout,
        }
    }
}

/// Builds the full-screen crossfade pipeline for one target format. The
/// engine keeps two variants: the swapchain format for presentation and
/// RGBA8 for the capture path.
pub(crate) fn build_pipeline(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    module: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("crossfade pipeline layout"),
        bind_group_layouts: &[&layouts.uniform_layout, &layouts.slot_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("crossfade pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}

/// Rebuilt whenever either slot's texture changes.
pub(crate) fn build_slot_bind_group(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    slots: &[SlotTexture; SLOT_COUNT],
) -> wgpu::BindGroup {
    let mut entries = Vec::with_capacity(SLOT_COUNT * 2);
    for (index, slot) in slots.iter().enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: (index as u32) * 2,
            resource: wgpu::BindingResource::TextureView(&slot.view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: (index as u32) * 2 + 1,
            resource: wgpu::BindingResource::Sampler(&slot.sampler),
        });
    }
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("slot bind group"),
        layout: &layouts.slot_layout,
        entries: &entries,
    })
}
