use bytemuck::{Pod, Zeroable};

use crate::types::{ColorScheme, EffectSettings, SLOT_COUNT};

/// CPU-side mirror of the shader's uniform block.
///
/// Layout must match `FadeUniforms` in `shader.wgsl`; scalar fields are
/// ordered so WGSL's struct rules and this `repr(C)` agree, with the vec4
/// color fields on 16-byte boundaries.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub(crate) struct FadeUniforms {
    resolution: [f32; 2],
    image_scale: f32,
    blur_radius: f32,
    threshold: f32,
    opacity_a: f32,
    opacity_b: f32,
    _pad0: f32,
    duotone_primary: [f32; 4],
    duotone_secondary: [f32; 4],
}

unsafe impl Zeroable for FadeUniforms {}
unsafe impl Pod for FadeUniforms {}

impl FadeUniforms {
    pub fn new(width: u32, height: u32, effects: &EffectSettings, scheme: &ColorScheme) -> Self {
        let mut uniforms = Self {
            resolution: [1.0, 1.0],
            image_scale: 1.0,
            blur_radius: effects.blur_radius,
            threshold: effects.threshold,
            opacity_a: 1.0,
            opacity_b: 0.0,
            _pad0: 0.0,
            duotone_primary: [0.0; 4],
            duotone_secondary: [0.0; 4],
        };
        uniforms.set_resolution(width, height);
        uniforms.set_scheme(scheme);
        uniforms
    }

    /// Records the surface size and derives the cover-fit image scale from
    /// its aspect ratio.
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        let width = width.max(1) as f32;
        let height = height.max(1) as f32;
        self.resolution = [width, height];
        let aspect = width / height;
        self.image_scale = aspect.max(1.0 / aspect);
    }

    pub fn set_effects(&mut self, effects: &EffectSettings) {
        self.blur_radius = effects.blur_radius;
        self.threshold = effects.threshold;
    }

    pub fn set_scheme(&mut self, scheme: &ColorScheme) {
        self.duotone_primary = pad(scheme.primary);
        self.duotone_secondary = pad(scheme.secondary);
    }

    pub fn set_opacities(&mut self, opacities: [f32; SLOT_COUNT]) {
        self.opacity_a = opacities[0].clamp(0.0, 1.0);
        self.opacity_b = opacities[1].clamp(0.0, 1.0);
    }
}

fn pad(color: [f32; 3]) -> [f32; 4] {
    [color[0], color[1], color[2], 1.0]
}
