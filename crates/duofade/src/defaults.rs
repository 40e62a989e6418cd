//! Built-in preset tables: duotone color schemes and fade pacing profiles.

use std::time::Duration;

use anyhow::{bail, Result};
use playlist::PulseProfile;
use renderer::ColorScheme;

pub struct SchemePreset {
    pub name: &'static str,
    pub primary: &'static str,
    pub secondary: &'static str,
}

pub const COLOR_SCHEMES: &[SchemePreset] = &[
    SchemePreset {
        name: "forest-mist",
        primary: "#335402",
        secondary: "#C7E3F6",
    },
    SchemePreset {
        name: "earthy-bark",
        primary: "#4A3B31",
        secondary: "#A8B868",
    },
    SchemePreset {
        name: "sunset-grove",
        primary: "#24330D",
        secondary: "#F9A03F",
    },
    SchemePreset {
        name: "desert-bloom",
        primary: "#5C3D2E",
        secondary: "#EFE2BA",
    },
    SchemePreset {
        name: "spring-leaf",
        primary: "#335402",
        secondary: "#D4E09B",
    },
];

pub struct PulsePreset {
    pub name: &'static str,
    pub durations_ms: &'static [u64],
}

pub const PULSE_PRESETS: &[PulsePreset] = &[
    PulsePreset {
        name: "electric-pulse-01",
        durations_ms: &[
            16000, 8000, 18000, 7000, 15000, 9000, 17000, 6000, 16000, 10000,
        ],
    },
    PulsePreset {
        name: "electric-pulse-02",
        durations_ms: &[6000, 2000, 5500, 2500, 5000, 1800, 4700, 2200, 6000, 1900],
    },
];

/// Parses `#RRGGBB` (leading `#` optional) into normalized RGB.
pub fn parse_hex_color(raw: &str) -> Result<[f32; 3]> {
    let hex = raw.trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("'{raw}' is not a #RRGGBB color");
    }
    let value = u32::from_str_radix(hex, 16).expect("validated hex digits");
    Ok([
        ((value >> 16) & 0xFF) as f32 / 255.0,
        ((value >> 8) & 0xFF) as f32 / 255.0,
        (value & 0xFF) as f32 / 255.0,
    ])
}

pub fn builtin_schemes() -> Vec<ColorScheme> {
    COLOR_SCHEMES
        .iter()
        .map(|preset| ColorScheme {
            name: preset.name.to_string(),
            primary: parse_hex_color(preset.primary).expect("built-in colors are valid"),
            secondary: parse_hex_color(preset.secondary).expect("built-in colors are valid"),
        })
        .collect()
}

pub fn builtin_profiles() -> Vec<PulseProfile> {
    PULSE_PRESETS
        .iter()
        .map(|preset| {
            let durations = preset
                .durations_ms
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect();
            PulseProfile::new(preset.name, durations).expect("built-in profiles are non-empty")
        })
        .collect()
}
