//! Assembles the engine configuration from CLI flags, the optional
//! manifest, and the built-in presets, then hands off to the renderer.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use playlist::{ImageSource, Playlist, PulseProfile, SelectionMode};
use renderer::{ColorScheme, EffectSettings, EngineConfig, RecordOptions, Viewer};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::defaults::{self, parse_hex_color};
use crate::manifest::Manifest;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

pub fn initialise_tracing() {
    let default_filter = "warn,duofade=info,renderer=info,capture=info,playlist=info,\
                          naga=error,wgpu=error,wgpu_core=error,wgpu_hal=error,winit=error";
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn list_presets() -> Result<()> {
    println!("Pulse profiles:");
    for preset in defaults::PULSE_PRESETS {
        let durations: Vec<String> = preset
            .durations_ms
            .iter()
            .map(|ms| format!("{ms}ms"))
            .collect();
        println!("  {:20} {}", preset.name, durations.join(", "));
    }
    println!("Color schemes:");
    for preset in defaults::COLOR_SCHEMES {
        println!(
            "  {:20} {} / {}",
            preset.name, preset.primary, preset.secondary
        );
    }
    Ok(())
}

pub fn run(args: RunArgs) -> Result<()> {
    let manifest = match &args.manifest {
        Some(path) => Manifest::load(path)
            .with_context(|| format!("failed to load manifest {}", path.display()))?,
        None => Manifest::default(),
    };

    let categories = build_categories(&args.images, &manifest)?;
    let profiles = build_profiles(&manifest, args.profile.as_deref())?;
    let schemes = build_schemes(&manifest, args.scheme.as_deref())?;

    if !(args.fade_out_scale > 0.0 && args.fade_out_scale <= 1.0) {
        bail!("--fade-out-scale must be in (0, 1]");
    }

    let config = EngineConfig {
        surface_size: (args.width.max(1), args.height.max(1)),
        categories,
        profiles,
        schemes,
        effects: EffectSettings {
            blur_radius: args.blur.clamp(0.0, 20.0),
            threshold: args.threshold.clamp(0.0, 1.0),
        },
        selection: if args.shuffle {
            SelectionMode::Shuffle
        } else {
            SelectionMode::Random
        },
        selection_seed: args.seed,
        fade_out_scale: args.fade_out_scale,
        record: RecordOptions {
            fps: args.record_fps.max(1),
            transcode: args.transcode,
            ffmpeg_binary: args.ffmpeg.clone(),
        },
        output_dir: args.output_dir.clone(),
    };

    tracing::info!(
        categories = config.categories.len(),
        category = config.categories[0].name(),
        profile = config.profiles[0].name(),
        scheme = %config.schemes[0].name,
        "starting viewer"
    );
    Viewer::new(config).run()
}

/// CLI images become the first category; manifest categories follow in
/// name order and are reachable via the digit keys.
fn build_categories(images: &[String], manifest: &Manifest) -> Result<Vec<Playlist>> {
    let mut categories = Vec::new();

    if !images.is_empty() {
        let mut sources = Vec::new();
        for raw in images {
            sources.extend(expand_source(raw)?);
        }
        categories.push(Playlist::new("custom", sources)?);
    }

    for (name, entry) in &manifest.categories {
        let mut sources = Vec::new();
        for raw in &entry.images {
            sources.extend(expand_source(raw)?);
        }
        categories.push(Playlist::new(name.clone(), sources)?);
    }

    if categories.is_empty() {
        bail!(
            "no images to show: pass image files, directories, or URLs, \
             or a manifest with [categories.*] entries"
        );
    }
    Ok(categories)
}

/// A directory expands to its image files in name order; anything else is a
/// single source.
fn expand_source(raw: &str) -> Result<Vec<ImageSource>> {
    let source = ImageSource::parse(raw);
    let ImageSource::Path(path) = &source else {
        return Ok(vec![source]);
    };
    if !path.is_dir() {
        return Ok(vec![source]);
    }

    let mut paths = Vec::new();
    let entries = std::fs::read_dir(path)
        .with_context(|| format!("failed to read directory {}", path.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", path.display()))?;
        let candidate = entry.path();
        if candidate.is_file() && is_image_file(&candidate) {
            paths.push(candidate);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    if paths.is_empty() {
        bail!("no image files found in directory {}", path.display());
    }
    Ok(paths.into_iter().map(ImageSource::Path).collect())
}

/// Built-ins plus manifest profiles; `requested` (if any) is moved to the
/// front so it starts active.
fn build_profiles(manifest: &Manifest, requested: Option<&str>) -> Result<Vec<PulseProfile>> {
    let mut profiles = defaults::builtin_profiles();
    for (name, entry) in &manifest.profiles {
        let durations = entry
            .durations_ms
            .iter()
            .copied()
            .map(Duration::from_millis)
            .collect();
        profiles.push(PulseProfile::new(name.clone(), durations)?);
    }
    if let Some(name) = requested {
        promote(&mut profiles, |profile| profile.name() == name)
            .with_context(|| format!("unknown pulse profile '{name}'"))?;
    }
    Ok(profiles)
}

fn build_schemes(manifest: &Manifest, requested: Option<&str>) -> Result<Vec<ColorScheme>> {
    let mut schemes = defaults::builtin_schemes();
    for (name, entry) in &manifest.schemes {
        schemes.push(ColorScheme {
            name: name.clone(),
            primary: parse_hex_color(&entry.primary)
                .with_context(|| format!("scheme '{name}' primary color"))?,
            secondary: parse_hex_color(&entry.secondary)
                .with_context(|| format!("scheme '{name}' secondary color"))?,
        });
    }
    if let Some(name) = requested {
        promote(&mut schemes, |scheme| scheme.name == name)
            .with_context(|| format!("unknown color scheme '{name}'"))?;
    }
    Ok(schemes)
}

fn promote<T>(items: &mut Vec<T>, matches: impl Fn(&T) -> bool) -> Option<()> {
    let position = items.iter().position(matches)?;
    let item = items.remove(position);
    items.insert(0, item);
    Some(())
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_expand_to_sorted_image_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.jpg", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let sources = expand_source(dir.path().to_str().unwrap()).unwrap();
        let names: Vec<String> = sources.iter().map(|source| source.to_string()).collect();
        assert_eq!(names.len(), 2);
        assert!(names[0].ends_with("a.jpg"));
        assert!(names[1].ends_with("b.png"));
    }

    #[test]
    fn urls_pass_through_unexpanded() {
        let sources = expand_source("https://example.com/tree.jpg").unwrap();
        assert_eq!(sources.len(), 1);
        assert!(matches!(sources[0], ImageSource::Url(_)));
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(expand_source(dir.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn requested_profile_moves_to_the_front() {
        let manifest = Manifest::default();
        let profiles = build_profiles(&manifest, Some("electric-pulse-02")).unwrap();
        assert_eq!(profiles[0].name(), "electric-pulse-02");
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let manifest = Manifest::default();
        assert!(build_profiles(&manifest, Some("no-such-pulse")).is_err());
    }

    #[test]
    fn manifest_schemes_extend_the_builtins() {
        let manifest = Manifest::from_toml_str(
            r##"
[schemes.ember]
primary = "#2B1B12"
secondary = "#F2A65A"
"##,
        )
        .unwrap();
        let schemes = build_schemes(&manifest, Some("ember")).unwrap();
        assert_eq!(schemes[0].name, "ember");
        assert_eq!(schemes.len(), defaults::COLOR_SCHEMES.len() + 1);
    }
}
