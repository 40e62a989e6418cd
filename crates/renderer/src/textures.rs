//! Texture slots and their asynchronous loading pipeline.
//!
//! Decoding (and for URLs, fetching) happens on short-lived worker threads;
//! the frame loop polls an mpsc receiver per slot. A newer request for the
//! same slot replaces the pending entry, which drops the old receiver, so a
//! superseded worker's late completion has nowhere to land and is ignored.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use playlist::ImageSource;
use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::types::SLOT_COUNT;

/// Image fetch/decode failure, naming the reference that failed. Recoverable:
/// the crossfade policy picks another index or keeps the previous image.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to load image {source_ref}: {message}")]
pub struct LoadError {
    pub source_ref: String,
    pub message: String,
}

impl LoadError {
    fn new(source: &ImageSource, message: impl Into<String>) -> Self {
        Self {
            source_ref: source.to_string(),
            message: message.into(),
        }
    }
}

/// CPU-side decoded RGBA8 image, tightly packed.
pub(crate) struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

fn fetch_bytes(source: &ImageSource) -> Result<Vec<u8>, LoadError> {
    match source {
        ImageSource::Path(path) => {
            std::fs::read(path).map_err(|err| LoadError::new(source, err.to_string()))
        }
        ImageSource::Url(url) => {
            let response = reqwest::blocking::get(url)
                .and_then(|response| response.error_for_status())
                .map_err(|err| LoadError::new(source, err.to_string()))?;
            response
                .bytes()
                .map(|bytes| bytes.to_vec())
                .map_err(|err| LoadError::new(source, err.to_string()))
        }
    }
}

fn decode(source: &ImageSource) -> Result<DecodedImage, LoadError> {
    let bytes = fetch_bytes(source)?;
    let image = image::load_from_memory(&bytes)
        .map_err(|err| LoadError::new(source, err.to_string()))?;
    let rgba = image.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(LoadError::new(source, "image has zero extent"));
    }
    Ok(DecodedImage {
        width: rgba.width(),
        height: rgba.height(),
        pixels: rgba.into_raw(),
    })
}

struct PendingLoad {
    index: usize,
    source: ImageSource,
    receiver: Receiver<Result<DecodedImage, LoadError>>,
}

/// Outcome of polling one slot's pending load.
pub(crate) enum LoadPoll {
    Idle,
    Pending,
    Ready { index: usize, image: DecodedImage },
    Failed { index: usize, error: LoadError },
}

/// At most one in-flight load per slot.
pub(crate) struct SlotLoader {
    pending: [Option<PendingLoad>; SLOT_COUNT],
}

impl SlotLoader {
    pub fn new() -> Self {
        Self {
            pending: [None, None],
        }
    }

    pub fn request(&mut self, slot: usize, index: usize, source: ImageSource) {
        if let Some(previous) = self.pending[slot].take() {
            tracing::debug!(
                slot,
                superseded = %previous.source,
                replacement = %source,
                "superseding pending texture load"
            );
        }
        let (sender, receiver) = mpsc::channel();
        let worker_source = source.clone();
        thread::spawn(move || {
            let _ = sender.send(decode(&worker_source));
        });
        self.pending[slot] = Some(PendingLoad {
            index,
            source,
            receiver,
        });
    }

    pub fn poll(&mut self, slot: usize) -> LoadPoll {
        let Some(pending) = self.pending[slot].as_ref() else {
            return LoadPoll::Idle;
        };
        match pending.receiver.try_recv() {
            Err(TryRecvError::Empty) => LoadPoll::Pending,
            Ok(Ok(image)) => {
                let pending = self.pending[slot].take().expect("pending load present");
                tracing::debug!(
                    slot,
                    source = %pending.source,
                    width = image.width,
                    height = image.height,
                    "texture load complete"
                );
                LoadPoll::Ready {
                    index: pending.index,
                    image,
                }
            }
            Ok(Err(error)) => {
                let pending = self.pending[slot].take().expect("pending load present");
                LoadPoll::Failed {
                    index: pending.index,
                    error,
                }
            }
            Err(TryRecvError::Disconnected) => {
                let pending = self.pending[slot].take().expect("pending load present");
                LoadPoll::Failed {
                    index: pending.index,
                    error: LoadError::new(&pending.source, "loader worker disconnected"),
                }
            }
        }
    }
}

/// GPU resources of one texture slot.
pub(crate) struct SlotTexture {
    pub _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl SlotTexture {
    /// 1×1 neutral texture so bind groups are valid before the first load.
    pub fn placeholder(device: &wgpu::Device, queue: &wgpu::Queue, slot: usize) -> Self {
        let data = [230u8, 230, 230, 255];
        Self::from_rgba(device, queue, slot, 1, 1, &data)
    }

    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        slot: usize,
        image: &DecodedImage,
    ) -> Self {
        Self::from_rgba(device, queue, slot, image.width, image.height, &image.pixels)
    }

    fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        slot: usize,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Self {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(&format!("slot texture #{slot}")),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            pixels,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        Self {
            _texture: texture,
            view,
            sampler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::{Duration, Instant};

    fn write_png(path: &Path, size: u32) {
        let image = image::RgbaImage::from_pixel(size, size, image::Rgba([64, 128, 192, 255]));
        image.save(path).unwrap();
    }

    fn poll_until_done(loader: &mut SlotLoader, slot: usize) -> LoadPoll {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match loader.poll(slot) {
                LoadPoll::Pending => {
                    assert!(Instant::now() < deadline, "timed out waiting for load");
                    thread::sleep(Duration::from_millis(5));
                }
                other => return other,
            }
        }
    }

    #[test]
    fn loads_and_decodes_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        write_png(&path, 2);

        let mut loader = SlotLoader::new();
        loader.request(0, 3, ImageSource::Path(path));
        match poll_until_done(&mut loader, 0) {
            LoadPoll::Ready { index, image } => {
                assert_eq!(index, 3);
                assert_eq!((image.width, image.height), (2, 2));
                assert_eq!(image.pixels.len(), 2 * 2 * 4);
            }
            _ => panic!("expected a decoded image"),
        }
        assert!(matches!(loader.poll(0), LoadPoll::Idle));
    }

    #[test]
    fn newer_request_supersedes_the_pending_one() {
        let dir = tempfile::tempdir().unwrap();
        let small = dir.path().join("small.png");
        let large = dir.path().join("large.png");
        write_png(&small, 2);
        write_png(&large, 4);

        let mut loader = SlotLoader::new();
        loader.request(1, 0, ImageSource::Path(small));
        loader.request(1, 5, ImageSource::Path(large));
        match poll_until_done(&mut loader, 1) {
            LoadPoll::Ready { index, image } => {
                assert_eq!(index, 5);
                assert_eq!((image.width, image.height), (4, 4));
            }
            _ => panic!("expected the replacement image"),
        }
        // The superseded load never surfaces.
        assert!(matches!(loader.poll(1), LoadPoll::Idle));
    }

    #[test]
    fn missing_file_fails_with_the_source_named() {
        let mut loader = SlotLoader::new();
        loader.request(0, 2, ImageSource::parse("definitely/not/here.png"));
        match poll_until_done(&mut loader, 0) {
            LoadPoll::Failed { index, error } => {
                assert_eq!(index, 2);
                assert!(error.to_string().contains("definitely/not/here.png"));
            }
            _ => panic!("expected a load failure"),
        }
    }

    #[test]
    fn undecodable_bytes_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.png");
        std::fs::write(&path, b"not an image at all").unwrap();

        let mut loader = SlotLoader::new();
        loader.request(0, 0, ImageSource::Path(path));
        assert!(matches!(
            poll_until_done(&mut loader, 0),
            LoadPoll::Failed { .. }
        ));
    }
}
