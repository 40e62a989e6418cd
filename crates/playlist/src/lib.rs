//! Playlists, pulse profiles, and the next-image selection policy.
//!
//! A [`Playlist`] is the immutable, ordered image set of one category. A
//! [`PulseProfile`] paces the crossfades by rotating through a list of fade
//! durations. The [`IndexPicker`] decides which playlist entry fades in next
//! and guarantees that a playlist with more than one entry never repeats the
//! image currently on screen.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use rand::prelude::*;

#[derive(Debug, thiserror::Error)]
pub enum PlaylistError {
    #[error("category '{0}' has no images")]
    EmptyPlaylist(String),
    #[error("pulse profile '{0}' has no durations")]
    EmptyProfile(String),
}

/// Opaque reference to an image: a local file or a remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Path(PathBuf),
    Url(String),
}

impl ImageSource {
    /// Classifies a raw string as a URL or a filesystem path.
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            ImageSource::Url(raw.to_string())
        } else {
            ImageSource::Path(PathBuf::from(raw))
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Path(path) => write!(f, "{}", path.display()),
            ImageSource::Url(url) => f.write_str(url),
        }
    }
}

/// Ordered image set of one category. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Playlist {
    name: String,
    images: Vec<ImageSource>,
}

impl Playlist {
    pub fn new(name: impl Into<String>, images: Vec<ImageSource>) -> Result<Self, PlaylistError> {
        let name = name.into();
        if images.is_empty() {
            return Err(PlaylistError::EmptyPlaylist(name));
        }
        Ok(Self { name, images })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn image(&self, index: usize) -> Option<&ImageSource> {
        self.images.get(index)
    }

    pub fn images(&self) -> &[ImageSource] {
        &self.images
    }
}

/// Named sequence of fade durations with a rotating cursor.
///
/// The Nth fade consumes `durations[cursor mod len]`; selecting a profile
/// starts over from the first entry.
#[derive(Debug, Clone)]
pub struct PulseProfile {
    name: String,
    durations: Vec<Duration>,
    cursor: usize,
}

impl PulseProfile {
    pub fn new(
        name: impl Into<String>,
        durations: Vec<Duration>,
    ) -> Result<Self, PlaylistError> {
        let name = name.into();
        if durations.is_empty() {
            return Err(PlaylistError::EmptyProfile(name));
        }
        Ok(Self {
            name,
            durations,
            cursor: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The duration the next fade would use, without consuming it.
    pub fn current(&self) -> Duration {
        self.durations[self.cursor % self.durations.len()]
    }

    /// Consumes the current duration and rotates the cursor.
    pub fn next_duration(&mut self) -> Duration {
        let duration = self.current();
        self.cursor = (self.cursor + 1) % self.durations.len();
        duration
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// How the next playlist index is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Uniform pick among all indices except the excluded one.
    Random,
    /// Walk a pre-shuffled permutation, reshuffling once exhausted.
    Shuffle,
}

/// Stateful next-index policy.
///
/// Both modes uphold the same contract: for playlists longer than one entry
/// the returned index never equals `exclude`; a single-entry playlist always
/// yields index 0.
pub struct IndexPicker {
    mode: SelectionMode,
    rng: StdRng,
    order: Vec<usize>,
    cursor: usize,
}

impl IndexPicker {
    pub fn new(mode: SelectionMode) -> Self {
        Self::with_seed(mode, rand::random())
    }

    pub fn with_seed(mode: SelectionMode, seed: u64) -> Self {
        Self {
            mode,
            rng: StdRng::seed_from_u64(seed),
            order: Vec::new(),
            cursor: 0,
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Discards shuffle state, e.g. after the playlist changed.
    pub fn reset(&mut self, len: usize) {
        self.order.clear();
        self.cursor = 0;
        if matches!(self.mode, SelectionMode::Shuffle) {
            self.reshuffle(len);
        }
    }

    /// Picks the next index out of `0..len`, never returning `exclude` while
    /// more than one candidate exists.
    pub fn next(&mut self, len: usize, exclude: Option<usize>) -> usize {
        if len <= 1 {
            return 0;
        }
        match self.mode {
            SelectionMode::Random => (0..len)
                .filter(|index| Some(*index) != exclude)
                .choose(&mut self.rng)
                .expect("a playlist longer than one entry has a non-excluded index"),
            SelectionMode::Shuffle => {
                if self.order.len() != len {
                    self.reshuffle(len);
                }
                loop {
                    if self.cursor >= self.order.len() {
                        self.reshuffle(len);
                    }
                    let index = self.order[self.cursor];
                    self.cursor += 1;
                    if Some(index) != exclude {
                        return index;
                    }
                }
            }
        }
    }

    fn reshuffle(&mut self, len: usize) {
        self.order = (0..len).collect();
        self.order.shuffle(&mut self.rng);
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(count: usize) -> Vec<ImageSource> {
        (0..count)
            .map(|index| ImageSource::parse(&format!("images/{index}.png")))
            .collect()
    }

    #[test]
    fn empty_playlist_is_rejected() {
        let result = Playlist::new("bare", Vec::new());
        assert!(matches!(result, Err(PlaylistError::EmptyPlaylist(_))));
    }

    #[test]
    fn parse_distinguishes_urls_from_paths() {
        assert!(matches!(
            ImageSource::parse("https://example.com/a.jpg"),
            ImageSource::Url(_)
        ));
        assert!(matches!(
            ImageSource::parse("shots/a.jpg"),
            ImageSource::Path(_)
        ));
    }

    #[test]
    fn pulse_profile_rotates_and_resets() {
        let mut profile = PulseProfile::new(
            "test",
            vec![Duration::from_millis(1000), Duration::from_millis(2000)],
        )
        .unwrap();
        assert_eq!(profile.next_duration(), Duration::from_millis(1000));
        assert_eq!(profile.next_duration(), Duration::from_millis(2000));
        assert_eq!(profile.next_duration(), Duration::from_millis(1000));
        profile.next_duration();
        profile.reset();
        assert_eq!(profile.current(), Duration::from_millis(1000));
    }

    #[test]
    fn empty_profile_is_rejected() {
        let result = PulseProfile::new("hollow", Vec::new());
        assert!(matches!(result, Err(PlaylistError::EmptyProfile(_))));
    }

    #[test]
    fn random_never_repeats_the_excluded_index() {
        let mut picker = IndexPicker::with_seed(SelectionMode::Random, 7);
        let mut current = 2;
        for _ in 0..200 {
            let next = picker.next(5, Some(current));
            assert_ne!(next, current);
            assert!(next < 5);
            current = next;
        }
    }

    #[test]
    fn single_entry_playlist_always_returns_zero() {
        let mut picker = IndexPicker::with_seed(SelectionMode::Random, 3);
        assert_eq!(picker.next(1, Some(0)), 0);
        let mut picker = IndexPicker::with_seed(SelectionMode::Shuffle, 3);
        assert_eq!(picker.next(1, Some(0)), 0);
    }

    #[test]
    fn shuffle_covers_every_index_before_repeating() {
        let mut picker = IndexPicker::with_seed(SelectionMode::Shuffle, 11);
        picker.reset(5);
        let mut seen: Vec<usize> = (0..5).map(|_| picker.next(5, None)).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn shuffle_skips_the_excluded_index() {
        let mut picker = IndexPicker::with_seed(SelectionMode::Shuffle, 13);
        let mut current = 0;
        for _ in 0..50 {
            let next = picker.next(4, Some(current));
            assert_ne!(next, current);
            current = next;
        }
    }

    #[test]
    fn playlist_smoke() {
        let playlist = Playlist::new("birch", sources(3)).unwrap();
        assert_eq!(playlist.len(), 3);
        assert_eq!(playlist.name(), "birch");
        assert!(playlist.image(2).is_some());
        assert!(playlist.image(3).is_none());
    }
}
