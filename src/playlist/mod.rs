pub mod scan;

use std::slice;

use crate::models::Track;

pub use scan::discover;

/// Ordered, append-only list of the tracks found at startup
#[derive(Debug, Clone, Default)]
pub struct PlaylistStore {
    tracks: Vec<Track>,
}

impl PlaylistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, track: Track) {
        self.tracks.push(track);
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Track> {
        self.tracks.iter()
    }

    /// Sum of the header durations, in seconds
    pub fn total_duration(&self) -> f64 {
        self.tracks.iter().map(|t| t.duration).sum()
    }
}

impl FromIterator<Track> for PlaylistStore {
    fn from_iter<I: IntoIterator<Item = Track>>(iter: I) -> Self {
        Self {
            tracks: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PlaylistStore {
    type Item = &'a Track;
    type IntoIter = slice::Iter<'a, Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn track(name: &str, duration: f64) -> Track {
        Track::new(PathBuf::from(format!("/music/{}", name)), name.to_string(), duration)
    }

    #[test]
    fn test_push_preserves_order() {
        let mut store = PlaylistStore::new();
        assert!(store.is_empty());

        store.push(track("b.wav", 1.0));
        store.push(track("a.wav", 2.0));

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(0).unwrap().name, "b.wav");
        assert_eq!(store.get(1).unwrap().name, "a.wav");
        assert!(store.get(2).is_none());
    }

    #[test]
    fn test_total_duration_and_iteration() {
        let store: PlaylistStore = vec![track("a.wav", 60.0), track("b.wav", 30.0)]
            .into_iter()
            .collect();

        assert_eq!(store.total_duration(), 90.0);
        let names: Vec<&str> = store.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a.wav", "b.wav"]);
        assert_eq!((&store).into_iter().count(), 2);
    }
}
