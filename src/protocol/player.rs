//! Current playback state from `GET /v1/me/player`.
//!
//! Without an active session the endpoint answers `204 No Content`; callers
//! treat an empty body as "nothing playing" rather than parsing it.
//!
//! # Example Response
//!
//! ```json
//! {
//!     "device": { "name": "Living Room", "volume_percent": 42 },
//!     "is_playing": true,
//!     "progress_ms": 61000,
//!     "item": {
//!         "name": "So What",
//!         "duration_ms": 562000,
//!         "artists": [{ "name": "Miles Davis" }],
//!         "album": { "name": "Kind of Blue", "images": [...] }
//!     }
//! }
//! ```

use std::time::Duration;

use serde::Deserialize;
use serde_with::{serde_as, DefaultOnNull, DurationMilliSeconds};

use super::catalog::{Album, Artist, Image};

#[serde_as]
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CurrentPlayback {
    #[serde(default)]
    pub device: Option<Device>,

    #[serde(default)]
    pub is_playing: bool,

    #[serde(rename = "progress_ms")]
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub progress: Option<Duration>,

    /// `null` while nothing is loaded, or for private sessions.
    #[serde(default)]
    pub item: Option<PlayingItem>,

    #[serde(default)]
    pub shuffle_state: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: String,

    /// `null` for devices without volume control.
    #[serde(default)]
    pub volume_percent: Option<u8>,
}

/// The track or podcast episode being played.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PlayingItem {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: String,

    #[serde(default, rename = "duration_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub duration: Duration,

    /// Tracks only.
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub artists: Vec<Artist>,

    /// Tracks only.
    #[serde(default)]
    pub album: Option<Album>,

    /// Episodes only.
    #[serde(default)]
    pub show: Option<Show>,

    /// Episodes only.
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub images: Vec<Image>,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Show {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub publisher: String,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub images: Vec<Image>,
}

impl PlayingItem {
    /// Credited artists, or the show for episodes.
    #[must_use]
    pub fn artist(&self) -> String {
        if self.artists.is_empty() {
            return self
                .show
                .as_ref()
                .map(|show| show.name.clone())
                .unwrap_or_default();
        }

        self.artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Album name, or the show's publisher for episodes.
    #[must_use]
    pub fn album_name(&self) -> String {
        match (&self.album, &self.show) {
            (Some(album), _) => album.name.clone(),
            (None, Some(show)) => show.publisher.clone(),
            (None, None) => String::new(),
        }
    }

    /// Largest artwork: the Web API lists images widest first.
    #[must_use]
    pub fn artwork(&self) -> String {
        self.album
            .as_ref()
            .map_or(self.images.as_slice(), |album| album.images.as_slice())
            .first()
            .map(|image| image.url.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_track_playback() {
        let body = r#"{
            "device": {"id": "d1", "name": "Living Room", "volume_percent": 42},
            "is_playing": true,
            "progress_ms": 61000,
            "shuffle_state": false,
            "item": {
                "id": "t1", "name": "So What", "duration_ms": 562000,
                "artists": [{"name": "Miles Davis"}, {"name": "John Coltrane"}],
                "album": {"name": "Kind of Blue", "images": [
                    {"url": "https://i.scdn.co/image/640", "width": 640, "height": 640},
                    {"url": "https://i.scdn.co/image/300", "width": 300, "height": 300}
                ]}
            }
        }"#;
        let playback: CurrentPlayback = serde_json::from_str(body).unwrap();
        let item = playback.item.unwrap();

        assert_eq!(playback.progress, Some(Duration::from_secs(61)));
        assert_eq!(playback.device.unwrap().volume_percent, Some(42));
        assert_eq!(item.artist(), "Miles Davis, John Coltrane");
        assert_eq!(item.album_name(), "Kind of Blue");
        assert_eq!(item.artwork(), "https://i.scdn.co/image/640");
    }

    #[test]
    fn parses_episode_playback() {
        let body = r#"{
            "device": {"name": "Kitchen", "volume_percent": null},
            "is_playing": false,
            "progress_ms": null,
            "item": {
                "name": "Episode 12", "duration_ms": 1800000,
                "show": {"name": "The Show", "publisher": "Publisher", "images": []},
                "images": [{"url": "https://i.scdn.co/image/episode"}]
            }
        }"#;
        let playback: CurrentPlayback = serde_json::from_str(body).unwrap();
        let item = playback.item.unwrap();

        assert_eq!(playback.progress, None);
        assert_eq!(item.artist(), "The Show");
        assert_eq!(item.album_name(), "Publisher");
        assert_eq!(item.artwork(), "https://i.scdn.co/image/episode");
    }
}
