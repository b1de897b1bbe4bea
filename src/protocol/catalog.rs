//! Catalog objects: tracks, albums, artists, playlists and search results.
//!
//! Only the fields the bridge maps into list items are modelled. The same
//! types serve full objects (`GET /v1/albums/{id}`) and the simplified ones
//! nested in other responses, so everything but `name` defaults.

use std::time::Duration;

use serde::Deserialize;
use serde_with::{serde_as, DefaultOnNull, DurationMilliSeconds, VecSkipError};

/// One rendition of an artwork.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Image {
    pub url: String,

    #[serde(default)]
    pub width: Option<u32>,

    #[serde(default)]
    pub height: Option<u32>,
}

/// Artwork rendition to prefer when picking from a list of images.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageSize {
    /// 300 pixels wide, for album and playlist artwork.
    Primary,
    /// 64 pixels wide, for track and artist thumbnails.
    Thumbnail,
}

impl ImageSize {
    #[must_use]
    pub const fn width(self) -> u32 {
        match self {
            Self::Primary => 300,
            Self::Thumbnail => 64,
        }
    }
}

/// Picks the URL of the rendition that is exactly `size` wide.
///
/// Falls back to the first image, or an empty string without images.
#[must_use]
pub fn select_image(images: &[Image], size: ImageSize) -> String {
    images
        .iter()
        .find(|image| image.width == Some(size.width()))
        .or_else(|| images.first())
        .map(|image| image.url.clone())
        .unwrap_or_default()
}

/// Page of results.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Paging<T> {
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull<VecSkipError<_>>")]
    pub items: Vec<T>,

    #[serde(default)]
    pub total: u64,
}

impl<T> Default for Paging<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

/// Any catalog object, reduced to what is needed to play it.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub id: String,

    pub uri: String,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Artist {
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub uri: String,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub images: Vec<Image>,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Album {
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub uri: String,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub artists: Vec<Artist>,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub images: Vec<Image>,

    /// Only present on full album objects.
    #[serde(default)]
    pub tracks: Paging<Track>,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub uri: String,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub artists: Vec<Artist>,

    /// Absent on tracks nested in an album.
    #[serde(default)]
    pub album: Option<Box<Album>>,

    #[serde(default, rename = "duration_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub duration: Duration,
}

impl Track {
    /// Name of the first credited artist.
    #[must_use]
    pub fn first_artist(&self) -> &str {
        self.artists.first().map_or("", |artist| artist.name.as_str())
    }
}

impl Album {
    /// Name of the first credited artist.
    #[must_use]
    pub fn first_artist(&self) -> &str {
        self.artists.first().map_or("", |artist| artist.name.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub display_name: Option<String>,
}

/// Entry of a playlist. `track` is `null` for removed or local items.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PlaylistItem {
    #[serde(default)]
    pub track: Option<Track>,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Playlist {
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub uri: String,

    #[serde(default)]
    pub owner: Owner,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub images: Vec<Image>,

    /// Only carries items on full playlist objects.
    #[serde(default)]
    pub tracks: Paging<PlaylistItem>,
}

impl Playlist {
    #[must_use]
    pub fn owner_name(&self) -> &str {
        self.owner.display_name.as_deref().unwrap_or_default()
    }
}

/// Response of `GET /v1/search`. Categories not searched for are absent.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub albums: Paging<Album>,

    #[serde(default)]
    pub tracks: Paging<Track>,

    #[serde(default)]
    pub artists: Paging<Artist>,

    #[serde(default)]
    pub playlists: Paging<Playlist>,
}
