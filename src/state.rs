//! What the host gets to see: playback snapshots and browsable lists.
//!
//! These types are the host-facing side of the [`protocol`](crate::protocol)
//! wire types. Conversions flatten the nested Web API objects into the flat
//! attributes and list items a media-player entity displays.

use std::{fmt, str::FromStr, time::Duration};

use crate::{
    error::Error,
    protocol::{
        catalog::{select_image, Album, Artist, ImageSize, Paging, Playlist, SearchResponse, Track},
        player::CurrentPlayback,
    },
};

/// Playback state of the media-player entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlayerState {
    /// No active session.
    #[default]
    Off,
    /// Session active, playback paused or stopped.
    Idle,
    Playing,
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Idle => write!(f, "idle"),
            Self::Playing => write!(f, "playing"),
        }
    }
}

/// Point-in-time read of the remote playback state.
///
/// The default value is the "off" snapshot: no session, all strings empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Snapshot {
    pub state: PlayerState,
    /// Name of the device playing.
    pub source: String,
    /// Volume in percent.
    pub volume: u8,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Album art URL.
    pub image: String,
    pub duration: Duration,
    pub position: Duration,
}

impl Snapshot {
    #[must_use]
    pub fn off() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state == PlayerState::Playing
    }

    /// Whether `other` shows a different item than `self`.
    #[must_use]
    pub fn is_other_item(&self, other: &Self) -> bool {
        self.title != other.title || self.artist != other.artist || self.album != other.album
    }

    /// Maps a `GET /v1/me/player` body, where an empty body means no session.
    pub fn from_body(body: &str) -> Result<Self, Error> {
        if body.trim().is_empty() {
            return Ok(Self::off());
        }

        let playback = crate::protocol::json::<CurrentPlayback>(body, "me/player")?;
        Ok(Self::from(playback))
    }
}

impl From<CurrentPlayback> for Snapshot {
    fn from(playback: CurrentPlayback) -> Self {
        let Some(item) = playback.item else {
            return Self::off();
        };

        let (source, volume) = playback
            .device
            .map(|device| (device.name, device.volume_percent.unwrap_or_default()))
            .unwrap_or_default();

        let state = if playback.is_playing {
            PlayerState::Playing
        } else {
            PlayerState::Idle
        };

        Self {
            state,
            source,
            volume: volume.min(100),
            title: item.name.clone(),
            artist: item.artist(),
            album: item.album_name(),
            image: item.artwork(),
            duration: item.duration,
            position: playback.progress.unwrap_or_default().min(item.duration),
        }
    }
}

/// Kind of catalog item a list entry refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Track,
    Album,
    Artist,
    Playlist,
}

impl ItemKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Album => "album",
            Self::Artist => "artist",
            Self::Playlist => "playlist",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "track" => Ok(Self::Track),
            "album" => Ok(Self::Album),
            "artist" => Ok(Self::Artist),
            "playlist" => Ok(Self::Playlist),
            other => Err(Error::invalid_argument(format!("unknown item type: {other}"))),
        }
    }
}

const ALBUM_COMMANDS: &[&str] = &["PLAY", "ARTISTRADIO"];
const TRACK_COMMANDS: &[&str] = &["PLAY", "SONGRADIO"];
const ARTIST_COMMANDS: &[&str] = &["ARTISTRADIO"];
const PLAYLIST_COMMANDS: &[&str] = &["PLAY", "PLAYLISTRADIO"];

/// Entry of a search result or browse list.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListItem {
    pub id: String,
    pub kind: ItemKind,
    pub title: String,
    pub subtitle: String,
    pub image: String,
    /// Commands the host may offer for this entry.
    pub commands: &'static [&'static str],
}

impl ListItem {
    fn album(album: &Album) -> Self {
        Self {
            id: album.id.clone(),
            kind: ItemKind::Album,
            title: album.name.clone(),
            subtitle: album.first_artist().to_owned(),
            image: select_image(&album.images, ImageSize::Primary),
            commands: ALBUM_COMMANDS,
        }
    }

    /// Track with its album name as subtitle, as listed in search results.
    fn track(track: &Track) -> Self {
        let (subtitle, image) = track.album.as_ref().map_or_else(Default::default, |album| {
            (
                album.name.clone(),
                select_image(&album.images, ImageSize::Thumbnail),
            )
        });

        Self {
            id: track.id.clone(),
            kind: ItemKind::Track,
            title: track.name.clone(),
            subtitle,
            image,
            commands: TRACK_COMMANDS,
        }
    }

    /// Track with its first artist as subtitle, as listed in albums and
    /// playlists.
    fn track_by_artist(track: &Track) -> Self {
        Self {
            id: track.id.clone(),
            kind: ItemKind::Track,
            title: track.name.clone(),
            subtitle: track.first_artist().to_owned(),
            image: String::new(),
            commands: TRACK_COMMANDS,
        }
    }

    fn artist(artist: &Artist) -> Self {
        Self {
            id: artist.id.clone(),
            kind: ItemKind::Artist,
            title: artist.name.clone(),
            subtitle: String::new(),
            image: select_image(&artist.images, ImageSize::Thumbnail),
            commands: ARTIST_COMMANDS,
        }
    }

    fn playlist(playlist: &Playlist) -> Self {
        Self {
            id: playlist.id.clone(),
            kind: ItemKind::Playlist,
            title: playlist.name.clone(),
            subtitle: playlist.owner_name().to_owned(),
            image: select_image(&playlist.images, ImageSize::Primary),
            commands: PLAYLIST_COMMANDS,
        }
    }
}

/// Search results, one list per item kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchResults {
    pub albums: Vec<ListItem>,
    pub tracks: Vec<ListItem>,
    pub artists: Vec<ListItem>,
    pub playlists: Vec<ListItem>,
}

impl SearchResults {
    #[must_use]
    pub fn len(&self) -> usize {
        self.albums.len() + self.tracks.len() + self.artists.len() + self.playlists.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<SearchResponse> for SearchResults {
    fn from(response: SearchResponse) -> Self {
        Self {
            albums: response.albums.items.iter().map(ListItem::album).collect(),
            tracks: response.tracks.items.iter().map(ListItem::track).collect(),
            artists: response.artists.items.iter().map(ListItem::artist).collect(),
            playlists: response
                .playlists
                .items
                .iter()
                .map(ListItem::playlist)
                .collect(),
        }
    }
}

/// A browsable container: its own header plus its children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrowseList {
    pub id: String,
    pub kind: ItemKind,
    pub title: String,
    pub subtitle: String,
    pub image: String,
    pub commands: &'static [&'static str],
    pub items: Vec<ListItem>,
}

impl From<Album> for BrowseList {
    fn from(album: Album) -> Self {
        Self {
            items: album
                .tracks
                .items
                .iter()
                .map(ListItem::track_by_artist)
                .collect(),
            subtitle: album.first_artist().to_owned(),
            image: select_image(&album.images, ImageSize::Primary),
            id: album.id,
            kind: ItemKind::Album,
            title: album.name,
            commands: TRACK_COMMANDS,
        }
    }
}

impl From<Playlist> for BrowseList {
    fn from(playlist: Playlist) -> Self {
        Self {
            items: playlist
                .tracks
                .items
                .iter()
                .filter_map(|item| item.track.as_ref())
                .map(ListItem::track_by_artist)
                .collect(),
            subtitle: playlist.owner_name().to_owned(),
            image: select_image(&playlist.images, ImageSize::Primary),
            id: playlist.id,
            kind: ItemKind::Playlist,
            title: playlist.name,
            commands: TRACK_COMMANDS,
        }
    }
}

impl From<Paging<Playlist>> for BrowseList {
    /// The user's own playlists, under an empty header.
    fn from(playlists: Paging<Playlist>) -> Self {
        Self {
            id: String::new(),
            kind: ItemKind::Playlist,
            title: String::new(),
            subtitle: String::new(),
            image: String::new(),
            commands: &[],
            items: playlists
                .items
                .iter()
                .map(|playlist| ListItem {
                    subtitle: String::new(),
                    ..ListItem::playlist(playlist)
                })
                .collect(),
        }
    }
}
