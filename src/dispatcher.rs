//! Host commands and their translation into Web API calls.
//!
//! A command becomes a [`Call`]: the request to send and the
//! [`Continuation`] that knows what to do with its reply. The continuation
//! travels with the request and comes back with the completion, so there is
//! no shared "last request" state to correlate replies against.
//!
//! Playing an item takes two calls. The first looks the item up to learn its
//! URI; its continuation carries the item kind and, when completed, yields
//! the play call as a follow-up.
//!
//! | Command        | Call                                                  |
//! |----------------|-------------------------------------------------------|
//! | `PLAY`         | `PUT /v1/me/player/play`                              |
//! | `PLAY_ITEM`    | `GET /v1/{kind}s/{id}`, then `PUT /v1/me/player/play` |
//! | `PAUSE`        | `PUT /v1/me/player/pause`                             |
//! | `NEXT`         | `POST /v1/me/player/next`                             |
//! | `PREVIOUS`     | `POST /v1/me/player/previous`                         |
//! | `VOLUME_SET`   | `PUT /v1/me/player/volume?volume_percent=N`           |
//! | `SEEK`         | `PUT /v1/me/player/seek?position_ms=N`                |
//! | `SEARCH`       | `GET /v1/search?q=...`                                |
//! | `GET_ALBUM`    | `GET /v1/albums/{id}`                                 |
//! | `GET_PLAYLIST` | `GET /v1/playlists/{id}` or `GET /v1/me/playlists`    |

use std::{fmt, str::FromStr, time::Duration};

use serde_json::json;

use crate::{
    api::{Endpoint, Request},
    error::{Error, Result},
    protocol::{
        self,
        catalog::{Album, Paging, Playlist, Resource, SearchResponse},
    },
    state::{BrowseList, ItemKind, SearchResults, Snapshot},
};

/// Target type of the entities this crate drives.
pub const MEDIA_PLAYER: &str = "media_player";

/// Commands as named by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Play,
    PlayItem,
    Pause,
    Next,
    Previous,
    VolumeSet,
    Seek,
    Search,
    GetAlbum,
    GetPlaylist,
}

impl CommandKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Play => "PLAY",
            Self::PlayItem => "PLAY_ITEM",
            Self::Pause => "PAUSE",
            Self::Next => "NEXT",
            Self::Previous => "PREVIOUS",
            Self::VolumeSet => "VOLUME_SET",
            Self::Seek => "SEEK",
            Self::Search => "SEARCH",
            Self::GetAlbum => "GET_ALBUM",
            Self::GetPlaylist => "GET_PLAYLIST",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "PLAY" => Ok(Self::Play),
            "PLAY_ITEM" => Ok(Self::PlayItem),
            "PAUSE" => Ok(Self::Pause),
            "NEXT" => Ok(Self::Next),
            "PREVIOUS" => Ok(Self::Previous),
            "VOLUME_SET" => Ok(Self::VolumeSet),
            "SEEK" => Ok(Self::Seek),
            "SEARCH" => Ok(Self::Search),
            "GET_ALBUM" => Ok(Self::GetAlbum),
            "GET_PLAYLIST" => Ok(Self::GetPlaylist),
            other => Err(Error::invalid_argument(format!("unknown command: {other}"))),
        }
    }
}

/// Parameter accompanying a host command.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Param {
    #[default]
    None,
    Text(String),
    Item { kind: ItemKind, id: String },
}

impl From<&str> for Param {
    fn from(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            Self::None
        } else {
            Self::Text(text.to_owned())
        }
    }
}

impl From<String> for Param {
    fn from(text: String) -> Self {
        Self::from(text.as_str())
    }
}

/// Which playlist to browse.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PlaylistRef {
    /// The playlists of the current user.
    User,
    Id(String),
}

/// A validated host command.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Play,
    PlayItem { kind: ItemKind, id: String },
    Pause,
    Next,
    Previous,
    /// Volume in percent, `0..=100`.
    VolumeSet(u8),
    Seek(Duration),
    Search(String),
    GetAlbum(String),
    GetPlaylist(PlaylistRef),
}

impl Command {
    /// Validates a command and its parameter.
    ///
    /// `PLAY_ITEM` takes an item parameter, or text in the form `kind:id`
    /// or `spotify:kind:id`. Without a parameter it resumes playback.
    /// `VOLUME_SET` takes percent and `SEEK` whole seconds.
    pub fn parse(kind: CommandKind, param: Param) -> Result<Self> {
        match kind {
            CommandKind::Play => Ok(Self::Play),
            CommandKind::PlayItem => match param {
                Param::None => Ok(Self::Play),
                Param::Item { kind, id } => Ok(Self::PlayItem {
                    kind,
                    id: validate_id(&id)?,
                }),
                Param::Text(text) => {
                    let (kind, id) = parse_item(&text)?;
                    Ok(Self::PlayItem { kind, id })
                }
            },
            CommandKind::Pause => Ok(Self::Pause),
            CommandKind::Next => Ok(Self::Next),
            CommandKind::Previous => Ok(Self::Previous),
            CommandKind::VolumeSet => {
                let percent: u32 = text(kind, param)?.parse()?;
                u8::try_from(percent)
                    .ok()
                    .filter(|percent| *percent <= 100)
                    .map(Self::VolumeSet)
                    .ok_or_else(|| {
                        Error::out_of_range(format!("volume {percent} not between 0 and 100"))
                    })
            }
            CommandKind::Seek => {
                let seconds: u64 = text(kind, param)?.parse()?;
                Ok(Self::Seek(Duration::from_secs(seconds)))
            }
            CommandKind::Search => Ok(Self::Search(text(kind, param)?)),
            CommandKind::GetAlbum => Ok(Self::GetAlbum(validate_id(&text(kind, param)?)?)),
            CommandKind::GetPlaylist => {
                let id = text(kind, param)?;
                if id.eq_ignore_ascii_case("user") {
                    Ok(Self::GetPlaylist(PlaylistRef::User))
                } else {
                    Ok(Self::GetPlaylist(PlaylistRef::Id(validate_id(&id)?)))
                }
            }
        }
    }
}

fn text(kind: CommandKind, param: Param) -> Result<String> {
    match param {
        Param::Text(text) if !text.trim().is_empty() => Ok(text.trim().to_owned()),
        Param::Item { id, .. } => Ok(id),
        _ => Err(Error::invalid_argument(format!("{kind} needs a parameter"))),
    }
}

/// Catalog ids are base62, which keeps them safe to put in a path.
fn validate_id(id: &str) -> Result<String> {
    let id = id.trim();
    if id.is_empty() || !id.chars().all(|chr| chr.is_ascii_alphanumeric()) {
        return Err(Error::invalid_argument(format!("invalid id: {id:?}")));
    }

    Ok(id.to_owned())
}

fn parse_item(text: &str) -> Result<(ItemKind, String)> {
    let text = text.trim();
    let text = text.strip_prefix("spotify:").unwrap_or(text);
    let (kind, id) = text
        .split_once(':')
        .ok_or_else(|| Error::invalid_argument(format!("expected kind:id, got {text:?}")))?;

    Ok((kind.parse()?, validate_id(id)?))
}

/// What to do with the reply of a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Continuation {
    /// Map the playback state into a snapshot.
    Playback,
    /// Nothing to map; the next poll shows the effect.
    Transport,
    /// Play the looked up item.
    PlayItem(ItemKind),
    Search,
    Album,
    Playlist,
    UserPlaylists,
}

/// What a completed call produced.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Snapshot(Snapshot),
    Search(SearchResults),
    Browse(BrowseList),
    /// Another call to issue.
    Follow(Call),
    Done,
}

impl Continuation {
    /// Maps the body of a successful reply.
    pub fn complete(self, body: &str) -> Result<Outcome> {
        match self {
            Self::Playback => Snapshot::from_body(body).map(Outcome::Snapshot),
            Self::Transport => Ok(Outcome::Done),
            Self::PlayItem(kind) => {
                let resource: Resource = protocol::json(body, kind.as_str())?;
                if resource.uri.is_empty() {
                    return Err(Error::data_loss(format!("{kind} without uri")));
                }

                let body = match kind {
                    ItemKind::Track => json!({ "uris": [resource.uri] }),
                    ItemKind::Album | ItemKind::Artist | ItemKind::Playlist => {
                        json!({ "context_uri": resource.uri })
                    }
                };

                Ok(Outcome::Follow(Call {
                    request: Request::new(Endpoint::Play).with_body(body),
                    continuation: Self::Transport,
                }))
            }
            Self::Search => {
                let response: SearchResponse = protocol::json(body, "search")?;
                Ok(Outcome::Search(response.into()))
            }
            Self::Album => {
                let album: Album = protocol::json(body, "album")?;
                Ok(Outcome::Browse(album.into()))
            }
            Self::Playlist => {
                let playlist: Playlist = protocol::json(body, "playlist")?;
                Ok(Outcome::Browse(playlist.into()))
            }
            Self::UserPlaylists => {
                let playlists: Paging<Playlist> = protocol::json(body, "me/playlists")?;
                Ok(Outcome::Browse(playlists.into()))
            }
        }
    }
}

/// A request together with what to do with its reply.
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub request: Request,
    pub continuation: Continuation,
}

impl Call {
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        self.request.endpoint
    }
}

/// Turns commands for one media-player entity into calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dispatcher {
    entity_id: String,
}

impl Dispatcher {
    /// Maximum results per search category.
    pub const SEARCH_LIMIT: u32 = 20;

    const SEARCH_TYPES: &'static str = "album,artist,playlist,track";

    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
        }
    }

    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Whether a command addressed to `target_type`/`entity_id` is ours.
    #[must_use]
    pub fn accepts(&self, target_type: &str, entity_id: &str) -> bool {
        target_type == MEDIA_PLAYER && entity_id == self.entity_id
    }

    /// The call that reads the current playback state.
    #[must_use]
    pub fn poll() -> Call {
        Call {
            request: Request::new(Endpoint::CurrentPlayback),
            continuation: Continuation::Playback,
        }
    }

    /// Translates a command, or returns `None` if it is not addressed to
    /// this entity.
    #[must_use]
    pub fn dispatch(&self, target_type: &str, entity_id: &str, command: &Command) -> Option<Call> {
        if !self.accepts(target_type, entity_id) {
            return None;
        }

        Some(Self::call(command))
    }

    fn call(command: &Command) -> Call {
        let transport = |request| Call {
            request,
            continuation: Continuation::Transport,
        };

        match command {
            Command::Play => transport(Request::new(Endpoint::Play)),
            Command::Pause => transport(Request::new(Endpoint::Pause)),
            Command::Next => transport(Request::new(Endpoint::Next)),
            Command::Previous => transport(Request::new(Endpoint::Previous)),
            Command::VolumeSet(percent) => {
                transport(Request::new(Endpoint::Volume).with_query("volume_percent", percent))
            }
            Command::Seek(position) => transport(
                Request::new(Endpoint::Seek).with_query("position_ms", position.as_millis()),
            ),
            Command::PlayItem { kind, id } => {
                let endpoint = match kind {
                    ItemKind::Track => Endpoint::Track,
                    ItemKind::Album => Endpoint::Album,
                    ItemKind::Artist => Endpoint::Artist,
                    ItemKind::Playlist => Endpoint::Playlist,
                };
                Call {
                    request: Request::lookup(endpoint, id),
                    continuation: Continuation::PlayItem(*kind),
                }
            }
            Command::Search(query) => Call {
                request: Request::new(Endpoint::Search)
                    .with_query("q", query)
                    .with_query("type", Self::SEARCH_TYPES)
                    .with_query("limit", Self::SEARCH_LIMIT)
                    .with_query("offset", 0),
                continuation: Continuation::Search,
            },
            Command::GetAlbum(id) => Call {
                request: Request::lookup(Endpoint::Album, id),
                continuation: Continuation::Album,
            },
            Command::GetPlaylist(PlaylistRef::User) => Call {
                request: Request::new(Endpoint::UserPlaylists),
                continuation: Continuation::UserPlaylists,
            },
            Command::GetPlaylist(PlaylistRef::Id(id)) => Call {
                request: Request::lookup(Endpoint::Playlist, id),
                continuation: Continuation::Playlist,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const ENTITY: &str = "media_player.spotify";

    fn parse(kind: &str, param: &str) -> Result<Command> {
        Command::parse(kind.parse()?, Param::from(param))
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse("PLAY", "").unwrap(), Command::Play);
        assert_eq!(parse("VOLUME_SET", " 42 ").unwrap(), Command::VolumeSet(42));
        assert_eq!(
            parse("SEEK", "90").unwrap(),
            Command::Seek(Duration::from_secs(90))
        );
        assert_eq!(
            parse("GET_PLAYLIST", "user").unwrap(),
            Command::GetPlaylist(PlaylistRef::User)
        );
        assert_eq!(
            parse("PLAY_ITEM", "spotify:track:4uLU6hMCjMI75M1A2tKUQC").unwrap(),
            Command::PlayItem {
                kind: ItemKind::Track,
                id: "4uLU6hMCjMI75M1A2tKUQC".to_owned()
            }
        );
        assert_eq!(
            parse("PLAY_ITEM", "album:1weenld61qoidwYuZ1GESA").unwrap(),
            Command::PlayItem {
                kind: ItemKind::Album,
                id: "1weenld61qoidwYuZ1GESA".to_owned()
            }
        );
    }

    #[test]
    fn empty_play_item_resumes() {
        assert_eq!(parse("PLAY_ITEM", "").unwrap(), Command::Play);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert_eq!(
            parse("VOLUME_SET", "101").unwrap_err().kind,
            ErrorKind::OutOfRange
        );
        assert_eq!(
            parse("VOLUME_SET", "loud").unwrap_err().kind,
            ErrorKind::InvalidArgument
        );
        assert!(parse("VOLUME_SET", "").is_err());
        assert!(parse("SEARCH", "").is_err());
        assert!(parse("GET_ALBUM", "../me").is_err());
        assert!(parse("PLAY_ITEM", "episode:abc").is_err());
        assert!(parse("SHUFFLE", "").is_err());
    }

    #[test]
    fn ignores_foreign_entities() {
        let dispatcher = Dispatcher::new(ENTITY);

        assert!(dispatcher
            .dispatch(MEDIA_PLAYER, "media_player.other", &Command::Play)
            .is_none());
        assert!(dispatcher.dispatch("light", ENTITY, &Command::Play).is_none());
        assert!(dispatcher.dispatch(MEDIA_PLAYER, ENTITY, &Command::Play).is_some());
    }

    #[test]
    fn volume_is_a_query_without_body() {
        let call = Dispatcher::new(ENTITY)
            .dispatch(MEDIA_PLAYER, ENTITY, &Command::VolumeSet(42))
            .unwrap();

        assert_eq!(call.endpoint(), Endpoint::Volume);
        assert_eq!(call.request.query, [("volume_percent", "42".to_owned())]);
        assert_eq!(call.request.body, None);
        assert_eq!(call.continuation, Continuation::Transport);
    }

    #[test]
    fn seek_is_in_milliseconds() {
        let call = Dispatcher::new(ENTITY)
            .dispatch(MEDIA_PLAYER, ENTITY, &Command::Seek(Duration::from_secs(30)))
            .unwrap();

        assert_eq!(call.request.query, [("position_ms", "30000".to_owned())]);
    }

    #[test]
    fn search_asks_for_all_kinds() {
        let call = Dispatcher::new(ENTITY)
            .dispatch(MEDIA_PLAYER, ENTITY, &Command::Search("kind of blue".to_owned()))
            .unwrap();

        assert_eq!(
            call.request.to_string(),
            "GET /v1/search?q=kind of blue&type=album,artist,playlist,track&limit=20&offset=0"
        );
    }

    #[test]
    fn play_item_looks_up_then_plays() {
        let command = Command::PlayItem {
            kind: ItemKind::Track,
            id: "t1".to_owned(),
        };
        let call = Dispatcher::new(ENTITY)
            .dispatch(MEDIA_PLAYER, ENTITY, &command)
            .unwrap();
        assert_eq!(call.request.path, "v1/tracks/t1");

        let outcome = call
            .continuation
            .complete(r#"{"id": "t1", "uri": "spotify:track:t1", "name": "So What"}"#)
            .unwrap();
        let Outcome::Follow(play) = outcome else {
            panic!("expected a follow-up call, got {outcome:?}");
        };
        assert_eq!(play.endpoint(), Endpoint::Play);
        assert_eq!(play.request.body, Some(json!({"uris": ["spotify:track:t1"]})));
        assert_eq!(play.continuation, Continuation::Transport);
    }

    #[test]
    fn containers_play_as_context() {
        let outcome = Continuation::PlayItem(ItemKind::Playlist)
            .complete(r#"{"id": "p1", "uri": "spotify:playlist:p1"}"#)
            .unwrap();
        let Outcome::Follow(play) = outcome else {
            panic!("expected a follow-up call, got {outcome:?}");
        };
        assert_eq!(
            play.request.body,
            Some(json!({"context_uri": "spotify:playlist:p1"}))
        );
    }

    #[test]
    fn malformed_lookup_is_dropped() {
        assert!(Continuation::PlayItem(ItemKind::Album)
            .complete("{\"id\": ")
            .is_err());
    }

    #[test]
    fn user_playlists() {
        let call = Dispatcher::new(ENTITY)
            .dispatch(
                MEDIA_PLAYER,
                ENTITY,
                &Command::GetPlaylist(PlaylistRef::User),
            )
            .unwrap();
        assert_eq!(call.request.path, "v1/me/playlists");
        assert_eq!(call.continuation, Continuation::UserPlaylists);
    }
}
