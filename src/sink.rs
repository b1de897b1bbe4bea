//! Where playback state and lists go: the host's media-player entity.
//!
//! The integration pushes everything it learns through a [`StateSink`]. Host
//! adapters implement it on top of their own entity model; [`LogSink`] is the
//! implementation the standalone binary uses.

use std::time::Duration;

use crate::{
    events::Event,
    state::{BrowseList, SearchResults, Snapshot},
};

/// Receiver of playback state, progress and lists for a media-player entity.
///
/// All methods are called from the integration task, in order.
pub trait StateSink: Send {
    /// Replaces every attribute of the entity with the snapshot.
    fn update_snapshot(&mut self, entity_id: &str, snapshot: &Snapshot);

    /// Updates only the interpolated playback position.
    fn update_position(&mut self, entity_id: &str, position: Duration);

    fn set_search_results(&mut self, entity_id: &str, results: SearchResults);

    fn set_browse_list(&mut self, entity_id: &str, list: BrowseList);

    /// Connection and playback events. Ignored unless overridden.
    fn notify(&mut self, entity_id: &str, event: Event) {
        let _ = (entity_id, event);
    }
}

/// Sink that logs what it receives.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl StateSink for LogSink {
    fn update_snapshot(&mut self, entity_id: &str, snapshot: &Snapshot) {
        if snapshot.title.is_empty() {
            debug!("{entity_id}: {}", snapshot.state);
            return;
        }

        debug!(
            "{entity_id}: {} {} - {} on {} ({}%) {}s/{}s",
            snapshot.state,
            snapshot.artist,
            snapshot.title,
            snapshot.source,
            snapshot.volume,
            snapshot.position.as_secs(),
            snapshot.duration.as_secs(),
        );
    }

    fn update_position(&mut self, entity_id: &str, position: Duration) {
        trace!("{entity_id}: position {}s", position.as_secs());
    }

    fn set_search_results(&mut self, entity_id: &str, results: SearchResults) {
        info!(
            "{entity_id}: {} results ({} albums, {} tracks, {} artists, {} playlists)",
            results.len(),
            results.albums.len(),
            results.tracks.len(),
            results.artists.len(),
            results.playlists.len(),
        );

        for item in results
            .albums
            .iter()
            .chain(&results.tracks)
            .chain(&results.artists)
            .chain(&results.playlists)
        {
            info!("  {} {}: {} {}", item.kind, item.id, item.title, item.subtitle);
        }
    }

    fn set_browse_list(&mut self, entity_id: &str, list: BrowseList) {
        if list.title.is_empty() {
            info!("{entity_id}: {} {}s", list.items.len(), list.kind);
        } else {
            info!("{entity_id}: {} {}: {}", list.kind, list.id, list.title);
        }

        for item in &list.items {
            info!("  {} {}: {} {}", item.kind, item.id, item.title, item.subtitle);
        }
    }

    fn notify(&mut self, entity_id: &str, event: Event) {
        match event {
            Event::Play | Event::Pause | Event::TrackChanged => debug!("{entity_id}: {event:?}"),
            Event::Connected | Event::Disconnected | Event::Standby => {
                info!("{entity_id}: {event:?}");
            }
        }
    }
}
