//! Events emitted by the integration.
//!
//! Connection events follow host calls. Playback events are derived by
//! comparing each new playback snapshot with the previous one.
//!
//! # Example
//!
//! ```rust
//! use spotbridge::events::Event;
//!
//! fn handle_event(event: Event) {
//!     match event {
//!         Event::Play => println!("Playback started"),
//!         Event::TrackChanged => println!("New track playing"),
//!         Event::Connected => println!("Connected to Spotify"),
//!         _ => {}
//!     }
//! }
//! ```

use crate::state::Snapshot;

/// Significant state changes of the bridged media player.
///
/// Playback Events:
/// * [`Play`](Self::Play) - Playback starts
/// * [`Pause`](Self::Pause) - Playback pauses or stops
/// * [`TrackChanged`](Self::TrackChanged) - Current item changes
///
/// Connection Events:
/// * [`Connected`](Self::Connected) - Host connected the integration
/// * [`Disconnected`](Self::Disconnected) - Host disconnected it
/// * [`Standby`](Self::Standby) - Host put it in standby
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// Remote playback has started.
    Play,

    /// Remote playback has paused, or the session has ended.
    Pause,

    /// The remote player moved to a different item.
    TrackChanged,

    Connected,

    Disconnected,

    Standby,
}

impl Event {
    /// Events implied by moving from `previous` to `current`.
    #[must_use]
    pub fn between(previous: &Snapshot, current: &Snapshot) -> Vec<Self> {
        let mut events = Vec::new();

        if previous.is_other_item(current) && !current.title.is_empty() {
            events.push(Self::TrackChanged);
        }

        match (previous.is_playing(), current.is_playing()) {
            (false, true) => events.push(Self::Play),
            (true, false) => events.push(Self::Pause),
            _ => {}
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PlayerState;

    fn playing(title: &str) -> Snapshot {
        Snapshot {
            state: PlayerState::Playing,
            title: title.to_owned(),
            artist: "Miles Davis".to_owned(),
            ..Snapshot::off()
        }
    }

    #[test]
    fn starting_playback() {
        assert_eq!(
            Event::between(&Snapshot::off(), &playing("So What")),
            [Event::TrackChanged, Event::Play]
        );
    }

    #[test]
    fn same_item_is_quiet() {
        assert!(Event::between(&playing("So What"), &playing("So What")).is_empty());
    }

    #[test]
    fn session_ending_pauses() {
        assert_eq!(
            Event::between(&playing("So What"), &Snapshot::off()),
            [Event::Pause]
        );
    }

    #[test]
    fn next_track() {
        assert_eq!(
            Event::between(&playing("So What"), &playing("Freddie Freeloader")),
            [Event::TrackChanged]
        );
    }
}
