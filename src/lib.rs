//! Bridge between the Spotify Web API and a host's media-player entity.
//!
//! The crate keeps a bearer token fresh, mirrors the remote playback state
//! into a [`sink::StateSink`] by polling, and turns host commands into
//! authenticated Web API calls. Everything runs on one actor per
//! integration instance, see [`integration`].
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod api;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod http;
pub mod integration;
pub mod poller;
pub mod protocol;
pub mod scheduler;
pub mod secrets;
pub mod signal;
pub mod sink;
pub mod state;
pub mod token;
