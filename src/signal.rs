//! System signal handling for the standalone binary.
//!
//! * Unix: Ctrl-C (SIGINT) and SIGTERM shut down, SIGHUP toggles standby
//! * Windows: Ctrl-C only
//!
//! # Example
//!
//! ```no_run
//! use spotbridge::signal::{Handler, Signal};
//!
//! async fn example() {
//!     let mut signals = Handler::new().unwrap();
//!
//!     match signals.recv().await {
//!         Signal::Interrupt | Signal::Terminate => println!("Shutting down..."),
//!         Signal::Hangup => println!("Toggling standby..."),
//!     }
//! }
//! ```

use std::fmt;

use crate::error::Result;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal as UnixSignal, SignalKind};

/// Signal received from the operating system.
///
/// The binary stops the integration and exits on [`Signal::Interrupt`] and
/// [`Signal::Terminate`]. Each [`Signal::Hangup`] flips standby: the first
/// one stops polling and the refresh timer, the next one reconnects.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Signal {
    /// Ctrl-C (SIGINT)
    Interrupt,
    /// SIGTERM
    Terminate,
    /// SIGHUP, toggles standby
    Hangup,
}

impl Signal {
    /// Whether the process should exit on this signal.
    #[must_use]
    pub fn is_shutdown(self) -> bool {
        matches!(self, Self::Interrupt | Self::Terminate)
    }
}

/// Waits for system signals.
pub struct Handler {
    #[cfg(unix)]
    sigterm: UnixSignal,
    #[cfg(unix)]
    sighup: UnixSignal,
}

impl Handler {
    /// Registers the signal handlers.
    ///
    /// # Errors
    ///
    /// Returns error if signal handlers cannot be registered.
    pub fn new() -> Result<Self> {
        #[cfg(unix)]
        {
            Ok(Self {
                sigterm: signal(SignalKind::terminate())?,
                sighup: signal(SignalKind::hangup())?,
            })
        }

        #[cfg(not(unix))]
        Ok(Self {})
    }

    /// Waits for the next signal.
    pub async fn recv(&mut self) -> Signal {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => Signal::Interrupt,
                _ = self.sigterm.recv() => Signal::Terminate,
                _ = self.sighup.recv() => Signal::Hangup,
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            Signal::Interrupt
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Interrupt => write!(f, "Ctrl+C"),
            Signal::Terminate => write!(f, "SIGTERM"),
            Signal::Hangup => write!(f, "SIGHUP"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_hangup_keeps_running() {
        assert!(Signal::Interrupt.is_shutdown());
        assert!(Signal::Terminate.is_shutdown());
        assert!(!Signal::Hangup.is_shutdown());
        assert_eq!(Signal::Hangup.to_string(), "SIGHUP");
    }
}
