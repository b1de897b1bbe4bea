//! The integration actor.
//!
//! One [`Integration`] drives one media-player entity. It runs as a single
//! task that owns the token manager, the timers, the poller and the sink, and
//! handles, one at a time:
//!
//! * host calls arriving through a cloneable [`Handle`]
//! * completions of outbound calls, which run as spawned tasks
//! * the token refresh deadline
//! * poll and progress ticks
//!
//! Nothing is shared between tasks except the [`Api`] and channels, so none
//! of the state needs locking.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected --connect--> Connected --disconnect--> Disconnected
//!                           Connected --enter_standby--> Standby
//!                           Standby --leave_standby--> Connected
//! ```
//!
//! Connecting refreshes the access token right away and starts polling; the
//! first poll goes out as soon as that token is in. Disconnecting and standby
//! stop every timer but keep the credentials.
//!
//! Each connect starts a new generation. Replies are tagged with the
//! generation they were requested in, and replies from an earlier
//! generation, or arriving while not connected, are dropped. Token replies
//! are the exception: a fresh token is always kept, it just does not arm
//! the next refresh while disconnected.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use spotbridge::{
//!     api::WebApi, config::Config, dispatcher::MEDIA_PLAYER, integration::Integration,
//!     secrets::SecretsFile, sink::LogSink,
//! };
//!
//! # async fn example() -> spotbridge::error::Result<()> {
//! let store = SecretsFile::new("secrets.toml");
//! let config = Config::new(store.load()?.into(), "media_player.spotify")?;
//! let api = Arc::new(WebApi::new(&config)?);
//!
//! let (integration, handle) = Integration::new(&config, api, Box::new(LogSink), Box::new(store));
//! let task = tokio::spawn(integration.run());
//!
//! handle.connect()?;
//! handle.send_command(MEDIA_PLAYER, "media_player.spotify", "VOLUME_SET", "42")?;
//! handle.shutdown()?;
//! task.await.ok();
//! # Ok(())
//! # }
//! ```

use std::{fmt, mem, sync::Arc, time::Duration};

use tokio::sync::{mpsc, oneshot};

use crate::{
    api::{Api, Endpoint, Reply},
    config::Config,
    dispatcher::{
        Call, Command, CommandKind, Continuation, Dispatcher, Outcome, Param, MEDIA_PLAYER,
    },
    error::{Error, Result},
    events::Event,
    poller::{Poller, PollerState, Tick},
    protocol::auth::TokenResponse,
    scheduler::Deadline,
    secrets::CredentialStore,
    sink::StateSink,
    state::Snapshot,
    token::{Refreshed, TokenManager},
};

/// Connection state as set by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Connection {
    #[default]
    Disconnected,
    Connected,
    Standby,
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
            Self::Standby => write!(f, "standby"),
        }
    }
}

/// Point-in-time view of the actor's timers and connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    pub connection: Connection,
    pub poller: PollerState,
    /// Whether the local progress ticker runs.
    pub progressing: bool,
    /// Time left until the armed refresh deadline.
    pub refresh_in: Option<Duration>,
    /// Whether a token refresh is in flight.
    pub refreshing: bool,
    /// Whether an access token is available.
    pub authenticated: bool,
    /// Number of connects so far.
    pub generation: u64,
}

#[derive(Debug)]
enum HostCall {
    Connect,
    Disconnect,
    EnterStandby,
    LeaveStandby,
    Command {
        target_type: String,
        entity_id: String,
        command: Command,
    },
    Status(oneshot::Sender<Status>),
    Shutdown,
}

/// Reply of a Web API call, routed back to the actor.
struct Completion {
    generation: u64,
    endpoint: Endpoint,
    continuation: Continuation,
    result: Result<Reply>,
}

enum Message {
    Token(Result<TokenResponse>),
    Reply(Completion),
}

/// Host side of an integration. Cheap to clone.
///
/// Calls are queued to the actor and return once queued. They fail with
/// [`ErrorKind::Cancelled`](crate::error::ErrorKind::Cancelled) after the
/// actor has shut down.
#[derive(Clone, Debug)]
pub struct Handle {
    tx: mpsc::UnboundedSender<HostCall>,
    entity_id: Arc<str>,
}

impl Handle {
    fn send(&self, call: HostCall) -> Result<()> {
        self.tx
            .send(call)
            .map_err(|_| Error::cancelled("integration has shut down"))
    }

    /// Refreshes the access token and starts polling.
    pub fn connect(&self) -> Result<()> {
        self.send(HostCall::Connect)
    }

    /// Stops polling and the refresh timer.
    pub fn disconnect(&self) -> Result<()> {
        self.send(HostCall::Disconnect)
    }

    pub fn enter_standby(&self) -> Result<()> {
        self.send(HostCall::EnterStandby)
    }

    /// Same as [`Handle::connect`].
    pub fn leave_standby(&self) -> Result<()> {
        self.send(HostCall::LeaveStandby)
    }

    /// Parses a host command and queues it.
    ///
    /// # Errors
    ///
    /// Fails right away for unknown commands and invalid parameters
    /// addressed to this entity. Anything addressed elsewhere is ignored
    /// without being parsed.
    pub fn send_command(
        &self,
        target_type: &str,
        entity_id: &str,
        command: &str,
        param: impl Into<Param>,
    ) -> Result<()> {
        if target_type != MEDIA_PLAYER || *entity_id != *self.entity_id {
            trace!("ignoring {command} for {target_type} {entity_id}");
            return Ok(());
        }

        let command = Command::parse(command.parse::<CommandKind>()?, param.into())?;
        self.command(target_type, entity_id, command)
    }

    /// Queues an already validated command.
    pub fn command(&self, target_type: &str, entity_id: &str, command: Command) -> Result<()> {
        self.send(HostCall::Command {
            target_type: target_type.to_owned(),
            entity_id: entity_id.to_owned(),
            command,
        })
    }

    pub async fn status(&self) -> Result<Status> {
        let (tx, rx) = oneshot::channel();
        self.send(HostCall::Status(tx))?;
        rx.await
            .map_err(|_| Error::cancelled("integration has shut down"))
    }

    /// Stops the actor. Outstanding calls are abandoned.
    pub fn shutdown(&self) -> Result<()> {
        self.send(HostCall::Shutdown)
    }
}

pub struct Integration {
    api: Arc<dyn Api>,
    sink: Box<dyn StateSink>,
    store: Box<dyn CredentialStore>,

    tokens: TokenManager,
    dispatcher: Dispatcher,
    poller: Poller,
    refresh: Deadline,

    connection: Connection,
    generation: u64,

    /// Poll as soon as the next access token arrives.
    poll_pending: bool,

    last_snapshot: Snapshot,

    host_rx: mpsc::UnboundedReceiver<HostCall>,
    messages_tx: mpsc::UnboundedSender<Message>,
    messages_rx: mpsc::UnboundedReceiver<Message>,
}

impl Integration {
    /// Creates a disconnected integration and the handle to drive it.
    ///
    /// Nothing happens until [`Integration::run`] is polled and the host
    /// connects.
    #[must_use]
    pub fn new(
        config: &Config,
        api: Arc<dyn Api>,
        sink: Box<dyn StateSink>,
        store: Box<dyn CredentialStore>,
    ) -> (Self, Handle) {
        let (host_tx, host_rx) = mpsc::unbounded_channel();
        let (messages_tx, messages_rx) = mpsc::unbounded_channel();

        let poll_interval = if config.poll_interval.is_zero() {
            warn!(
                "poll interval is zero; using {}s",
                Poller::DEFAULT_INTERVAL.as_secs()
            );
            Poller::DEFAULT_INTERVAL
        } else {
            config.poll_interval
        };

        let integration = Self {
            api,
            sink,
            store,

            tokens: TokenManager::new(config.credentials.clone()),
            dispatcher: Dispatcher::new(config.entity_id.clone()),
            poller: Poller::new(poll_interval),
            refresh: Deadline::new(),

            connection: Connection::Disconnected,
            generation: 0,
            poll_pending: false,

            last_snapshot: Snapshot::off(),

            host_rx,
            messages_tx,
            messages_rx,
        };

        (
            integration,
            Handle {
                tx: host_tx,
                entity_id: config.entity_id.as_str().into(),
            },
        )
    }

    /// Creates an integration and spawns it on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    #[must_use]
    pub fn spawn(
        config: &Config,
        api: Arc<dyn Api>,
        sink: Box<dyn StateSink>,
        store: Box<dyn CredentialStore>,
    ) -> (Handle, tokio::task::JoinHandle<()>) {
        let (integration, handle) = Self::new(config, api, sink, store);
        (handle, tokio::spawn(integration.run()))
    }

    #[must_use]
    fn entity_id(&self) -> &str {
        self.dispatcher.entity_id()
    }

    #[must_use]
    fn is_connected(&self) -> bool {
        self.connection == Connection::Connected
    }

    /// Runs the actor until shut down or every [`Handle`] is dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                call = self.host_rx.recv() => match call {
                    Some(HostCall::Shutdown) | None => break,
                    Some(call) => self.handle(call),
                },

                Some(message) = self.messages_rx.recv() => match message {
                    Message::Token(result) => self.on_token(result),
                    Message::Reply(completion) => self.on_completion(completion),
                },

                () = self.refresh.fired() => {
                    debug!("access token about to expire");
                    self.start_refresh();
                }

                tick = self.poller.next() => self.on_tick(tick),
            }
        }

        self.stop();
        if self.connection != Connection::Disconnected {
            self.connection = Connection::Disconnected;
            self.notify(Event::Disconnected);
        }
        debug!("{}: shut down", self.entity_id());
    }

    fn handle(&mut self, call: HostCall) {
        match call {
            HostCall::Connect | HostCall::LeaveStandby => self.connect(),
            HostCall::Disconnect => self.disconnect(),
            HostCall::EnterStandby => self.enter_standby(),
            HostCall::Command {
                target_type,
                entity_id,
                command,
            } => self.command(&target_type, &entity_id, &command),
            HostCall::Status(tx) => {
                // The caller may have stopped waiting.
                let _ = tx.send(self.status());
            }
            HostCall::Shutdown => {}
        }
    }

    fn connect(&mut self) {
        if self.is_connected() {
            debug!("{}: already connected", self.entity_id());
            return;
        }

        self.generation = self.generation.wrapping_add(1);
        self.connection = Connection::Connected;
        info!("{}: connecting", self.entity_id());
        self.notify(Event::Connected);

        self.poller.start();
        self.poll_pending = true;
        self.start_refresh();
    }

    fn disconnect(&mut self) {
        self.stop();
        if self.connection != Connection::Disconnected {
            self.connection = Connection::Disconnected;
            info!("{}: disconnected", self.entity_id());
            self.notify(Event::Disconnected);
        }
    }

    fn enter_standby(&mut self) {
        self.stop();
        if self.connection != Connection::Standby {
            self.connection = Connection::Standby;
            info!("{}: entering standby", self.entity_id());
            self.notify(Event::Standby);
        }
    }

    /// Stops every timer. Credentials and the access token are kept.
    fn stop(&mut self) {
        self.poller.stop();
        self.refresh.cancel();
        self.poll_pending = false;
        self.last_snapshot = Snapshot::off();
    }

    fn command(&mut self, target_type: &str, entity_id: &str, command: &Command) {
        let Some(call) = self.dispatcher.dispatch(target_type, entity_id, command) else {
            debug!("ignoring command for {target_type} {entity_id}");
            return;
        };

        if !self.is_connected() {
            warn!(
                "{}: not connected; dropping {command:?}",
                self.entity_id()
            );
            return;
        }

        debug!("{}: {command:?}", self.entity_id());
        self.issue(call);
    }

    fn start_refresh(&mut self) {
        let Some(credentials) = self.tokens.begin_refresh() else {
            debug!("token refresh already in flight");
            return;
        };

        debug!("refreshing access token");
        let api = Arc::clone(&self.api);
        let tx = self.messages_tx.clone();
        tokio::spawn(async move {
            let result = api.refresh(&credentials).await;
            let _ = tx.send(Message::Token(result));
        });
    }

    fn on_token(&mut self, result: Result<TokenResponse>) {
        let Refreshed { delay, rotated } = match self.tokens.finish_refresh(result) {
            Ok(refreshed) => refreshed,
            Err(e) => {
                error!("failed to refresh access token: {e}");
                return;
            }
        };

        if let Some(refresh_token) = rotated {
            if let Err(e) = self.store.store_refresh_token(&refresh_token) {
                error!("failed to store refresh token: {e}");
            }
        }

        if !self.is_connected() {
            debug!("not connected; not scheduling the next token refresh");
            return;
        }

        self.refresh.arm(delay);
        if mem::take(&mut self.poll_pending) {
            self.poll();
        }
    }

    fn on_tick(&mut self, tick: Tick) {
        match tick {
            Tick::Poll => self.poll(),
            Tick::Progress => {
                let position = self.poller.advance();
                let entity_id = self.dispatcher.entity_id();
                self.sink.update_position(entity_id, position);
            }
        }
    }

    fn poll(&mut self) {
        self.issue(Dispatcher::poll());
    }

    /// Sends a call with the current access token.
    fn issue(&mut self, call: Call) {
        let Some(access_token) = self.tokens.bearer().map(ToOwned::to_owned) else {
            warn!("{}: no access token; skipping", call.request);
            return;
        };

        trace!("{}", call.request);
        let generation = self.generation;
        let api = Arc::clone(&self.api);
        let tx = self.messages_tx.clone();
        tokio::spawn(async move {
            let Call {
                request,
                continuation,
            } = call;
            let result = api.call(&request, &access_token).await;
            let _ = tx.send(Message::Reply(Completion {
                generation,
                endpoint: request.endpoint,
                continuation,
                result,
            }));
        });
    }

    fn on_completion(&mut self, completion: Completion) {
        let Completion {
            generation,
            endpoint,
            continuation,
            result,
        } = completion;

        if generation != self.generation || !self.is_connected() {
            trace!("{endpoint}: discarding stale reply");
            return;
        }

        match result.and_then(|reply| continuation.complete(&reply.body)) {
            Ok(outcome) => self.apply(outcome),
            Err(e) if e.is_unauthenticated() => {
                warn!("{endpoint}: {e}");
                self.start_refresh();
            }
            Err(e) => warn!("{endpoint}: {e}"),
        }
    }

    fn apply(&mut self, outcome: Outcome) {
        let entity_id = self.dispatcher.entity_id();
        match outcome {
            Outcome::Snapshot(snapshot) => {
                self.poller.apply(&snapshot);
                let events = Event::between(&self.last_snapshot, &snapshot);
                self.sink.update_snapshot(entity_id, &snapshot);
                for event in events {
                    self.sink.notify(entity_id, event);
                }
                self.last_snapshot = snapshot;
            }
            Outcome::Search(results) => self.sink.set_search_results(entity_id, results),
            Outcome::Browse(list) => self.sink.set_browse_list(entity_id, list),
            Outcome::Follow(call) => self.issue(call),
            Outcome::Done => {}
        }
    }

    fn notify(&mut self, event: Event) {
        self.sink.notify(self.dispatcher.entity_id(), event);
    }

    fn status(&self) -> Status {
        Status {
            connection: self.connection,
            poller: self.poller.state(),
            progressing: self.poller.is_progressing(),
            refresh_in: self.refresh.remaining(),
            refreshing: self.tokens.is_refreshing(),
            authenticated: self.tokens.bearer().is_some(),
            generation: self.generation,
        }
    }
}
