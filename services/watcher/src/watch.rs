//! Watch loop: prerender, subscribe, dispatch, reconnect.
//!
//! ```text
//! Idle -> Prerendering -> Connecting -> Subscribed -> (Reconnecting -> Connecting)* -> Terminated
//! ```
//!
//! Only setup errors (bad URL or credentials, unresolvable host) end the
//! loop with an error. Disconnects are retried with backoff until shutdown.

use std::time::Duration;

use futures_util::StreamExt;
use rgen_rancher::{Credentials, Endpoint};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::reconnect::{ReconnectPolicy, ReconnectTracker};

type EventStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Unrecoverable subscription setup errors.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("invalid subscription url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("invalid authorization header")]
    InvalidHeader,

    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
}

/// Lifecycle of the watch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Prerendering,
    Connecting,
    Subscribed,
    Reconnecting,
    Terminated,
}

/// How a subscribed session ended.
enum SessionEnd {
    Shutdown,
    Dropped,
}

/// What woke the session loop.
enum SessionEvent {
    Frame(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
    Stable,
    Shutdown,
}

/// Owns the event subscription for one Rancher project.
pub struct Watcher {
    endpoint: Endpoint,
    credentials: Credentials,
    dispatcher: Dispatcher,
    reconnect: ReconnectPolicy,
    connect_timeout: Duration,
    state: watch::Sender<WatchState>,
}

impl Watcher {
    pub fn new(endpoint: Endpoint, credentials: Credentials, dispatcher: Dispatcher) -> Self {
        let (state, _) = watch::channel(WatchState::Idle);
        Self {
            endpoint,
            credentials,
            dispatcher,
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(30),
            state,
        }
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Observe state transitions.
    pub fn state(&self) -> watch::Receiver<WatchState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: WatchState) {
        debug!(state = ?state, "Watch state");
        self.state.send_replace(state);
    }

    /// Run until `shutdown` turns true (or its sender is dropped).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), SubscriptionError> {
        let result = self.run_inner(&mut shutdown).await;
        if let Err(e) = &result {
            error!(error = %e, "Watch loop stopped");
        }
        self.set_state(WatchState::Terminated);
        result
    }

    async fn run_inner(&self, shutdown: &mut watch::Receiver<bool>) -> Result<(), SubscriptionError> {
        self.set_state(WatchState::Prerendering);
        let stopped = tokio::select! {
            _ = self.dispatcher.reconcile("prerender") => false,
            _ = shutdown.wait_for(|stop| *stop) => true,
        };
        if stopped {
            return Ok(());
        }

        // Fail fast on setup errors before entering the retry loop.
        self.build_request()?;
        self.resolve_host().await?;

        let url = self.endpoint.subscribe_url();
        let mut tracker = ReconnectTracker::default();

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            self.set_state(WatchState::Connecting);
            let request = self.build_request()?;
            let connect = tokio::time::timeout(self.connect_timeout, connect_async(request));
            let outcome = tokio::select! {
                result = connect => Some(result),
                _ = shutdown.wait_for(|stop| *stop) => None,
            };
            let Some(outcome) = outcome else {
                return Ok(());
            };

            match outcome {
                Ok(Ok((stream, _response))) => {
                    self.set_state(WatchState::Subscribed);
                    info!(url = %url, "Subscribed to resource changes");

                    if let SessionEnd::Shutdown = self.consume(stream, shutdown, &mut tracker).await {
                        return Ok(());
                    }
                }
                Ok(Err(e)) => {
                    tracker.connect_failed();
                    warn!(url = %url, error = %e, "Subscription connect failed");
                }
                Err(_) => {
                    tracker.connect_failed();
                    warn!(
                        url = %url,
                        timeout_secs = self.connect_timeout.as_secs(),
                        "Subscription connect timed out"
                    );
                }
            }

            self.set_state(WatchState::Reconnecting);
            let delay = tracker.next_delay(&self.reconnect);
            info!(
                failures = tracker.failures(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting"
            );

            let stopped = tokio::select! {
                _ = tokio::time::sleep(delay) => false,
                _ = shutdown.wait_for(|stop| *stop) => true,
            };
            if stopped {
                return Ok(());
            }
        }
    }

    /// Read frames until the connection drops or shutdown is requested.
    ///
    /// Once the session has been open for `stable_after`, any resync owed
    /// from an earlier disconnect runs and the reconnect delay resets.
    async fn consume(
        &self,
        mut stream: EventStream,
        shutdown: &mut watch::Receiver<bool>,
        tracker: &mut ReconnectTracker,
    ) -> SessionEnd {
        let stable_timer = tokio::time::sleep(self.reconnect.stable_after);
        tokio::pin!(stable_timer);
        let mut stable = false;

        loop {
            let event = tokio::select! {
                frame = stream.next() => SessionEvent::Frame(frame),
                _ = &mut stable_timer, if !stable => SessionEvent::Stable,
                _ = shutdown.wait_for(|stop| *stop) => SessionEvent::Shutdown,
            };

            let frame = match event {
                SessionEvent::Frame(frame) => frame,
                SessionEvent::Stable => {
                    stable = true;
                    // Events may have been missed while disconnected.
                    if tracker.take_resync() {
                        self.dispatcher.spawn_reconcile("resync");
                    }
                    continue;
                }
                SessionEvent::Shutdown => {
                    if let Err(e) = stream.close(None).await {
                        debug!(error = %e, "Close handshake failed");
                    }
                    return SessionEnd::Shutdown;
                }
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    // Handlers run detached.
                    let _ = self.dispatcher.dispatch(text.as_str());
                    continue;
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(bytes = data.len(), "Ignoring binary frame");
                    continue;
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(frame = ?frame, stable, "Subscription closed by server");
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => warn!(error = %e, stable, "Subscription error"),
                None => info!(stable, "Subscription stream ended"),
            }

            tracker.session_ended(stable);
            return SessionEnd::Dropped;
        }
    }

    fn build_request(&self) -> Result<Request, SubscriptionError> {
        let url = self.endpoint.subscribe_url();
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|source| SubscriptionError::InvalidUrl {
                url: url.clone(),
                source,
            })?;

        let mut authorization = HeaderValue::from_str(self.credentials.authorization().expose())
            .map_err(|_| SubscriptionError::InvalidHeader)?;
        authorization.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, authorization);
        Ok(request)
    }

    async fn resolve_host(&self) -> Result<(), SubscriptionError> {
        let host = self.endpoint.host.clone();
        let resolve_err = |source| SubscriptionError::Resolve {
            host: host.clone(),
            source,
        };

        let mut addrs = tokio::net::lookup_host((host.as_str(), self.endpoint.port))
            .await
            .map_err(resolve_err)?;
        if addrs.next().is_none() {
            return Err(resolve_err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no addresses",
            )));
        }
        Ok(())
    }
}
