//! Transport strategies for the probe
//!
//! Each strategy sends exactly one rendered OPTIONS request and waits for
//! exactly one response. Strategies do not watch for cancellation or the
//! probe deadline themselves; the [`Prober`](crate::orchestrator::Prober)
//! abandons them when either fires.
//!
//! Progress is reported over a single ordered channel: the strategy posts
//! [`TransportEvent::RequestSent`] as soon as the request is on the wire, and
//! the orchestrator-side task posts the final [`TransportEvent::Response`] or
//! [`TransportEvent::Error`] once [`ProbeTransport::exchange`] returns.

pub mod framing;
pub mod tcp;
pub mod tls;
pub mod udp;
pub mod ws;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use crate::config::ProbeConfig;
use crate::error::{Error, Result};
use crate::request::{indent_for_log, ProbeRequest};
use crate::target::{Scheme, Target};

pub use tcp::TcpProbe;
pub use tls::TlsProbe;
pub use udp::UdpProbe;
pub use ws::WebSocketProbe;

/// Status line marking a successful probe
pub const SUCCESS_STATUS_LINE: &str = "SIP/2.0 200 OK";

// One RequestSent plus one outcome
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 2;

/// Response received from the probed endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    body: String,
    elapsed: Duration,
}

impl ProbeResponse {
    pub fn new(body: impl Into<String>, elapsed: Duration) -> Self {
        ProbeResponse {
            body: body.into(),
            elapsed,
        }
    }

    pub(crate) fn from_bytes(bytes: &[u8], elapsed: Duration) -> Self {
        ProbeResponse::new(String::from_utf8_lossy(bytes).into_owned(), elapsed)
    }

    /// Raw response text after transport-specific normalization
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Time between writing the request and receiving the full response
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Round-trip time in milliseconds, rounded to two decimals
    pub fn elapsed_ms(&self) -> f64 {
        (self.elapsed.as_secs_f64() * 100_000.0).round() / 100.0
    }

    /// Whether the response carries a `200 OK` status line
    pub fn is_ok(&self) -> bool {
        self.body.contains(SUCCESS_STATUS_LINE)
    }

    /// First line of the response
    pub fn status_line(&self) -> &str {
        self.body.lines().next().unwrap_or("").trim_end_matches('\r')
    }

    /// Body with line breaks indented for a single log entry
    pub fn for_log(&self) -> String {
        indent_for_log(&self.body)
    }
}

/// Progress notification from a running probe
#[derive(Debug)]
pub enum TransportEvent {
    /// The request has been written; the round-trip clock is running
    RequestSent(ProbeRequest),
    /// A complete response arrived
    Response(ProbeResponse),
    /// Dial, write or read failed
    Error(Error),
}

impl From<Result<ProbeResponse>> for TransportEvent {
    fn from(outcome: Result<ProbeResponse>) -> Self {
        match outcome {
            Ok(response) => TransportEvent::Response(response),
            Err(error) => TransportEvent::Error(error),
        }
    }
}

/// One way of delivering an OPTIONS request and reading its reply
#[async_trait]
pub trait ProbeTransport: Send + Sync + 'static {
    /// Short transport name for logging
    fn name(&self) -> &'static str;

    /// Send one request and wait for one response.
    ///
    /// Implementations post [`TransportEvent::RequestSent`] on `events` right
    /// after the request is written. The connection is owned by this call and
    /// released on every return path.
    async fn exchange(&self, events: &mpsc::Sender<TransportEvent>) -> Result<ProbeResponse>;
}

/// The four transports, selected once from the target scheme
#[derive(Debug, Clone)]
pub enum TransportStrategy {
    Tcp(TcpProbe),
    Udp(UdpProbe),
    Tls(TlsProbe),
    WebSocket(WebSocketProbe),
}

impl TransportStrategy {
    pub fn for_target(target: &Target, config: &ProbeConfig) -> Self {
        match target.scheme() {
            Scheme::Tcp => TransportStrategy::Tcp(TcpProbe::new(target.authority(), config.connect_timeout)),
            Scheme::Udp => TransportStrategy::Udp(UdpProbe::new(target.authority())),
            Scheme::Tls => TransportStrategy::Tls(TlsProbe::new(
                target.authority(),
                target.host().to_string(),
                target.tls_policy(),
            )),
            Scheme::Ws | Scheme::Wss => TransportStrategy::WebSocket(WebSocketProbe::new(
                target.url().clone(),
                target.scheme(),
                target.tls_policy(),
            )),
        }
    }
}

#[async_trait]
impl ProbeTransport for TransportStrategy {
    fn name(&self) -> &'static str {
        match self {
            TransportStrategy::Tcp(probe) => probe.name(),
            TransportStrategy::Udp(probe) => probe.name(),
            TransportStrategy::Tls(probe) => probe.name(),
            TransportStrategy::WebSocket(probe) => probe.name(),
        }
    }

    async fn exchange(&self, events: &mpsc::Sender<TransportEvent>) -> Result<ProbeResponse> {
        match self {
            TransportStrategy::Tcp(probe) => probe.exchange(events).await,
            TransportStrategy::Udp(probe) => probe.exchange(events).await,
            TransportStrategy::Tls(probe) => probe.exchange(events).await,
            TransportStrategy::WebSocket(probe) => probe.exchange(events).await,
        }
    }
}

impl fmt::Display for TransportStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// The receiver may already be gone if the orchestrator gave up
pub(crate) async fn notify_sent(events: &mpsc::Sender<TransportEvent>, request: &ProbeRequest) {
    if events.send(TransportEvent::RequestSent(request.clone())).await.is_err() {
        trace!("Request sent after the probe was abandoned");
    }
}
