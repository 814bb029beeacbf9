//! Probe orchestration
//!
//! [`Prober`] starts one transport strategy as its own task and races four
//! events against each other: the probe deadline, a transport error, external
//! cancellation and a response. Whichever arrives first decides the
//! [`ProbeResult`]; nothing is retried and the losing branches are simply
//! abandoned. The request-sent notification is logged when it arrives and
//! does not change state.

use std::fmt;

use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ProbeConfig;
use crate::error::Error;
use crate::target::Target;
use crate::transport::{
    ProbeResponse, ProbeTransport, TransportEvent, TransportStrategy, EVENT_CHANNEL_CAPACITY,
};

/// Exit code for a `200 OK` response
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for a well-formed non-200 response
pub const EXIT_REJECTED: i32 = 1;

/// Exit code for configuration errors, transport errors, timeouts and
/// interrupts
pub const EXIT_FATAL: i32 = 5;

/// Lifecycle of a probe; the last four states are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Idle,
    Probing,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl ProbeState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProbeState::Idle | ProbeState::Probing)
    }
}

impl fmt::Display for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProbeState::Idle => "idle",
            ProbeState::Probing => "probing",
            ProbeState::Succeeded => "succeeded",
            ProbeState::Failed => "failed",
            ProbeState::TimedOut => "timed out",
            ProbeState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Definitive outcome of one probe
#[derive(Debug)]
pub enum ProbeResult {
    /// The endpoint answered `200 OK`
    Succeeded(ProbeResponse),
    /// The endpoint answered with anything else
    Rejected(ProbeResponse),
    /// Dial, write or read failed
    TransportFailed(Error),
    /// No response within the probe budget
    TimedOut,
    /// Cancellation was requested before an outcome arrived
    Cancelled,
}

impl ProbeResult {
    pub fn state(&self) -> ProbeState {
        match self {
            ProbeResult::Succeeded(_) => ProbeState::Succeeded,
            ProbeResult::Rejected(_) | ProbeResult::TransportFailed(_) => ProbeState::Failed,
            ProbeResult::TimedOut => ProbeState::TimedOut,
            ProbeResult::Cancelled => ProbeState::Cancelled,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeResult::Succeeded(_))
    }

    /// The response, when one was received
    pub fn response(&self) -> Option<&ProbeResponse> {
        match self {
            ProbeResult::Succeeded(response) | ProbeResult::Rejected(response) => Some(response),
            _ => None,
        }
    }

    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            ProbeResult::Succeeded(_) => EXIT_SUCCESS,
            ProbeResult::Rejected(_) => EXIT_REJECTED,
            ProbeResult::TransportFailed(_) | ProbeResult::TimedOut | ProbeResult::Cancelled => EXIT_FATAL,
        }
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeResult::Succeeded(response) => write!(f, "{} ({}ms)", response.status_line(), response.elapsed_ms()),
            ProbeResult::Rejected(response) => write!(f, "{} ({}ms)", response.status_line(), response.elapsed_ms()),
            ProbeResult::TransportFailed(e) => write!(f, "Got Error response, {}", e),
            ProbeResult::TimedOut => f.write_str("Timed out waiting for response"),
            ProbeResult::Cancelled => f.write_str("Interrupted"),
        }
    }
}

/// Runs a single probe to completion
#[derive(Debug, Clone, Default)]
pub struct Prober {
    config: ProbeConfig,
}

impl Prober {
    pub fn new(config: ProbeConfig) -> Self {
        Prober { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Probe `target` with the transport its scheme selects
    pub async fn run(&self, target: &Target, cancel: CancellationToken) -> ProbeResult {
        let strategy = TransportStrategy::for_target(target, &self.config);
        debug!("Probing {} over {}", target, strategy);
        self.run_with(strategy, cancel).await
    }

    /// Probe with an explicit transport
    pub async fn run_with<T: ProbeTransport>(&self, transport: T, cancel: CancellationToken) -> ProbeResult {
        let (events_tx, mut events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let name = transport.name();
        tokio::spawn(async move {
            let outcome = transport.exchange(&events_tx).await;
            let _ = events_tx.send(outcome.into()).await;
        });

        let started = Instant::now();
        let deadline = sleep(self.config.timeout);
        tokio::pin!(deadline);
        debug!("{} probe {} -> {}", name, ProbeState::Idle, ProbeState::Probing);

        let result = loop {
            tokio::select! {
                _ = &mut deadline => break ProbeResult::TimedOut,
                _ = cancel.cancelled() => break ProbeResult::Cancelled,
                event = events_rx.recv() => match event {
                    Some(TransportEvent::RequestSent(request)) => {
                        info!("Request:\n\t{}", request.for_log());
                    }
                    Some(TransportEvent::Response(response)) => {
                        info!("Response({}ms):\n\t{}", response.elapsed_ms(), response.for_log());
                        if response.is_ok() {
                            break ProbeResult::Succeeded(response);
                        }
                        break ProbeResult::Rejected(response);
                    }
                    Some(TransportEvent::Error(e)) => break ProbeResult::TransportFailed(e),
                    None => break ProbeResult::TransportFailed(Error::ProbeAborted),
                },
            }
        };

        debug!("{} probe {} -> {}", name, ProbeState::Probing, result.state());
        match &result {
            ProbeResult::Succeeded(_) => info!("{} probe succeeded: {}", name, result),
            ProbeResult::Rejected(_) => warn!("{} probe rejected: {}", name, result),
            _ => error!("{} after {:?}", result, started.elapsed()),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::request::{ProbeRequest, RequestTemplate};
    use crate::target::Scheme;
    use async_trait::async_trait;
    use std::io;
    use std::time::Duration;

    /// Transport that sends a request, waits, then returns a canned outcome
    struct MockTransport {
        delay: Duration,
        reply: std::result::Result<&'static str, io::ErrorKind>,
    }

    impl MockTransport {
        fn replying(body: &'static str) -> Self {
            MockTransport { delay: Duration::from_millis(20), reply: Ok(body) }
        }

        fn failing(kind: io::ErrorKind) -> Self {
            MockTransport { delay: Duration::ZERO, reply: Err(kind) }
        }

        fn after(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl ProbeTransport for MockTransport {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn exchange(&self, events: &mpsc::Sender<TransportEvent>) -> Result<ProbeResponse> {
            let request = ProbeRequest::new(RequestTemplate::Socket, "127.0.0.1:5060", Scheme::Tcp);
            crate::transport::notify_sent(events, &request).await;
            tokio::time::sleep(self.delay).await;
            match self.reply {
                Ok(body) => Ok(ProbeResponse::new(body, self.delay)),
                Err(kind) => Err(Error::Io(io::Error::new(kind, "mock read failure"))),
            }
        }
    }

    /// Transport that never answers
    struct SilentTransport;

    #[async_trait]
    impl ProbeTransport for SilentTransport {
        fn name(&self) -> &'static str {
            "silent"
        }

        async fn exchange(&self, _events: &mpsc::Sender<TransportEvent>) -> Result<ProbeResponse> {
            std::future::pending().await
        }
    }

    /// Transport whose task dies without an outcome
    struct PanickingTransport;

    #[async_trait]
    impl ProbeTransport for PanickingTransport {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn exchange(&self, _events: &mpsc::Sender<TransportEvent>) -> Result<ProbeResponse> {
            panic!("transport blew up");
        }
    }

    #[tokio::test]
    async fn test_ok_response_succeeds() {
        let result = Prober::default()
            .run_with(MockTransport::replying("SIP/2.0 200 OK\r\nCSeq: 1 OPTIONS\r\n\r\n"), CancellationToken::new())
            .await;
        assert!(result.is_success());
        assert_eq!(result.state(), ProbeState::Succeeded);
        assert_eq!(result.exit_code(), EXIT_SUCCESS);
        assert!(result.response().unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_non_200_response_is_rejected() {
        let result = Prober::default()
            .run_with(MockTransport::replying("SIP/2.0 480 Temporarily Unavailable\r\n\r\n"), CancellationToken::new())
            .await;
        assert!(matches!(result, ProbeResult::Rejected(_)));
        assert_eq!(result.state(), ProbeState::Failed);
        assert_eq!(result.exit_code(), EXIT_REJECTED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_transport_times_out_at_deadline() {
        let started = Instant::now();
        let result = Prober::default().run_with(SilentTransport, CancellationToken::new()).await;
        let waited = started.elapsed();

        assert!(matches!(result, ProbeResult::TimedOut));
        assert_eq!(result.exit_code(), EXIT_FATAL);
        assert!(waited >= Duration::from_secs(15), "timed out early: {:?}", waited);
        assert!(waited < Duration::from_secs(16), "timed out late: {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_sent_does_not_rearm_deadline() {
        let transport = MockTransport::replying("SIP/2.0 200 OK\r\n\r\n").after(Duration::from_secs(20));
        let started = Instant::now();
        let result = Prober::default().run_with(transport, CancellationToken::new()).await;

        assert!(matches!(result, ProbeResult::TimedOut));
        assert!(started.elapsed() < Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_fails_immediately() {
        let started = Instant::now();
        let result = Prober::default()
            .run_with(MockTransport::failing(io::ErrorKind::ConnectionReset), CancellationToken::new())
            .await;

        assert!(matches!(result, ProbeResult::TransportFailed(Error::Io(_))));
        assert_eq!(result.state(), ProbeState::Failed);
        assert_eq!(result.exit_code(), EXIT_FATAL);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_wins_over_slow_success() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let transport = MockTransport::replying("SIP/2.0 200 OK\r\n\r\n").after(Duration::from_secs(5));
        let started = Instant::now();
        let result = Prober::default().run_with(transport, cancel).await;

        assert!(matches!(result, ProbeResult::Cancelled));
        assert_eq!(result.state(), ProbeState::Cancelled);
        assert_eq!(result.exit_code(), EXIT_FATAL);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_already_cancelled_token() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = Prober::default().run_with(SilentTransport, cancel).await;
        assert!(matches!(result, ProbeResult::Cancelled));
    }

    #[tokio::test]
    async fn test_aborted_transport_task_is_a_failure() {
        let result = Prober::default().run_with(PanickingTransport, CancellationToken::new()).await;
        assert!(matches!(result, ProbeResult::TransportFailed(Error::ProbeAborted)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_timeout() {
        let prober = Prober::new(ProbeConfig::default().with_timeout(Duration::from_secs(2)));
        let started = Instant::now();
        let result = prober.run_with(SilentTransport, CancellationToken::new()).await;
        assert!(matches!(result, ProbeResult::TimedOut));
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ProbeState::Idle.is_terminal());
        assert!(!ProbeState::Probing.is_terminal());
        assert!(ProbeState::Succeeded.is_terminal());
        assert!(ProbeState::Failed.is_terminal());
        assert!(ProbeState::TimedOut.is_terminal());
        assert!(ProbeState::Cancelled.is_terminal());
    }

    #[test]
    fn test_state_follows_result() {
        let ok = ProbeResponse::new("SIP/2.0 200 OK\r\n\r\n", Duration::ZERO);
        let busy = ProbeResponse::new("SIP/2.0 486 Busy Here\r\n\r\n", Duration::ZERO);
        assert_eq!(ProbeResult::Succeeded(ok).state(), ProbeState::Succeeded);
        assert_eq!(ProbeResult::Rejected(busy).state(), ProbeState::Failed);
        assert_eq!(ProbeResult::TransportFailed(Error::ConnectionClosed).state(), ProbeState::Failed);
        assert_eq!(ProbeResult::TimedOut.state(), ProbeState::TimedOut);
        assert_eq!(ProbeResult::Cancelled.state(), ProbeState::Cancelled);
        for result in [ProbeResult::TimedOut, ProbeResult::Cancelled] {
            assert!(result.state().is_terminal());
        }
    }

    #[test]
    fn test_result_messages() {
        assert_eq!(ProbeResult::TimedOut.to_string(), "Timed out waiting for response");
        assert_eq!(ProbeResult::Cancelled.to_string(), "Interrupted");
        assert_eq!(
            ProbeResult::TransportFailed(Error::ConnectionClosed).to_string(),
            "Got Error response, Connection closed before a complete response was received"
        );
    }
}
