//! SIP OPTIONS liveness probe
//!
//! This crate sends a single SIP OPTIONS request to an endpoint over UDP,
//! TCP, TLS or WebSocket, waits for one response, and reports whether the
//! endpoint answered `200 OK`. It is meant to be run once per check by an
//! external monitor that only looks at the exit code and the log output.
//!
//! ```no_run
//! use sip_probe::prelude::*;
//!
//! # async fn example() -> sip_probe::Result<()> {
//! let target = Target::parse("tcp://sip.example.com:5060", TlsPolicy::Verify)?;
//! let result = Prober::default().run(&target, CancellationToken::new()).await;
//! std::process::exit(result.exit_code());
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod request;
pub mod target;
pub mod transport;

pub use config::ProbeConfig;
pub use error::{Error, Result};
pub use orchestrator::{ProbeResult, ProbeState, Prober, EXIT_FATAL, EXIT_REJECTED, EXIT_SUCCESS};
pub use request::{ProbeRequest, RequestTemplate};
pub use target::{Scheme, Target, TlsPolicy};
pub use transport::{ProbeResponse, ProbeTransport, TransportEvent, TransportStrategy};

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        Error, ProbeConfig, ProbeRequest, ProbeResponse, ProbeResult, ProbeState, ProbeTransport,
        Prober, RequestTemplate, Result, Scheme, Target, TlsPolicy, TransportEvent, TransportStrategy,
        EXIT_FATAL, EXIT_REJECTED, EXIT_SUCCESS,
    };
    pub use tokio_util::sync::CancellationToken;
}
