use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;

use super::framing::exchange_stream;
use super::{ProbeResponse, ProbeTransport, TransportEvent};
use crate::error::{Error, Result};
use crate::request::{ProbeRequest, RequestTemplate};
use crate::target::Scheme;

/// Plain TCP probe
#[derive(Debug, Clone)]
pub struct TcpProbe {
    authority: String,
    connect_timeout: Duration,
}

impl TcpProbe {
    pub fn new(authority: impl Into<String>, connect_timeout: Duration) -> Self {
        TcpProbe {
            authority: authority.into(),
            connect_timeout,
        }
    }

    async fn connect(&self) -> Result<TcpStream> {
        match timeout(self.connect_timeout, TcpStream::connect(&self.authority)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(Error::Dial(self.authority.clone(), e)),
            Err(_) => Err(Error::ConnectTimeout(self.authority.clone(), self.connect_timeout)),
        }
    }
}

#[async_trait]
impl ProbeTransport for TcpProbe {
    fn name(&self) -> &'static str {
        Scheme::Tcp.as_str()
    }

    async fn exchange(&self, events: &mpsc::Sender<TransportEvent>) -> Result<ProbeResponse> {
        debug!("Doing TCP sip to {}", self.authority);
        let mut stream = self.connect().await?;
        let local_addr = stream.local_addr()?;

        let request = ProbeRequest::new(RequestTemplate::Socket, &local_addr.to_string(), Scheme::Tcp);
        debug!("Request rendered, writing to {}", self.authority);
        exchange_stream(&mut stream, &request, events).await
    }
}
