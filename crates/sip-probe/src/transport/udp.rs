use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Instant;

use async_trait::async_trait;
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::mpsc;
use tracing::debug;

use super::framing::MAX_RESPONSE_SIZE;
use super::{notify_sent, ProbeResponse, ProbeTransport, TransportEvent};
use crate::error::{Error, Result};
use crate::request::{ProbeRequest, RequestTemplate};
use crate::target::Scheme;

/// UDP probe
///
/// A datagram is a complete message, so the first datagram received from the
/// peer is the response. Payloads longer than [`MAX_RESPONSE_SIZE`] are
/// truncated by the receive buffer.
#[derive(Debug, Clone)]
pub struct UdpProbe {
    authority: String,
}

impl UdpProbe {
    pub fn new(authority: impl Into<String>) -> Self {
        UdpProbe {
            authority: authority.into(),
        }
    }

    async fn resolve(&self) -> Result<SocketAddr> {
        lookup_host(&self.authority)
            .await
            .map_err(|e| Error::Dial(self.authority.clone(), e))?
            .next()
            .ok_or_else(|| {
                Error::Dial(
                    self.authority.clone(),
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved"),
                )
            })
    }

    async fn connect(&self) -> Result<UdpSocket> {
        let remote = self.resolve().await?;
        let bind_addr: SocketAddr = if remote.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| Error::Dial(self.authority.clone(), e))?;
        socket
            .connect(remote)
            .await
            .map_err(|e| Error::Dial(self.authority.clone(), e))?;
        Ok(socket)
    }
}

#[async_trait]
impl ProbeTransport for UdpProbe {
    fn name(&self) -> &'static str {
        Scheme::Udp.as_str()
    }

    async fn exchange(&self, events: &mpsc::Sender<TransportEvent>) -> Result<ProbeResponse> {
        debug!("Doing UDP sip to {}", self.authority);
        let socket = self.connect().await?;
        let local_addr = socket.local_addr()?;

        let request = ProbeRequest::new(RequestTemplate::Socket, &local_addr.to_string(), Scheme::Udp);
        socket.send(request.as_bytes()).await?;
        let sent_at = Instant::now();
        debug!("Wrote request from {}", local_addr);
        notify_sent(events, &request).await;

        let mut buf = vec![0u8; MAX_RESPONSE_SIZE];
        let n = socket.recv(&mut buf).await?;
        Ok(ProbeResponse::from_bytes(&buf[..n], sent_at.elapsed()))
    }
}
