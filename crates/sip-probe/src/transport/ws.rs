use std::time::Instant;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector};
use tracing::{debug, trace};
use url::Url;

use super::tls::client_config;
use super::{notify_sent, ProbeResponse, ProbeTransport, TransportEvent};
use crate::error::{Error, Result};
use crate::request::{ProbeRequest, RequestTemplate};
use crate::target::{Scheme, TlsPolicy};

/// WebSocket subprotocol for SIP (RFC 7118)
pub const SIP_SUBPROTOCOL: &str = "sip";

const SUBPROTOCOL_HEADER: &str = "Sec-WebSocket-Protocol";

/// Replace the two-character escapes `\r\n` some servers put in text frames
/// with real CRLF line breaks.
pub fn unescape_crlf(payload: &str) -> String {
    payload.replace("\\r\\n", "\r\n")
}

/// SIP over WebSocket probe
///
/// One text frame carries the request and one data frame carries the reply;
/// the WebSocket message boundary is the framing.
#[derive(Debug, Clone)]
pub struct WebSocketProbe {
    url: Url,
    scheme: Scheme,
    policy: TlsPolicy,
}

impl WebSocketProbe {
    pub fn new(url: Url, scheme: Scheme, policy: TlsPolicy) -> Self {
        WebSocketProbe { url, scheme, policy }
    }

    fn connector(&self) -> Connector {
        if self.scheme.is_secure() {
            Connector::Rustls(client_config(self.policy))
        } else {
            Connector::Plain
        }
    }
}

#[async_trait]
impl ProbeTransport for WebSocketProbe {
    fn name(&self) -> &'static str {
        self.scheme.as_str()
    }

    async fn exchange(&self, events: &mpsc::Sender<TransportEvent>) -> Result<ProbeResponse> {
        debug!("Doing websocket sip check against {}", self.url);
        let mut handshake = self.url.as_str().into_client_request()?;
        handshake
            .headers_mut()
            .insert(SUBPROTOCOL_HEADER, HeaderValue::from_static(SIP_SUBPROTOCOL));

        let (mut ws, handshake_response) =
            connect_async_tls_with_config(handshake, None, false, Some(self.connector())).await?;
        debug!(
            "WebSocket connected, subprotocol {:?}",
            handshake_response.headers().get(SUBPROTOCOL_HEADER)
        );

        let request = ProbeRequest::new(RequestTemplate::WebSocket, "", self.scheme);
        ws.send(Message::Text(request.message().to_string())).await?;
        let sent_at = Instant::now();
        notify_sent(events, &request).await;

        let reply = loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => break text,
                Some(Ok(Message::Binary(data))) => break String::from_utf8_lossy(&data).into_owned(),
                Some(Ok(Message::Close(frame))) => {
                    debug!("Peer closed the WebSocket: {:?}", frame);
                    return Err(Error::ConnectionClosed);
                }
                Some(Ok(other)) => trace!("Skipping control frame {:?}", other),
                Some(Err(e)) => return Err(e.into()),
                None => return Err(Error::ConnectionClosed),
            }
        };
        let response = ProbeResponse::new(unescape_crlf(&reply), sent_at.elapsed());

        if let Err(e) = ws.close(None).await {
            trace!("Error closing WebSocket: {}", e);
        }
        Ok(response)
    }
}
