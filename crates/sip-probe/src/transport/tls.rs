//! TLS-over-TCP probe and the rustls client configuration it shares with
//! the `wss` WebSocket probe

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, OwnedTrustAnchor, RootCertStore, ServerName};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use super::framing::exchange_stream;
use super::{ProbeResponse, ProbeTransport, TransportEvent};
use crate::error::{Error, Result};
use crate::request::{ProbeRequest, RequestTemplate};
use crate::target::{Scheme, TlsPolicy};

/// Verifier used for [`TlsPolicy::SkipVerify`]: every certificate passes
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

fn webpki_root_store() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(ta.subject, ta.spki, ta.name_constraints)
    }));
    roots
}

/// Build the TLS client configuration for a verification policy
pub fn client_config(policy: TlsPolicy) -> Arc<ClientConfig> {
    let builder = ClientConfig::builder().with_safe_defaults();
    let config = match policy {
        TlsPolicy::Verify => builder
            .with_root_certificates(webpki_root_store())
            .with_no_client_auth(),
        TlsPolicy::SkipVerify => builder
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
            .with_no_client_auth(),
    };
    Arc::new(config)
}

/// Parse a host name or IP literal into a TLS server name
pub fn server_name(host: &str) -> Result<ServerName> {
    ServerName::try_from(host).map_err(|_| Error::InvalidServerName(host.to_string()))
}

/// SIP over TLS probe
#[derive(Debug, Clone)]
pub struct TlsProbe {
    authority: String,
    host: String,
    policy: TlsPolicy,
}

impl TlsProbe {
    pub fn new(authority: impl Into<String>, host: impl Into<String>, policy: TlsPolicy) -> Self {
        TlsProbe {
            authority: authority.into(),
            host: host.into(),
            policy,
        }
    }

    async fn connect(&self) -> Result<TlsStream<TcpStream>> {
        let server_name = server_name(&self.host)?;
        let tcp = TcpStream::connect(&self.authority)
            .await
            .map_err(|e| Error::Dial(self.authority.clone(), e))?;

        let connector = TlsConnector::from(client_config(self.policy));
        connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| Error::TlsHandshake(self.authority.clone(), e))
    }
}

#[async_trait]
impl ProbeTransport for TlsProbe {
    fn name(&self) -> &'static str {
        Scheme::Tls.as_str()
    }

    async fn exchange(&self, events: &mpsc::Sender<TransportEvent>) -> Result<ProbeResponse> {
        debug!("Doing TLS sip to {} ({:?})", self.authority, self.policy);
        let mut stream = self.connect().await?;
        let local_addr = stream.get_ref().0.local_addr()?;

        let request = ProbeRequest::new(RequestTemplate::Socket, &local_addr.to_string(), Scheme::Tls);
        debug!("Request rendered, writing to {}", self.authority);
        exchange_stream(&mut stream, &request, events).await
    }
}
