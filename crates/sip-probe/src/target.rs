//! Probe target description
//!
//! A [`Target`] is parsed once from the address given on the command line
//! and is immutable afterwards. The scheme picks the transport; host and port
//! say where to connect; [`TlsPolicy`] says whether `tls` and `wss` peers
//! must present a valid certificate.

use std::fmt;
use std::str::FromStr;

use url::{Host, Url};

use crate::error::{Error, Result};

/// Transport selected by the URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Udp,
    Tcp,
    Tls,
    Ws,
    Wss,
}

impl Scheme {
    /// Lowercase scheme token, also used as the transport name in requests
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Udp => "udp",
            Scheme::Tcp => "tcp",
            Scheme::Tls => "tls",
            Scheme::Ws => "ws",
            Scheme::Wss => "wss",
        }
    }

    /// Whether the probe runs over a WebSocket connection
    pub fn is_websocket(&self) -> bool {
        matches!(self, Scheme::Ws | Scheme::Wss)
    }

    /// Whether the connection is wrapped in TLS
    pub fn is_secure(&self) -> bool {
        matches!(self, Scheme::Tls | Scheme::Wss)
    }
}

impl FromStr for Scheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(Scheme::Udp),
            "tcp" => Ok(Scheme::Tcp),
            "tls" => Ok(Scheme::Tls),
            "ws" => Ok(Scheme::Ws),
            "wss" => Ok(Scheme::Wss),
            _ => Err(Error::UnsupportedScheme(s.to_string())),
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Certificate verification policy for `tls` and `wss` targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsPolicy {
    /// Validate the peer certificate against the webpki root store
    #[default]
    Verify,
    /// Accept any certificate the peer presents
    SkipVerify,
}

impl TlsPolicy {
    pub fn from_skip_verify(skip_verify: bool) -> Self {
        if skip_verify {
            TlsPolicy::SkipVerify
        } else {
            TlsPolicy::Verify
        }
    }
}

/// Parsed endpoint to probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: Url,
    scheme: Scheme,
    host: String,
    port: u16,
    tls_policy: TlsPolicy,
}

impl Target {
    /// Parse a target address such as `tcp://sip.example.com:5060` or
    /// `wss://edge.example.com/ws`.
    ///
    /// Socket schemes require an explicit port. WebSocket schemes may fall
    /// back to the scheme default port, and keep their path and query since
    /// the WebSocket dialer connects to the URL as given.
    pub fn parse(addr: &str, tls_policy: TlsPolicy) -> Result<Self> {
        let addr = addr.trim();
        if addr.is_empty() {
            return Err(Error::MissingAddress);
        }

        let url = Url::parse(addr).map_err(|e| Error::InvalidUrl(addr.to_string(), e))?;
        let scheme: Scheme = url.scheme().parse()?;

        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            _ => return Err(Error::MissingHost(addr.to_string())),
        };

        let port = if scheme.is_websocket() {
            url.port_or_known_default()
        } else {
            url.port()
        }
        .ok_or_else(|| Error::MissingPort(addr.to_string()))?;

        Ok(Target {
            url,
            scheme,
            host,
            port,
            tls_policy,
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Bare host name or IP literal, without IPv6 brackets
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` suitable for socket dialing, brackets added for IPv6
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// The full URL, as dialed by the WebSocket transport
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn tls_policy(&self) -> TlsPolicy {
        self.tls_policy
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_socket_schemes() {
        let target = Target::parse("tcp://sip.example.com:5060", TlsPolicy::Verify).unwrap();
        assert_eq!(target.scheme(), Scheme::Tcp);
        assert_eq!(target.host(), "sip.example.com");
        assert_eq!(target.port(), 5060);
        assert_eq!(target.authority(), "sip.example.com:5060");

        let target = Target::parse("udp://10.1.2.3:5062", TlsPolicy::Verify).unwrap();
        assert_eq!(target.scheme(), Scheme::Udp);
        assert_eq!(target.authority(), "10.1.2.3:5062");

        let target = Target::parse("tls://sip.example.com:5061", TlsPolicy::SkipVerify).unwrap();
        assert_eq!(target.scheme(), Scheme::Tls);
        assert_eq!(target.tls_policy(), TlsPolicy::SkipVerify);
    }

    #[test]
    fn test_parse_ipv6_authority() {
        let target = Target::parse("tcp://[::1]:5060", TlsPolicy::Verify).unwrap();
        assert_eq!(target.host(), "::1");
        assert_eq!(target.authority(), "[::1]:5060");
    }

    #[test]
    fn test_parse_websocket_keeps_url() {
        let target = Target::parse("wss://edge.example.com/sip?x=1", TlsPolicy::Verify).unwrap();
        assert_eq!(target.scheme(), Scheme::Wss);
        assert_eq!(target.port(), 443);
        assert_eq!(target.url().path(), "/sip");
        assert_eq!(target.url().query(), Some("x=1"));

        let target = Target::parse("ws://edge.example.com:8080", TlsPolicy::Verify).unwrap();
        assert_eq!(target.port(), 8080);
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        let err = Target::parse("http://example.com:80", TlsPolicy::Verify).unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme(ref s) if s == "http"));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_parse_requires_port_for_sockets() {
        let err = Target::parse("tcp://sip.example.com", TlsPolicy::Verify).unwrap_err();
        assert!(matches!(err, Error::MissingPort(_)));
    }

    #[test]
    fn test_parse_empty_and_garbage() {
        assert!(matches!(Target::parse("", TlsPolicy::Verify), Err(Error::MissingAddress)));
        assert!(matches!(Target::parse("   ", TlsPolicy::Verify), Err(Error::MissingAddress)));
        assert!(matches!(
            Target::parse("not a url", TlsPolicy::Verify),
            Err(Error::InvalidUrl(..))
        ));
    }

    #[test]
    fn test_scheme_tokens() {
        assert_eq!("TCP".parse::<Scheme>().unwrap(), Scheme::Tcp);
        assert_eq!(Scheme::Wss.as_str(), "wss");
        assert!(Scheme::Ws.is_websocket());
        assert!(!Scheme::Udp.is_websocket());
        assert!(Scheme::Tls.is_secure());
        assert!(!Scheme::Ws.is_secure());
    }

    #[test]
    fn test_tls_policy_from_flag() {
        assert_eq!(TlsPolicy::from_skip_verify(true), TlsPolicy::SkipVerify);
        assert_eq!(TlsPolicy::from_skip_verify(false), TlsPolicy::Verify);
        assert_eq!(TlsPolicy::default(), TlsPolicy::Verify);
    }
}
