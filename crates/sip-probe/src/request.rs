//! SIP OPTIONS request rendering
//!
//! Requests are rendered from one of two fixed templates. Each rendering
//! draws a fresh Call-ID and CSeq number from the OS random source so that
//! several monitors probing the same endpoint never share a transaction.

use std::fmt;
use std::time::Instant;

use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::target::Scheme;

/// Length of the generated Call-ID
pub const CALL_ID_LEN: usize = 20;

/// Symbols a Call-ID is drawn from
pub const CALL_ID_ALPHABET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Blank line terminating a SIP message on the wire
pub const MESSAGE_TERMINATOR: &str = "\r\n\r\n";

const WS_OPTIONS: &str = "OPTIONS sip:monitor@none SIP/2.0
Via: SIP/2.0/{{PROTOC}} 81okseq92jb7.invalid;branch=z9hG4bK5964427
To: <sip:ba_user@none>
From: <sip:anonymous.8scs48@anonymous.invalid>;tag=fql2c8mlg3
Call-ID: {{callId}}
CSeq: {{seq}} OPTIONS
Content-Length: 0

";

const SOCKET_OPTIONS: &str = "OPTIONS sip:host@invalid:1739;transport={{proto}} SIP/2.0
Via: SIP/2.0/{{PROTOC}} {{localaddr}};branch=z9hG4bKr1t13cmvZDjtg
Max-Forwards: 70
From: \"\" <sip:monitor@invalid>
To: <sip:host@invalid;transport={{proto}}>
Call-ID: {{callId}}
CSeq: {{seq}} OPTIONS
Content-Length: 0

";

/// Request template, chosen by transport family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTemplate {
    /// Addressed to `sip:monitor@none`, no local address
    WebSocket,
    /// Addressed to `sip:host@invalid` with a `transport=` parameter and the
    /// local socket address in the Via header
    Socket,
}

impl RequestTemplate {
    pub fn for_scheme(scheme: Scheme) -> Self {
        if scheme.is_websocket() {
            RequestTemplate::WebSocket
        } else {
            RequestTemplate::Socket
        }
    }

    /// Raw template text with `\n` line endings and `{{...}}` placeholders
    pub fn text(&self) -> &'static str {
        match self {
            RequestTemplate::WebSocket => WS_OPTIONS,
            RequestTemplate::Socket => SOCKET_OPTIONS,
        }
    }
}

/// Random alphanumeric Call-ID of [`CALL_ID_LEN`] characters
pub fn random_call_id() -> String {
    Alphanumeric.sample_string(&mut OsRng, CALL_ID_LEN)
}

/// Random CSeq number, the big-endian value of two random bytes
pub fn random_sequence() -> u16 {
    let mut bytes = [0u8; 2];
    OsRng.fill_bytes(&mut bytes);
    u16::from_be_bytes(bytes)
}

/// Render `template` with a fresh Call-ID and CSeq number.
///
/// `local_addr` is empty for WebSocket transports. `transport` is written
/// uppercase in the Via protocol token and lowercase in `transport=`.
pub fn render(template: &str, local_addr: &str, transport: &str) -> String {
    render_with(template, &random_call_id(), random_sequence(), local_addr, transport)
}

fn render_with(template: &str, call_id: &str, sequence: u16, local_addr: &str, transport: &str) -> String {
    let rendered = template
        .replace("{{callId}}", call_id)
        .replace("{{localaddr}}", local_addr)
        .replace("{{PROTOC}}", &transport.to_uppercase())
        .replace("{{proto}}", &transport.to_lowercase())
        .replace("{{seq}}", &sequence.to_string());
    to_wire_format(&rendered)
}

/// Convert every line ending to CRLF and end the message with exactly one
/// blank line.
pub fn to_wire_format(text: &str) -> String {
    let mut wire = text.replace("\r\n", "\n").replace('\n', "\r\n");
    let trimmed = wire.trim_end_matches(['\r', '\n']).len();
    wire.truncate(trimmed);
    wire.push_str(MESSAGE_TERMINATOR);
    wire
}

/// Rendered OPTIONS request, ready to be written once
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    message: String,
    call_id: String,
    sequence: u16,
    created_at: Instant,
}

impl ProbeRequest {
    /// Render a request for a transport. `local_addr` is the local socket
    /// address of the connection, or empty for WebSocket.
    pub fn new(template: RequestTemplate, local_addr: &str, transport: Scheme) -> Self {
        let call_id = random_call_id();
        let sequence = random_sequence();
        let message = render_with(template.text(), &call_id, sequence, local_addr, transport.as_str());
        ProbeRequest {
            message,
            call_id,
            sequence,
            created_at: Instant::now(),
        }
    }

    /// Wire-format message text
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.message.as_bytes()
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Message text with line breaks indented for a single log entry
    pub fn for_log(&self) -> String {
        indent_for_log(&self.message)
    }
}

impl fmt::Display for ProbeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub(crate) fn indent_for_log(message: &str) -> String {
    message.replace("\r\n", "\n\t")
}
