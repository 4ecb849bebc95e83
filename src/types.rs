//! Shared types: public data model and dial-time options.

use crate::connection::{BoxStream, DialFunc};
use crate::tls::TlsParams;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::Duration;

/// Debug tee sink: receives every byte sent on and read from the control
/// channel.
pub type DebugSink = Box<dyn Write + Send>;

// ─── Directory entries ───────────────────────────────────────────────

/// Type of a remote filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryKind {
    File,
    Folder,
    Link,
}

/// One entry from a directory listing (parsed from LIST or MLSD output).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub name: String,
    /// Target of a symbolic link.
    pub target: Option<String>,
    pub kind: EntryKind,
    pub size: u64,
    /// Modification time. Interpreted in the configured listing timezone
    /// when the wire format carries no zone of its own.
    pub modified: Option<DateTime<Utc>>,
}

// ─── Control-channel replies ─────────────────────────────────────────

/// A single FTP reply. Multi-line replies keep continuation lines verbatim
/// in `message`, joined with `\n`, so FEAT output can be re-split.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub code: u16,
    pub message: String,
}

impl Reply {
    /// Positive-preliminary reply (1xx).
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Positive-completion reply (2xx).
    pub fn is_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Positive-intermediate reply (3xx).
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }
}

// ─── Dial-time options ───────────────────────────────────────────────

/// Security mode for the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecurityMode {
    /// Plain-text FTP.
    None,
    /// Explicit FTPS — starts plain, upgrades via AUTH TLS after the greeting.
    Explicit,
    /// Implicit FTPS — TLS from the first byte.
    Implicit,
}

impl Default for SecurityMode {
    fn default() -> Self {
        Self::None
    }
}

/// Options for [`FtpSession::connect`](crate::FtpSession::connect).
///
/// All options are resolved before the first network action and are
/// immutable for the life of the session. Cancelling the initial connect is
/// done by dropping the `connect` future.
pub struct DialOptions {
    pub(crate) timeout: Option<Duration>,
    pub(crate) stream: Option<BoxStream>,
    pub(crate) dial_fn: Option<DialFunc>,
    pub(crate) security: SecurityMode,
    pub(crate) tls: Option<TlsParams>,
    pub(crate) disable_epsv: bool,
    pub(crate) disable_utf8: bool,
    pub(crate) disable_mlsd: bool,
    pub(crate) location: FixedOffset,
    pub(crate) debug_to: Option<DebugSink>,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            stream: None,
            dial_fn: None,
            security: SecurityMode::None,
            tls: None,
            disable_epsv: false,
            disable_utf8: false,
            disable_mlsd: false,
            location: Utc.fix(),
            debug_to: None,
        }
    }
}

impl DialOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeout for the initial TCP connect and for data-channel dials.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use a pre-established byte stream as the control connection instead
    /// of dialing.
    pub fn stream(mut self, stream: BoxStream) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Use a custom dial function for both control and data connections.
    /// A pre-established [`stream`](Self::stream) still wins for the control
    /// connection.
    pub fn dial_with(mut self, dial: DialFunc) -> Self {
        self.dial_fn = Some(dial);
        self
    }

    /// Explicit FTPS: upgrade the control channel via AUTH TLS right after
    /// the greeting; data channels are protected via PBSZ/PROT.
    pub fn explicit_tls(mut self, params: TlsParams) -> Self {
        self.security = SecurityMode::Explicit;
        self.tls = Some(params);
        self
    }

    /// Implicit FTPS: TLS-wrap the control connection before the greeting.
    pub fn implicit_tls(mut self, params: TlsParams) -> Self {
        self.security = SecurityMode::Implicit;
        self.tls = Some(params);
        self
    }

    /// Never attempt EPSV, even when advertised.
    pub fn disable_epsv(mut self, disabled: bool) -> Self {
        self.disable_epsv = disabled;
        self
    }

    /// Skip the OPTS UTF8 ON negotiation.
    pub fn disable_utf8(mut self, disabled: bool) -> Self {
        self.disable_utf8 = disabled;
        self
    }

    /// Ignore an advertised MLST feature and keep using LIST. Useful for
    /// servers that advertise MLSD but implement it badly.
    pub fn disable_mlsd(mut self, disabled: bool) -> Self {
        self.disable_mlsd = disabled;
        self
    }

    /// Timezone used to interpret listing timestamps that carry no zone.
    /// Defaults to UTC.
    pub fn location(mut self, location: FixedOffset) -> Self {
        self.location = location;
        self
    }

    /// Tee every byte sent on and read from the control channel into `sink`.
    pub fn debug_to(mut self, sink: DebugSink) -> Self {
        self.debug_to = Some(sink);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = DialOptions::new();
        assert_eq!(opts.security, SecurityMode::None);
        assert_eq!(opts.location.local_minus_utc(), 0);
        assert!(!opts.disable_epsv);
    }

    #[test]
    fn reply_classes() {
        let reply = Reply {
            code: 150,
            message: "Opening data connection".into(),
        };
        assert!(reply.is_preliminary());
        assert!(!reply.is_completion());
        assert!(Reply { code: 350, message: String::new() }.is_intermediate());
    }
}
