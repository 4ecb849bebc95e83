//! Stateful FTP session — owns the control connection and negotiated state.
//!
//! Lifecycle: [`FtpSession::connect`] → [`auth`](FtpSession::auth) →
//! [`after_auth`](FtpSession::after_auth) → file and directory operations →
//! [`quit`](FtpSession::quit).
//!
//! A session is a single sequential state machine: the protocol forbids
//! concurrent commands on one control channel and concurrent data channels
//! on one session. Every operation takes `&mut self`, and an open
//! [`DataStream`](crate::DataStream) keeps the session mutably borrowed
//! until it is closed.

use crate::connection;
use crate::error::{FtpError, FtpResult};
use crate::protocol::Codec;
use crate::status;
use crate::tls;
use crate::types::{DialOptions, SecurityMode};
use crate::walker::Walker;
use std::collections::HashMap;

/// A connected FTP session.
pub struct FtpSession {
    pub(crate) codec: Codec,
    /// Resolved host identity, reused for data-channel addressing (EPSV
    /// replies carry no host).
    pub(crate) host: String,
    /// Extension keyword → advertised parameter string, from FEAT.
    pub(crate) features: HashMap<String, String>,
    /// Set permanently after the first EPSV failure.
    pub(crate) skip_epsv: bool,
    pub(crate) mlst_supported: bool,
    pub(crate) use_pret: bool,
    pub(crate) opts: DialOptions,
}

impl FtpSession {
    /// Connect to `addr` (`host:port`), read the greeting, and perform the
    /// explicit TLS upgrade when configured.
    ///
    /// The server must greet with 220; anything else fails the dial after a
    /// best-effort QUIT, leaving no usable session.
    pub async fn connect(addr: &str, mut options: DialOptions) -> FtpResult<FtpSession> {
        if options.security != SecurityMode::None && options.tls.is_none() {
            return Err(FtpError::invalid_config("TLS mode set without TLS parameters"));
        }

        let debug = options.debug_to.take();
        let (stream, host) = connection::open_control(addr, &mut options).await?;
        let mut codec = Codec::new(stream, debug);

        if let Err(err) = codec.read_reply(Some(status::READY)).await {
            let _ = codec.send_command("QUIT").await;
            let _ = codec.shutdown().await;
            return Err(err);
        }

        if options.security == SecurityMode::Explicit {
            // The greeting was read in plain text; the same underlying
            // stream is re-wrapped, not re-dialed.
            if let Err(err) = codec.cmd(Some(status::AUTH_OK), "AUTH TLS").await {
                let _ = codec.send_command("QUIT").await;
                let _ = codec.shutdown().await;
                return Err(err);
            }
            let params = match options.tls.clone() {
                Some(params) => params,
                None => return Err(FtpError::invalid_config("explicit TLS requires TLS parameters")),
            };
            let (stream, debug) = codec.into_parts();
            let wrapped = tls::wrap(&params, stream).await?;
            codec = Codec::new(Box::new(wrapped), debug);
        }

        Ok(FtpSession {
            codec,
            host,
            features: HashMap::new(),
            skip_epsv: false,
            mlst_supported: false,
            use_pret: false,
            opts: options,
        })
    }

    /// Authenticate with USER/PASS.
    ///
    /// Returns the final reply code uninterpreted: 230 means logged in, 331
    /// was answered with PASS and that reply's code is returned, and any
    /// other code is handed back for the caller to branch on — some servers
    /// implement non-standard login flows.
    pub async fn auth(&mut self, user: &str, password: &str) -> FtpResult<u16> {
        let reply = self.codec.cmd(None, &format!("USER {}", user)).await?;
        match reply.code {
            status::LOGGED_IN => Ok(reply.code),
            status::USER_OK => {
                let reply = self.codec.cmd(None, &format!("PASS {}", password)).await?;
                Ok(reply.code)
            }
            other => Ok(other),
        }
    }

    /// Post-authentication setup: FEAT probing, binary mode, UTF-8
    /// negotiation, and PBSZ/PROT when data channels are to be encrypted.
    ///
    /// Callers invoke this once after a successful [`auth`](Self::auth).
    pub async fn after_auth(&mut self) -> FtpResult<()> {
        self.feat().await?;
        if self.features.contains_key("MLST") && !self.opts.disable_mlsd {
            self.mlst_supported = true;
        }
        if self.features.contains_key("PRET") {
            self.use_pret = true;
        }
        log::debug!(
            "negotiated: mlst={} pret={} features={}",
            self.mlst_supported,
            self.use_pret,
            self.features.len()
        );

        self.codec.cmd(Some(status::COMMAND_OK), "TYPE I").await?;

        if !self.opts.disable_utf8 {
            self.set_utf8().await?;
        }

        if self.opts.tls.is_some() {
            self.codec.cmd(Some(status::COMMAND_OK), "PBSZ 0").await?;
            self.codec.cmd(Some(status::COMMAND_OK), "PROT P").await?;
        }

        Ok(())
    }

    /// Issue FEAT (RFC 2389) and record advertised extensions.
    ///
    /// A non-211 reply means the server has no FEAT support; that is not an
    /// error, the feature table just stays empty.
    async fn feat(&mut self) -> FtpResult<()> {
        let reply = self.codec.cmd(None, "FEAT").await?;
        if reply.code != status::SYSTEM_STATUS {
            return Ok(());
        }
        for line in reply.message.lines() {
            // Feature lines are the continuation lines with one leading space.
            if !line.starts_with(' ') {
                continue;
            }
            let line = line.trim();
            let mut parts = line.splitn(2, ' ');
            if let Some(keyword) = parts.next() {
                self.features
                    .insert(keyword.to_string(), parts.next().unwrap_or("").to_string());
            }
        }
        Ok(())
    }

    /// Issue "OPTS UTF8 ON" when UTF8 is advertised.
    ///
    /// Codes 501 and 504 are tolerated (servers that do not support the
    /// option), as is 202 (filezilla-server answers "UTF8 mode is always
    /// enabled" to it). Any other non-200 code is surfaced with the
    /// server's message text.
    async fn set_utf8(&mut self) -> FtpResult<()> {
        if !self.features.contains_key("UTF8") {
            return Ok(());
        }
        let reply = self.codec.cmd(None, "OPTS UTF8 ON").await?;
        match reply.code {
            status::COMMAND_OK
            | status::COMMAND_SUPERFLUOUS
            | status::BAD_ARGUMENTS
            | status::BAD_PARAMETER => Ok(()),
            _ => Err(FtpError::protocol_error(reply.message)),
        }
    }

    /// Advertised parameter string for an extension keyword, if present.
    pub fn feature(&self, keyword: &str) -> Option<&str> {
        self.features.get(keyword).map(String::as_str)
    }

    /// The full feature table populated by FEAT.
    pub fn features(&self) -> &HashMap<String, String> {
        &self.features
    }

    /// Send NOOP, typically to keep an idle control connection alive.
    pub async fn noop(&mut self) -> FtpResult<()> {
        self.codec.cmd(Some(status::COMMAND_OK), "NOOP").await?;
        Ok(())
    }

    /// Issue REIN to log out the current user while keeping the connection.
    pub async fn logout(&mut self) -> FtpResult<()> {
        self.codec.cmd(Some(status::READY), "REIN").await?;
        Ok(())
    }

    /// Send QUIT and close the control connection. Consumes the session.
    pub async fn quit(mut self) -> FtpResult<()> {
        let quit_err = self.codec.send_command("QUIT").await.err();
        let close_err = self.codec.shutdown().await.err();
        match (quit_err, close_err) {
            (Some(quit), Some(close)) => Err(FtpError::io_error(format!(
                "error while quitting: {}: {}",
                quit, close
            ))),
            (Some(quit), None) => Err(quit),
            (None, Some(close)) => Err(close),
            (None, None) => Ok(()),
        }
    }

    /// Start a depth-first traversal rooted at `root`.
    pub fn walk(&mut self, root: &str) -> Walker<'_> {
        Walker::new(self, root)
    }
}
