//! Passive data channels and the transfer lifecycle.
//!
//! Every transfer follows the same shape: negotiate a port (EPSV with
//! sticky PASV fallback), dial the data connection, optionally announce a
//! resume offset with REST, send the transfer command, and — whatever
//! happened in between — reconcile with the control channel by reading the
//! 226 acknowledgment exactly once. Skipping that read leaves stale reply
//! bytes that corrupt the next command's reply parsing.

use crate::client::FtpSession;
use crate::connection::{self, BoxStream};
use crate::error::{FtpError, FtpResult};
use crate::parser::{self, ParseFunc};
use crate::status;
use crate::tls;
use crate::types::Entry;
use chrono::Utc;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};

/// A raw data channel: plain or TLS-wrapped, no inherent framing. The
/// consumer defines the protocol above it — raw bytes for RETR/STOR/APPE,
/// lines for LIST/NLST/MLSD.
pub(crate) enum DataConn {
    Plain(BoxStream),
    Tls(tokio_rustls::client::TlsStream<BoxStream>),
}

impl DataConn {
    /// Force completion of any pending security handshake records.
    ///
    /// ProFTPD rejects an empty upload over TLS when no write ever touched
    /// the channel ("Unable to build data connection: Operation not
    /// permitted"), so the zero-byte store path calls this before closing.
    pub(crate) async fn complete_handshake(&mut self) -> FtpResult<()> {
        match self {
            DataConn::Plain(_) => Ok(()),
            DataConn::Tls(stream) => {
                stream.flush().await?;
                Ok(())
            }
        }
    }
}

impl AsyncRead for DataConn {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            DataConn::Plain(s) => Pin::new(s).poll_read(cx, buf),
            DataConn::Tls(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for DataConn {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            DataConn::Plain(s) => Pin::new(s).poll_write(cx, buf),
            DataConn::Tls(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            DataConn::Plain(s) => Pin::new(s).poll_flush(cx),
            DataConn::Tls(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            DataConn::Plain(s) => Pin::new(s).poll_shutdown(cx),
            DataConn::Tls(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

// ─── Port negotiation ────────────────────────────────────────────────

impl FtpSession {
    /// Issue EPSV (RFC 2428) and parse the port from `(|||port|)`.
    async fn epsv(&mut self) -> FtpResult<u16> {
        let reply = self
            .codec
            .cmd(Some(status::EXTENDED_PASSIVE_MODE), "EPSV")
            .await?;
        parse_epsv(&reply.message)
    }

    /// Issue PASV and parse host and port from `(h1,h2,h3,h4,p1,p2)`.
    async fn pasv(&mut self) -> FtpResult<(String, u16)> {
        let reply = self.codec.cmd(Some(status::PASSIVE_MODE), "PASV").await?;
        parse_pasv(&reply.message)
    }

    /// Negotiate a host and port for one data connection.
    ///
    /// EPSV is tried first unless disabled or it already failed once on this
    /// session; a single failure disables it for the session's remaining
    /// life. EPSV replies carry no host, so the session's resolved host is
    /// reused.
    async fn get_data_conn_port(&mut self) -> FtpResult<(String, u16)> {
        if !self.opts.disable_epsv && !self.skip_epsv {
            match self.epsv().await {
                Ok(port) => return Ok((self.host.clone(), port)),
                Err(err) => {
                    log::debug!("EPSV failed ({}), using PASV from now on", err);
                    self.skip_epsv = true;
                }
            }
        }
        self.pasv().await
    }

    /// Dial the negotiated data endpoint: custom dial function first, then
    /// a TLS-wrapping dial when TLS parameters are configured, else plain.
    async fn open_data_conn(&mut self) -> FtpResult<DataConn> {
        let (host, port) = self.get_data_conn_port().await?;
        let addr = connection::join_host_port(&host, port);

        if let Some(dial) = self.opts.dial_fn.clone() {
            let stream = dial(addr.clone())
                .await
                .map_err(|e| FtpError::data_channel(format!("data connect to {}: {}", addr, e)))?;
            return Ok(DataConn::Plain(stream));
        }

        let tcp = connection::dial_tcp(&addr, self.opts.timeout).await?;
        let stream: BoxStream = Box::new(tcp);
        match self.opts.tls.as_ref() {
            Some(params) => Ok(DataConn::Tls(tls::wrap(params, stream).await?)),
            None => Ok(DataConn::Plain(stream)),
        }
    }

    /// Run the full pre-transfer sequence for `command` and return the open
    /// data channel.
    ///
    /// PRET, when advertised, is sent with the same command text; its reply
    /// code is deliberately not checked — PRET is advisory pre-validation,
    /// and servers answer it with a variety of codes. A nonzero `offset`
    /// issues REST expecting 350. The transfer command itself must be
    /// answered with 125 or 150; on any failure after the data channel was
    /// dialed, the channel is closed before the error propagates.
    pub(crate) async fn cmd_data_conn_from(
        &mut self,
        offset: u64,
        command: &str,
    ) -> FtpResult<DataConn> {
        if self.use_pret {
            self.codec.cmd(None, &format!("PRET {}", command)).await?;
        }

        let mut conn = self.open_data_conn().await?;

        if offset != 0 {
            if let Err(err) = self
                .codec
                .cmd(Some(status::FILE_PENDING), &format!("REST {}", offset))
                .await
            {
                let _ = conn.shutdown().await;
                return Err(err);
            }
        }

        if let Err(err) = self.codec.send_command(command).await {
            let _ = conn.shutdown().await;
            return Err(err);
        }
        let reply = match self.codec.read_reply(None).await {
            Ok(reply) => reply,
            Err(err) => {
                let _ = conn.shutdown().await;
                return Err(err);
            }
        };
        if reply.code != status::ALREADY_OPEN && reply.code != status::ABOUT_TO_SEND {
            let _ = conn.shutdown().await;
            return Err(FtpError::from_reply(reply.code, &reply.message));
        }

        Ok(conn)
    }

    /// Close a data channel consumed internally and read the 226
    /// acknowledgment. A reply-read error takes precedence over a close
    /// error.
    async fn finish_data_read(&mut self, mut conn: DataConn) -> FtpResult<()> {
        let close_err = conn.shutdown().await.err().map(FtpError::from);
        drop(conn);
        match self
            .codec
            .read_reply(Some(status::CLOSING_DATA_CONNECTION))
            .await
        {
            Err(err) => Err(err),
            Ok(_) => match close_err {
                Some(err) => Err(err),
                None => Ok(()),
            },
        }
    }

    // ─── Listings ────────────────────────────────────────────────

    /// Directory listing. Uses MLSD with the RFC 3659 parser when MLST was
    /// negotiated, LIST with the unix/windows parser otherwise. Lines the
    /// parser cannot understand are skipped, as servers interleave free-form
    /// text with entries.
    pub async fn list(&mut self, path: &str) -> FtpResult<Vec<Entry>> {
        let (command, parse): (String, ParseFunc) = if self.mlst_supported {
            (join_cmd("MLSD", path), parser::parse_mlsd_line)
        } else {
            (join_cmd("LIST", path), parser::parse_list_line)
        };
        let now = Utc::now();
        let location = self.opts.location;

        let conn = self.cmd_data_conn_from(0, &command).await?;
        let mut lines = BufReader::new(conn);
        let mut entries = Vec::new();
        let mut scan_err: Option<FtpError> = None;
        loop {
            let mut raw = Vec::new();
            match lines.read_until(b'\n', &mut raw).await {
                Ok(0) => break,
                Ok(_) => {
                    // Non-UTF-8 filenames (Latin-1 servers) only mangle
                    // their own entry, never the whole listing.
                    let line = String::from_utf8_lossy(&raw);
                    let line = line.trim_end_matches(['\r', '\n']);
                    if line.is_empty() {
                        continue;
                    }
                    if let Ok(entry) = parse(line, now, location) {
                        entries.push(entry);
                    }
                }
                Err(err) => {
                    scan_err = Some(FtpError::from(err));
                    break;
                }
            }
        }

        let close_err = self.finish_data_read(lines.into_inner()).await.err();
        match scan_err.or(close_err) {
            Some(err) => Err(err),
            None => Ok(entries),
        }
    }

    /// Name-only listing (NLST): one raw name per line.
    pub async fn name_list(&mut self, path: &str) -> FtpResult<Vec<String>> {
        let command = join_cmd("NLST", path);
        let conn = self.cmd_data_conn_from(0, &command).await?;
        let mut lines = BufReader::new(conn);
        let mut names = Vec::new();
        let mut scan_err: Option<FtpError> = None;
        loop {
            let mut raw = Vec::new();
            match lines.read_until(b'\n', &mut raw).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&raw);
                    let line = line.trim_end_matches(['\r', '\n']);
                    if !line.is_empty() {
                        names.push(line.to_string());
                    }
                }
                Err(err) => {
                    scan_err = Some(FtpError::from(err));
                    break;
                }
            }
        }

        let close_err = self.finish_data_read(lines.into_inner()).await.err();
        match scan_err.or(close_err) {
            Some(err) => Err(err),
            None => Ok(names),
        }
    }

    // ─── Downloads ───────────────────────────────────────────────

    /// Fetch a remote file (RETR). The returned [`DataStream`] must be
    /// closed to reconcile the control channel.
    pub async fn retr(&mut self, path: &str) -> FtpResult<DataStream<'_>> {
        self.retr_from(path, 0).await
    }

    /// Fetch a remote file starting at `offset` (REST + RETR). The server
    /// skips the first `offset` bytes.
    pub async fn retr_from(&mut self, path: &str, offset: u64) -> FtpResult<DataStream<'_>> {
        let conn = self
            .cmd_data_conn_from(offset, &format!("RETR {}", path))
            .await?;
        Ok(DataStream {
            conn,
            session: self,
            closed: false,
        })
    }

    // ─── Uploads ─────────────────────────────────────────────────

    /// Store `src` as a remote file (STOR). Returns the number of bytes
    /// written.
    pub async fn stor<R>(&mut self, path: &str, src: &mut R) -> FtpResult<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.stor_from(path, src, 0).await
    }

    /// Store `src` starting at `offset` on the server (REST + STOR).
    ///
    /// If the copy fails, the 226 acknowledgment is still read: otherwise a
    /// server-side rejection (for example a quota denial) would leave its
    /// reply queued and desynchronize the session. When both fail, the
    /// reply-read error is surfaced.
    pub async fn stor_from<R>(&mut self, path: &str, src: &mut R, offset: u64) -> FtpResult<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let conn = self
            .cmd_data_conn_from(offset, &format!("STOR {}", path))
            .await?;
        self.copy_out(conn, src, true).await
    }

    /// Append `src` to a remote file (APPE), creating it if absent.
    pub async fn append<R>(&mut self, path: &str, src: &mut R) -> FtpResult<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let conn = self.cmd_data_conn_from(0, &format!("APPE {}", path)).await?;
        self.copy_out(conn, src, false).await
    }

    async fn copy_out<R>(
        &mut self,
        mut conn: DataConn,
        src: &mut R,
        force_handshake: bool,
    ) -> FtpResult<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let (written, mut err) = match tokio::io::copy(src, &mut conn).await {
            Ok(n) => (n, None),
            Err(e) => (0, Some(FtpError::from(e))),
        };

        // A TLS handshake is only driven by traffic; an empty upload never
        // wrote, so push it to completion before the close.
        if force_handshake && written == 0 && err.is_none() {
            err = conn.complete_handshake().await.err();
        }

        let close_err = conn.shutdown().await.err().map(FtpError::from);
        if err.is_none() {
            err = close_err;
        }

        if let Err(reply_err) = self
            .codec
            .read_reply(Some(status::CLOSING_DATA_CONNECTION))
            .await
        {
            err = Some(reply_err);
        }

        match err {
            Some(err) => Err(err),
            None => Ok(written),
        }
    }
}

// ─── The caller-facing data stream ───────────────────────────────────

/// One open data-channel transfer, readable via [`AsyncRead`].
///
/// The stream mutably borrows its session, so no other command can be
/// issued until it is closed. [`close`](Self::close) must be called to read
/// the transfer acknowledgment — also when abandoning the transfer early.
pub struct DataStream<'a> {
    conn: DataConn,
    session: &'a mut FtpSession,
    closed: bool,
}

impl DataStream<'_> {
    /// Close the data channel and read the 226 acknowledgment.
    ///
    /// Idempotent: after the first call, further calls do nothing and
    /// return `Ok`. The acknowledgment is read exactly once, here rather
    /// than at stream exhaustion, since a transfer may be abandoned early.
    pub async fn close(&mut self) -> FtpResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let close_err = self.conn.shutdown().await.err().map(FtpError::from);
        match self
            .session
            .codec
            .read_reply(Some(status::CLOSING_DATA_CONNECTION))
            .await
        {
            Err(err) => Err(err),
            Ok(_) => match close_err {
                Some(err) => Err(err),
                None => Ok(()),
            },
        }
    }
}

impl AsyncRead for DataStream<'_> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().conn).poll_read(cx, buf)
    }
}

// ─── Reply parsing ───────────────────────────────────────────────────

/// Port from an EPSV reply: the integer between `|||` and the final `|`.
fn parse_epsv(message: &str) -> FtpResult<u16> {
    let start = message.find("|||");
    let end = message.rfind('|');
    if let (Some(start), Some(end)) = (start, end) {
        if end > start + 2 {
            return message[start + 3..end].parse::<u16>().map_err(|_| {
                FtpError::protocol_error(format!("invalid EPSV reply: {}", message))
            });
        }
    }
    Err(FtpError::protocol_error(format!("invalid EPSV reply: {}", message)))
}

/// Host and port from a PASV reply: the `(h1,h2,h3,h4,p1,p2)` sextet.
fn parse_pasv(message: &str) -> FtpResult<(String, u16)> {
    let invalid = || FtpError::protocol_error(format!("invalid PASV reply: {}", message));

    let start = message.find('(').ok_or_else(invalid)?;
    let end = message.rfind(')').ok_or_else(invalid)?;
    if end <= start {
        return Err(invalid());
    }

    let fields: Vec<&str> = message[start + 1..end].split(',').collect();
    if fields.len() < 6 {
        return Err(invalid());
    }

    // Each field is one byte of the dotted quad or the port pair, so the
    // host string and the port arithmetic are well-formed by construction.
    let mut octets = [0u8; 6];
    for (slot, field) in octets.iter_mut().zip(&fields) {
        *slot = field.trim().parse().map_err(|_| invalid())?;
    }

    let host = format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3]);
    let port = u16::from(octets[4]) * 256 + u16::from(octets[5]);
    Ok((host, port))
}

fn join_cmd(verb: &str, path: &str) -> String {
    if path.is_empty() {
        verb.to_string()
    } else {
        format!("{} {}", verb, path)
    }
}
