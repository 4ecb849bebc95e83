//! Low-level FTP command/reply codec (RFC 959 §4).
//!
//! One outstanding command at a time: every `send_command` must be paired
//! with exactly one `read_reply` before the next command is sent, or the
//! control channel desynchronizes permanently.

use crate::connection::BoxStream;
use crate::error::{FtpError, FtpResult};
use crate::types::{DebugSink, Reply};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// The control-channel codec. `BufReader` passes writes through to the
/// underlying stream, so a single handle serves both directions.
pub(crate) struct Codec {
    stream: BufReader<BoxStream>,
    debug: Option<DebugSink>,
}

impl Codec {
    pub(crate) fn new(stream: BoxStream, debug: Option<DebugSink>) -> Self {
        Self {
            stream: BufReader::new(stream),
            debug,
        }
    }

    /// Tear the codec apart for a transport-level TLS re-wrap. Any buffered
    /// read data is discarded; callers must only do this at a point where no
    /// reply bytes can be in flight.
    pub(crate) fn into_parts(self) -> (BoxStream, Option<DebugSink>) {
        (self.stream.into_inner(), self.debug)
    }

    /// Send one command line; the CRLF terminator is appended here.
    pub(crate) async fn send_command(&mut self, cmd: &str) -> FtpResult<()> {
        let line = format!("{}\r\n", cmd);
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.flush().await?;
        if let Some(sink) = self.debug.as_mut() {
            let _ = sink.write_all(line.as_bytes());
        }
        log::trace!(">>> {}", cmd);
        Ok(())
    }

    async fn read_line_raw(&mut self) -> FtpResult<String> {
        let mut buf = String::new();
        let n = self.stream.read_line(&mut buf).await?;
        if n == 0 {
            return Err(FtpError::disconnected("server closed the control connection"));
        }
        if let Some(sink) = self.debug.as_mut() {
            let _ = sink.write_all(buf.as_bytes());
        }
        Ok(buf.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Read one complete reply, aggregating multi-line form:
    ///
    /// ```text
    /// 211-Features:
    ///  MLST type*;size*;modify*;
    ///  UTF8
    /// 211 End
    /// ```
    ///
    /// Continuation lines are kept verbatim (leading whitespace intact) so
    /// FEAT parsing can distinguish them. With `expected` set, a code
    /// mismatch fails with a protocol error carrying the code and message.
    pub(crate) async fn read_reply(&mut self, expected: Option<u16>) -> FtpResult<Reply> {
        let first = self.read_line_raw().await?;
        if first.len() < 3 {
            return Err(FtpError::protocol_error(format!("reply too short: '{}'", first)));
        }
        let code = parse_code(&first)?;

        let mut message = String::new();
        if first.as_bytes().get(3) == Some(&b'-') {
            message.push_str(first.get(4..).unwrap_or(""));
            let terminator = format!("{} ", code);
            loop {
                let line = self.read_line_raw().await?;
                message.push('\n');
                if line.starts_with(&terminator) {
                    message.push_str(line.get(4..).unwrap_or(""));
                    break;
                }
                message.push_str(&line);
            }
        } else {
            message.push_str(first.get(4..).unwrap_or(""));
        }

        log::trace!("<<< {} {}", code, message.lines().next().unwrap_or(""));

        if let Some(want) = expected {
            if code != want {
                return Err(FtpError::from_reply(code, &message));
            }
        }
        Ok(Reply { code, message })
    }

    /// Send a command and read its reply.
    pub(crate) async fn cmd(&mut self, expected: Option<u16>, line: &str) -> FtpResult<Reply> {
        self.send_command(line).await?;
        self.read_reply(expected).await
    }

    /// Flush and shut down the underlying stream.
    pub(crate) async fn shutdown(&mut self) -> FtpResult<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

fn parse_code(line: &str) -> FtpResult<u16> {
    line.get(..3)
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| FtpError::protocol_error(format!("invalid reply code in: '{}'", line)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FtpErrorKind;
    use tokio_test::io::Builder;

    fn codec(mock: tokio_test::io::Mock) -> Codec {
        Codec::new(Box::new(mock), None)
    }

    #[tokio::test]
    async fn single_line_reply() {
        let mut c = codec(Builder::new().read(b"220 Service ready\r\n").build());
        let reply = c.read_reply(None).await.unwrap();
        assert_eq!(reply.code, 220);
        assert_eq!(reply.message, "Service ready");
    }

    #[tokio::test]
    async fn bare_code_reply() {
        let mut c = codec(Builder::new().read(b"226\r\n").build());
        let reply = c.read_reply(Some(226)).await.unwrap();
        assert_eq!(reply.message, "");
    }

    #[tokio::test]
    async fn multi_line_reply_keeps_continuations() {
        let mut c = codec(
            Builder::new()
                .read(b"211-Features:\r\n MLST type*;size*;\r\n UTF8\r\n211 End\r\n")
                .build(),
        );
        let reply = c.read_reply(Some(211)).await.unwrap();
        assert_eq!(reply.code, 211);
        let lines: Vec<&str> = reply.message.lines().collect();
        assert_eq!(lines, vec!["Features:", " MLST type*;size*;", " UTF8", "End"]);
    }

    #[tokio::test]
    async fn code_mismatch_is_protocol_error() {
        let mut c = codec(Builder::new().read(b"550 No such file\r\n").build());
        let err = c.read_reply(Some(226)).await.unwrap_err();
        assert_eq!(err.code, Some(550));
        assert!(err.message.contains("No such file"));
    }

    #[tokio::test]
    async fn multibyte_garbage_in_code_is_protocol_error() {
        // The third byte lands inside a multi-byte character.
        let mut c = codec(Builder::new().read("22é0 weird\r\n".as_bytes()).build());
        let err = c.read_reply(None).await.unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::ProtocolError);
    }

    #[tokio::test]
    async fn short_reply_is_error() {
        let mut c = codec(Builder::new().read(b"xy\r\n").build());
        let err = c.read_reply(None).await.unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::ProtocolError);
    }

    #[tokio::test]
    async fn command_is_crlf_terminated() {
        let mut c = codec(Builder::new().write(b"NOOP\r\n").read(b"200 OK\r\n").build());
        let reply = c.cmd(Some(200), "NOOP").await.unwrap();
        assert_eq!(reply.code, 200);
    }
}
