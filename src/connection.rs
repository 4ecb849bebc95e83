//! Control-connection establishment.
//!
//! Exactly one stream source is used, in priority order: a caller-supplied
//! stream, a caller-supplied dial function, a TLS-wrapping dial (implicit
//! FTPS), or a plain TCP dial with the configured timeout.

use crate::error::{FtpError, FtpResult};
use crate::tls;
use crate::types::{DialOptions, SecurityMode};
use futures::future::BoxFuture;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Any bidirectional byte stream usable as a control or data channel.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

/// Boxed transport with no inherent framing.
pub type BoxStream = Box<dyn AsyncStream>;

/// Custom dial function, invoked with a `host:port` address. When set it
/// overrides the default TCP dial for both control and data connections.
pub type DialFunc =
    Arc<dyn Fn(String) -> BoxFuture<'static, io::Result<BoxStream>> + Send + Sync>;

/// Acquire the control stream and the host identity later reused for
/// data-channel addressing.
///
/// The peer IP is resolved from the socket for TCP dials; for
/// caller-supplied streams and dial functions the host portion of `addr` is
/// used, since a boxed stream exposes no peer address.
pub(crate) async fn open_control(
    addr: &str,
    opts: &mut DialOptions,
) -> FtpResult<(BoxStream, String)> {
    if let Some(stream) = opts.stream.take() {
        return Ok((stream, host_of(addr)));
    }

    if let Some(dial) = opts.dial_fn.clone() {
        let stream = dial(addr.to_string())
            .await
            .map_err(|e| FtpError::connection_failed(format!("dial {}: {}", addr, e)))?;
        return Ok((stream, host_of(addr)));
    }

    let tcp = dial_tcp(addr, opts.timeout).await?;
    let host = tcp
        .peer_addr()
        .map(|a| a.ip().to_string())
        .unwrap_or_else(|_| host_of(addr));
    tcp.set_nodelay(true).ok();

    if opts.security == SecurityMode::Implicit {
        let params = opts
            .tls
            .as_ref()
            .ok_or_else(|| FtpError::invalid_config("implicit TLS requires TLS parameters"))?;
        let wrapped = tls::wrap(params, Box::new(tcp) as BoxStream).await?;
        return Ok((Box::new(wrapped), host));
    }

    Ok((Box::new(tcp), host))
}

/// Plain TCP dial with an optional time limit.
pub(crate) async fn dial_tcp(addr: &str, limit: Option<Duration>) -> FtpResult<TcpStream> {
    let connect = TcpStream::connect(addr);
    let tcp = match limit {
        Some(duration) => timeout(duration, connect)
            .await
            .map_err(|_| FtpError::timeout(format!("connect to {} timed out", addr)))?,
        None => connect.await,
    };
    tcp.map_err(|e| FtpError::connection_failed(format!("connect to {}: {}", addr, e)))
}

/// Host portion of a `host:port` address, with IPv6 brackets stripped.
fn host_of(addr: &str) -> String {
    if let Some(rest) = addr.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return rest[..end].to_string();
        }
    }
    match addr.rsplit_once(':') {
        Some((host, _)) => host.to_string(),
        None => addr.to_string(),
    }
}

/// Join a host and port back into a dialable address.
pub(crate) fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_of_plain() {
        assert_eq!(host_of("ftp.example.com:21"), "ftp.example.com");
        assert_eq!(host_of("10.0.0.1:2121"), "10.0.0.1");
    }

    #[test]
    fn host_of_ipv6() {
        assert_eq!(host_of("[::1]:21"), "::1");
    }

    #[test]
    fn join_ipv6() {
        assert_eq!(join_host_port("::1", 4051), "[::1]:4051");
        assert_eq!(join_host_port("192.168.1.1", 4051), "192.168.1.1:4051");
    }
}
