//! # ftpkit — Async FTP/FTPS Client
//!
//! Client-side implementation of the FTP protocol (RFC 959) with extensions:
//! - **RFC 2389** — FEAT capability negotiation
//! - **RFC 2428** — EPSV extended passive mode (with sticky PASV fallback)
//! - **RFC 2228 / 4217** — AUTH TLS / FTPS (explicit & implicit)
//! - **RFC 3659** — MLSD machine-readable listings, SIZE, REST resume
//! - **PRET** — pre-transfer announcement for distributed servers
//!
//! Only passive data channels are supported; active mode (PORT/EPRT) is not.
//!
//! Architecture:
//! - `types` — public data model, dial-time options
//! - `error` — categorised FTP error type
//! - `status` — named FTP reply codes
//! - `connection` — stream acquisition (TCP, custom dialer, implicit TLS)
//! - `protocol` — low-level command/reply codec on the control channel
//! - `tls` — rustls configuration and stream wrapping
//! - `client` — `FtpSession`: connect, login, capability negotiation
//! - `directory` — CWD/PWD/MKD/RMD/RNFR+RNTO/DELE/SIZE and recursive removal
//! - `transfer` — passive data channels, RETR/STOR/APPE/LIST/NLST, `DataStream`
//! - `parser` — LIST (unix / windows) and MLSD line parsing
//! - `walker` — depth-first remote directory traversal
//!
//! ```no_run
//! use ftpkit::{DialOptions, FtpSession};
//!
//! # async fn demo() -> ftpkit::FtpResult<()> {
//! let mut session = FtpSession::connect("ftp.example.com:21", DialOptions::new()).await?;
//! session.auth("anonymous", "anonymous@").await?;
//! session.after_auth().await?;
//! for entry in session.list("/pub").await? {
//!     println!("{} ({} bytes)", entry.name, entry.size);
//! }
//! session.quit().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod connection;
pub mod error;
pub mod parser;
pub mod protocol;
pub mod status;
pub mod tls;
pub mod transfer;
pub mod types;
pub mod walker;

mod directory;

pub use client::FtpSession;
pub use connection::{BoxStream, DialFunc};
pub use error::{FtpError, FtpErrorKind, FtpResult};
pub use tls::TlsParams;
pub use transfer::DataStream;
pub use types::{DialOptions, Entry, EntryKind, Reply, SecurityMode};
pub use walker::Walker;
