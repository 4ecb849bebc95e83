//! Directory and file-path operations on the control channel.

use crate::client::FtpSession;
use crate::error::{FtpError, FtpResult};
use crate::status;
use crate::types::EntryKind;

impl FtpSession {
    /// Change the current directory (CWD).
    pub async fn cwd(&mut self, path: &str) -> FtpResult<()> {
        self.codec
            .cmd(Some(status::FILE_ACTION_OK), &format!("CWD {}", path))
            .await?;
        Ok(())
    }

    /// Change to the parent directory (CDUP).
    pub async fn cdup(&mut self) -> FtpResult<()> {
        self.codec.cmd(Some(status::FILE_ACTION_OK), "CDUP").await?;
        Ok(())
    }

    /// Current working directory (PWD), extracted from the quoted 257 reply.
    pub async fn pwd(&mut self) -> FtpResult<String> {
        let reply = self.codec.cmd(Some(status::PATH_CREATED), "PWD").await?;
        quoted_path(&reply.message).ok_or_else(|| {
            FtpError::protocol_error(format!("cannot parse PWD reply: {}", reply.message))
        })
    }

    /// Create a directory (MKD) and return the created path from the quoted
    /// 257 reply.
    pub async fn mkdir(&mut self, path: &str) -> FtpResult<String> {
        let reply = self
            .codec
            .cmd(Some(status::PATH_CREATED), &format!("MKD {}", path))
            .await?;
        quoted_path(&reply.message).ok_or_else(|| {
            FtpError::protocol_error(format!("cannot parse MKD reply: {}", reply.message))
        })
    }

    /// Remove an empty directory (RMD).
    pub async fn rmdir(&mut self, path: &str) -> FtpResult<()> {
        self.codec
            .cmd(Some(status::FILE_ACTION_OK), &format!("RMD {}", path))
            .await?;
        Ok(())
    }

    /// Rename or move a file or directory (RNFR + RNTO).
    pub async fn rename(&mut self, from: &str, to: &str) -> FtpResult<()> {
        self.codec
            .cmd(Some(status::FILE_PENDING), &format!("RNFR {}", from))
            .await?;
        self.codec
            .cmd(Some(status::FILE_ACTION_OK), &format!("RNTO {}", to))
            .await?;
        Ok(())
    }

    /// Delete a remote file (DELE).
    pub async fn delete(&mut self, path: &str) -> FtpResult<()> {
        self.codec
            .cmd(Some(status::FILE_ACTION_OK), &format!("DELE {}", path))
            .await?;
        Ok(())
    }

    /// Size of a remote file in bytes (RFC 3659 SIZE).
    pub async fn size(&mut self, path: &str) -> FtpResult<u64> {
        let reply = self
            .codec
            .cmd(Some(status::FILE_STATUS), &format!("SIZE {}", path))
            .await?;
        reply.message.trim().parse::<u64>().map_err(|_| {
            FtpError::protocol_error(format!("cannot parse SIZE reply: {}", reply.message))
        })
    }

    /// Recursively remove a directory: enter it, delete every file entry,
    /// recurse into every subdirectory, then remove the emptied directory
    /// and return to the parent.
    ///
    /// The first failure aborts the whole operation; partially deleted
    /// content is not cleaned up.
    pub async fn rmdir_recursive(&mut self, path: &str) -> FtpResult<()> {
        self.cwd(path).await?;
        let current = self.pwd().await?;
        let entries = self.list(&current).await?;
        for entry in entries {
            if entry.name == "." || entry.name == ".." {
                continue;
            }
            match entry.kind {
                EntryKind::Folder => {
                    let child = format!("{}/{}", current, entry.name);
                    Box::pin(self.rmdir_recursive(&child)).await?;
                }
                _ => self.delete(&entry.name).await?,
            }
        }
        self.cdup().await?;
        self.rmdir(&current).await
    }
}

/// Text between the first and last double quote of a 257 reply.
fn quoted_path(message: &str) -> Option<String> {
    let start = message.find('"')?;
    let end = message.rfind('"')?;
    if end <= start {
        return None;
    }
    Some(message[start + 1..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_path_extracts() {
        assert_eq!(quoted_path(r#""/a/b" created"#).as_deref(), Some("/a/b"));
        assert_eq!(
            quoted_path(r#"257 "/with ""quotes""" ok"#).as_deref(),
            Some(r#"/with ""quotes"""#)
        );
    }

    #[test]
    fn quoted_path_requires_two_quotes() {
        assert_eq!(quoted_path("no quotes here"), None);
        assert_eq!(quoted_path(r#"only "one"#), None);
    }
}
