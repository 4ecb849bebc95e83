//! Depth-first traversal of a remote directory tree.
//!
//! Modeled as a pull-based cursor rather than an iterator: each step may
//! perform network I/O and fail, and the caller can prune subtrees
//! mid-walk. The usage pattern is:
//!
//! ```no_run
//! # use ftpkit::{FtpResult, FtpSession};
//! # async fn demo(session: &mut FtpSession) -> FtpResult<()> {
//! let mut walker = session.walk("/pub");
//! while walker.next().await {
//!     println!("{}", walker.path());
//! }
//! if let Some(err) = walker.take_err() {
//!     return Err(err);
//! }
//! # Ok(())
//! # }
//! ```

use crate::client::FtpSession;
use crate::error::FtpError;
use crate::types::{Entry, EntryKind};
use chrono::Utc;

struct WalkItem {
    path: String,
    entry: Entry,
}

/// A cursor over a depth-first traversal. Borrows the session mutably, so
/// no other command can run while a walk is in progress.
pub struct Walker<'a> {
    session: &'a mut FtpSession,
    root: String,
    cur: Option<WalkItem>,
    stack: Vec<WalkItem>,
    /// Whether to list the current item's children before advancing. Unset
    /// for the initial step and after [`skip_dir`](Self::skip_dir).
    descend: bool,
    err: Option<FtpError>,
    started: bool,
}

impl<'a> Walker<'a> {
    pub(crate) fn new(session: &'a mut FtpSession, root: &str) -> Self {
        let root = if root.is_empty() {
            "/".to_string()
        } else {
            root.trim_end_matches('/').to_string()
        };
        let root = if root.is_empty() { "/".to_string() } else { root };
        Walker {
            session,
            root,
            cur: None,
            stack: Vec::new(),
            descend: false,
            err: None,
            started: false,
        }
    }

    /// Advance to the next item. Returns `false` when the walk is finished
    /// or a listing failed; check [`take_err`](Self::take_err) afterwards to
    /// tell the two apart.
    pub async fn next(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }

        if !self.started {
            self.started = true;
            let name = self
                .root
                .rsplit('/')
                .next()
                .filter(|s| !s.is_empty())
                .unwrap_or("/")
                .to_string();
            self.cur = Some(WalkItem {
                path: self.root.clone(),
                entry: Entry {
                    name,
                    target: None,
                    kind: EntryKind::Folder,
                    size: 0,
                    modified: Some(Utc::now()),
                },
            });
            self.descend = true;
            return true;
        }

        if self.descend {
            if let Some(cur) = self.cur.as_ref() {
                if cur.entry.kind == EntryKind::Folder {
                    let dir = cur.path.clone();
                    match self.session.list(&dir).await {
                        Ok(entries) => {
                            // Reversed so children pop in listing order.
                            for entry in entries.into_iter().rev() {
                                if entry.name == "." || entry.name == ".." {
                                    continue;
                                }
                                self.stack.push(WalkItem {
                                    path: join_path(&dir, &entry.name),
                                    entry,
                                });
                            }
                        }
                        Err(err) => {
                            self.err = Some(err);
                            return false;
                        }
                    }
                }
            }
        }
        self.descend = true;

        match self.stack.pop() {
            Some(item) => {
                self.cur = Some(item);
                true
            }
            None => {
                self.cur = None;
                false
            }
        }
    }

    /// Do not descend into the current directory; its siblings are still
    /// visited.
    pub fn skip_dir(&mut self) {
        self.descend = false;
    }

    /// Full remote path of the current item.
    pub fn path(&self) -> &str {
        self.cur.as_ref().map(|c| c.path.as_str()).unwrap_or("")
    }

    /// Listing entry for the current item.
    pub fn entry(&self) -> Option<&Entry> {
        self.cur.as_ref().map(|c| &c.entry)
    }

    /// The error that stopped the walk, if any. Consumes it.
    pub fn take_err(&mut self) -> Option<FtpError> {
        self.err.take()
    }
}

fn join_path(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}
