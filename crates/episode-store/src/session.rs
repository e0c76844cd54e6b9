//! Storage sessions

use crate::{Episode, Result, StoreError};
use tracing::{debug, warn};

/// Unit of work over a durable store.
///
/// `add` stages an episode with everything it owns, `commit` persists all
/// staged episodes in one all-or-nothing step. Staged but uncommitted
/// episodes are dropped by `close`.
pub trait Session {
    fn add(&mut self, episode: Episode) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

impl<S: Session + ?Sized> Session for Box<S> {
    fn add(&mut self, episode: Episode) -> Result<()> {
        (**self).add(episode)
    }

    fn commit(&mut self) -> Result<()> {
        (**self).commit()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Session that keeps committed episodes in memory (tests, dry runs)
#[derive(Debug, Default)]
pub struct MemorySession {
    staged: Vec<Episode>,
    committed: Vec<Episode>,
    commits: usize,
    closed: bool,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed(&self) -> &[Episode] {
        &self.committed
    }

    pub fn staged(&self) -> &[Episode] {
        &self.staged
    }

    /// Number of `commit` calls that persisted at least one episode
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Session for MemorySession {
    fn add(&mut self, episode: Episode) -> Result<()> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        self.staged.push(episode);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        if self.staged.is_empty() {
            return Ok(());
        }
        debug!("Committing {} staged episode(s) in memory", self.staged.len());
        self.committed.append(&mut self.staged);
        self.commits += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.staged.is_empty() {
            warn!("Dropping {} uncommitted episode(s)", self.staged.len());
            self.staged.clear();
        }
        self.closed = true;
        Ok(())
    }
}
