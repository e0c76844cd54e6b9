//! Open-episode bookkeeping
//!
//! At most one episode is open. Opening a new one, or closing at the end of
//! input, finalizes the previous episode: it is handed to the session and
//! committed as one unit.

use crate::{IngestError, Result};
use episode_store::{Episode, EpisodeSummary, Scene, Session};
use tracing::{debug, info};

pub struct EpisodeAccumulator<S: Session> {
    session: S,
    open: Option<Episode>,
    finalized: Vec<EpisodeSummary>,
}

impl<S: Session> EpisodeAccumulator<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            open: None,
            finalized: Vec::new(),
        }
    }

    /// Finalizes the open episode, if any, then adopts `episode`
    pub fn open(&mut self, episode: Episode) -> Result<()> {
        self.finalize()?;
        debug!("Opened episode at {:?}", episode.insite_path);
        self.open = Some(episode);
        Ok(())
    }

    pub fn append(&mut self, scene: Scene) -> Result<()> {
        let episode = self.open.as_mut().ok_or(IngestError::NoOpenEpisode)?;
        episode.push_scene(scene);
        Ok(())
    }

    /// Finalizes the open episode, then closes the session; called once at end of input
    pub fn close(&mut self) -> Result<()> {
        self.finalize()?;
        self.session.close()?;
        Ok(())
    }

    /// Drops the open episode without persisting it
    pub fn discard(&mut self) -> Option<Episode> {
        self.open.take()
    }

    pub fn current(&self) -> Option<&Episode> {
        self.open.as_ref()
    }

    /// Scene index the next appended scene must carry
    pub fn expected_scene_index(&self) -> Option<usize> {
        self.open.as_ref().map(Episode::number_of_scenes)
    }

    /// Summaries of committed episodes, in commit order
    pub fn finalized(&self) -> &[EpisodeSummary] {
        &self.finalized
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    /// Commits the open episode, if any, leaving nothing open
    pub fn finalize(&mut self) -> Result<()> {
        let Some(episode) = self.open.take() else {
            return Ok(());
        };
        let summary = episode.summary();
        self.session.add(episode)?;
        self.session.commit()?;
        info!(
            "Committed episode {:?}: {} scenes, {} receivers, {} rays",
            summary.insite_path, summary.scenes, summary.receivers, summary.rays
        );
        self.finalized.push(summary);
        Ok(())
    }
}
