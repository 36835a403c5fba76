use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use crate::{Result, StoryError};

/// Host capability the interpreter queries before every play statement.
///
/// The interpreter never decodes or outputs audio. It asks whether something
/// is playing and hands play requests to the host.
pub trait PlaybackSink {
    /// Whether a clip is currently being played.
    fn is_playing(&self) -> bool;

    /// Called right after the interpreter emitted a play request.
    fn on_play_request(&mut self, _clip: &str, _volume: f32) {}
}

/// What the host's player is doing.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing { clip: String, volume: f32 },
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing { .. })
    }
}

/// Shared, thread-safe playback state.
///
/// A play request marks the state as playing; the host's audio thread calls
/// [`SharedPlayback::finish`] once the clip has completed.
#[derive(Clone, Default)]
pub struct SharedPlayback {
    state: Arc<Mutex<PlaybackState>>,
}

impl SharedPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> Result<PlaybackState> {
        let state = self.lock()?;
        Ok(state.clone())
    }

    /// Marks the current clip as finished and returns it.
    pub fn finish(&self) -> Result<Option<String>> {
        let mut state = self.lock()?;
        match std::mem::take(&mut *state) {
            PlaybackState::Playing { clip, .. } => Ok(Some(clip)),
            PlaybackState::Idle => Ok(None),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, PlaybackState>> {
        self.state
            .lock()
            .map_err(|_| StoryError::msg("playback state has been poisoned"))
    }
}

impl PlaybackSink for SharedPlayback {
    fn is_playing(&self) -> bool {
        match self.lock() {
            Ok(state) => state.is_playing(),
            Err(err) => {
                // A poisoned lock counts as busy.
                warn!(%err, "treating poisoned playback state as playing");
                true
            }
        }
    }

    fn on_play_request(&mut self, clip: &str, volume: f32) {
        match self.lock() {
            Ok(mut state) => {
                *state = PlaybackState::Playing {
                    clip: clip.to_string(),
                    volume,
                }
            }
            Err(err) => warn!(%err, clip, "could not record play request"),
        }
    }
}

impl std::fmt::Debug for SharedPlayback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedPlayback").finish()
    }
}
