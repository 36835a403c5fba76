//! Runs the statements of a triggered circle.
//!
//! Execution is a single left-to-right walk. A play statement that finds the
//! sink busy stops the walk at every level: the rest of the branch and the
//! rest of the circle are skipped, and the outcome reports
//! [`Completion::AlreadyPlaying`]. A condition that cannot be evaluated stops
//! the walk the same way with [`Completion::Failed`].

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{Coordinate, Operator, PlaybackSink, Result, Statement, StoryError, VariableStore};

/// Externally observable result of running a story.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    DisplayText { text: String },
    PlayRequest { clip: String, volume: f32 },
    EndOfStory,
    FirstFixAcquired,
    /// Closest spot that has not been triggered yet, if any.
    NearestUntriggeredSpot { spot: Option<Coordinate> },
}

impl Effect {
    pub fn display(text: impl Into<String>) -> Self {
        Self::DisplayText { text: text.into() }
    }

    pub fn play(clip: impl Into<String>, volume: f32) -> Self {
        Self::PlayRequest {
            clip: clip.into(),
            volume,
        }
    }
}

/// How a statement walk ended.
#[derive(Debug)]
pub enum Completion {
    /// Every reachable statement ran.
    Completed,
    /// A play statement found playback in progress and the walk stopped.
    AlreadyPlaying,
    /// A condition could not be evaluated and the walk stopped. Effects
    /// emitted before the failure are still part of the outcome.
    Failed(StoryError),
}

#[derive(Debug)]
pub struct InterpreterOutcome {
    pub effects: Vec<Effect>,
    pub completion: Completion,
}

impl InterpreterOutcome {
    /// Whether an end statement ran.
    pub fn reached_end(&self) -> bool {
        self.effects.contains(&Effect::EndOfStory)
    }

    pub fn was_aborted(&self) -> bool {
        matches!(self.completion, Completion::AlreadyPlaying)
    }

    /// The error that stopped the walk, if any.
    pub fn failure(&self) -> Option<&StoryError> {
        match &self.completion {
            Completion::Failed(err) => Some(err),
            Completion::Completed | Completion::AlreadyPlaying => None,
        }
    }
}

/// Runs `statements` against `store`, consulting `sink` before each play.
///
/// `title` is the triggering circle's title; when non-empty it is displayed
/// before every clip. The walk stops early when the sink is busy or when a
/// condition operand is neither a variable nor an integer; variable changes
/// and effects up to that point are kept either way.
pub fn execute(
    statements: &[Statement],
    title: Option<&str>,
    store: &mut VariableStore,
    sink: &mut dyn PlaybackSink,
) -> InterpreterOutcome {
    let mut walk = Walk {
        title: title.filter(|title| !title.is_empty()),
        effects: Vec::new(),
    };

    let completion = match walk.run(statements, Level::Circle, store, sink) {
        Ok(()) => Completion::Completed,
        Err(StoryError::AlreadyPlaying) => {
            debug!("playback in progress, remaining statements skipped");
            Completion::AlreadyPlaying
        }
        Err(err) => {
            warn!(%err, effects = walk.effects.len(), "statement walk failed");
            Completion::Failed(err)
        }
    };

    InterpreterOutcome {
        effects: walk.effects,
        completion,
    }
}

/// Evaluates a conjunction of conditions. An empty list holds.
pub fn conditions_hold(conditions: &[Operator], store: &VariableStore) -> Result<bool> {
    for operator in conditions {
        if !evaluate(operator, store)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn evaluate(operator: &Operator, store: &VariableStore) -> Result<bool> {
    match operator {
        Operator::Equals { lhs, rhs } => Ok(resolve(lhs, store)? == resolve(rhs, store)?),
    }
}

/// A token is a variable if one with that name exists, otherwise an integer.
fn resolve(token: &str, store: &VariableStore) -> Result<i64> {
    if store.has(token) {
        return store.get(token);
    }
    token
        .parse()
        .map_err(|_| StoryError::MalformedLiteral(token.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Circle,
    Branch,
}

struct Walk<'t> {
    title: Option<&'t str>,
    effects: Vec<Effect>,
}

impl Walk<'_> {
    fn run(
        &mut self,
        statements: &[Statement],
        level: Level,
        store: &mut VariableStore,
        sink: &mut dyn PlaybackSink,
    ) -> Result<()> {
        for statement in statements {
            match statement {
                Statement::Assign { variable, value } => store.set(variable.as_str(), *value),
                Statement::Increment { variable, delta } => {
                    let current = if store.has(variable) {
                        store.get(variable)?
                    } else {
                        0
                    };
                    store.set(variable.as_str(), current.wrapping_add(*delta));
                }
                Statement::Play { clip, text, volume } => self.play(clip, text, *volume, sink)?,
                Statement::End => {
                    info!("end of story reached");
                    self.effects.push(Effect::EndOfStory);
                }
                Statement::If { .. } if level == Level::Branch => {
                    warn!("nested if statement ignored");
                }
                Statement::If {
                    conditions,
                    then_branch,
                    else_branch,
                } => {
                    let branch = if conditions_hold(conditions, store)? {
                        then_branch
                    } else {
                        else_branch
                    };
                    self.run(branch, Level::Branch, store, sink)?;
                }
            }
        }
        Ok(())
    }

    fn play(
        &mut self,
        clip: &str,
        text: &str,
        volume: f32,
        sink: &mut dyn PlaybackSink,
    ) -> Result<()> {
        if sink.is_playing() {
            return Err(StoryError::AlreadyPlaying);
        }

        if let Some(title) = self.title {
            self.effects.push(Effect::display(title));
        }
        if !text.is_empty() {
            self.effects.push(Effect::display(text));
        }

        debug!(clip, volume, "play request");
        self.effects.push(Effect::play(clip, volume));
        sink.on_play_request(clip, volume);
        Ok(())
    }
}
