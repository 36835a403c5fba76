use serde::Serialize;

/// One executable instruction of a circle, an init block or an if-branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statement {
    /// Unconditional store.
    Assign { variable: String, value: i64 },
    /// Read-modify-write; a missing variable counts as zero.
    Increment { variable: String, delta: i64 },
    /// Request playback of a clip, optionally with its transcript.
    Play {
        clip: String,
        text: String,
        volume: f32,
    },
    If {
        conditions: Vec<Operator>,
        then_branch: Vec<Statement>,
        else_branch: Vec<Statement>,
    },
    /// Marks the narrative end of the story.
    End,
}

impl Statement {
    pub fn assign(variable: impl Into<String>, value: i64) -> Self {
        Self::Assign {
            variable: variable.into(),
            value,
        }
    }

    pub fn increment(variable: impl Into<String>, delta: i64) -> Self {
        Self::Increment {
            variable: variable.into(),
            delta,
        }
    }

    /// Play statement with no transcript at full volume.
    pub fn play(clip: impl Into<String>) -> Self {
        Self::Play {
            clip: clip.into(),
            text: String::new(),
            volume: 1.0,
        }
    }
}

/// A condition inside an if statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operator {
    /// Each side is a variable name or an integer literal, resolved when the
    /// condition is evaluated.
    Equals { lhs: String, rhs: String },
}

impl Operator {
    pub fn equals(lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        Self::Equals {
            lhs: lhs.into(),
            rhs: rhs.into(),
        }
    }
}
