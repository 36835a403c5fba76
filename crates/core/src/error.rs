use crate::Effect;

/// Result alias that carries the custom [`StoryError`] type.
pub type Result<T> = std::result::Result<T, StoryError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum StoryError {
    /// A tag appeared where the story grammar does not allow it, or one of
    /// its attributes is missing or unparsable.
    #[error("malformed story at <{tag}>: {reason}")]
    MalformedStory { tag: String, reason: String },
    /// The markup itself is not well formed (unbalanced tags, bad quoting).
    #[error("story markup is not well formed: {0}")]
    Syntax(String),
    /// A variable was read without checking that it exists first.
    #[error("variable `{0}` is not defined")]
    UndefinedVariable(String),
    /// An equality operand is neither a known variable nor an integer.
    #[error("`{0}` is neither a defined variable nor an integer literal")]
    MalformedLiteral(String),
    /// A play statement ran while the playback sink was still busy.
    #[error("playback is already in progress")]
    AlreadyPlaying,
    /// A story folder does not contain a markup file.
    #[error("story folder `{0}` does not contain a story file")]
    MissingStoryFile(String),
    /// No loaded story carries the requested title.
    #[error("no story titled `{0}`")]
    UnknownStory(String),
    /// A triggered circle stopped partway through. `effects` holds what it
    /// emitted before `source`; the host still has to act on them.
    #[error("story interrupted: {source}")]
    Interrupted {
        effects: Vec<Effect>,
        source: Box<StoryError>,
    },
    /// Reading a story folder or configuration file failed.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// A configuration file is not valid JSON for [`crate::AppConfig`].
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// Free-form error raised through [`StoryError::msg`].
    #[error("{0}")]
    Message(String),
}

impl StoryError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn malformed(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedStory {
            tag: tag.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn interrupted(effects: Vec<Effect>, source: StoryError) -> Self {
        Self::Interrupted {
            effects,
            source: Box::new(source),
        }
    }

    /// Name of the offending tag for [`StoryError::MalformedStory`].
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::MalformedStory { tag, .. } => Some(tag),
            _ => None,
        }
    }
}

impl From<&str> for StoryError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for StoryError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
