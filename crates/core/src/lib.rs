//! Core library for location-based audio stories.
//!
//! A story is written in a small tag language, compiled once into an
//! immutable [`Story`] and then played back by a [`StorySession`] that turns
//! location readings into effects for the host (text to show, clips to play,
//! the nearest spot still waiting to be visited). Audio output and the
//! location provider stay with the host; the core only decides what happens.

pub mod compiler;
pub mod config;
pub mod error;
pub mod geofence;
pub mod interpreter;
pub mod library;
pub mod model;
pub mod playback;
pub mod session;
pub mod variables;

pub use compiler::compile;
pub use config::{AppConfig, LibraryConfig, SessionConfig};
pub use error::{Result, StoryError};
pub use geofence::{
    contains, find_triggered, haversine_km, nearest_spot, Fix, LocationTracker, EARTH_RADIUS_KM,
};
pub use interpreter::{conditions_hold, execute, Completion, Effect, InterpreterOutcome};
pub use library::StoryLibrary;
pub use model::{Circle, Coordinate, Operator, Reading, Spot, SpotId, Statement, Story};
pub use playback::{PlaybackSink, PlaybackState, SharedPlayback};
pub use session::{SessionStatus, StorySession};
pub use variables::VariableStore;
