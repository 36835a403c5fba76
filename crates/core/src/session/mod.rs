//! One walk through one story: warm-up, geofence matching, interpretation
//! and the bookkeeping around them.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::{
    execute, find_triggered, nearest_spot, Completion, Effect, Fix, InterpreterOutcome,
    LocationTracker, PlaybackSink, Reading, Result, SessionConfig, SpotId, Statement, Story,
    StoryError, VariableStore,
};

/// Lifecycle of a [`StorySession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Created but not started.
    Ready,
    /// Consuming readings.
    Running,
    /// An end statement ran; waiting for the last clip to finish.
    Ending,
    /// Story over. Readings are ignored.
    Finished,
}

/// Drives a compiled story from a stream of location readings.
///
/// The session is single threaded and run-to-completion: every call handles
/// one event and returns the effects it produced, in order.
#[derive(Debug)]
pub struct StorySession {
    story: Story,
    store: VariableStore,
    tracker: LocationTracker,
    triggered: BTreeSet<SpotId>,
    status: SessionStatus,
}

impl StorySession {
    pub fn new(story: Story, config: &SessionConfig) -> Self {
        Self {
            story,
            store: VariableStore::new(),
            tracker: LocationTracker::new(config.warm_up_readings),
            triggered: BTreeSet::new(),
            status: SessionStatus::Ready,
        }
    }

    pub fn story(&self) -> &Story {
        &self.story
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Read-only view of the session's variables.
    pub fn variables(&self) -> &VariableStore {
        &self.store
    }

    /// Spots whose circles have run in this session.
    pub fn triggered_spots(&self) -> impl Iterator<Item = SpotId> + '_ {
        self.triggered.iter().copied()
    }

    /// Starts (or restarts) the story: runs the init block and requests the
    /// intro.
    pub fn start(&mut self, sink: &mut dyn PlaybackSink) -> Result<Vec<Effect>> {
        self.reset();
        self.status = SessionStatus::Running;
        info!(title = self.story.title(), "starting story");

        let mut intro: Vec<Statement> = self.story.init().to_vec();
        if let Some(clip) = self.story.intro_clip() {
            intro.push(Statement::Play {
                clip: clip.to_string(),
                text: self.story.intro_text().to_string(),
                volume: 1.0,
            });
        }

        let InterpreterOutcome {
            mut effects,
            completion,
        } = execute(&intro, None, &mut self.store, sink);
        if self.story.intro_clip().is_none() && !self.story.intro_text().is_empty() {
            effects.push(Effect::display(self.story.intro_text()));
        }
        finish_walk(effects, completion)
    }

    /// Handles one location reading.
    ///
    /// When the triggered circle stops on an error, the spot still counts as
    /// triggered and the effects emitted so far come back inside
    /// [`StoryError::Interrupted`].
    pub fn on_reading(
        &mut self,
        reading: Reading,
        sink: &mut dyn PlaybackSink,
    ) -> Result<Vec<Effect>> {
        if self.status != SessionStatus::Running {
            debug!(status = ?self.status, "reading ignored");
            return Ok(Vec::new());
        }

        let mut effects = Vec::new();
        match self.tracker.record(reading) {
            Fix::WarmingUp => return Ok(effects),
            Fix::First => {
                effects.push(Effect::FirstFixAcquired);
                effects.push(self.nearest_untriggered());
            }
            Fix::Subsequent => {}
        }

        if sink.is_playing() {
            debug!("playback in progress, reading not matched");
            return Ok(effects);
        }

        let Some(circle) = find_triggered(self.story.spots(), reading.coordinate()) else {
            return Ok(effects);
        };

        let outcome = execute(circle.statements(), circle.title(), &mut self.store, sink);
        if let Some(spot) = circle.spot() {
            self.triggered.insert(spot);
        }
        if outcome.reached_end() {
            info!(title = self.story.title(), "story ended");
            // Nothing left to wait for when no clip is playing.
            self.status = if sink.is_playing() {
                SessionStatus::Ending
            } else {
                SessionStatus::Finished
            };
        }
        effects.extend(outcome.effects);

        finish_walk(effects, outcome.completion)
    }

    /// Handles the host's notice that the current clip has finished.
    pub fn on_playback_finished(&mut self) -> Vec<Effect> {
        match self.status {
            SessionStatus::Ending => {
                self.status = SessionStatus::Finished;
                Vec::new()
            }
            SessionStatus::Running => vec![self.nearest_untriggered()],
            SessionStatus::Ready | SessionStatus::Finished => Vec::new(),
        }
    }

    /// Tears the session down. The story is kept so it can be started again.
    pub fn stop(&mut self) {
        info!(title = self.story.title(), "stopping story");
        self.reset();
        self.status = SessionStatus::Finished;
    }

    fn reset(&mut self) {
        self.store.clear();
        self.tracker.reset();
        self.triggered.clear();
    }

    fn nearest_untriggered(&self) -> Effect {
        let spot = self.tracker.last().and_then(|reading| {
            nearest_spot(self.story.spots(), reading.coordinate(), |id| {
                self.triggered.contains(&id)
            })
        });

        Effect::NearestUntriggeredSpot {
            spot: spot.map(|(_, spot)| spot.coordinate()),
        }
    }
}

fn finish_walk(effects: Vec<Effect>, completion: Completion) -> Result<Vec<Effect>> {
    match completion {
        Completion::Completed | Completion::AlreadyPlaying => Ok(effects),
        Completion::Failed(err) => Err(StoryError::interrupted(effects, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Circle, Coordinate, Operator, Spot};

    #[derive(Default)]
    struct FakePlayer {
        playing: bool,
    }

    impl PlaybackSink for FakePlayer {
        fn is_playing(&self) -> bool {
            self.playing
        }

        fn on_play_request(&mut self, _clip: &str, _volume: f32) {
            self.playing = true;
        }
    }

    fn config(warm_up_readings: u32) -> SessionConfig {
        SessionConfig { warm_up_readings }
    }

    fn circle(radius: u32, statements: Vec<Statement>) -> Circle {
        Circle::new(radius, None, statements)
    }

    fn two_spot_story() -> Story {
        Story::new(
            "Walk",
            "walk",
            Some("intro.mp3".to_string()),
            "Welcome",
            vec![Statement::assign("visits", 0)],
            vec![
                Spot::new(
                    Coordinate::new(0.0, 0.0),
                    vec![circle(50, vec![Statement::increment("visits", 1), Statement::play("a")])],
                ),
                Spot::new(
                    Coordinate::new(0.01, 0.0),
                    vec![circle(50, vec![Statement::play("b"), Statement::End])],
                ),
            ],
        )
    }

    fn at(latitude: f64, longitude: f64) -> Reading {
        Reading::new(latitude, longitude, 3.0)
    }

    #[test]
    fn start_runs_init_and_requests_intro() {
        let mut session = StorySession::new(two_spot_story(), &config(1));
        let mut player = FakePlayer::default();

        let effects = session.start(&mut player).unwrap();

        assert_eq!(
            effects,
            vec![Effect::display("Welcome"), Effect::play("intro.mp3", 1.0)]
        );
        assert_eq!(session.variables().get("visits").unwrap(), 0);
        assert_eq!(session.status(), SessionStatus::Running);
        assert!(player.playing);
    }

    #[test]
    fn intro_text_without_clip_is_still_displayed() {
        let story = Story::new(
            "Walk",
            "walk",
            None,
            "Read me",
            Vec::new(),
            vec![Spot::new(Coordinate::new(0.0, 0.0), vec![circle(10, Vec::new())])],
        );
        let mut session = StorySession::new(story, &config(1));

        let effects = session.start(&mut FakePlayer::default()).unwrap();
        assert_eq!(effects, vec![Effect::display("Read me")]);
    }

    #[test]
    fn readings_before_start_are_ignored() {
        let mut session = StorySession::new(two_spot_story(), &config(1));
        let effects = session.on_reading(at(0.0, 0.0), &mut FakePlayer::default()).unwrap();
        assert!(effects.is_empty());
    }

    #[test]
    fn warm_up_then_first_fix_then_trigger() {
        let mut session = StorySession::new(two_spot_story(), &config(3));
        let mut player = FakePlayer::default();
        session.start(&mut player).unwrap();
        player.playing = false;

        for _ in 0..2 {
            assert!(session.on_reading(at(0.0, 0.0), &mut player).unwrap().is_empty());
        }

        let effects = session.on_reading(at(0.0, 0.0), &mut player).unwrap();
        assert_eq!(
            effects,
            vec![
                Effect::FirstFixAcquired,
                Effect::NearestUntriggeredSpot {
                    spot: Some(Coordinate::new(0.0, 0.0))
                },
                Effect::play("a", 1.0),
            ]
        );
        assert_eq!(session.variables().get("visits").unwrap(), 1);
        assert_eq!(session.triggered_spots().collect::<Vec<_>>(), vec![SpotId(0)]);
    }

    #[test]
    fn readings_while_playing_produce_nothing() {
        let mut session = StorySession::new(two_spot_story(), &config(1));
        let mut player = FakePlayer::default();
        session.start(&mut player).unwrap();
        player.playing = false;

        let first = session.on_reading(at(0.0, 0.0), &mut player).unwrap();
        assert!(first.contains(&Effect::play("a", 1.0)));

        let second = session.on_reading(at(0.0, 0.0), &mut player).unwrap();
        assert!(second.is_empty());
        assert_eq!(session.variables().get("visits").unwrap(), 1);
    }

    #[test]
    fn finished_playback_points_to_next_untriggered_spot() {
        let mut session = StorySession::new(two_spot_story(), &config(1));
        let mut player = FakePlayer::default();
        session.start(&mut player).unwrap();
        player.playing = false;

        session.on_reading(at(0.0, 0.0), &mut player).unwrap();
        player.playing = false;

        assert_eq!(
            session.on_playback_finished(),
            vec![Effect::NearestUntriggeredSpot {
                spot: Some(Coordinate::new(0.01, 0.0))
            }]
        );
    }

    #[test]
    fn end_statement_finishes_the_session_after_playback() {
        let mut session = StorySession::new(two_spot_story(), &config(1));
        let mut player = FakePlayer::default();
        session.start(&mut player).unwrap();
        player.playing = false;

        let effects = session.on_reading(at(0.01, 0.0), &mut player).unwrap();
        assert!(effects.ends_with(&[Effect::play("b", 1.0), Effect::EndOfStory]));
        assert_eq!(session.status(), SessionStatus::Ending);

        player.playing = false;
        let ignored = session.on_reading(at(0.0, 0.0), &mut player).unwrap();
        assert!(ignored.is_empty());

        assert!(session.on_playback_finished().is_empty());
        assert_eq!(session.status(), SessionStatus::Finished);
    }

    #[test]
    fn nearest_is_none_once_every_spot_triggered() {
        let mut session = StorySession::new(two_spot_story(), &config(1));
        let mut player = FakePlayer::default();
        session.start(&mut player).unwrap();

        player.playing = false;
        session.on_reading(at(0.0, 0.0), &mut player).unwrap();
        player.playing = false;
        session.on_reading(at(0.01, 0.0), &mut player).unwrap();

        session.status = SessionStatus::Running;
        assert_eq!(
            session.on_playback_finished(),
            vec![Effect::NearestUntriggeredSpot { spot: None }]
        );
    }

    #[test]
    fn stop_clears_state_and_start_restarts() {
        let mut session = StorySession::new(two_spot_story(), &config(1));
        let mut player = FakePlayer::default();
        session.start(&mut player).unwrap();
        player.playing = false;
        session.on_reading(at(0.0, 0.0), &mut player).unwrap();

        session.stop();
        assert!(session.variables().is_empty());
        assert_eq!(session.triggered_spots().count(), 0);
        assert_eq!(session.status(), SessionStatus::Finished);

        player.playing = false;
        session.start(&mut player).unwrap();
        assert_eq!(session.variables().get("visits").unwrap(), 0);
        assert_eq!(session.status(), SessionStatus::Running);
    }

    #[test]
    fn failed_condition_still_reports_earlier_effects() {
        let story = Story::new(
            "Walk",
            "walk",
            None,
            "",
            Vec::new(),
            vec![
                Spot::new(
                    Coordinate::new(0.0, 0.0),
                    vec![circle(
                        50,
                        vec![
                            Statement::play("a"),
                            Statement::If {
                                conditions: vec![Operator::equals("ghost", "1")],
                                then_branch: Vec::new(),
                                else_branch: Vec::new(),
                            },
                        ],
                    )],
                ),
                Spot::new(
                    Coordinate::new(0.01, 0.0),
                    vec![circle(50, vec![Statement::play("b")])],
                ),
            ],
        );
        let mut session = StorySession::new(story, &config(1));
        let mut player = FakePlayer::default();
        session.start(&mut player).unwrap();

        let err = session.on_reading(at(0.0, 0.0), &mut player).unwrap_err();
        let StoryError::Interrupted { effects, source } = err else {
            panic!("expected an interrupted walk");
        };
        assert_eq!(effects.last(), Some(&Effect::play("a", 1.0)));
        assert!(matches!(*source, StoryError::MalformedLiteral(ref token) if token == "ghost"));
        assert_eq!(session.triggered_spots().collect::<Vec<_>>(), vec![SpotId(0)]);
        assert_eq!(session.status(), SessionStatus::Running);

        player.playing = false;
        assert_eq!(
            session.on_playback_finished(),
            vec![Effect::NearestUntriggeredSpot {
                spot: Some(Coordinate::new(0.01, 0.0))
            }]
        );
        let next = session.on_reading(at(0.01, 0.0), &mut player).unwrap();
        assert_eq!(next, vec![Effect::play("b", 1.0)]);
    }

    #[test]
    fn end_without_a_clip_finishes_immediately() {
        let story = Story::new(
            "Walk",
            "walk",
            None,
            "",
            Vec::new(),
            vec![Spot::new(
                Coordinate::new(0.0, 0.0),
                vec![circle(50, vec![Statement::assign("done", 1), Statement::End])],
            )],
        );
        let mut session = StorySession::new(story, &config(1));
        let mut player = FakePlayer::default();
        session.start(&mut player).unwrap();

        let effects = session.on_reading(at(0.0, 0.0), &mut player).unwrap();

        assert_eq!(effects.last(), Some(&Effect::EndOfStory));
        assert_eq!(session.status(), SessionStatus::Finished);
        assert!(session.on_playback_finished().is_empty());
    }
}
