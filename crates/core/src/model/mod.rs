//! Compiled story tree: a [`Story`] owns its [`Spot`]s, each spot owns its
//! geofence [`Circle`]s, and each circle owns the [`Statement`]s it runs.
//!
//! The tree is immutable once built. Only the variable store changes while a
//! story is being walked.

mod statement;

pub use statement::{Operator, Statement};

use serde::{Deserialize, Serialize};

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A single reading from the location feed. Only the position is used for
/// matching; accuracy is carried along for logging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: f32,
}

impl Reading {
    pub fn new(latitude: f64, longitude: f64, accuracy: f32) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Index of a spot inside its story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SpotId(pub usize);

impl std::fmt::Display for SpotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "spot#{}", self.0)
    }
}

/// A geofence around a spot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Circle {
    radius: u32,
    title: Option<String>,
    statements: Vec<Statement>,
    spot: Option<SpotId>,
}

impl Circle {
    /// Creates a circle with no owning spot. The back-reference is filled
    /// in by [`Story::new`] once the spot list is final.
    pub fn new(radius: u32, title: Option<String>, statements: Vec<Statement>) -> Self {
        Self {
            radius,
            title,
            statements,
            spot: None,
        }
    }

    /// Radius in meters.
    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Owning spot, once the circle is part of a story.
    pub fn spot(&self) -> Option<SpotId> {
        self.spot
    }
}

/// A fixed centre point with one or more circles around it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spot {
    coordinate: Coordinate,
    circles: Vec<Circle>,
}

impl Spot {
    /// Creates a spot. Circles are stably sorted by ascending radius so the
    /// first circle containing a position is always the smallest one.
    pub fn new(coordinate: Coordinate, mut circles: Vec<Circle>) -> Self {
        circles.sort_by_key(Circle::radius);
        Self {
            coordinate,
            circles,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    pub fn latitude(&self) -> f64 {
        self.coordinate.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.coordinate.longitude
    }

    /// Circles in non-decreasing radius order.
    pub fn circles(&self) -> &[Circle] {
        &self.circles
    }
}

/// A compiled story.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Story {
    title: String,
    folder: String,
    intro_clip: Option<String>,
    intro_text: String,
    init: Vec<Statement>,
    spots: Vec<Spot>,
}

impl Story {
    /// Assembles a story and links every circle back to its spot.
    pub fn new(
        title: impl Into<String>,
        folder: impl Into<String>,
        intro_clip: Option<String>,
        intro_text: impl Into<String>,
        init: Vec<Statement>,
        mut spots: Vec<Spot>,
    ) -> Self {
        for (index, spot) in spots.iter_mut().enumerate() {
            for circle in &mut spot.circles {
                circle.spot = Some(SpotId(index));
            }
        }

        Self {
            title: title.into(),
            folder: folder.into(),
            intro_clip,
            intro_text: intro_text.into(),
            init,
            spots,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Identifier of the folder the story was loaded from.
    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn intro_clip(&self) -> Option<&str> {
        self.intro_clip.as_deref()
    }

    pub fn intro_text(&self) -> &str {
        &self.intro_text
    }

    /// Statements run once when the story starts. The compiler only ever
    /// puts assignments here.
    pub fn init(&self) -> &[Statement] {
        &self.init
    }

    pub fn spots(&self) -> &[Spot] {
        &self.spots
    }

    pub fn spot(&self, id: SpotId) -> Option<&Spot> {
        self.spots.get(id.0)
    }

    /// Spot owning the given circle.
    pub fn spot_of(&self, circle: &Circle) -> Option<&Spot> {
        circle.spot.and_then(|id| self.spot(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle(radius: u32, title: &str) -> Circle {
        Circle::new(radius, Some(title.to_string()), Vec::new())
    }

    #[test]
    fn spot_sorts_circles_by_radius() {
        let spot = Spot::new(
            Coordinate::new(48.0, 11.0),
            vec![circle(50, "outer"), circle(10, "inner"), circle(25, "middle")],
        );

        let radii: Vec<u32> = spot.circles().iter().map(Circle::radius).collect();
        assert_eq!(radii, vec![10, 25, 50]);
    }

    #[test]
    fn equal_radii_keep_declaration_order() {
        let spot = Spot::new(
            Coordinate::new(48.0, 11.0),
            vec![circle(20, "first"), circle(5, "small"), circle(20, "second")],
        );

        let titles: Vec<_> = spot.circles().iter().filter_map(Circle::title).collect();
        assert_eq!(titles, vec!["small", "first", "second"]);
    }

    #[test]
    fn story_links_circles_to_spots() {
        let first = Spot::new(Coordinate::new(1.0, 1.0), vec![circle(10, "a")]);
        let second = Spot::new(
            Coordinate::new(2.0, 2.0),
            vec![circle(10, "b"), circle(20, "c")],
        );
        assert!(first.circles()[0].spot().is_none());

        let story = Story::new("Walk", "walk", None, "", Vec::new(), vec![first, second]);

        let last = &story.spots()[1].circles()[1];
        assert_eq!(last.spot(), Some(SpotId(1)));
        assert_eq!(story.spot_of(last).map(Spot::latitude), Some(2.0));
        assert_eq!(story.spots()[0].circles()[0].spot(), Some(SpotId(0)));
    }

    #[test]
    fn reading_drops_accuracy_for_coordinate() {
        let reading = Reading::new(52.5, 13.4, 8.0);
        assert_eq!(reading.coordinate(), Coordinate::new(52.5, 13.4));
    }
}
