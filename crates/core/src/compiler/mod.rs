//! Story compiler: markup text in, [`Story`] out.
//!
//! ```text
//! story(title, introfile?, introtext?)
//!   init?                      -- assign*
//!   spot(latitude, longitude)+ -- circle+
//!     circle(radius, title?)   -- (assign|increment|end|play|if)*
//! if
//!   condition?                 -- equals(element1, element2)*
//!   then?                      -- (assign|increment|end|play)*
//!   else?                      -- (assign|increment|end|play)*
//! ```
//!
//! Any tag outside this grammar fails the whole story with
//! [`StoryError::MalformedStory`] naming the tag.

mod markup;

use std::str::FromStr;

use tracing::debug;

use crate::{Circle, Coordinate, Operator, Result, Spot, Statement, Story, StoryError};

use markup::Element;

const TAG_STORY: &str = "story";
const TAG_INIT: &str = "init";
const TAG_SPOT: &str = "spot";
const TAG_CIRCLE: &str = "circle";
const TAG_ASSIGN: &str = "assign";
const TAG_INCREMENT: &str = "increment";
const TAG_PLAY: &str = "play";
const TAG_IF: &str = "if";
const TAG_END: &str = "end";
const TAG_CONDITION: &str = "condition";
const TAG_THEN: &str = "then";
const TAG_ELSE: &str = "else";
const TAG_EQUALS: &str = "equals";

/// Compiles the markup of one story. `folder` identifies the folder the
/// markup was read from and is kept on the story for resolving clips.
pub fn compile(source: &str, folder: &str) -> Result<Story> {
    let root = markup::parse_document(source)?;
    let story = lower_story(&root, folder)?;
    debug!(
        folder,
        title = story.title(),
        spots = story.spots().len(),
        "compiled story"
    );
    Ok(story)
}

/// Statement tags of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementTag {
    Assign,
    Increment,
    Play,
    If,
    End,
}

impl StatementTag {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            TAG_ASSIGN => Some(Self::Assign),
            TAG_INCREMENT => Some(Self::Increment),
            TAG_PLAY => Some(Self::Play),
            TAG_IF => Some(Self::If),
            TAG_END => Some(Self::End),
            _ => None,
        }
    }
}

/// The places statements can appear. Each accepts a different subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Init,
    Circle,
    Branch,
}

impl Block {
    fn accepts(self, tag: StatementTag) -> bool {
        match self {
            Block::Init => match tag {
                StatementTag::Assign => true,
                StatementTag::Increment
                | StatementTag::Play
                | StatementTag::If
                | StatementTag::End => false,
            },
            Block::Circle => match tag {
                StatementTag::Assign
                | StatementTag::Increment
                | StatementTag::Play
                | StatementTag::If
                | StatementTag::End => true,
            },
            Block::Branch => match tag {
                StatementTag::Assign
                | StatementTag::Increment
                | StatementTag::Play
                | StatementTag::End => true,
                StatementTag::If => false,
            },
        }
    }
}

/// Parts of an if statement, in the only order they may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum IfPart {
    Condition,
    Then,
    Else,
}

fn lower_story(root: &Element, folder: &str) -> Result<Story> {
    if root.name != TAG_STORY {
        return Err(malformed(root, "the root element must be <story>"));
    }

    let title = required(root, "title")?.to_string();
    let intro_clip = root.attr("introfile").map(str::to_string);
    let intro_text = root.attr("introtext").unwrap_or_default().to_string();

    let mut init = None;
    let mut spots = Vec::new();
    for child in &root.children {
        match child.name.as_str() {
            TAG_INIT => {
                if init.is_some() {
                    return Err(malformed(child, "a story may only have one <init> block"));
                }
                init = Some(lower_block(child, Block::Init)?);
            }
            TAG_SPOT => spots.push(lower_spot(child)?),
            _ => return Err(unexpected_child(child, root)),
        }
    }

    if spots.is_empty() {
        return Err(malformed(root, "a story needs at least one <spot>"));
    }

    Ok(Story::new(
        title,
        folder,
        intro_clip,
        intro_text,
        init.unwrap_or_default(),
        spots,
    ))
}

fn lower_spot(element: &Element) -> Result<Spot> {
    let latitude = required_degrees(element, "latitude", 90.0)?;
    let longitude = required_degrees(element, "longitude", 180.0)?;

    let circles = element
        .children
        .iter()
        .map(|child| match child.name.as_str() {
            TAG_CIRCLE => lower_circle(child),
            _ => Err(unexpected_child(child, element)),
        })
        .collect::<Result<Vec<_>>>()?;

    if circles.is_empty() {
        return Err(malformed(element, "a spot needs at least one <circle>"));
    }

    Ok(Spot::new(Coordinate::new(latitude, longitude), circles))
}

fn lower_circle(element: &Element) -> Result<Circle> {
    let radius = required_number(element, "radius")?;
    let title = element.attr("title").map(str::to_string);
    let statements = lower_block(element, Block::Circle)?;
    Ok(Circle::new(radius, title, statements))
}

fn lower_block(element: &Element, block: Block) -> Result<Vec<Statement>> {
    element
        .children
        .iter()
        .map(|child| {
            let tag = StatementTag::from_name(&child.name)
                .filter(|tag| block.accepts(*tag))
                .ok_or_else(|| unexpected_child(child, element))?;
            lower_statement(child, tag)
        })
        .collect()
}

fn lower_statement(element: &Element, tag: StatementTag) -> Result<Statement> {
    if tag != StatementTag::If {
        expect_leaf(element)?;
    }

    let statement = match tag {
        StatementTag::Assign => Statement::Assign {
            variable: required(element, "variable")?.to_string(),
            value: required_number(element, "value")?,
        },
        StatementTag::Increment => Statement::Increment {
            variable: required(element, "variable")?.to_string(),
            delta: optional_number(element, "value", 1)?,
        },
        StatementTag::Play => {
            let volume: f32 = optional_number(element, "volume", 1.0)?;
            if !(0.0..=1.0).contains(&volume) {
                return Err(malformed(element, "volume must be between 0.0 and 1.0"));
            }
            Statement::Play {
                clip: required(element, "file")?.to_string(),
                text: element.attr("text").unwrap_or_default().to_string(),
                volume,
            }
        }
        StatementTag::If => lower_if(element)?,
        StatementTag::End => Statement::End,
    };

    Ok(statement)
}

fn lower_if(element: &Element) -> Result<Statement> {
    let mut conditions = Vec::new();
    let mut then_branch = Vec::new();
    let mut else_branch = Vec::new();

    let mut last_part = None;
    for child in &element.children {
        let part = match child.name.as_str() {
            TAG_CONDITION => IfPart::Condition,
            TAG_THEN => IfPart::Then,
            TAG_ELSE => IfPart::Else,
            _ => return Err(unexpected_child(child, element)),
        };
        if last_part.is_some_and(|last| part <= last) {
            return Err(malformed(
                child,
                "<condition>, <then> and <else> may each appear once, in that order",
            ));
        }
        last_part = Some(part);

        match part {
            IfPart::Condition => conditions = lower_conditions(child)?,
            IfPart::Then => then_branch = lower_block(child, Block::Branch)?,
            IfPart::Else => else_branch = lower_block(child, Block::Branch)?,
        }
    }

    Ok(Statement::If {
        conditions,
        then_branch,
        else_branch,
    })
}

fn lower_conditions(element: &Element) -> Result<Vec<Operator>> {
    element
        .children
        .iter()
        .map(|child| match child.name.as_str() {
            TAG_EQUALS => {
                expect_leaf(child)?;
                Ok(Operator::Equals {
                    lhs: required(child, "element1")?.to_string(),
                    rhs: required(child, "element2")?.to_string(),
                })
            }
            _ => Err(unexpected_child(child, element)),
        })
        .collect()
}

fn expect_leaf(element: &Element) -> Result<()> {
    match element.children.first() {
        Some(child) => Err(malformed(
            child,
            format!("<{}> does not take child elements", element.name),
        )),
        None => Ok(()),
    }
}

fn required<'a>(element: &'a Element, attribute: &str) -> Result<&'a str> {
    element
        .attr(attribute)
        .ok_or_else(|| malformed(element, format!("missing attribute `{attribute}`")))
}

fn required_number<T: FromStr>(element: &Element, attribute: &str) -> Result<T> {
    parse_number(element, attribute, required(element, attribute)?)
}

fn optional_number<T: FromStr>(element: &Element, attribute: &str, default: T) -> Result<T> {
    match element.attr(attribute) {
        Some(raw) => parse_number(element, attribute, raw),
        None => Ok(default),
    }
}

fn parse_number<T: FromStr>(element: &Element, attribute: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        malformed(
            element,
            format!("attribute `{attribute}` is not a valid number: `{raw}`"),
        )
    })
}

fn required_degrees(element: &Element, attribute: &str, limit: f64) -> Result<f64> {
    let degrees: f64 = required_number(element, attribute)?;
    if !degrees.is_finite() || degrees.abs() > limit {
        return Err(malformed(
            element,
            format!("attribute `{attribute}` must be within ±{limit} degrees"),
        ));
    }
    Ok(degrees)
}

fn malformed(element: &Element, reason: impl std::fmt::Display) -> StoryError {
    StoryError::malformed(&element.name, format!("line {}: {reason}", element.line))
}

fn unexpected_child(child: &Element, parent: &Element) -> StoryError {
    malformed(child, format!("unknown tag beneath <{}>", parent.name))
}
