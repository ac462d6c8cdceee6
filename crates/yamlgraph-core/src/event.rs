//! Document event vocabulary shared by sources and sinks.
//!
//! Anchors are carried as properties of node events (`Scalar`,
//! `MappingStart`, `SequenceStart`); references to them arrive as `Alias`
//! events. Every event carries the span it was produced from so failures can
//! be reported against the document.
//!
//! Events are serde-serializable, which lets an event stream be stored as a
//! JSON array:
//!
//! ```json
//! [
//!   { "event": "mapping-start", "anchor": "root" },
//!   { "event": "scalar", "value": "self" },
//!   { "event": "alias", "label": "root" },
//!   { "event": "mapping-end" }
//! ]
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A position in the source document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    pub index: usize,
    pub line: usize,
    pub column: usize,
}

impl Mark {
    pub fn new(index: usize, line: usize, column: usize) -> Self {
        Self {
            index,
            line,
            column,
        }
    }
}

/// Start and end position of an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Mark,
    pub end: Mark,
}

impl Span {
    pub fn new(start: Mark, end: Mark) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}:{}) - ({}:{})",
            self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}

/// Emission style of a node. `Any` leaves the choice to the emitter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeStyle {
    #[default]
    Any,
    Block,
    Flow,
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

impl NodeStyle {
    /// Non-plain scalar styles never take part in implicit typing.
    pub fn is_quoted(self) -> bool {
        matches!(
            self,
            Self::SingleQuoted | Self::DoubleQuoted | Self::Literal | Self::Folded
        )
    }
}

/// A reference to an anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub label: String,
    #[serde(default)]
    pub span: Span,
}

impl Alias {
    pub fn new(label: impl Into<String>, span: Span) -> Self {
        Self {
            label: label.into(),
            span,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub value: String,
    #[serde(default, skip_serializing_if = "is_any_style")]
    pub style: NodeStyle,
    #[serde(default)]
    pub span: Span,
}

impl ScalarEvent {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// Plain scalars without an explicit tag are the only ones subject to
    /// implicit typing.
    pub fn is_plain_untagged(&self) -> bool {
        self.tag.is_none() && !self.style.is_quoted()
    }
}

/// Properties of a `MappingStart` or `SequenceStart` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "is_any_style")]
    pub style: NodeStyle,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEnd {
    #[serde(default)]
    pub span: Span,
}

fn is_any_style(style: &NodeStyle) -> bool {
    *style == NodeStyle::Any
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Event {
    Scalar(ScalarEvent),
    MappingStart(NodeStart),
    MappingEnd(NodeEnd),
    SequenceStart(NodeStart),
    SequenceEnd(NodeEnd),
    Alias(Alias),
}

impl Event {
    pub fn scalar(value: impl Into<String>) -> Self {
        Self::Scalar(ScalarEvent::new(value))
    }

    pub fn mapping_start() -> Self {
        Self::MappingStart(NodeStart::default())
    }

    pub fn mapping_end() -> Self {
        Self::MappingEnd(NodeEnd::default())
    }

    pub fn sequence_start() -> Self {
        Self::SequenceStart(NodeStart::default())
    }

    pub fn sequence_end() -> Self {
        Self::SequenceEnd(NodeEnd::default())
    }

    pub fn alias(label: impl Into<String>) -> Self {
        Self::Alias(Alias::new(label, Span::default()))
    }

    /// Attach an anchor declaration. No effect on end and alias events.
    pub fn with_anchor(mut self, label: impl Into<String>) -> Self {
        match &mut self {
            Self::Scalar(scalar) => scalar.anchor = Some(label.into()),
            Self::MappingStart(start) | Self::SequenceStart(start) => {
                start.anchor = Some(label.into())
            }
            _ => {}
        }
        self
    }

    /// Attach an explicit tag. No effect on end and alias events.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        match &mut self {
            Self::Scalar(scalar) => scalar.tag = Some(tag.into()),
            Self::MappingStart(start) | Self::SequenceStart(start) => start.tag = Some(tag.into()),
            _ => {}
        }
        self
    }

    pub fn with_style(mut self, style: NodeStyle) -> Self {
        match &mut self {
            Self::Scalar(scalar) => scalar.style = style,
            Self::MappingStart(start) | Self::SequenceStart(start) => start.style = style,
            _ => {}
        }
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        match &mut self {
            Self::Scalar(scalar) => scalar.span = span,
            Self::MappingStart(start) | Self::SequenceStart(start) => start.span = span,
            Self::MappingEnd(end) | Self::SequenceEnd(end) => end.span = span,
            Self::Alias(alias) => alias.span = span,
        }
        self
    }

    pub fn span(&self) -> Span {
        match self {
            Self::Scalar(scalar) => scalar.span,
            Self::MappingStart(start) | Self::SequenceStart(start) => start.span,
            Self::MappingEnd(end) | Self::SequenceEnd(end) => end.span,
            Self::Alias(alias) => alias.span,
        }
    }

    pub fn anchor(&self) -> Option<&str> {
        match self {
            Self::Scalar(scalar) => scalar.anchor.as_deref(),
            Self::MappingStart(start) | Self::SequenceStart(start) => start.anchor.as_deref(),
            _ => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Scalar(scalar) => scalar.tag.as_deref(),
            Self::MappingStart(start) | Self::SequenceStart(start) => start.tag.as_deref(),
            _ => None,
        }
    }

    /// Short human-readable form used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Self::Scalar(scalar) => format!("Scalar({})", scalar.value),
            Self::MappingStart(_) => "MappingStart".to_string(),
            Self::MappingEnd(_) => "MappingEnd".to_string(),
            Self::SequenceStart(_) => "SequenceStart".to_string(),
            Self::SequenceEnd(_) => "SequenceEnd".to_string(),
            Self::Alias(alias) => format!("Alias(*{})", alias.label),
        }
    }
}

/// Produces events while deserializing. The cursor is owned by the source;
/// strategies advance it as they consume nodes.
pub trait EventSource {
    /// The event under the cursor, or `None` once the stream is exhausted.
    fn current(&self) -> Option<&Event>;

    fn advance(&mut self);
}

/// Accepts events while serializing.
pub trait EventSink {
    fn emit(&mut self, event: Event) -> Result<()>;
}

/// In-memory [`EventSource`] over a vector of events.
#[derive(Debug, Clone, Default)]
pub struct EventReader {
    events: Vec<Event>,
    position: usize,
}

impl EventReader {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            position: 0,
        }
    }

    /// Load a stream stored as a JSON array of events.
    pub fn from_json(input: &str) -> Result<Self> {
        let events: Vec<Event> = serde_json::from_str(input)?;
        Ok(Self::new(events))
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.events.len()
    }
}

impl EventSource for EventReader {
    fn current(&self) -> Option<&Event> {
        self.events.get(self.position)
    }

    fn advance(&mut self) {
        if self.position < self.events.len() {
            self.position += 1;
        }
    }
}

/// In-memory [`EventSink`] collecting emitted events in order.
#[derive(Debug, Clone, Default)]
pub struct EventBuffer {
    events: Vec<Event>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

impl EventSink for EventBuffer {
    fn emit(&mut self, event: Event) -> Result<()> {
        self.events.push(event);
        Ok(())
    }
}
