//! Per-node emission style overrides.

use crate::event::NodeStyle;

/// Stack of style hints for the nodes about to be emitted.
///
/// A writer pushes the hint for a child right before descending into it; the
/// child's node event pops it. Popping an empty stack yields
/// [`NodeStyle::Any`].
#[derive(Debug, Clone, Default)]
pub struct StyleStack {
    styles: Vec<NodeStyle>,
}

impl StyleStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, style: NodeStyle) {
        self.styles.push(style);
    }

    pub fn pop(&mut self) -> NodeStyle {
        self.styles.pop().unwrap_or_default()
    }

    pub fn depth(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}
