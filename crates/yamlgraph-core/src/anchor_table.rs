//! Anchor bookkeeping for one pass.
//!
//! [`AnchorTable`] serves deserialization: it maps anchor labels declared in
//! the document to the values they name and queues late bindings for aliases
//! seen before their anchor. [`AnchorAllocator`] serves serialization: it
//! hands out synthetic labels to shared objects and tracks which anchored
//! objects are on the current recursion path.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::event::{Alias, Span};
use crate::graph::{ObjectId, Slot, Value};
use crate::types::TypeDescriptor;

/// A pending assignment of an alias' target into a graph slot.
#[derive(Debug, Clone, PartialEq)]
pub struct LateBinding {
    pub alias: Alias,
    pub slot: Slot,
    /// Set when the slot is a mapping key, which still has to pass through
    /// the key transform once its text is known.
    pub key: Option<PendingKey>,
}

/// Key-decoding state for a late-bound mapping key.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingKey {
    /// Descriptor of the mapping owning the key.
    pub descriptor: Arc<TypeDescriptor>,
    /// The entry's value is itself a forward alias.
    pub value_pending: bool,
}

#[derive(Debug)]
struct AnchorScope {
    label: Option<String>,
    span: Span,
    bound: bool,
}

#[derive(Debug, Default)]
pub struct AnchorTable {
    values: HashMap<String, Value>,
    scopes: Vec<AnchorScope>,
    late_bindings: Vec<LateBinding>,
}

impl AnchorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the value named by `label`. Anchors are unique per document.
    pub fn declare(&mut self, label: &str, value: Value, span: Span) -> Result<()> {
        if self.values.contains_key(label) {
            return Err(GraphError::structural(
                span,
                format!("duplicate anchor [{label}]"),
            ));
        }
        tracing::trace!(anchor = %label, "anchor declared");
        self.values.insert(label.to_string(), value);
        Ok(())
    }

    pub fn get(&self, label: &str) -> Option<&Value> {
        self.values.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.values.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Open the scope of a node about to be read, carrying its anchor if
    /// the node declared one.
    pub fn begin_scope(&mut self, label: Option<String>, span: Span) {
        self.scopes.push(AnchorScope {
            label,
            span,
            bound: false,
        });
    }

    /// Bind the innermost open scope to `value` ahead of its completion.
    ///
    /// Composite nodes call this as soon as their object exists, so that
    /// aliases inside their own subtree already resolve to it.
    pub fn bind_scope(&mut self, value: &Value) -> Result<()> {
        let Some(scope) = self.scopes.last_mut() else {
            return Ok(());
        };
        if scope.bound {
            return Ok(());
        }
        scope.bound = true;
        match scope.label.clone() {
            Some(label) => {
                let span = scope.span;
                self.declare(&label, value.clone(), span)
            }
            None => Ok(()),
        }
    }

    /// Close the innermost scope. A scope never bound early binds to the
    /// node's final value here.
    pub fn end_scope(&mut self, value: Option<&Value>) -> Result<()> {
        let Some(scope) = self.scopes.pop() else {
            return Err(GraphError::invalid_operation(
                "anchor scope closed without being opened",
            ));
        };
        match (scope.bound, scope.label, value) {
            (false, Some(label), Some(value)) => self.declare(&label, value.clone(), scope.span),
            _ => Ok(()),
        }
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push_late_binding(&mut self, binding: LateBinding) {
        self.late_bindings.push(binding);
    }

    pub fn late_bindings(&self) -> &[LateBinding] {
        &self.late_bindings
    }

    /// Drain pending bindings in registration order.
    pub fn take_late_bindings(&mut self) -> Vec<LateBinding> {
        std::mem::take(&mut self.late_bindings)
    }
}

#[derive(Debug)]
struct AnchorFrame {
    object: ObjectId,
    label: Option<String>,
    claimed: bool,
}

#[derive(Debug)]
pub struct AnchorAllocator {
    prefix: String,
    count: usize,
    shared: Option<HashSet<ObjectId>>,
    assigned: HashMap<ObjectId, String>,
    in_flight: Vec<AnchorFrame>,
}

impl AnchorAllocator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            count: 0,
            shared: None,
            assigned: HashMap::new(),
            in_flight: Vec::new(),
        }
    }

    pub fn is_prepared(&self) -> bool {
        self.shared.is_some()
    }

    /// Mark every object referenced more than once as needing an anchor.
    pub fn prepare(&mut self, reference_counts: &HashMap<ObjectId, usize>) {
        let shared: HashSet<ObjectId> = reference_counts
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(id, _)| *id)
            .collect();
        tracing::debug!(shared = shared.len(), "anchor candidates computed");
        self.shared = Some(shared);
    }

    pub fn is_shared(&self, object: ObjectId) -> bool {
        self.shared
            .as_ref()
            .is_some_and(|shared| shared.contains(&object))
    }

    /// Label already given to `object`, if it has been written.
    pub fn assigned(&self, object: ObjectId) -> Option<&str> {
        self.assigned.get(&object).map(String::as_str)
    }

    /// Next synthetic label. Labels never repeat within a pass.
    pub fn next_label(&mut self) -> String {
        self.count += 1;
        format!("{}{:03}", self.prefix, self.count)
    }

    /// Push a frame for `object` on entry; shared objects get a fresh label.
    pub fn enter(&mut self, object: ObjectId) -> Option<String> {
        let label = if self.is_shared(object) {
            let label = self.next_label();
            self.assigned.insert(object, label.clone());
            Some(label)
        } else {
            None
        };
        self.in_flight.push(AnchorFrame {
            object,
            label: label.clone(),
            claimed: false,
        });
        label
    }

    /// Take the anchor for the node being emitted. Only the first call for a
    /// frame yields its label; nested nodes see `None`.
    pub fn claim(&mut self) -> Option<String> {
        let frame = self.in_flight.last_mut()?;
        if frame.claimed {
            return None;
        }
        frame.claimed = true;
        frame.label.clone()
    }

    /// Pop the frame for `object`. Frames leave in strict reverse order.
    pub fn exit(&mut self, object: ObjectId) -> Result<()> {
        match self.in_flight.pop() {
            Some(frame) if frame.object == object => Ok(()),
            Some(frame) => Err(GraphError::invalid_operation(format!(
                "unbalanced anchor stack: exiting object {} while object {} is innermost",
                object.index(),
                frame.object.index()
            ))),
            None => Err(GraphError::invalid_operation(
                "unbalanced anchor stack: exit without entry",
            )),
        }
    }

    pub fn is_in_flight(&self, object: ObjectId) -> bool {
        self.in_flight.iter().any(|frame| frame.object == object)
    }

    pub fn depth(&self) -> usize {
        self.in_flight.len()
    }

    pub fn anchor_count(&self) -> usize {
        self.count
    }
}
