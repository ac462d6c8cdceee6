//! Per-pass coordination context.
//!
//! A [`PassContext`] drives exactly one serialize or deserialize pass. It is
//! bound once to either an [`EventSource`] or an [`EventSink`], selects the
//! serializer strategy from the settings at that moment, and is then handed
//! to the strategy on every nested node. All pass-scoped state lives here:
//! the anchor table and its pending late bindings, the anchor allocator and
//! in-flight anchor stack, the style stack, and the descriptor cache.
//!
//! ```text
//! Created ──bind──▶ Bound ──read/write──▶ Active ──finish──▶ (Finalizing) ──▶ Done
//! ```
//!
//! Deserialization passes go through `Finalizing`, where every late binding
//! is resolved exactly once. Nothing re-enters `Active` after `Done`.

use std::sync::Arc;

use crate::anchor_table::{AnchorAllocator, AnchorTable, LateBinding, PendingKey};
use crate::config::SerializerSettings;
use crate::error::{GraphError, Result};
use crate::event::{Alias, Event, EventSink, EventSource, NodeStyle, ScalarEvent, Span};
use crate::factory::ObjectFactory;
use crate::graph::{Document, DocumentStats, Graph, Object, ObjectId, Slot, Value};
use crate::key_transform::{KeyTransform, ScalarKeyEncoder};
use crate::schema::Schema;
use crate::serializer::Serializer;
use crate::serializers::ObjectSerializer;
use crate::style::StyleStack;
use crate::types::{DescriptorCache, TypeDescriptor, TypeKey, TypeRegistry};

static EMPTY_GRAPH: Graph = Graph::new();

/// Result of reading one node.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueOutput {
    Value(Value),
    /// The node was an alias whose anchor has not been seen yet. The caller
    /// owns the slot the value belongs in and must register a late binding
    /// for it.
    Alias(Alias),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Created,
    Bound,
    Active,
    Finalizing,
    Done,
}

enum Role<'a> {
    Reader {
        source: &'a mut dyn EventSource,
        graph: Graph,
        root: Option<Value>,
    },
    Writer {
        sink: &'a mut dyn EventSink,
        graph: &'a Graph,
    },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

pub struct PassContext<'a> {
    settings: SerializerSettings,
    registry: Arc<dyn TypeRegistry>,
    schema: Arc<dyn Schema>,
    factory: Arc<dyn ObjectFactory>,
    key_transform: Option<Arc<dyn KeyTransform>>,
    scalar_key_encoder: Option<Arc<ScalarKeyEncoder>>,
    descriptors: DescriptorCache,
    anchors: AnchorTable,
    anchor_labels: AnchorAllocator,
    styles: StyleStack,
    strategy: Option<ObjectSerializer>,
    role: Option<Role<'a>>,
    state: PassState,
    depth: usize,
    last_span: Span,
    resolved_bindings: usize,
}

impl<'a> PassContext<'a> {
    pub fn new(serializer: &Serializer) -> Self {
        let settings = serializer.settings().clone();
        let anchor_labels = AnchorAllocator::new(settings.anchor_prefix.clone());
        Self {
            registry: Arc::clone(&serializer.registry),
            schema: Arc::clone(&serializer.schema),
            factory: Arc::clone(&serializer.factory),
            key_transform: serializer.key_transform.clone(),
            scalar_key_encoder: serializer.scalar_key_encoder.clone(),
            descriptors: DescriptorCache::new(Arc::clone(&serializer.descriptors)),
            anchors: AnchorTable::new(),
            anchor_labels,
            styles: StyleStack::new(),
            strategy: None,
            role: None,
            state: PassState::Created,
            depth: 0,
            last_span: Span::default(),
            resolved_bindings: 0,
            settings,
        }
    }

    // -----------------------------------------------------------------------
    // Binding
    // -----------------------------------------------------------------------

    /// Bind the pass to a document source (deserialization).
    pub fn bind_source(&mut self, source: &'a mut dyn EventSource) -> Result<()> {
        self.ensure_unbound("source")?;
        self.role = Some(Role::Reader {
            source,
            graph: Graph::new(),
            root: None,
        });
        self.attach_strategy();
        Ok(())
    }

    /// Bind the pass to a document sink (serialization) over `graph`.
    pub fn bind_sink(&mut self, sink: &'a mut dyn EventSink, graph: &'a Graph) -> Result<()> {
        self.ensure_unbound("sink")?;
        self.role = Some(Role::Writer { sink, graph });
        self.attach_strategy();
        Ok(())
    }

    fn ensure_unbound(&self, role: &str) -> Result<()> {
        if self.role.is_some() || self.state != PassState::Created {
            return Err(GraphError::invalid_operation(format!(
                "pass is already bound; cannot bind a {role}"
            )));
        }
        Ok(())
    }

    fn attach_strategy(&mut self) {
        let strategy = ObjectSerializer::for_settings(&self.settings);
        tracing::debug!(
            ?strategy,
            serializing = self.is_serializing(),
            "pass bound"
        );
        self.strategy = Some(strategy);
        self.state = PassState::Bound;
    }

    pub fn is_serializing(&self) -> bool {
        matches!(self.role, Some(Role::Writer { .. }))
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn strategy(&self) -> Option<ObjectSerializer> {
        self.strategy
    }

    pub fn settings(&self) -> &SerializerSettings {
        &self.settings
    }

    /// Current nesting depth of read/write calls.
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn ensure_active(&mut self, direction: Direction) -> Result<()> {
        match self.state {
            PassState::Bound | PassState::Active => {}
            PassState::Created => {
                return Err(GraphError::invalid_operation("pass is not bound"));
            }
            PassState::Finalizing | PassState::Done => {
                return Err(GraphError::invalid_operation("pass is already finished"));
            }
        }
        match (direction, self.is_serializing()) {
            (Direction::Read, false) | (Direction::Write, true) => {
                self.state = PassState::Active;
                Ok(())
            }
            (Direction::Read, true) => Err(not_reading()),
            (Direction::Write, false) => Err(not_writing()),
        }
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Read the node under the cursor as `expected`, reusing `existing` when
    /// the strategy can populate it in place.
    ///
    /// Failures without a position are wrapped once with the span of the
    /// node being read; errors that already carry a position pass through.
    pub fn read_value(&mut self, existing: Option<Value>, expected: &TypeKey) -> Result<ValueOutput> {
        self.ensure_active(Direction::Read)?;
        let (span, node) = {
            let event = self.current_event()?;
            (event.span(), event.describe())
        };

        let result = self.descend(|ctx, strategy| {
            let descriptor = ctx.find_type_descriptor(expected)?;
            strategy.read(ctx, existing, &descriptor)
        });

        result.map_err(|err| {
            if err.has_position() {
                err
            } else {
                GraphError::Wrapped {
                    span,
                    node,
                    source: Box::new(err),
                }
            }
        })
    }

    /// Write `value`, described by its runtime type (or by `expected` when
    /// the value is null).
    pub fn write_value(&mut self, value: &Value, expected: &TypeKey) -> Result<()> {
        self.ensure_active(Direction::Write)?;
        let runtime = match value {
            Value::Ref(id) => self.output_graph()?.object(*id)?.type_key.clone(),
            Value::Null => expected.clone(),
            scalar => scalar.scalar_type().unwrap_or(TypeKey::ANY),
        };

        self.descend(|ctx, strategy| {
            let descriptor = ctx.find_type_descriptor(&runtime)?;
            strategy.write(ctx, value, expected, &descriptor)
        })
    }

    fn descend<T>(
        &mut self,
        f: impl FnOnce(&mut Self, ObjectSerializer) -> Result<T>,
    ) -> Result<T> {
        let strategy = self
            .strategy
            .ok_or_else(|| GraphError::invalid_operation("no serializer strategy attached"))?;
        if self.depth >= self.settings.max_depth {
            return Err(GraphError::DepthExceeded {
                max_depth: self.settings.max_depth,
            });
        }
        self.depth += 1;
        let result = f(self, strategy);
        self.depth -= 1;
        result
    }

    /// Read the whole document: the root node, a check that nothing follows
    /// it, then late-binding resolution.
    pub fn deserialize_document(&mut self, expected: &TypeKey) -> Result<()> {
        match self.read_value(None, expected)? {
            ValueOutput::Value(value) => self.assign(&Slot::Root, value)?,
            ValueOutput::Alias(alias) => self.register_late_binding(alias, Slot::Root)?,
        }
        if let Some(event) = self.peek_event() {
            return Err(GraphError::structural(
                event.span(),
                format!("unexpected {} after the document root", event.describe()),
            ));
        }
        self.finish()
    }

    /// Write `root` as the whole document and finish the pass.
    pub fn serialize_document(&mut self, root: &Value, expected: &TypeKey) -> Result<()> {
        self.write_value(root, expected)?;
        self.finish()
    }

    /// Complete the pass. Deserialization resolves all late bindings here.
    pub fn finish(&mut self) -> Result<()> {
        if self.is_serializing() {
            if matches!(self.state, PassState::Finalizing | PassState::Done) {
                return Err(GraphError::invalid_operation("pass is already finished"));
            }
            if !self.styles.is_empty() {
                tracing::warn!(depth = self.styles.depth(), "style stack not empty at end of pass");
            }
            self.state = PassState::Done;
            Ok(())
        } else {
            self.resolve_late_bindings()
        }
    }

    /// Consume a finished deserialization pass.
    pub fn into_document(self) -> Result<Document> {
        if self.state != PassState::Done {
            return Err(GraphError::invalid_operation("pass is not finished"));
        }
        let stats = DocumentStats {
            anchors: self.anchors.len(),
            late_bindings: self.resolved_bindings,
        };
        match self.role {
            Some(Role::Reader {
                graph,
                root: Some(root),
                ..
            }) => Ok(Document { graph, root, stats }),
            Some(Role::Reader { root: None, .. }) => {
                Err(GraphError::invalid_operation("no document root was read"))
            }
            _ => Err(not_reading()),
        }
    }

    // -----------------------------------------------------------------------
    // Source / sink plumbing for strategies
    // -----------------------------------------------------------------------

    /// The event under the cursor. Running out of events is a structural
    /// error.
    pub fn current_event(&self) -> Result<&Event> {
        match &self.role {
            Some(Role::Reader { source, .. }) => source.current().ok_or_else(|| {
                GraphError::structural(self.last_span, "unexpected end of event stream")
            }),
            _ => Err(not_reading()),
        }
    }

    pub fn peek_event(&self) -> Option<&Event> {
        match &self.role {
            Some(Role::Reader { source, .. }) => source.current(),
            _ => None,
        }
    }

    pub fn advance(&mut self) -> Result<()> {
        match &mut self.role {
            Some(Role::Reader { source, .. }) => {
                if let Some(event) = source.current() {
                    self.last_span = event.span();
                }
                source.advance();
                Ok(())
            }
            _ => Err(not_reading()),
        }
    }

    pub fn emit(&mut self, event: Event) -> Result<()> {
        match &mut self.role {
            Some(Role::Writer { sink, .. }) => sink.emit(event),
            _ => Err(not_writing()),
        }
    }

    /// The graph being built (reading) or walked (writing).
    pub fn graph(&self) -> &Graph {
        match &self.role {
            Some(Role::Reader { graph, .. }) => graph,
            Some(Role::Writer { graph, .. }) => graph,
            None => &EMPTY_GRAPH,
        }
    }

    pub fn graph_mut(&mut self) -> Result<&mut Graph> {
        match &mut self.role {
            Some(Role::Reader { graph, .. }) => Ok(graph),
            _ => Err(not_reading()),
        }
    }

    /// The graph being serialized, borrowed for the whole pass so strategies
    /// can walk it while emitting.
    pub(crate) fn output_graph(&self) -> Result<&'a Graph> {
        match &self.role {
            Some(Role::Writer { graph, .. }) => Ok(*graph),
            _ => Err(not_writing()),
        }
    }

    /// Allocate a new object through the configured factory.
    pub fn create_object(&mut self, descriptor: &TypeDescriptor) -> Result<ObjectId> {
        let factory = Arc::clone(&self.factory);
        factory.create(self.graph_mut()?, descriptor)
    }

    // -----------------------------------------------------------------------
    // Type resolution
    // -----------------------------------------------------------------------

    pub fn find_type_descriptor(&mut self, ty: &TypeKey) -> Result<Arc<TypeDescriptor>> {
        self.descriptors.find(ty)
    }

    pub fn resolve_tag_to_type(&self, tag: &str) -> Result<TypeKey> {
        self.registry
            .type_from_tag(tag)
            .ok_or_else(|| GraphError::unknown_tag(tag))
    }

    pub fn resolve_type_to_tag(&self, ty: &TypeKey) -> Option<String> {
        self.registry.tag_from_type(ty)
    }

    /// Optional dynamic lookup; an unknown name is `None`, not an error.
    pub fn resolve_type_by_name(&self, name: &str) -> Option<TypeKey> {
        self.registry.resolve_type(name)
    }

    pub fn try_resolve_scalar(&self, scalar: &ScalarEvent) -> Option<(String, Value)> {
        self.schema.try_parse(scalar)
    }

    // -----------------------------------------------------------------------
    // Key transform
    // -----------------------------------------------------------------------

    fn with_key_transform<T>(
        &self,
        object: ObjectId,
        f: impl FnOnce(&dyn KeyTransform, &Object) -> T,
    ) -> Option<T> {
        let transform = self.key_transform.as_deref()?;
        let object = self.graph().get(object)?;
        Some(f(transform, object))
    }

    pub fn decode_key_pre(&self, object: ObjectId, descriptor: &TypeDescriptor, raw: &str) -> String {
        self.with_key_transform(object, |t, o| t.decode_pre(o, descriptor, raw))
            .flatten()
            .unwrap_or_else(|| raw.to_string())
    }

    pub fn decode_key_post(
        &self,
        object: ObjectId,
        descriptor: &TypeDescriptor,
        key: &str,
        value: Option<&Value>,
    ) {
        self.with_key_transform(object, |t, o| t.decode_post(o, descriptor, key, value));
    }

    pub fn encode_key(&self, object: ObjectId, descriptor: &TypeDescriptor, key: &str) -> String {
        self.with_key_transform(object, |t, o| t.encode(o, descriptor, key))
            .unwrap_or_else(|| key.to_string())
    }

    /// Final say over the text written for a string key, after
    /// [`encode_key`](Self::encode_key). Identity without an encoder.
    pub fn encode_scalar_key(&self, key: &Value, text: String) -> String {
        match &self.scalar_key_encoder {
            Some(encoder) => encoder(key, &text),
            None => text,
        }
    }

    // -----------------------------------------------------------------------
    // Anchors and late binding
    // -----------------------------------------------------------------------

    fn check_anchor_tracking(&self, operation: &str) -> Result<()> {
        match self.strategy {
            Some(strategy) if strategy.tracks_anchors() => Ok(()),
            _ => Err(GraphError::invalid_operation(format!(
                "{operation} requires the anchor-aware serializer; anchor tracking is disabled for this pass"
            ))),
        }
    }

    /// Value named by `alias`.
    pub fn get_alias_value(&self, alias: &Alias) -> Result<Value> {
        self.check_anchor_tracking("alias resolution")?;
        self.anchors
            .get(&alias.label)
            .cloned()
            .ok_or_else(|| GraphError::AliasNotFound {
                label: alias.label.clone(),
                span: alias.span,
            })
    }

    /// Defer assigning `alias`' target into `slot` until the document has
    /// been consumed.
    pub fn register_late_binding(&mut self, alias: Alias, slot: Slot) -> Result<()> {
        self.check_anchor_tracking("late binding")?;
        tracing::debug!(alias = %alias.label, ?slot, "late binding registered");
        self.anchors.push_late_binding(LateBinding {
            alias,
            slot,
            key: None,
        });
        Ok(())
    }

    /// Late binding for a mapping key. Once resolved, a string key goes
    /// through the same decode hooks as a key read in place.
    pub fn register_late_key_binding(
        &mut self,
        alias: Alias,
        slot: Slot,
        descriptor: &Arc<TypeDescriptor>,
        value_pending: bool,
    ) -> Result<()> {
        self.check_anchor_tracking("late binding")?;
        tracing::debug!(alias = %alias.label, ?slot, "late key binding registered");
        self.anchors.push_late_binding(LateBinding {
            alias,
            slot,
            key: Some(PendingKey {
                descriptor: Arc::clone(descriptor),
                value_pending,
            }),
        });
        Ok(())
    }

    /// Resolve every pending late binding, in registration order. Runs once;
    /// an alias still unknown here fails the pass.
    pub fn resolve_late_bindings(&mut self) -> Result<()> {
        match self.state {
            PassState::Bound | PassState::Active => {}
            PassState::Created => return Err(GraphError::invalid_operation("pass is not bound")),
            PassState::Finalizing | PassState::Done => {
                return Err(GraphError::invalid_operation(
                    "late bindings were already resolved",
                ))
            }
        }
        if self.is_serializing() {
            return Err(not_reading());
        }

        self.state = PassState::Finalizing;
        let bindings = self.anchors.take_late_bindings();
        tracing::debug!(count = bindings.len(), "resolving late bindings");
        for binding in bindings {
            let value = self.get_alias_value(&binding.alias)?;
            match (&binding.key, &binding.slot) {
                (Some(key), Slot::EntryKey { object, index }) => {
                    self.assign_late_key(*object, *index, key, value)?
                }
                _ => self.assign(&binding.slot, value)?,
            }
            self.resolved_bindings += 1;
        }
        self.state = PassState::Done;
        Ok(())
    }

    fn assign_late_key(
        &mut self,
        object: ObjectId,
        index: usize,
        key: &PendingKey,
        value: Value,
    ) -> Result<()> {
        let value = match value {
            Value::Str(raw) => Value::Str(self.decode_key_pre(object, &key.descriptor, &raw)),
            other => other,
        };
        let name = value.as_str().map(str::to_string);
        self.assign(&Slot::EntryKey { object, index }, value)?;

        if let Some(name) = name {
            let entry_value = if key.value_pending {
                None
            } else {
                self.graph()
                    .get(object)
                    .and_then(|o| o.entries().get(index))
                    .map(|(_, v)| v.clone())
            };
            self.decode_key_post(object, &key.descriptor, &name, entry_value.as_ref());
        }
        Ok(())
    }

    fn assign(&mut self, slot: &Slot, value: Value) -> Result<()> {
        match &mut self.role {
            Some(Role::Reader { root, .. }) if *slot == Slot::Root => {
                *root = Some(value);
                Ok(())
            }
            Some(Role::Reader { graph, .. }) => graph.assign(slot, value),
            _ => Err(not_reading()),
        }
    }

    pub fn anchors(&self) -> &AnchorTable {
        &self.anchors
    }

    pub(crate) fn anchors_mut(&mut self) -> &mut AnchorTable {
        &mut self.anchors
    }

    /// Bind the anchor of the node being read to its freshly allocated
    /// object, before any child is read.
    pub fn publish_object(&mut self, object: ObjectId) -> Result<()> {
        self.anchors.bind_scope(&Value::Ref(object))
    }

    pub fn anchor_labels(&self) -> &AnchorAllocator {
        &self.anchor_labels
    }

    pub(crate) fn anchor_labels_mut(&mut self) -> &mut AnchorAllocator {
        &mut self.anchor_labels
    }

    /// Anchor for the node about to be emitted, if it was given one.
    pub fn take_anchor(&mut self) -> Option<String> {
        self.anchor_labels.claim()
    }

    /// A fresh synthetic anchor label, unique within this pass.
    pub fn next_anchor_label(&mut self) -> String {
        self.anchor_labels.next_label()
    }

    // -----------------------------------------------------------------------
    // Styles
    // -----------------------------------------------------------------------

    pub fn push_style(&mut self, style: NodeStyle) {
        self.styles.push(style);
    }

    pub fn pop_style(&mut self) -> NodeStyle {
        self.styles.pop()
    }

    pub fn style_depth(&self) -> usize {
        self.styles.depth()
    }
}

fn not_reading() -> GraphError {
    GraphError::invalid_operation("pass is not bound to an event source")
}

fn not_writing() -> GraphError {
    GraphError::invalid_operation("pass is not bound to an event sink")
}
