//! Entry point: shared collaborators plus one [`PassContext`] per pass.

use std::fmt;
use std::sync::Arc;

use crate::config::SerializerSettings;
use crate::context::PassContext;
use crate::error::Result;
use crate::event::{Event, EventBuffer, EventReader, EventSink, EventSource};
use crate::factory::{DefaultObjectFactory, ObjectFactory};
use crate::graph::{Document, Graph, Value};
use crate::key_transform::{KeyTransform, ScalarKeyEncoder};
use crate::schema::{CoreSchema, Schema};
use crate::types::{TypeCatalog, TypeDescriptorFactory, TypeKey, TypeRegistry};

/// Maps object graphs to event streams and back.
///
/// The collaborators are immutable and shared, so a `Serializer` can run
/// any number of passes, including concurrently from several threads. Each
/// pass gets fresh anchor, style and descriptor state.
///
/// ```
/// use yamlgraph_core::{Graph, Object, Serializer, TypeKey, Value};
///
/// let mut graph = Graph::new();
/// let list = graph.insert(Object::sequence(TypeKey::SEQ).with_item(1i64));
/// let root = Value::Ref(list);
///
/// let serializer = Serializer::default();
/// let events = serializer.serialize_to_events(&graph, &root, &TypeKey::ANY).unwrap();
/// let document = serializer.deserialize_events(events, &TypeKey::ANY).unwrap();
/// assert!(graph.structurally_eq(&root, &document.graph, &document.root));
/// ```
#[derive(Clone)]
pub struct Serializer {
    settings: SerializerSettings,
    pub(crate) registry: Arc<dyn TypeRegistry>,
    pub(crate) descriptors: Arc<dyn TypeDescriptorFactory>,
    pub(crate) schema: Arc<dyn Schema>,
    pub(crate) factory: Arc<dyn ObjectFactory>,
    pub(crate) key_transform: Option<Arc<dyn KeyTransform>>,
    pub(crate) scalar_key_encoder: Option<Arc<ScalarKeyEncoder>>,
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new(SerializerSettings::default())
    }
}

impl fmt::Debug for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Serializer")
            .field("settings", &self.settings)
            .field("key_transform", &self.key_transform.is_some())
            .field("scalar_key_encoder", &self.scalar_key_encoder.is_some())
            .finish_non_exhaustive()
    }
}

impl Serializer {
    /// A serializer knowing only the core-schema types.
    pub fn new(settings: SerializerSettings) -> Self {
        Self::with_catalog(settings, TypeCatalog::new())
    }

    /// A serializer whose registry and descriptors come from `catalog`.
    pub fn with_catalog(settings: SerializerSettings, catalog: TypeCatalog) -> Self {
        let catalog = Arc::new(catalog);
        Self {
            settings,
            registry: catalog.clone(),
            descriptors: catalog,
            schema: Arc::new(CoreSchema::new()),
            factory: Arc::new(DefaultObjectFactory),
            key_transform: None,
            scalar_key_encoder: None,
        }
    }

    pub fn with_registry(
        mut self,
        registry: Arc<dyn TypeRegistry>,
        descriptors: Arc<dyn TypeDescriptorFactory>,
    ) -> Self {
        self.registry = registry;
        self.descriptors = descriptors;
        self
    }

    pub fn with_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.schema = Arc::new(schema);
        self
    }

    pub fn with_object_factory(mut self, factory: impl ObjectFactory + 'static) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    pub fn with_key_transform(mut self, transform: impl KeyTransform + 'static) -> Self {
        self.key_transform = Some(Arc::new(transform));
        self
    }

    /// Rewrite the text of string keys as they are written.
    pub fn with_scalar_key_encoder(
        mut self,
        encoder: impl Fn(&Value, &str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.scalar_key_encoder = Some(Arc::new(encoder));
        self
    }

    pub fn settings(&self) -> &SerializerSettings {
        &self.settings
    }

    /// Write `root` to `sink`. Events emitted before a failure stay in the
    /// sink.
    pub fn serialize(
        &self,
        graph: &Graph,
        root: &Value,
        expected: &TypeKey,
        sink: &mut dyn EventSink,
    ) -> Result<()> {
        let mut ctx = PassContext::new(self);
        ctx.bind_sink(sink, graph)?;
        ctx.serialize_document(root, expected)
    }

    pub fn serialize_to_events(
        &self,
        graph: &Graph,
        root: &Value,
        expected: &TypeKey,
    ) -> Result<Vec<Event>> {
        let mut buffer = EventBuffer::new();
        self.serialize(graph, root, expected, &mut buffer)?;
        Ok(buffer.into_events())
    }

    /// Read one document from `source` into a fresh graph.
    pub fn deserialize(&self, source: &mut dyn EventSource, expected: &TypeKey) -> Result<Document> {
        let mut ctx = PassContext::new(self);
        ctx.bind_source(source)?;
        ctx.deserialize_document(expected)?;
        let document = ctx.into_document()?;
        tracing::debug!(
            objects = document.graph.len(),
            anchors = document.stats.anchors,
            late_bindings = document.stats.late_bindings,
            "document deserialized"
        );
        Ok(document)
    }

    pub fn deserialize_events(&self, events: Vec<Event>, expected: &TypeKey) -> Result<Document> {
        let mut reader = EventReader::new(events);
        self.deserialize(&mut reader, expected)
    }
}
