//! Object graph ⇄ document event stream mapping.
//!
//! A [`Serializer`] walks a [`Graph`] and emits node [`Event`]s, or consumes
//! events and rebuilds a graph. Shared and cyclic objects survive the round
//! trip through anchors and aliases, including aliases that appear before
//! their anchor.

pub mod anchor_table;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod factory;
pub mod graph;
pub mod key_transform;
pub mod schema;
pub mod serializer;
pub mod serializers;
pub mod style;
pub mod types;

pub use anchor_table::{AnchorAllocator, AnchorTable, LateBinding, PendingKey};
pub use config::SerializerSettings;
pub use context::{PassContext, PassState, ValueOutput};
pub use error::{ErrorKind, GraphError, Result};
pub use event::{
    Alias, Event, EventBuffer, EventReader, EventSink, EventSource, Mark, NodeStart, NodeStyle,
    ScalarEvent, Span,
};
pub use factory::{DefaultObjectFactory, ObjectFactory};
pub use graph::{Document, DocumentStats, Graph, Object, ObjectData, ObjectId, Slot, Value};
pub use key_transform::{KeyTransform, PrefixKeyTransform, ScalarKeyEncoder};
pub use schema::{CoreSchema, FailsafeSchema, Schema};
pub use serializer::Serializer;
pub use serializers::ObjectSerializer;
pub use style::StyleStack;
pub use types::{
    DescriptorKind, MemberDescriptor, PrimitiveKind, TypeCatalog, TypeDescriptor,
    TypeDescriptorFactory, TypeKey, TypeRegistry,
};
