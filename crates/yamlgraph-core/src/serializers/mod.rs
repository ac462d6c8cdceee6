//! Serializer strategies.
//!
//! A pass picks one strategy when it is bound and keeps it until it ends:
//!
//! - [`ObjectSerializer::Plain`] encodes the structure of each node and
//!   nothing else. Shared objects are written once per reference; aliases
//!   in the input are rejected.
//! - [`ObjectSerializer::Anchored`] wraps the plain strategy with identity
//!   tracking: anchors are declared for objects referenced more than once,
//!   aliases are resolved on read, and forward aliases become late bindings.

mod anchor;
mod node;

use std::sync::Arc;

use crate::config::SerializerSettings;
use crate::context::{PassContext, ValueOutput};
use crate::error::Result;
use crate::graph::Value;
use crate::types::{TypeDescriptor, TypeKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectSerializer {
    Plain,
    Anchored,
}

impl ObjectSerializer {
    pub fn for_settings(settings: &SerializerSettings) -> Self {
        if settings.track_anchors {
            Self::Anchored
        } else {
            Self::Plain
        }
    }

    pub fn tracks_anchors(self) -> bool {
        matches!(self, Self::Anchored)
    }

    pub(crate) fn read(
        self,
        ctx: &mut PassContext<'_>,
        existing: Option<Value>,
        descriptor: &Arc<TypeDescriptor>,
    ) -> Result<ValueOutput> {
        match self {
            Self::Plain => node::read(ctx, existing, descriptor).map(ValueOutput::Value),
            Self::Anchored => anchor::read(ctx, existing, descriptor),
        }
    }

    pub(crate) fn write(
        self,
        ctx: &mut PassContext<'_>,
        value: &Value,
        expected: &TypeKey,
        descriptor: &TypeDescriptor,
    ) -> Result<()> {
        match self {
            Self::Plain => node::write(ctx, value, expected, descriptor),
            Self::Anchored => anchor::write(ctx, value, expected, descriptor),
        }
    }
}
