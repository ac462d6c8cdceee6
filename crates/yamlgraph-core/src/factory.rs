//! Object construction during deserialization.

use std::collections::BTreeMap;

use crate::error::{GraphError, Result};
use crate::graph::{Graph, Object, ObjectData, ObjectId};
use crate::types::{DescriptorKind, TypeDescriptor};

/// Supplies new instances of composite types.
pub trait ObjectFactory: Send + Sync {
    fn create(&self, graph: &mut Graph, descriptor: &TypeDescriptor) -> Result<ObjectId>;
}

/// Allocates an empty object of the descriptor's shape. Record members start
/// at their declared defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultObjectFactory;

impl ObjectFactory for DefaultObjectFactory {
    fn create(&self, graph: &mut Graph, descriptor: &TypeDescriptor) -> Result<ObjectId> {
        let data = match &descriptor.kind {
            DescriptorKind::Record { members, .. } => ObjectData::Record(
                members
                    .iter()
                    .map(|m| (m.name.clone(), m.default.clone()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            DescriptorKind::Sequence { .. } => ObjectData::Sequence(Vec::new()),
            DescriptorKind::Mapping { .. } => ObjectData::Mapping(Vec::new()),
            DescriptorKind::Primitive { .. } | DescriptorKind::Dynamic => {
                return Err(GraphError::Construction {
                    type_key: descriptor.ty.to_string(),
                    message: format!("{} types have no object form", descriptor.shape()),
                })
            }
        };
        Ok(graph.insert(Object {
            type_key: descriptor.ty.clone(),
            data,
        }))
    }
}
