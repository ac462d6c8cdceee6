//! Declarative registry: types are described up front instead of introspected.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{
    PrimitiveKind, TypeDescriptor, TypeDescriptorFactory, TypeKey, TypeRegistry,
};
use crate::error::{GraphError, Result};
use crate::schema::tags;

/// One declaration in a serialized catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub descriptor: TypeDescriptor,
    /// Explicit tag. Defaults to `!<type name>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// A [`TypeRegistry`] and [`TypeDescriptorFactory`] over declared types.
///
/// The core-schema types (`null`, `bool`, `int`, `float`, `str`, `seq`,
/// `map`) and `any` are always present.
#[derive(Debug, Clone)]
pub struct TypeCatalog {
    descriptors: HashMap<TypeKey, TypeDescriptor>,
    tag_to_type: HashMap<String, TypeKey>,
    type_to_tag: HashMap<TypeKey, String>,
}

impl Default for TypeCatalog {
    fn default() -> Self {
        let mut catalog = Self {
            descriptors: HashMap::new(),
            tag_to_type: HashMap::new(),
            type_to_tag: HashMap::new(),
        };
        catalog.register_tagged(TypeDescriptor::dynamic(TypeKey::ANY), "!");
        for (kind, tag) in [
            (PrimitiveKind::Null, tags::NULL),
            (PrimitiveKind::Bool, tags::BOOL),
            (PrimitiveKind::Int, tags::INT),
            (PrimitiveKind::Float, tags::FLOAT),
            (PrimitiveKind::Str, tags::STR),
        ] {
            catalog.register_tagged(TypeDescriptor::primitive(kind), tag);
        }
        catalog.register_tagged(
            TypeDescriptor::sequence(TypeKey::SEQ, TypeKey::ANY),
            tags::SEQ,
        );
        catalog.register_tagged(
            TypeDescriptor::mapping(TypeKey::MAP, TypeKey::ANY, TypeKey::ANY),
            tags::MAP,
        );
        catalog
    }
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from serialized declarations on top of the defaults.
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        let mut catalog = Self::default();
        for entry in entries {
            match entry.tag {
                Some(tag) => catalog.register_tagged(entry.descriptor, tag),
                None => catalog.register(entry.descriptor),
            };
        }
        catalog
    }

    /// Load declarations from a JSON array of [`CatalogEntry`].
    pub fn from_json(input: &str) -> Result<Self> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(input)?;
        Ok(Self::from_entries(entries))
    }

    /// Register a type under its default tag `!<name>`.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> &mut Self {
        let tag = format!("!{}", descriptor.ty);
        self.register_tagged(descriptor, tag)
    }

    /// Register a type under an explicit tag. Re-registering a type replaces
    /// its previous tag.
    pub fn register_tagged(
        &mut self,
        descriptor: TypeDescriptor,
        tag: impl Into<String>,
    ) -> &mut Self {
        let tag = tag.into();
        let ty = descriptor.ty.clone();
        if let Some(previous) = self.type_to_tag.insert(ty.clone(), tag.clone()) {
            self.tag_to_type.remove(&previous);
        }
        self.tag_to_type.insert(tag, ty.clone());
        self.descriptors.insert(ty, descriptor);
        self
    }

    pub fn contains(&self, ty: &TypeKey) -> bool {
        self.descriptors.contains_key(ty)
    }
}

impl TypeRegistry for TypeCatalog {
    fn type_from_tag(&self, tag: &str) -> Option<TypeKey> {
        self.tag_to_type.get(tag).cloned()
    }

    fn tag_from_type(&self, ty: &TypeKey) -> Option<String> {
        self.type_to_tag.get(ty).cloned()
    }

    fn resolve_type(&self, name: &str) -> Option<TypeKey> {
        let key = TypeKey::new(name);
        self.descriptors.contains_key(&key).then_some(key)
    }
}

impl TypeDescriptorFactory for TypeCatalog {
    fn describe(&self, ty: &TypeKey) -> Result<TypeDescriptor> {
        self.descriptors
            .get(ty)
            .cloned()
            .ok_or_else(|| GraphError::unknown_tag(ty.as_str()))
    }
}
