//! Type identity, structural descriptors and the registry interfaces.
//!
//! A [`TypeKey`] names a type; a [`TypeDescriptor`] describes its shape.
//! [`TypeRegistry`] maps tags to types and back, [`TypeDescriptorFactory`]
//! turns a type into its descriptor. [`TypeCatalog`] implements both from
//! declarations made up front, and [`DescriptorCache`] memoizes descriptor
//! lookups for the duration of one pass.

mod cache;
mod catalog;

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::event::NodeStyle;
use crate::graph::Value;

pub use cache::DescriptorCache;
pub use catalog::{CatalogEntry, TypeCatalog};

/// Name of a type known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeKey(Cow<'static, str>);

impl TypeKey {
    /// Unknown or dynamic type; the document decides the shape.
    pub const ANY: TypeKey = TypeKey(Cow::Borrowed("any"));
    pub const NULL: TypeKey = TypeKey(Cow::Borrowed("null"));
    pub const BOOL: TypeKey = TypeKey(Cow::Borrowed("bool"));
    pub const INT: TypeKey = TypeKey(Cow::Borrowed("int"));
    pub const FLOAT: TypeKey = TypeKey(Cow::Borrowed("float"));
    pub const STR: TypeKey = TypeKey(Cow::Borrowed("str"));
    /// Untyped sequence of `any`.
    pub const SEQ: TypeKey = TypeKey(Cow::Borrowed("seq"));
    /// Untyped mapping of `any` to `any`.
    pub const MAP: TypeKey = TypeKey(Cow::Borrowed("map"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_any(&self) -> bool {
        *self == Self::ANY
    }

    /// Types whose shape is recovered from an untagged node when the
    /// expected type is [`TypeKey::ANY`].
    pub fn is_implicit(&self) -> bool {
        matches!(
            self.as_str(),
            "null" | "bool" | "int" | "float" | "str" | "seq" | "map"
        )
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrimitiveKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
}

impl PrimitiveKind {
    pub fn type_key(self) -> TypeKey {
        match self {
            Self::Null => TypeKey::NULL,
            Self::Bool => TypeKey::BOOL,
            Self::Int => TypeKey::INT,
            Self::Float => TypeKey::FLOAT,
            Self::Str => TypeKey::STR,
        }
    }
}

/// One serialized member of a record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MemberDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeKey,
    /// Value a freshly constructed object holds; members equal to it are
    /// elided on emission unless defaults are emitted.
    #[serde(default = "null_value")]
    pub default: Value,
    /// Style hint for the member's value node.
    #[serde(default)]
    pub style: NodeStyle,
}

fn null_value() -> Value {
    Value::Null
}

impl MemberDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeKey) -> Self {
        Self {
            name: name.into(),
            ty,
            default: Value::Null,
            style: NodeStyle::Any,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = default;
        self
    }

    pub fn with_style(mut self, style: NodeStyle) -> Self {
        self.style = style;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DescriptorKind {
    Primitive {
        primitive: PrimitiveKind,
    },
    Record {
        members: Vec<MemberDescriptor>,
        /// Per-type override of the pass-wide `emit-defaults` setting.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        emit_defaults: Option<bool>,
    },
    Sequence {
        item: TypeKey,
    },
    Mapping {
        key: TypeKey,
        value: TypeKey,
    },
    Dynamic,
}

/// Structural description of a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    #[serde(rename = "type")]
    pub ty: TypeKey,
    pub kind: DescriptorKind,
}

impl TypeDescriptor {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self {
            ty: kind.type_key(),
            kind: DescriptorKind::Primitive { primitive: kind },
        }
    }

    pub fn record(ty: TypeKey, members: Vec<MemberDescriptor>) -> Self {
        Self {
            ty,
            kind: DescriptorKind::Record {
                members,
                emit_defaults: None,
            },
        }
    }

    pub fn sequence(ty: TypeKey, item: TypeKey) -> Self {
        Self {
            ty,
            kind: DescriptorKind::Sequence { item },
        }
    }

    pub fn mapping(ty: TypeKey, key: TypeKey, value: TypeKey) -> Self {
        Self {
            ty,
            kind: DescriptorKind::Mapping { key, value },
        }
    }

    pub fn dynamic(ty: TypeKey) -> Self {
        Self {
            ty,
            kind: DescriptorKind::Dynamic,
        }
    }

    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        match &self.kind {
            DescriptorKind::Record { members, .. } => members.iter().find(|m| m.name == name),
            _ => None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.kind, DescriptorKind::Dynamic)
    }

    /// Short name of the shape, for diagnostics.
    pub fn shape(&self) -> &'static str {
        match self.kind {
            DescriptorKind::Primitive { .. } => "scalar",
            DescriptorKind::Record { .. } => "record",
            DescriptorKind::Sequence { .. } => "sequence",
            DescriptorKind::Mapping { .. } => "mapping",
            DescriptorKind::Dynamic => "dynamic",
        }
    }
}

/// Bidirectional tag ↔ type mapping. Tag comparison is case-sensitive.
pub trait TypeRegistry: Send + Sync {
    fn type_from_tag(&self, tag: &str) -> Option<TypeKey>;

    fn tag_from_type(&self, ty: &TypeKey) -> Option<String>;

    /// Look a type up by its qualified name.
    fn resolve_type(&self, name: &str) -> Option<TypeKey>;
}

/// Turns a type into its structural descriptor.
pub trait TypeDescriptorFactory: Send + Sync {
    fn describe(&self, ty: &TypeKey) -> Result<TypeDescriptor>;
}
