//! Arena-backed object graph.
//!
//! Composite nodes live in a [`Graph`] and are addressed by [`ObjectId`];
//! scalars are stored inline in [`Value`]. Identity is the `ObjectId`, so a
//! shared or cyclic structure is expressed by storing the same id in more
//! than one place.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::types::TypeKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(usize);

impl ObjectId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Ref(ObjectId),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Runtime type of a scalar value. Objects answer through their
    /// [`Object::type_key`] instead.
    pub fn scalar_type(&self) -> Option<TypeKey> {
        match self {
            Self::Null => Some(TypeKey::NULL),
            Self::Bool(_) => Some(TypeKey::BOOL),
            Self::Int(_) => Some(TypeKey::INT),
            Self::Float(_) => Some(TypeKey::FLOAT),
            Self::Str(_) => Some(TypeKey::STR),
            Self::Ref(_) => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Self::Ref(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectData {
    Record(BTreeMap<String, Value>),
    Sequence(Vec<Value>),
    Mapping(Vec<(Value, Value)>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    #[serde(rename = "type")]
    pub type_key: TypeKey,
    pub data: ObjectData,
}

impl Object {
    pub fn record(type_key: TypeKey) -> Self {
        Self {
            type_key,
            data: ObjectData::Record(BTreeMap::new()),
        }
    }

    pub fn sequence(type_key: TypeKey) -> Self {
        Self {
            type_key,
            data: ObjectData::Sequence(Vec::new()),
        }
    }

    pub fn mapping(type_key: TypeKey) -> Self {
        Self {
            type_key,
            data: ObjectData::Mapping(Vec::new()),
        }
    }

    /// Builder-style member assignment for record objects.
    pub fn with_member(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        if let ObjectData::Record(fields) = &mut self.data {
            fields.insert(name.into(), value.into());
        }
        self
    }

    /// Builder-style append for sequence objects.
    pub fn with_item(mut self, value: impl Into<Value>) -> Self {
        if let ObjectData::Sequence(items) = &mut self.data {
            items.push(value.into());
        }
        self
    }

    /// Builder-style append for mapping objects.
    pub fn with_entry(mut self, key: impl Into<Value>, value: impl Into<Value>) -> Self {
        if let ObjectData::Mapping(entries) = &mut self.data {
            entries.push((key.into(), value.into()));
        }
        self
    }

    pub fn member(&self, name: &str) -> Option<&Value> {
        match &self.data {
            ObjectData::Record(fields) => fields.get(name),
            _ => None,
        }
    }

    pub fn items(&self) -> &[Value] {
        match &self.data {
            ObjectData::Sequence(items) => items,
            _ => &[],
        }
    }

    pub fn entries(&self) -> &[(Value, Value)] {
        match &self.data {
            ObjectData::Mapping(entries) => entries,
            _ => &[],
        }
    }

    /// Every value directly held by this object, keys included.
    fn children(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match &self.data {
            ObjectData::Record(fields) => Box::new(fields.values()),
            ObjectData::Sequence(items) => Box::new(items.iter()),
            ObjectData::Mapping(entries) => Box::new(entries.iter().flat_map(|(k, v)| [k, v])),
        }
    }
}

/// Addressable location inside the graph, used as the target of a late
/// binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// The document root, held by the pass rather than the arena.
    Root,
    Member { object: ObjectId, name: String },
    Element { object: ObjectId, index: usize },
    EntryKey { object: ObjectId, index: usize },
    EntryValue { object: ObjectId, index: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    objects: Vec<Object>,
}

impl Graph {
    pub const fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn insert(&mut self, object: Object) -> ObjectId {
        self.objects.push(object);
        ObjectId(self.objects.len() - 1)
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.0)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id.0)
    }

    /// Like [`get`](Self::get), failing on a dangling id.
    pub fn object(&self, id: ObjectId) -> Result<&Object> {
        self.get(id)
            .ok_or_else(|| GraphError::invalid_operation(format!("dangling object id {}", id.0)))
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(i, object)| (ObjectId(i), object))
    }

    /// Store `value` at `slot`. Sequence and mapping slots must already
    /// exist; record members are inserted or replaced.
    pub fn assign(&mut self, slot: &Slot, value: Value) -> Result<()> {
        let (object, description) = match slot {
            Slot::Root => {
                return Err(GraphError::invalid_operation(
                    "the root slot is not part of the arena",
                ))
            }
            Slot::Member { object, .. } => (*object, "record"),
            Slot::Element { object, .. } => (*object, "sequence"),
            Slot::EntryKey { object, .. } | Slot::EntryValue { object, .. } => {
                (*object, "mapping")
            }
        };
        let target = self.get_mut(object).ok_or_else(|| {
            GraphError::invalid_operation(format!("dangling object id {}", object.0))
        })?;

        let stored = match (slot, &mut target.data) {
            (Slot::Member { name, .. }, ObjectData::Record(fields)) => {
                fields.insert(name.clone(), value);
                true
            }
            (Slot::Element { index, .. }, ObjectData::Sequence(items)) => {
                items.get_mut(*index).map(|item| *item = value).is_some()
            }
            (Slot::EntryKey { index, .. }, ObjectData::Mapping(entries)) => {
                entries.get_mut(*index).map(|(k, _)| *k = value).is_some()
            }
            (Slot::EntryValue { index, .. }, ObjectData::Mapping(entries)) => {
                entries.get_mut(*index).map(|(_, v)| *v = value).is_some()
            }
            _ => false,
        };

        if stored {
            Ok(())
        } else {
            Err(GraphError::invalid_operation(format!(
                "slot {slot:?} does not address a {description} location of object {}",
                object.0
            )))
        }
    }

    /// Append to a sequence object, returning the new element's index.
    pub fn push_item(&mut self, id: ObjectId, value: Value) -> Result<usize> {
        match self.get_mut(id).map(|object| &mut object.data) {
            Some(ObjectData::Sequence(items)) => {
                items.push(value);
                Ok(items.len() - 1)
            }
            _ => Err(GraphError::invalid_operation(format!(
                "object {} is not a sequence",
                id.0
            ))),
        }
    }

    /// Append to a mapping object, returning the new entry's index.
    pub fn push_entry(&mut self, id: ObjectId, key: Value, value: Value) -> Result<usize> {
        match self.get_mut(id).map(|object| &mut object.data) {
            Some(ObjectData::Mapping(entries)) => {
                entries.push((key, value));
                Ok(entries.len() - 1)
            }
            _ => Err(GraphError::invalid_operation(format!(
                "object {} is not a mapping",
                id.0
            ))),
        }
    }

    /// Count how many times each object reachable from `root` is referenced.
    /// The root reference itself counts once.
    pub fn reference_counts(&self, root: &Value) -> HashMap<ObjectId, usize> {
        let mut counts: HashMap<ObjectId, usize> = HashMap::new();
        let mut stack: Vec<ObjectId> = Vec::new();

        if let Some(id) = root.as_object() {
            counts.insert(id, 1);
            stack.push(id);
        }

        while let Some(id) = stack.pop() {
            let Some(object) = self.get(id) else {
                continue;
            };
            for child in object.children() {
                if let Some(child_id) = child.as_object() {
                    let count = counts.entry(child_id).or_insert(0);
                    *count += 1;
                    if *count == 1 {
                        stack.push(child_id);
                    }
                }
            }
        }

        counts
    }

    /// Structural equality of `a` in this graph and `b` in `other`.
    ///
    /// Object identity is compared up to isomorphism: cycles are followed
    /// once, and a pair of objects already under comparison is assumed equal.
    pub fn structurally_eq(&self, a: &Value, other: &Graph, b: &Value) -> bool {
        let mut assumed = HashSet::new();
        values_eq(self, a, other, b, &mut assumed)
    }
}

/// Counters reported by a finished deserialization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DocumentStats {
    /// Anchors declared in the document.
    pub anchors: usize,
    /// Forward aliases patched in after the document was consumed.
    pub late_bindings: usize,
}

/// A deserialized document: the graph it built and its root value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub graph: Graph,
    pub root: Value,
    #[serde(default)]
    pub stats: DocumentStats,
}

impl Document {
    /// Object at the root, if the root is not a scalar.
    pub fn root_object(&self) -> Option<&Object> {
        self.root.as_object().and_then(|id| self.graph.get(id))
    }
}

fn values_eq(
    left: &Graph,
    a: &Value,
    right: &Graph,
    b: &Value,
    assumed: &mut HashSet<(ObjectId, ObjectId)>,
) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::Ref(x), Value::Ref(y)) => {
            if !assumed.insert((*x, *y)) {
                return true;
            }
            match (left.get(*x), right.get(*y)) {
                (Some(ox), Some(oy)) => objects_eq(left, ox, right, oy, assumed),
                _ => false,
            }
        }
        _ => a == b,
    }
}

fn objects_eq(
    left: &Graph,
    a: &Object,
    right: &Graph,
    b: &Object,
    assumed: &mut HashSet<(ObjectId, ObjectId)>,
) -> bool {
    if a.type_key != b.type_key {
        return false;
    }
    match (&a.data, &b.data) {
        (ObjectData::Record(x), ObjectData::Record(y)) => {
            x.len() == y.len()
                && x.iter().all(|(name, vx)| {
                    y.get(name)
                        .is_some_and(|vy| values_eq(left, vx, right, vy, assumed))
                })
        }
        (ObjectData::Sequence(x), ObjectData::Sequence(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y)
                    .all(|(vx, vy)| values_eq(left, vx, right, vy, assumed))
        }
        (ObjectData::Mapping(x), ObjectData::Mapping(y)) => {
            x.len() == y.len()
                && x.iter().zip(y).all(|((kx, vx), (ky, vy))| {
                    values_eq(left, kx, right, ky, assumed)
                        && values_eq(left, vx, right, vy, assumed)
                })
        }
        _ => false,
    }
}
