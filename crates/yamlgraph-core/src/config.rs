//! Configuration for serialization passes.

use serde::{Deserialize, Serialize};

/// Options shared by every pass a [`Serializer`](crate::Serializer) runs.
///
/// ## Serialization Format
///
/// Fields are serialized in `kebab-case` (e.g., `track-anchors`,
/// `anchor-prefix`). Missing fields take their default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SerializerSettings {
    /// Track object identity through anchors and aliases. When off, the
    /// plain strategy runs: shared objects are written once per reference
    /// and aliases in the input are rejected.
    pub track_anchors: bool,
    /// Write record members even when they equal their declared default.
    pub emit_defaults: bool,
    /// Tag objects whose runtime type differs from the expected type.
    pub emit_tags: bool,
    /// Skip record keys with no matching member instead of failing.
    pub ignore_unmapped_members: bool,
    /// Prefix of synthetic anchor labels (`id001`, `id002`, ...).
    pub anchor_prefix: String,
    /// Maximum nesting depth of a single pass (stack overflow guard).
    pub max_depth: usize,
}

impl Default for SerializerSettings {
    fn default() -> Self {
        Self {
            track_anchors: true,
            emit_defaults: false,
            emit_tags: true,
            ignore_unmapped_members: false,
            anchor_prefix: "id".to_string(),
            max_depth: 256,
        }
    }
}
