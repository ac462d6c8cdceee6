//! Anchor-aware strategy: identity tracking layered over the plain one.

use std::sync::Arc;

use super::node;
use crate::context::{PassContext, ValueOutput};
use crate::error::Result;
use crate::event::Event;
use crate::graph::Value;
use crate::types::{TypeDescriptor, TypeKey};

/// Read one node, resolving an alias from the anchor table or deferring it
/// when its anchor has not been seen yet.
pub(super) fn read(
    ctx: &mut PassContext<'_>,
    existing: Option<Value>,
    descriptor: &Arc<TypeDescriptor>,
) -> Result<ValueOutput> {
    let (anchor, span, alias) = match ctx.current_event()? {
        Event::Alias(alias) => (None, alias.span, Some(alias.clone())),
        event => (event.anchor().map(str::to_string), event.span(), None),
    };

    if let Some(alias) = alias {
        ctx.advance()?;
        if ctx.anchors().contains(&alias.label) {
            tracing::trace!(alias = %alias.label, "alias resolved");
            return ctx.get_alias_value(&alias).map(ValueOutput::Value);
        }
        tracing::debug!(alias = %alias.label, "forward alias deferred");
        return Ok(ValueOutput::Alias(alias));
    }

    ctx.anchors_mut().begin_scope(anchor, span);
    let value = node::read(ctx, existing, descriptor)?;
    ctx.anchors_mut().end_scope(Some(&value))?;
    Ok(ValueOutput::Value(value))
}

/// Write one node. Objects referenced more than once get an anchor on first
/// emission and an alias on every later one.
pub(super) fn write(
    ctx: &mut PassContext<'_>,
    value: &Value,
    expected: &TypeKey,
    descriptor: &TypeDescriptor,
) -> Result<()> {
    let Value::Ref(id) = *value else {
        return node::write(ctx, value, expected, descriptor);
    };

    if !ctx.anchor_labels().is_prepared() {
        let counts = ctx.output_graph()?.reference_counts(value);
        ctx.anchor_labels_mut().prepare(&counts);
    }

    if let Some(label) = ctx.anchor_labels().assigned(id).map(str::to_string) {
        ctx.pop_style();
        tracing::trace!(anchor = %label, "alias emitted");
        return ctx.emit(Event::alias(label));
    }

    if let Some(label) = ctx.anchor_labels_mut().enter(id) {
        tracing::trace!(anchor = %label, object = id.index(), "anchor assigned");
    }
    node::write(ctx, value, expected, descriptor)?;
    ctx.anchor_labels_mut().exit(id)
}
