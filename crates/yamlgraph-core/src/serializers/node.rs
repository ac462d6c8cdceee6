//! Plain strategy: structural encoding of scalars, records, sequences and
//! mappings. Every nested node goes back through the pass context so the
//! active strategy sees it.

use std::sync::Arc;

use crate::context::{PassContext, ValueOutput};
use crate::error::{GraphError, Result};
use crate::event::{Alias, Event, NodeStart, NodeStyle, ScalarEvent, Span};
use crate::graph::{Object, ObjectData, ObjectId, Slot, Value};
use crate::schema::{self, tags};
use crate::types::{DescriptorKind, PrimitiveKind, TypeDescriptor, TypeKey};

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

pub(super) fn read(
    ctx: &mut PassContext<'_>,
    existing: Option<Value>,
    descriptor: &Arc<TypeDescriptor>,
) -> Result<Value> {
    match ctx.current_event()?.clone() {
        Event::Scalar(scalar) => read_scalar(ctx, scalar, descriptor),
        Event::MappingStart(start) => read_mapping(ctx, start, existing, descriptor),
        Event::SequenceStart(start) => read_sequence(ctx, start, descriptor),
        Event::Alias(alias) => {
            let value = ctx.get_alias_value(&alias)?;
            ctx.advance()?;
            Ok(value)
        }
        end @ (Event::MappingEnd(_) | Event::SequenceEnd(_)) => Err(GraphError::structural(
            end.span(),
            format!("unexpected {}", end.describe()),
        )),
    }
}

fn read_scalar(
    ctx: &mut PassContext<'_>,
    scalar: ScalarEvent,
    expected: &Arc<TypeDescriptor>,
) -> Result<Value> {
    let descriptor = match scalar.tag.as_deref() {
        None => Arc::clone(expected),
        Some(tags::NON_SPECIFIC) => ctx.find_type_descriptor(&TypeKey::STR)?,
        Some(tag) => {
            let ty = ctx.resolve_tag_to_type(tag)?;
            ctx.find_type_descriptor(&ty)?
        }
    };

    let value = match &descriptor.kind {
        DescriptorKind::Primitive { primitive } => decode_primitive(ctx, &scalar, *primitive)?,
        DescriptorKind::Dynamic => ctx
            .try_resolve_scalar(&scalar)
            .map(|(_, value)| value)
            .ok_or_else(|| {
                GraphError::structural(
                    scalar.span,
                    format!("no schema rule matches scalar [{}]", scalar.value),
                )
            })?,
        // A plain null stands in for an absent composite.
        _ if is_plain_null(ctx, &scalar) => Value::Null,
        _ => {
            return Err(GraphError::structural(
                scalar.span,
                format!(
                    "expected a {} for [{}], found scalar [{}]",
                    descriptor.shape(),
                    descriptor.ty,
                    scalar.value
                ),
            ))
        }
    };
    ctx.advance()?;
    Ok(value)
}

fn decode_primitive(
    ctx: &PassContext<'_>,
    scalar: &ScalarEvent,
    kind: PrimitiveKind,
) -> Result<Value> {
    if is_plain_null(ctx, scalar) {
        return Ok(Value::Null);
    }
    let typed = ScalarEvent {
        tag: Some(schema::tag_for(kind).to_string()),
        ..scalar.clone()
    };
    ctx.try_resolve_scalar(&typed)
        .map(|(_, value)| value)
        .ok_or_else(|| {
            GraphError::structural(
                scalar.span,
                format!("cannot read [{}] as {}", scalar.value, kind.type_key()),
            )
        })
}

fn is_plain_null(ctx: &PassContext<'_>, scalar: &ScalarEvent) -> bool {
    scalar.is_plain_untagged()
        && matches!(ctx.try_resolve_scalar(scalar), Some((_, Value::Null)))
}

/// Descriptor for a collection node: an explicit tag wins over the expected
/// type, and a dynamic expectation falls back to the untyped `implicit`.
fn node_descriptor(
    ctx: &mut PassContext<'_>,
    tag: Option<&str>,
    expected: &Arc<TypeDescriptor>,
    implicit: TypeKey,
) -> Result<Arc<TypeDescriptor>> {
    let resolved = match tag {
        None | Some(tags::NON_SPECIFIC) => Arc::clone(expected),
        Some(tag) => {
            let ty = ctx.resolve_tag_to_type(tag)?;
            ctx.find_type_descriptor(&ty)?
        }
    };
    if resolved.is_dynamic() {
        ctx.find_type_descriptor(&implicit)
    } else {
        Ok(resolved)
    }
}

fn shape_mismatch(span: Span, descriptor: &TypeDescriptor, found: &str) -> GraphError {
    GraphError::structural(
        span,
        format!(
            "expected a {} for [{}], found a {found}",
            descriptor.shape(),
            descriptor.ty
        ),
    )
}

fn read_mapping(
    ctx: &mut PassContext<'_>,
    start: NodeStart,
    existing: Option<Value>,
    expected: &Arc<TypeDescriptor>,
) -> Result<Value> {
    let descriptor = node_descriptor(ctx, start.tag.as_deref(), expected, TypeKey::MAP)?;
    match descriptor.kind {
        DescriptorKind::Record { .. } => read_record(ctx, existing, &descriptor),
        DescriptorKind::Mapping { .. } => read_map(ctx, &descriptor),
        _ => Err(shape_mismatch(start.span, &descriptor, "mapping")),
    }
}

fn read_record(
    ctx: &mut PassContext<'_>,
    existing: Option<Value>,
    descriptor: &Arc<TypeDescriptor>,
) -> Result<Value> {
    let id = match existing {
        Some(Value::Ref(id))
            if ctx
                .graph()
                .get(id)
                .is_some_and(|object| object.type_key == descriptor.ty) =>
        {
            id
        }
        _ => ctx.create_object(descriptor)?,
    };
    ctx.publish_object(id)?;
    ctx.advance()?;

    while !matches!(ctx.current_event()?, Event::MappingEnd(_)) {
        let (raw, span) = read_member_name(ctx)?;
        let name = ctx.decode_key_pre(id, descriptor, &raw);
        let Some(member) = descriptor.member(&name) else {
            if ctx.settings().ignore_unmapped_members {
                tracing::debug!(member = %name, ty = %descriptor.ty, "skipping unmapped member");
                skip_node(ctx)?;
                continue;
            }
            return Err(GraphError::structural(
                span,
                format!("[{}] has no member [{name}]", descriptor.ty),
            ));
        };

        let current = ctx.graph().get(id).and_then(|o| o.member(&name)).cloned();
        let slot = Slot::Member {
            object: id,
            name: name.clone(),
        };
        match ctx.read_value(current, &member.ty)? {
            ValueOutput::Value(value) => {
                ctx.decode_key_post(id, descriptor, &name, Some(&value));
                ctx.graph_mut()?.assign(&slot, value)?;
            }
            ValueOutput::Alias(alias) => {
                ctx.register_late_binding(alias, slot)?;
                ctx.decode_key_post(id, descriptor, &name, None);
            }
        }
    }

    ctx.advance()?;
    Ok(Value::Ref(id))
}

/// Read a record key as a node of its own, so anchors on it are declared and
/// aliases to an earlier string resolve. A plain null-looking key keeps its
/// text.
fn read_member_name(ctx: &mut PassContext<'_>) -> Result<(String, Span)> {
    let (span, text) = match ctx.current_event()? {
        Event::Scalar(key) => (key.span, Some(key.value.clone())),
        Event::Alias(alias) => (alias.span, None),
        other => {
            return Err(GraphError::structural(
                other.span(),
                format!("expected a member name, found {}", other.describe()),
            ))
        }
    };
    match (ctx.read_value(None, &TypeKey::STR)?, text) {
        (ValueOutput::Value(Value::Str(name)), _) => Ok((name, span)),
        (ValueOutput::Value(Value::Null), Some(text)) => Ok((text, span)),
        (ValueOutput::Value(other), _) => Err(GraphError::structural(
            span,
            format!("member name must be a string, found {other:?}"),
        )),
        (ValueOutput::Alias(alias), _) => Err(GraphError::structural(
            alias.span,
            format!(
                "member name alias [{}] refers to an anchor declared later",
                alias.label
            ),
        )),
    }
}

/// Value to store now, plus the alias to bind later if the value is pending.
fn split(output: ValueOutput) -> (Value, Option<Alias>) {
    match output {
        ValueOutput::Value(value) => (value, None),
        ValueOutput::Alias(alias) => (Value::Null, Some(alias)),
    }
}

fn read_map(ctx: &mut PassContext<'_>, descriptor: &Arc<TypeDescriptor>) -> Result<Value> {
    let (key_ty, value_ty) = match &descriptor.kind {
        DescriptorKind::Mapping { key, value } => (key.clone(), value.clone()),
        _ => (TypeKey::ANY, TypeKey::ANY),
    };
    let id = ctx.create_object(descriptor)?;
    ctx.publish_object(id)?;
    ctx.advance()?;

    while !matches!(ctx.current_event()?, Event::MappingEnd(_)) {
        let (key, pending_key) = split(ctx.read_value(None, &key_ty)?);
        let key = match key {
            Value::Str(raw) => Value::Str(ctx.decode_key_pre(id, descriptor, &raw)),
            other => other,
        };
        let (value, pending_value) = split(ctx.read_value(None, &value_ty)?);

        if let Some(name) = key.as_str() {
            let decoded = pending_value.is_none().then_some(&value);
            ctx.decode_key_post(id, descriptor, name, decoded);
        }
        let index = ctx.graph_mut()?.push_entry(id, key, value)?;
        if let Some(alias) = pending_key {
            let slot = Slot::EntryKey { object: id, index };
            ctx.register_late_key_binding(alias, slot, descriptor, pending_value.is_some())?;
        }
        if let Some(alias) = pending_value {
            ctx.register_late_binding(alias, Slot::EntryValue { object: id, index })?;
        }
    }

    ctx.advance()?;
    Ok(Value::Ref(id))
}

fn read_sequence(
    ctx: &mut PassContext<'_>,
    start: NodeStart,
    expected: &Arc<TypeDescriptor>,
) -> Result<Value> {
    let descriptor = node_descriptor(ctx, start.tag.as_deref(), expected, TypeKey::SEQ)?;
    let DescriptorKind::Sequence { item } = &descriptor.kind else {
        return Err(shape_mismatch(start.span, &descriptor, "sequence"));
    };
    let item = item.clone();
    let id = ctx.create_object(&descriptor)?;
    ctx.publish_object(id)?;
    ctx.advance()?;

    while !matches!(ctx.current_event()?, Event::SequenceEnd(_)) {
        let (value, pending) = split(ctx.read_value(None, &item)?);
        let index = ctx.graph_mut()?.push_item(id, value)?;
        if let Some(alias) = pending {
            ctx.register_late_binding(alias, Slot::Element { object: id, index })?;
        }
    }

    ctx.advance()?;
    Ok(Value::Ref(id))
}

/// Consume the node under the cursor and everything nested in it. Anchors
/// declared inside the skipped node are not registered.
fn skip_node(ctx: &mut PassContext<'_>) -> Result<()> {
    let mut depth: usize = 0;
    loop {
        match ctx.current_event()? {
            Event::MappingStart(_) | Event::SequenceStart(_) => depth += 1,
            Event::MappingEnd(_) | Event::SequenceEnd(_) if depth > 0 => depth -= 1,
            end @ (Event::MappingEnd(_) | Event::SequenceEnd(_)) => {
                return Err(GraphError::structural(
                    end.span(),
                    format!("unexpected {}", end.describe()),
                ))
            }
            Event::Scalar(_) | Event::Alias(_) => {}
        }
        ctx.advance()?;
        if depth == 0 {
            return Ok(());
        }
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

pub(super) fn write(
    ctx: &mut PassContext<'_>,
    value: &Value,
    expected: &TypeKey,
    descriptor: &TypeDescriptor,
) -> Result<()> {
    match value {
        Value::Ref(id) => write_object(ctx, *id, expected, descriptor),
        scalar => write_scalar(ctx, scalar, expected),
    }
}

/// Tag to emit for a node whose runtime type is `runtime`.
///
/// Nothing is tagged when the runtime type is what the reader will expect
/// anyway, or when an untyped reader can recover it from the node's shape.
fn node_tag(ctx: &PassContext<'_>, runtime: &TypeKey, expected: &TypeKey) -> Result<Option<String>> {
    if !ctx.settings().emit_tags
        || runtime == expected
        || (expected.is_any() && runtime.is_implicit())
    {
        return Ok(None);
    }
    ctx.resolve_type_to_tag(runtime)
        .map(Some)
        .ok_or_else(|| GraphError::unknown_tag(runtime.as_str()))
}

fn write_scalar(ctx: &mut PassContext<'_>, value: &Value, expected: &TypeKey) -> Result<()> {
    let (text, runtime) = match value {
        Value::Null => ("null".to_string(), None),
        Value::Bool(b) => (b.to_string(), Some(TypeKey::BOOL)),
        Value::Int(n) => (n.to_string(), Some(TypeKey::INT)),
        Value::Float(f) => (format_float(*f), Some(TypeKey::FLOAT)),
        Value::Str(s) => (s.clone(), Some(TypeKey::STR)),
        Value::Ref(id) => {
            return Err(GraphError::invalid_operation(format!(
                "object {} is not a scalar",
                id.index()
            )))
        }
    };
    let tag = match &runtime {
        Some(runtime) => node_tag(ctx, runtime, expected)?,
        None => None,
    };

    let mut style = ctx.pop_style();
    if matches!(value, Value::Str(_)) && !style.is_quoted() && reads_as_non_string(ctx, &text) {
        style = NodeStyle::DoubleQuoted;
    }

    ctx.emit(Event::Scalar(ScalarEvent {
        anchor: None,
        tag,
        value: text,
        style,
        span: Span::default(),
    }))
}

fn reads_as_non_string(ctx: &PassContext<'_>, text: &str) -> bool {
    !matches!(
        ctx.try_resolve_scalar(&ScalarEvent::new(text)),
        Some((tag, _)) if tag == tags::STR
    )
}

/// Core-schema text of a float. Integral values keep a `.0` so they read
/// back as floats.
pub(crate) fn format_float(value: f64) -> String {
    if value.is_nan() {
        return ".nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { ".inf" } else { "-.inf" }.to_string();
    }
    let text = value.to_string();
    if text.contains(['.', 'e', 'E']) {
        text
    } else {
        format!("{text}.0")
    }
}

fn write_object(
    ctx: &mut PassContext<'_>,
    id: ObjectId,
    expected: &TypeKey,
    descriptor: &TypeDescriptor,
) -> Result<()> {
    let graph = ctx.output_graph()?;
    let object = graph.object(id)?;
    let tag = node_tag(ctx, &object.type_key, expected)?;

    match &object.data {
        ObjectData::Record(_) => {
            let DescriptorKind::Record { .. } = descriptor.kind else {
                return Err(object_mismatch(id, object, descriptor));
            };
            let start = node_start(ctx, tag);
            write_record(ctx, id, object, start, descriptor)
        }
        ObjectData::Sequence(items) => {
            let item_ty = match &descriptor.kind {
                DescriptorKind::Sequence { item } => item.clone(),
                DescriptorKind::Dynamic => TypeKey::ANY,
                _ => return Err(object_mismatch(id, object, descriptor)),
            };
            let start = node_start(ctx, tag);
            ctx.emit(Event::SequenceStart(start))?;
            for item in items {
                ctx.write_value(item, &item_ty)?;
            }
            ctx.emit(Event::sequence_end())
        }
        ObjectData::Mapping(entries) => {
            let (key_ty, value_ty) = match &descriptor.kind {
                DescriptorKind::Mapping { key, value } => (key.clone(), value.clone()),
                DescriptorKind::Dynamic => (TypeKey::ANY, TypeKey::ANY),
                _ => return Err(object_mismatch(id, object, descriptor)),
            };
            let start = node_start(ctx, tag);
            ctx.emit(Event::MappingStart(start))?;
            for (key, value) in entries {
                match key {
                    Value::Str(name) => {
                        let text = ctx.encode_key(id, descriptor, name);
                        let raw = Value::Str(ctx.encode_scalar_key(key, text));
                        ctx.write_value(&raw, &key_ty)?;
                    }
                    other => ctx.write_value(other, &key_ty)?,
                }
                ctx.write_value(value, &value_ty)?;
            }
            ctx.emit(Event::mapping_end())
        }
    }
}

/// Start-event properties for the object being emitted. Pops its style and
/// claims its anchor.
fn node_start(ctx: &mut PassContext<'_>, tag: Option<String>) -> NodeStart {
    NodeStart {
        anchor: ctx.take_anchor(),
        tag,
        style: ctx.pop_style(),
        span: Span::default(),
    }
}

fn object_mismatch(id: ObjectId, object: &Object, descriptor: &TypeDescriptor) -> GraphError {
    GraphError::invalid_operation(format!(
        "object {} of type [{}] does not fit its {} descriptor",
        id.index(),
        object.type_key,
        descriptor.shape()
    ))
}

fn write_record(
    ctx: &mut PassContext<'_>,
    id: ObjectId,
    object: &Object,
    start: NodeStart,
    descriptor: &TypeDescriptor,
) -> Result<()> {
    let DescriptorKind::Record {
        members,
        emit_defaults,
    } = &descriptor.kind
    else {
        return Err(object_mismatch(id, object, descriptor));
    };
    let emit_defaults = emit_defaults.unwrap_or(ctx.settings().emit_defaults);

    ctx.emit(Event::MappingStart(start))?;
    for member in members {
        let value = object.member(&member.name).unwrap_or(&Value::Null);
        if !emit_defaults && *value == member.default {
            continue;
        }
        let name = Value::Str(member.name.clone());
        let text = ctx.encode_key(id, descriptor, &member.name);
        let key = Value::Str(ctx.encode_scalar_key(&name, text));
        ctx.write_value(&key, &TypeKey::STR)?;
        if member.style != NodeStyle::Any {
            ctx.push_style(member.style);
        }
        ctx.write_value(value, &member.ty)?;
    }
    ctx.emit(Event::mapping_end())
}
