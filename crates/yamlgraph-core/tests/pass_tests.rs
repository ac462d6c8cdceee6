//! Integration tests for serialize/deserialize passes, exercised through the
//! public API only.

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use yamlgraph_core::schema::tags;
use yamlgraph_core::{
    ErrorKind, Event, EventBuffer, Graph, GraphError, KeyTransform, Mark, MemberDescriptor,
    NodeStyle, Object, ObjectId, PassContext, PassState, PrefixKeyTransform, Serializer,
    SerializerSettings, Slot, Span, TypeCatalog, TypeDescriptor, TypeKey, Value,
};

fn node() -> TypeKey {
    TypeKey::new("Node")
}

fn person() -> TypeKey {
    TypeKey::new("Person")
}

fn pair() -> TypeKey {
    TypeKey::new("Pair")
}

fn catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::new();
    catalog.register_tagged(
        TypeDescriptor::record(
            node(),
            vec![
                MemberDescriptor::new("name", TypeKey::STR),
                MemberDescriptor::new("next", node()),
            ],
        ),
        "!Node",
    );
    catalog.register_tagged(
        TypeDescriptor::record(
            person(),
            vec![
                MemberDescriptor::new("name", TypeKey::STR),
                MemberDescriptor::new("age", TypeKey::INT).with_default(Value::Int(0)),
                MemberDescriptor::new("motto", TypeKey::STR).with_style(NodeStyle::DoubleQuoted),
            ],
        ),
        "!Person",
    );
    catalog.register_tagged(
        TypeDescriptor::record(
            pair(),
            vec![
                MemberDescriptor::new("left", TypeKey::MAP).with_style(NodeStyle::Flow),
                MemberDescriptor::new("right", TypeKey::MAP).with_style(NodeStyle::Flow),
            ],
        ),
        "!Pair",
    );
    catalog.register_tagged(
        TypeDescriptor::record(
            TypeKey::new("Handle"),
            vec![
                MemberDescriptor::new("name", TypeKey::STR),
                MemberDescriptor::new("nick", TypeKey::STR),
            ],
        ),
        "!Handle",
    );
    catalog.register_tagged(
        TypeDescriptor::record(
            TypeKey::new("Team"),
            vec![MemberDescriptor::new("lead", person())],
        ),
        "!Team",
    );
    catalog
}

fn serializer() -> Serializer {
    Serializer::with_catalog(SerializerSettings::default(), catalog())
}

fn plain_serializer(max_depth: usize) -> Serializer {
    let settings = SerializerSettings {
        track_anchors: false,
        max_depth,
        ..SerializerSettings::default()
    };
    Serializer::with_catalog(settings, catalog())
}

fn span(line: usize) -> Span {
    Span::new(Mark::new(line * 10, line, 0), Mark::new(line * 10 + 4, line, 4))
}

fn ada(graph: &mut Graph) -> ObjectId {
    graph.insert(
        Object::record(person())
            .with_member("name", "Ada")
            .with_member("age", 36i64)
            .with_member("motto", Value::Null),
    )
}

/// a.next = b, b.next = a
fn two_cycle() -> (Graph, ObjectId) {
    let mut graph = Graph::new();
    let a = graph.insert(Object::record(node()).with_member("name", "a"));
    let b = graph.insert(
        Object::record(node())
            .with_member("name", "b")
            .with_member("next", a),
    );
    graph
        .assign(
            &Slot::Member {
                object: a,
                name: "next".into(),
            },
            Value::Ref(b),
        )
        .unwrap();
    (graph, a)
}

// ── Binding ─────────────────────────────────────────────────────────────────

#[test]
fn test_context_binds_exactly_one_role() {
    let serializer = serializer();
    let graph = Graph::new();
    let mut sink = EventBuffer::new();
    let mut other = EventBuffer::new();

    let mut ctx = PassContext::new(&serializer);
    ctx.bind_sink(&mut sink, &graph).unwrap();
    let err = ctx.bind_sink(&mut other, &graph).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(ctx.state(), PassState::Bound);
}

#[test]
fn test_context_rejects_work_after_done() {
    let serializer = serializer();
    let mut graph = Graph::new();
    let root = Value::Ref(ada(&mut graph));
    let mut sink = EventBuffer::new();

    let mut ctx = PassContext::new(&serializer);
    ctx.bind_sink(&mut sink, &graph).unwrap();
    ctx.serialize_document(&root, &TypeKey::ANY).unwrap();
    assert_eq!(ctx.state(), PassState::Done);

    let err = ctx.write_value(&root, &TypeKey::ANY).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}

// ── Acyclic Round Trip ──────────────────────────────────────────────────────

#[test]
fn test_record_event_stream() {
    let mut graph = Graph::new();
    let root = Value::Ref(ada(&mut graph));

    let events = serializer()
        .serialize_to_events(&graph, &root, &TypeKey::ANY)
        .unwrap();

    // `motto` equals its default and is elided.
    assert_eq!(
        events,
        vec![
            Event::mapping_start().with_tag("!Person"),
            Event::scalar("name"),
            Event::scalar("Ada"),
            Event::scalar("age"),
            Event::scalar("36"),
            Event::mapping_end(),
        ]
    );
}

#[test]
fn test_acyclic_round_trip() {
    let mut graph = Graph::new();
    let person = ada(&mut graph);
    let tags = graph.insert(
        Object::sequence(TypeKey::SEQ)
            .with_item("math")
            .with_item(1.5)
            .with_item(true)
            .with_item(Value::Null),
    );
    let root = graph.insert(
        Object::mapping(TypeKey::MAP)
            .with_entry("person", person)
            .with_entry("tags", tags)
            .with_entry(7i64, "seven")
            .with_entry("quoted", "42"),
    );
    let root = Value::Ref(root);

    let serializer = serializer();
    let events = serializer
        .serialize_to_events(&graph, &root, &TypeKey::ANY)
        .unwrap();
    assert!(events.iter().all(|event| event.anchor().is_none()));

    let document = serializer.deserialize_events(events, &TypeKey::ANY).unwrap();
    assert!(graph.structurally_eq(&root, &document.graph, &document.root));
    assert_eq!(document.graph.len(), graph.len());
    assert_eq!(document.stats.anchors, 0);
}

#[test]
fn test_numeric_looking_string_is_quoted() {
    let mut graph = Graph::new();
    let list = graph.insert(Object::sequence(TypeKey::SEQ).with_item("42").with_item("true"));

    let events = serializer()
        .serialize_to_events(&graph, &Value::Ref(list), &TypeKey::ANY)
        .unwrap();
    assert_eq!(
        events[1],
        Event::scalar("42").with_style(NodeStyle::DoubleQuoted)
    );
    assert_eq!(
        events[2],
        Event::scalar("true").with_style(NodeStyle::DoubleQuoted)
    );
}

#[test]
fn test_scalar_type_mismatch_is_tagged() {
    let mut graph = Graph::new();
    let odd = graph.insert(
        Object::record(person())
            .with_member("name", 7i64)
            .with_member("age", 1i64)
            .with_member("motto", Value::Null),
    );
    let root = Value::Ref(odd);

    let serializer = serializer();
    let events = serializer.serialize_to_events(&graph, &root, &person()).unwrap();
    assert_eq!(events[0], Event::mapping_start());
    assert_eq!(events[2], Event::scalar("7").with_tag(tags::INT));

    let document = serializer.deserialize_events(events, &person()).unwrap();
    assert!(graph.structurally_eq(&root, &document.graph, &document.root));
}

// ── Identity ────────────────────────────────────────────────────────────────

#[test]
fn test_cycle_event_stream() {
    let (graph, a) = two_cycle();
    let events = serializer()
        .serialize_to_events(&graph, &Value::Ref(a), &node())
        .unwrap();

    assert_eq!(
        events,
        vec![
            Event::mapping_start().with_anchor("id001"),
            Event::scalar("name"),
            Event::scalar("a"),
            Event::scalar("next"),
            Event::mapping_start(),
            Event::scalar("name"),
            Event::scalar("b"),
            Event::scalar("next"),
            Event::alias("id001"),
            Event::mapping_end(),
            Event::mapping_end(),
        ]
    );
}

#[test]
fn test_cycle_identity_survives_round_trip() {
    let (graph, a) = two_cycle();
    let serializer = serializer();
    let events = serializer
        .serialize_to_events(&graph, &Value::Ref(a), &node())
        .unwrap();
    let document = serializer.deserialize_events(events, &node()).unwrap();

    let root = document.root.as_object().unwrap();
    let b = document
        .graph
        .object(root)
        .unwrap()
        .member("next")
        .and_then(Value::as_object)
        .unwrap();
    assert_ne!(root, b);
    assert_eq!(
        document.graph.object(b).unwrap().member("next"),
        Some(&Value::Ref(root))
    );
    assert_eq!(document.graph.len(), 2);
    assert_eq!(document.stats.late_bindings, 0);
}

#[test]
fn test_self_referencing_sequence() {
    let mut graph = Graph::new();
    let list = graph.insert(Object::sequence(TypeKey::SEQ));
    graph.push_item(list, Value::Ref(list)).unwrap();

    let serializer = serializer();
    let events = serializer
        .serialize_to_events(&graph, &Value::Ref(list), &TypeKey::ANY)
        .unwrap();
    assert_eq!(
        events,
        vec![
            Event::sequence_start().with_anchor("id001"),
            Event::alias("id001"),
            Event::sequence_end(),
        ]
    );

    let document = serializer.deserialize_events(events, &TypeKey::ANY).unwrap();
    let root = document.root.as_object().unwrap();
    assert_eq!(document.graph.object(root).unwrap().items(), &[Value::Ref(root)]);
}

#[test]
fn test_forward_alias_to_scalar() {
    let events = vec![
        Event::sequence_start(),
        Event::alias("later"),
        Event::scalar("x").with_anchor("later"),
        Event::sequence_end(),
    ];
    let document = serializer()
        .deserialize_events(events, &TypeKey::ANY)
        .unwrap();

    let root = document.root_object().unwrap();
    assert_eq!(root.items(), &[Value::from("x"), Value::from("x")]);
    assert_eq!(document.stats.late_bindings, 1);
    assert_eq!(document.stats.anchors, 1);
}

#[test]
fn test_forward_alias_to_object_shares_identity() {
    let events = vec![
        Event::mapping_start(),
        Event::scalar("first"),
        Event::alias("obj"),
        Event::scalar("second"),
        Event::mapping_start().with_anchor("obj"),
        Event::scalar("k"),
        Event::scalar("v"),
        Event::mapping_end(),
        Event::mapping_end(),
    ];
    let document = serializer()
        .deserialize_events(events, &TypeKey::ANY)
        .unwrap();

    let entries = document.root_object().unwrap().entries();
    assert_eq!(entries[0].0, Value::from("first"));
    assert!(matches!(entries[0].1, Value::Ref(_)));
    assert_eq!(entries[0].1, entries[1].1);
}

#[test]
fn test_unresolvable_alias_fails_the_pass() {
    let events = vec![
        Event::sequence_start(),
        Event::alias("ghost").with_span(span(2)),
        Event::sequence_end(),
    ];
    let err = serializer()
        .deserialize_events(events, &TypeKey::ANY)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AliasNotFound);
    assert_eq!(err.span(), Some(span(2)));
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn test_duplicate_anchor_is_rejected() {
    let events = vec![
        Event::sequence_start(),
        Event::scalar("a").with_anchor("x"),
        Event::scalar("b").with_anchor("x").with_span(span(3)),
        Event::sequence_end(),
    ];
    let err = serializer()
        .deserialize_events(events, &TypeKey::ANY)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
    assert_eq!(err.span(), Some(span(3)));
}

#[test]
fn test_anchor_on_member_name_is_declared() {
    let events = vec![
        Event::mapping_start().with_tag("!Handle"),
        Event::scalar("name").with_anchor("k"),
        Event::scalar("Ada"),
        Event::scalar("nick"),
        Event::alias("k"),
        Event::mapping_end(),
    ];

    let document = serializer()
        .deserialize_events(events, &TypeKey::ANY)
        .unwrap();
    let handle = document.root_object().unwrap();
    assert_eq!(handle.member("name"), Some(&Value::from("Ada")));
    assert_eq!(handle.member("nick"), Some(&Value::from("name")));
    assert_eq!(document.stats.anchors, 1);
}

#[test]
fn test_alias_as_member_name() {
    let events = vec![
        Event::sequence_start(),
        Event::scalar("nick").with_anchor("n"),
        Event::mapping_start().with_tag("!Handle"),
        Event::scalar("name"),
        Event::scalar("Ada"),
        Event::alias("n"),
        Event::scalar("ace"),
        Event::mapping_end(),
        Event::sequence_end(),
    ];

    let document = serializer()
        .deserialize_events(events, &TypeKey::ANY)
        .unwrap();
    let items = document.root_object().unwrap().items();
    let handle = document.graph.object(items[1].as_object().unwrap()).unwrap();
    assert_eq!(handle.member("nick"), Some(&Value::from("ace")));
}

#[test]
fn test_forward_alias_as_member_name_is_structural() {
    let events = vec![
        Event::mapping_start().with_tag("!Handle"),
        Event::alias("later").with_span(span(2)),
        Event::scalar("Ada"),
        Event::mapping_end(),
    ];

    let err = serializer()
        .deserialize_events(events, &TypeKey::ANY)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
    assert_eq!(err.span(), Some(span(2)));
}

// ── Styles ──────────────────────────────────────────────────────────────────

#[test]
fn test_member_style_reaches_its_value() {
    let mut graph = Graph::new();
    let id = graph.insert(
        Object::record(person())
            .with_member("name", "Ada")
            .with_member("age", 0i64)
            .with_member("motto", "Stay curious"),
    );

    let events = serializer()
        .serialize_to_events(&graph, &Value::Ref(id), &person())
        .unwrap();
    assert_eq!(
        events,
        vec![
            Event::mapping_start(),
            Event::scalar("name"),
            Event::scalar("Ada"),
            Event::scalar("motto"),
            Event::scalar("Stay curious").with_style(NodeStyle::DoubleQuoted),
            Event::mapping_end(),
        ]
    );
}

#[test]
fn test_style_stack_balanced_across_aliases() {
    let mut graph = Graph::new();
    let shared = graph.insert(Object::mapping(TypeKey::MAP).with_entry("k", 1i64));
    let root = graph.insert(
        Object::record(pair())
            .with_member("left", shared)
            .with_member("right", shared),
    );
    let root = Value::Ref(root);
    let serializer = serializer();

    let mut sink = EventBuffer::new();
    {
        let mut ctx = PassContext::new(&serializer);
        ctx.bind_sink(&mut sink, &graph).unwrap();
        ctx.serialize_document(&root, &pair()).unwrap();
        assert_eq!(ctx.style_depth(), 0);
        assert_eq!(ctx.anchor_labels().depth(), 0);
    }

    let events = sink.into_events();
    assert_eq!(
        events,
        vec![
            Event::mapping_start(),
            Event::scalar("left"),
            Event::mapping_start()
                .with_anchor("id001")
                .with_style(NodeStyle::Flow),
            Event::scalar("k"),
            Event::scalar("1"),
            Event::mapping_end(),
            Event::scalar("right"),
            Event::alias("id001"),
            Event::mapping_end(),
        ]
    );

    let document = serializer.deserialize_events(events, &pair()).unwrap();
    assert!(graph.structurally_eq(&root, &document.graph, &document.root));
    let object = document.root_object().unwrap();
    assert_eq!(object.member("left"), object.member("right"));
}

// ── Key Transform ───────────────────────────────────────────────────────────

#[test]
fn test_prefix_key_transform_round_trip() {
    let mut graph = Graph::new();
    let root = Value::Ref(ada(&mut graph));
    let serializer = serializer().with_key_transform(PrefixKeyTransform::new("x_"));

    let events = serializer
        .serialize_to_events(&graph, &root, &person())
        .unwrap();
    assert_eq!(events[1], Event::scalar("x_name"));
    assert_eq!(events[3], Event::scalar("x_age"));

    let document = serializer.deserialize_events(events, &person()).unwrap();
    assert!(graph.structurally_eq(&root, &document.graph, &document.root));
}

#[test]
fn test_prefix_key_transform_applies_to_mapping_keys() {
    let mut graph = Graph::new();
    let map = graph.insert(Object::mapping(TypeKey::MAP).with_entry("Name", "v"));
    let root = Value::Ref(map);
    let serializer = serializer().with_key_transform(PrefixKeyTransform::new("x_"));

    let events = serializer
        .serialize_to_events(&graph, &root, &TypeKey::ANY)
        .unwrap();
    assert_eq!(events[1], Event::scalar("x_Name"));

    let document = serializer.deserialize_events(events, &TypeKey::ANY).unwrap();
    assert!(graph.structurally_eq(&root, &document.graph, &document.root));
}

#[test]
fn test_scalar_key_encoder_sees_transformed_text() {
    let mut graph = Graph::new();
    let root = Value::Ref(ada(&mut graph));
    let serializer = serializer()
        .with_key_transform(PrefixKeyTransform::new("x_"))
        .with_scalar_key_encoder(|key, text| {
            format!("{}={text}", key.as_str().unwrap_or_default())
        });

    let events = serializer
        .serialize_to_events(&graph, &root, &person())
        .unwrap();
    assert_eq!(events[1], Event::scalar("name=x_name"));
    assert_eq!(events[3], Event::scalar("age=x_age"));
}

#[test]
fn test_late_bound_map_key_is_decoded_like_an_inline_one() {
    let serializer = serializer().with_key_transform(PrefixKeyTransform::new("x_"));
    let anchor_first = vec![
        Event::sequence_start(),
        Event::scalar("x_Name").with_anchor("k"),
        Event::mapping_start(),
        Event::alias("k"),
        Event::scalar("v"),
        Event::mapping_end(),
        Event::sequence_end(),
    ];
    let alias_first = vec![
        Event::sequence_start(),
        Event::mapping_start(),
        Event::alias("k"),
        Event::scalar("v"),
        Event::mapping_end(),
        Event::scalar("x_Name").with_anchor("k"),
        Event::sequence_end(),
    ];

    for (events, map_index) in [(anchor_first, 1), (alias_first, 0)] {
        let document = serializer.deserialize_events(events, &TypeKey::ANY).unwrap();
        let items = document.root_object().unwrap().items();
        let map = document.graph.object(items[map_index].as_object().unwrap()).unwrap();
        assert_eq!(map.entries(), &[(Value::from("Name"), Value::from("v"))]);
    }
}

/// Logs every post-decode call.
#[derive(Clone, Default)]
struct RecordingTransform {
    log: Arc<Mutex<Vec<(String, Option<Value>)>>>,
}

impl RecordingTransform {
    fn calls(&self) -> Vec<(String, Option<Value>)> {
        self.log.lock().unwrap().clone()
    }
}

impl KeyTransform for RecordingTransform {
    fn decode_pre(&self, _object: &Object, _descriptor: &TypeDescriptor, _raw: &str) -> Option<String> {
        None
    }

    fn decode_post(
        &self,
        _object: &Object,
        _descriptor: &TypeDescriptor,
        key: &str,
        value: Option<&Value>,
    ) {
        self.log.lock().unwrap().push((key.to_string(), value.cloned()));
    }

    fn encode(&self, _object: &Object, _descriptor: &TypeDescriptor, key: &str) -> String {
        key.to_string()
    }
}

#[test]
fn test_decode_post_sees_values_and_pending_aliases() {
    let recorder = RecordingTransform::default();
    let serializer = serializer().with_key_transform(recorder.clone());
    let events = vec![
        Event::sequence_start(),
        Event::mapping_start().with_tag("!Team"),
        Event::scalar("lead"),
        Event::alias("p"),
        Event::mapping_end(),
        Event::mapping_start().with_tag("!Person").with_anchor("p"),
        Event::scalar("name"),
        Event::scalar("Ada"),
        Event::mapping_end(),
        Event::sequence_end(),
    ];

    serializer.deserialize_events(events, &TypeKey::ANY).unwrap();
    assert_eq!(
        recorder.calls(),
        vec![
            ("lead".to_string(), None),
            ("name".to_string(), Some(Value::from("Ada"))),
        ]
    );
}

#[test]
fn test_decode_post_runs_for_late_bound_map_key() {
    let recorder = RecordingTransform::default();
    let serializer = serializer().with_key_transform(recorder.clone());
    let events = vec![
        Event::sequence_start(),
        Event::mapping_start(),
        Event::alias("k"),
        Event::scalar("v"),
        Event::alias("later"),
        Event::alias("k"),
        Event::mapping_end(),
        Event::scalar("Name").with_anchor("k"),
        Event::scalar("w").with_anchor("later"),
        Event::sequence_end(),
    ];

    let document = serializer.deserialize_events(events, &TypeKey::ANY).unwrap();
    assert_eq!(
        recorder.calls(),
        vec![
            ("Name".to_string(), Some(Value::from("v"))),
            ("w".to_string(), None),
        ]
    );
    assert_eq!(document.stats.late_bindings, 3);
}

// ── Errors ──────────────────────────────────────────────────────────────────

#[test]
fn test_error_is_wrapped_once_at_innermost_node() {
    let events = vec![
        Event::mapping_start().with_tag("!Team").with_span(span(1)),
        Event::scalar("lead").with_span(span(2)),
        Event::mapping_start().with_tag("!Nope").with_span(span(3)),
        Event::mapping_end(),
        Event::mapping_end(),
    ];
    let err = serializer()
        .deserialize_events(events, &TypeKey::ANY)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Wrapped);
    assert_eq!(err.span(), Some(span(3)));
    let GraphError::Wrapped { node, source, .. } = &err else {
        panic!("expected a wrapped error, got {err:?}");
    };
    assert_eq!(node, "MappingStart");
    assert_eq!(source.kind(), ErrorKind::TagResolution);
    assert_eq!(err.innermost().kind(), ErrorKind::TagResolution);
    assert!(err.to_string().contains("!Nope"));
}

#[test]
fn test_positioned_error_is_not_wrapped() {
    let events = vec![
        Event::mapping_start().with_tag("!Person").with_span(span(1)),
        Event::scalar("shoe").with_span(span(2)),
        Event::scalar("9"),
        Event::mapping_end(),
    ];
    let err = serializer()
        .deserialize_events(events, &TypeKey::ANY)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
    assert_eq!(err.span(), Some(span(2)));
}

#[test]
fn test_unmapped_members_can_be_ignored() {
    let events = || {
        vec![
            Event::mapping_start().with_tag("!Person"),
            Event::scalar("extra"),
            Event::sequence_start(),
            Event::scalar("1"),
            Event::mapping_start(),
            Event::mapping_end(),
            Event::sequence_end(),
            Event::scalar("name"),
            Event::scalar("Ada"),
            Event::mapping_end(),
        ]
    };

    let err = serializer()
        .deserialize_events(events(), &TypeKey::ANY)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);

    let settings = SerializerSettings {
        ignore_unmapped_members: true,
        ..SerializerSettings::default()
    };
    let document = Serializer::with_catalog(settings, catalog())
        .deserialize_events(events(), &TypeKey::ANY)
        .unwrap();
    let object = document.root_object().unwrap();
    assert_eq!(object.member("name"), Some(&Value::from("Ada")));
    assert_eq!(object.member("age"), Some(&Value::Int(0)));
}

#[test]
fn test_trailing_events_are_structural() {
    let events = vec![Event::scalar("a"), Event::scalar("b").with_span(span(4))];
    let err = serializer()
        .deserialize_events(events, &TypeKey::ANY)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
    assert_eq!(err.span(), Some(span(4)));
}

#[test]
fn test_truncated_stream_is_structural() {
    let events = vec![Event::sequence_start(), Event::scalar("a").with_span(span(1))];
    let err = serializer()
        .deserialize_events(events, &TypeKey::ANY)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
    assert_eq!(err.span(), Some(span(1)));
}

#[test]
fn test_read_depth_is_bounded() {
    let settings = SerializerSettings {
        max_depth: 4,
        ..SerializerSettings::default()
    };
    let mut events = vec![Event::sequence_start(); 6];
    events.extend(vec![Event::sequence_end(); 6]);

    let err = Serializer::with_catalog(settings, catalog())
        .deserialize_events(events, &TypeKey::ANY)
        .unwrap_err();
    assert_eq!(err.innermost().kind(), ErrorKind::DepthExceeded);
}

#[test]
fn test_sink_keeps_partial_output_on_failure() {
    let mut graph = Graph::new();
    let ghost = graph.insert(Object::mapping(TypeKey::new("Ghost")));
    let list = graph.insert(Object::sequence(TypeKey::SEQ).with_item(1i64).with_item(ghost));

    let mut sink = EventBuffer::new();
    let err = serializer()
        .serialize(&graph, &Value::Ref(list), &TypeKey::ANY, &mut sink)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TagResolution);
    assert_eq!(
        sink.events(),
        &[Event::sequence_start(), Event::scalar("1")]
    );
}

// ── Plain Strategy ──────────────────────────────────────────────────────────

#[test]
fn test_plain_strategy_rejects_aliases() {
    let events = vec![
        Event::sequence_start(),
        Event::scalar("a").with_anchor("x"),
        Event::alias("x").with_span(span(2)),
        Event::sequence_end(),
    ];
    let err = plain_serializer(64)
        .deserialize_events(events, &TypeKey::ANY)
        .unwrap_err();
    assert_eq!(err.span(), Some(span(2)));
    assert_eq!(err.innermost().kind(), ErrorKind::InvalidOperation);
}

#[test]
fn test_plain_strategy_duplicates_shared_objects() {
    let mut graph = Graph::new();
    let shared = graph.insert(Object::mapping(TypeKey::MAP));
    let list = graph.insert(Object::sequence(TypeKey::SEQ).with_item(shared).with_item(shared));

    let events = plain_serializer(64)
        .serialize_to_events(&graph, &Value::Ref(list), &TypeKey::ANY)
        .unwrap();
    assert_eq!(
        events,
        vec![
            Event::sequence_start(),
            Event::mapping_start(),
            Event::mapping_end(),
            Event::mapping_start(),
            Event::mapping_end(),
            Event::sequence_end(),
        ]
    );
}

#[test]
fn test_plain_strategy_stops_on_cycles() {
    let (graph, a) = two_cycle();
    let err = plain_serializer(16)
        .serialize_to_events(&graph, &Value::Ref(a), &node())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DepthExceeded);
}

// ── Concurrency ─────────────────────────────────────────────────────────────

#[test]
fn test_independent_passes_on_threads() {
    let (graph, a) = two_cycle();
    let serializer = serializer();
    let root = Value::Ref(a);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let events = serializer.serialize_to_events(&graph, &root, &node())?;
                    serializer.deserialize_events(events, &node())
                })
            })
            .collect();
        for handle in handles {
            let document = handle.join().unwrap().unwrap();
            assert!(graph.structurally_eq(&root, &document.graph, &document.root));
        }
    });
}
