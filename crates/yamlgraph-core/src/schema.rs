//! Implicit typing of untagged scalars.
//!
//! [`CoreSchema`] follows the YAML 1.2 core schema; [`FailsafeSchema`]
//! treats every scalar as a string.

use regex::Regex;

use crate::event::ScalarEvent;
use crate::graph::Value;
use crate::types::PrimitiveKind;

/// Standard tags of the core schema.
pub mod tags {
    pub const NULL: &str = "tag:yaml.org,2002:null";
    pub const BOOL: &str = "tag:yaml.org,2002:bool";
    pub const INT: &str = "tag:yaml.org,2002:int";
    pub const FLOAT: &str = "tag:yaml.org,2002:float";
    pub const STR: &str = "tag:yaml.org,2002:str";
    pub const SEQ: &str = "tag:yaml.org,2002:seq";
    pub const MAP: &str = "tag:yaml.org,2002:map";
    /// Non-specific tag: the node is a string (scalars) or untyped (collections).
    pub const NON_SPECIFIC: &str = "!";
}

/// Ruleset deciding the implicit tag and value of a scalar.
pub trait Schema: Send + Sync {
    /// Returns the default tag and decoded value, or `None` when no rule
    /// matches.
    fn try_parse(&self, scalar: &ScalarEvent) -> Option<(String, Value)>;
}

/// YAML 1.2 core schema.
#[derive(Debug, Clone)]
pub struct CoreSchema {
    null: Regex,
    boolean: Regex,
    int_dec: Regex,
    int_oct: Regex,
    int_hex: Regex,
    float: Regex,
    inf: Regex,
    nan: Regex,
}

impl Default for CoreSchema {
    fn default() -> Self {
        let compile = |pattern: &str| Regex::new(pattern).expect("core schema pattern is valid");
        Self {
            null: compile(r"^(?:~|null|Null|NULL|)$"),
            boolean: compile(r"^(?:true|True|TRUE|false|False|FALSE)$"),
            int_dec: compile(r"^[-+]?[0-9]+$"),
            int_oct: compile(r"^0o[0-7]+$"),
            int_hex: compile(r"^0x[0-9a-fA-F]+$"),
            float: compile(r"^[-+]?(?:\.[0-9]+|[0-9]+(?:\.[0-9]*)?)(?:[eE][-+]?[0-9]+)?$"),
            inf: compile(r"^[-+]?\.(?:inf|Inf|INF)$"),
            nan: compile(r"^\.(?:nan|NaN|NAN)$"),
        }
    }
}

impl CoreSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `text` as the given primitive under core-schema rules.
    pub fn parse_as(&self, kind: PrimitiveKind, text: &str) -> Option<Value> {
        match kind {
            PrimitiveKind::Null => self.null.is_match(text).then_some(Value::Null),
            PrimitiveKind::Bool => self
                .boolean
                .is_match(text)
                .then(|| Value::Bool(text.eq_ignore_ascii_case("true"))),
            PrimitiveKind::Int => self.parse_int(text),
            PrimitiveKind::Float => self.parse_float(text),
            PrimitiveKind::Str => Some(Value::Str(text.to_string())),
        }
    }

    fn parse_int(&self, text: &str) -> Option<Value> {
        if self.int_dec.is_match(text) {
            return text.parse::<i64>().ok().map(Value::Int);
        }
        if self.int_oct.is_match(text) {
            return i64::from_str_radix(&text[2..], 8).ok().map(Value::Int);
        }
        if self.int_hex.is_match(text) {
            return i64::from_str_radix(&text[2..], 16).ok().map(Value::Int);
        }
        None
    }

    fn parse_float(&self, text: &str) -> Option<Value> {
        if self.float.is_match(text) {
            return text.parse::<f64>().ok().map(Value::Float);
        }
        if self.inf.is_match(text) {
            let value = if text.starts_with('-') {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            };
            return Some(Value::Float(value));
        }
        if self.nan.is_match(text) {
            return Some(Value::Float(f64::NAN));
        }
        None
    }

    fn kind_for_tag(tag: &str) -> Option<PrimitiveKind> {
        match tag {
            tags::NULL => Some(PrimitiveKind::Null),
            tags::BOOL => Some(PrimitiveKind::Bool),
            tags::INT => Some(PrimitiveKind::Int),
            tags::FLOAT => Some(PrimitiveKind::Float),
            tags::STR | tags::NON_SPECIFIC => Some(PrimitiveKind::Str),
            _ => None,
        }
    }
}

impl Schema for CoreSchema {
    fn try_parse(&self, scalar: &ScalarEvent) -> Option<(String, Value)> {
        if let Some(tag) = scalar.tag.as_deref() {
            let kind = Self::kind_for_tag(tag)?;
            return self
                .parse_as(kind, &scalar.value)
                .map(|value| (tag_for(kind).to_string(), value));
        }
        if scalar.style.is_quoted() {
            return Some((tags::STR.to_string(), Value::Str(scalar.value.clone())));
        }

        // Integer before float: every integer also matches the float pattern.
        [
            PrimitiveKind::Null,
            PrimitiveKind::Bool,
            PrimitiveKind::Int,
            PrimitiveKind::Float,
            PrimitiveKind::Str,
        ]
        .into_iter()
        .find_map(|kind| {
            self.parse_as(kind, &scalar.value)
                .map(|value| (tag_for(kind).to_string(), value))
        })
    }
}

/// Every scalar is a string.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailsafeSchema;

impl Schema for FailsafeSchema {
    fn try_parse(&self, scalar: &ScalarEvent) -> Option<(String, Value)> {
        match scalar.tag.as_deref() {
            None | Some(tags::STR) | Some(tags::NON_SPECIFIC) => {
                Some((tags::STR.to_string(), Value::Str(scalar.value.clone())))
            }
            Some(_) => None,
        }
    }
}

/// Core-schema tag of a primitive kind.
pub fn tag_for(kind: PrimitiveKind) -> &'static str {
    match kind {
        PrimitiveKind::Null => tags::NULL,
        PrimitiveKind::Bool => tags::BOOL,
        PrimitiveKind::Int => tags::INT,
        PrimitiveKind::Float => tags::FLOAT,
        PrimitiveKind::Str => tags::STR,
    }
}
