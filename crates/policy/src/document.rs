//! Typed views over the loosely shaped policy values found in templates.

use serde_json::{Map as JsonMap, Value as Json};
use std::borrow::Cow;

const ORG_CONDITION_OPERATORS: [&str; 3] = [
    "StringEquals",
    "ForAllValues:StringEquals",
    "ForAnyValue:StringEquals",
];
const ORG_ID_KEY: &str = "aws:PrincipalOrgID";

/// `null`, `false`, `0`, `""`, `[]` and `{}` all count as "no policy".
pub(crate) fn is_empty_value(v: &Json) -> bool {
    match v {
        Json::Null => true,
        Json::Bool(b) => !b,
        Json::Number(n) => n.as_f64() == Some(0.0),
        Json::String(s) => s.is_empty(),
        Json::Array(a) => a.is_empty(),
        Json::Object(o) => o.is_empty(),
    }
}

#[derive(Debug)]
pub(crate) enum PolicyText<'a> { Raw(&'a str), Structured(&'a Json) }

#[derive(Debug)]
pub(crate) struct Unparsed<'a> { pub raw: &'a str, pub error: serde_json::Error }

impl<'a> From<&'a Json> for PolicyText<'a> {
    fn from(v: &'a Json) -> Self {
        match v {
            Json::String(s) => PolicyText::Raw(s),
            other => PolicyText::Structured(other),
        }
    }
}

impl<'a> PolicyText<'a> {
    pub fn into_document(self) -> Result<Cow<'a, Json>, Unparsed<'a>> {
        match self {
            PolicyText::Structured(v) => Ok(Cow::Borrowed(v)),
            PolicyText::Raw(raw) => serde_json::from_str(raw)
                .map(Cow::Owned)
                .map_err(|error| Unparsed { raw, error }),
        }
    }
}

/// Where a wildcard principal sits within its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WildcardAt { Whole, Index(usize) }

#[derive(Debug, PartialEq)]
pub(crate) enum PrincipalBlock<'a> {
    Single(&'a str),
    Many(&'a [Json]),
    /// Shapes with no principal entries to compare, e.g. `{"Service": ...}`.
    Opaque,
}

impl<'a> From<&'a Json> for PrincipalBlock<'a> {
    fn from(v: &'a Json) -> Self {
        match v {
            Json::String(s) => PrincipalBlock::Single(s),
            Json::Array(a) => PrincipalBlock::Many(a),
            _ => PrincipalBlock::Opaque,
        }
    }
}

impl PrincipalBlock<'_> {
    pub fn find_wildcard(&self) -> Option<WildcardAt> {
        match self {
            PrincipalBlock::Single(s) => (*s == "*").then_some(WildcardAt::Whole),
            PrincipalBlock::Many(entries) => entries
                .iter()
                .position(|e| e.as_str() == Some("*"))
                .map(WildcardAt::Index),
            PrincipalBlock::Opaque => None,
        }
    }
}

pub(crate) struct Principal<'a> { pub block: PrincipalBlock<'a>, pub via_aws: bool }

pub(crate) struct Statement<'a>(&'a JsonMap<String, Json>);

impl<'a> Statement<'a> {
    pub fn from_json(v: &'a Json) -> Option<Self> { v.as_object().map(Statement) }

    pub fn principal(&self) -> Option<Principal<'a>> {
        let p = self.0.get("Principal")?;
        Some(match p.as_object().and_then(|m| m.get("AWS")) {
            Some(aws) => Principal { block: aws.into(), via_aws: true },
            None => Principal { block: p.into(), via_aws: false },
        })
    }

    /// True when a string-equality condition pins the caller to an organization.
    /// The first operator present wins; later ones are not consulted.
    pub fn has_org_constraint(&self) -> bool {
        let Some(condition) = self.0.get("Condition").and_then(Json::as_object) else {
            return false;
        };
        ORG_CONDITION_OPERATORS
            .iter()
            .find_map(|op| condition.get(*op))
            .and_then(Json::as_object)
            .map_or(false, |m| m.contains_key(ORG_ID_KEY))
    }
}
