use crate::{GroupKind, ObjRef};
use serde::Serialize;
use std::collections::BTreeMap;

/// A schema-less policy document: field names mapped to opaque values.
///
/// Ordered so that resolved output is deterministic.
pub type Fields = BTreeMap<String, serde_json::Value>;

/// The attachment semantics declared for a policy kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Classification {
    /// Applies only to the exact target.
    Direct,
    /// Applies to the target and flows down to its descendants.
    Inherited,
    /// Missing or unrecognized; never matched or merged.
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyKindDescriptor {
    pub kind: GroupKind,
    pub classification: Classification,
}

/// The override and default sub-documents of an inherited policy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Overlay {
    pub overrides: Fields,
    pub defaults: Fields,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyBody {
    /// The policy's spec, minus its target reference.
    Direct(Fields),
    Inherited(Overlay),
}

/// A policy object bound to the single resource it targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyInstance {
    pub id: ObjRef,
    pub kind: GroupKind,
    pub target: ObjRef,
    pub body: PolicyBody,
}

// === impl Classification ===

impl Classification {
    pub fn from_label(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("direct") => Self::Direct,
            Some("inherited") => Self::Inherited,
            _ => Self::Unknown,
        }
    }
}

// === impl Overlay ===

impl Overlay {
    const OVERRIDE: &'static str = "override";
    const DEFAULT: &'static str = "default";

    /// Partitions a policy spec into its override and default sub-documents.
    ///
    /// A sub-document that is absent, or that is not a mapping, contributes no fields.
    pub fn from_spec(spec: &serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            overrides: sub_document(spec, Self::OVERRIDE),
            defaults: sub_document(spec, Self::DEFAULT),
        }
    }
}

fn sub_document(spec: &serde_json::Map<String, serde_json::Value>, key: &str) -> Fields {
    match spec.get(key) {
        Some(serde_json::Value::Object(fields)) => fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        None | Some(serde_json::Value::Null) => Fields::new(),
        Some(value) => {
            tracing::warn!(%key, ?value, "ignoring policy sub-document that is not a mapping");
            Fields::new()
        }
    }
}

// === impl PolicyBody ===

impl PolicyBody {
    const TARGET_REF: &'static str = "targetRef";

    /// Builds a body for a policy spec according to its kind's classification.
    ///
    /// Returns `None` for unknown classifications, which never participate in resolution.
    pub fn from_spec(
        classification: Classification,
        spec: &serde_json::Map<String, serde_json::Value>,
    ) -> Option<Self> {
        match classification {
            Classification::Direct => Some(Self::Direct(
                spec.iter()
                    .filter(|(k, _)| k.as_str() != Self::TARGET_REF)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            )),
            Classification::Inherited => Some(Self::Inherited(Overlay::from_spec(spec))),
            Classification::Unknown => None,
        }
    }

    pub fn classification(&self) -> Classification {
        match self {
            Self::Direct(_) => Classification::Direct,
            Self::Inherited(_) => Classification::Inherited,
        }
    }
}

// === impl PolicyInstance ===

impl PolicyInstance {
    pub fn classification(&self) -> Classification {
        self.body.classification()
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        match &self.body {
            PolicyBody::Inherited(overlay) => Some(overlay),
            PolicyBody::Direct(_) => None,
        }
    }

    pub fn direct_fields(&self) -> Option<&Fields> {
        match &self.body {
            PolicyBody::Direct(fields) => Some(fields),
            PolicyBody::Inherited(_) => None,
        }
    }
}
