//! The override/default merge law for inherited policies.
//!
//! Overlays are folded from the most distant ancestor to the resource itself. Defaults and
//! overrides are folded separately, each closer contributor replacing a farther one field by
//! field, and then every override replaces the default for the same field. So an override set
//! anywhere in the chain beats any default, and among contributors of the same sort, the closest
//! one wins.

use crate::{Fields, GroupKind, ObjRef, Overlay};
use serde::Serialize;
use std::collections::BTreeMap;

/// The effective value of one policy kind for a resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EffectivePolicy {
    Resolved(Fields),

    /// Several direct policies of the same kind target the same resource. No precedence is
    /// defined between them, so every candidate is reported.
    Ambiguous(Vec<Candidate>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub policy: ObjRef,
    pub fields: Fields,
}

/// Effective policies for a single resource, by policy kind.
pub type EffectivePolicies = BTreeMap<GroupKind, EffectivePolicy>;

/// Merges overlays ordered from the most distant ancestor to the resource itself.
pub fn merge<'o>(chain: impl IntoIterator<Item = &'o Overlay>) -> Fields {
    let mut defaults = Fields::new();
    let mut overrides = Fields::new();
    for Overlay {
        overrides: o,
        defaults: d,
    } in chain
    {
        defaults.extend(d.iter().map(|(k, v)| (k.clone(), v.clone())));
        overrides.extend(o.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    defaults.extend(overrides);
    defaults
}

impl EffectivePolicy {
    pub fn resolved(&self) -> Option<&Fields> {
        match self {
            Self::Resolved(fields) => Some(fields),
            Self::Ambiguous(_) => None,
        }
    }
}
