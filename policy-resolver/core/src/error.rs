use crate::{GroupKind, ObjRef};

/// Conditions encountered while resolving a discovery cycle.
///
/// None of these are fatal to the cycle: the affected reference, attachment, or walk is simply
/// omitted from results.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("malformed reference to {target}: {reason}")]
    MalformedReference {
        target: String,
        reason: &'static str,
    },

    #[error("policy {policy} targets {target}, which does not exist")]
    OrphanedPolicy { policy: ObjRef, target: ObjRef },

    #[error("policy kind {kind} has unrecognized classification {label:?}")]
    UnknownPolicyClassification {
        kind: GroupKind,
        label: Option<String>,
    },

    #[error("ancestor cycle detected at {node}")]
    CycleDetected { node: ObjRef },

    #[error("invalid object: {reason}")]
    InvalidObject { reason: String },
}

impl Error {
    pub(crate) fn missing_name(target: impl ToString) -> Self {
        Self::MalformedReference {
            target: target.to_string(),
            reason: "missing name",
        }
    }

    /// Used by callers that cannot find a reference to resolve at all.
    pub fn missing_reference(field: impl ToString) -> Self {
        Self::MalformedReference {
            target: field.to_string(),
            reason: "missing reference",
        }
    }
}
