use crate::heap::ObjectId;

/// Why a `stringify` call was aborted. No partial output is ever returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExvalError {
    /// Symbol-typed values have no source representation.
    #[error("{kind} values are not supported")]
    UnsupportedValueKind { kind: &'static str },

    /// The callable's source text is an opaque host stub or does not parse.
    #[error("couldn't encode callable `{source_text}`: {reason}")]
    UnparseableCallable { source_text: String, reason: String },

    /// A token referenced an identity the reference graph never registered.
    /// Always a defect in this crate, never a caller error.
    #[error("internal error: reference to object {0} was never registered")]
    ReferenceNotFound(ObjectId),
}

impl ExvalError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ExvalError::UnsupportedValueKind { .. } => "UnsupportedValueKind",
            ExvalError::UnparseableCallable { .. } => "UnparseableCallable",
            ExvalError::ReferenceNotFound(_) => "ReferenceNotFound",
        }
    }
}

/// Reading an attribute failed: accessor attributes cannot be evaluated
/// against a static heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("attribute access denied")]
pub struct AccessDenied;

/// Errors loading a graph document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid graph document: {0}")]
    Json(#[from] serde_json::Error),

    /// `{"$ref": id}` names an object the document does not declare.
    #[error("unknown object reference: {0}")]
    UnknownObject(String),

    /// `{"$global": path}` does not lead to an object in the realm.
    #[error("global path does not resolve to an object: {0}")]
    UnresolvedGlobal(String),

    #[error("invalid special number: {0} (expected NaN, Infinity, -Infinity or -0)")]
    InvalidNumber(String),

    #[error("callable object {0} has no source")]
    MissingSource(String),

    /// A template declaring a base must link to it through `proto`.
    #[error("callable object {0} extends a base but has no proto")]
    MissingBase(String),

    #[error("callable object {id} has invalid source: {source}")]
    InvalidSource {
        id: String,
        #[source]
        source: exval_syntax::SyntaxError,
    },

    /// A delegation link or accessor that is not an object (or null).
    #[error("object {id}: {what} must be an object reference")]
    NotAnObject { id: String, what: String },

    /// `{"$hole": true}` outside a sequence's `items`.
    #[error("object {0}: holes are only allowed in sequence items")]
    MisplacedHole(String),

    #[error("object {0}: only sequences may have items")]
    UnexpectedItems(String),
}
