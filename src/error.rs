//! Error taxonomy.
//!
//! Only whole-class failures surface as a [`DocError`].  Member-level
//! problems have a local fallback (native type, literal marker text) and
//! are reported as a [`Degradation`] instead, which is logged and kept on
//! the builder for inspection but never aborts a build.
use std::path::PathBuf;

use thiserror::Error;

use crate::types::MemberKind;

/// A hard failure returned to the caller of the core or the batch driver.
#[derive(Debug, Error)]
pub enum DocError {
    /// The class could not be located by the introspection provider.
    #[error("unknown symbol `{name}`")]
    UnknownSymbol { name: String },

    /// The class exists but does not declare (or inherit) the member.
    #[error("unknown {kind} `{member}` on `{class}`")]
    UnknownMember {
        class: String,
        member: String,
        kind: MemberKind,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot read `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Batch driver only: the per-class build exceeded its time budget.
    #[error("building `{class}` timed out after {seconds}s")]
    Timeout { class: String, seconds: u64 },

    /// Batch driver only: the worker running the build failed.
    #[error("worker for `{class}` failed: {message}")]
    Worker { class: String, message: String },
}

impl DocError {
    pub fn unknown_symbol(name: impl Into<String>) -> Self {
        DocError::UnknownSymbol { name: name.into() }
    }
}

/// A non-fatal problem recovered from locally during a build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Degradation {
    /// A tag's type could not be parsed; the native declared type was used.
    #[error("malformed annotation on {owner}: cannot parse `{raw}` ({reason})")]
    MalformedAnnotation {
        owner: String,
        raw: String,
        reason: String,
    },

    /// An inherit-marker found no ancestor defining the member; the marker
    /// text was kept as-is.
    #[error("unresolved inherit marker on {owner}")]
    UnresolvedInherit { owner: String },

    /// A union with `null` and several concrete types; the first concrete
    /// type absorbed the nullability.
    #[error("ambiguous nullable union on {owner}: `null` folded into `{absorbed_by}`")]
    AmbiguousType { owner: String, absorbed_by: String },

    /// The class graph loops back on itself.
    #[error("inheritance cycle through `{class}`")]
    InheritanceCycle { class: String },
}
