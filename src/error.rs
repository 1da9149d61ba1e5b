//! Error handling for the qualitative coding pipeline
//!
//! This module provides idiomatic Rust error types using thiserror, layered
//! to match the failure taxonomy of the pipeline: call-level failures
//! (retryable), data-integrity failures (recovered locally with warnings),
//! corpus-level failures (fatal), and per-document failures (quarantined).

use std::time::Duration;

use thiserror::Error;

/// Call-level failure from the structured-extraction backend.
///
/// Every backend response is resolved into exactly one of these tags; the
/// per-phase policy then maps each tag to retry, abort, or drop-and-warn.
/// A parse failure must never propagate as an undifferentiated exception.
#[derive(Error, Debug)]
pub enum CallError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed structured output: {0}")]
    Parse(String),

    #[error("structured output violates tool schema: {0}")]
    SchemaViolation(String),

    #[error("response truncated by backend (stop_reason={0})")]
    Truncated(String),

    #[error("backend refused the request: {0}")]
    Refusal(String),

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("empty response from backend")]
    Empty,
}

impl CallError {
    /// Whether a bounded retry with backoff is worth attempting.
    ///
    /// Truncation and refusals are deterministic for a given prompt, so
    /// retrying them only burns budget; everything else is transient or
    /// stochastic enough to retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            CallError::Transport(_) | CallError::Timeout(_) | CallError::Empty => true,
            CallError::Parse(_) | CallError::SchemaViolation(_) => true,
            CallError::Api { status, .. } => *status == 429 || *status >= 500,
            CallError::Truncated(_) | CallError::Refusal(_) => false,
        }
    }
}

/// Taxonomy structural violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaxonomyError {
    #[error("taxonomy contains no codes")]
    Empty,

    #[error("duplicate code id '{0}'")]
    DuplicateId(String),

    #[error("code '{code}' references unknown parent '{parent}'")]
    UnknownParent { code: String, parent: String },

    #[error("code '{code}' has level {found}, expected {expected} (parent level + 1)")]
    LevelMismatch {
        code: String,
        expected: u8,
        found: u8,
    },

    #[error("root code '{code}' must have level 0, found {found}")]
    RootLevel { code: String, found: u8 },

    #[error("cycle detected among parent links: {chain}")]
    Cycle { chain: String },

    #[error("hierarchy depth {found} exceeds maximum {max}")]
    TooDeep { found: u8, max: u8 },
}

/// Errors from the free-text schema parser (CLOSED/MIXED modes).
#[derive(Error, Debug)]
pub enum SchemaParseError {
    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("definition text produced no entries")]
    EmptyDefinition,

    #[error("unknown property type '{found}' at line {line}, expected one of: string, number, boolean, list")]
    UnknownPropertyType { line: usize, found: String },

    #[error(transparent)]
    Taxonomy(#[from] TaxonomyError),
}

/// Which discovery/application phase an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseName {
    CodeDiscovery,
    SpeakerDiscovery,
    EntityDiscovery,
    Application,
}

impl std::fmt::Display for PhaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PhaseName::CodeDiscovery => "code discovery",
            PhaseName::SpeakerDiscovery => "speaker discovery",
            PhaseName::EntityDiscovery => "entity discovery",
            PhaseName::Application => "application",
        };
        write!(f, "{}", name)
    }
}

/// Terminal failure of a single discovery phase.
#[derive(Error, Debug)]
pub enum PhaseError {
    #[error("{phase} failed after {attempts} attempt(s): {source}")]
    CallsExhausted {
        phase: PhaseName,
        attempts: usize,
        #[source]
        source: CallError,
    },

    #[error("{phase} produced a structurally invalid result: {source}")]
    InvalidResult {
        phase: PhaseName,
        #[source]
        source: TaxonomyError,
    },

    #[error("{phase} produced an empty result")]
    EmptyResult { phase: PhaseName },

    #[error("{phase} requires a caller-supplied schema in {mode} mode")]
    MissingSeed { phase: PhaseName, mode: String },

    #[error("{phase} seed definition is invalid: {source}")]
    InvalidSeed {
        phase: PhaseName,
        #[source]
        source: SchemaParseError,
    },
}

impl PhaseError {
    pub fn phase(&self) -> PhaseName {
        match self {
            PhaseError::CallsExhausted { phase, .. }
            | PhaseError::InvalidResult { phase, .. }
            | PhaseError::EmptyResult { phase }
            | PhaseError::MissingSeed { phase, .. }
            | PhaseError::InvalidSeed { phase, .. } => *phase,
        }
    }
}

/// Graph persistence errors.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("graph driver error: {0}")]
    Driver(#[from] neo4rs::Error),

    #[error("unknown edge for retraction: {kind} {from} -> {to}")]
    UnknownEdge {
        kind: String,
        from: String,
        to: String,
    },
}

/// Top-level pipeline failure.
///
/// Only fatal conditions surface here; per-document failures are quarantined
/// into the run report instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The documented cascading-failure mode: an empty taxonomy guarantees
    /// zero usable output downstream, so the run aborts before any Phase 4
    /// work is dispatched.
    #[error("fatal: code discovery produced an empty taxonomy; aborting before application")]
    EmptyTaxonomy,

    #[error("fatal: {0}")]
    Phase(#[from] PhaseError),

    #[error("graph persistence failed: {0}")]
    Graph(#[from] GraphError),

    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no documents to process")]
    EmptyCorpus,
}

pub type CallResult<T> = Result<T, CallError>;
pub type PhaseResult<T> = Result<T, PhaseError>;
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(CallError::Parse("bad json".into()).is_retryable());
        assert!(CallError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(CallError::Api {
            status: 429,
            body: "rate limited".into()
        }
        .is_retryable());
        assert!(!CallError::Api {
            status: 400,
            body: "bad request".into()
        }
        .is_retryable());
        assert!(!CallError::Truncated("max_tokens".into()).is_retryable());
        assert!(!CallError::Refusal("declined".into()).is_retryable());
    }

    #[test]
    fn phase_error_reports_phase() {
        let err = PhaseError::EmptyResult {
            phase: PhaseName::CodeDiscovery,
        };
        assert_eq!(err.phase(), PhaseName::CodeDiscovery);
        assert!(err.to_string().contains("code discovery"));
    }
}
