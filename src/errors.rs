//! Error types produced while gathering specifications, querying the design
//! ledger, or driving a conversation session.

use thiserror::Error;

use crate::conversation::Phase;
use crate::spec::SpecField;

/// Error returned when a phase transition outside the linear protocol is
/// attempted.
///
/// The conversation protocol is a fixed cycle; any other transition signals a
/// programming defect rather than user error. When one surfaces at the session
/// boundary the session is discarded and restarted.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("invalid phase transition: {from} -> {to}")]
pub struct InvalidTransition {
    /// Phase the session was in when the transition was attempted.
    pub from: Phase,
    /// Phase the caller tried to move to.
    pub to: Phase,
}

/// Error returned when a beam specification is used before it is complete.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("specification incomplete; missing fields: {}", format_fields(.missing))]
pub struct IncompleteSpecification {
    /// Required fields that are still unknown, in canonical order.
    pub missing: Vec<SpecField>,
}

/// Render the missing-field list for error messages.
fn format_fields(fields: &[SpecField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error returned by the historical design ledger.
///
/// A missing backing file is not an error; queries treat it as "no historical
/// data". These variants cover genuine I/O and format problems on a file that
/// does exist.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The backing store could not be read or appended to.
    #[error("ledger I/O failure on {path}: {source}")]
    Io {
        /// Path of the backing file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The backing store exists but its header does not match the expected
    /// column layout.
    #[error("ledger file {path} has an unrecognized header")]
    MalformedHeader {
        /// Path of the backing file.
        path: String,
    },
}

/// Error raised by an external adapter (field extraction or intent
/// classification).
///
/// Adapters fail safe: the orchestrator maps extraction failures to an empty
/// partial specification and intent failures to `false`, so these errors never
/// abort a session on their own.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("adapter failure: {0}")]
pub struct AdapterError(pub String);

/// Aggregate error for a single conversation turn.
///
/// Anything that escapes the per-phase handlers with this type triggers the
/// hard-reset recovery: the session state is discarded and a fixed restart
/// message is returned.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A phase transition outside the linear protocol was attempted.
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
    /// A handler required a complete specification that was not complete.
    #[error(transparent)]
    IncompleteSpec(#[from] IncompleteSpecification),
    /// The design ledger failed in a way that could not be downgraded to
    /// "no historical data".
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
