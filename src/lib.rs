#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_doc_code_examples)]
#![warn(clippy::missing_docs_in_private_items)]
#![doc = include_str!("../README.md")]

pub mod adapters;
pub mod conversation;
pub mod deflection;
pub mod errors;
pub mod history;
pub mod materials;
pub mod optimizer;
pub mod report;
pub mod spec;

pub use adapters::{
    IntentClassifier, KeywordClassifier, PatternExtractor, Presenter, SpecExtractor,
};
pub use conversation::{
    Action, ConversationState, Orchestrator, Phase, Response, ResponsePayload, SessionStore,
};
pub use deflection::{
    allowable_deflection, analyze, deflect, BeamAnalysis, DesignStatus, LoadType, UnknownStatus,
};
pub use errors::{
    AdapterError, IncompleteSpecification, InvalidTransition, LedgerError, SessionError,
};
pub use history::{DesignLedger, HistoricalMatch, LedgerEntry};
pub use materials::{Material, SectionRow, SectionTable, UnknownMaterial};
pub use optimizer::{
    optimize, OptimizationCategory, OptimizationOutcome, OptimizationRequest, OptimizationSummary,
    OriginalAssessment, StandardAlternative,
};
pub use report::PlainTextPresenter;
pub use spec::{BeamSpecification, PartialBeamSpec, SpecField};
