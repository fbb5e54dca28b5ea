//! Conversation state machine and session orchestration.
//!
//! Sessions walk a fixed linear protocol: gather the specification, show the
//! analysis, show the historical comparison, run the optimization, complete.
//! Completion cycles back to gathering with a fresh specification. Any error
//! that escapes a turn handler discards the session and returns a fixed
//! restart message; nothing is ever replayed or resumed.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::adapters::{extract_or_empty, intent_or_false, IntentClassifier, SpecExtractor};
use crate::deflection::{analyze, BeamAnalysis};
use crate::errors::{InvalidTransition, SessionError};
use crate::history::{DesignLedger, HistoricalMatch, LedgerEntry};
use crate::materials::SectionTable;
use crate::optimizer::{optimize, OptimizationOutcome, OptimizationRequest};
use crate::spec::{BeamSpecification, PartialBeamSpec, SpecField};

/// Fixed user-facing message returned after an error-triggered restart.
pub const RESTART_MESSAGE: &str =
    "Something went wrong on my side. Let's start fresh: please describe your beam design.";

/// Phases of the conversation protocol, in order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Collecting the five specification fields.
    #[default]
    #[serde(rename = "gathering_info")]
    Gathering,
    /// Specification complete; analysis results shown.
    #[serde(rename = "analyzing_beam")]
    Analyzing,
    /// Historical comparison shown.
    #[serde(rename = "showing_history")]
    HistoryResults,
    /// Optimization running; never observed between inputs.
    #[serde(rename = "running_optimization")]
    Optimizing,
    /// Optimization results delivered.
    #[serde(rename = "session_completed")]
    Completed,
}

impl Phase {
    /// Whether the protocol permits moving from `self` to `next`.
    ///
    /// The protocol is a fixed cycle; no phase may be skipped or revisited
    /// out of order.
    #[must_use]
    pub const fn can_transition_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Gathering, Phase::Analyzing)
                | (Phase::Analyzing, Phase::HistoryResults)
                | (Phase::HistoryResults, Phase::Optimizing)
                | (Phase::Optimizing, Phase::Completed)
                | (Phase::Completed, Phase::Gathering)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Gathering => "gathering_info",
            Phase::Analyzing => "analyzing_beam",
            Phase::HistoryResults => "showing_history",
            Phase::Optimizing => "running_optimization",
            Phase::Completed => "session_completed",
        };
        f.write_str(name)
    }
}

/// Behavior selected for one conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Still collecting specification fields.
    GatherInfo,
    /// Analysis results delivered.
    AnalyzeOnly,
    /// Historical comparison delivered.
    ShowHistory,
    /// Optimization ran (successfully or not).
    OptimizeDesign,
    /// User asked to start over.
    SessionReset,
    /// An internal error forced a restart.
    ErrorRestart,
}

/// Structured result data accompanying each action, for the presentation
/// adapter to render.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponsePayload {
    /// Fields still needed before analysis can run.
    MissingFields {
        /// Unknown required fields, in canonical order.
        missing: Vec<SpecField>,
    },
    /// Deflection analysis of the completed specification.
    Analysis {
        /// The analyzed specification.
        spec: BeamSpecification,
        /// Numeric analysis results.
        analysis: BeamAnalysis,
    },
    /// Historical comparison against the current design.
    History {
        /// Volume of the current design in mm³.
        current_volume_mm3: f64,
        /// Best matching prior design, when one exists.
        matched: Option<HistoricalMatch>,
    },
    /// Terminal optimization outcome.
    Optimization(OptimizationOutcome),
    /// Plain informational message (reset and restart).
    Notice {
        /// The message text.
        message: String,
    },
}

/// Outcome of one conversation turn.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Response {
    /// Behavior that produced this response.
    pub action: Action,
    /// Structured result data.
    pub payload: ResponsePayload,
    /// Whether the conversation expects further input to make progress.
    pub requires_more_input: bool,
}

/// Per-session conversation state.
///
/// The missing-field list is never stored; it is recomputed from the partial
/// specification on demand.
#[derive(Clone, Debug, Default)]
pub struct ConversationState {
    /// Specification accumulated so far.
    pub spec: PartialBeamSpec,
    /// Current protocol phase.
    pub phase: Phase,
    /// Behavior of the previous turn, for diagnostics.
    pub last_behavior: Option<Action>,
}

impl ConversationState {
    /// Move to the next phase.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] when the protocol does not permit the
    /// move; the caller treats that as a defect and resets the session.
    pub fn transition_to(&mut self, next: Phase) -> Result<(), InvalidTransition> {
        if !self.phase.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        debug!(from = %self.phase, to = %next, "phase transition");
        self.phase = next;
        Ok(())
    }
}

/// Concurrent map of session identifiers to their conversation state.
///
/// The outer lock only guards the map; each session carries its own lock so
/// inputs for the same session serialize while distinct sessions proceed in
/// parallel.
#[derive(Debug, Default)]
pub struct SessionStore {
    /// Session identifier to state map.
    sessions: Mutex<HashMap<String, Arc<Mutex<ConversationState>>>>,
}

impl SessionStore {
    /// Fetch a session's state, creating a fresh one on first contact.
    fn get_or_create(&self, session_id: &str) -> Arc<Mutex<ConversationState>> {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(sessions.entry(session_id.to_owned()).or_default())
    }
}

/// Drives conversations end to end: adapter calls, state transitions, the
/// analysis and optimization handlers, and error recovery.
pub struct Orchestrator<X, I> {
    /// Per-session conversation state.
    sessions: SessionStore,
    /// Field extraction adapter.
    extractor: X,
    /// Intent classification adapter.
    classifier: I,
    /// Steel section table for the deflection model.
    table: SectionTable,
    /// Historical design ledger.
    ledger: DesignLedger,
}

impl<X: SpecExtractor, I: IntentClassifier> Orchestrator<X, I> {
    /// Build an orchestrator over the given adapters and stores.
    pub fn new(extractor: X, classifier: I, table: SectionTable, ledger: DesignLedger) -> Self {
        Self {
            sessions: SessionStore::default(),
            extractor,
            classifier,
            table,
            ledger,
        }
    }

    /// Current phase of a session, when it exists.
    #[must_use]
    pub fn session_phase(&self, session_id: &str) -> Option<Phase> {
        let sessions = self
            .sessions
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        sessions.get(session_id).map(|state| {
            state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .phase
        })
    }

    /// Handle one user input for a session.
    ///
    /// Always returns a response: recoverable conditions surface as regular
    /// payloads and anything that escapes the handlers resets the session and
    /// returns the fixed restart message.
    pub fn process(
        &self,
        session_id: &str,
        text: &str,
        attachment: Option<&serde_json::Value>,
    ) -> Response {
        let session = self.sessions.get_or_create(session_id);
        let mut state = session.lock().unwrap_or_else(PoisonError::into_inner);

        // Reset intent pre-empts everything, whatever the phase.
        if intent_or_false(self.classifier.detect_reset(text), "reset") {
            info!(session_id, "session reset requested");
            *state = ConversationState::default();
            state.last_behavior = Some(Action::SessionReset);
            return Response {
                action: Action::SessionReset,
                payload: ResponsePayload::Notice {
                    message: "Session reset. Please describe your beam design.".to_owned(),
                },
                requires_more_input: true,
            };
        }

        match self.turn(&mut state, text, attachment) {
            Ok(response) => {
                state.last_behavior = Some(response.action);
                response
            }
            Err(session_error) => {
                error!(session_id, input = text, %session_error, "turn failed, resetting session");
                *state = ConversationState::default();
                state.last_behavior = Some(Action::ErrorRestart);
                Response {
                    action: Action::ErrorRestart,
                    payload: ResponsePayload::Notice {
                        message: RESTART_MESSAGE.to_owned(),
                    },
                    requires_more_input: true,
                }
            }
        }
    }

    /// Dispatch one turn by phase.
    fn turn(
        &self,
        state: &mut ConversationState,
        text: &str,
        attachment: Option<&serde_json::Value>,
    ) -> Result<Response, SessionError> {
        if state.phase == Phase::Completed {
            // A completed session starts over: the old specification is
            // discarded and this message seeds the new one.
            state.transition_to(Phase::Gathering)?;
            state.spec = PartialBeamSpec::default();
        }

        match state.phase {
            Phase::Gathering => self.gather(state, text, attachment),
            Phase::Analyzing => self.analyzing(state, text),
            Phase::HistoryResults => self.history_results(state, text),
            // Optimization always runs to completion within one turn.
            Phase::Optimizing | Phase::Completed => Err(SessionError::Transition(
                InvalidTransition {
                    from: state.phase,
                    to: state.phase,
                },
            )),
        }
    }

    /// Gathering phase: merge extracted fields, analyze once complete.
    fn gather(
        &self,
        state: &mut ConversationState,
        text: &str,
        attachment: Option<&serde_json::Value>,
    ) -> Result<Response, SessionError> {
        let updates = extract_or_empty(&self.extractor, text, attachment);
        state.spec.merge(updates);

        if !state.spec.is_complete() {
            let missing = state.spec.missing_fields();
            debug!(?missing, "specification still incomplete");
            return Ok(Response {
                action: Action::GatherInfo,
                payload: ResponsePayload::MissingFields { missing },
                requires_more_input: true,
            });
        }

        let beam = state.spec.complete()?;
        state.transition_to(Phase::Analyzing)?;
        Ok(self.run_analysis(&beam))
    }

    /// Analyzing phase: advance to history on request, otherwise re-show the
    /// analysis (it is idempotent).
    fn analyzing(
        &self,
        state: &mut ConversationState,
        text: &str,
    ) -> Result<Response, SessionError> {
        let beam = state.spec.complete()?;
        if intent_or_false(self.classifier.detect_history_request(text), "history") {
            state.transition_to(Phase::HistoryResults)?;
            return Ok(self.run_history(&beam));
        }
        Ok(Response {
            action: Action::AnalyzeOnly,
            payload: ResponsePayload::Analysis {
                spec: beam,
                analysis: analyze(&beam, &self.table),
            },
            requires_more_input: true,
        })
    }

    /// History phase: optimize on request, otherwise re-show the comparison.
    fn history_results(
        &self,
        state: &mut ConversationState,
        text: &str,
    ) -> Result<Response, SessionError> {
        let beam = state.spec.complete()?;
        if intent_or_false(
            self.classifier.detect_optimization_request(text),
            "optimization",
        ) {
            state.transition_to(Phase::Optimizing)?;
            let request = OptimizationRequest::from(&beam);
            let outcome = optimize(&request, &self.table, &self.ledger);
            state.transition_to(Phase::Completed)?;
            info!(phase = %state.phase, "optimization turn finished");
            return Ok(Response {
                action: Action::OptimizeDesign,
                payload: ResponsePayload::Optimization(outcome),
                requires_more_input: false,
            });
        }
        Ok(self.run_history(&beam))
    }

    /// Analyze a complete specification and record the verdict in the ledger.
    fn run_analysis(&self, beam: &BeamSpecification) -> Response {
        let analysis = analyze(beam, &self.table);
        let entry = LedgerEntry {
            material: beam.material,
            length_mm: beam.length_mm,
            height_mm: beam.height_mm,
            width_mm: beam.width_mm,
            load_n: beam.load_n,
            volume_mm3: analysis.volume_mm3,
            deflection_mm: analysis.deflection_mm,
            allowable_mm: analysis.allowable_mm,
            status: analysis.status,
        };
        if let Err(ledger_error) = self.ledger.append(&entry) {
            // A full ledger failure must not cost the user their analysis.
            tracing::warn!(%ledger_error, "could not record analyzed design");
        }
        Response {
            action: Action::AnalyzeOnly,
            payload: ResponsePayload::Analysis {
                spec: *beam,
                analysis,
            },
            requires_more_input: true,
        }
    }

    /// Query the ledger for the best comparable prior design.
    fn run_history(&self, beam: &BeamSpecification) -> Response {
        let volume = beam.volume_mm3();
        let matched = self
            .ledger
            .best_match(beam.material, beam.length_mm, Some(volume));
        Response {
            action: Action::ShowHistory,
            payload: ResponsePayload::History {
                current_volume_mm3: volume,
                matched,
            },
            requires_more_input: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHASES: [Phase; 5] = [
        Phase::Gathering,
        Phase::Analyzing,
        Phase::HistoryResults,
        Phase::Optimizing,
        Phase::Completed,
    ];

    #[test]
    fn exactly_five_transitions_are_permitted() {
        let mut permitted = Vec::new();
        for from in PHASES {
            for to in PHASES {
                if from.can_transition_to(to) {
                    permitted.push((from, to));
                }
            }
        }
        assert_eq!(
            permitted,
            vec![
                (Phase::Gathering, Phase::Analyzing),
                (Phase::Analyzing, Phase::HistoryResults),
                (Phase::HistoryResults, Phase::Optimizing),
                (Phase::Optimizing, Phase::Completed),
                (Phase::Completed, Phase::Gathering),
            ]
        );
    }

    #[test]
    fn no_phase_transitions_to_itself() {
        for phase in PHASES {
            assert!(!phase.can_transition_to(phase), "{phase} loops");
        }
    }

    #[test]
    fn invalid_transition_reports_both_phases() {
        let mut state = ConversationState::default();
        let rejected = state.transition_to(Phase::Completed).unwrap_err();
        assert_eq!(rejected.from, Phase::Gathering);
        assert_eq!(rejected.to, Phase::Completed);
        // State is unchanged after a rejected transition.
        assert_eq!(state.phase, Phase::Gathering);
    }

    #[test]
    fn phase_wire_names_are_stable() {
        assert_eq!(Phase::Gathering.to_string(), "gathering_info");
        assert_eq!(Phase::Analyzing.to_string(), "analyzing_beam");
        assert_eq!(Phase::HistoryResults.to_string(), "showing_history");
        assert_eq!(Phase::Optimizing.to_string(), "running_optimization");
        assert_eq!(Phase::Completed.to_string(), "session_completed");
        assert_eq!(
            serde_json::to_string(&Phase::Gathering).expect("serializable"),
            "\"gathering_info\""
        );
    }

    #[test]
    fn action_wire_names_are_snake_case() {
        assert_eq!(
            serde_json::to_string(&Action::GatherInfo).expect("serializable"),
            "\"gather_info\""
        );
        assert_eq!(
            serde_json::to_string(&Action::ErrorRestart).expect("serializable"),
            "\"error_restart\""
        );
    }

    #[test]
    fn session_store_returns_the_same_state_per_id() {
        let store = SessionStore::default();
        let first = store.get_or_create("alpha");
        {
            let mut state = first.lock().expect("unpoisoned");
            state.spec.length_mm = Some(6_000.0);
        }
        let again = store.get_or_create("alpha");
        assert_eq!(
            again.lock().expect("unpoisoned").spec.length_mm,
            Some(6_000.0)
        );
        let other = store.get_or_create("beta");
        assert_eq!(other.lock().expect("unpoisoned").spec.length_mm, None);
    }
}
