#![warn(clippy::pedantic)]

use gendesign::{
    Action, AdapterError, DesignLedger, DesignStatus, IntentClassifier, KeywordClassifier,
    LedgerEntry, Material, OptimizationCategory, OptimizationOutcome, Orchestrator,
    PatternExtractor, Phase, Response, ResponsePayload, SectionTable, SpecField,
};
use tempfile::TempDir;

fn build_orchestrator(dir: &TempDir) -> Orchestrator<PatternExtractor, KeywordClassifier> {
    Orchestrator::new(
        PatternExtractor,
        KeywordClassifier,
        SectionTable::default(),
        DesignLedger::new(dir.path().join("history.csv")),
    )
}

/// Drive a session up to the analyzing phase with a safe wood beam.
fn gather_wood_beam(
    orchestrator: &Orchestrator<PatternExtractor, KeywordClassifier>,
    session: &str,
) -> Response {
    orchestrator.process(
        session,
        "wood beam, span 4m, load 12kN, height 200mm, width 150mm",
        None,
    )
}

#[test]
fn gathering_reports_missing_fields_then_analyzes() {
    let dir = TempDir::new().expect("temp dir");
    let orchestrator = build_orchestrator(&dir);

    let first = orchestrator.process("s1", "I need a wood beam, 4m long, carrying 12kN", None);
    assert_eq!(first.action, Action::GatherInfo);
    assert!(first.requires_more_input);
    let ResponsePayload::MissingFields { missing } = first.payload else {
        panic!("expected missing-field payload");
    };
    assert_eq!(missing, vec![SpecField::Height, SpecField::Width]);
    assert_eq!(orchestrator.session_phase("s1"), Some(Phase::Gathering));

    let second = orchestrator.process("s1", "make it 200mm high and 150mm wide", None);
    assert_eq!(second.action, Action::AnalyzeOnly);
    let ResponsePayload::Analysis { spec, analysis } = second.payload else {
        panic!("expected analysis payload");
    };
    assert_eq!(spec.material, Material::Wood);
    assert_eq!(analysis.status, DesignStatus::Pass);
    assert!(analysis.deflection_mm < analysis.allowable_mm);
    assert_eq!(orchestrator.session_phase("s1"), Some(Phase::Analyzing));
}

#[test]
fn full_protocol_reaches_completion() {
    let dir = TempDir::new().expect("temp dir");
    let orchestrator = build_orchestrator(&dir);
    gather_wood_beam(&orchestrator, "s1");

    let history = orchestrator.process("s1", "any similar designs in the history?", None);
    assert_eq!(history.action, Action::ShowHistory);
    let ResponsePayload::History { matched, .. } = history.payload else {
        panic!("expected history payload");
    };
    // The analyzed design itself was recorded, so a match always exists here.
    assert!(matched.is_some());
    assert_eq!(orchestrator.session_phase("s1"), Some(Phase::HistoryResults));

    let optimized = orchestrator.process("s1", "please optimize the design", None);
    assert_eq!(optimized.action, Action::OptimizeDesign);
    assert!(!optimized.requires_more_input);
    let ResponsePayload::Optimization(OptimizationOutcome::Optimized(summary)) = optimized.payload
    else {
        panic!("expected a successful optimization");
    };
    assert_eq!(summary.category, OptimizationCategory::OptimizationSuccess);
    assert!(summary.deflection_mm < summary.allowable_mm);
    assert_eq!(orchestrator.session_phase("s1"), Some(Phase::Completed));
}

#[test]
fn completed_session_cycles_to_fresh_gathering() {
    let dir = TempDir::new().expect("temp dir");
    let orchestrator = build_orchestrator(&dir);
    gather_wood_beam(&orchestrator, "s1");
    orchestrator.process("s1", "any similar designs in the history?", None);
    orchestrator.process("s1", "please optimize the design", None);
    assert_eq!(orchestrator.session_phase("s1"), Some(Phase::Completed));

    // The next message starts a brand-new specification.
    let fresh = orchestrator.process("s1", "concrete beam please", None);
    assert_eq!(fresh.action, Action::GatherInfo);
    let ResponsePayload::MissingFields { missing } = fresh.payload else {
        panic!("expected missing-field payload");
    };
    assert_eq!(
        missing,
        vec![
            SpecField::Length,
            SpecField::Load,
            SpecField::Height,
            SpecField::Width
        ]
    );
    assert_eq!(orchestrator.session_phase("s1"), Some(Phase::Gathering));
}

#[test]
fn reset_discards_state_in_any_phase() {
    let dir = TempDir::new().expect("temp dir");
    let orchestrator = build_orchestrator(&dir);
    gather_wood_beam(&orchestrator, "s1");
    assert_eq!(orchestrator.session_phase("s1"), Some(Phase::Analyzing));

    let reset = orchestrator.process("s1", "let's start over", None);
    assert_eq!(reset.action, Action::SessionReset);
    assert_eq!(orchestrator.session_phase("s1"), Some(Phase::Gathering));

    // Everything gathered before the reset is gone.
    let next = orchestrator.process("s1", "hello", None);
    let ResponsePayload::MissingFields { missing } = next.payload else {
        panic!("expected missing-field payload");
    };
    assert_eq!(missing, SpecField::ALL.to_vec());
}

#[test]
fn analysis_is_reshown_when_no_intent_is_detected() {
    let dir = TempDir::new().expect("temp dir");
    let orchestrator = build_orchestrator(&dir);
    let first = gather_wood_beam(&orchestrator, "s1");
    let again = orchestrator.process("s1", "what does that verdict mean?", None);

    assert_eq!(again.action, Action::AnalyzeOnly);
    assert_eq!(again.payload, first.payload);
    assert_eq!(orchestrator.session_phase("s1"), Some(Phase::Analyzing));
}

#[test]
fn smaller_prior_design_wins_the_history_comparison() {
    let dir = TempDir::new().expect("temp dir");
    let ledger = DesignLedger::new(dir.path().join("history.csv"));
    // A leaner adequate design from an earlier session.
    ledger
        .append(&LedgerEntry {
            material: Material::Wood,
            length_mm: 4_000.0,
            height_mm: 180.0,
            width_mm: 120.0,
            load_n: 12_000.0,
            volume_mm3: 4_000.0 * 180.0 * 120.0,
            deflection_mm: 16.0,
            allowable_mm: 4_000.0 / 240.0,
            status: DesignStatus::Pass,
        })
        .expect("seed append");

    let orchestrator = Orchestrator::new(
        PatternExtractor,
        KeywordClassifier,
        SectionTable::default(),
        ledger,
    );
    gather_wood_beam(&orchestrator, "s1");
    let history = orchestrator.process("s1", "show me the history", None);

    let ResponsePayload::History {
        current_volume_mm3,
        matched,
    } = history.payload
    else {
        panic!("expected history payload");
    };
    let found = matched.expect("prior design matches");
    assert!((found.volume_mm3 - 4_000.0 * 180.0 * 120.0).abs() < 1.0e-6);
    assert!(found.volume_mm3 < current_volume_mm3);
    let saving = found
        .efficiency_improvement_percent
        .expect("current volume known");
    assert!(saving > 0.0);
}

#[test]
fn failing_design_finds_no_adequate_history() {
    let dir = TempDir::new().expect("temp dir");
    let orchestrator = build_orchestrator(&dir);

    let analyzed = orchestrator.process(
        "s1",
        "wood beam, span 6m, load 30kN, height 120mm, width 60mm",
        None,
    );
    let ResponsePayload::Analysis { analysis, .. } = analyzed.payload else {
        panic!("expected analysis payload");
    };
    assert_eq!(analysis.status, DesignStatus::Fail);

    // The only recorded design failed, so the history query returns nothing.
    let history = orchestrator.process("s1", "show me the history", None);
    let ResponsePayload::History { matched, .. } = history.payload else {
        panic!("expected history payload");
    };
    assert!(matched.is_none());
}

#[test]
fn flaky_classifier_degrades_instead_of_aborting() {
    struct Unavailable;
    impl IntentClassifier for Unavailable {
        fn detect_reset(&self, _text: &str) -> Result<bool, AdapterError> {
            Err(AdapterError("classifier offline".to_owned()))
        }
        fn detect_history_request(&self, _text: &str) -> Result<bool, AdapterError> {
            Err(AdapterError("classifier offline".to_owned()))
        }
        fn detect_optimization_request(&self, _text: &str) -> Result<bool, AdapterError> {
            Err(AdapterError("classifier offline".to_owned()))
        }
    }

    let dir = TempDir::new().expect("temp dir");
    let orchestrator = Orchestrator::new(
        PatternExtractor,
        Unavailable,
        SectionTable::default(),
        DesignLedger::new(dir.path().join("history.csv")),
    );

    // Intents all read as absent; the conversation still gathers and analyzes.
    let analyzed = orchestrator.process(
        "s1",
        "wood beam, span 4m, load 12kN, height 200mm, width 150mm",
        None,
    );
    assert_eq!(analyzed.action, Action::AnalyzeOnly);

    // A history request cannot be recognized, so the analysis is re-shown.
    let repeat = orchestrator.process("s1", "show me the history", None);
    assert_eq!(repeat.action, Action::AnalyzeOnly);
    assert_eq!(orchestrator.session_phase("s1"), Some(Phase::Analyzing));
}

#[test]
fn sessions_progress_independently() {
    let dir = TempDir::new().expect("temp dir");
    let orchestrator = build_orchestrator(&dir);

    gather_wood_beam(&orchestrator, "alice");
    let bob = orchestrator.process("bob", "steel beam, 6m long", None);

    assert_eq!(orchestrator.session_phase("alice"), Some(Phase::Analyzing));
    assert_eq!(orchestrator.session_phase("bob"), Some(Phase::Gathering));
    let ResponsePayload::MissingFields { missing } = bob.payload else {
        panic!("expected missing-field payload");
    };
    assert_eq!(
        missing,
        vec![SpecField::Load, SpecField::Height, SpecField::Width]
    );
}

#[test]
fn attachment_fields_merge_into_the_specification() {
    let dir = TempDir::new().expect("temp dir");
    let orchestrator = build_orchestrator(&dir);

    let attachment = serde_json::json!({
        "height_mm": 200.0,
        "width_mm": 150.0
    });
    orchestrator.process("s1", "wood beam, span 4m, load 12kN", None);
    let completed = orchestrator.process("s1", "dimensions attached", Some(&attachment));

    assert_eq!(completed.action, Action::AnalyzeOnly);
    let ResponsePayload::Analysis { spec, .. } = completed.payload else {
        panic!("expected analysis payload");
    };
    assert!((spec.height_mm - 200.0).abs() < f64::EPSILON);
    assert!((spec.width_mm - 150.0).abs() < f64::EPSILON);
}
