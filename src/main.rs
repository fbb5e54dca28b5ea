use std::error::Error;

use gendesign::{
    DesignLedger, KeywordClassifier, Orchestrator, PatternExtractor, PlainTextPresenter,
    Presenter, SectionTable,
};

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Wire the deterministic reference adapters to the orchestrator. Real
    // deployments swap these for language-model-backed implementations.
    let orchestrator = Orchestrator::new(
        PatternExtractor,
        KeywordClassifier,
        SectionTable::default(),
        DesignLedger::new("historical_designs.csv"),
    );
    let presenter = PlainTextPresenter;

    // A scripted conversation exercising the full protocol: gather the
    // specification over two messages, review the analysis, compare against
    // the historical ledger, then optimize.
    let script = [
        "I need a wood beam, 4m long, carrying 12kN",
        "make it 200mm high and 150mm wide",
        "are there any similar designs in the history?",
        "please optimize the design",
    ];

    for message in script {
        println!("> {message}");
        let response = orchestrator.process("demo", message, None);
        println!("{}", presenter.present(&response));
    }

    Ok(())
}
