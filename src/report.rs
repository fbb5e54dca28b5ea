//! Plain-text rendering of conversation responses.

use std::fmt::Write;

use crate::adapters::Presenter;
use crate::conversation::{Response, ResponsePayload};
use crate::optimizer::{OptimizationOutcome, OptimizationSummary};

/// Deterministic presenter for the demo binary and tests.
///
/// Production deployments swap in a language-model-backed [`Presenter`]; this
/// one prints the numbers verbatim so the output can be cross-checked by
/// hand.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainTextPresenter;

impl Presenter for PlainTextPresenter {
    fn present(&self, response: &Response) -> String {
        match &response.payload {
            ResponsePayload::MissingFields { missing } => {
                let fields: Vec<String> = missing.iter().map(ToString::to_string).collect();
                format!(
                    "I still need the following to analyze your beam: {}",
                    fields.join(", ")
                )
            }
            ResponsePayload::Analysis { spec, analysis } => {
                let mut output = String::new();
                writeln!(
                    &mut output,
                    "{} beam, span {:.0} mm, load {:.0} N, section {:.0} x {:.0} mm",
                    spec.material, spec.length_mm, spec.load_n, spec.height_mm, spec.width_mm
                )
                .expect("writing to string cannot fail");
                writeln!(
                    &mut output,
                    "Deflection: {:.2} mm (allowable {:.2} mm, {:.1}% of limit)",
                    analysis.deflection_mm, analysis.allowable_mm, analysis.ratio_percent
                )
                .expect("writing to string cannot fail");
                writeln!(
                    &mut output,
                    "Volume: {:.0} mm^3 - verdict: {}",
                    analysis.volume_mm3, analysis.status
                )
                .expect("writing to string cannot fail");
                output
            }
            ResponsePayload::History {
                current_volume_mm3,
                matched,
            } => match matched {
                Some(found) => {
                    let mut output = String::new();
                    writeln!(
                        &mut output,
                        "Best prior design for this material and span: {:.0} x {:.0} mm, volume {:.0} mm^3 ({})",
                        found.height_mm, found.width_mm, found.volume_mm3, found.status
                    )
                    .expect("writing to string cannot fail");
                    if let Some(saving) = found.efficiency_improvement_percent {
                        writeln!(
                            &mut output,
                            "Compared with your design ({current_volume_mm3:.0} mm^3) it uses {saving:.1}% less material",
                        )
                        .expect("writing to string cannot fail");
                    }
                    output
                }
                None => "No comparable prior designs on record for this material and span."
                    .to_owned(),
            },
            ResponsePayload::Optimization(outcome) => render_optimization(outcome),
            ResponsePayload::Notice { message } => message.clone(),
        }
    }
}

/// Render the optimization outcome, success or structured failure.
fn render_optimization(outcome: &OptimizationOutcome) -> String {
    match outcome {
        OptimizationOutcome::Optimized(summary) => render_summary(summary),
        OptimizationOutcome::Failed { reason } => {
            format!("Optimization did not find a feasible design: {reason}")
        }
    }
}

/// Render a successful optimization summary.
fn render_summary(summary: &OptimizationSummary) -> String {
    let mut output = String::new();
    writeln!(
        &mut output,
        "Optimal section: {:.0} x {:.0} mm, volume {:.0} mm^3",
        summary.height_mm, summary.width_mm, summary.volume_mm3
    )
    .expect("writing to string cannot fail");
    writeln!(
        &mut output,
        "Deflection at optimum: {:.2} mm (allowable {:.2} mm)",
        summary.deflection_mm, summary.allowable_mm
    )
    .expect("writing to string cannot fail");
    if let Some(original) = summary.original {
        let verdict = if original.is_safe { "safe" } else { "unsafe" };
        writeln!(
            &mut output,
            "Your design: {:.0} mm^3, deflection {:.2} mm ({verdict})",
            original.volume_mm3, original.deflection_mm
        )
        .expect("writing to string cannot fail");
    }
    writeln!(&mut output, "{}", summary.assessment).expect("writing to string cannot fail");
    if let Some(ref alternative) = summary.standard_alternative {
        writeln!(
            &mut output,
            "Standard profile option: {} ({:.0} x {:.0} mm, {:.0} mm^3, deflection {:.2} mm)",
            alternative.profile,
            alternative.height_mm,
            alternative.width_mm,
            alternative.volume_mm3,
            alternative.deflection_mm
        )
        .expect("writing to string cannot fail");
    }
    output
}
