//! Adapter seams for field extraction, intent classification and
//! presentation.
//!
//! Production callers plug language-model-backed implementations into these
//! traits; the crate ships a deterministic keyword/pattern pair so the demo
//! binary and the integration tests exercise the full conversation loop
//! without any network dependency. Adapters fail safe: an extraction error is
//! treated as "nothing recognized" and an intent error as "intent absent",
//! so a flaky adapter degrades the conversation instead of aborting it.

use tracing::warn;

use crate::conversation::Response;
use crate::errors::AdapterError;
use crate::materials::Material;
use crate::spec::PartialBeamSpec;

/// Extracts beam specification fields from free-form user input.
pub trait SpecExtractor {
    /// Extract whatever fields the input mentions.
    ///
    /// `attachment` carries an optional structured upload (JSON document)
    /// accompanying the message. An input that mentions nothing recognizable
    /// yields the empty partial spec, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when the backing service fails outright.
    fn extract(
        &self,
        text: &str,
        attachment: Option<&serde_json::Value>,
    ) -> Result<PartialBeamSpec, AdapterError>;
}

/// Classifies user intent for the three conversation-steering signals.
pub trait IntentClassifier {
    /// Whether the input asks to abandon the session and start over.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when the backing service fails outright.
    fn detect_reset(&self, text: &str) -> Result<bool, AdapterError>;

    /// Whether the input asks to see historical designs.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when the backing service fails outright.
    fn detect_history_request(&self, text: &str) -> Result<bool, AdapterError>;

    /// Whether the input asks to run the optimization.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when the backing service fails outright.
    fn detect_optimization_request(&self, text: &str) -> Result<bool, AdapterError>;
}

/// Renders a structured response for the user.
pub trait Presenter {
    /// Produce the user-facing text for one response.
    fn present(&self, response: &Response) -> String;
}

/// Fail-safe extraction: an adapter error becomes the empty partial spec.
pub(crate) fn extract_or_empty<X: SpecExtractor + ?Sized>(
    extractor: &X,
    text: &str,
    attachment: Option<&serde_json::Value>,
) -> PartialBeamSpec {
    match extractor.extract(text, attachment) {
        Ok(partial) => partial,
        Err(error) => {
            warn!(%error, "field extraction failed, treating input as unrecognized");
            PartialBeamSpec::default()
        }
    }
}

/// Fail-safe intent check: an adapter error counts as "intent absent".
pub(crate) fn intent_or_false(result: Result<bool, AdapterError>, intent: &str) -> bool {
    match result {
        Ok(flag) => flag,
        Err(error) => {
            warn!(%error, intent, "intent classification failed, assuming absent");
            false
        }
    }
}

/// Deterministic keyword-based intent classifier.
///
/// Case-insensitive substring matching over a fixed phrase list per intent.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    fn matches_any(text: &str, phrases: &[&str]) -> bool {
        let lowered = text.to_lowercase();
        phrases.iter().any(|phrase| lowered.contains(phrase))
    }
}

impl IntentClassifier for KeywordClassifier {
    fn detect_reset(&self, text: &str) -> Result<bool, AdapterError> {
        Ok(Self::matches_any(
            text,
            &["reset", "start over", "start again", "new beam", "new design", "restart"],
        ))
    }

    fn detect_history_request(&self, text: &str) -> Result<bool, AdapterError> {
        Ok(Self::matches_any(
            text,
            &["history", "historical", "previous design", "past design", "similar design"],
        ))
    }

    fn detect_optimization_request(&self, text: &str) -> Result<bool, AdapterError> {
        Ok(Self::matches_any(
            text,
            &["optimize", "optimise", "optimization", "optimisation", "minimum volume", "improve"],
        ))
    }
}

/// Deterministic pattern-based field extractor.
///
/// Recognizes material names anywhere in the text and numbers tagged either
/// by a unit suffix (`6m`, `6000mm`, `20kN`) or by a neighbouring role word
/// (`height 200 mm`). Lengths given in metres and loads in kilonewtons are
/// normalized to mm and N. A JSON attachment deserializes directly into a
/// partial spec and overrides text-derived fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct PatternExtractor;

/// Which specification slot a number belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FieldRole {
    Length,
    Load,
    Height,
    Width,
}

/// Length unit multipliers to mm.
fn length_multiplier(unit: &str) -> Option<f64> {
    match unit {
        "mm" => Some(1.0),
        "cm" => Some(10.0),
        "m" => Some(1_000.0),
        _ => None,
    }
}

/// Load unit multipliers to N.
fn load_multiplier(unit: &str) -> Option<f64> {
    match unit {
        "n" => Some(1.0),
        "kn" => Some(1_000.0),
        _ => None,
    }
}

/// Role word for a dimension, e.g. "height" or "wide".
fn role_word(word: &str) -> Option<FieldRole> {
    match word {
        "length" | "span" | "long" => Some(FieldRole::Length),
        "load" | "force" | "carries" | "carrying" => Some(FieldRole::Load),
        "height" | "high" | "tall" | "deep" | "depth" => Some(FieldRole::Height),
        "width" | "wide" => Some(FieldRole::Width),
        _ => None,
    }
}

/// Split a token like `6000mm` into its numeric part and unit suffix.
fn split_number_and_unit(token: &str) -> Option<(f64, String)> {
    let numeric_end = token
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(token.len());
    if numeric_end == 0 {
        return None;
    }
    let value: f64 = token[..numeric_end].parse().ok()?;
    Some((value, token[numeric_end..].to_lowercase()))
}

impl PatternExtractor {
    fn extract_from_text(text: &str) -> PartialBeamSpec {
        let mut partial = PartialBeamSpec::default();

        let words: Vec<String> = text
            .split(|c: char| c.is_whitespace() || c == ',' || c == ';' || c == ':' || c == '=')
            .filter(|w| !w.is_empty())
            .map(|w| w.trim_matches(|c: char| c == '.' || c == '(' || c == ')').to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();

        for word in &words {
            if let Ok(material) = word.parse::<Material>() {
                partial.material = Some(material);
            }
        }

        for (index, word) in words.iter().enumerate() {
            let Some((value, mut unit)) = split_number_and_unit(word) else {
                continue;
            };
            if value <= 0.0 {
                continue;
            }
            // A bare number may carry its unit in the following token.
            if unit.is_empty() {
                if let Some(next) = words.get(index + 1) {
                    if length_multiplier(next).is_some() || load_multiplier(next).is_some() {
                        unit = next.clone();
                    }
                }
            }

            // The nearest role word within two tokens on either side wins.
            let neighbours = [
                index.checked_sub(1),
                index.checked_add(1),
                index.checked_sub(2),
                index.checked_add(2),
            ];
            let role = neighbours
                .into_iter()
                .flatten()
                .filter_map(|position| words.get(position))
                .find_map(|w| role_word(w));

            if let Some(factor) = load_multiplier(&unit) {
                partial.load_n = Some(value * factor);
                continue;
            }
            let length_factor = length_multiplier(&unit);
            match role {
                Some(FieldRole::Load) => {
                    partial.load_n = Some(value);
                }
                Some(FieldRole::Length) => {
                    partial.length_mm = Some(value * length_factor.unwrap_or(1.0));
                }
                Some(FieldRole::Height) => {
                    partial.height_mm = Some(value * length_factor.unwrap_or(1.0));
                }
                Some(FieldRole::Width) => {
                    partial.width_mm = Some(value * length_factor.unwrap_or(1.0));
                }
                None => {
                    // Untagged metre values default to the span.
                    if length_factor == Some(1_000.0) && partial.length_mm.is_none() {
                        partial.length_mm = Some(value * 1_000.0);
                    }
                }
            }
        }

        partial
    }
}

impl SpecExtractor for PatternExtractor {
    fn extract(
        &self,
        text: &str,
        attachment: Option<&serde_json::Value>,
    ) -> Result<PartialBeamSpec, AdapterError> {
        let mut partial = Self::extract_from_text(text);
        if let Some(document) = attachment {
            match serde_json::from_value::<PartialBeamSpec>(document.clone()) {
                Ok(uploaded) => partial.merge(uploaded),
                Err(error) => {
                    return Err(AdapterError(format!("unreadable attachment: {error}")));
                }
            }
        }
        Ok(partial)
    }
}
