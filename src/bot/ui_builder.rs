//! UI Builder module for formatting diagnosis replies

use crate::classifier::Prediction;
use crate::conditions::describe;
use crate::severity::Severity;
use crate::text_processing::escape_markdown_v2;

/// Confidence as a two-decimal percentage, e.g. `0.8765` -> `"87.65%"`
pub fn format_confidence(probability: f32) -> String {
    format!("{:.2}%", f64::from(probability) * 100.0)
}

/// Format a diagnosis as a MarkdownV2 message.
///
/// Every variable field is escaped exactly once here; callers pass raw text.
/// With a severity the reply carries the remote type and insight, otherwise the
/// static condition description.
pub fn format_diagnosis(prediction: &Prediction, severity: Option<&Severity>) -> String {
    let mut lines = vec![
        "🧾 *Diagnosis Result*".to_string(),
        format!("• *Condition:* {}", escape_markdown_v2(&prediction.label)),
        format!(
            "• *Confidence:* {}",
            escape_markdown_v2(&format_confidence(prediction.probability))
        ),
    ];

    match severity {
        Some(severity) => {
            lines.push(format!("• *Type:* {}", escape_markdown_v2(&severity.tag)));
            lines.push(format!(
                "• *Medical Insight:* {}",
                escape_markdown_v2(&severity.explanation)
            ));
        }
        None => {
            lines.push(format!(
                "• *Description:* {}",
                escape_markdown_v2(describe(&prediction.label))
            ));
        }
    }

    lines.join("\n")
}

/// Same content as [`format_diagnosis`] without any markup
pub fn format_diagnosis_plain(prediction: &Prediction, severity: Option<&Severity>) -> String {
    let mut lines = vec![
        "🧾 Diagnosis Result".to_string(),
        format!("• Condition: {}", prediction.label),
        format!("• Confidence: {}", format_confidence(prediction.probability)),
    ];

    match severity {
        Some(severity) => {
            lines.push(format!("• Type: {}", severity.tag));
            lines.push(format!("• Medical Insight: {}", severity.explanation));
        }
        None => lines.push(format!("• Description: {}", describe(&prediction.label))),
    }

    lines.join("\n")
}
