//! # Bot Tests
//!
//! Reply formatting and the photo intake flow, driven through an in-memory
//! transport with stub classifier and severity lookups.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dermabot::bot::{
    format_confidence, format_diagnosis, format_diagnosis_plain, ChatTransport, IncomingPhoto, IntakeHandler,
    IntakeOutcome,
};
use dermabot::classifier::{ImageClassifier, Prediction};
use dermabot::conditions::{describe, NO_DESCRIPTION};
use dermabot::diagnosis_log::{load_records, DiagnosisLog};
use dermabot::errors::DiagnosisError;
use dermabot::localization::t_lang;
use dermabot::severity::{Severity, SeverityLookup};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{tempdir, TempDir};

const PHOTO_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0 fake jpeg payload";

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Markdown(String),
    Plain(String),
}

/// Transport that serves a fixed photo and records every reply
#[derive(Default)]
struct RecordingTransport {
    fail_download: bool,
    reject_markdown: bool,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingTransport {
    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn fetch_file(&self, _file_id: &str) -> Result<Vec<u8>> {
        if self.fail_download {
            return Err(anyhow!("connection reset"));
        }
        Ok(PHOTO_BYTES.to_vec())
    }

    async fn send_markdown(&self, _chat_id: i64, _reply_to: i32, text: &str) -> Result<()> {
        if self.reject_markdown {
            return Err(anyhow!("Bad Request: can't parse entities"));
        }
        self.sent.lock().unwrap().push(Sent::Markdown(text.to_string()));
        Ok(())
    }

    async fn send_plain(&self, _chat_id: i64, _reply_to: i32, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Plain(text.to_string()));
        Ok(())
    }
}

/// Classifier returning a fixed result and remembering what it saw on disk
struct StubClassifier {
    result: Result<Prediction, DiagnosisError>,
    seen: Mutex<Option<(PathBuf, Vec<u8>)>>,
}

impl StubClassifier {
    fn returning(result: Result<Prediction, DiagnosisError>) -> Arc<Self> {
        Arc::new(Self {
            result,
            seen: Mutex::new(None),
        })
    }

    fn seen(&self) -> Option<(PathBuf, Vec<u8>)> {
        self.seen.lock().unwrap().clone()
    }
}

impl ImageClassifier for StubClassifier {
    fn classify(&self, image_path: &Path) -> Result<Prediction, DiagnosisError> {
        let bytes = std::fs::read(image_path).unwrap_or_default();
        *self.seen.lock().unwrap() = Some((image_path.to_path_buf(), bytes));
        self.result.clone()
    }
}

/// Classifier that never finishes in time
struct SlowClassifier;

impl ImageClassifier for SlowClassifier {
    fn classify(&self, _image_path: &Path) -> Result<Prediction, DiagnosisError> {
        std::thread::sleep(Duration::from_millis(500));
        Ok(Prediction::new("Melanoma", 0.9))
    }
}

struct StubSeverity(Option<Severity>);

#[async_trait]
impl SeverityLookup for StubSeverity {
    async fn assess(&self, _label: &str) -> Option<Severity> {
        self.0.clone()
    }
}

fn photo_message(file_id: Option<&str>) -> IncomingPhoto {
    IncomingPhoto {
        chat_id: 4242,
        message_id: 17,
        username: "alice".to_string(),
        language_code: Some("en".to_string()),
        file_id: file_id.map(String::from),
    }
}

fn handler_with(
    classifier: Arc<dyn ImageClassifier>,
    severity: Option<Severity>,
) -> (IntakeHandler, TempDir) {
    let dir = tempdir().unwrap();
    let handler = IntakeHandler::new(
        classifier,
        Arc::new(StubSeverity(severity)),
        dir.path(),
        Duration::from_secs(5),
    );
    (handler, dir)
}

fn temp_files(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path()).unwrap().count()
}

fn melanoma_severity() -> Severity {
    Severity::new("❗ Harmful - Cancerous", "Explanation text")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Confidence is rendered as a two-decimal percentage
    #[test]
    fn test_format_confidence() {
        assert_eq!(format_confidence(0.8765), "87.65%");
        assert_eq!(format_confidence(0.95), "95.00%");
        assert_eq!(format_confidence(1.0), "100.00%");
        assert_eq!(format_confidence(0.0), "0.00%");
        assert_eq!(format_confidence(0.123456), "12.35%");
    }

    /// With a severity the reply carries type and insight, all escaped
    #[test]
    fn test_format_diagnosis_with_severity() {
        let message = format_diagnosis(&Prediction::new("Melanoma", 0.95), Some(&melanoma_severity()));

        assert_eq!(
            message,
            "🧾 *Diagnosis Result*\n\
             • *Condition:* Melanoma\n\
             • *Confidence:* 95\\.00%\n\
             • *Type:* ❗ Harmful \\- Cancerous\n\
             • *Medical Insight:* Explanation text"
        );
    }

    /// Without a severity the static description is used
    #[test]
    fn test_format_diagnosis_with_description() {
        let message = format_diagnosis(&Prediction::new("Dermatofibroma", 0.5), None);

        assert!(message.contains("• *Condition:* Dermatofibroma"));
        assert!(message.contains("• *Confidence:* 50\\.00%"));
        assert!(message.contains(
            "• *Description:* A common benign skin nodule, typically firm and raised\\. Often harmless\\."
        ));
        assert!(!message.contains("*Type:*"));
    }

    /// Unknown labels fall back to the fixed description, escaped once
    #[test]
    fn test_format_unknown_label() {
        let message = format_diagnosis(&Prediction::new("lesion_x-1", 0.3), None);
        assert_eq!(describe("lesion_x-1"), NO_DESCRIPTION);
        assert!(message.contains("• *Condition:* lesion\\_x\\-1"));
        assert!(message.contains("No medical description available\\."));
    }

    /// The plain rendering carries the same content without markup
    #[test]
    fn test_format_diagnosis_plain() {
        let message = format_diagnosis_plain(&Prediction::new("Melanoma", 0.95), Some(&melanoma_severity()));
        assert!(message.contains("• Condition: Melanoma"));
        assert!(message.contains("• Confidence: 95.00%"));
        assert!(message.contains("• Type: ❗ Harmful - Cancerous"));
        assert!(!message.contains('*'));
        assert!(!message.contains('\\'));
    }

    /// No photo: the fixed prompt and nothing else, no temp file
    #[tokio::test]
    async fn test_no_photo_prompts_user() {
        let classifier = StubClassifier::returning(Ok(Prediction::new("Melanoma", 0.95)));
        let (handler, dir) = handler_with(classifier.clone(), Some(melanoma_severity()));
        let transport = RecordingTransport::default();

        let outcome = handler.handle(&transport, photo_message(None)).await.unwrap();

        assert_eq!(outcome, IntakeOutcome::NoPhoto);
        assert_eq!(transport.sent(), vec![Sent::Plain(t_lang("prompt-send-photo", Some("en")))]);
        assert!(classifier.seen().is_none());
        assert_eq!(temp_files(&dir), 0);
    }

    /// Stub classifier and severity produce the full escaped reply
    #[tokio::test]
    async fn test_end_to_end_diagnosis() {
        let classifier = StubClassifier::returning(Ok(Prediction::new("Melanoma", 0.95)));
        let (handler, dir) = handler_with(classifier.clone(), Some(melanoma_severity()));
        let transport = RecordingTransport::default();

        let outcome = handler.handle(&transport, photo_message(Some("photo-large"))).await.unwrap();
        assert_eq!(outcome, IntakeOutcome::Diagnosed);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        let Sent::Markdown(message) = &sent[0] else {
            panic!("expected a MarkdownV2 reply, got {sent:?}");
        };
        assert!(message.contains("• *Condition:* Melanoma"));
        assert!(message.contains("• *Confidence:* 95\\.00%"));
        assert!(message.contains("• *Type:* ❗ Harmful \\- Cancerous"));
        assert!(message.contains("• *Medical Insight:* Explanation text"));

        // The classifier read the downloaded photo from a per-message temp file
        let (path, bytes) = classifier.seen().unwrap();
        assert_eq!(bytes, PHOTO_BYTES);
        assert_eq!(handler.temp_dir(), dir.path());
        assert!(path.starts_with(handler.temp_dir()));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("lesion-4242-17-"));
        assert!(!path.exists());
        assert_eq!(temp_files(&dir), 0);
    }

    /// Classification failures yield the generic apology and still clean up
    #[tokio::test]
    async fn test_classifier_failure_replies_with_error() {
        let classifier = StubClassifier::returning(Err(DiagnosisError::ImageLoad("corrupt jpeg".to_string())));
        let (handler, dir) = handler_with(classifier.clone(), Some(melanoma_severity()));
        let transport = RecordingTransport::default();

        let outcome = handler.handle(&transport, photo_message(Some("photo"))).await.unwrap();

        assert_eq!(outcome, IntakeOutcome::Failed);
        let sent = transport.sent();
        assert_eq!(sent, vec![Sent::Plain(t_lang("error-processing", Some("en")))]);
        // Internal error details never reach the user
        assert!(!format!("{sent:?}").contains("corrupt jpeg"));
        assert!(classifier.seen().is_some());
        assert_eq!(temp_files(&dir), 0);
    }

    /// Download failures are processing errors too
    #[tokio::test]
    async fn test_download_failure_replies_with_error() {
        let classifier = StubClassifier::returning(Ok(Prediction::new("Melanoma", 0.95)));
        let (handler, dir) = handler_with(classifier.clone(), None);
        let transport = RecordingTransport {
            fail_download: true,
            ..Default::default()
        };

        let outcome = handler.handle(&transport, photo_message(Some("photo"))).await.unwrap();

        assert_eq!(outcome, IntakeOutcome::Failed);
        assert_eq!(transport.sent(), vec![Sent::Plain(t_lang("error-processing", Some("en")))]);
        assert!(classifier.seen().is_none());
        assert_eq!(temp_files(&dir), 0);
    }

    /// Slow inference is cut off by the classifier timeout
    #[tokio::test]
    async fn test_classifier_timeout() {
        let dir = tempdir().unwrap();
        let handler = IntakeHandler::new(
            Arc::new(SlowClassifier),
            Arc::new(StubSeverity(None)),
            dir.path(),
            Duration::from_millis(50),
        );
        let transport = RecordingTransport::default();

        let outcome = handler.handle(&transport, photo_message(Some("photo"))).await.unwrap();

        assert_eq!(outcome, IntakeOutcome::Failed);
        assert_eq!(temp_files(&dir), 0);
    }

    /// A rejected MarkdownV2 body is resent as plain text
    #[tokio::test]
    async fn test_markdown_rejection_falls_back_to_plain() {
        let classifier = StubClassifier::returning(Ok(Prediction::new("Melanoma", 0.95)));
        let (handler, dir) = handler_with(classifier, Some(melanoma_severity()));
        let transport = RecordingTransport {
            reject_markdown: true,
            ..Default::default()
        };

        let outcome = handler.handle(&transport, photo_message(Some("photo"))).await.unwrap();

        assert_eq!(outcome, IntakeOutcome::Diagnosed);
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], Sent::Plain(text) if text.contains("Confidence: 95.00%")));
        assert_eq!(temp_files(&dir), 0);
    }

    /// French-speaking users get the French prompt
    #[tokio::test]
    async fn test_localized_prompt() {
        let classifier = StubClassifier::returning(Ok(Prediction::new("Melanoma", 0.95)));
        let (handler, _dir) = handler_with(classifier, None);
        let transport = RecordingTransport::default();

        let mut message = photo_message(None);
        message.language_code = Some("fr".to_string());
        handler.handle(&transport, message).await.unwrap();

        assert_eq!(transport.sent(), vec![Sent::Plain(t_lang("prompt-send-photo", Some("fr")))]);
    }

    /// Delivered diagnoses are appended to the history
    #[tokio::test]
    async fn test_diagnosis_is_recorded() {
        let classifier = StubClassifier::returning(Ok(Prediction::new("Melanoma", 0.95)));
        let log_dir = tempdir().unwrap();
        let log_path = log_dir.path().join("diagnosis_logs.json");
        let (handler, _dir) = handler_with(classifier, Some(melanoma_severity()));
        let handler = handler.with_diagnosis_log(DiagnosisLog::new(&log_path));
        let transport = RecordingTransport::default();

        handler.handle(&transport, photo_message(Some("photo"))).await.unwrap();
        handler.handle(&transport, photo_message(None)).await.unwrap();

        let records = load_records(&log_path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].username, "alice");
        assert_eq!(records[0].label, "Melanoma");
        assert!((records[0].confidence - 95.0).abs() < 1e-3);
        assert_eq!(records[0].description, describe("Melanoma"));
    }
}
