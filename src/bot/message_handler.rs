//! Message Handler module for processing incoming lesion photos

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{FileId, MessageId, ParseMode, ReplyParameters};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::classifier::{ImageClassifier, Prediction};
use crate::conditions::describe;
use crate::diagnosis_log::{DiagnosisLog, DiagnosisRecord};
use crate::errors::DiagnosisError;
use crate::localization::t_lang;
use crate::severity::SeverityLookup;

use super::ui_builder::{format_diagnosis, format_diagnosis_plain};

/// The parts of an incoming Telegram message the intake flow needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingPhoto {
    pub chat_id: i64,
    pub message_id: i32,
    pub username: String,
    pub language_code: Option<String>,
    /// File id of the highest-resolution photo variant, if the message has a photo
    pub file_id: Option<String>,
}

impl IncomingPhoto {
    pub fn from_message(msg: &Message) -> Self {
        let user = msg.from.as_ref();
        Self {
            chat_id: msg.chat.id.0,
            message_id: msg.id.0,
            username: user
                .map(|u| u.username.clone().unwrap_or_else(|| u.first_name.clone()))
                .unwrap_or_else(|| "unknown".to_string()),
            language_code: user.and_then(|u| u.language_code.clone()),
            // Telegram orders photo sizes from smallest to largest
            file_id: msg
                .photo()
                .and_then(|sizes| sizes.last())
                .map(|largest| largest.file.id.0.clone()),
        }
    }
}

/// Outbound side of the messaging platform
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Fetch the raw bytes of an uploaded file
    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>>;
    /// Reply with a MarkdownV2 body
    async fn send_markdown(&self, chat_id: i64, reply_to: i32, text: &str) -> Result<()>;
    /// Reply with plain text
    async fn send_plain(&self, chat_id: i64, reply_to: i32, text: &str) -> Result<()>;
}

#[async_trait]
impl ChatTransport for Bot {
    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let file = self.get_file(FileId(file_id.to_string())).await?;
        let url = format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.token(),
            file.path
        );

        let response = reqwest::get(&url).await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn send_markdown(&self, chat_id: i64, reply_to: i32, text: &str) -> Result<()> {
        self.send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::MarkdownV2)
            .reply_parameters(ReplyParameters::new(MessageId(reply_to)))
            .await?;
        Ok(())
    }

    async fn send_plain(&self, chat_id: i64, reply_to: i32, text: &str) -> Result<()> {
        self.send_message(ChatId(chat_id), text)
            .reply_parameters(ReplyParameters::new(MessageId(reply_to)))
            .await?;
        Ok(())
    }
}

/// How a single intake run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// The message had no photo; the user was asked for one
    NoPhoto,
    /// A diagnosis reply was delivered
    Diagnosed,
    /// Saving or classifying failed; the user got the generic apology
    Failed,
}

/// Photo-to-diagnosis pipeline, built once at startup and shared by all updates
pub struct IntakeHandler {
    classifier: Arc<dyn ImageClassifier>,
    severity: Arc<dyn SeverityLookup>,
    temp_dir: PathBuf,
    classifier_timeout: Duration,
    diagnosis_log: Option<DiagnosisLog>,
}

impl IntakeHandler {
    pub fn new(
        classifier: Arc<dyn ImageClassifier>,
        severity: Arc<dyn SeverityLookup>,
        temp_dir: impl Into<PathBuf>,
        classifier_timeout: Duration,
    ) -> Self {
        Self {
            classifier,
            severity,
            temp_dir: temp_dir.into(),
            classifier_timeout,
            diagnosis_log: None,
        }
    }

    /// Record every delivered diagnosis in `log`
    pub fn with_diagnosis_log(mut self, log: DiagnosisLog) -> Self {
        self.diagnosis_log = Some(log);
        self
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Run the intake flow for one message.
    ///
    /// Only failures to deliver a reply are returned as errors; processing
    /// failures are answered with the generic apology. The temporary image
    /// never outlives this call.
    pub async fn handle<T>(&self, transport: &T, photo: IncomingPhoto) -> Result<IntakeOutcome>
    where
        T: ChatTransport + ?Sized,
    {
        let lang = photo.language_code.as_deref();

        let Some(file_id) = photo.file_id.as_deref() else {
            debug!(user_id = %photo.chat_id, "Message without photo");
            transport
                .send_plain(photo.chat_id, photo.message_id, &t_lang("prompt-send-photo", lang))
                .await?;
            return Ok(IntakeOutcome::NoPhoto);
        };

        let processed = async {
            let image = self.save_photo(transport, &photo, file_id).await?;
            let prediction = self.classify(image.path()).await?;
            Ok::<_, DiagnosisError>((image, prediction))
        }
        .await;

        // `_image` keeps the temporary file alive until the reply is sent
        let (_image, prediction) = match processed {
            Ok(done) => done,
            Err(e) => {
                error!(user_id = %photo.chat_id, error = %e, "Image processing failed for user");
                transport
                    .send_plain(photo.chat_id, photo.message_id, &t_lang("error-processing", lang))
                    .await?;
                return Ok(IntakeOutcome::Failed);
            }
        };

        info!(
            user_id = %photo.chat_id,
            label = %prediction.label,
            confidence = prediction.confidence_percent(),
            "Lesion classified"
        );

        let severity = self.severity.assess(&prediction.label).await;
        let reply = format_diagnosis(&prediction, severity.as_ref());

        if let Err(e) = transport
            .send_markdown(photo.chat_id, photo.message_id, &reply)
            .await
        {
            warn!(user_id = %photo.chat_id, error = %e, "MarkdownV2 reply rejected, resending as plain text");
            transport
                .send_plain(
                    photo.chat_id,
                    photo.message_id,
                    &format_diagnosis_plain(&prediction, severity.as_ref()),
                )
                .await?;
        }

        self.record(&photo, &prediction).await;

        Ok(IntakeOutcome::Diagnosed)
    }

    /// Download the photo into a temp file named after the chat and message ids
    async fn save_photo<T>(
        &self,
        transport: &T,
        photo: &IncomingPhoto,
        file_id: &str,
    ) -> Result<NamedTempFile, DiagnosisError>
    where
        T: ChatTransport + ?Sized,
    {
        let mut image = tempfile::Builder::new()
            .prefix(&format!("lesion-{}-{}-", photo.chat_id, photo.message_id))
            .suffix(".jpg")
            .tempfile_in(&self.temp_dir)?;

        let bytes = transport
            .fetch_file(file_id)
            .await
            .map_err(|e| DiagnosisError::Download(e.to_string()))?;

        image.as_file_mut().write_all(&bytes)?;
        image.as_file_mut().flush()?;

        debug!(
            user_id = %photo.chat_id,
            temp_path = %image.path().display(),
            bytes = bytes.len(),
            "Image downloaded successfully"
        );

        Ok(image)
    }

    /// Classify on the blocking pool, bounded by the configured timeout
    async fn classify(&self, image_path: &Path) -> Result<Prediction, DiagnosisError> {
        let classifier = Arc::clone(&self.classifier);
        let path = image_path.to_path_buf();
        let task = tokio::task::spawn_blocking(move || classifier.classify(&path));

        match tokio::time::timeout(self.classifier_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(DiagnosisError::Inference(format!(
                "Classifier task failed: {join_err}"
            ))),
            Err(_) => Err(DiagnosisError::Timeout(format!(
                "Classification exceeded {}s",
                self.classifier_timeout.as_secs()
            ))),
        }
    }

    async fn record(&self, photo: &IncomingPhoto, prediction: &Prediction) {
        let Some(log) = &self.diagnosis_log else {
            return;
        };

        let record = DiagnosisRecord::new(
            Utc::now(),
            photo.username.clone(),
            prediction.label.clone(),
            prediction.confidence_percent(),
            describe(&prediction.label),
        );

        if let Err(e) = log.append(record).await {
            error!(path = %log.path().display(), error = %e, "Failed to record diagnosis");
        }
    }
}

/// Dispatcher endpoint for photo messages
pub async fn photo_handler(bot: Bot, msg: Message, handler: Arc<IntakeHandler>) -> Result<()> {
    let photo = IncomingPhoto::from_message(&msg);
    debug!(user_id = %photo.chat_id, message_id = photo.message_id, "Received photo message from user");

    let outcome = handler.handle(&bot, photo).await?;
    debug!(?outcome, "Photo message handled");
    Ok(())
}
