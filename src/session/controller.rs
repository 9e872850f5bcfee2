#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;

use std::{
    future::Future,
    io,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::{sync::Mutex, time::timeout};

use crate::{
    backend::ArcBackend,
    export::{self, Artifact, ExportFormat},
    models::{BackendPrompt, ChunkTx, Conversation, Message, Model},
    storage::{ArcStorage, StorageError, validate_id},
    voice::{ArcRecognizer, ArcSpeaker, VoiceError},
};

use super::{SessionError, SessionOptions, Turn, TurnState};

/// Marks a turn as in flight and clears the mark when dropped, including
/// when the turn future is cancelled.
struct TurnGuard<'a>(&'a AtomicBool);

impl<'a> TurnGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, SessionError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SessionError::TurnInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the active conversation of one chat session and runs turns
/// against the backend, saving through the store after every append.
pub struct SessionController {
    backend: ArcBackend,
    storage: ArcStorage,
    speaker: Option<ArcSpeaker>,
    recognizer: Option<ArcRecognizer>,
    options: SessionOptions,
    conversation: Mutex<Conversation>,
    in_flight: AtomicBool,
    /// Held by a save until its write lands, including writes whose caller
    /// already gave up on them.
    save_order: Arc<Mutex<()>>,
}

impl SessionController {
    /// Starts on a fresh conversation with a generated id.
    pub fn new(backend: ArcBackend, storage: ArcStorage, options: SessionOptions) -> Self {
        let conversation =
            Conversation::new(Conversation::generate_id(Utc::now())).with_model(&options.model);
        Self {
            backend,
            storage,
            speaker: None,
            recognizer: None,
            options,
            conversation: Mutex::new(conversation),
            in_flight: AtomicBool::new(false),
            save_order: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_speaker(mut self, speaker: ArcSpeaker) -> Self {
        self.speaker = Some(speaker);
        self
    }

    pub fn with_recognizer(mut self, recognizer: ArcRecognizer) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_conversation(mut self, conversation: Conversation) -> Self {
        self.conversation = Mutex::new(conversation);
        self
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn state(&self) -> TurnState {
        if self.in_flight.load(Ordering::Acquire) {
            TurnState::AwaitingResponse
        } else {
            TurnState::Idle
        }
    }

    /// Snapshot of the active conversation.
    pub async fn conversation(&self) -> Conversation {
        self.conversation.lock().await.clone()
    }

    pub async fn id(&self) -> String {
        self.conversation.lock().await.id().to_string()
    }

    /// Model used for the next turn.
    pub async fn model(&self) -> String {
        let conversation = self.conversation.lock().await;
        conversation
            .model()
            .unwrap_or(&self.options.model)
            .to_string()
    }

    /// Runs one turn: record the user text, ask the model, record the
    /// reply. Nothing is appended for the reply when inference fails.
    pub async fn submit(
        &self,
        text: &str,
        chunk_tx: Option<ChunkTx>,
    ) -> Result<Turn, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyInput);
        }
        let guard = TurnGuard::acquire(&self.in_flight)?;

        let (user, snapshot) = {
            let mut conversation = self.conversation.lock().await;
            let user = conversation.append_message(Message::new_user(text)).clone();
            (user, conversation.clone())
        };
        self.persist(&snapshot).await?;

        let prompt = self.prompt(&snapshot);
        log::debug!(
            "conversation {}: sending {} messages to {}",
            snapshot.id(),
            prompt.messages().len(),
            prompt.model()
        );

        let response = match timeout(
            self.options.inference_timeout,
            self.backend.complete(prompt, chunk_tx),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                log::warn!("conversation {}: inference failed: {}", snapshot.id(), err);
                return Err(err.into());
            }
            Err(_) => {
                log::warn!(
                    "conversation {}: inference timed out after {:?}",
                    snapshot.id(),
                    self.options.inference_timeout
                );
                return Err(SessionError::InferenceTimeout);
            }
        };
        if let Some(usage) = response.usage.as_ref() {
            log::debug!("conversation {}: {}", snapshot.id(), usage);
        }

        let (reply, snapshot) = {
            let mut conversation = self.conversation.lock().await;
            let reply = conversation
                .append_message(Message::new_assistant(response.text))
                .clone();
            (reply, conversation.clone())
        };
        self.persist(&snapshot).await?;
        drop(guard);

        self.speak(reply.content()).await;
        Ok(Turn { user, reply })
    }

    /// Transcribes the recording and submits the text as a normal turn.
    pub async fn submit_audio(
        &self,
        audio: &Path,
        chunk_tx: Option<ChunkTx>,
    ) -> Result<Turn, SessionError> {
        let recognizer = self
            .recognizer
            .as_ref()
            .ok_or(VoiceError::Unavailable("speech input"))?;
        let text = recognizer.recognize(audio).await?;
        log::debug!("recognized {} chars from {}", text.len(), audio.display());
        self.submit(&text, chunk_tx).await
    }

    pub async fn save(&self) -> Result<(), SessionError> {
        let snapshot = self.conversation().await;
        self.persist(&snapshot).await
    }

    /// Replaces the active conversation with a stored one.
    pub async fn open(&self, id: &str) -> Result<(), SessionError> {
        let _guard = TurnGuard::acquire(&self.in_flight)?;
        let conversation =
            bounded(self.options.storage_timeout, "load", self.storage.load(id)).await?;
        log::info!(
            "opened conversation {} ({} messages)",
            conversation.id(),
            conversation.len()
        );
        *self.conversation.lock().await = conversation;
        Ok(())
    }

    /// Replaces the active conversation with an empty one and returns its
    /// id. Nothing is written until the first message.
    pub async fn start_new(&self, id: Option<&str>) -> Result<String, SessionError> {
        let _guard = TurnGuard::acquire(&self.in_flight)?;
        let id = match id {
            Some(id) => {
                validate_id(id)?;
                id.to_string()
            }
            None => Conversation::generate_id(Utc::now()),
        };
        let model = self.model().await;
        *self.conversation.lock().await = Conversation::new(id.clone()).with_model(model);
        Ok(id)
    }

    pub async fn set_model(&self, model: &str) -> Result<(), SessionError> {
        let _guard = TurnGuard::acquire(&self.in_flight)?;
        let snapshot = {
            let mut conversation = self.conversation.lock().await;
            conversation.set_model(model.trim());
            conversation.clone()
        };
        if !snapshot.is_empty() {
            self.persist(&snapshot).await?;
        }
        Ok(())
    }

    pub async fn list_models(&self) -> Result<Vec<Model>, SessionError> {
        Ok(self.backend.list_models().await?)
    }

    pub async fn export(
        &self,
        format: ExportFormat,
        now: DateTime<Utc>,
    ) -> Result<Artifact, SessionError> {
        let snapshot = self.conversation().await;
        Ok(export::export(&snapshot, format, now)?)
    }

    pub async fn export_as(
        &self,
        format: &str,
        now: DateTime<Utc>,
    ) -> Result<Artifact, SessionError> {
        self.export(format.parse()?, now).await
    }

    fn prompt(&self, conversation: &Conversation) -> BackendPrompt {
        let model = conversation.model().unwrap_or(&self.options.model);
        BackendPrompt::new(model)
            .with_messages(conversation.window(self.options.context_window).to_vec())
            .with_max_tokens(self.options.max_tokens)
            .with_temperature(self.options.temperature)
    }

    /// Saves run on their own task in call order, so a write abandoned by a
    /// timeout can never land after a newer snapshot.
    async fn persist(&self, conversation: &Conversation) -> Result<(), SessionError> {
        let storage = self.storage.clone();
        let order = self.save_order.clone();
        let snapshot = conversation.clone();
        let write = tokio::spawn(async move {
            let _order = order.lock_owned().await;
            storage.save(&snapshot).await
        });

        bounded(self.options.storage_timeout, "save", async move {
            write.await.map_err(|err| StorageError::Io(io::Error::other(err)))?
        })
        .await
    }

    async fn speak(&self, text: &str) {
        if !self.options.auto_speak {
            return;
        }
        let Some(speaker) = self.speaker.as_ref() else {
            return;
        };
        if let Err(err) = speaker.speak(text).await {
            log::warn!("speaking reply: {}", err);
        }
    }
}

/// Store calls are local I/O and get a short deadline of their own.
async fn bounded<T>(
    limit: Duration,
    op: &str,
    fut: impl Future<Output = Result<T, StorageError>>,
) -> Result<T, SessionError> {
    match timeout(limit, fut).await {
        Ok(res) => Ok(res?),
        Err(_) => {
            log::warn!("storage {} timed out after {:?}", op, limit);
            Err(StorageError::timed_out(op).into())
        }
    }
}
