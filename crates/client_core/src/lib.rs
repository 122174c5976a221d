use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use shared::{
    domain::{SessionMode, TaskId},
    protocol::{artifact_file_name, CreateFontRequest, CreateFontResponse},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub mod error;
pub mod presenter;
pub mod transport;
pub mod types;

pub use error::SessionError;
pub use presenter::{EventPresenter, NullPresenter, SessionPresenter};
pub use transport::{HttpJobApi, TransportError};
pub use types::{
    BatchReport, DownloadedFont, GenerationResult, ImageBlob, Notification, SessionConfig,
    SessionEvent, Severity, SlotState, SlotVisual, UploadOutcome, UploadProgress,
};

const GENERIC_GENERATION_FAILURE: &str = "the font could not be generated, please try again";
const DEFAULT_RESULT_MESSAGE: &str = "Your font is ready to download";

/// Remote font job backend.
#[async_trait]
pub trait JobApi: Send + Sync {
    async fn create_task(&self) -> Result<TaskId, TransportError>;
    async fn upload_character(
        &self,
        task_id: &TaskId,
        character: char,
        image: &ImageBlob,
    ) -> Result<(), TransportError>;
    async fn create_font(
        &self,
        request: &CreateFontRequest,
    ) -> Result<CreateFontResponse, TransportError>;
    async fn download_artifact(&self, file_name: &str) -> Result<Vec<u8>, TransportError>;
}

#[derive(Debug, Default)]
struct SlotEntry {
    latest_seq: u64,
    pending: Option<ImageBlob>,
    committed: Option<ImageBlob>,
}

impl SlotEntry {
    fn state(&self) -> SlotState {
        if self.pending.is_some() {
            SlotState::Pending
        } else if self.committed.is_some() {
            SlotState::Committed
        } else {
            SlotState::Empty
        }
    }

    fn settled_visual(&self) -> SlotVisual {
        if self.committed.is_some() {
            SlotVisual::Uploaded
        } else {
            SlotVisual::Empty
        }
    }
}

struct SessionState {
    task_id: Option<TaskId>,
    /// Bumped by `reset()`; responses tagged with an older epoch are discarded.
    epoch: u64,
    slots: HashMap<char, SlotEntry>,
    generation: Option<GenerationResult>,
}

impl SessionState {
    fn progress(&self, mode: SessionMode) -> UploadProgress {
        let mut progress = UploadProgress {
            committed: 0,
            pending: 0,
            total: mode.total_slots(),
        };
        for entry in self.slots.values() {
            match entry.state() {
                SlotState::Committed => progress.committed += 1,
                SlotState::Pending => progress.pending += 1,
                SlotState::Empty => {}
            }
        }
        progress
    }

    fn held_records(&self) -> usize {
        self.slots
            .values()
            .filter(|entry| entry.state() != SlotState::Empty)
            .count()
    }

    /// The entry for `character` if `(seq, epoch)` still names its newest submission.
    fn current_entry(&mut self, character: char, seq: u64, epoch: u64) -> Option<&mut SlotEntry> {
        if self.epoch != epoch {
            return None;
        }
        self.slots
            .get_mut(&character)
            .filter(|entry| entry.latest_seq == seq)
    }
}

/// Tracks which characters the backend holds for the current font task.
pub struct UploadSession {
    config: SessionConfig,
    api: Arc<dyn JobApi>,
    presenter: Arc<dyn SessionPresenter>,
    inner: Mutex<SessionState>,
    task_gate: Mutex<()>,
    /// Ticket of the generation request in flight, 0 when idle.
    active_generation: AtomicU64,
    next_generation: AtomicU64,
}

/// Holds the single generation slot; releases it on drop unless `reset()` already did.
struct GenerationTicket<'a> {
    active: &'a AtomicU64,
    ticket: u64,
}

impl Drop for GenerationTicket<'_> {
    fn drop(&mut self) {
        let _ = self
            .active
            .compare_exchange(self.ticket, 0, Ordering::SeqCst, Ordering::SeqCst);
    }
}

impl UploadSession {
    pub fn new(config: SessionConfig, api: Arc<dyn JobApi>) -> Arc<Self> {
        Self::new_with_presenter(config, api, Arc::new(NullPresenter))
    }

    pub fn new_with_presenter(
        config: SessionConfig,
        api: Arc<dyn JobApi>,
        presenter: Arc<dyn SessionPresenter>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            api,
            presenter,
            inner: Mutex::new(SessionState {
                task_id: None,
                epoch: 0,
                slots: HashMap::new(),
                generation: None,
            }),
            task_gate: Mutex::new(()),
            active_generation: AtomicU64::new(0),
            next_generation: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn mode(&self) -> SessionMode {
        self.config.mode
    }

    pub async fn current_task(&self) -> Option<TaskId> {
        self.inner.lock().await.task_id.clone()
    }

    pub async fn slot_state(&self, character: char) -> SlotState {
        self.inner
            .lock()
            .await
            .slots
            .get(&character)
            .map(SlotEntry::state)
            .unwrap_or(SlotState::Empty)
    }

    /// The image currently held for `character`, optimistic or acknowledged.
    pub async fn upload_record(&self, character: char) -> Option<ImageBlob> {
        let guard = self.inner.lock().await;
        let entry = guard.slots.get(&character)?;
        entry.pending.clone().or_else(|| entry.committed.clone())
    }

    pub async fn committed_count(&self) -> usize {
        self.progress().await.committed
    }

    pub async fn progress(&self) -> UploadProgress {
        self.inner.lock().await.progress(self.config.mode)
    }

    pub async fn last_generation(&self) -> Option<GenerationResult> {
        self.inner.lock().await.generation.clone()
    }

    pub async fn ensure_task(&self) -> Result<TaskId, SessionError> {
        let result = self.acquire_task().await;
        if let Err(err) = &result {
            self.presenter.notify(err.notification());
        }
        result
    }

    async fn acquire_task(&self) -> Result<TaskId, SessionError> {
        if let Some(task_id) = self.current_task().await {
            return Ok(task_id);
        }

        // Concurrent first uploads must share a single task.
        let _gate = self.task_gate.lock().await;
        let epoch = {
            let guard = self.inner.lock().await;
            if let Some(task_id) = &guard.task_id {
                return Ok(task_id.clone());
            }
            guard.epoch
        };

        let task_id = self.api.create_task().await.map_err(|err| {
            warn!(error = %err, "task: creation failed");
            SessionError::TaskCreation(err.user_message())
        })?;
        if !task_id.is_usable() {
            warn!("task: backend returned an empty task id");
            return Err(SessionError::TaskCreation(
                "backend returned no usable task id".to_string(),
            ));
        }

        let mut guard = self.inner.lock().await;
        if guard.epoch != epoch {
            debug!(%task_id, "task: created before a reset, dropped");
            return Err(SessionError::TaskCreation(
                "the session was reset while the task was being created".to_string(),
            ));
        }
        let active = guard.task_id.get_or_insert(task_id).clone();
        info!(task_id = %active, "task: created");
        Ok(active)
    }

    pub async fn submit_character_upload(
        &self,
        character: char,
        image: ImageBlob,
    ) -> Result<UploadOutcome, SessionError> {
        if !self.config.mode.accepts(character) {
            return Err(self.reject_input(format!(
                "'{character}' is not one of the supported characters"
            )));
        }
        if !image.is_image() {
            return Err(self.reject_input(format!("{} is not an image file", image.file_name)));
        }

        let (seq, epoch, progress) = {
            let mut guard = self.inner.lock().await;
            let epoch = guard.epoch;
            let entry = guard.slots.entry(character).or_default();
            entry.latest_seq += 1;
            entry.pending = Some(image.clone());
            let seq = entry.latest_seq;
            (seq, epoch, guard.progress(self.config.mode))
        };
        debug!(%character, seq, "upload: pending");
        self.presenter.render_slot(character, SlotVisual::Uploading);
        self.presenter.show_preview(character, &image);
        self.presenter.update_progress(progress);

        let task_id = match self.acquire_task().await {
            Ok(task_id) => task_id,
            Err(err) => return self.settle_rejection(character, seq, epoch, err).await,
        };

        match self.api.upload_character(&task_id, character, &image).await {
            Ok(()) => Ok(self.settle_commit(character, seq, epoch, &task_id).await),
            Err(err) => {
                let rejection = SessionError::UploadRejected {
                    character,
                    reason: err.user_message(),
                };
                self.settle_rejection(character, seq, epoch, rejection).await
            }
        }
    }

    async fn settle_commit(
        &self,
        character: char,
        seq: u64,
        epoch: u64,
        task_id: &TaskId,
    ) -> UploadOutcome {
        let progress = {
            let mut guard = self.inner.lock().await;
            let Some(entry) = guard.current_entry(character, seq, epoch) else {
                debug!(%character, seq, "upload: stale acknowledgement discarded");
                return UploadOutcome::Superseded;
            };
            entry.committed = entry.pending.take();
            guard.progress(self.config.mode)
        };
        info!(%character, %task_id, "upload: committed");
        self.presenter.render_slot(character, SlotVisual::Uploaded);
        self.presenter.update_progress(progress);
        UploadOutcome::Committed
    }

    async fn settle_rejection(
        &self,
        character: char,
        seq: u64,
        epoch: u64,
        err: SessionError,
    ) -> Result<UploadOutcome, SessionError> {
        let (restored, previous, progress) = {
            let mut guard = self.inner.lock().await;
            let Some(entry) = guard.current_entry(character, seq, epoch) else {
                debug!(%character, seq, error = %err, "upload: stale rejection discarded");
                return Ok(UploadOutcome::Superseded);
            };
            entry.pending = None;
            let restored = entry.settled_visual();
            let previous = entry.committed.clone();
            (restored, previous, guard.progress(self.config.mode))
        };
        warn!(%character, error = %err, "upload: rolled back");
        self.presenter.render_slot(character, SlotVisual::Failed);
        self.presenter.render_slot(character, restored);
        if let Some(previous) = &previous {
            self.presenter.show_preview(character, previous);
        }
        self.presenter.update_progress(progress);
        self.presenter.notify(err.notification());
        Err(err)
    }

    /// Uploads every image whose file stem is a single supported character, one at a time.
    pub async fn submit_batch(&self, files: Vec<ImageBlob>) -> Result<BatchReport, SessionError> {
        let (images, others): (Vec<_>, Vec<_>) = files.into_iter().partition(ImageBlob::is_image);
        let mut report = BatchReport {
            non_image: others.into_iter().map(|file| file.file_name).collect(),
            ..BatchReport::default()
        };

        if images.is_empty() {
            return Err(self.reject_input("please choose valid image files"));
        }

        let held = self.inner.lock().await.held_records();
        if held + images.len() > self.config.max_batch_files {
            return Err(self.reject_input(format!(
                "at most {} files can be uploaded at once",
                self.config.max_batch_files
            )));
        }
        if !report.non_image.is_empty() {
            self.presenter.notify(Notification::new(
                Severity::Warning,
                format!("skipped {} non-image file(s)", report.non_image.len()),
            ));
        }

        for image in images {
            let Some(character) = image
                .inferred_character()
                .filter(|ch| self.config.mode.accepts(*ch))
            else {
                debug!(file_name = %image.file_name, "batch: no matching slot");
                report.skipped.push(image.file_name);
                continue;
            };

            report.matched += 1;
            match self.submit_character_upload(character, image).await {
                Ok(UploadOutcome::Committed) => report.committed += 1,
                Ok(UploadOutcome::Superseded) => {}
                Err(_) => report.rejected.push(character),
            }
        }

        info!(
            matched = report.matched,
            committed = report.committed,
            rejected = report.rejected.len(),
            skipped = report.skipped.len(),
            "batch: finished"
        );
        if report.matched > 0 {
            self.presenter.notify(Notification::new(
                Severity::Success,
                format!("added {} file(s)", report.matched),
            ));
        } else {
            self.presenter.notify(Notification::new(
                Severity::Warning,
                "no file name matched a character slot",
            ));
        }
        Ok(report)
    }

    /// Submits the font job for the current task.
    ///
    /// Fewer committed characters than the configured threshold only produce a
    /// warning. A failure leaves the task untouched so the call can be retried
    /// without uploading again.
    pub async fn request_font_generation(
        &self,
        font_name: &str,
        character_list: &str,
    ) -> Result<GenerationResult, SessionError> {
        let Some(_ticket) = self.begin_generation() else {
            return Err(self.reject_input("a font is already being generated"));
        };
        let (task_id, epoch, committed) = {
            let guard = self.inner.lock().await;
            let Some(task_id) = guard.task_id.clone() else {
                drop(guard);
                return Err(self.reject_input("upload handwriting images before creating a font"));
            };
            let committed = guard.progress(self.config.mode).committed;
            (task_id, guard.epoch, committed)
        };

        let low_confidence = committed < self.config.low_confidence_threshold;
        if low_confidence {
            self.presenter.notify(Notification::new(
                Severity::Warning,
                format!(
                    "at least {} characters are recommended for a good result",
                    self.config.low_confidence_threshold
                ),
            ));
        }

        let font_name = match font_name.trim() {
            "" => self.config.default_font_name.clone(),
            name => name.to_string(),
        };
        let characters = if character_list.trim().is_empty() {
            self.config.mode.default_character_list()
        } else {
            character_list.to_string()
        };
        let request = CreateFontRequest {
            task_id: task_id.clone(),
            font_name: font_name.clone(),
            characters,
        };

        info!(%task_id, %font_name, committed, "generate: requested");
        let outcome = self.api.create_font(&request).await;

        let mut guard = self.inner.lock().await;
        let result = match outcome {
            Ok(response) => match response.font_path.filter(|path| !path.trim().is_empty()) {
                Some(font_path) => Ok(GenerationResult {
                    message: response
                        .message
                        .filter(|message| !message.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_RESULT_MESSAGE.to_string()),
                    font_path,
                    font_name: response.font_name.unwrap_or(font_name),
                    low_confidence,
                }),
                None => Err(SessionError::FontGeneration(
                    "backend returned no font path".to_string(),
                )),
            },
            Err(err) => {
                warn!(%task_id, error = %err, "generate: failed");
                Err(SessionError::FontGeneration(generation_failure_message(&err)))
            }
        };

        match &result {
            Ok(generated) => {
                if guard.epoch == epoch {
                    guard.generation = Some(generated.clone());
                }
                drop(guard);
                info!(%task_id, font_path = %generated.font_path, "generate: finished");
                self.presenter
                    .notify(Notification::new(Severity::Success, generated.message.clone()));
            }
            Err(err) => {
                drop(guard);
                self.presenter.notify(err.notification());
            }
        }
        result
    }

    /// Fetches the artifact of the last successful generation.
    pub async fn download_font(&self) -> Result<DownloadedFont, SessionError> {
        let Some(generation) = self.last_generation().await else {
            return Err(self.reject_input("no generated font to download yet"));
        };
        let Some(file_name) = artifact_file_name(&generation.font_path).map(str::to_string) else {
            let err = SessionError::Download(format!(
                "cannot derive a file name from {}",
                generation.font_path
            ));
            self.presenter.notify(err.notification());
            return Err(err);
        };

        match self.api.download_artifact(&file_name).await {
            Ok(bytes) => {
                info!(%file_name, size_bytes = bytes.len(), "download: finished");
                self.presenter.notify(Notification::new(
                    Severity::Success,
                    format!("downloaded {file_name}"),
                ));
                Ok(DownloadedFont { file_name, bytes })
            }
            Err(err) => {
                let err = SessionError::Download(err.user_message());
                self.presenter.notify(err.notification());
                Err(err)
            }
        }
    }

    /// Drops the task, every record and the cached result.
    pub async fn reset(&self) {
        let (cleared, progress) = {
            let mut guard = self.inner.lock().await;
            guard.task_id = None;
            guard.generation = None;
            guard.epoch += 1;
            self.active_generation.store(0, Ordering::SeqCst);
            let cleared: Vec<char> = guard.slots.drain().map(|(character, _)| character).collect();
            (cleared, guard.progress(self.config.mode))
        };
        info!(cleared = cleared.len(), "session: reset");
        for character in cleared {
            self.presenter.render_slot(character, SlotVisual::Empty);
        }
        self.presenter.update_progress(progress);
        self.presenter.notify(Notification::new(
            Severity::Info,
            "ready to create a new font",
        ));
    }

    fn begin_generation(&self) -> Option<GenerationTicket<'_>> {
        let ticket = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.active_generation
            .compare_exchange(0, ticket, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        Some(GenerationTicket {
            active: &self.active_generation,
            ticket,
        })
    }

    fn reject_input(&self, message: impl Into<String>) -> SessionError {
        let err = SessionError::invalid_input(message);
        self.presenter.notify(err.notification());
        err
    }
}

fn generation_failure_message(err: &TransportError) -> String {
    match err {
        TransportError::Rejected {
            message: Some(message),
            ..
        } => message.clone(),
        TransportError::Timeout => "the request timed out".to_string(),
        _ => GENERIC_GENERATION_FAILURE.to_string(),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
