use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::client::{DetectError, DetectionApi, ImageUpload};
use crate::core::{DetectionResponse, ImageView, RejectPolicy, Verdict};

pub const PROGRESS_TICK: Duration = Duration::from_millis(200);
pub const PROGRESS_STEP: u8 = 10;
/// Simulated progress never passes this until the response arrives.
pub const PROGRESS_CAP: u8 = 90;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatedProgress {
    value: u8,
}

impl SimulatedProgress {
    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn tick(&mut self) -> u8 {
        if self.value < PROGRESS_CAP {
            self.value = self.value.saturating_add(PROGRESS_STEP).min(PROGRESS_CAP);
        }
        self.value
    }

    pub fn complete(&mut self) -> u8 {
        self.value = 100;
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Idle,
    Processing,
    Done(Box<DetectionResponse>),
    Failed { kind: &'static str, message: String },
}

/// View-model of one upload-and-detect run.
pub struct UploadWorkflow<A> {
    api: Arc<A>,
    timeout: Duration,
    tick: Duration,
    original: Option<String>,
    state: WorkflowState,
    progress: SimulatedProgress,
}

impl<A> UploadWorkflow<A>
where
    A: DetectionApi + 'static,
{
    pub fn new(api: A, timeout: Duration) -> Self {
        Self {
            api: Arc::new(api),
            timeout,
            tick: PROGRESS_TICK,
            original: None,
            state: WorkflowState::Idle,
            progress: SimulatedProgress::default(),
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_millis(1));
        self
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn progress(&self) -> u8 {
        self.progress.value()
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.state, WorkflowState::Processing)
    }

    pub fn response(&self) -> Option<&DetectionResponse> {
        match &self.state {
            WorkflowState::Done(resp) => Some(resp),
            _ => None,
        }
    }

    pub fn has_detections(&self) -> bool {
        self.response().is_some_and(DetectionResponse::has_detections)
    }

    pub fn verdict(&self, policy: RejectPolicy) -> Option<Verdict> {
        self.response()
            .map(|resp| Verdict::from_response(resp, policy))
    }

    /// Image reference for a view. Missing overlays fall back to the original upload.
    pub fn display_image(&self, view: ImageView) -> Option<&str> {
        let original = self.original.as_deref();
        let Some(resp) = self.response() else {
            return original;
        };
        let overlay = match view {
            ImageView::Original => None,
            ImageView::Annotated => Some(resp.annotated_image_url.as_str()).filter(|s| !s.is_empty()),
            ImageView::Gradcam => resp.gradcam_url.as_deref(),
            ImageView::Shap => resp.shap_url.as_deref(),
        };
        overlay.or(original)
    }

    pub fn reset(&mut self) {
        self.original = None;
        self.state = WorkflowState::Idle;
        self.progress.reset();
    }

    /// Sends the upload on a worker thread and waits for whichever comes first:
    /// the response, an error, or the timeout. `on_progress` sees every simulated
    /// progress value, ending with 100 on success.
    pub fn submit<F>(
        &mut self,
        upload: ImageUpload,
        mut on_progress: F,
    ) -> Result<&DetectionResponse, DetectError>
    where
        F: FnMut(u8),
    {
        self.reset();
        self.original = Some(upload.filename.clone());
        self.state = WorkflowState::Processing;
        on_progress(self.progress.value());

        log::info!(
            "submitting {} ({} bytes), timeout {:?}",
            upload.filename,
            upload.bytes.len(),
            self.timeout
        );

        let (tx, rx) = mpsc::channel();
        let api = Arc::clone(&self.api);
        std::thread::spawn(move || {
            // The receiver is gone once the timeout fired.
            let _ = tx.send(api.detect(&upload));
        });

        let started = Instant::now();
        // An unrepresentable deadline means waiting on ticks alone.
        let deadline = started.checked_add(self.timeout);
        let outcome = loop {
            let now = Instant::now();
            let wait = match deadline {
                Some(deadline) if now >= deadline => {
                    break Err(DetectError::Timeout(self.timeout));
                }
                Some(deadline) => self.tick.min(deadline - now),
                None => self.tick,
            };
            match rx.recv_timeout(wait) {
                Ok(result) => break result,
                Err(RecvTimeoutError::Timeout) => on_progress(self.progress.tick()),
                Err(RecvTimeoutError::Disconnected) => {
                    break Err(DetectError::InvalidResponse(
                        "detection worker stopped without a result".to_string(),
                    ));
                }
            }
        };

        match outcome {
            Ok(resp) => {
                on_progress(self.progress.complete());
                log::info!(
                    "detection finished in {:?}: tracking_code={} damages={}",
                    started.elapsed(),
                    resp.tracking_code,
                    resp.total_damages
                );
                self.state = WorkflowState::Done(Box::new(resp));
            }
            Err(err) => {
                log::warn!("detection failed after {:?}: {err}", started.elapsed());
                self.state = WorkflowState::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                };
                return Err(err);
            }
        }

        self.response().ok_or_else(|| {
            DetectError::InvalidResponse("detection result was discarded".to_string())
        })
    }
}
