use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use thiserror::Error;

use senior_watch_core::detection::infrastructure::onnx_session::{load_session, SharedSession};
use senior_watch_core::shared::constants::ESTIMATOR_MODEL_NAME;
use senior_watch_core::shared::model_resolver;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WaitError {
    /// The run was stopped before the models were ready.
    #[error("Cancelled")]
    Cancelled,
    #[error("{0}")]
    Failed(String),
}

/// Both ONNX sessions a detection run needs.
#[derive(Clone)]
pub struct LoadedModels {
    pub detector: SharedSession,
    pub estimator: SharedSession,
}

/// Loads the detector and age/gender sessions once, on a background thread
/// started with the app. Workers wait on it and share the sessions.
pub struct ModelCache {
    result: Mutex<Option<Result<LoadedModels, String>>>,
    ready: Condvar,
    progress: Mutex<(u64, u64)>,
}

impl ModelCache {
    pub fn new(detector_model: PathBuf, estimator_url: Option<String>) -> Arc<Self> {
        let cache = Arc::new(Self::pending());

        let loader = cache.clone();
        thread::spawn(move || {
            let progress_sink = loader.clone();
            let result = load_models(
                &detector_model,
                estimator_url.as_deref(),
                Box::new(move |downloaded, total| {
                    if let Ok(mut progress) = progress_sink.progress.lock() {
                        *progress = (downloaded, total);
                    }
                }),
            );
            match &result {
                Ok(_) => log::info!("Models loaded"),
                Err(e) => log::error!("Model loading failed: {e}"),
            }
            loader.finish(result);
        });

        cache
    }

    fn pending() -> Self {
        Self {
            result: Mutex::new(None),
            ready: Condvar::new(),
            progress: Mutex::new((0, 0)),
        }
    }

    fn finish(&self, result: Result<LoadedModels, String>) {
        if let Ok(mut slot) = self.result.lock() {
            *slot = Some(result);
        }
        self.ready.notify_all();
    }

    /// Block until the models are loaded. Calls `on_progress(downloaded, total)`
    /// while the estimator model downloads. Returns early if `cancelled` is set.
    pub fn wait(
        &self,
        on_progress: &dyn Fn(u64, u64),
        cancelled: &AtomicBool,
    ) -> Result<LoadedModels, WaitError> {
        let mut guard = self
            .result
            .lock()
            .map_err(|e| WaitError::Failed(format!("Lock poisoned: {e}")))?;
        loop {
            if cancelled.load(Ordering::Relaxed) {
                return Err(WaitError::Cancelled);
            }
            if let Some(result) = guard.as_ref() {
                return result.clone().map_err(WaitError::Failed);
            }
            if let Ok(progress) = self.progress.try_lock() {
                let (downloaded, total) = *progress;
                if downloaded > 0 {
                    on_progress(downloaded, total);
                }
            }
            let (next, _) = self
                .ready
                .wait_timeout(guard, Duration::from_millis(100))
                .map_err(|e| WaitError::Failed(format!("Lock poisoned: {e}")))?;
            guard = next;
        }
    }
}

fn load_models(
    detector_model: &Path,
    estimator_url: Option<&str>,
    progress: model_resolver::ProgressFn,
) -> Result<LoadedModels, String> {
    log::info!("Loading detector: {}", detector_model.display());
    let detector = load_session(detector_model).map_err(|e| e.to_string())?;

    let estimator_path = model_resolver::resolve(
        ESTIMATOR_MODEL_NAME,
        estimator_url,
        Some(Path::new("models")),
        Some(progress),
    )
    .map_err(|e| e.to_string())?;
    log::info!("Loading age/gender model: {}", estimator_path.display());
    let estimator = load_session(&estimator_path).map_err(|e| e.to_string())?;

    Ok(LoadedModels {
        detector,
        estimator,
    })
}
