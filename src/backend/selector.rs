use super::{BackendChoice, ComputeProbe, InferenceEngine, InferenceSession, ModelSource};
use crate::config::FallbackPolicy;
use crate::error::{Error, Result};

/// Lifecycle of a backend selection
///
/// `Uninitialized -> Probing -> {AcceleratedReady | PortableReady | Failed}`.
/// The last three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Uninitialized,
    Probing,
    AcceleratedReady,
    PortableReady,
    Failed,
}

impl BackendState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::AcceleratedReady | Self::PortableReady | Self::Failed
        )
    }
}

/// Session built by the selector together with the backend it runs on
pub struct SelectedBackend {
    pub session: Box<dyn InferenceSession>,
    pub choice: BackendChoice,
}

/// Picks a backend and builds the session, degrading to the portable
/// backend when the accelerated one cannot be used
pub struct BackendSelector<'a> {
    engine: &'a dyn InferenceEngine,
    probe: &'a dyn ComputeProbe,
    policy: FallbackPolicy,
    state: BackendState,
}

impl<'a> BackendSelector<'a> {
    pub fn new(
        engine: &'a dyn InferenceEngine,
        probe: &'a dyn ComputeProbe,
        policy: FallbackPolicy,
    ) -> Self {
        Self {
            engine,
            probe,
            policy,
            state: BackendState::Uninitialized,
        }
    }

    pub fn state(&self) -> BackendState {
        self.state
    }

    /// Probe, build a session, fall back at most once
    ///
    /// Runs only from `Uninitialized`. Accelerated failures are logged and
    /// recovered from; `ModelLoad` is returned only when no backend could be
    /// built, carrying every underlying cause.
    pub fn select_and_initialize(&mut self, model: &ModelSource) -> Result<SelectedBackend> {
        if self.state != BackendState::Uninitialized {
            return Err(Error::ModelLoad(format!(
                "backend selection already ran (state {:?})",
                self.state
            )));
        }

        self.state = BackendState::Probing;
        tracing::debug!("Selecting backend for {} with {:?}", model, self.policy);

        let result = match self.policy {
            FallbackPolicy::AcceleratedFirst => self.accelerated_first(model),
            FallbackPolicy::PortableFirst => self.portable_first(model),
        };

        self.state = match &result {
            Ok(selected) => match selected.choice {
                BackendChoice::Accelerated => BackendState::AcceleratedReady,
                BackendChoice::Portable => BackendState::PortableReady,
            },
            Err(_) => BackendState::Failed,
        };

        match &result {
            Ok(selected) => tracing::info!("Final backend: {}", selected.choice),
            Err(e) => tracing::error!("Backend initialization failed: {}", e),
        }

        result
    }

    fn accelerated_first(&self, model: &ModelSource) -> Result<SelectedBackend> {
        let mut failures = Vec::new();

        if self.accelerated_available() {
            match self.build(model, BackendChoice::Accelerated) {
                Ok(selected) => return Ok(selected),
                Err(e) => {
                    tracing::warn!(
                        "Accelerated initialization failed, falling back to portable: {}",
                        e
                    );
                    failures.push(format!("accelerated: {}", e));
                }
            }
        }

        self.build(model, BackendChoice::Portable).map_err(|e| {
            failures.push(format!("portable: {}", e));
            Error::ModelLoad(failures.join("; "))
        })
    }

    fn portable_first(&self, model: &ModelSource) -> Result<SelectedBackend> {
        match self.build(model, BackendChoice::Portable) {
            Ok(portable) => {
                if !self.accelerated_available() {
                    return Ok(portable);
                }
                match self.build(model, BackendChoice::Accelerated) {
                    Ok(accelerated) => Ok(accelerated),
                    Err(e) => {
                        tracing::warn!("Accelerated upgrade failed, keeping portable: {}", e);
                        Ok(portable)
                    }
                }
            }
            Err(portable_error) => {
                let mut failures = vec![format!("portable: {}", portable_error)];
                if self.accelerated_available() {
                    match self.build(model, BackendChoice::Accelerated) {
                        Ok(accelerated) => return Ok(accelerated),
                        Err(e) => failures.push(format!("accelerated: {}", e)),
                    }
                }
                Err(Error::ModelLoad(failures.join("; ")))
            }
        }
    }

    fn accelerated_available(&self) -> bool {
        match self.open_device() {
            Ok(()) => true,
            Err(e) => {
                tracing::info!("Accelerated backend unavailable: {}", e);
                false
            }
        }
    }

    fn open_device(&self) -> Result<()> {
        let adapter = self.probe.query_adapter().ok_or_else(|| {
            Error::BackendUnavailable("no accelerated adapter found".to_string())
        })?;

        tracing::info!("Accelerated adapter: {}", adapter.describe());

        adapter.request_device()
    }

    fn build(&self, model: &ModelSource, choice: BackendChoice) -> Result<SelectedBackend> {
        tracing::info!("Attempting {} initialization...", choice);
        let session = self.engine.create_session(model, choice)?;
        tracing::info!("{} initialization successful", choice);
        Ok(SelectedBackend { session, choice })
    }
}
