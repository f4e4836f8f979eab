use std::sync::Arc;

use crate::clients::backend::StudyApi;
use crate::clients::evaluation::Evaluator;
use crate::core::config::Settings;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    backend: Arc<dyn StudyApi>,
    evaluator: Arc<dyn Evaluator>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        backend: Arc<dyn StudyApi>,
        evaluator: Arc<dyn Evaluator>,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, backend, evaluator }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn backend(&self) -> &dyn StudyApi {
        self.inner.backend.as_ref()
    }

    pub(crate) fn evaluator(&self) -> &dyn Evaluator {
        self.inner.evaluator.as_ref()
    }
}
