use crate::services::pipeline::PayrollPipeline;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PayrollPipeline>,
    /// Cancelled on shutdown; batch runs stop starting new work.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(pipeline: PayrollPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            shutdown: CancellationToken::new(),
        }
    }
}
