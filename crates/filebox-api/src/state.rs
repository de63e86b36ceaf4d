use filebox_core::Config;
use filebox_services::VisionClient;
use filebox_storage::Storage;
use std::sync::Arc;

/// Shared, read-only application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    /// Absent when the vision API is not configured.
    pub vision: Option<VisionClient>,
}
