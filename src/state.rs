use std::sync::Arc;

use crate::services::insight_coordinator::InsightCoordinator;

#[derive(Clone)]
pub struct AppState {
    pub insights: Arc<InsightCoordinator>,
}

impl AppState {
    pub fn new(insights: InsightCoordinator) -> Self {
        Self {
            insights: Arc::new(insights),
        }
    }
}
