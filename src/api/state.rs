use std::sync::Arc;

use crate::config::Config;
use crate::layout::Layout;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub layout: Arc<Layout>,
}

impl AppState {
    pub fn new(config: Config, layout: Layout) -> Self {
        Self {
            config: Arc::new(config),
            layout: Arc::new(layout),
        }
    }
}
