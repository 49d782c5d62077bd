//! Shared application state.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::navigator::Navigator;
use crate::storage::MessageStore;

pub struct AppState {
    pub navigator: Navigator<MessageStore>,
    pub db_path: PathBuf,
    pub default_page_size: usize,
}

pub type SharedState = Arc<Mutex<AppState>>;
