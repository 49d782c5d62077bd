//! chatwindow-web: JSON API that serves conversation windows out of an
//! archived message database.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod utils;

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::Mutex;

use crate::navigator::Navigator;
use crate::storage::MessageStore;

use config::{Cli, Config};
use state::{AppState, SharedState};

/// Entry point: parse CLI, open the archive, start the server.
pub async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = Config::from_cli_and_env(cli)?;

    crate::logging::init();

    crate::tlog!("chatwindow-web starting");
    crate::tlog!("  database: {}", config.db_path.display());
    crate::tlog!("  day boundaries at UTC{}", config.calendar.offset());
    crate::tlog!("  default page size: {}", config.page_size);

    let store = MessageStore::open(&config.db_path)?;
    let navigator = Navigator::new(Arc::new(store), config.calendar);

    let state: SharedState = Arc::new(Mutex::new(AppState {
        navigator,
        db_path: config.db_path.clone(),
        default_page_size: config.page_size,
    }));

    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    crate::tlog!("chatwindow-web listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
