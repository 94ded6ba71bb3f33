//! HTTP API for the workout log

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::db::Database;
use crate::router::EventRouter;
use crate::runtime::{DatabaseGateway, DialogManager};
use crate::session::SessionStore;
use crate::state_machine::DialogContext;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dialogs: Arc<DialogManager<DatabaseGateway>>,
    pub router: Arc<EventRouter<DatabaseGateway>>,
}

impl AppState {
    pub fn new(db: Database, context: DialogContext, export_secret: Option<String>) -> Self {
        let dialogs = Arc::new(DialogManager::new(
            Arc::new(DatabaseGateway::new(db)),
            Arc::new(SessionStore::new()),
            context,
        ));
        Self {
            router: Arc::new(EventRouter::new(Arc::clone(&dialogs), export_secret)),
            dialogs,
        }
    }
}
