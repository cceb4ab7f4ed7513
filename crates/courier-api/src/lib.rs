pub mod error;
pub mod health;
pub mod middleware;
pub mod send;
pub mod session;

use std::sync::Arc;

use courier_db::Database;
use courier_session::SessionHandle;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub session: SessionHandle,
    pub send_secret: String,
    pub session_id: String,
}

pub type AppState = Arc<AppStateInner>;
