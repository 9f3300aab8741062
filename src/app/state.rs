//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{Roster, Session, SessionHandle};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub roster: Arc<Roster>,
    pub session: SessionHandle,
}

impl AppState {
    /// Build the application state and the session it fronts. The caller
    /// spawns the returned session onto the runtime.
    pub fn new(config: Config) -> (Self, Session) {
        let config = Arc::new(config);
        let roster = Arc::new(Roster::new());

        let (session, handle) = Session::new(config.session_config(), roster.clone());

        let state = Self {
            config,
            roster,
            session: handle,
        };

        (state, session)
    }
}
