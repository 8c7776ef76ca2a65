use std::sync::Arc;

use alerta_db::{IdentityStore, ReportStore};
use alerta_gateway::{Dispatcher, TokenVerifier};

use crate::media::MediaStore;
use crate::session::SessionIssuer;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub identities: IdentityStore,
    pub reports: ReportStore,
    pub sessions: Arc<SessionIssuer>,
    pub dispatcher: Dispatcher,
    pub media: MediaStore,
}

impl AppStateInner {
    /// Wire the stores together: the report store publishes into the
    /// dispatcher that gateway connections subscribe to.
    pub fn new(jwt_secret: &str, media: MediaStore) -> Self {
        let dispatcher = Dispatcher::new();
        Self {
            identities: IdentityStore::new(),
            reports: ReportStore::new(Arc::new(dispatcher.clone())),
            sessions: Arc::new(SessionIssuer::new(jwt_secret)),
            dispatcher,
            media,
        }
    }

    pub fn token_verifier(&self) -> Arc<dyn TokenVerifier> {
        self.sessions.clone()
    }
}
