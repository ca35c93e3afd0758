use crate::config::Config;
use crate::views::{EquipmentView, LogbookView, UsersView};
use sensicity_auth::{AuthService, FileSessionStore, SessionStore};
use sensicity_database::SharedStore;
use std::sync::Arc;

/// Everything the screens share: the store handle and the auth service.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub auth: AuthService,
}

impl AppState {
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = sensicity_database::connect(&config.database).await?;
        let sessions: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(&config.session_file));
        Ok(Self::new(store, sessions, config))
    }

    pub fn new(store: SharedStore, sessions: Arc<dyn SessionStore>, config: &Config) -> Self {
        Self {
            auth: AuthService::new(store.clone(), sessions, config.auth.clone()),
            store,
        }
    }

    pub fn equipment_view(&self) -> EquipmentView {
        EquipmentView::new(self.store.clone())
    }

    pub fn logbook_view(&self) -> LogbookView {
        LogbookView::new(self.store.clone())
    }

    pub fn users_view(&self) -> UsersView {
        UsersView::new(self.store.clone(), self.auth.hasher().clone())
    }
}
