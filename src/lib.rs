//! BJDMS client core
//!
//! Session handling, the API gateway, live notifications, the lazy
//! jurisdiction tree and committee detail loading for the BJDMS
//! organisational management dashboard.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod detail;
pub mod errors;
pub mod models;
pub mod notifications;
pub mod toast;
pub mod tree;

use std::sync::Arc;

use tokio::task::JoinHandle;

use api::ApiClient;
use auth::{SessionState, SessionStore};
use config::Config;
use db::{LocalStorage, SqliteStorage};
use detail::DetailLoader;
use errors::ClientResult;
use notifications::NotificationCenter;
use toast::Toaster;
use tree::TreeController;

/// Application state shared by every screen of the dashboard.
#[derive(Clone)]
pub struct Dashboard {
    pub config: Arc<Config>,
    pub session: Arc<SessionStore>,
    pub api: ApiClient,
    pub notifications: Arc<NotificationCenter>,
    pub toasts: Toaster,
}

impl Dashboard {
    /// Open the durable storage at `config.storage_path` and restore the session.
    pub async fn open(config: Config) -> ClientResult<Self> {
        let storage = SqliteStorage::open(&config.storage_path).await?;
        Self::with_storage(config, Arc::new(storage)).await
    }

    pub async fn with_storage(config: Config, storage: Arc<dyn LocalStorage>) -> ClientResult<Self> {
        let config = Arc::new(config);
        let session = Arc::new(SessionStore::new(storage));
        let api = ApiClient::new(config.clone(), session.clone())?;
        let toasts = Toaster::new();
        let notifications = Arc::new(NotificationCenter::new(api.clone(), toasts.clone()));

        match session.restore().await {
            SessionState::Authenticated(s) => {
                tracing::info!(user_id = %s.user_id, "Dashboard opened with a restored session")
            }
            _ => tracing::info!("Dashboard opened without a session"),
        }

        Ok(Self {
            config,
            session,
            api,
            notifications,
            toasts,
        })
    }

    /// Keep the notification push channel in step with the session.
    pub fn follow_notifications(&self) -> JoinHandle<()> {
        self.notifications.clone().follow_session()
    }

    /// Jurisdiction tree wired to a committee detail loader.
    pub fn committees_page(&self) -> CommitteesPage {
        let tree = Arc::new(TreeController::new(
            Arc::new(self.api.clone()),
            self.toasts.clone(),
        ));
        let detail = Arc::new(DetailLoader::new(
            Arc::new(self.api.clone()),
            self.toasts.clone(),
        ));
        let follower = detail.clone().follow(tree.subscribe_selection());
        CommitteesPage {
            tree,
            detail,
            follower,
        }
    }

    pub fn shutdown(&self) {
        self.notifications.shutdown();
    }
}

/// The committees screen: selecting a tree node loads its committee.
pub struct CommitteesPage {
    pub tree: Arc<TreeController>,
    pub detail: Arc<DetailLoader>,
    follower: JoinHandle<()>,
}

impl Drop for CommitteesPage {
    fn drop(&mut self) {
        self.follower.abort();
        self.tree.close();
        self.detail.clear();
    }
}
