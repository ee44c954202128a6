//! Lazy jurisdiction tree.
//!
//! [`HierarchyTree`] holds the state machine; [`TreeController`] drives it
//! against a [`JurisdictionSource`] and publishes the selected node.

mod hierarchy;

pub use hierarchy::*;

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::api::ApiClient;
use crate::errors::{ClientError, ClientResult};
use crate::models::JurisdictionNode;
use crate::toast::Toaster;

/// Where children of a jurisdiction come from.
#[async_trait]
pub trait JurisdictionSource: Send + Sync {
    /// Children of `parent_id`, or the roots when `None`, in server order.
    async fn children_of(
        &self,
        parent_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> ClientResult<Vec<JurisdictionNode>>;
}

#[async_trait]
impl JurisdictionSource for ApiClient {
    async fn children_of(
        &self,
        parent_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> ClientResult<Vec<JurisdictionNode>> {
        // A rejected session yields no result; treat it as "still unknown".
        self.list_jurisdictions(parent_id, cancel)
            .await?
            .ok_or(ClientError::SessionExpired)
    }
}

/// Owns a [`HierarchyTree`] for as long as the tree is on screen.
pub struct TreeController {
    tree: Mutex<HierarchyTree>,
    source: Arc<dyn JurisdictionSource>,
    selection: watch::Sender<Option<JurisdictionNode>>,
    toasts: Toaster,
    cancel: CancellationToken,
}

impl TreeController {
    pub fn new(source: Arc<dyn JurisdictionSource>, toasts: Toaster) -> Self {
        let (selection, _) = watch::channel(None);
        Self {
            tree: Mutex::new(HierarchyTree::new()),
            source,
            selection,
            toasts,
            cancel: CancellationToken::new(),
        }
    }

    /// Fetch the top-level jurisdictions if they are not known yet.
    pub async fn load_roots(&self) -> ClientResult<()> {
        let request = self.lock().begin_root_load();
        match request {
            Some(request) => self.run_fetch(request).await,
            None => Ok(()),
        }
    }

    /// Open or close `id`, fetching its children the first time it opens.
    pub async fn toggle_expand(&self, id: &str) -> ClientResult<()> {
        let request = self.lock().toggle_expand(id);
        match request {
            Some(request) => self.run_fetch(request).await,
            None => Ok(()),
        }
    }

    /// Make `id` the active node and notify selection listeners.
    pub fn select(&self, id: &str) -> Option<JurisdictionNode> {
        let node = self.lock().select(id)?;
        tracing::debug!(jurisdiction_id = %node.id, "Jurisdiction selected");
        self.selection.send_replace(Some(node.clone()));
        Some(node)
    }

    pub fn subscribe_selection(&self) -> watch::Receiver<Option<JurisdictionNode>> {
        self.selection.subscribe()
    }

    pub fn rows(&self) -> Vec<TreeRow> {
        self.lock().rows()
    }

    pub fn load_state(&self, id: &str) -> Option<LoadState> {
        self.lock().load_state(id).cloned()
    }

    pub fn roots_state(&self) -> LoadState {
        self.lock().roots_state().clone()
    }

    /// Abandon in-flight fetches. The tree keeps whatever it already knows.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    async fn run_fetch(&self, request: FetchRequest) -> ClientResult<()> {
        let outcome = self
            .source
            .children_of(request.parent_id.as_deref(), &self.cancel)
            .await;

        let failure = outcome.as_ref().err().cloned();
        let applied = self.lock().finish_fetch(&request, outcome);
        if !applied {
            tracing::debug!(parent_id = ?request.parent_id, "Dropping outdated jurisdiction fetch");
        }

        match failure {
            None => Ok(()),
            Some(e) => {
                tracing::warn!(parent_id = ?request.parent_id, "Failed to load jurisdictions: {}", e);
                if !matches!(e, ClientError::SessionExpired | ClientError::Cancelled) {
                    self.toasts
                        .error("Failed to load jurisdictions", Some(e.to_string()));
                }
                Err(e)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HierarchyTree> {
        self.tree.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for TreeController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JurisdictionLevel;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves a fixed hierarchy after a short delay and counts calls per parent.
    struct FixedSource {
        children: HashMap<Option<String>, Vec<JurisdictionNode>>,
        calls: Mutex<HashMap<Option<String>, usize>>,
        failures_left: AtomicUsize,
    }

    impl FixedSource {
        fn new(entries: Vec<(Option<&str>, Vec<JurisdictionNode>)>) -> Self {
            Self {
                children: entries
                    .into_iter()
                    .map(|(k, v)| (k.map(str::to_string), v))
                    .collect(),
                calls: Mutex::new(HashMap::new()),
                failures_left: AtomicUsize::new(0),
            }
        }

        fn calls_for(&self, parent: Option<&str>) -> usize {
            *self
                .calls
                .lock()
                .unwrap()
                .get(&parent.map(str::to_string))
                .unwrap_or(&0)
        }
    }

    #[async_trait]
    impl JurisdictionSource for FixedSource {
        async fn children_of(
            &self,
            parent_id: Option<&str>,
            _cancel: &CancellationToken,
        ) -> ClientResult<Vec<JurisdictionNode>> {
            let key = parent_id.map(str::to_string);
            *self.calls.lock().unwrap().entry(key.clone()).or_default() += 1;
            tokio::time::sleep(Duration::from_millis(30)).await;

            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(ClientError::Api {
                    status_code: 500,
                    status_text: "Internal Server Error".into(),
                });
            }
            Ok(self.children.get(&key).cloned().unwrap_or_default())
        }
    }

    fn node(id: &str, name: &str) -> JurisdictionNode {
        JurisdictionNode {
            id: id.to_string(),
            name: name.to_string(),
            level: JurisdictionLevel::Division,
            parent_id: None,
            name_bn: None,
            children: None,
        }
    }

    #[tokio::test]
    async fn test_concurrent_toggles_fetch_once() {
        let source = Arc::new(FixedSource::new(vec![
            (None, vec![node("d1", "Dhaka Division")]),
            (Some("d1"), vec![node("g", "Gazipur")]),
        ]));
        let controller = TreeController::new(source.clone(), Toaster::new());
        controller.load_roots().await.unwrap();

        let (a, b) = tokio::join!(controller.toggle_expand("d1"), controller.toggle_expand("d1"));
        a.unwrap();
        b.unwrap();

        assert_eq!(source.calls_for(Some("d1")), 1);
        assert!(controller.load_state("d1").unwrap().is_known());
    }

    #[tokio::test]
    async fn test_failed_fetch_toasts_and_retries() {
        let source = Arc::new(FixedSource::new(vec![
            (None, vec![node("d1", "Dhaka Division")]),
            (Some("d1"), vec![]),
        ]));
        let toasts = Toaster::new();
        let mut toast_rx = toasts.subscribe();
        let controller = TreeController::new(source.clone(), toasts);
        controller.load_roots().await.unwrap();

        source.failures_left.store(1, Ordering::SeqCst);
        assert!(controller.toggle_expand("d1").await.is_err());
        assert!(matches!(
            controller.load_state("d1"),
            Some(LoadState::Failed(_))
        ));
        assert_eq!(
            toast_rx.recv().await.unwrap().title,
            "Failed to load jurisdictions"
        );

        controller.toggle_expand("d1").await.unwrap();
        assert_eq!(controller.load_state("d1"), Some(LoadState::Loaded(vec![])));
        assert_eq!(source.calls_for(Some("d1")), 2);
    }

    #[tokio::test]
    async fn test_select_publishes_node() {
        let source = Arc::new(FixedSource::new(vec![(
            None,
            vec![node("d1", "Dhaka Division"), node("d2", "Chattogram Division")],
        )]));
        let controller = TreeController::new(source, Toaster::new());
        let mut rx = controller.subscribe_selection();
        controller.load_roots().await.unwrap();

        controller.select("d2");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().map(|n| n.id.as_str()), Some("d2"));
        assert!(controller.select("unknown").is_none());
    }
}
