//! Committee detail for the selected jurisdiction.
//!
//! Every selection starts a new generation. Results that come back for an
//! older generation are dropped, so the view always reflects the latest
//! selection no matter how responses are ordered.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::ApiClient;
use crate::errors::{ClientError, ClientResult};
use crate::models::{self, Committee, CommitteeMember, CommitteeStatus, JurisdictionNode};
use crate::toast::Toaster;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DetailPhase {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

/// What the committee panel shows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommitteeDetail {
    pub selected: Option<JurisdictionNode>,
    pub phase: DetailPhase,
    pub committee: Option<Committee>,
    pub members: Vec<CommitteeMember>,
}

impl CommitteeDetail {
    pub fn leadership(&self) -> Vec<&CommitteeMember> {
        models::leadership(&self.members)
    }
}

/// Where committees and rosters come from.
#[async_trait]
pub trait CommitteeSource: Send + Sync {
    /// Active committees of one jurisdiction.
    async fn committees_for(
        &self,
        jurisdiction_id: &str,
        cancel: &CancellationToken,
    ) -> ClientResult<Vec<Committee>>;

    async fn members_of(
        &self,
        committee_id: &str,
        cancel: &CancellationToken,
    ) -> ClientResult<Vec<CommitteeMember>>;
}

#[async_trait]
impl CommitteeSource for ApiClient {
    async fn committees_for(
        &self,
        jurisdiction_id: &str,
        cancel: &CancellationToken,
    ) -> ClientResult<Vec<Committee>> {
        self.list_committees(
            Some(jurisdiction_id),
            Some(CommitteeStatus::Active.as_str()),
            cancel,
        )
        .await?
        .ok_or(ClientError::SessionExpired)
    }

    async fn members_of(
        &self,
        committee_id: &str,
        cancel: &CancellationToken,
    ) -> ClientResult<Vec<CommitteeMember>> {
        self.committee_members(committee_id, cancel)
            .await?
            .ok_or(ClientError::SessionExpired)
    }
}

struct LoaderState {
    view: CommitteeDetail,
    generation: u64,
    in_flight: Option<CancellationToken>,
}

pub struct DetailLoader {
    state: Mutex<LoaderState>,
    source: Arc<dyn CommitteeSource>,
    toasts: Toaster,
    updates: watch::Sender<CommitteeDetail>,
}

impl DetailLoader {
    pub fn new(source: Arc<dyn CommitteeSource>, toasts: Toaster) -> Self {
        let (updates, _) = watch::channel(CommitteeDetail::default());
        Self {
            state: Mutex::new(LoaderState {
                view: CommitteeDetail::default(),
                generation: 0,
                in_flight: None,
            }),
            source,
            toasts,
            updates,
        }
    }

    pub fn snapshot(&self) -> CommitteeDetail {
        self.lock().view.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CommitteeDetail> {
        self.updates.subscribe()
    }

    /// Load the active committee of `node` and its roster.
    ///
    /// Returns `Ok(false)` when a newer selection superseded this one before
    /// it finished; nothing is applied in that case. On failure the previous
    /// committee and roster stay visible.
    pub async fn select(&self, node: JurisdictionNode) -> ClientResult<bool> {
        let jurisdiction_id = node.id.clone();
        let (generation, cancel) = {
            let mut state = self.lock();
            state.generation += 1;
            let cancel = CancellationToken::new();
            if let Some(previous) = state.in_flight.replace(cancel.clone()) {
                previous.cancel();
            }
            state.view.selected = Some(node);
            state.view.phase = DetailPhase::Loading;
            self.updates.send_replace(state.view.clone());
            (state.generation, cancel)
        };

        let outcome = self.resolve(&jurisdiction_id, &cancel).await;

        let mut state = self.lock();
        if state.generation != generation {
            tracing::debug!(%jurisdiction_id, generation, "Dropping superseded committee detail");
            return Ok(false);
        }
        state.in_flight = None;

        let result = match outcome {
            Ok((committee, members)) => {
                tracing::debug!(
                    %jurisdiction_id,
                    committee_id = ?committee.as_ref().map(|c| c.id.as_str()),
                    members = members.len(),
                    "Committee detail loaded"
                );
                state.view.committee = committee;
                state.view.members = members;
                state.view.phase = DetailPhase::Loaded;
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(%jurisdiction_id, "Failed to load committee details: {}", e);
                state.view.phase = DetailPhase::Failed(e.to_string());
                if !matches!(e, ClientError::SessionExpired | ClientError::Cancelled) {
                    self.toasts
                        .error("Failed to load committee details", Some(e.to_string()));
                }
                Err(e)
            }
        };
        self.updates.send_replace(state.view.clone());
        result
    }

    /// Forget the selection and abandon any in-flight load.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.generation += 1;
        if let Some(previous) = state.in_flight.take() {
            previous.cancel();
        }
        state.view = CommitteeDetail::default();
        self.updates.send_replace(state.view.clone());
    }

    /// Load detail for every selection published on `selection`.
    ///
    /// Each selection runs in its own task so a slow load never delays the
    /// next one; the generation check keeps only the latest.
    pub fn follow(
        self: Arc<Self>,
        mut selection: watch::Receiver<Option<JurisdictionNode>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while selection.changed().await.is_ok() {
                let node = selection.borrow_and_update().clone();
                match node {
                    Some(node) => {
                        let loader = self.clone();
                        tokio::spawn(async move {
                            // Errors are already toasted and recorded in the view.
                            let _ = loader.select(node).await;
                        });
                    }
                    None => self.clear(),
                }
            }
        })
    }

    async fn resolve(
        &self,
        jurisdiction_id: &str,
        cancel: &CancellationToken,
    ) -> ClientResult<(Option<Committee>, Vec<CommitteeMember>)> {
        let committees = self.source.committees_for(jurisdiction_id, cancel).await?;
        let committee = committees
            .into_iter()
            .find(|c| c.jurisdiction_id == jurisdiction_id && c.is_active());

        match committee {
            Some(committee) => {
                let members = self.source.members_of(&committee.id, cancel).await?;
                Ok((Some(committee), members))
            }
            None => Ok((None, Vec::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for DetailLoader {
    fn drop(&mut self) {
        if let Some(cancel) = self.lock().in_flight.take() {
            cancel.cancel();
        }
    }
}
