//! Notification stream client.
//!
//! Keeps one push channel open per authenticated session, merges pushed
//! notifications into the local feed and tracks the unread count.

mod feed;

pub use feed::*;

use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::api::ApiClient;
use crate::auth::Session;
use crate::config::Config;
use crate::errors::{ClientError, ClientResult};
use crate::models::Notification;
use crate::toast::Toaster;

type PushStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Point-in-time view of the feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationSnapshot {
    pub items: Vec<Notification>,
    pub unread: usize,
}

struct PushChannel {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// State shared between the center and its background tasks.
#[derive(Clone)]
struct Shared {
    feed: Arc<Mutex<NotificationFeed>>,
    updates: watch::Sender<NotificationSnapshot>,
    toasts: Toaster,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, NotificationFeed> {
        self.feed.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self) {
        let snapshot = {
            let feed = self.lock();
            NotificationSnapshot {
                items: feed.items().to_vec(),
                unread: feed.unread_count(),
            }
        };
        self.updates.send_replace(snapshot);
    }
}

pub struct NotificationCenter {
    api: ApiClient,
    shared: Shared,
    channel: Mutex<Option<PushChannel>>,
    watcher: CancellationToken,
}

impl NotificationCenter {
    pub fn new(api: ApiClient, toasts: Toaster) -> Self {
        let (updates, _) = watch::channel(NotificationSnapshot::default());
        Self {
            api,
            shared: Shared {
                feed: Arc::new(Mutex::new(NotificationFeed::new())),
                updates,
                toasts,
            },
            channel: Mutex::new(None),
            watcher: CancellationToken::new(),
        }
    }

    pub fn snapshot(&self) -> NotificationSnapshot {
        let feed = self.shared.lock();
        NotificationSnapshot {
            items: feed.items().to_vec(),
            unread: feed.unread_count(),
        }
    }

    pub fn unread_count(&self) -> usize {
        self.shared.lock().unread_count()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationSnapshot> {
        self.shared.updates.subscribe()
    }

    /// Whether a push channel is currently attached.
    pub fn is_connected(&self) -> bool {
        self.lock_channel()
            .as_ref()
            .is_some_and(|c| !c.task.is_finished())
    }

    /// Fetch the backlog and open the push channel for the current session.
    pub async fn start(&self) -> ClientResult<()> {
        let session = self.api.session().require_session()?;

        self.close_channel();
        let epoch = self.shared.lock().reset();
        self.shared.publish();

        let Some(backlog) = self.api.list_notifications().await? else {
            return Ok(());
        };
        if self.shared.lock().replace_backlog(epoch, backlog) {
            self.shared.publish();
        }

        let Some(stream) = self.connect(&session).await? else {
            return Ok(());
        };

        if self.shared.lock().epoch() != epoch {
            // Signed out while connecting.
            tracing::debug!("Discarding push channel opened for an ended session");
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(pump(stream, epoch, self.shared.clone(), cancel.clone()));
        if let Some(previous) = self.lock_channel().replace(PushChannel { cancel, task }) {
            previous.cancel.cancel();
        }

        tracing::info!(user_id = %session.user_id, "Notification push channel open");
        Ok(())
    }

    /// Tear down the push channel and forget all notifications.
    pub fn stop(&self) {
        self.close_channel();
        self.shared.lock().reset();
        self.shared.publish();
    }

    /// Mark `id` read locally right away and persist it in the background.
    ///
    /// If the server call fails the local flag is restored and an error toast
    /// is shown. The returned handle completes when the server call settles.
    pub fn mark_as_read(&self, id: &str) -> JoinHandle<()> {
        let (mark, epoch) = {
            let mut feed = self.shared.lock();
            (feed.mark_read(id), feed.epoch())
        };
        if mark.flipped > 0 {
            self.shared.publish();
        }

        let api = self.api.clone();
        let shared = self.shared.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            match api.mark_notification_read(&id).await {
                Ok(_) => shared.lock().confirm_read(epoch, &id, mark.seq),
                Err(e) => {
                    tracing::warn!(notification_id = %id, "Failed to persist read flag: {}", e);
                    let restored = shared.lock().revert_read(epoch, &id, mark.seq);
                    if restored > 0 {
                        shared.publish();
                    }
                    shared
                        .toasts
                        .error("Failed to mark notification as read", Some(e.to_string()));
                }
            }
        })
    }

    /// Start and stop the push channel as the session comes and goes.
    pub fn follow_session(self: Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.api.session().subscribe();
        let watcher = self.watcher.clone();

        tokio::spawn(async move {
            let mut active_token: Option<String> = None;
            loop {
                let session = rx.borrow_and_update().session().cloned();
                match session {
                    Some(session) if active_token.as_deref() != Some(session.token.as_str()) => {
                        active_token = Some(session.token.clone());
                        if let Err(e) = self.start().await {
                            tracing::warn!("Could not start notification stream: {}", e);
                            self.shared
                                .toasts
                                .error("Live notifications unavailable", Some(e.to_string()));
                        }
                    }
                    Some(_) => {}
                    None => {
                        if active_token.take().is_some() {
                            tracing::info!("Session ended, closing notification stream");
                            self.stop();
                        }
                    }
                }

                tokio::select! {
                    _ = watcher.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Stop following the session and close the channel.
    pub fn shutdown(&self) {
        self.watcher.cancel();
        self.close_channel();
    }

    async fn connect(&self, session: &Session) -> ClientResult<Option<PushStream>> {
        let config: &Config = self.api.config();
        let url = config.notifications_ws_url()?;

        let mut request = url.as_str().into_client_request()?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", session.token))
            .map_err(|e| ClientError::PushChannel(format!("Invalid token header: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let connected = tokio::time::timeout(
            config.connect_timeout,
            tokio_tungstenite::connect_async(request),
        )
        .await
        .map_err(|_| ClientError::Timeout(config.connect_timeout))?;

        match connected {
            Ok((stream, _response)) => Ok(Some(stream)),
            Err(tungstenite::Error::Http(response))
                if response.status() == StatusCode::UNAUTHORIZED =>
            {
                self.api.session().expire(Some(&session.token)).await;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn close_channel(&self) {
        if let Some(channel) = self.lock_channel().take() {
            channel.cancel.cancel();
        }
    }

    fn lock_channel(&self) -> MutexGuard<'_, Option<PushChannel>> {
        self.channel.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for NotificationCenter {
    fn drop(&mut self) {
        self.watcher.cancel();
        self.close_channel();
    }
}

/// Read frames until the channel closes or `cancel` fires.
async fn pump(mut stream: PushStream, epoch: u64, shared: Shared, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = stream.close(None).await {
                    tracing::debug!("Push channel close failed: {}", e);
                }
                break;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => accept_frame(&text, epoch, &shared),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => accept_frame(&text, epoch, &shared),
                    Err(_) => tracing::warn!("Ignoring non UTF-8 push frame"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("Notification push channel closed by server");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("Notification push channel failed: {}", e);
                    break;
                }
            }
        }
    }
}

fn accept_frame(text: &str, epoch: u64, shared: &Shared) {
    let notification: Notification = match serde_json::from_str(text) {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!("Ignoring malformed notification frame: {}", e);
            return;
        }
    };

    let title = notification.title.clone();
    let message = notification.message.clone();
    if shared.lock().push(epoch, notification) {
        shared.publish();
        shared.toasts.info(title, Some(message));
    }
}
