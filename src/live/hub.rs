use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::remote::client::EventSource;
use crate::remote::types::ProjectEvent;

/// Default wait before reconnecting a dropped stream.
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_millis(1500);

/// Buffered events per subscriber before it starts lagging.
const EVENT_BUFFER: usize = 64;

/// State of the shared connection for one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "offline",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "live",
        }
    }
}

struct Channel {
    events: broadcast::Sender<ProjectEvent>,
    state: watch::Receiver<ConnectionState>,
    subscribers: usize,
    task: JoinHandle<()>,
}

struct HubInner {
    source: Arc<dyn EventSource>,
    backoff: Duration,
    channels: Mutex<HashMap<String, Channel>>,
}

impl HubInner {
    fn channels(&self) -> MutexGuard<'_, HashMap<String, Channel>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, project_id: &str) {
        let mut channels = self.channels();
        let Some(channel) = channels.get_mut(project_id) else {
            return;
        };
        channel.subscribers = channel.subscribers.saturating_sub(1);
        if channel.subscribers == 0 {
            if let Some(channel) = channels.remove(project_id) {
                channel.task.abort();
                info!(project_id, "live connection closed");
            }
        }
    }
}

/// Registry of live event connections, one per project, shared by every
/// subscriber of that project.
///
/// The first subscription opens the connection and the last one to drop
/// closes it. A dropped stream is reopened after the backoff for as long as
/// anyone is subscribed.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl EventHub {
    pub fn new(source: Arc<dyn EventSource>, backoff: Duration) -> Self {
        Self {
            inner: Arc::new(HubInner {
                source,
                backoff,
                channels: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to `project_id`, opening its connection if needed.
    pub fn subscribe(&self, project_id: &str) -> Subscription {
        let mut channels = self.inner.channels();
        let channel = channels.entry(project_id.to_string()).or_insert_with(|| {
            let (events, _) = broadcast::channel(EVENT_BUFFER);
            let (state_tx, state) = watch::channel(ConnectionState::Connecting);
            let task = tokio::spawn(run_connection(
                Arc::clone(&self.inner.source),
                project_id.to_string(),
                events.clone(),
                state_tx,
                self.inner.backoff,
            ));
            info!(project_id, "live connection requested");
            Channel {
                events,
                state,
                subscribers: 0,
                task,
            }
        });
        channel.subscribers += 1;
        Subscription {
            project_id: project_id.to_string(),
            events: channel.events.subscribe(),
            state: channel.state.clone(),
            hub: Arc::clone(&self.inner),
        }
    }

    /// Number of live subscriptions for `project_id`.
    #[cfg(test)]
    pub fn subscriber_count(&self, project_id: &str) -> usize {
        self.inner
            .channels()
            .get(project_id)
            .map(|c| c.subscribers)
            .unwrap_or(0)
    }

    /// Number of projects with an open (or reconnecting) connection.
    #[cfg(test)]
    pub fn open_connections(&self) -> usize {
        self.inner.channels().len()
    }
}

/// One consumer's handle on a project's event stream. Dropping it releases
/// the consumer's share of the connection.
pub struct Subscription {
    project_id: String,
    events: broadcast::Receiver<ProjectEvent>,
    state: watch::Receiver<ConnectionState>,
    hub: Arc<HubInner>,
}

impl Subscription {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Next event for this project; `None` once the connection is gone.
    pub async fn recv(&mut self) -> Option<ProjectEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(project_id = %self.project_id, skipped, "subscriber lagging, events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// An independent view of the connection state.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait for the connection state to change and return the new state.
    #[cfg(test)]
    pub async fn state_changed(&mut self) -> Option<ConnectionState> {
        self.state.changed().await.ok()?;
        Some(*self.state.borrow_and_update())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.release(&self.project_id);
    }
}

async fn run_connection(
    source: Arc<dyn EventSource>,
    project_id: String,
    events: broadcast::Sender<ProjectEvent>,
    state: watch::Sender<ConnectionState>,
    backoff: Duration,
) {
    loop {
        state.send_replace(ConnectionState::Connecting);
        match source.open(&project_id).await {
            Ok(mut feed) => {
                state.send_replace(ConnectionState::Connected);
                info!(project_id = %project_id, "live connection open");
                loop {
                    match feed.next_message().await {
                        Some(Ok(raw)) => match ProjectEvent::parse(&raw) {
                            Ok(event) if event.project_id == project_id => {
                                // No receivers just means nobody is listening right now.
                                let _ = events.send(event);
                            }
                            Ok(event) => {
                                debug!(project_id = %project_id, other = %event.project_id, "event for another project dropped");
                            }
                            Err(e) => warn!(project_id = %project_id, error = %e, "dropping malformed event"),
                        },
                        Some(Err(e)) => {
                            warn!(project_id = %project_id, error = %e, "live connection lost");
                            break;
                        }
                        None => {
                            info!(project_id = %project_id, "live connection closed by server");
                            break;
                        }
                    }
                }
            }
            Err(e) => warn!(project_id = %project_id, error = %e, "live connection failed"),
        }
        state.send_replace(ConnectionState::Disconnected);
        tokio::time::sleep(backoff).await;
    }
}
