pub mod hub;
pub mod notify;
pub mod refresh;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::event::Event;
use hub::{EventHub, Subscription};

/// The app's two consumers of one project's stream: tree invalidation and
/// bundle/commit notices. Both share the hub's single connection, which
/// closes when the link is dropped.
pub struct LiveLink {
    project_id: String,
    tasks: Vec<JoinHandle<()>>,
}

impl LiveLink {
    pub fn connect(hub: &EventHub, project_id: &str, tx: UnboundedSender<Event>) -> Self {
        let tree = spawn_tree_forwarder(hub.subscribe(project_id), tx.clone());
        let notices = spawn_notifier(hub.subscribe(project_id), tx);
        Self {
            project_id: project_id.to_string(),
            tasks: vec![tree, notices],
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

impl Drop for LiveLink {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn spawn_tree_forwarder(mut sub: Subscription, tx: UnboundedSender<Event>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut state = sub.watch_state();
        let initial = *state.borrow_and_update();
        if tx.send(Event::Connection(initial)).is_err() {
            return;
        }
        loop {
            tokio::select! {
                event = sub.recv() => {
                    let Some(event) = event else { break };
                    if event.touches_tree() && tx.send(Event::Project(event)).is_err() {
                        break;
                    }
                }
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = *state.borrow_and_update();
                    if tx.send(Event::Connection(current)).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

fn spawn_notifier(mut sub: Subscription, tx: UnboundedSender<Event>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = sub.recv().await {
            if let Some(notice) = notify::notice_for(&event) {
                if tx.send(Event::Notice(notice)).is_err() {
                    break;
                }
            }
        }
    })
}
