use tracing::info;

/// Hooks for reacting to user navigation in the tree.
///
/// Both methods default to doing nothing so observers implement only what
/// they need.
pub trait TreeObserver {
    /// A file became the selection.
    fn node_selected(&self, _path: &str, _file_id: Option<&str>) {}

    /// A directory was expanded or collapsed.
    fn directory_toggled(&self, _path: &str, _expanded: bool) {}
}

/// Logs navigation under the `telemetry` target.
#[derive(Debug, Default)]
pub struct TelemetryObserver;

impl TreeObserver for TelemetryObserver {
    fn node_selected(&self, path: &str, file_id: Option<&str>) {
        info!(target: "telemetry", path, file_id, "node_selected");
    }

    fn directory_toggled(&self, path: &str, expanded: bool) {
        info!(target: "telemetry", path, expanded, "directory_toggled");
    }
}
