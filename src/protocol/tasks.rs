//! Running-task payloads.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Deserialize;

/// One entry of `ListTasksResponse`, or the whole `ForegroundTaskResponse`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskData {
    pub task_id: i32,
    #[serde(default)]
    pub stack_id: i32,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub last_active_time: i64,
    /// Component name `package/activity` of the task's top activity.
    #[serde(default)]
    pub top_activity: String,
}

impl TaskData {
    /// `lastActiveTime` as a wall-clock instant.
    pub fn last_active(&self) -> SystemTime {
        let millis = u64::try_from(self.last_active_time).unwrap_or(0);
        UNIX_EPOCH + Duration::from_millis(millis)
    }

    /// Package part of [`top_activity`](Self::top_activity).
    pub fn package(&self) -> &str {
        self.top_activity
            .split_once('/')
            .map_or(self.top_activity.as_str(), |(pkg, _)| pkg)
    }
}
