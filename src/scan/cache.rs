use std::fmt;

use tokio::sync::broadcast;
use tracing::debug;

/// Read-side views that go stale when an attendance record is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    AttendanceList,
    DashboardStats,
    AttendanceDetail,
    RecentActivity,
    RosterList,
}

impl CacheKey {
    pub const AFTER_ATTENDANCE: [CacheKey; 5] = [
        CacheKey::AttendanceList,
        CacheKey::DashboardStats,
        CacheKey::AttendanceDetail,
        CacheKey::RecentActivity,
        CacheKey::RosterList,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKey::AttendanceList => "attendance",
            CacheKey::DashboardStats => "dashboard-stats",
            CacheKey::AttendanceDetail => "attendance-detail",
            CacheKey::RecentActivity => "recent-activity",
            CacheKey::RosterList => "rosters",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Announces stale views. Each view subscribes and refetches on its own task;
/// sending never waits for them.
#[derive(Clone)]
pub struct ReadSideCache {
    tx: broadcast::Sender<CacheKey>,
}

impl ReadSideCache {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(32);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheKey> {
        self.tx.subscribe()
    }

    pub fn invalidate(&self, keys: &[CacheKey]) {
        for key in keys {
            // no subscribers is fine
            let _ = self.tx.send(*key);
            debug!("invalidated {}", key);
        }
    }
}

impl Default for ReadSideCache {
    fn default() -> Self {
        Self::new()
    }
}
