use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::backend::{BackendError, WindowBackend, WindowCount};

/// Request timestamps for one client inside the trailing window.
#[derive(Debug, Default)]
pub struct RateWindow {
    hits: VecDeque<u64>,
}

impl RateWindow {
    /// Discards timestamps at or before `now - window`.
    fn prune(&mut self, now: u64, window: u64) {
        while let Some(&oldest) = self.hits.front() {
            if now.saturating_sub(oldest) >= window {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn try_admit(&mut self, now: u64, limit: u32, window: u64) -> WindowCount {
        self.prune(now, window);
        let admitted = self.hits.len() < limit as usize;
        if admitted {
            self.hits.push_back(now);
        }
        WindowCount {
            admitted,
            count: self.hits.len() as u32,
        }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// In-process fallback store. Each key is updated under its map entry's
/// exclusive lock, so concurrent requests for one key never lose updates.
#[derive(Default)]
pub struct LocalWindowBackend {
    windows: DashMap<String, RateWindow>,
}

impl LocalWindowBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

#[async_trait]
impl WindowBackend for LocalWindowBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn admit(
        &self,
        key: &str,
        now: u64,
        limit: u32,
        window: u64,
    ) -> Result<WindowCount, BackendError> {
        let mut entry = self.windows.entry(key.to_string()).or_default();
        Ok(entry.try_admit(now, limit, window))
    }

    fn sweep(&self, now: u64, window: u64) -> usize {
        let before = self.windows.len();
        // A window with nothing left inside it behaves exactly like a new one.
        self.windows.retain(|_, w| {
            w.prune(now, window);
            !w.is_empty()
        });
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            debug!(removed, remaining = self.windows.len(), "swept idle rate-limit windows");
        }
        removed
    }
}
