use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::runtime_context::TimeProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_window_ms")]
    pub window_ms: i64,
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

fn default_window_ms() -> i64 {
    60_000
}

fn default_max_requests() -> u32 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
        }
    }
}

#[derive(Debug)]
struct WindowState {
    window_start_ms: i64,
    count: u32,
}

/// Fixed-window request counter per `(workspace, resource)`. Windows reset
/// lazily when consulted, never on a timer. `can_make_request` is a pure
/// predicate; `record_request` does the counting and is called only once a
/// dispatch actually proceeds. There is no backpressure signal beyond "not
/// yet" — callers re-check on a later poll.
pub struct RateLimiter {
    default_config: RateLimitConfig,
    overrides: DashMap<String, RateLimitConfig>,
    windows: DashMap<(String, String), Mutex<WindowState>>,
    time: Arc<dyn TimeProvider>,
}

impl RateLimiter {
    pub fn new(default_config: RateLimitConfig, time: Arc<dyn TimeProvider>) -> Self {
        RateLimiter {
            default_config,
            overrides: DashMap::new(),
            windows: DashMap::new(),
            time,
        }
    }

    fn config_for(&self, workspace: &str) -> RateLimitConfig {
        self.overrides
            .get(workspace)
            .map(|entry| *entry.value())
            .unwrap_or(self.default_config)
    }

    /// Would a request for this workspace/resource be admitted right now?
    /// Makes no state change.
    pub fn can_make_request(&self, workspace: &str, resource: &str) -> bool {
        let config = self.config_for(workspace);
        if config.max_requests == 0 {
            return false;
        }
        let Some(entry) = self
            .windows
            .get(&(workspace.to_string(), resource.to_string()))
        else {
            return true;
        };
        let state = entry.lock();
        if self.time.now_millis() - state.window_start_ms >= config.window_ms {
            true
        } else {
            state.count < config.max_requests
        }
    }

    /// Count one admitted request, resetting the window first if it has
    /// elapsed.
    pub fn record_request(&self, workspace: &str, resource: &str) {
        let config = self.config_for(workspace);
        let now = self.time.now_millis();
        let entry = self
            .windows
            .entry((workspace.to_string(), resource.to_string()))
            .or_insert_with(|| {
                Mutex::new(WindowState {
                    window_start_ms: now,
                    count: 0,
                })
            });
        let mut state = entry.lock();
        if now - state.window_start_ms >= config.window_ms {
            state.window_start_ms = now;
            state.count = 0;
        }
        state.count += 1;
    }

    /// Override the limit for one workspace at runtime.
    pub fn set_workspace_limit(&self, workspace: &str, config: RateLimitConfig) {
        self.overrides.insert(workspace.to_string(), config);
    }

    /// Current count and ceiling for a window. A window that has elapsed
    /// reports zero used.
    pub fn usage(&self, workspace: &str, resource: &str) -> (u32, u32) {
        let config = self.config_for(workspace);
        let used = self
            .windows
            .get(&(workspace.to_string(), resource.to_string()))
            .map(|entry| {
                let state = entry.lock();
                if self.time.now_millis() - state.window_start_ms >= config.window_ms {
                    0
                } else {
                    state.count
                }
            })
            .unwrap_or(0);
        (used, config.max_requests)
    }
}
