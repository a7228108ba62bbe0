//! Test helpers: a scriptable mock engine and fixtures.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use tempfile::TempDir;

use goal_renderer::card::GoalCard;
use goal_renderer::config::PoolConfig;
use goal_renderer::engine::{RenderError, RenderPage, RenderWorker, WorkerLauncher, STUB_PNG};
use goal_renderer::pool::WorkerPool;

/// Shared, inspectable state behind every [`MockWorker`].
#[derive(Default)]
pub struct MockState {
    pub launches: AtomicUsize,
    pub closes: AtomicUsize,
    pub renders: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    /// Per-render delay in milliseconds.
    pub delay_ms: AtomicU64,
    /// Per-launch delay in milliseconds.
    pub launch_delay_ms: AtomicU64,
    /// Per-liveness-check delay in milliseconds.
    pub live_check_ms: AtomicU64,
    /// Number of upcoming renders that fail with a fault.
    pub fail_renders: AtomicUsize,
    /// Number of upcoming renders that kill their worker.
    pub kill_renders: AtomicUsize,
    /// Launches refused once set.
    pub refuse_launches: AtomicBool,
    /// Launches allowed before refusing (0 = unlimited).
    pub launch_budget: AtomicUsize,
    pub dead: Mutex<HashSet<u64>>,
    pub closed_ids: Mutex<Vec<u64>>,
    pub last_html: Mutex<Option<String>>,
    /// Worker ids currently held by a test task.
    pub in_use: Mutex<HashSet<u64>>,
}

#[allow(dead_code)]
impl MockState {
    pub fn kill(&self, id: u64) {
        self.dead.lock().unwrap().insert(id);
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_launch_delay(&self, delay: Duration) {
        self.launch_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_live_check_delay(&self, delay: Duration) {
        self.live_check_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Mark a worker as held; false if another holder already has it.
    pub fn claim(&self, id: u64) -> bool {
        self.in_use.lock().unwrap().insert(id)
    }

    pub fn unclaim(&self, id: u64) {
        self.in_use.lock().unwrap().remove(&id);
    }

    pub fn last_html(&self) -> Option<String> {
        self.last_html.lock().unwrap().clone()
    }
}

/// Launcher whose workers follow the script in [`MockState`].
#[derive(Clone, Default)]
pub struct MockLauncher {
    pub state: Arc<MockState>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkerLauncher for MockLauncher {
    type Worker = MockWorker;

    async fn launch(&self, id: u64) -> Result<MockWorker, RenderError> {
        let state = &self.state;
        sleep_ms(state.launch_delay_ms.load(Ordering::SeqCst)).await;
        if state.refuse_launches.load(Ordering::SeqCst) {
            return Err(RenderError::Launch("launch refused".into()));
        }
        let budget = state.launch_budget.load(Ordering::SeqCst);
        if budget > 0 && state.launches.load(Ordering::SeqCst) >= budget {
            return Err(RenderError::Launch("launch budget exhausted".into()));
        }
        state.launches.fetch_add(1, Ordering::SeqCst);
        Ok(MockWorker {
            id,
            closed: false,
            state: Arc::clone(state),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub struct MockWorker {
    id: u64,
    closed: bool,
    state: Arc<MockState>,
}

async fn sleep_ms(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Decrement `n` if positive; true when it was.
fn take_one(n: &AtomicUsize) -> bool {
    n.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl RenderWorker for MockWorker {
    fn id(&self) -> u64 {
        self.id
    }

    async fn is_live(&self) -> bool {
        sleep_ms(self.state.live_check_ms.load(Ordering::SeqCst)).await;
        !self.closed && !self.state.dead.lock().unwrap().contains(&self.id)
    }

    async fn render(&mut self, page: &RenderPage) -> Result<Bytes, RenderError> {
        let state = Arc::clone(&self.state);
        state.renders.fetch_add(1, Ordering::SeqCst);
        *state.last_html.lock().unwrap() = Some(page.html.clone());

        let active = state.active.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_active.fetch_max(active, Ordering::SeqCst);

        sleep_ms(state.delay_ms.load(Ordering::SeqCst)).await;
        state.active.fetch_sub(1, Ordering::SeqCst);

        if take_one(&state.kill_renders) {
            state.kill(self.id);
            return Err(RenderError::Closed);
        }
        if take_one(&state.fail_renders) {
            return Err(RenderError::Fault("scripted failure".into()));
        }
        Ok(Bytes::from_static(STUB_PNG))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        self.state.closed_ids.lock().unwrap().push(self.id);
    }
}

pub fn pool_config(capacity: usize) -> PoolConfig {
    PoolConfig::with_capacity(NonZeroUsize::new(capacity).unwrap())
}

/// Pool of mock workers plus a handle on their shared state.
pub fn mock_pool(capacity: usize) -> (WorkerPool<MockLauncher>, Arc<MockState>) {
    mock_pool_with(pool_config(capacity))
}

pub fn mock_pool_with(config: PoolConfig) -> (WorkerPool<MockLauncher>, Arc<MockState>) {
    let launcher = MockLauncher::new();
    let state = Arc::clone(&launcher.state);
    (WorkerPool::new(launcher, &config), state)
}

/// Template directory holding a minimal `goal.html`.
pub fn template_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("goal.html"),
        "<html><body><script>const card = {{DATA_PLACEHOLDER}};</script></body></html>",
    )
    .unwrap();
    dir
}

pub fn goal_card(id: u64) -> GoalCard {
    serde_json::from_value(json!({
        "id": id,
        "type": "goal",
        "gw": "7",
        "data": {
            "home_team": {"name": "Liverpool", "logo": "", "short_name": "LIV"},
            "away_team": {"name": "Newcastle United", "logo": "", "short_name": "NEW"},
            "goal_scored_team": "Newcastle United",
            "scorers": [{"name": "Alexander Isak", "minute": 35}]
        }
    }))
    .unwrap()
}
