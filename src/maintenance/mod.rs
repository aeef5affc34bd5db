use tokio::time::{Duration, sleep};
use tracing::{debug, info};

use crate::web::AppState;

const SWEEP_INTERVAL_SECS: u64 = 60;

/// Periodically drop workspaces whose page went away without closing them.
pub fn spawn(state: AppState) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(SWEEP_INTERVAL_SECS);
        loop {
            sleep(interval).await;
            run_sweep(&state);
        }
    });
}

fn run_sweep(state: &AppState) -> usize {
    let evicted = state
        .workspaces()
        .evict_idle(state.config().workspace_idle);

    if evicted > 0 {
        info!(
            evicted,
            remaining = state.workspaces().len(),
            previews = state.previews().len(),
            "idle workspaces evicted"
        );
    } else {
        debug!(open = state.workspaces().len(), "workspace sweep found nothing idle");
    }

    evicted
}
