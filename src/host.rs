//! ==============================================================================
//! host.rs - redraw scheduling
//! ==============================================================================
//!
//! purpose:
//!     the host side of rendering. redraws the widget into a shared frame on
//!     a fixed cadence, and early whenever the store asks for it.
//!
//! the cadence is independent of the poll cadence: a redraw just reads
//! whatever snapshot is current at that moment.
//!
//! relationships:
//!     - used by: main.rs (spawns run_redraw_loop, serves the frame)
//!     - reads: store.rs
//!     - uses: widget.rs (Renderer)
//!
//! ==============================================================================

use crate::store::{RedrawNotifier, SnapshotStore};
use crate::widget::Renderer;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};

/// the last rendered widget html
pub type Frame = Arc<RwLock<String>>;

/// redraw requests from the store, coalesced
///
/// several requests before the loop wakes up collapse into one redraw.
#[derive(Default)]
pub struct RedrawSignal {
    notify: Notify,
}

impl RedrawSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn requested(&self) {
        self.notify.notified().await
    }
}

impl RedrawNotifier for RedrawSignal {
    fn request_redraw(&self) {
        self.notify.notify_one();
    }
}

/// render the current snapshot into the frame
pub async fn redraw(store: &SnapshotStore, renderer: &dyn Renderer, frame: &Frame) {
    let snapshot = store.snapshot().await;
    let html = renderer.render(&snapshot);
    *frame.write().await = html;
}

/// shortest redraw period; tokio's interval panics on zero
const MIN_REDRAW_PERIOD: Duration = Duration::from_millis(1);

/// redraw every `every`, and whenever a redraw is requested; never returns
pub async fn run_redraw_loop(
    store: SnapshotStore,
    renderer: Arc<dyn Renderer>,
    signal: Arc<RedrawSignal>,
    frame: Frame,
    every: Duration,
) {
    let mut ticker = tokio::time::interval(every.max(MIN_REDRAW_PERIOD));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => tracing::trace!("redraw tick"),
            _ = signal.requested() => tracing::debug!("redraw requested"),
        }
        redraw(&store, renderer.as_ref(), &frame).await;
    }
}
