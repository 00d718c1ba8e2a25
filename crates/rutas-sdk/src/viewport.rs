//! Viewport loader: keeps a displayed feature set in step with the visible map
//! rectangle while the view keeps moving.
//!
//! Every view change is rounded and compared to the last requested box, then
//! debounced. When the quiet period ends the request gets a new generation,
//! the display is cleared and pages are appended until the server reports no
//! more. Only the newest generation may touch the display: every page
//! completion is checked against the generation counter under the display
//! lock, and the superseded task is aborted so its HTTP call is dropped.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use geojson::Feature;
use rutas_core::BoundingBox;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::InfraPage;
use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportConfig {
    /// Quiet period after the last view change before fetching.
    pub debounce: Duration,
    /// Decimal places kept when comparing boxes.
    pub precision: u32,
    pub page_size: usize,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(350),
            precision: 5,
            page_size: 7500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest {
    pub bbox: BoundingBox,
    /// 1-based.
    pub page: u32,
    pub page_size: usize,
}

/// Where viewport pages come from. Dropping the returned future must be safe
/// and should cancel the request.
pub trait PageSource: Send + Sync + 'static {
    fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> impl Future<Output = Result<InfraPage, TransportError>> + Send;
}

impl<S: PageSource> PageSource for Arc<S> {
    fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> impl Future<Output = Result<InfraPage, TransportError>> + Send {
        self.as_ref().fetch_page(request)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum LoadStatus {
    #[default]
    Idle,
    /// Waiting for `page`.
    Loading { page: u32 },
    Complete { pages: u32 },
    Failed { message: String },
}

impl LoadStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(self, LoadStatus::Loading { .. })
    }
}

/// What the map layer should show.
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    pub generation: u64,
    pub bbox: Option<BoundingBox>,
    pub features: Vec<Feature>,
    pub status: LoadStatus,
}

#[derive(Default)]
struct Control {
    last_requested: Option<BoundingBox>,
    debounce: Option<JoinHandle<()>>,
    load: Option<JoinHandle<()>>,
}

struct Inner<S> {
    source: S,
    config: ViewportConfig,
    generation: AtomicU64,
    display: watch::Sender<DisplayState>,
    control: Mutex<Control>,
}

pub struct ViewportLoader<S: PageSource> {
    inner: Arc<Inner<S>>,
}

impl<S: PageSource> ViewportLoader<S> {
    pub fn new(source: S, config: ViewportConfig) -> Self {
        let (display, _) = watch::channel(DisplayState::default());
        Self {
            inner: Arc::new(Inner {
                source,
                config,
                generation: AtomicU64::new(0),
                display,
                control: Mutex::new(Control::default()),
            }),
        }
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.inner.config
    }

    /// Latest generation issued.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.inner.display.subscribe()
    }

    pub fn current(&self) -> DisplayState {
        self.inner.display.borrow().clone()
    }

    /// Report a new visible rectangle. Returns false when the rounded box
    /// equals the last requested one and nothing was scheduled.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn view_changed(&self, bbox: BoundingBox) -> bool {
        let rounded = bbox.rounded(self.inner.config.precision);
        let mut control = self.inner.lock_control();
        if control.last_requested == Some(rounded) {
            tracing::trace!(bbox = %rounded, "View unchanged, skipping");
            return false;
        }
        control.last_requested = Some(rounded);

        if let Some(pending) = control.debounce.take() {
            pending.abort();
        }
        let inner = Arc::clone(&self.inner);
        let quiet = self.inner.config.debounce;
        control.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            Inner::start_generation(&inner, rounded);
        }));
        true
    }

    /// Wait until no view change is pending and the newest generation has
    /// finished or failed.
    pub async fn settled(&self) -> DisplayState {
        loop {
            let pending = self
                .inner
                .lock_control()
                .debounce
                .as_ref()
                .is_some_and(|task| !task.is_finished());
            if pending {
                tokio::time::sleep(self.inner.config.debounce).await;
                continue;
            }

            let target = self.generation();
            let mut rx = self.subscribe();
            return match rx
                .wait_for(|state| state.generation >= target && state.status.is_settled())
                .await
            {
                Ok(state) => state.clone(),
                Err(_) => self.current(),
            };
        }
    }
}

impl<S: PageSource> Drop for ViewportLoader<S> {
    fn drop(&mut self) {
        let mut control = self.inner.lock_control();
        for task in [control.debounce.take(), control.load.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }
}

impl<S: PageSource> Inner<S> {
    fn lock_control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    /// Issue a new generation for `bbox`: clear the display, abort the
    /// previous load and start paging.
    fn start_generation(inner: &Arc<Self>, bbox: BoundingBox) {
        let mut control = inner.lock_control();
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        inner.display.send_modify(|state| {
            state.generation = generation;
            state.bbox = Some(bbox);
            state.features.clear();
            state.status = LoadStatus::Loading { page: 1 };
        });

        if let Some(stale) = control.load.take() {
            stale.abort();
        }
        tracing::debug!(generation, bbox = %bbox, "Viewport load started");
        let task_inner = Arc::clone(inner);
        control.load = Some(tokio::spawn(task_inner.load(generation, bbox)));
    }

    async fn load(self: Arc<Self>, generation: u64, bbox: BoundingBox) {
        let mut page = 1u32;
        loop {
            if self.is_stale(generation) {
                tracing::debug!(generation, page, "Viewport load superseded");
                return;
            }
            let request = PageRequest {
                bbox,
                page,
                page_size: self.config.page_size,
            };

            let result = match self.source.fetch_page(&request).await {
                Ok(result) => result,
                Err(err) => {
                    self.fail(generation, bbox, page, err);
                    return;
                }
            };

            // An empty page that claims more would page forever.
            let has_more = result.has_more && !result.features.is_empty();
            let applied = self.display.send_if_modified(|state| {
                if self.is_stale(generation) {
                    return false;
                }
                state.features.extend(result.features);
                state.status = if has_more {
                    LoadStatus::Loading { page: page + 1 }
                } else {
                    LoadStatus::Complete { pages: page }
                };
                true
            });
            if !applied {
                tracing::debug!(generation, page, "Discarded page from superseded load");
                return;
            }
            if !has_more {
                tracing::debug!(generation, pages = page, "Viewport load complete");
                return;
            }
            page += 1;
        }
    }

    /// Clear the display and forget the box so the same view retries.
    fn fail(&self, generation: u64, bbox: BoundingBox, page: u32, err: TransportError) {
        let message = err.to_string();
        let applied = self.display.send_if_modified(|state| {
            if self.is_stale(generation) {
                return false;
            }
            state.features.clear();
            state.status = LoadStatus::Failed {
                message: message.clone(),
            };
            true
        });
        if !applied {
            return;
        }
        tracing::warn!(generation, page, "Viewport load failed: {}", message);
        let mut control = self.lock_control();
        if control.last_requested == Some(bbox) {
            control.last_requested = None;
        }
    }
}
