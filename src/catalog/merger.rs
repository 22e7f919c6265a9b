//! The paged result merger: drives the fetcher page by page, accumulates
//! results for the current query generation, and joins the favorites set
//! into the externally visible item list.
//!
//! The merger runs as a single worker task multiplexing three sources with
//! `tokio::select!`: consumer commands, fetch outcomes from spawned fetch
//! tasks, and the favorites watch. Every spawned fetch carries the
//! generation it was issued under; an outcome whose generation no longer
//! matches is discarded on arrival, so only the latest query epoch can
//! ever mutate the visible accumulation.

use crate::catalog::query::CatalogQueryController;
use crate::catalog::{AnnotatedItem, CatalogQuery, Category, LoadState, Page, ProductSummary};
use crate::favorites::{FavoriteRecord, FavoritesStore};
use crate::remote::{CatalogFetcher, FetchError};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

// ============================================================================
// Commands and fetch outcomes
// ============================================================================

/// Consumer intents, delivered to the worker fire-and-forget.
#[derive(Debug)]
enum Command {
    SetCategory(Category),
    SetSearchText(String),
    LoadNextPage,
    Refresh,
    ToggleFavorite(String),
}

/// Which phase issued a fetch. Determines which `LoadState` a result or
/// failure attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchPhase {
    Refresh,
    Append,
}

/// Completion report from a spawned fetch task.
#[derive(Debug)]
struct FetchOutcome {
    generation: u64,
    phase: FetchPhase,
    result: Result<Page, FetchError>,
}

// ============================================================================
// Pipeline handle
// ============================================================================

/// Handle to a running catalog pipeline.
///
/// Intents (`set_category`, `set_search_text`, `load_next_page`, `refresh`,
/// `toggle_favorite`) are fire-and-forget; observable outputs are watch
/// channels for the annotated item list and the two per-phase load states.
///
/// The pipeline starts idle on the default (Table, "") query; the first
/// query change or an explicit [`refresh`](Self::refresh) requests page 0.
/// Dropping every handle shuts the worker down.
#[derive(Clone)]
pub struct CatalogPipeline {
    cmd_tx: mpsc::UnboundedSender<Command>,
    items_rx: watch::Receiver<Vec<AnnotatedItem>>,
    refresh_rx: watch::Receiver<LoadState>,
    append_rx: watch::Receiver<LoadState>,
    query_rx: watch::Receiver<CatalogQuery>,
}

impl CatalogPipeline {
    /// Spawn the merger worker and return a handle to it.
    pub fn spawn(
        fetcher: Arc<dyn CatalogFetcher>,
        favorites: FavoritesStore,
        page_size: usize,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (items_tx, items_rx) = watch::channel(Vec::new());
        let (refresh_tx, refresh_rx) = watch::channel(LoadState::Idle);
        let (append_tx, append_rx) = watch::channel(LoadState::Idle);

        let controller = CatalogQueryController::default();
        let query_rx = controller.subscribe();
        let fav_rx = favorites.observe_all();

        let merger = PagedResultMerger {
            fetcher,
            favorites,
            page_size,
            controller,
            generation: 0,
            accumulated: Vec::new(),
            exhausted: false,
            primed: false,
            in_flight: None,
            favorite_ids: HashSet::new(),
            items_tx,
            refresh_tx,
            append_tx,
            outcome_tx,
        };

        tokio::spawn(merger.run(cmd_rx, outcome_rx, fav_rx));

        Self {
            cmd_tx,
            items_rx,
            refresh_rx,
            append_rx,
            query_rx,
        }
    }

    pub fn set_category(&self, category: Category) {
        let _ = self.cmd_tx.send(Command::SetCategory(category));
    }

    pub fn set_search_text(&self, text: impl Into<String>) {
        let _ = self.cmd_tx.send(Command::SetSearchText(text.into()));
    }

    /// Request the next page. A no-op while a fetch is in flight, before
    /// the first page has loaded, or after the result set is exhausted.
    pub fn load_next_page(&self) {
        let _ = self.cmd_tx.send(Command::LoadNextPage);
    }

    /// Re-fetch page 0 for the current query. On success the whole
    /// accumulation is replaced atomically; until then prior items stay
    /// visible.
    pub fn refresh(&self) {
        let _ = self.cmd_tx.send(Command::Refresh);
    }

    /// Favorite the product if it is not favorited, otherwise unfavorite it.
    pub fn toggle_favorite(&self, product_id: impl Into<String>) {
        let _ = self.cmd_tx.send(Command::ToggleFavorite(product_id.into()));
    }

    /// Live annotated item list for the current query generation.
    pub fn items(&self) -> watch::Receiver<Vec<AnnotatedItem>> {
        self.items_rx.clone()
    }

    /// Load state of the initial/refresh phase.
    pub fn refresh_state(&self) -> watch::Receiver<LoadState> {
        self.refresh_rx.clone()
    }

    /// Load state of the append (loading more) phase.
    pub fn append_state(&self) -> watch::Receiver<LoadState> {
        self.append_rx.clone()
    }

    /// Live view of the current query.
    pub fn query(&self) -> watch::Receiver<CatalogQuery> {
        self.query_rx.clone()
    }
}

// ============================================================================
// Worker
// ============================================================================

/// Exclusive owner of the accumulated pages and load states for the
/// current query generation.
struct PagedResultMerger {
    fetcher: Arc<dyn CatalogFetcher>,
    favorites: FavoritesStore,
    page_size: usize,
    controller: CatalogQueryController,

    /// Query epoch counter. Bumped on every query change and on manual
    /// refresh; outcomes tagged with an older value are dropped on arrival.
    generation: u64,
    accumulated: Vec<ProductSummary>,
    /// No more pages remain for this generation.
    exhausted: bool,
    /// Page 0 has loaded at least once for this generation; appends are
    /// only issued once primed.
    primed: bool,
    /// Single-flight: at most one outstanding fetch. Aborted when a newer
    /// generation supersedes it (best-effort; the generation check is the
    /// correctness backstop).
    in_flight: Option<JoinHandle<()>>,
    favorite_ids: HashSet<String>,

    items_tx: watch::Sender<Vec<AnnotatedItem>>,
    refresh_tx: watch::Sender<LoadState>,
    append_tx: watch::Sender<LoadState>,
    outcome_tx: mpsc::UnboundedSender<FetchOutcome>,
}

impl PagedResultMerger {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        mut outcome_rx: mpsc::UnboundedReceiver<FetchOutcome>,
        mut fav_rx: watch::Receiver<Vec<FavoriteRecord>>,
    ) {
        self.apply_favorites(&fav_rx.borrow_and_update());

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    // All pipeline handles dropped.
                    None => break,
                },
                Some(outcome) = outcome_rx.recv() => self.handle_outcome(outcome),
                changed = fav_rx.changed() => {
                    // The worker owns a store clone, so the sender outlives us.
                    if changed.is_ok() {
                        let ids = fav_rx.borrow_and_update().clone();
                        self.apply_favorites(&ids);
                    }
                }
            }
        }

        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        tracing::debug!("Catalog pipeline worker stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::SetCategory(category) => {
                if self.controller.set_category(category) {
                    self.restart_generation();
                }
            }
            Command::SetSearchText(text) => {
                if self.controller.set_search_text(text) {
                    self.restart_generation();
                }
            }
            Command::LoadNextPage => self.load_next_page(),
            Command::Refresh => self.manual_refresh(),
            Command::ToggleFavorite(product_id) => self.toggle_favorite(product_id),
        }
    }

    /// Query changed: discard the old generation entirely and fetch page 0.
    fn restart_generation(&mut self) {
        self.generation += 1;
        self.abort_in_flight();
        self.accumulated.clear();
        self.exhausted = false;
        self.primed = false;
        self.publish_items();
        self.refresh_tx.send_replace(LoadState::Loading);
        self.append_tx.send_replace(LoadState::Idle);
        tracing::debug!(generation = self.generation, "Query changed, refetching page 0");
        self.spawn_fetch(FetchPhase::Refresh, 0);
    }

    /// Manual refresh: same query, new generation so any in-flight fetch is
    /// superseded. Accumulated items stay visible until the new page 0 lands.
    fn manual_refresh(&mut self) {
        self.generation += 1;
        self.abort_in_flight();
        // A superseded append no longer reports progress, even if the
        // refresh that replaced it goes on to fail.
        self.append_tx.send_replace(LoadState::Idle);
        self.refresh_tx.send_replace(LoadState::Loading);
        tracing::debug!(generation = self.generation, "Manual refresh");
        self.spawn_fetch(FetchPhase::Refresh, 0);
    }

    fn load_next_page(&mut self) {
        if self.in_flight.is_some() {
            tracing::debug!("Ignoring load_next_page: fetch already in flight");
            return;
        }
        if self.exhausted {
            tracing::debug!("Ignoring load_next_page: result set exhausted");
            return;
        }
        if !self.primed {
            tracing::debug!("Ignoring load_next_page: no page 0 yet");
            return;
        }
        let offset = self.accumulated.len();
        self.append_tx.send_replace(LoadState::Loading);
        tracing::debug!(generation = self.generation, offset, "Loading next page");
        self.spawn_fetch(FetchPhase::Append, offset);
    }

    fn spawn_fetch(&mut self, phase: FetchPhase, offset: usize) {
        let generation = self.generation;
        let fetcher = Arc::clone(&self.fetcher);
        let query = self.controller.current();
        let page_size = self.page_size;
        let outcome_tx = self.outcome_tx.clone();

        self.in_flight = Some(tokio::spawn(async move {
            let result = fetcher.fetch_page(&query, offset, page_size).await;
            // Worker gone means nothing cares about the result.
            let _ = outcome_tx.send(FetchOutcome {
                generation,
                phase,
                result,
            });
        }));
    }

    fn abort_in_flight(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
            tracing::debug!("Aborted superseded fetch");
        }
    }

    fn handle_outcome(&mut self, outcome: FetchOutcome) {
        if outcome.generation != self.generation {
            tracing::debug!(
                stale = outcome.generation,
                current = self.generation,
                "Discarding result from superseded generation"
            );
            return;
        }
        self.in_flight = None;

        match (outcome.phase, outcome.result) {
            (FetchPhase::Refresh, Ok(page)) => {
                self.exhausted = page.end_of_data || page.items.is_empty();
                self.accumulated = page.items;
                self.primed = true;
                self.refresh_tx.send_replace(LoadState::NotLoading);
                self.append_tx.send_replace(LoadState::Idle);
                self.publish_items();
                tracing::debug!(
                    generation = self.generation,
                    items = self.accumulated.len(),
                    exhausted = self.exhausted,
                    "Page 0 loaded"
                );
            }
            (FetchPhase::Refresh, Err(err)) => {
                tracing::warn!(generation = self.generation, error = %err, "Refresh failed");
                self.refresh_tx.send_replace(LoadState::Failed(err));
            }
            (FetchPhase::Append, Ok(page)) => {
                if page.items.is_empty() {
                    self.exhausted = true;
                } else {
                    self.exhausted = page.end_of_data;
                    self.accumulated.extend(page.items);
                    self.publish_items();
                }
                self.append_tx.send_replace(LoadState::NotLoading);
                tracing::debug!(
                    generation = self.generation,
                    items = self.accumulated.len(),
                    exhausted = self.exhausted,
                    "Next page loaded"
                );
            }
            (FetchPhase::Append, Err(err)) => {
                // Prior pages stay visible; only the append indicator fails.
                tracing::warn!(generation = self.generation, error = %err, "Append failed");
                self.append_tx.send_replace(LoadState::Failed(err));
            }
        }
    }

    fn toggle_favorite(&mut self, product_id: String) {
        if self.favorite_ids.contains(&product_id) {
            let favorites = self.favorites.clone();
            tokio::spawn(async move {
                favorites.remove(&product_id).await;
            });
            return;
        }

        // Adding needs the display fields, so the product must be in the
        // current accumulation.
        let Some(product) = self.accumulated.iter().find(|p| p.id == product_id) else {
            tracing::debug!(product_id, "Ignoring toggle for unknown product");
            return;
        };
        let record = FavoriteRecord::new(
            product.id.clone(),
            product.name.clone(),
            product.thumbnail_url.clone().unwrap_or_default(),
        );
        let favorites = self.favorites.clone();
        tokio::spawn(async move {
            favorites.add(record).await;
        });
    }

    fn apply_favorites(&mut self, records: &[FavoriteRecord]) {
        self.favorite_ids = records.iter().map(|r| r.product_id.clone()).collect();
        self.publish_items();
    }

    /// Recompute the annotated view by joining the accumulation against the
    /// favorite id set. Never fetches, never touches pagination state.
    fn publish_items(&self) {
        let items: Vec<AnnotatedItem> = self
            .accumulated
            .iter()
            .map(|product| AnnotatedItem {
                is_favorite: self.favorite_ids.contains(&product.id),
                product: product.clone(),
            })
            .collect();
        self.items_tx.send_replace(items);
    }
}

// ============================================================================
// Tests
// ============================================================================
