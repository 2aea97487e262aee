//! Timeline synchronizer - maps wall-clock time onto the replayed series
//!
//! Every symbol advances in lock-step: `elapsed` wall seconds since the
//! simulation started move each series to the point nearest
//! `data_start + elapsed`. Replay never loops; past the last point a
//! symbol stays frozen on it.

use crate::config::SimConfig;
use crate::data::{HistoryWindow, PriceSeries, PriceSeriesStore, SeriesSource};
use crate::error::Result;
use crate::feed::clock::Clock;
use crate::feed::publisher::{PublishOutcome, SnapshotPublisher, SubscriptionId};
use crate::feed::snapshot::{Quote, Snapshot};
use crate::types::{EpochMillis, Price, PricePoint, Timestamp, UnixTime};
use chrono::TimeZone;
use chrono::Utc;
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What a call to [`TimelineSynchronizer::tick`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing loaded yet
    NotReady,
    /// Another tick was still running
    Skipped,
    /// Snapshots recomputed and handed to the publisher
    Completed(PublishOutcome),
}

/// Replay progress report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SimulationStatus {
    Inactive {
        message: String,
    },
    Active {
        simulation_start: Timestamp,
        data_start: Timestamp,
        current_simulation_time: Timestamp,
        elapsed_real_ms: i64,
        elapsed_sim_secs: i64,
    },
}

impl SimulationStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, SimulationStatus::Active { .. })
    }
}

/// Entry of the tradable instrument list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
    pub price: Option<Price>,
}

/// Replay anchors and the latest derived snapshots
#[derive(Debug, Default)]
struct TimelineState {
    store: Option<Arc<PriceSeriesStore>>,
    simulation_start: EpochMillis,
    data_start: UnixTime,
    snapshots: HashMap<String, Snapshot>,
}

impl TimelineState {
    fn quotes(&self, symbols: &[String]) -> Vec<Quote> {
        symbols
            .iter()
            .map(|symbol| match self.snapshots.get(symbol) {
                Some(snapshot) => Quote::Live(snapshot.clone()),
                None => Quote::NoData {
                    symbol: symbol.clone(),
                },
            })
            .collect()
    }
}

pub struct TimelineSynchronizer {
    symbols: Vec<String>,
    reference_symbol: Option<String>,
    clock: Arc<dyn Clock>,
    publisher: SnapshotPublisher,
    state: RwLock<TimelineState>,
    /// Held for the duration of a tick; ticks never overlap
    tick_guard: Mutex<()>,
}

impl std::fmt::Debug for TimelineSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineSynchronizer")
            .field("symbols", &self.symbols.len())
            .field("initialized", &self.is_initialized())
            .field("publisher", &self.publisher)
            .finish()
    }
}

impl TimelineSynchronizer {
    pub fn new(config: &SimConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            symbols: config.symbols.clone(),
            reference_symbol: config.reference_symbol().map(str::to_string),
            publisher: SnapshotPublisher::new(config.notify_throttle(), Arc::clone(&clock)),
            clock,
            state: RwLock::new(TimelineState::default()),
            tick_guard: Mutex::new(()),
        }
    }

    /// Load every configured symbol and start the timeline at "now".
    ///
    /// Either every series loads or nothing is installed. Calling this on an
    /// initialized synchronizer is a no-op.
    pub fn initialize(&self, source: &dyn SeriesSource) -> Result<()> {
        self.initialize_from(source, None)
    }

    /// Like [`initialize`](Self::initialize), resuming a timeline that started
    /// at `simulation_start` (epoch millis) instead of now
    pub fn initialize_from(&self, source: &dyn SeriesSource, simulation_start: Option<EpochMillis>) -> Result<()> {
        if self.is_initialized() {
            log::debug!("Timeline already initialized");
            return Ok(());
        }

        log::info!("Initializing timeline with {} symbols", self.symbols.len());
        let store = Arc::new(PriceSeriesStore::load_all(&self.symbols, source)?);

        let data_start = self
            .reference_symbol
            .as_deref()
            .and_then(|symbol| store.get(symbol))
            .map(|series| series.first_time())
            .unwrap_or_default();

        let now = self.clock.now_millis();
        let simulation_start = simulation_start.unwrap_or(now);

        let quotes = {
            let _tick = self.tick_guard.lock();
            let mut state = self.state.write();
            if state.store.is_some() {
                return Ok(());
            }
            state.store = Some(Arc::clone(&store));
            state.simulation_start = simulation_start;
            state.data_start = data_start;
            state.snapshots = derive_all(&store, target_time(data_start, simulation_start, now), now);
            state.quotes(&self.symbols)
        };

        log::info!(
            "Timeline initialized: {} points loaded, data starts at {}",
            store.point_count(),
            data_start
        );
        self.publisher.publish(&quotes);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.read().store.is_some()
    }

    /// Configured symbols in display order
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Epoch millis the current timeline started at, if initialized
    pub fn simulation_start(&self) -> Option<EpochMillis> {
        let state = self.state.read();
        state.store.as_ref().map(|_| state.simulation_start)
    }

    /// Recompute every symbol from the clock and publish once.
    ///
    /// A tick that finds another tick in progress is skipped.
    pub fn tick(&self) -> TickOutcome {
        let Some(guard) = self.tick_guard.try_lock() else {
            log::warn!("Previous tick still running; skipping");
            return TickOutcome::Skipped;
        };

        let now = self.clock.now_millis();
        let quotes = {
            let mut state = self.state.write();
            let Some(store) = state.store.clone() else {
                log::warn!("Tick before initialization");
                return TickOutcome::NotReady;
            };
            let target = target_time(state.data_start, state.simulation_start, now);
            state.snapshots = derive_all(&store, target, now);
            state.quotes(&self.symbols)
        };

        // subscribers may step or reset the timeline
        drop(guard);
        log::debug!("Tick at {}: {} quotes", now, quotes.len());
        TickOutcome::Completed(self.publisher.publish(&quotes))
    }

    /// Point index the clock maps `symbol` to at wall instant `now`
    pub fn index_at(&self, symbol: &str, now: EpochMillis) -> Option<usize> {
        let state = self.state.read();
        let series = state.store.as_ref()?.get(symbol)?;
        let target = target_time(state.data_start, state.simulation_start, now);
        Some(series.nearest_index(target))
    }

    /// Latest snapshot of `symbol`; never blocks on a tick
    pub fn current_quote(&self, symbol: &str) -> Quote {
        match self.state.read().snapshots.get(symbol) {
            Some(snapshot) => Quote::Live(snapshot.clone()),
            None => Quote::NoData {
                symbol: symbol.to_string(),
            },
        }
    }

    /// One quote per configured symbol, in configured order
    pub fn all_current_quotes(&self) -> Vec<Quote> {
        self.state.read().quotes(&self.symbols)
    }

    /// Step `symbol` one point forward (clamped at the last point)
    pub fn advance(&self, symbol: &str) -> Option<Snapshot> {
        self.step(symbol, |index, last| (index + 1).min(last))
    }

    /// Step `symbol` one point back (clamped at the first point)
    pub fn retreat(&self, symbol: &str) -> Option<Snapshot> {
        self.step(symbol, |index, _| index.saturating_sub(1))
    }

    fn step(&self, symbol: &str, next: impl Fn(usize, usize) -> usize) -> Option<Snapshot> {
        let guard = self.tick_guard.lock();
        let now = self.clock.now_millis();

        let (snapshot, quotes) = {
            let mut state = self.state.write();
            let series = Arc::clone(state.store.as_ref()?.get(symbol)?);
            let current = state.snapshots.get(symbol).map(|s| s.index).unwrap_or(0);
            let snapshot = derive_snapshot(&series, next(current, series.last_index()), now);
            state.snapshots.insert(symbol.to_string(), snapshot.clone());
            (snapshot, state.quotes(&self.symbols))
        };

        drop(guard);
        log::debug!("Moved {} to point {}", symbol, snapshot.index);
        self.publisher.publish(&quotes);
        Some(snapshot)
    }

    /// Restart the timeline at "now": every symbol returns to its first
    /// point. Ledgers are not touched.
    pub fn reset_to_start(&self) -> bool {
        let guard = self.tick_guard.lock();
        let now = self.clock.now_millis();

        let quotes = {
            let mut state = self.state.write();
            let Some(store) = state.store.clone() else {
                return false;
            };
            state.simulation_start = now;
            state.snapshots = store
                .symbols()
                .iter()
                .filter_map(|symbol| store.get(symbol))
                .map(|series| (series.symbol().to_string(), derive_snapshot(series, 0, now)))
                .collect();
            state.quotes(&self.symbols)
        };

        drop(guard);
        log::info!("Simulation reset to start at {}", now);
        self.publisher.publish(&quotes);
        true
    }

    /// Points of `symbol` inside `window`, measured back from the wall clock.
    /// Bounds are inclusive.
    pub fn historical_series(&self, symbol: &str, window: HistoryWindow) -> Vec<PricePoint> {
        let state = self.state.read();
        let Some(series) = state.store.as_ref().and_then(|store| store.get(symbol)) else {
            return Vec::new();
        };
        let now_secs = self.clock.now_millis().div_euclid(1000);
        let (start, end) = window.bounds(now_secs);
        series.range(start, end).to_vec()
    }

    /// Full loaded series of `symbol`
    pub fn series(&self, symbol: &str) -> Option<Arc<PriceSeries>> {
        self.state.read().store.as_ref()?.get(symbol).cloned()
    }

    pub fn status(&self) -> SimulationStatus {
        let state = self.state.read();
        if state.store.is_none() {
            return SimulationStatus::Inactive {
                message: "Simulation not initialized".to_string(),
            };
        }

        let now = self.clock.now_millis();
        let elapsed_real_ms = now - state.simulation_start;
        let elapsed_sim_secs = elapsed_real_ms.div_euclid(1000);

        SimulationStatus::Active {
            simulation_start: millis_to_timestamp(state.simulation_start),
            data_start: secs_to_timestamp(state.data_start),
            current_simulation_time: secs_to_timestamp(state.data_start + elapsed_sim_secs),
            elapsed_real_ms,
            elapsed_sim_secs,
        }
    }

    /// Symbol list with display names and current prices
    pub fn instruments(&self) -> Vec<Instrument> {
        let state = self.state.read();
        self.symbols
            .iter()
            .map(|symbol| {
                let series = state.store.as_ref().and_then(|store| store.get(symbol));
                Instrument {
                    symbol: symbol.clone(),
                    name: series
                        .map(|s| s.display_name())
                        .unwrap_or_else(|| format!("{} Inc.", symbol)),
                    price: state.snapshots.get(symbol).map(|s| s.price),
                }
            })
            .collect()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&[Quote]) + Send + Sync + 'static,
    {
        self.publisher.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.publisher.unsubscribe(id)
    }

    pub fn publisher(&self) -> &SnapshotPublisher {
        &self.publisher
    }
}

/// `data_start + floor((now - simulation_start) / 1000)`
fn target_time(data_start: UnixTime, simulation_start: EpochMillis, now: EpochMillis) -> UnixTime {
    data_start + (now - simulation_start).div_euclid(1000)
}

fn derive_snapshot(series: &PriceSeries, index: usize, now: EpochMillis) -> Snapshot {
    let index = index.min(series.last_index());
    let current = &series.points()[index];
    let previous = index.checked_sub(1).and_then(|i| series.get(i));
    Snapshot::from_points(series.symbol(), &series.display_name(), index, current, previous, now)
}

fn derive_all(store: &PriceSeriesStore, target: UnixTime, now: EpochMillis) -> HashMap<String, Snapshot> {
    store
        .symbols()
        .iter()
        .filter_map(|symbol| store.get(symbol))
        .map(|series| {
            let index = series.nearest_index(target);
            (series.symbol().to_string(), derive_snapshot(series, index, now))
        })
        .collect()
}

fn millis_to_timestamp(millis: EpochMillis) -> Timestamp {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

fn secs_to_timestamp(secs: UnixTime) -> Timestamp {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}
