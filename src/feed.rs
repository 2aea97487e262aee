//! Live market feed replayed from historical series

pub mod clock;
pub mod publisher;
pub mod replay;
pub mod snapshot;
pub mod timeline;

pub use clock::{Clock, ManualClock, SystemClock};
pub use publisher::{PublishOutcome, SnapshotCallback, SnapshotPublisher, SubscriptionId};
pub use replay::ReplayDriver;
pub use snapshot::{Quote, Snapshot, PLACEHOLDER_PRICE};
pub use timeline::{Instrument, SimulationStatus, TickOutcome, TimelineSynchronizer};

/// Read access to current market prices, as needed by the trade engine
pub trait MarketPrices: Send + Sync {
    fn quote(&self, symbol: &str) -> Quote;

    fn has_symbol(&self, symbol: &str) -> bool;
}

impl MarketPrices for TimelineSynchronizer {
    fn quote(&self, symbol: &str) -> Quote {
        self.current_quote(symbol)
    }

    fn has_symbol(&self, symbol: &str) -> bool {
        TimelineSynchronizer::has_symbol(self, symbol)
    }
}
