pub mod adapter;
pub mod backfill;
pub mod rpc;
pub mod transformations;

pub use adapter::{ZoneVolumeAdapter, chain_adapters};
pub use backfill::{Backfill, BackfillSettings, BackfillSummary, ChainOutcome, SkipReason};
