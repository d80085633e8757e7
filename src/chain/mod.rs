pub mod fallback;

pub use fallback::{
    AttemptOutcome, AttemptRecord, ChainStats, FallbackChain, FallbackChainBuilder,
    FallbackResult,
};
