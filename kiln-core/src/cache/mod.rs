//! Generation-scoped memoization.
//!
//! Generators use these caches to share derived elements within a single
//! generation pass (for example, one midpoint vertex per subdivided edge).
//! They are cleared between passes and never evict.

mod pair_cache;

pub use pair_cache::{PairCache, PairOrder};
