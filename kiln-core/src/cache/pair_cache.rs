use std::collections::HashMap;

/// How a [`PairCache`] treats the order of a key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairOrder {
    /// `(a, b)` and `(b, a)` are the same key. Right for undirected edges.
    #[default]
    Unordered,

    /// `(a, b)` and `(b, a)` are distinct keys.
    Ordered,
}

/// Map from a pair of small indices to a previously derived value.
///
/// # Example
///
/// ```rust
/// use kiln_core::cache::PairCache;
///
/// let mut midpoints: PairCache<u16> = PairCache::new();
/// let first = midpoints.get_or_insert_with(3, 7, || 12);
/// let again = midpoints.get_or_insert_with(7, 3, || unreachable!());
/// assert_eq!(first, again);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PairCache<V> {
    entries: HashMap<(u32, u32), V>,
    order: PairOrder,
}

impl<V: Copy> PairCache<V> {
    /// An empty cache with order-independent keys.
    pub fn new() -> Self {
        Self::with_order(PairOrder::Unordered)
    }

    pub fn with_order(order: PairOrder) -> Self {
        Self {
            entries: HashMap::new(),
            order,
        }
    }

    pub fn order(&self) -> PairOrder {
        self.order
    }

    fn key(&self, a: u32, b: u32) -> (u32, u32) {
        match self.order {
            PairOrder::Unordered if b < a => (b, a),
            _ => (a, b),
        }
    }

    pub fn get(&self, a: u32, b: u32) -> Option<V> {
        self.entries.get(&self.key(a, b)).copied()
    }

    /// Store `value` for the pair, returning what it replaces.
    pub fn insert(&mut self, a: u32, b: u32, value: V) -> Option<V> {
        let key = self.key(a, b);
        self.entries.insert(key, value)
    }

    pub fn get_or_insert_with(&mut self, a: u32, b: u32, derive: impl FnOnce() -> V) -> V {
        let key = self.key(a, b);
        *self.entries.entry(key).or_insert_with(derive)
    }

    /// Like [`get_or_insert_with`](Self::get_or_insert_with) for derivations
    /// that can fail. Nothing is stored on failure.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        a: u32,
        b: u32,
        derive: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        let key = self.key(a, b);
        if let Some(value) = self.entries.get(&key) {
            return Ok(*value);
        }
        let value = derive()?;
        self.entries.insert(key, value);
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every entry, keeping the allocation for the next pass.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unordered_keys_match_both_directions() {
        let mut cache = PairCache::new();
        assert_eq!(cache.insert(5, 2, 40u16), None);
        assert_eq!(cache.get(2, 5), Some(40));
        assert_eq!(cache.get(5, 2), Some(40));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn ordered_keys_are_distinct() {
        let mut cache = PairCache::with_order(PairOrder::Ordered);
        cache.insert(5, 2, 1u16);
        assert_eq!(cache.get(2, 5), None);
        cache.insert(2, 5, 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn derive_runs_once_per_pair() {
        let mut cache = PairCache::new();
        let mut calls = 0;
        for (a, b) in [(0, 1), (1, 0), (0, 1), (1, 2)] {
            cache.get_or_insert_with(a, b, || {
                calls += 1;
                calls
            });
        }
        assert_eq!(calls, 2);
        assert_eq!(cache.get(1, 0), Some(1));
        assert_eq!(cache.get(2, 1), Some(2));
    }

    #[test]
    fn failed_derivation_stores_nothing() {
        let mut cache: PairCache<u16> = PairCache::new();
        let result: Result<u16, &str> = cache.get_or_try_insert_with(1, 2, || Err("full"));
        assert_eq!(result, Err("full"));
        assert!(cache.is_empty());

        let result: Result<u16, &str> = cache.get_or_try_insert_with(2, 1, || Ok(9));
        assert_eq!(result, Ok(9));
        assert_eq!(cache.get(1, 2), Some(9));
    }

    #[test]
    fn clear_empties_the_cache() {
        let mut cache = PairCache::new();
        cache.insert(1, 2, 3u16);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(1, 2), None);
    }
}
