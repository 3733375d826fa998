//! Backend-local LIMIT registry: the query planner stores the number of
//! rows it actually wants from one index scan here so the scan driver can
//! push it down into the scorer instead of materializing every match.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::core::types::IndexId;

thread_local! {
    static LIMITS: RefCell<HashMap<IndexId, usize>> = RefCell::new(HashMap::new());
}

pub struct LimitRegistry;

impl LimitRegistry {
    pub fn set(index_id: IndexId, limit: usize) {
        LIMITS.with(|l| l.borrow_mut().insert(index_id, limit));
    }

    pub fn take(index_id: IndexId) -> Option<usize> {
        LIMITS.with(|l| l.borrow_mut().remove(&index_id))
    }

    pub fn clear(index_id: IndexId) {
        LIMITS.with(|l| l.borrow_mut().remove(&index_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_take_round_trips_once() {
        let id = IndexId(1);
        LimitRegistry::set(id, 25);
        assert_eq!(LimitRegistry::take(id), Some(25));
        assert_eq!(LimitRegistry::take(id), None);
    }
}
