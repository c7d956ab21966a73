//! Memoize compiled join plans by a structural fingerprint.
//!
//! Compiling the same criteria against the same model yields the same
//! plan, so repeated queries skip the planner entirely. The cache is the
//! one shared-mutable piece of the compiler: lookups may race with
//! inserts, and concurrent identical requests may each compile once, but
//! the first written plan wins and everyone shares it afterward.

use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;

use query_engine_compiler::compiler::criteria::Criteria;

use crate::joins::convert::JoinPlan;

/// A bounded cache of compiled join plans. Oldest entries are evicted
/// when the capacity is reached.
pub struct QueryCache {
    capacity: usize,
    plans: RwLock<IndexMap<String, Arc<JoinPlan>>>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> QueryCache {
        QueryCache {
            capacity: capacity.max(1),
            plans: RwLock::new(IndexMap::new()),
        }
    }

    /// The structural fingerprint of a query: model identity plus the
    /// full serialized criteria, values included, since compiled
    /// statements embed their literals. Kept as a string key so hits are
    /// decided by equality, never by a digest that could collide.
    pub fn fingerprint(model: &str, criteria: &Criteria) -> String {
        let serialized = serde_json::to_string(criteria)
            .unwrap_or_else(|_| format!("{criteria:?}"));
        format!("{model}:{serialized}")
    }

    pub fn get(&self, fingerprint: &str) -> Option<Arc<JoinPlan>> {
        let plans = self.plans.read().unwrap_or_else(PoisonError::into_inner);
        let plan = plans.get(fingerprint).cloned();
        tracing::debug!(fingerprint, hit = plan.is_some(), "plan cache lookup");
        plan
    }

    /// Store a plan, returning the cached copy. If another caller raced
    /// in first, their plan wins and is returned instead.
    pub fn insert(&self, fingerprint: String, plan: JoinPlan) -> Arc<JoinPlan> {
        let mut plans = self.plans.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = plans.get(&fingerprint) {
            return Arc::clone(existing);
        }
        while plans.len() >= self.capacity {
            plans.shift_remove_index(0);
        }
        let plan = Arc::new(plan);
        plans.insert(fingerprint, Arc::clone(&plan));
        plan
    }

    /// Drop every cached plan, e.g. after a schema change.
    pub fn invalidate(&self) {
        let mut plans = self.plans.write().unwrap_or_else(PoisonError::into_inner);
        plans.clear();
    }

    pub fn len(&self) -> usize {
        let plans = self.plans.read().unwrap_or_else(PoisonError::into_inner);
        plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
