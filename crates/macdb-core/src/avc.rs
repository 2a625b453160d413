//! Access vector cache.
//!
//! Memoizes authority decisions for (subject, object, class, permission)
//! within a transaction. The whole cache is dropped at every commit and
//! rollback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::authority::PolicyAuthority;
use crate::error::Result;
use crate::label::{LabelId, LabelRegistry};
use crate::object::{ObjectClass, Permission};

/// A cached authority answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny,
}

impl AccessDecision {
    pub fn is_allowed(self) -> bool {
        self == AccessDecision::Allow
    }
}

impl From<bool> for AccessDecision {
    fn from(allowed: bool) -> Self {
        if allowed {
            AccessDecision::Allow
        } else {
            AccessDecision::Deny
        }
    }
}

/// Packed cache key.
///
/// Bits 32..64 hold the subject id, 8..32 the object id, 4..8 the class
/// code and 0..4 the permission code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessKey(u64);

impl AccessKey {
    pub fn new(subject: LabelId, object: LabelId, class: ObjectClass, perm: Permission) -> Self {
        let key = (u64::from(subject.get()) << 32)
            | (u64::from(object.get()) << 8)
            | (u64::from(class.code()) << 4)
            | u64::from(perm.code());
        Self(key)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Cache statistics.
#[derive(Debug, Default)]
pub struct AvcStats {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl AvcStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of `invalidate_all` calls.
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    /// Calculate hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}

/// Per-session decision cache.
pub struct AccessVectorCache {
    entries: HashMap<AccessKey, AccessDecision>,
    stats: AvcStats,
}

impl AccessVectorCache {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            stats: AvcStats::default(),
        }
    }

    /// Cached decision for `key`, if any. Counts a hit or a miss.
    #[inline]
    pub fn lookup(&self, key: AccessKey) -> Option<AccessDecision> {
        match self.entries.get(&key) {
            Some(decision) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(*decision)
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Decide whether `subject` may exercise `perm` on `object`.
    ///
    /// Misses resolve both labels through `registry` and ask `authority`.
    /// A permission the class does not define is denied without asking.
    pub fn decide(
        &mut self,
        subject: LabelId,
        object: LabelId,
        class: ObjectClass,
        perm: Permission,
        registry: &mut LabelRegistry,
        authority: &dyn PolicyAuthority,
    ) -> Result<AccessDecision> {
        if !class.supports(perm) {
            debug!(class = %class, perm = %perm, "permission not defined for class");
            return Ok(AccessDecision::Deny);
        }

        let key = AccessKey::new(subject, object, class, perm);
        if let Some(decision) = self.lookup(key) {
            return Ok(decision);
        }

        let subject_label = registry.label_of(subject)?.clone();
        let object_label = registry.label_of(object)?;
        let decision = AccessDecision::from(authority.check_access(&subject_label, object_label, class, perm));
        debug!(
            subject = %subject_label,
            object = %object_label,
            class = %class,
            perm = %perm,
            ?decision,
            "authority decision"
        );

        self.entries.insert(key, decision);
        Ok(decision)
    }

    /// Drop every cached decision.
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
        self.stats.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> &AvcStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for AccessVectorCache {
    fn default() -> Self {
        Self::new()
    }
}
