//! Per-retention-policy batch accumulation.

use std::collections::HashMap;
use std::sync::Arc;

use migrate_core::OutputPoint;

/// Points bound for one retention policy.
#[derive(Debug)]
pub struct Batch {
    policy: Arc<str>,
    points: Vec<OutputPoint>,
}

impl Batch {
    pub fn new(policy: impl Into<Arc<str>>) -> Self {
        Self {
            policy: policy.into(),
            points: Vec::new(),
        }
    }

    /// Target retention policy; empty means the database default.
    pub fn policy(&self) -> &str {
        &self.policy
    }

    pub fn push(&mut self, point: OutputPoint) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[OutputPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<OutputPoint> {
        self.points
    }
}

/// One batch per known retention policy.
///
/// Points for a policy that was not seeded go to the default policy's batch.
#[derive(Debug)]
pub struct BatchSet {
    batches: HashMap<Arc<str>, Batch>,
    default_policy: Arc<str>,
}

impl BatchSet {
    /// Seeds one empty batch per policy plus one for `default_policy`.
    pub fn new<S: AsRef<str>>(policies: &[S], default_policy: &str) -> Self {
        let default_policy: Arc<str> = default_policy.into();
        let mut batches = HashMap::with_capacity(policies.len() + 1);
        for policy in policies
            .iter()
            .map(|p| Arc::<str>::from(p.as_ref()))
            .chain(std::iter::once(default_policy.clone()))
        {
            batches
                .entry(policy.clone())
                .or_insert_with(|| Batch::new(policy));
        }
        Self {
            batches,
            default_policy,
        }
    }

    /// Seeded policy names, sorted.
    pub fn policies(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.batches.keys().map(|k| &**k).collect();
        names.sort_unstable();
        names
    }

    /// Route a point to its policy's batch, or the default batch.
    pub fn push(&mut self, point: OutputPoint) {
        let key = if self.batches.contains_key(&*point.retention_policy) {
            point.retention_policy.clone()
        } else {
            self.default_policy.clone()
        };
        self.batches
            .entry(key)
            .or_insert_with_key(|k| Batch::new(k.clone()))
            .push(point);
    }

    /// Move out every non-empty batch, leaving fresh empty ones in place.
    ///
    /// Batches come back sorted by policy.
    pub fn take_all(&mut self) -> Vec<Batch> {
        let fresh = self
            .batches
            .keys()
            .map(|k| (k.clone(), Batch::new(k.clone())))
            .collect();
        let taken = std::mem::replace(&mut self.batches, fresh);

        let mut batches: Vec<Batch> = taken.into_values().filter(|b| !b.is_empty()).collect();
        batches.sort_unstable_by(|a, b| a.policy.cmp(&b.policy));
        batches
    }
}
