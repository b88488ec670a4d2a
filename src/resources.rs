// ==============================================================================
// resources.rs - VESSEL RESOURCE POOLS (FUEL / CHARGE)
// ------------------------------------------------------------------------------
// request() draws up to `amount` and returns what was actually drawn; callers
// that need all-or-nothing semantics refund the partial draw. f64 so a
// request + refund restores the pool bit-exactly.
// ==============================================================================

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub trait ResourcePool {
    /// Draw up to `amount`; returns the amount drawn.
    fn request(&mut self, resource: &str, amount: f64) -> f64;

    fn refund(&mut self, resource: &str, amount: f64);

    fn available(&self, resource: &str) -> f64;
}

/// Named amounts, no capacity limit on refunds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceTank {
    amounts: HashMap<String, f64>,
}

impl ResourceTank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resource: impl Into<String>, amount: f64) -> Self {
        self.set(resource, amount);
        self
    }

    pub fn set(&mut self, resource: impl Into<String>, amount: f64) {
        self.amounts.insert(resource.into(), amount.max(0.0));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.amounts.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl ResourcePool for ResourceTank {
    fn request(&mut self, resource: &str, amount: f64) -> f64 {
        if amount.is_nan() || amount <= 0.0 {
            return 0.0;
        }
        let Some(stored) = self.amounts.get_mut(resource) else { return 0.0 };
        let drawn = amount.min(*stored);
        *stored -= drawn;
        drawn
    }

    fn refund(&mut self, resource: &str, amount: f64) {
        if amount > 0.0 {
            *self.amounts.entry(resource.to_string()).or_insert(0.0) += amount;
        }
    }

    fn available(&self, resource: &str) -> f64 {
        self.amounts.get(resource).copied().unwrap_or(0.0)
    }
}

/// Infinite supply (tests, sandbox vessels).
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

impl ResourcePool for Unlimited {
    fn request(&mut self, _resource: &str, amount: f64) -> f64 {
        amount.max(0.0)
    }

    fn refund(&mut self, _resource: &str, _amount: f64) {}

    fn available(&self, _resource: &str) -> f64 {
        f64::INFINITY
    }
}
