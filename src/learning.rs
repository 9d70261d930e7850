use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target and rate of a single associative update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub target: f64,
    pub rate: f64,
}

impl Signal {
    pub fn new(target: f64, rate: f64) -> Self {
        Self { target, rate }
    }
}

/// Capability of an association engine.
pub trait Associator {
    /// Fold `signal` into the state and return the new recalled value.
    fn update(&mut self, signal: Signal) -> Result<f64>;

    /// Current state.
    fn recall(&self) -> f64;

    /// Disagreement between the current state and `other`.
    fn tension(&self, other: f64) -> f64;

    /// Force the recalled state to `value`.
    fn settle(&mut self, value: f64);
}

/// `current + rate * (target - current)`, clamped to `[0, 1]`.
pub fn interpolate(current: f64, signal: Signal) -> f64 {
    clamp_unit(current + signal.rate * (signal.target - current))
}

/// Clamp into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(val: f64) -> f64 {
    if val.is_nan() {
        return 0.0;
    }
    val.clamp(0.0, 1.0)
}

/// Apply `signal` to `assoc`, falling back to [`interpolate`] when the
/// engine errors or produces a value outside `[0, 1]`.
pub fn reinforce<A: Associator + ?Sized>(assoc: &mut A, signal: Signal) -> f64 {
    let prior = assoc.recall();
    let fallback = |reason: &dyn fmt::Display| {
        log::warn!("associator update failed ({reason}), interpolating instead");
        interpolate(prior, signal)
    };

    let val = match assoc.update(signal) {
        Ok(val) if (0.0..=1.0).contains(&val) => return val,
        Ok(val) => fallback(&format_args!("value {val} out of range")),
        Err(error) => fallback(&format_args!("{error:#}")),
    };
    assoc.settle(val);
    val
}

/// Placeholder association: exponential interpolation toward each target.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Trace(f64);

impl Trace {
    pub fn new(val: f64) -> Self {
        Self(clamp_unit(val))
    }
}

impl Associator for Trace {
    fn update(&mut self, signal: Signal) -> Result<f64> {
        if !signal.target.is_finite() || !signal.rate.is_finite() {
            bail!("non-finite signal {signal:?}");
        }
        self.0 = interpolate(self.0, signal);
        Ok(self.0)
    }

    fn recall(&self) -> f64 {
        self.0
    }

    fn tension(&self, other: f64) -> f64 {
        (self.0 - other).abs()
    }

    fn settle(&mut self, value: f64) {
        self.0 = clamp_unit(value);
    }
}
