// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Heating decision with asymmetric hysteresis.
//!
//! Heating starts below `max_temp - enable_offset` and stops above
//! `max_temp`. Safety conditions (stale sensor, operator disable) are
//! checked before anything else.

use std::fmt;

/// Inputs to a single heating decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatingInputs {
    /// Output state after the previous tick.
    pub heating: bool,
    pub enabled: bool,
    pub temp_outdated: bool,
    pub temp: f64,
    pub max_temp: f64,
    pub enable_offset: f64,
}

/// Why the heating state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Stopped: sensor reading missing or too old.
    TempOutdated,
    /// Stopped: disabled through the control API.
    DisabledByApi,
    /// Started: fresh reading below the turn-on threshold.
    BelowThreshold,
    /// Stopped: ceiling temperature exceeded.
    MaxTempReached,
}

impl Transition {
    /// Heating state after this transition.
    pub fn heating(self) -> bool {
        matches!(self, Transition::BelowThreshold)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::TempOutdated => write!(f, "heating disabled: temp outdated"),
            Transition::DisabledByApi => write!(f, "heating disabled: disabled by api"),
            Transition::BelowThreshold => write!(f, "heating enabled"),
            Transition::MaxTempReached => write!(f, "heating disabled: max temp reached"),
        }
    }
}

/// Evaluate the transition rules in priority order. `None` means no change.
pub fn evaluate(inputs: &HeatingInputs) -> Option<Transition> {
    let HeatingInputs {
        heating,
        enabled,
        temp_outdated,
        temp,
        max_temp,
        enable_offset,
    } = *inputs;

    if heating && temp_outdated {
        return Some(Transition::TempOutdated);
    }
    if heating && !enabled {
        return Some(Transition::DisabledByApi);
    }
    if !heating && enabled && !temp_outdated && temp < max_temp - enable_offset {
        return Some(Transition::BelowThreshold);
    }
    if heating && temp > max_temp {
        return Some(Transition::MaxTempReached);
    }

    None
}

/// Heating state after `transition`, or `prev` if there is none.
pub fn apply(prev: bool, transition: Option<Transition>) -> bool {
    transition.map_or(prev, Transition::heating)
}

/// Heating state for the next tick.
pub fn next_heating(inputs: &HeatingInputs) -> bool {
    apply(inputs.heating, evaluate(inputs))
}

/// Current actually fed to the element: the request while heating, else 0.
pub fn effective_current(heating: bool, requested_current: f64) -> f64 {
    if heating { requested_current } else { 0.0 }
}
