// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Live controller state shared between the control loop and API handlers.
//!
//! The whole record sits behind one lock. Every read and write goes through
//! a scoped accessor, so a reader always sees the result of a complete tick
//! or a complete API update, never a mix.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::power::MIN_PWM;
use crate::pwm::HardwareMode;

/// The mutable controller record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemState {
    /// Operator intent. Heating may run only while true.
    pub enabled: bool,
    /// Last current request from the energy manager, in amperes. Not range checked.
    pub requested_current: f64,
    /// Ceiling temperature.
    pub max_temp: f64,
    /// Last observed tank temperature.
    pub temp: f64,
    /// Last sample missing, unreadable or too old.
    pub temp_outdated: bool,
    /// Output state, written only by the control loop.
    pub heating: bool,
    /// Last computed duty cycle in percent.
    pub pwm: f64,
}

impl SystemState {
    pub fn new(max_temp: f64) -> Self {
        Self {
            enabled: false,
            requested_current: 0.0,
            max_temp,
            temp: 0.0,
            temp_outdated: true,
            heating: false,
            pwm: MIN_PWM,
        }
    }
}

/// Handle to the shared record plus the settings fixed at startup.
#[derive(Debug, Clone)]
pub struct SharedState {
    inner: Arc<Mutex<SystemState>>,
    enable_offset: f64,
    hardware: HardwareMode,
}

impl SharedState {
    pub fn new(initial: SystemState, enable_offset: f64, hardware: HardwareMode) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
            enable_offset,
            hardware,
        }
    }

    /// Run `f` with exclusive access to the record.
    pub async fn with<R>(&self, f: impl FnOnce(&mut SystemState) -> R) -> R {
        let mut st = self.inner.lock().await;
        f(&mut st)
    }

    /// Copy of the record taken under a single critical section.
    pub async fn snapshot(&self) -> SystemState {
        *self.inner.lock().await
    }

    pub async fn set_requested_current(&self, current: f64) {
        self.with(|st| st.requested_current = current).await;
    }

    pub async fn set_max_temp(&self, max_temp: f64) {
        self.with(|st| st.max_temp = max_temp).await;
    }

    pub async fn set_enabled(&self, enabled: bool) {
        self.with(|st| st.enabled = enabled).await;
    }

    pub fn enable_offset(&self) -> f64 {
        self.enable_offset
    }

    pub fn hardware(&self) -> HardwareMode {
        self.hardware
    }
}
