// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Water-heater element controller.
//!
//! A background loop samples the tank temperature, applies a hysteresis rule
//! and drives a PWM power controller, while an HTTP API lets an energy
//! manager request current and an operator enable heating.

pub mod api;
pub mod config;
pub mod control;
pub mod heating;
pub mod http;
pub mod power;
pub mod pwm;
pub mod sensor;
pub mod state;
