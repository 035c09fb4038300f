// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Current / duty-cycle power mapping for the heater element.
//!
//! The power controller takes 10-92% PWM for 0-3000 W, but the element only
//! operates from about 45 W upwards (roughly 12% PWM). Below that the duty
//! cycle is pinned to the minimum; above the rated power it saturates.

/// Mains voltage used to convert between current and power.
pub const VOLTAGE: f64 = 230.0;

/// Lowest duty cycle the controller accepts, in percent. Means "off".
pub const MIN_PWM: f64 = 10.0;
/// Highest duty cycle, in percent. Full rated power.
pub const MAX_PWM: f64 = 92.0;

/// Smallest power at which the element actually starts heating.
pub const START_W: f64 = 45.0;
pub const MIN_W: f64 = 0.0;
pub const MAX_W: f64 = 3000.0;

pub const MIN_A: f64 = 0.0;
/// Rated current, about 13.04 A.
pub const MAX_A: f64 = MAX_W / VOLTAGE;
/// Current corresponding to [`START_W`].
pub const START_A: f64 = START_W / VOLTAGE;

/// Map a requested current (amperes) to a duty cycle in percent.
///
/// - At or below [`START_A`]: [`MIN_PWM`]
/// - Above [`MAX_A`]: [`MAX_PWM`]
/// - In between: linear interpolation over `[MIN_A, MAX_A]`
pub fn current_to_pwm(current: f64) -> f64 {
    if current <= START_A {
        return MIN_PWM;
    }
    if current > MAX_A {
        return MAX_PWM;
    }

    MIN_PWM + (MAX_PWM - MIN_PWM) / (MAX_A - MIN_A) * (current - MIN_A)
}

/// Estimate the delivered power (watts) for a duty cycle in percent.
///
/// Returns 0 inside the dead zone below [`START_W`].
pub fn pwm_to_watt(duty: f64) -> i64 {
    let watt = MIN_W + (MAX_W - MIN_W) / (MAX_PWM - MIN_PWM) * (duty - MIN_PWM);
    if watt < START_W {
        return 0;
    }
    watt as i64
}
