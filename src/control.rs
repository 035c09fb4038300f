// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Periodic control loop.
//!
//! Each tick reads the sensor, decides whether to heat, maps the effective
//! current to a duty cycle and pushes it to the output. The decision and all
//! state writes happen under one lock; sensor and hardware I/O do not.

use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::{self, Duration, MissedTickBehavior};

use crate::heating::{self, HeatingInputs, Transition};
use crate::power::{self, MIN_PWM};
use crate::pwm::{Hardware, HardwareMode};
use crate::sensor::TemperatureSource;
use crate::state::SharedState;

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub heating: bool,
    pub transition: Option<Transition>,
    /// Current fed to the element (0 when not heating).
    pub current: f64,
    pub pwm: f64,
    pub temp: f64,
    pub temp_outdated: bool,
}

pub struct ControlLoop {
    state: SharedState,
    source: Box<dyn TemperatureSource>,
    hardware: Hardware,
    period: Duration,
}

impl ControlLoop {
    pub fn new(
        state: SharedState,
        source: Box<dyn TemperatureSource>,
        hardware: Hardware,
        period: Duration,
    ) -> Self {
        Self {
            state,
            source,
            hardware,
            period,
        }
    }

    /// Run a single decision cycle.
    pub async fn tick(&self) -> TickReport {
        let previous = self.state.with(|st| st.temp).await;
        let reading = self.source.read(previous);
        let enable_offset = self.state.enable_offset();

        let report = self
            .state
            .with(|st| {
                st.temp = reading.temp;
                st.temp_outdated = reading.stale;

                let inputs = HeatingInputs {
                    heating: st.heating,
                    enabled: st.enabled,
                    temp_outdated: st.temp_outdated,
                    temp: st.temp,
                    max_temp: st.max_temp,
                    enable_offset,
                };
                let transition = heating::evaluate(&inputs);
                st.heating = heating::apply(st.heating, transition);

                let current = heating::effective_current(st.heating, st.requested_current);
                st.pwm = power::current_to_pwm(current);

                TickReport {
                    heating: st.heating,
                    transition,
                    current,
                    pwm: st.pwm,
                    temp: st.temp,
                    temp_outdated: st.temp_outdated,
                }
            })
            .await;

        if let Some(t) = report.transition {
            log::info!("{t}");
        }

        match self.hardware.mode() {
            HardwareMode::Attached => log::info!(
                "pwm: {:.2}, current: {:.2}, temp: {:.2}, heating: {}",
                report.pwm,
                report.current,
                report.temp,
                report.heating
            ),
            HardwareMode::Unavailable => log::debug!(
                "simulated pwm: {:.2}, current: {:.2}, temp: {:.2}, heating: {}",
                report.pwm,
                report.current,
                report.temp,
                report.heating
            ),
        }
        if let Err(e) = self.hardware.set_duty(report.pwm) {
            log::error!("Failed to write duty cycle: {e}");
        }

        report
    }

    /// Tick every period until `shutdown` is notified, then switch the
    /// output off.
    pub async fn run(self, shutdown: Arc<Notify>) {
        let stop = shutdown.notified();
        tokio::pin!(stop);

        let mut interval = time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = &mut stop => {
                    break;
                }
            }
        }

        self.state
            .with(|st| {
                st.heating = false;
                st.pwm = MIN_PWM;
            })
            .await;
        self.hardware.shut_off(MIN_PWM);
        log::info!("Control loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{self, Request, Response};
    use crate::power::current_to_pwm;
    use crate::pwm::PwmOutput;
    use crate::sensor::{FileTemperatureSource, Reading};
    use crate::state::SystemState;
    use std::io;
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Records every duty cycle written.
    #[derive(Default)]
    struct Recorder {
        duties: StdMutex<Vec<f64>>,
        disabled: AtomicBool,
    }

    impl PwmOutput for Arc<Recorder> {
        fn set_duty(&self, percent: f64) -> io::Result<()> {
            self.duties.lock().unwrap().push(percent);
            Ok(())
        }

        fn disable(&self) -> io::Result<()> {
            self.disabled.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Fails every write, counting attempts.
    #[derive(Default)]
    struct BrokenOutput {
        attempts: AtomicUsize,
    }

    impl PwmOutput for Arc<BrokenOutput> {
        fn set_duty(&self, _percent: f64) -> io::Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "duty_cycle not writable"))
        }

        fn disable(&self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "enable not writable"))
        }
    }

    struct FixedSource(Reading);

    impl TemperatureSource for FixedSource {
        fn read(&self, _previous: f64) -> Reading {
            self.0
        }
    }

    /// Alternates between a cold fresh reading and a failed read.
    #[derive(Default)]
    struct FlakySource(AtomicUsize);

    impl TemperatureSource for FlakySource {
        fn read(&self, previous: f64) -> Reading {
            if self.0.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                Reading { temp: 20.0, stale: false }
            } else {
                Reading { temp: previous, stale: true }
            }
        }
    }

    fn shared(hardware: HardwareMode) -> SharedState {
        SharedState::new(SystemState::new(60.0), 5.0, hardware)
    }

    fn scratch_sensor(name: &str, contents: Option<&str>) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "aton-heater-control-{}-{name}.txt",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        if let Some(c) = contents {
            std::fs::write(&path, c).unwrap();
        }
        path
    }

    async fn status(state: &SharedState) -> String {
        match api::handle(Request::GetState, state).await {
            Response::State(report) => report.status,
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fresh_cold_reading_starts_heating() {
        let path = scratch_sensor("cold", Some("54.0\n"));
        let state = shared(HardwareMode::Attached);
        state.set_enabled(true).await;
        state.set_requested_current(10.0).await;

        let recorder = Arc::new(Recorder::default());
        let control = ControlLoop::new(
            state.clone(),
            Box::new(FileTemperatureSource::new(&path, Duration::from_secs(300))),
            Hardware::Attached(Box::new(recorder.clone())),
            Duration::from_secs(10),
        );

        let report = control.tick().await;
        assert!(report.heating);
        assert_eq!(report.transition, Some(Transition::BelowThreshold));

        let st = state.snapshot().await;
        assert!(st.heating);
        assert!(!st.temp_outdated);
        assert_eq!(st.temp, 54.0);
        assert_eq!(st.pwm, current_to_pwm(10.0));
        assert_eq!(status(&state).await, "C");
        assert_eq!(*recorder.duties.lock().unwrap(), vec![current_to_pwm(10.0)]);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_unreadable_sensor_forces_off() {
        let path = scratch_sensor("missing", None);
        let state = shared(HardwareMode::Unavailable);
        state
            .with(|st| {
                st.enabled = true;
                st.heating = true;
                st.temp_outdated = false;
                st.temp = 45.0;
                st.requested_current = 10.0;
            })
            .await;

        let control = ControlLoop::new(
            state.clone(),
            Box::new(FileTemperatureSource::new(&path, Duration::from_secs(300))),
            Hardware::Unavailable,
            Duration::from_secs(10),
        );

        let report = control.tick().await;
        assert_eq!(report.transition, Some(Transition::TempOutdated));

        let st = state.snapshot().await;
        assert!(st.temp_outdated);
        assert!(!st.heating);
        // previous value kept on failure
        assert_eq!(st.temp, 45.0);
        assert_eq!(st.pwm, MIN_PWM);
        assert_eq!(status(&state).await, "F");
    }

    #[tokio::test]
    async fn test_not_heating_pins_min_pwm_whatever_requested() {
        let state = shared(HardwareMode::Unavailable);
        state.set_requested_current(12.0).await;
        let control = ControlLoop::new(
            state.clone(),
            Box::new(FixedSource(Reading { temp: 20.0, stale: false })),
            Hardware::Unavailable,
            Duration::from_secs(10),
        );

        // not enabled, so no heating
        let report = control.tick().await;
        assert!(!report.heating);
        assert_eq!(report.current, 0.0);
        assert_eq!(report.pwm, MIN_PWM);
        assert_eq!(status(&state).await, "B");
    }

    #[tokio::test]
    async fn test_request_change_applies_next_tick() {
        let state = shared(HardwareMode::Unavailable);
        state.set_enabled(true).await;
        state.set_requested_current(5.0).await;
        let control = ControlLoop::new(
            state.clone(),
            Box::new(FixedSource(Reading { temp: 30.0, stale: false })),
            Hardware::Unavailable,
            Duration::from_secs(10),
        );

        control.tick().await;
        assert_eq!(state.snapshot().await.pwm, current_to_pwm(5.0));

        state.set_requested_current(40.0).await;
        assert_eq!(state.snapshot().await.pwm, current_to_pwm(5.0));

        control.tick().await;
        assert_eq!(state.snapshot().await.pwm, power::MAX_PWM);
    }

    #[tokio::test]
    async fn test_hysteresis_over_ticks() {
        let state = shared(HardwareMode::Unavailable);
        state.set_enabled(true).await;
        state.set_requested_current(10.0).await;

        let temps = [50.0, 58.0, 61.0, 57.0, 54.0];
        let expected = [true, true, false, false, true];
        for (temp, want) in temps.into_iter().zip(expected) {
            let control = ControlLoop::new(
                state.clone(),
                Box::new(FixedSource(Reading { temp, stale: false })),
                Hardware::Unavailable,
                Duration::from_secs(10),
            );
            assert_eq!(control.tick().await.heating, want, "at {temp}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_snapshots_never_mix_ticks() {
        let state = shared(HardwareMode::Unavailable);
        state.set_enabled(true).await;
        state.set_requested_current(10.0).await;

        let control = Arc::new(ControlLoop::new(
            state.clone(),
            Box::new(FlakySource::default()),
            Hardware::Unavailable,
            Duration::from_secs(10),
        ));

        let ticker = {
            let control = control.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    control.tick().await;
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let state = state.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..500 {
                    let st = state.snapshot().await;
                    let current = heating::effective_current(st.heating, st.requested_current);
                    assert_eq!(st.pwm, current_to_pwm(current));
                    if st.heating {
                        assert!(!st.temp_outdated);
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }

        ticker.await.unwrap();
        for r in readers {
            r.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_write_failure_still_updates_state() {
        let state = shared(HardwareMode::Attached);
        state.set_enabled(true).await;
        state.set_requested_current(10.0).await;

        let output = Arc::new(BrokenOutput::default());
        let control = ControlLoop::new(
            state.clone(),
            Box::new(FlakySource::default()),
            Hardware::Attached(Box::new(output.clone())),
            Duration::from_secs(10),
        );

        // fresh cold reading: starts heating
        let report = control.tick().await;
        assert!(report.heating);
        let st = state.snapshot().await;
        assert!(st.heating);
        assert_eq!(st.pwm, current_to_pwm(10.0));

        // failed read: forced off
        let report = control.tick().await;
        assert!(!report.heating);
        let st = state.snapshot().await;
        assert!(!st.heating);
        assert!(st.temp_outdated);
        assert_eq!(st.pwm, MIN_PWM);

        assert_eq!(output.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_keeps_ticking_after_write_failures() {
        let state = shared(HardwareMode::Attached);
        let output = Arc::new(BrokenOutput::default());
        let control = ControlLoop::new(
            state.clone(),
            Box::new(FixedSource(Reading { temp: 30.0, stale: false })),
            Hardware::Attached(Box::new(output.clone())),
            Duration::from_millis(10),
        );

        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(control.run(shutdown.clone()));

        time::sleep(Duration::from_millis(60)).await;
        shutdown.notify_waiters();
        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("control loop did not stop")
            .unwrap();

        // ticks plus the final switch-off attempt
        assert!(output.attempts.load(Ordering::SeqCst) >= 3);
        let st = state.snapshot().await;
        assert_eq!(st.temp, 30.0);
        assert!(!st.temp_outdated);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_and_switches_off() {
        let state = shared(HardwareMode::Attached);
        state.set_enabled(true).await;
        state.set_requested_current(10.0).await;

        let recorder = Arc::new(Recorder::default());
        let control = ControlLoop::new(
            state.clone(),
            Box::new(FixedSource(Reading { temp: 20.0, stale: false })),
            Hardware::Attached(Box::new(recorder.clone())),
            Duration::from_millis(10),
        );

        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(control.run(shutdown.clone()));

        time::sleep(Duration::from_millis(50)).await;
        shutdown.notify_waiters();
        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("control loop did not stop")
            .unwrap();

        let duties = recorder.duties.lock().unwrap().clone();
        assert!(duties.len() >= 2);
        assert_eq!(duties[0], current_to_pwm(10.0));
        assert_eq!(*duties.last().unwrap(), MIN_PWM);
        assert!(recorder.disabled.load(Ordering::SeqCst));

        let st = state.snapshot().await;
        assert!(!st.heating);
        assert_eq!(st.pwm, MIN_PWM);
    }
}
