// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Control API semantics, independent of the HTTP transport.
//!
//! Mutation endpoints take a plain-text body (`POST /current 0-13`,
//! `POST /maxtemp 0-100`, `POST /enable true|false`). `GET /state` returns
//! a JSON [`StateReport`].

use serde::{Deserialize, Serialize};

use crate::power;
use crate::pwm::HardwareMode;
use crate::state::{SharedState, SystemState};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request {
    /// Set the requested current in amperes.
    SetCurrent(f64),
    /// Set the ceiling temperature.
    SetMaxTemp(f64),
    /// Enable or disable heating.
    SetEnabled(bool),
    /// Query a state snapshot.
    GetState,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Mutation applied.
    Ok,
    /// State snapshot.
    State(StateReport),
    /// Malformed body.
    BadRequest(String),
    MethodNotAllowed,
    NotFound,
}

impl Response {
    pub fn status_code(&self) -> u16 {
        match self {
            Response::Ok | Response::State(_) => 200,
            Response::BadRequest(_) => 400,
            Response::MethodNotAllowed => 405,
            Response::NotFound => 404,
        }
    }
}

/// Body of `GET /state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateReport {
    pub enabled: bool,
    /// Requested current.
    pub current: f64,
    /// Estimated power for the current duty cycle.
    pub watt: i64,
    pub pwm: f64,
    pub temp: f64,
    pub enable_offset: f64,
    pub max_temp: f64,
    pub heating: bool,
    /// `F` outdated temperature, `C` heating, `B` idle.
    pub status: String,
    pub hardware: HardwareMode,
}

impl StateReport {
    pub fn new(st: &SystemState, enable_offset: f64, hardware: HardwareMode) -> Self {
        Self {
            enabled: st.enabled,
            current: st.requested_current,
            watt: power::pwm_to_watt(st.pwm),
            pwm: st.pwm,
            temp: st.temp,
            enable_offset,
            max_temp: st.max_temp,
            heating: st.heating,
            status: status_code(st).to_string(),
            hardware,
        }
    }
}

/// Single-character status, in EVSE terms: error, charging, connected.
pub fn status_code(st: &SystemState) -> &'static str {
    if st.temp_outdated {
        "F"
    } else if st.heating {
        "C"
    } else {
        "B"
    }
}

// ---------------------------------------------------------------------------
// Routing / parsing
// ---------------------------------------------------------------------------

/// Route a request and parse its body.
pub fn parse_request(method: &str, path: &str, body: &str) -> Result<Request, Response> {
    let path = path.split('?').next().unwrap_or(path);

    match path {
        "/current" | "/maxtemp" | "/enable" if method != "POST" => Err(Response::MethodNotAllowed),
        "/state" if method != "GET" => Err(Response::MethodNotAllowed),
        "/current" => parse_float(body).map(Request::SetCurrent),
        "/maxtemp" => parse_float(body).map(Request::SetMaxTemp),
        "/enable" => parse_bool(body).map(Request::SetEnabled),
        "/state" => Ok(Request::GetState),
        _ => Err(Response::NotFound),
    }
}

fn parse_float(body: &str) -> Result<f64, Response> {
    match body.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => {
            log::warn!("body: {body}");
            Err(Response::BadRequest("Error parsing float value".to_string()))
        }
    }
}

fn parse_bool(body: &str) -> Result<bool, Response> {
    match body.trim() {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => {
            log::warn!("body: {body}");
            Err(Response::BadRequest("Error parsing boolean value".to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// Handling
// ---------------------------------------------------------------------------

/// Apply a request to the shared state.
pub async fn handle(req: Request, state: &SharedState) -> Response {
    match req {
        Request::SetCurrent(current) => {
            state.set_requested_current(current).await;
            log::info!("API: requested current: {current:.2}");
            Response::Ok
        }
        Request::SetMaxTemp(max_temp) => {
            state.set_max_temp(max_temp).await;
            log::info!("API: max temp: {max_temp:.2}");
            Response::Ok
        }
        Request::SetEnabled(enabled) => {
            state.set_enabled(enabled).await;
            log::info!("API: enabled: {enabled}");
            Response::Ok
        }
        Request::GetState => {
            let st = state.snapshot().await;
            Response::State(StateReport::new(&st, state.enable_offset(), state.hardware()))
        }
    }
}
