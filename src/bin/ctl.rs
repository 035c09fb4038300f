// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! atonctl: command-line client for the atond control API.

use aton_heater::api::StateReport;
use aton_heater::http;
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};

/// Default daemon address for local use.
const DEFAULT_ADDR: &str = "127.0.0.1:3000";

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "atonctl", about = "Water heater control client")]
struct Cli {
    /// Daemon address.
    #[arg(short, long, default_value = DEFAULT_ADDR)]
    addr: String,

    /// Print raw JSON for `state`.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the current controller state.
    State,
    /// Request a heating current in amperes.
    Current { amps: f64 },
    /// Set the maximum tank temperature.
    Maxtemp { celsius: f64 },
    /// Enable or disable heating.
    Enable {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let (path, body) = match &cli.command {
        Command::State => {
            return show_state(&cli.addr, cli.json).await;
        }
        Command::Current { amps } => ("/current", amps.to_string()),
        Command::Maxtemp { celsius } => ("/maxtemp", celsius.to_string()),
        Command::Enable { enabled } => ("/enable", enabled.to_string()),
    };

    let (code, reply) = http::send(&cli.addr, "POST", path, &body)
        .await
        .with_context(|| format!("Failed to reach daemon at {}", cli.addr))?;
    if code != 200 {
        bail!("{path} rejected ({code}): {}", reply.trim());
    }
    log::info!("{path} <- {body}");
    Ok(())
}

async fn show_state(addr: &str, json: bool) -> anyhow::Result<()> {
    let (code, body) = http::send(addr, "GET", "/state", "")
        .await
        .with_context(|| format!("Failed to reach daemon at {addr}"))?;
    if code != 200 {
        bail!("/state failed ({code}): {}", body.trim());
    }
    if json {
        println!("{body}");
        return Ok(());
    }

    let st: StateReport = serde_json::from_str(&body).context("Invalid state response")?;
    let status = match st.status.as_str() {
        "F" => "temperature outdated",
        "C" => "heating",
        _ => "idle",
    };
    println!("status:        {} ({status})", st.status);
    println!("enabled:       {}", st.enabled);
    println!("heating:       {}", st.heating);
    println!("temperature:   {:.1} C", st.temp);
    println!(
        "thresholds:    on below {:.1} C, off above {:.1} C",
        st.max_temp - st.enable_offset,
        st.max_temp
    );
    println!("requested:     {:.2} A", st.current);
    println!("output:        {:.2}% PWM, ~{} W", st.pwm, st.watt);
    println!("hardware:      {:?}", st.hardware);
    Ok(())
}
