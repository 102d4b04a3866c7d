//! Desktop counterpart to the m2x_telemetry board example.
//!
//! Listens for M2X API requests and keeps what it receives in memory, so the
//! board's client can be exercised without the real service. Point the
//! firmware at this machine with `M2X_HOST_ADDR=<this address>` and the port
//! given here (default 8080).
//!
//! The program prompts for the API key to require; leave it blank to accept
//! any key.

use std::env;
use std::error::Error;
use std::net::TcpListener;
use std::sync::Arc;

use chrono::Utc;
use m2x_sink::{run, Sink};
use rpassword::prompt_password;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let addr = env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let key = prompt_password("M2X API key (leave blank to accept any): ")?;

    let listener = TcpListener::bind(&addr)?;
    println!(
        "{} listening on {} ({})",
        Utc::now().format("%Y-%m-%d %H:%M:%S"),
        listener.local_addr()?,
        if key.is_empty() { "any key" } else { "key required" }
    );

    run(listener, Arc::new(Sink::new(key))).await?;
    Ok(())
}
