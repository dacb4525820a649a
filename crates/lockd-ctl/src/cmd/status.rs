//! Daemon status command.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    connections: usize,
    bound_devices: usize,
    devices: usize,
    connected_devices: usize,
}

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  lockd Status");
    println!("═══════════════════════════════════════");
    println!("  Open sockets      : {}", resp.connections);
    println!("  Identified locks  : {}", resp.bound_devices);
    println!("  Known locks       : {}", resp.devices);
    println!("  Marked connected  : {}", resp.connected_devices);

    let anonymous = resp.connections.saturating_sub(resp.bound_devices);
    if anonymous > 0 {
        println!("\n  {} socket(s) have not announced an address yet.", anonymous);
    }

    Ok(())
}
