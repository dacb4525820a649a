//! Device listing and command subcommands.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::http::{base_url, delete_json, device_url, get_json, post_json_body};

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct DevicesResponse {
    devices: Vec<DeviceInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceInfo {
    id: String,
    mac_address: String,
    name: String,
    status: String,
    last_seen: u64,
    connected: bool,
}

#[derive(Serialize)]
struct CommandRequest<'a> {
    command: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandResponse {
    mac_address: String,
    status: String,
}

#[derive(Serialize)]
struct RenameRequest<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameResponse {
    mac_address: String,
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveResponse {
    mac_address: String,
    removed: bool,
}

fn seen_ago(last_seen_ms: u64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    format!("{}s ago", now.saturating_sub(last_seen_ms) / 1000)
}

fn print_device(d: &DeviceInfo) {
    let icon = if d.connected { "●" } else { "○" };
    println!("  ┌─ {} {}", icon, d.name);
    println!("  │  address   : {}", d.mac_address);
    println!("  │  id        : {}", d.id);
    println!("  │  status    : {}", d.status);
    println!("  └─ last seen : {}", seen_ago(d.last_seen));
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_devices(port: u16) -> Result<()> {
    let resp: DevicesResponse = get_json(&format!("{}/devices", base_url(port))).await?;

    if resp.devices.is_empty() {
        println!("No locks registered yet.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Locks ({})", resp.devices.len());
    println!("═══════════════════════════════════════");
    for d in &resp.devices {
        print_device(d);
    }
    Ok(())
}

pub async fn cmd_device(port: u16, address: &str) -> Result<()> {
    let d: DeviceInfo = get_json(&device_url(port, address, None)?).await?;
    print_device(&d);
    Ok(())
}

/// `command` is `LOCK` or `UNLOCK`.
pub async fn cmd_command(port: u16, address: &str, command: &str) -> Result<()> {
    let resp: CommandResponse = post_json_body(
        &device_url(port, address, Some("command"))?,
        &CommandRequest { command },
    )
    .await?;
    println!("{} → {}", resp.mac_address, resp.status);
    Ok(())
}

pub async fn cmd_rename(port: u16, address: &str, name: &str) -> Result<()> {
    let resp: RenameResponse =
        post_json_body(&device_url(port, address, Some("name"))?, &RenameRequest { name }).await?;
    println!("{} renamed to \"{}\"", resp.mac_address, resp.name);
    Ok(())
}

pub async fn cmd_remove(port: u16, address: &str) -> Result<()> {
    let resp: RemoveResponse = delete_json(&device_url(port, address, None)?).await?;
    if resp.removed {
        println!("{} removed.", resp.mac_address);
    } else {
        println!("{} was not registered.", resp.mac_address);
    }
    Ok(())
}
