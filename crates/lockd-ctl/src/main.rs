//! lockd-ctl — command-line interface for the lockd daemon.

mod cmd;

use anyhow::{Context, Result};

const DEFAULT_PORT: u16 = 9001;

fn print_usage() {
    println!("Usage: lockd-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status                  Show connection and directory counts");
    println!("  devices                 List registered locks");
    println!("  device <addr>           Show one lock");
    println!("  lock <addr>             Send LOCK to a connected lock");
    println!("  unlock <addr>           Send UNLOCK to a connected lock");
    println!("  rename <addr> <name>    Set a lock's display name");
    println!("  remove <addr>           Disconnect and forget a lock");
    println!();
    println!("Options:");
    println!("  --port <port>   API port (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => cmd::status::cmd_status(port).await,
        ["devices"] => cmd::devices::cmd_devices(port).await,
        ["device", addr] => cmd::devices::cmd_device(port, addr).await,
        ["lock", addr] => cmd::devices::cmd_command(port, addr, "LOCK").await,
        ["unlock", addr] => cmd::devices::cmd_command(port, addr, "UNLOCK").await,
        ["rename", addr, name @ ..] if !name.is_empty() => {
            cmd::devices::cmd_rename(port, addr, &name.join(" ")).await
        }
        ["remove", addr] => cmd::devices::cmd_remove(port, addr).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
