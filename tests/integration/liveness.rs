use crate::*;
use serde_json::json;

const HEARTBEAT: Duration = Duration::from_millis(300);

/// Answer every ping for `windows` heartbeat periods.
async fn answer_pings(lock: &mut FakeLock, mac: &str, windows: u32) -> Result<u32> {
    let deadline = tokio::time::Instant::now() + HEARTBEAT * windows;
    let mut answered = 0;
    while tokio::time::Instant::now() < deadline {
        let remaining = deadline - tokio::time::Instant::now();
        match tokio::time::timeout(remaining, lock.recv()).await {
            Ok(Ok(frame)) if frame == json!({ "request": "PING", "macAddress": mac }) => {
                lock.pong(mac).await?;
                answered += 1;
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => break,
        }
    }
    Ok(answered)
}

#[tokio::test]
async fn responsive_device_stays_connected_silent_one_is_demoted() -> Result<()> {
    let daemon = Daemon::with_heartbeat(HEARTBEAT).await?;
    let mut chatty = FakeLock::online(&daemon, "AA").await?;
    let _silent = FakeLock::online(&daemon, "BB").await?;

    let answered = answer_pings(&mut chatty, "AA", 4).await?;
    assert!(answered >= 2, "only {answered} pings seen");

    assert!(daemon.record("AA").context("record missing")?.connected);
    assert!(!daemon.record("BB").context("record missing")?.connected);
    Ok(())
}

#[tokio::test]
async fn socket_that_vanished_is_demoted() -> Result<()> {
    let daemon = Daemon::with_heartbeat(HEARTBEAT).await?;
    let lock = FakeLock::online(&daemon, "AA").await?;
    lock.hang_up().await;

    let directory = daemon.directory.clone();
    assert!(
        wait_until(HEARTBEAT * 4, || {
            matches!(directory.find("AA"), Ok(Some(r)) if !r.connected)
        })
        .await
    );
    Ok(())
}

#[tokio::test]
async fn pong_after_demotion_restores_connected() -> Result<()> {
    let daemon = Daemon::with_heartbeat(HEARTBEAT).await?;
    let mut lock = FakeLock::online(&daemon, "AA").await?;

    let directory = daemon.directory.clone();
    assert!(
        wait_until(HEARTBEAT * 4, || {
            matches!(directory.find("AA"), Ok(Some(r)) if !r.connected)
        })
        .await
    );

    lock.pong("AA").await?;
    assert!(
        wait_until(RECV_TIMEOUT, || {
            matches!(directory.find("AA"), Ok(Some(r)) if r.connected)
        })
        .await
    );
    Ok(())
}
