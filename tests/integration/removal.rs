use crate::*;
use serde_json::json;

#[tokio::test]
async fn remove_disconnects_then_deletes() -> Result<()> {
    let daemon = Daemon::start().await?;
    let mut lock = FakeLock::online(&daemon, "AA:BB:CC").await?;

    let (code, body) = daemon.delete("/devices/AA:BB:CC").await?;
    assert_eq!(code, 200);
    assert_eq!(body["removed"], true);

    assert_eq!(
        lock.recv().await?,
        json!({ "macAddress": "AA:BB:CC", "command": "DISCONNECT" })
    );
    assert!(lock.closed().await);

    assert!(daemon.record("AA:BB:CC").is_none());
    assert!(daemon.registry.lookup("AA:BB:CC").is_none());

    let (code, _) = daemon
        .post("/devices/AA:BB:CC/name", json!({ "name": "Gone" }))
        .await?;
    assert_eq!(code, 404);
    Ok(())
}

#[tokio::test]
async fn remove_offline_device() -> Result<()> {
    let daemon = Daemon::start().await?;
    let lock = FakeLock::online(&daemon, "AA").await?;
    lock.hang_up().await;
    let registry = daemon.registry.clone();
    assert!(wait_until(RECV_TIMEOUT, || registry.lookup("AA").is_none()).await);

    let (code, body) = daemon.delete("/devices/AA").await?;
    assert_eq!(code, 200);
    assert_eq!(body["removed"], true);
    assert!(daemon.record("AA").is_none());

    let (code, body) = daemon.delete("/devices/AA").await?;
    assert_eq!(code, 200);
    assert_eq!(body["removed"], false);
    Ok(())
}

#[tokio::test]
async fn removed_device_can_register_again() -> Result<()> {
    let daemon = Daemon::start().await?;
    let lock = FakeLock::online(&daemon, "AA").await?;
    let original = daemon.record("AA").context("record missing")?;

    daemon.delete("/devices/AA").await?;
    drop(lock);

    let _again = FakeLock::online(&daemon, "AA").await?;
    let rec = daemon.record("AA").context("record missing")?;
    assert_ne!(rec.id, original.id);
    assert_eq!(rec.status, lockd_core::LockStatus::Locked);
    Ok(())
}
