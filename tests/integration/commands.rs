use crate::*;
use serde_json::json;

#[tokio::test]
async fn unlock_reaches_only_the_target() -> Result<()> {
    let daemon = Daemon::start().await?;
    let mut a = FakeLock::online(&daemon, "AA").await?;
    let mut b = FakeLock::online(&daemon, "BB").await?;

    let (code, body) = daemon
        .post("/devices/AA/command", json!({ "command": "UNLOCK" }))
        .await?;
    assert_eq!(code, 200);
    assert_eq!(body["status"], "UNLOCKED");

    assert_eq!(
        a.recv().await?,
        json!({ "macAddress": "AA", "command": "UNLOCK" })
    );
    assert!(b.stays_quiet(Duration::from_millis(200)).await);

    assert_eq!(
        daemon.record("AA").context("record missing")?.status,
        lockd_core::LockStatus::Unlocked
    );
    assert_eq!(
        daemon.record("BB").context("record missing")?.status,
        lockd_core::LockStatus::Locked
    );
    Ok(())
}

#[tokio::test]
async fn offline_device_is_unreachable() -> Result<()> {
    let daemon = Daemon::start().await?;
    let lock = FakeLock::online(&daemon, "AA").await?;
    lock.hang_up().await;
    let registry = daemon.registry.clone();
    assert!(wait_until(RECV_TIMEOUT, || registry.lookup("AA").is_none()).await);
    let before = daemon.record("AA");

    let (code, _) = daemon
        .post("/devices/AA/command", json!({ "command": "UNLOCK" }))
        .await?;
    assert_eq!(code, 409);
    assert_eq!(daemon.record("AA"), before);

    let (code, _) = daemon
        .post("/devices/ZZ/command", json!({ "command": "LOCK" }))
        .await?;
    assert_eq!(code, 409);
    Ok(())
}

#[tokio::test]
async fn newest_connection_receives_commands() -> Result<()> {
    let daemon = Daemon::start().await?;
    let mut old = FakeLock::online(&daemon, "AA").await?;
    let mut new = FakeLock::online(&daemon, "AA").await?;

    let (code, _) = daemon
        .post("/devices/AA/command", json!({ "command": "LOCK" }))
        .await?;
    assert_eq!(code, 200);

    assert_eq!(new.recv().await?, json!({ "macAddress": "AA", "command": "LOCK" }));
    assert!(old.stays_quiet(Duration::from_millis(200)).await);
    Ok(())
}

#[tokio::test]
async fn device_report_updates_status() -> Result<()> {
    let daemon = Daemon::start().await?;
    let mut lock = FakeLock::online(&daemon, "AA").await?;

    lock.send(json!({ "macAddress": "AA", "command": "UNLOCK" }))
        .await?;

    let directory = daemon.directory.clone();
    assert!(
        wait_until(RECV_TIMEOUT, || {
            matches!(
                directory.find("AA"),
                Ok(Some(r)) if r.status == lockd_core::LockStatus::Unlocked
            )
        })
        .await
    );
    Ok(())
}

#[tokio::test]
async fn rename_shows_in_listing() -> Result<()> {
    let daemon = Daemon::start().await?;
    let _lock = FakeLock::online(&daemon, "AA").await?;

    let (code, _) = daemon
        .post("/devices/AA/name", json!({ "name": "Front Door" }))
        .await?;
    assert_eq!(code, 200);

    let (_, body) = daemon.get("/devices").await?;
    assert_eq!(body["devices"][0]["name"], "Front Door");

    let (code, _) = daemon
        .post("/devices/ZZ/name", json!({ "name": "Nowhere" }))
        .await?;
    assert_eq!(code, 404);
    Ok(())
}
