use crate::*;
use serde_json::json;

#[tokio::test]
async fn new_socket_is_asked_for_its_address() -> Result<()> {
    let daemon = Daemon::start().await?;
    let mut lock = FakeLock::connect(&daemon).await?;

    assert_eq!(lock.recv().await?, json!({ "request": "SEND_MAC" }));
    assert!(daemon.registry.lookup("AA:BB:CC").is_none());
    assert_eq!(daemon.registry.len(), 1);
    Ok(())
}

#[tokio::test]
async fn first_contact_creates_locked_record() -> Result<()> {
    let daemon = Daemon::start().await?;
    let _lock = FakeLock::online(&daemon, "AA:BB:CC").await?;

    let rec = daemon.record("AA:BB:CC").context("record missing")?;
    assert_eq!(rec.status, lockd_core::LockStatus::Locked);
    assert!(rec.connected);
    assert!(rec.id.starts_with("lock_"));
    assert_eq!(rec.name, format!("Lock_{}", rec.id));

    let (code, body) = daemon.get("/devices/AA:BB:CC").await?;
    assert_eq!(code, 200);
    assert_eq!(body["macAddress"], "AA:BB:CC");
    assert_eq!(body["status"], "LOCKED");
    Ok(())
}

#[tokio::test]
async fn unsolicited_announce_is_accepted() -> Result<()> {
    let daemon = Daemon::start().await?;
    let mut lock = FakeLock::connect(&daemon).await?;

    // Announce before reading the identity request.
    lock.announce("AA").await?;
    let registry = daemon.registry.clone();
    assert!(wait_until(RECV_TIMEOUT, || registry.lookup("AA").is_some()).await);
    assert!(daemon.record("AA").is_some());
    Ok(())
}

#[tokio::test]
async fn reconnect_reuses_the_record() -> Result<()> {
    let daemon = Daemon::start().await?;
    let first = FakeLock::online(&daemon, "AA").await?;
    let original = daemon.record("AA").context("record missing")?;
    first.hang_up().await;

    let registry = daemon.registry.clone();
    assert!(wait_until(RECV_TIMEOUT, || registry.lookup("AA").is_none()).await);
    // Closing a socket unbinds but never deletes.
    assert!(daemon.record("AA").is_some());

    let _second = FakeLock::online(&daemon, "AA").await?;
    let rec = daemon.record("AA").context("record missing")?;
    assert_eq!(rec.id, original.id);
    assert!(rec.last_seen >= original.last_seen);
    assert_eq!(daemon.directory.list()?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn simultaneous_first_contacts_leave_one_record() -> Result<()> {
    let daemon = Daemon::start().await?;

    let mut locks = Vec::new();
    for _ in 0..8 {
        locks.push(FakeLock::connect(&daemon).await?);
    }
    for lock in &mut locks {
        lock.announce("AA:BB:CC").await?;
    }

    let registry = daemon.registry.clone();
    assert!(wait_until(RECV_TIMEOUT, || registry.lookup("AA:BB:CC").is_some()).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(daemon.directory.list()?.len(), 1);
    assert_eq!(daemon.registry.bound_count(), 1);
    Ok(())
}

#[tokio::test]
async fn malformed_frames_are_ignored() -> Result<()> {
    let daemon = Daemon::start().await?;
    let mut lock = FakeLock::connect(&daemon).await?;
    lock.recv().await?;

    lock.send_raw(Message::Text("not json at all".to_string().into())).await?;
    lock.send(json!({ "hello": "world" })).await?;
    lock.send(json!({ "macAddress": "" })).await?;
    lock.send_raw(Message::Binary(vec![1u8, 2, 3].into())).await?;
    lock.announce("AA").await?;

    let registry = daemon.registry.clone();
    assert!(wait_until(RECV_TIMEOUT, || registry.lookup("AA").is_some()).await);
    assert_eq!(daemon.directory.list()?.len(), 1);
    Ok(())
}
