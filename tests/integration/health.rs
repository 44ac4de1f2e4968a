//! Health probing, background monitoring and operator overrides

use std::time::Duration;

use dbroute::Config;

use crate::{replica_config, service, Stmt};

#[tokio::test]
async fn test_check_health_tracks_replica_outage() {
    let (svc, _) = service(replica_config());
    let replica = svc.replica_endpoint().unwrap();

    replica.set_down(true);
    let snapshot = svc.check_health().await;
    assert!(snapshot.primary);
    assert!(!snapshot.replica);
    assert_eq!(svc.read_endpoint().name(), "primary");

    replica.set_down(false);
    let snapshot = svc.check_health().await;
    assert!(snapshot.replica);
    assert_eq!(svc.read_endpoint().name(), "replica");
    assert_eq!(replica.probes(), 2);
}

#[tokio::test]
async fn test_successful_replica_read_overrides_failed_probe() {
    let (svc, _) = service(replica_config());
    let replica = svc.replica_endpoint().unwrap();

    replica.set_down(true);
    svc.check_health().await;
    replica.set_down(false);
    assert!(!svc.get_health_status().replica);

    svc.reset_replica_health();
    svc.read(&Stmt::get("a")).await.unwrap();

    assert!(svc.get_health_status().replica);
    svc.read(&Stmt::get("b")).await.unwrap();
    assert_eq!(replica.statements(), vec![Stmt::get("a"), Stmt::get("b")]);
}

#[tokio::test]
async fn test_disabled_replica_is_never_probed() {
    let (svc, _) = service(Config::default());
    let snapshot = svc.check_health().await;

    assert!(!snapshot.replica_enabled);
    assert_eq!(svc.write_endpoint().probes(), 1);
    assert_eq!(svc.stats().health.replica_checks, 0);
}

#[tokio::test(start_paused = true)]
async fn test_background_monitor_recovers_replica() {
    let (svc, _) = service(replica_config());
    let replica = svc.replica_endpoint().unwrap();
    replica.set_down(true);

    svc.start_monitoring();
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(!svc.get_health_status().replica);
    assert_eq!(svc.read_endpoint().name(), "primary");

    replica.set_down(false);
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(svc.get_health_status().replica);
    assert_eq!(svc.read_endpoint().name(), "replica");

    svc.shutdown().await;
    assert!(!svc.is_monitoring());
}

#[tokio::test(start_paused = true)]
async fn test_monitor_survives_primary_outage() {
    let (svc, _) = service(replica_config());
    svc.write_endpoint().set_down(true);

    svc.start_monitoring();
    tokio::time::sleep(Duration::from_millis(3500)).await;

    let stats = svc.stats();
    assert!(stats.health.primary_failed_checks >= 3);
    assert_eq!(stats.health.primary_failed_checks, stats.health.primary_checks);
    assert!(svc.is_monitoring());
    assert!(!svc.get_health_status().primary);

    svc.shutdown().await;
}

#[tokio::test]
async fn test_health_status_serializes_for_dashboards() {
    let (svc, _) = service(replica_config());
    svc.force_failover();

    let json = serde_json::to_value(svc.get_health_status()).unwrap();
    assert_eq!(json["primary"], true);
    assert_eq!(json["replica"], false);
    assert_eq!(json["replicaEnabled"], true);
    // Stamped at startup, before any check has run
    assert!(json["lastCheckedAt"].is_string());
}
