//! Read routing, fallback and write isolation

use std::time::Duration;

use dbroute::config::ReplicaConfig;
use dbroute::{Config, Endpoint, Error, Role};

use crate::{replica_config, service, DriverError, Fault, Stmt};

#[tokio::test]
async fn test_healthy_replica_serves_reads() {
    let (svc, store) = service(replica_config());
    store.lock().insert("a".into(), 1);

    let value = svc.read(&Stmt::get("a")).await.unwrap();
    assert_eq!(value, Some(1));

    let replica = svc.replica_endpoint().unwrap();
    assert_eq!(replica.statements(), vec![Stmt::get("a")]);
    assert!(svc.write_endpoint().statements().is_empty());
}

#[tokio::test]
async fn test_connection_failure_falls_back_to_primary() {
    let (svc, store) = service(replica_config());
    store.lock().insert("a".into(), 7);
    svc.replica_endpoint().unwrap().fail_next(Fault::Connection);

    let value = svc.read(&Stmt::get("a")).await.unwrap();
    assert_eq!(value, Some(7));
    assert!(!svc.get_health_status().replica);
    assert_eq!(svc.read_endpoint().name(), "primary");
}

#[tokio::test]
async fn test_fallback_touches_each_endpoint_once() {
    let (svc, _) = service(replica_config());
    let replica = svc.replica_endpoint().unwrap();
    replica.set_down(true);
    svc.write_endpoint().fail_next(Fault::Connection);

    let err = svc.read(&Stmt::get("a")).await.unwrap_err();
    match err {
        Error::Read { role, source } => {
            assert_eq!(role, Role::Primary);
            assert_eq!(source, DriverError::ConnectionRefused("primary"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(replica.statements().len(), 1);
    assert_eq!(svc.write_endpoint().statements().len(), 1);
}

#[tokio::test]
async fn test_no_fallback_returns_replica_error() {
    let (svc, _) = service(Config {
        replica: ReplicaConfig {
            fallback_to_main: false,
            ..replica_config().replica
        },
        ..replica_config()
    });
    svc.replica_endpoint().unwrap().fail_next(Fault::Rejected);

    let err = svc.read(&Stmt::get("a")).await.unwrap_err();
    assert_eq!(err.role(), Some(Role::Replica));
    assert!(svc.write_endpoint().statements().is_empty());
}

#[tokio::test]
async fn test_disabled_replica_reads_from_primary() {
    let (svc, _) = service(Config::default());
    for _ in 0..3 {
        svc.read(&Stmt::get("a")).await.unwrap();
    }
    assert!(svc.replica_endpoint().is_none());
    assert_eq!(svc.write_endpoint().statements().len(), 3);
    assert!(!svc.get_health_status().replica_enabled);
}

#[tokio::test]
async fn test_force_failover_redirects_next_read() {
    let (svc, _) = service(replica_config());
    assert_eq!(svc.read_endpoint().name(), "replica");

    svc.force_failover();
    svc.read(&Stmt::get("a")).await.unwrap();

    assert!(svc.replica_endpoint().unwrap().statements().is_empty());
    assert_eq!(svc.write_endpoint().statements(), vec![Stmt::get("a")]);
}

#[tokio::test]
async fn test_writes_never_reach_replica() {
    for enabled in [true, false] {
        let (svc, store) = service(Config {
            replica: ReplicaConfig {
                enabled,
                ..replica_config().replica
            },
            ..replica_config()
        });

        svc.write(&Stmt::set("k", 1)).await.unwrap();
        svc.force_failover();
        svc.write(&Stmt::set("k", 2)).await.unwrap();
        svc.reset_replica_health();
        svc.write(&Stmt::set("k", 3)).await.unwrap();

        assert_eq!(store.lock().get("k"), Some(&3));
        if let Some(replica) = svc.replica_endpoint() {
            assert!(replica.statements().is_empty());
        }
    }
}

#[tokio::test]
async fn test_write_connection_failure_marks_primary_down() {
    let (svc, _) = service(replica_config());
    svc.write_endpoint().fail_next(Fault::Connection);

    let err = svc.write(&Stmt::set("k", 1)).await.unwrap_err();
    assert!(matches!(err, Error::Write { .. }));
    assert!(!svc.get_health_status().primary);
    assert_eq!(svc.write_endpoint().statements().len(), 1);

    svc.write(&Stmt::set("k", 1)).await.unwrap();
    assert!(svc.get_health_status().primary);
}

#[tokio::test]
async fn test_execute_read_with_custom_operation() {
    let (svc, store) = service(replica_config());
    store.lock().insert("x".into(), 20);
    store.lock().insert("y".into(), 22);

    let sum = svc
        .execute_read(|endpoint| async move {
            let x = endpoint.execute(&Stmt::get("x")).await?.unwrap_or(0);
            let y = endpoint.execute(&Stmt::get("y")).await?.unwrap_or(0);
            Ok::<_, DriverError>(x + y)
        })
        .await
        .unwrap();
    assert_eq!(sum, 42);
}

#[tokio::test(start_paused = true)]
async fn test_fallback_delay_applies_to_connection_failures() {
    let (svc, _) = service(Config {
        replica: ReplicaConfig {
            retry_delay_ms: 1000,
            ..replica_config().replica
        },
        ..replica_config()
    });
    svc.replica_endpoint().unwrap().fail_next(Fault::Connection);

    let started = tokio::time::Instant::now();
    svc.read(&Stmt::get("a")).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(1000));
}

#[tokio::test]
async fn test_rejected_read_on_primary_keeps_writes_flowing() {
    let (svc, store) = service(replica_config());
    svc.force_failover();
    svc.write_endpoint().fail_next(Fault::Rejected);

    let err = svc.read(&Stmt::get("a")).await.unwrap_err();
    assert_eq!(err.role(), Some(Role::Primary));
    assert!(svc.get_health_status().primary);

    svc.write(&Stmt::set("k", 5)).await.unwrap();
    assert_eq!(store.lock().get("k"), Some(&5));
}
