//! Server lifecycle over a real socket.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;

use user_service::http::{AppState, HttpServer, StartupError, X_CORRELATION_ID};
use user_service::lifecycle::{
    LifecycleState, ShutdownOutcome, TerminationSignal, TerminationSignals,
};
use user_service::store::{MemoryStore, UserStore};
use user_service::ServiceConfig;

mod common;
use common::{test_config, CapturedLogs, SlowStore};

async fn start(config: ServiceConfig, store: Arc<dyn UserStore>) -> user_service::RunningServer {
    let state = AppState::new(&config, store).unwrap();
    HttpServer::new(config, state).start().await.unwrap()
}

async fn wait_for_state(server: &user_service::RunningServer, target: LifecycleState) {
    let lifecycle = server.lifecycle();
    tokio::time::timeout(Duration::from_secs(5), lifecycle.wait_for(target))
        .await
        .unwrap();
}

#[tokio::test]
async fn serves_and_stops_cleanly() {
    let server = HttpServer::new(
        test_config(),
        AppState::new(&test_config(), Arc::new(MemoryStore::new())).unwrap(),
    );
    let lifecycle = server.lifecycle();
    assert_eq!(lifecycle.current(), LifecycleState::Starting);

    let server = server.start().await.unwrap();
    assert_eq!(server.state(), LifecycleState::Serving);

    let response = reqwest::get(format!("http://{}/health", server.local_addr()))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.headers().contains_key(X_CORRELATION_ID.as_str()));

    let outcome = server.shutdown(Duration::from_secs(5)).await;
    assert_eq!(outcome, ShutdownOutcome::Graceful);
    assert_eq!(lifecycle.current(), LifecycleState::Stopped);
}

#[tokio::test]
async fn drain_lets_in_flight_request_finish_and_refuses_new_connections() {
    let server = start(test_config(), Arc::new(SlowStore::new(Duration::from_secs(2)))).await;
    let addr = server.local_addr();
    let mut states = server.subscribe();

    let in_flight = tokio::spawn(async move {
        reqwest::get(format!("http://{addr}/api/users")).await
    });
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.active_connections(), 1);

    let lifecycle = server.lifecycle();
    let shutdown = tokio::spawn(server.shutdown(Duration::from_secs(30)));

    states
        .wait_for(|state| *state == LifecycleState::Draining)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(TcpStream::connect(addr).await.is_err());
    assert_eq!(lifecycle.current(), LifecycleState::Draining);

    let response = in_flight.await.unwrap().unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "[]");

    assert_eq!(shutdown.await.unwrap(), ShutdownOutcome::Graceful);
    assert_eq!(lifecycle.current(), LifecycleState::Stopped);
}

#[tokio::test]
async fn drain_timeout_forces_shutdown() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    let server = start(test_config(), Arc::new(SlowStore::new(Duration::from_secs(10)))).await;
    let addr = server.local_addr();

    let in_flight = tokio::spawn(async move {
        reqwest::get(format!("http://{addr}/api/users")).await
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    let started = Instant::now();
    let outcome = server.shutdown(Duration::from_secs(1)).await;
    let elapsed = started.elapsed();

    assert_eq!(outcome, ShutdownOutcome::Forced { abandoned: 1 });
    assert!(elapsed >= Duration::from_secs(1), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");

    let forced = logs.messages("Forced shutdown");
    assert_eq!(forced.len(), 1);
    assert_eq!(forced[0]["level"], "WARN");
    assert_eq!(forced[0]["abandoned"], 1);

    assert!(in_flight.await.unwrap().is_err());
}

#[tokio::test]
async fn force_future_cuts_drain_short() {
    let server = start(test_config(), Arc::new(SlowStore::new(Duration::from_secs(10)))).await;
    let addr = server.local_addr();
    let lifecycle = server.lifecycle();

    let _in_flight = tokio::spawn(async move {
        reqwest::get(format!("http://{addr}/api/users")).await
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    let started = Instant::now();
    let outcome = server
        .shutdown_or_force(Duration::from_secs(30), async {})
        .await;

    assert!(matches!(outcome, ShutdownOutcome::Forced { .. }));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(lifecycle.current(), LifecycleState::Stopped);
}

#[cfg(unix)]
async fn raise(flag: &str) {
    let status = tokio::process::Command::new("kill")
        .args([flag, &std::process::id().to_string()])
        .status()
        .await
        .unwrap();
    assert!(status.success());
}

// The only test in this binary that delivers signals to the process.
#[cfg(unix)]
#[tokio::test]
async fn interrupt_drains_and_second_signal_forces() {
    let mut signals = TerminationSignals::register().unwrap();
    let server = start(test_config(), Arc::new(SlowStore::new(Duration::from_secs(10)))).await;
    let addr = server.local_addr();
    let lifecycle = server.lifecycle();

    let _in_flight = tokio::spawn(async move {
        reqwest::get(format!("http://{addr}/api/users")).await
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    raise("-INT").await;
    let first = tokio::time::timeout(Duration::from_secs(5), signals.recv())
        .await
        .unwrap();
    assert_eq!(first, TerminationSignal::Interrupt);

    let started = Instant::now();
    let shutdown = tokio::spawn(server.shutdown_or_force(Duration::from_secs(30), async move {
        signals.recv().await;
    }));

    lifecycle.wait_for(LifecycleState::Draining).await;
    raise("-TERM").await;

    let outcome = tokio::time::timeout(Duration::from_secs(5), shutdown)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, ShutdownOutcome::Forced { abandoned: 1 });
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(lifecycle.current(), LifecycleState::Stopped);
}

#[tokio::test]
async fn idle_server_drains_immediately() {
    let server = start(test_config(), Arc::new(MemoryStore::new())).await;
    wait_for_state(&server, LifecycleState::Serving).await;

    let started = Instant::now();
    assert!(server.shutdown(Duration::from_secs(30)).await.is_graceful());
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn bind_failure_stops_without_serving() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = test_config();
    config.listener.port = occupied.local_addr().unwrap().port();

    let state = AppState::new(&config, Arc::new(MemoryStore::new())).unwrap();
    let server = HttpServer::new(config, state);
    let lifecycle = server.lifecycle();
    let mut states = lifecycle.subscribe();

    let err = server.start().await.unwrap_err();
    assert!(matches!(err, StartupError::Listener(_)));
    assert_eq!(lifecycle.current(), LifecycleState::Stopped);

    // Starting → Stopped directly; Serving never observed.
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), LifecycleState::Stopped);
}
