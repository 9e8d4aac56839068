// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod support;

use myst_wgtunnel_common::{
	ConsumerNetConfig, ProviderConfig, ServiceConfig, Stats, WgKeyPair,
};
use myst_wgtunnel_endpoint::{HandshakeWaiter, PollingHandshakeWaiter};
use myst_wgtunnel_resources::{LeaseCounts, StaticInterfaceLister};
use myst_wgtunnel_session::{
	Connection, ConnectionError, ConnectionOptions, ConnectionState,
};
use std::sync::Arc;
use std::time::Duration;
use support::{allocator, FakeWgClient, ScriptedWaiter};
use tokio::sync::{mpsc, Notify};

fn service_config_json() -> String {
	service_config_with_dns(String::new())
}

fn service_config_with_dns(dns_ips: String) -> String {
	let config = ServiceConfig {
		local_port: 52001,
		remote_port: 52002,
		ports: Vec::new(),
		provider: ProviderConfig {
			public_key: *WgKeyPair::generate().public_key(),
			endpoint: "203.0.113.7:52002".parse().unwrap(),
		},
		consumer: ConsumerNetConfig {
			ip_address: "10.182.4.2/24".parse().unwrap(),
			dns_ips,
		},
	};
	serde_json::to_string(&config).unwrap()
}

struct Fixture {
	allocator: Arc<myst_wgtunnel_resources::Allocator>,
	client: Arc<FakeWgClient>,
	conn: Arc<Connection>,
	states: mpsc::Receiver<ConnectionState>,
}

fn fixture(waiter: Arc<dyn HandshakeWaiter>) -> Fixture {
	let allocator = allocator(StaticInterfaceLister::default());
	let client = Arc::new(FakeWgClient::default());
	let conn = Arc::new(Connection::new(
		allocator.clone(),
		client.clone(),
		waiter,
		ConnectionOptions::default(),
	));
	let states = conn.state_receiver().unwrap();
	Fixture {
		allocator,
		client,
		conn,
		states,
	}
}

async fn drain(mut states: mpsc::Receiver<ConnectionState>) -> Vec<ConnectionState> {
	let mut seen = Vec::new();
	while let Some(state) = states.recv().await {
		seen.push(state);
	}
	seen
}

#[tokio::test]
async fn start_and_stop_report_every_state() {
	let f = fixture(Arc::new(ScriptedWaiter::Succeed));
	*f.client.stats.lock().unwrap() = Stats {
		bytes_sent: 10,
		bytes_received: 11,
		last_handshake: None,
	};

	f.conn.start(&service_config_json()).await.unwrap();
	assert_eq!(f.conn.interface_name().as_deref(), Some("myst0"));

	let stats = f.conn.statistics().await.unwrap();
	assert_eq!(stats.bytes_sent, 10);
	assert_eq!(stats.bytes_received, 11);

	f.conn.stop().await;
	f.conn.wait().await;

	assert_eq!(
		drain(f.states).await,
		vec![
			ConnectionState::Connecting,
			ConnectionState::Connected,
			ConnectionState::Disconnecting,
			ConnectionState::NotConnected,
		]
	);
	assert_eq!(f.allocator.leased_counts(), LeaseCounts::default());

	let calls = f.client.calls();
	assert_eq!(calls[0], "configure myst0");
	assert!(calls.iter().any(|c| c.starts_with("add_peer myst0 ")));
	assert!(calls.contains(&"routes myst0 203.0.113.7".to_string()));
	assert_eq!(calls.last().unwrap(), "destroy myst0");
}

#[tokio::test]
async fn consumer_device_uses_offered_address_and_port() {
	let f = fixture(Arc::new(ScriptedWaiter::Succeed));
	f.conn.start(&service_config_json()).await.unwrap();

	let device = f.client.configured().remove(0);
	assert_eq!(device.subnet, "10.182.4.2/24".parse().unwrap());
	assert_eq!(device.listen_port, 52001);
	f.conn.stop().await;
}

#[tokio::test]
async fn handshake_timeout_stops_the_connection() {
	let f = fixture(Arc::new(ScriptedWaiter::TimeOut));

	let err = f.conn.start(&service_config_json()).await.unwrap_err();

	assert!(err.is_handshake_timeout());
	assert_eq!(
		drain(f.states).await,
		vec![
			ConnectionState::Connecting,
			ConnectionState::Disconnecting,
			ConnectionState::NotConnected,
		]
	);
	assert_eq!(f.allocator.leased_counts(), LeaseCounts::default());
	assert_eq!(f.client.calls().last().unwrap(), "destroy myst0");
}

#[tokio::test(start_paused = true)]
async fn polling_waiter_gives_up_without_handshake() {
	let allocator = allocator(StaticInterfaceLister::default());
	let client = Arc::new(FakeWgClient::default());
	let conn = Connection::new(
		allocator.clone(),
		client.clone(),
		Arc::new(PollingHandshakeWaiter::default()),
		ConnectionOptions {
			handshake_timeout: Duration::from_secs(1),
			..Default::default()
		},
	);

	let err = conn.start(&service_config_json()).await.unwrap_err();

	assert!(err.is_handshake_timeout());
	assert!(client.calls().iter().filter(|c| c.starts_with("stats")).count() >= 10);
	assert_eq!(allocator.leased_counts(), LeaseCounts::default());
}

#[tokio::test]
async fn stop_cancels_pending_handshake() {
	let entered = Arc::new(Notify::new());
	let f = fixture(Arc::new(ScriptedWaiter::Block(entered.clone())));

	let conn = f.conn.clone();
	let json = service_config_json();
	let start = tokio::spawn(async move { conn.start(&json).await });

	entered.notified().await;
	f.conn.stop().await;

	let err = start.await.unwrap().unwrap_err();
	assert!(err.is_cancelled());
	assert_eq!(f.allocator.leased_counts(), LeaseCounts::default());
}

#[tokio::test]
async fn stop_runs_once() {
	let f = fixture(Arc::new(ScriptedWaiter::Succeed));
	f.conn.start(&service_config_json()).await.unwrap();

	tokio::join!(f.conn.stop(), f.conn.stop());
	f.conn.stop().await;

	let states = drain(f.states).await;
	assert_eq!(
		states
			.iter()
			.filter(|s| **s == ConnectionState::Disconnecting)
			.count(),
		1
	);
	let destroys = f
		.client
		.calls()
		.iter()
		.filter(|c| c.starts_with("destroy"))
		.count();
	assert_eq!(destroys, 1);
}

#[tokio::test]
async fn stopped_connection_cannot_start() {
	let f = fixture(Arc::new(ScriptedWaiter::Succeed));
	f.conn.stop().await;

	let err = f.conn.start(&service_config_json()).await.unwrap_err();

	assert!(matches!(err, ConnectionError::Stopped));
	assert!(f.client.calls().is_empty());
	assert_eq!(
		drain(f.states).await,
		vec![ConnectionState::Disconnecting, ConnectionState::NotConnected]
	);
}

#[tokio::test]
async fn invalid_service_config_is_rejected_before_any_work() {
	let f = fixture(Arc::new(ScriptedWaiter::Succeed));

	let err = f.conn.start("{\"provider\":{}}").await.unwrap_err();

	assert!(matches!(err, ConnectionError::Config(_)));
	assert!(f.client.calls().is_empty());
}

#[tokio::test]
async fn statistics_and_reconfigure_need_a_started_connection() {
	let f = fixture(Arc::new(ScriptedWaiter::Succeed));

	assert!(matches!(
		f.conn.statistics().await,
		Err(ConnectionError::NotStarted)
	));
	assert!(matches!(
		f.conn.reconfigure(&service_config_json()).await,
		Err(ConnectionError::NotStarted)
	));
}

#[tokio::test]
async fn reconfigure_replaces_provider_peer() {
	let f = fixture(Arc::new(ScriptedWaiter::Succeed));
	f.conn.start(&service_config_json()).await.unwrap();

	f.conn.reconfigure(&service_config_json()).await.unwrap();

	let device = f.client.configured().pop().unwrap();
	assert!(device.replace_peers);
	assert!(device.peer.is_some());
	assert!(f.client.calls().contains(&"reconfigure myst0".to_string()));
	f.conn.stop().await;
}

#[test]
fn config_offers_public_key_and_ports() {
	let allocator = allocator(StaticInterfaceLister::default());
	let conn = Connection::new(
		allocator,
		Arc::new(FakeWgClient::default()),
		Arc::new(ScriptedWaiter::Succeed),
		ConnectionOptions::default(),
	)
	.with_ports(vec![51001, 51002]);

	let first = conn.get_config();
	assert_eq!(first.ports, vec![51001, 51002]);
	assert_eq!(first.ip, None);
	assert_eq!(conn.get_config().public_key, first.public_key);
	assert!(conn.state_receiver().is_some());
	assert!(conn.state_receiver().is_none());
}

#[tokio::test]
async fn wait_resolves_only_after_stop() {
	let f = fixture(Arc::new(ScriptedWaiter::Succeed));
	let mut wait = tokio_test::task::spawn(f.conn.wait());

	tokio_test::assert_pending!(wait.poll());
	f.conn.stop().await;

	assert!(wait.is_woken());
	tokio_test::assert_ready!(wait.poll());
}

#[tokio::test]
async fn stop_during_device_setup_unwinds_start() {
	let mut f = fixture(Arc::new(ScriptedWaiter::Succeed));
	let release = Arc::new(Notify::new());
	*f.client.hold_configure.lock().unwrap() = Some(release.clone());

	let conn = f.conn.clone();
	let json = service_config_json();
	let start = tokio::spawn(async move { conn.start(&json).await });
	f.client.configure_entered.notified().await;

	let conn = f.conn.clone();
	let stop = tokio::spawn(async move { conn.stop().await });
	assert_eq!(f.states.recv().await, Some(ConnectionState::Connecting));
	assert_eq!(f.states.recv().await, Some(ConnectionState::Disconnecting));
	release.notify_one();

	let err = start.await.unwrap().unwrap_err();
	stop.await.unwrap();

	assert!(matches!(err, ConnectionError::Stopped));
	assert_eq!(drain(f.states).await, vec![ConnectionState::NotConnected]);
	assert_eq!(f.allocator.leased_counts(), LeaseCounts::default());
	assert_eq!(f.client.calls().last().unwrap(), "destroy myst0");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_start_and_stop_leave_nothing_leased() {
	// A large document keeps `start` busy parsing while `stop` runs.
	let json = service_config_with_dns("10.182.4.1,".repeat(400_000));

	for _ in 0..20 {
		let f = fixture(Arc::new(ScriptedWaiter::Succeed));
		let conn = f.conn.clone();
		let body = json.clone();
		let start = tokio::spawn(async move { conn.start(&body).await });

		tokio::time::sleep(Duration::from_millis(2)).await;
		f.conn.stop().await;
		let result = start.await.unwrap();

		assert_eq!(
			f.allocator.leased_counts(),
			LeaseCounts::default(),
			"start returned {result:?}"
		);
		let calls = f.client.calls();
		if calls.iter().any(|c| c.starts_with("configure")) {
			assert_eq!(calls.last().unwrap(), "destroy myst0");
		}
	}
}
