// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod support;

use myst_wgtunnel_common::{ConsumerConfig, Stats, WgKeyPair};
use myst_wgtunnel_resources::{Allocator, LeaseCounts, StaticInterfaceLister};
use myst_wgtunnel_session::{
	Manager, ManagerError, ManagerOptions, SessionEvent, SessionId, StaticIpResolver,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use support::{allocator, FakeWgClient, RecordingNat, RecordingPublisher};

const PUBLIC_IP: &str = "203.0.113.7";

struct Fixture {
	allocator: Arc<Allocator>,
	client: Arc<FakeWgClient>,
	nat: Arc<RecordingNat>,
	events: Arc<RecordingPublisher>,
	manager: Arc<Manager>,
}

fn fixture(options: ManagerOptions) -> Fixture {
	let allocator = allocator(StaticInterfaceLister::default());
	let client = Arc::new(FakeWgClient::default());
	let nat = Arc::new(RecordingNat::default());
	let events = Arc::new(RecordingPublisher::default());
	let manager = Arc::new(Manager::new(
		allocator.clone(),
		client.clone(),
		Arc::new(StaticIpResolver(PUBLIC_IP.parse().unwrap())),
		nat.clone(),
		events.clone(),
		options,
	));
	Fixture {
		allocator,
		client,
		nat,
		events,
		manager,
	}
}

fn consumer_json() -> String {
	serde_json::to_string(&ConsumerConfig::new(*WgKeyPair::generate().public_key())).unwrap()
}

#[tokio::test]
async fn provide_config_hands_out_reachable_endpoint() {
	let f = fixture(ManagerOptions::default());
	let session_id = SessionId::new();

	let config = f
		.manager
		.provide_config(session_id, &consumer_json())
		.await
		.unwrap();

	let endpoint: SocketAddr = config.provider.endpoint;
	assert_eq!(endpoint.ip(), PUBLIC_IP.parse::<IpAddr>().unwrap());
	assert!((52820..=53075).contains(&endpoint.port()));
	assert_eq!(config.consumer.ip_address, "10.182.0.2/24".parse().unwrap());
	assert!(config.consumer.dns_ips.is_empty());

	assert!(f
		.client
		.calls()
		.iter()
		.any(|c| c.starts_with("add_peer myst0 ")));

	let setups = f.nat.setups.lock().unwrap().clone();
	assert_eq!(setups.len(), 1);
	assert_eq!(setups[0].vpn_network, "10.182.0.0/24".parse().unwrap());
	assert_eq!(setups[0].provider_ext_ip, Some(PUBLIC_IP.parse().unwrap()));
	assert!(!setups[0].enable_dns_redirect);

	assert_eq!(
		f.events.events(),
		vec![SessionEvent::SessionStarted {
			session_id,
			iface: "myst0".to_string(),
		}]
	);
	assert_eq!(f.manager.session_ids().await, vec![session_id]);
	assert_eq!(
		f.allocator.leased_counts(),
		LeaseCounts {
			interfaces: 1,
			subnets: 1,
			ports: 1,
		}
	);
}

#[tokio::test]
async fn dns_points_consumers_at_provider_tunnel_address() {
	let f = fixture(ManagerOptions {
		dns_enabled: true,
		..Default::default()
	});

	let config = f
		.manager
		.provide_config(SessionId::new(), &consumer_json())
		.await
		.unwrap();

	assert_eq!(config.consumer.dns_ips, "10.182.0.1");
	let setup = f.nat.setups.lock().unwrap()[0].clone();
	assert!(setup.enable_dns_redirect);
	assert_eq!(setup.dns_ip, Some("10.182.0.1".parse().unwrap()));
	assert_eq!(setup.dns_port, 11253);
}

#[tokio::test]
async fn sessions_get_separate_interfaces_and_subnets() {
	let f = fixture(ManagerOptions::default());

	let first = f
		.manager
		.provide_config(SessionId::new(), &consumer_json())
		.await
		.unwrap();
	let second = f
		.manager
		.provide_config(SessionId::new(), &consumer_json())
		.await
		.unwrap();

	assert_ne!(first.consumer.ip_address, second.consumer.ip_address);
	assert_ne!(first.provider.endpoint, second.provider.endpoint);
	assert_ne!(first.provider.public_key, second.provider.public_key);
	assert!(f.client.calls().contains(&"configure myst1".to_string()));
}

#[tokio::test]
async fn destroy_session_returns_every_lease() {
	let f = fixture(ManagerOptions::default());
	let session_id = SessionId::new();
	f.manager
		.provide_config(session_id, &consumer_json())
		.await
		.unwrap();

	f.manager.destroy_session(session_id).await.unwrap();

	assert_eq!(f.allocator.leased_counts(), LeaseCounts::default());
	assert_eq!(f.nat.deleted.lock().unwrap().len(), 1);
	assert_eq!(f.client.calls().last().unwrap(), "destroy myst0");
	assert_eq!(
		f.events.events().last().unwrap(),
		&SessionEvent::SessionEnded { session_id }
	);
	assert!(f.manager.session_ids().await.is_empty());
}

#[tokio::test]
async fn destroying_unknown_session_fails() {
	let f = fixture(ManagerOptions::default());
	let session_id = SessionId::new();

	assert!(matches!(
		f.manager.destroy_session(session_id).await,
		Err(ManagerError::UnknownSession(id)) if id == session_id
	));
}

#[tokio::test]
async fn duplicate_session_is_rejected() {
	let f = fixture(ManagerOptions::default());
	let session_id = SessionId::new();
	f.manager
		.provide_config(session_id, &consumer_json())
		.await
		.unwrap();

	let err = f
		.manager
		.provide_config(session_id, &consumer_json())
		.await
		.unwrap_err();

	assert!(matches!(err, ManagerError::DuplicateSession(_)));
	assert_eq!(f.allocator.leased_counts().interfaces, 1);
}

#[tokio::test]
async fn malformed_consumer_config_allocates_nothing() {
	let f = fixture(ManagerOptions::default());

	let err = f
		.manager
		.provide_config(SessionId::new(), "{\"PublicKey\":\"nope\"}")
		.await
		.unwrap_err();

	assert!(matches!(err, ManagerError::ConsumerConfig(_)));
	assert_eq!(f.allocator.leased_counts(), LeaseCounts::default());
	assert!(f.client.calls().is_empty());
}

#[tokio::test]
async fn nat_failure_unwinds_the_endpoint() {
	let f = fixture(ManagerOptions::default());
	f.nat.fail_setup.store(true, Ordering::SeqCst);

	let err = f
		.manager
		.provide_config(SessionId::new(), &consumer_json())
		.await
		.unwrap_err();

	assert!(matches!(err, ManagerError::Nat(_)));
	assert_eq!(f.allocator.leased_counts(), LeaseCounts::default());
	assert_eq!(f.client.calls().last().unwrap(), "destroy myst0");
	assert!(f.events.events().is_empty());
	assert!(f.manager.session_ids().await.is_empty());
}

#[tokio::test]
async fn device_failure_releases_listen_port() {
	let f = fixture(ManagerOptions::default());
	f.client.fail_configure.store(true, Ordering::SeqCst);

	let err = f
		.manager
		.provide_config(SessionId::new(), &consumer_json())
		.await
		.unwrap_err();

	assert!(matches!(err, ManagerError::Endpoint(_)));
	assert_eq!(f.allocator.leased_counts(), LeaseCounts::default());
}

#[tokio::test]
async fn stop_cleans_up_all_sessions_and_releases_serve() {
	let f = fixture(ManagerOptions::default());
	for _ in 0..3 {
		f.manager
			.provide_config(SessionId::new(), &consumer_json())
			.await
			.unwrap();
	}

	let manager = f.manager.clone();
	let serve = tokio::spawn(async move { manager.serve().await });

	f.manager.stop().await;
	f.manager.stop().await;
	serve.await.unwrap();

	assert_eq!(f.allocator.leased_counts(), LeaseCounts::default());
	assert_eq!(f.nat.deleted.lock().unwrap().len(), 3);
	let ended = f
		.events
		.events()
		.iter()
		.filter(|e| matches!(e, SessionEvent::SessionEnded { .. }))
		.count();
	assert_eq!(ended, 3);

	assert!(matches!(
		f.manager
			.provide_config(SessionId::new(), &consumer_json())
			.await,
		Err(ManagerError::Stopped)
	));
}

#[tokio::test(start_paused = true)]
async fn session_statistics_are_published_periodically() {
	let f = fixture(ManagerOptions {
		stats_interval: Duration::from_secs(3),
		..Default::default()
	});
	*f.client.stats.lock().unwrap() = Stats {
		bytes_sent: 2048,
		bytes_received: 4096,
		last_handshake: None,
	};
	let session_id = SessionId::new();
	f.manager
		.provide_config(session_id, &consumer_json())
		.await
		.unwrap();

	tokio::time::sleep(Duration::from_millis(6_500)).await;
	f.manager.destroy_session(session_id).await.unwrap();

	let transfers: Vec<_> = f
		.events
		.events()
		.into_iter()
		.filter(|e| matches!(e, SessionEvent::DataTransferred { .. }))
		.collect();
	assert_eq!(transfers.len(), 2);
	assert_eq!(
		transfers[0],
		SessionEvent::DataTransferred {
			session_id,
			bytes_sent: 2048,
			bytes_received: 4096,
		}
	);
}
