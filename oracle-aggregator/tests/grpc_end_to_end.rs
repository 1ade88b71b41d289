use std::net::SocketAddr;
use std::time::Duration;

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tonic::transport::Channel;

use oracle_aggregator::{build_runtime, AggregatorConfig};
use oracle_common::{
    auth::{ed25519::Ed25519Authenticator, Authenticator},
    env::report::report_signing_bytes,
    rpc::oracle_proto::{
        oracle_service_client::OracleServiceClient, ActiveRoundReply, ActiveRoundRequest,
        GetConsensusPriceRequest, HealthRequest, PriceReportMsg, SubmitReportReply,
        SubmitReportRequest,
    },
    utils::time::now_millis,
    ConsensusPrice, NodeId, PriceReport, RosterEntry, RoundId,
};
use oracle_consensus::ConsensusConfig;

type Client = OracleServiceClient<Channel>;

struct Node {
    id: NodeId,
    auth: Ed25519Authenticator,
}

impl Node {
    fn report(&self, round_id: u64, price: Decimal) -> PriceReportMsg {
        let observed_at = now_millis();
        let bytes = report_signing_bytes(&self.id, RoundId(round_id), price, observed_at).unwrap();
        let report = PriceReport {
            node_id: self.id.clone(),
            round_id: RoundId(round_id),
            price,
            observed_at,
            signature: self.auth.sign(&bytes).unwrap(),
        };
        PriceReportMsg::from(&report)
    }
}

async fn start(round_duration_ms: u64) -> (Client, Vec<Node>, watch::Sender<bool>) {
    let keys: Vec<(NodeId, SigningKey)> = (1..=5)
        .map(|i| (NodeId(format!("node-{}", i)), SigningKey::generate(&mut OsRng)))
        .collect();
    let roster = keys
        .iter()
        .map(|(id, key)| RosterEntry {
            node_id: id.clone(),
            public_key: hex::encode(key.verifying_key().to_bytes()),
        })
        .collect();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();

    let mut config = AggregatorConfig::new(addr, roster);
    config.consensus = ConsensusConfig {
        round_duration_ms,
        ..ConsensusConfig::default()
    };
    let runtime = build_runtime(config).unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(runtime.run_with_listener(listener, shutdown_rx));

    let client = connect(addr).await;
    let nodes = keys
        .into_iter()
        .map(|(id, key)| Node {
            id,
            auth: Ed25519Authenticator::new(key),
        })
        .collect();
    (client, nodes, shutdown_tx)
}

async fn connect(addr: SocketAddr) -> Client {
    let endpoint = format!("http://{}", addr);
    for _ in 0..50 {
        if let Ok(client) = OracleServiceClient::connect(endpoint.clone()).await {
            return client;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("aggregator did not come up on {}", addr);
}

async fn wait_for_round(client: &mut Client, round_id: u64) -> ActiveRoundReply {
    for _ in 0..500 {
        let reply = client
            .get_active_round(ActiveRoundRequest { node_id: "node-1".into() })
            .await
            .unwrap()
            .into_inner();
        if reply.open && reply.round_id == round_id {
            return reply;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("round {} never opened", round_id);
}

async fn submit(client: &mut Client, report: PriceReportMsg) -> SubmitReportReply {
    client
        .submit_report(SubmitReportRequest { report: Some(report) })
        .await
        .unwrap()
        .into_inner()
}

#[tokio::test]
async fn test_round_finalizes_over_grpc() {
    let (mut client, nodes, shutdown) = start(60_000).await;
    let round = wait_for_round(&mut client, 1).await;
    assert!(round.deadline > round.opened_at);

    let mut forged = nodes[0].report(1, dec!(50000));
    forged.price = "40000".into();
    let reply = submit(&mut client, forged).await;
    assert!(!reply.accepted);
    assert_eq!(reply.reject_reason, "invalid_signature");

    let prices = [dec!(50000), dec!(50010), dec!(49995), dec!(50005), dec!(60000)];
    for (node, price) in nodes.iter().zip(prices) {
        let reply = submit(&mut client, node.report(1, price)).await;
        assert!(reply.accepted, "{}", reply.message);
    }

    let reply = client
        .get_consensus_price(GetConsensusPriceRequest { round_id: 1 })
        .await
        .unwrap()
        .into_inner();
    assert!(reply.available);
    assert_eq!(reply.status, "finalized");
    let price = ConsensusPrice::try_from(reply.price.unwrap()).unwrap();
    assert_eq!(price.price, dec!(50002.5));
    assert_eq!(price.contributing_nodes.len(), 4);
    assert!(!price.contributing_nodes.contains(&NodeId::from("node-5")));

    let latest = client
        .get_consensus_price(GetConsensusPriceRequest { round_id: 0 })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(latest.price.unwrap().round_id, 1);

    let late = submit(&mut client, nodes[4].report(1, dec!(50000))).await;
    assert!(!late.accepted);
    assert_eq!(late.reject_reason, "stale_round");

    let health = client
        .health_check(HealthRequest { node_id: "node-1".into() })
        .await
        .unwrap()
        .into_inner();
    assert!(health.healthy);
    assert_eq!(health.registered_nodes, 5);
    assert_eq!(health.active_nodes, 5);

    shutdown.send(true).unwrap();
}

#[tokio::test]
async fn test_spread_out_round_is_not_available() {
    let (mut client, nodes, shutdown) = start(2_000).await;
    wait_for_round(&mut client, 1).await;

    let prices = [dec!(50000), dec!(51000), dec!(52000), dec!(53000), dec!(54000)];
    for (node, price) in nodes.iter().zip(prices) {
        assert!(submit(&mut client, node.report(1, price)).await.accepted);
    }

    let open = client
        .get_consensus_price(GetConsensusPriceRequest { round_id: 1 })
        .await
        .unwrap()
        .into_inner();
    assert!(!open.available);
    assert_eq!(open.status, "open");

    wait_for_round(&mut client, 2).await;
    let closed = client
        .get_consensus_price(GetConsensusPriceRequest { round_id: 1 })
        .await
        .unwrap()
        .into_inner();
    assert!(!closed.available);
    assert!(closed.price.is_none());
    assert_eq!(closed.status, "timed_out");

    shutdown.send(true).unwrap();
}

#[tokio::test]
async fn test_malformed_and_unknown_inputs() {
    let (mut client, nodes, shutdown) = start(60_000).await;
    wait_for_round(&mut client, 1).await;

    let empty = client
        .submit_report(SubmitReportRequest { report: None })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(empty.reject_reason, "malformed");

    let mut short_sig = nodes[0].report(1, dec!(50000));
    short_sig.signature.truncate(10);
    assert_eq!(submit(&mut client, short_sig).await.reject_reason, "malformed");

    let mut stranger = nodes[0].report(1, dec!(50000));
    stranger.node_id = "node-99".into();
    assert_eq!(submit(&mut client, stranger).await.reject_reason, "unknown_node");

    let wrong_round = nodes[0].report(7, dec!(50000));
    assert_eq!(submit(&mut client, wrong_round).await.reject_reason, "unknown_round");

    let missing = client
        .get_consensus_price(GetConsensusPriceRequest { round_id: 42 })
        .await
        .unwrap()
        .into_inner();
    assert!(!missing.available);
    assert_eq!(missing.status, "unknown_round");

    shutdown.send(true).unwrap();
}
