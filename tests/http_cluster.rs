use partitioned_log::broker::coordinator::{CoordinatorConfig, RetryPolicy};
use partitioned_log::config::NodeConfig;
use partitioned_log::membership::service::ClusterMembership;
use partitioned_log::membership::types::Node;
use partitioned_log::server;
use serde_json::{Value, json};
use std::error::Error;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::time::Duration;

fn coordinator_config() -> CoordinatorConfig {
    CoordinatorConfig {
        retry: RetryPolicy {
            attempts: 3,
            attempt_timeout: Duration::from_millis(300),
            base_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(80),
            max_jitter: Duration::from_millis(5),
        },
        request_timeout: Duration::from_secs(2),
    }
}

/// Starts one HTTP node per listener. Ids are `n1`, `n2`, ... in listener order;
/// `dead` lists extra members that are in the membership but never started.
async fn start_cluster(
    listeners: Vec<TcpListener>,
    dead: Vec<Node>,
) -> Result<Vec<SocketAddr>, Box<dyn Error>> {
    let mut members = Vec::new();
    for (i, listener) in listeners.iter().enumerate() {
        members.push(Node::new(format!("n{}", i + 1), listener.local_addr()?));
    }
    members.extend(dead);

    let mut addrs = Vec::new();
    for (i, listener) in listeners.into_iter().enumerate() {
        let local = members[i].clone();
        let config = NodeConfig {
            membership: ClusterMembership::new(members.clone(), local.id)?,
            bind_addr: local.addr,
            coordinator: coordinator_config(),
            stats_interval: None,
        };
        let broker = server::build_coordinator(&config);
        tokio::spawn(server::serve(listener, broker));
        addrs.push(local.addr);
    }

    Ok(addrs)
}

async fn bind_loopback(count: usize) -> Result<Vec<TcpListener>, Box<dyn Error>> {
    let mut listeners = Vec::with_capacity(count);
    for _ in 0..count {
        listeners.push(TcpListener::bind("127.0.0.1:0").await?);
    }
    Ok(listeners)
}

async fn rpc(
    client: &reqwest::Client,
    addr: SocketAddr,
    body: Value,
) -> Result<(u16, Value), Box<dyn Error>> {
    let response = client
        .post(format!("http://{}/rpc", addr))
        .json(&body)
        .send()
        .await?;
    let status = response.status().as_u16();
    Ok((status, response.json().await?))
}

#[tokio::test]
async fn forwarded_sends_and_fanned_out_reads() -> Result<(), Box<dyn Error>> {
    let addrs = start_cluster(bind_loopback(3).await?, vec![]).await?;
    let client = reqwest::Client::new();

    // Key "1" lives on n2, key "2" on n3; every send enters through n1
    for (key, msg) in [("1", 10), ("1", 11), ("2", 20)] {
        let (status, body) = rpc(
            &client,
            addrs[0],
            json!({"type": "send", "key": key, "msg": msg}),
        )
        .await?;
        assert_eq!(status, 200, "send {} failed: {}", key, body);
        assert_eq!(body["type"], "send_ok");
    }

    let (_, body) = rpc(
        &client,
        addrs[2],
        json!({"type": "poll", "offsets": {"1": 0, "2": 0, "0": 0}}),
    )
    .await?;
    assert_eq!(
        body,
        json!({"type": "poll_ok", "msgs": {"0": [], "1": [[0, 10], [1, 11]], "2": [[0, 20]]}})
    );

    let (_, body) = rpc(
        &client,
        addrs[1],
        json!({"type": "commit_offsets", "offsets": {"1": 1, "2": 0}}),
    )
    .await?;
    assert_eq!(body, json!({"type": "commit_offsets_ok"}));

    let (_, body) = rpc(
        &client,
        addrs[0],
        json!({"type": "list_committed_offsets", "keys": ["1", "2", "0"]}),
    )
    .await?;
    assert_eq!(
        body,
        json!({"type": "list_committed_offsets_ok", "offsets": {"0": 0, "1": 1, "2": 0}})
    );

    Ok(())
}

#[tokio::test]
async fn dead_owner_fails_only_its_keys() -> Result<(), Box<dyn Error>> {
    // Reserve a port, then free it so connections to it are refused
    let gone = TcpListener::bind("127.0.0.1:0").await?;
    let dead = Node::new("n3", gone.local_addr()?);
    drop(gone);

    let addrs = start_cluster(bind_loopback(2).await?, vec![dead]).await?;
    let client = reqwest::Client::new();

    let (_, body) = rpc(&client, addrs[0], json!({"type": "send", "key": "1", "msg": 7})).await?;
    assert_eq!(body, json!({"type": "send_ok", "offset": 0}));

    let (status, body) = rpc(&client, addrs[0], json!({"type": "send", "key": "2", "msg": 1})).await?;
    assert_eq!(status, 502);
    assert_eq!(body["type"], "error");
    assert_eq!(body["code"], 11);

    let (status, body) = rpc(
        &client,
        addrs[0],
        json!({"type": "poll", "offsets": {"1": 0, "2": 0}}),
    )
    .await?;
    assert_eq!(status, 200);
    assert_eq!(body["msgs"], json!({"1": [[0, 7]]}));
    assert!(body["failed"]["2"].is_string(), "missing failure: {}", body);

    Ok(())
}

#[tokio::test]
async fn malformed_client_request_is_rejected() -> Result<(), Box<dyn Error>> {
    let addrs = start_cluster(bind_loopback(1).await?, vec![]).await?;
    let client = reqwest::Client::new();

    let (status, body) = rpc(&client, addrs[0], json!({"type": "send", "key": "k"})).await?;

    assert_eq!(status, 400);
    assert_eq!(body["code"], 12);
    Ok(())
}
