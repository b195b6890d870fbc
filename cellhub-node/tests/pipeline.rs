//! End-to-end collection cycles against a scripted node CLI
//!
//! Drives collector → writer → exporter through the scheduler with an
//! in-memory store and temp directories for configs and the artifact.

use cellhub_core::{ScriptedCli, DAY_FORMAT};
use cellhub_node::{HubConfig, HubMetrics, HubPipeline, NodeAddressCache, Scheduler};
use cellhub_store::{AsyncWrapper, MemoryStore};
use chrono::{Local, NaiveDate};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const NODE_ADDR: &str = "0A1B::2C3D::4E5F::6789";
const KEY_PREFIX: &str = "0A1B2C3D4E5F6789";

fn status(with_addr: bool) -> String {
    let addr = if with_addr {
        format!("  current_addr: {}\n", NODE_ADDR)
    } else {
        String::new()
    };
    format!(
        "status:\n{}  states:\n    current: NET_STATE_ONLINE\n    target: NET_STATE_ONLINE\n  processed:\n    main:\n      status: synced\n      current: 2000\n      in network: 2000\n      percent: 100.0 %\n",
        addr
    )
}

fn reward_history(day: NaiveDate, amount: &str) -> String {
    let mut lines = vec![
        "status: ACCEPTED".to_string(),
        "hash: 0x5E1F".to_string(),
        format!("tx_created: {} 03:12:44", day.format(DAY_FORMAT)),
        "service: block_reward".to_string(),
        "data:".to_string(),
        "    tx_type: recv".to_string(),
        format!("    recv_coins: {}", amount),
        "    token: CELL".to_string(),
        "    source_address: reward collecting".to_string(),
    ];
    lines.resize(40, String::new());
    lines.join("\n")
}

struct Fixture {
    _dir: TempDir,
    config: HubConfig,
    cli: Arc<ScriptedCli>,
    store: Arc<AsyncWrapper<MemoryStore>>,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let network_dir = dir.path().join("network");
        std::fs::create_dir_all(&network_dir).unwrap();

        let mut config = HubConfig::default();
        config.node.network_config_dir = network_dir;
        config.collector.output_path = dir.path().join("hub/output.json");
        config.collector.interval_secs = 1;

        Self {
            _dir: dir,
            config,
            cli: Arc::new(ScriptedCli::new()),
            store: Arc::new(AsyncWrapper(MemoryStore::new())),
        }
    }

    fn network_config(&self, network: &str, text: &str) {
        std::fs::write(
            self.config
                .node
                .network_config_dir
                .join(format!("{}.cfg", network)),
            text,
        )
        .unwrap();
    }

    fn scheduler(&self, interval: Duration) -> Scheduler<HubPipeline> {
        let metrics = HubMetrics::new("test-host");
        let pipeline = HubPipeline::from_config(
            &self.config,
            self.cli.clone(),
            self.store.clone(),
            NodeAddressCache::new(),
            metrics.clone(),
        );
        Scheduler::new(pipeline, interval, metrics)
    }

    fn artifact(&self) -> Value {
        let text = std::fs::read_to_string(&self.config.collector.output_path).unwrap();
        serde_json::from_str(&text).unwrap()
    }

    fn keys(&self) -> Vec<String> {
        self.store.0.keys("hub")
    }
}

#[tokio::test]
async fn test_full_cycle_with_missing_network_config() {
    let fixture = Fixture::new();
    let today = Local::now().date_naive();

    fixture.network_config("net-a", "blocks-sign-cert=net-a.master\nfee_addr=FEEA\n");
    fixture.cli.respond("net list", "net-a, net-b");
    fixture.cli.respond("net get status -net net-a", status(true));
    fixture.cli.respond("net get status -net net-b", status(false));
    fixture.cli.respond(
        "srv_stake list keys -net net-a -cert net-a.master",
        "stake_value: 1.0\nsovereign_addr: N/A\nsovereign_tax: 0\n",
    );
    fixture
        .cli
        .respond("tx_history -addr FEEA", reward_history(today, "14"));
    fixture
        .cli
        .respond("version", "cellframe-node version 5.3-360");

    let scheduler = fixture.scheduler(Duration::from_secs(1800));
    let report = scheduler.run_once().await.unwrap();
    assert_eq!(report.networks, 2);
    assert_eq!(report.export.failed, 0);

    // Artifact
    let artifact = fixture.artifact();
    assert_eq!(artifact["node_addr"], NODE_ADDR);
    assert_eq!(artifact["node_version"], "5.3-360");

    let net_a = &artifact["network_info"]["net-a"];
    assert_eq!(net_a["stake_value"], "1.0");
    assert_eq!(net_a["fee_addr_info"]["fee_addr"], "FEEA");
    assert_eq!(net_a["fee_addr_info"]["ma7"]["value"], 2.0);
    assert_eq!(
        net_a["fee_addr_info"]["rewards"].as_object().unwrap().len(),
        30
    );

    let net_b = &artifact["network_info"]["net-b"];
    assert_eq!(net_b["main_status"], "synced");
    assert!(net_b["stake_value"].is_null());
    assert!(net_b["fee_addr_info"].is_null());

    // Store
    let keys = fixture.keys();
    let has = |suffix: &str| keys.contains(&format!("{}_{}", KEY_PREFIX, suffix));
    assert!(has("hostname"));
    assert!(has("net-a_stake_value"));
    assert!(has("net-a_fee_addr_info_ma30_apy"));
    assert!(has("net-b_main_status"));
    assert!(!has("net-b_stake_value"));
    assert!(!keys.iter().any(|k| k.contains("net-b_fee_addr_info")));

    let reward_keys = keys.iter().filter(|k| k.contains("_rewards_")).count();
    assert_eq!(reward_keys, 2);

    let today_key = format!(
        "{}_net-a_fee_addr_info_rewards_{}",
        KEY_PREFIX,
        today.format(DAY_FORMAT).to_string().replace(',', "").replace(' ', "_")
    );
    assert_eq!(fixture.store.0.get("hub", &today_key).as_deref(), Some("14.0"));

    assert_eq!(fixture.cli.count("net list"), 1);
    assert_eq!(fixture.cli.count("tx_history"), 1);
}

#[tokio::test]
async fn test_net_list_failure_writes_empty_snapshot() {
    let fixture = Fixture::new();
    fixture.cli.fail("net list", 1, "socket not found");

    let scheduler = fixture.scheduler(Duration::from_secs(1800));
    let report = scheduler.run_once().await.unwrap();

    assert_eq!(report.networks, 0);
    let artifact = fixture.artifact();
    assert!(artifact["network_info"].as_object().unwrap().is_empty());
    assert_eq!(artifact["node_addr"], "unknown");
    // Export waits for a node address
    assert!(fixture.keys().is_empty());
}

#[tokio::test]
async fn test_loop_keeps_running_after_failed_cycles() {
    let fixture = Fixture::new();
    fixture.cli.fail("net list", 1, "socket not found");

    let scheduler = Arc::new(fixture.scheduler(Duration::from_millis(20)));
    let cancel = CancellationToken::new();
    let handle = {
        let scheduler = scheduler.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };

    tokio::time::timeout(Duration::from_secs(10), async {
        while fixture.cli.count("net list") < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    cancel.cancel();
    handle.await.unwrap();
    assert!(scheduler.health().read().await.cycles_run >= 3);
}

#[tokio::test]
async fn test_unwritable_artifact_fails_cycle_only() {
    let mut fixture = Fixture::new();
    let blocker = fixture._dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    fixture.config.collector.output_path = blocker.join("output.json");
    fixture.cli.respond("net list", "");

    let scheduler = fixture.scheduler(Duration::from_secs(1800));
    let err = scheduler.run_once().await.unwrap_err();
    assert!(err.contains("failed to write snapshot"));
    assert!(!scheduler.health().read().await.is_healthy);

    // The next cycle still runs
    assert!(scheduler.run_once().await.is_err());
    assert_eq!(scheduler.health().read().await.cycles_run, 2);
}
