// Path: crates/cli/src/commands/status.rs

//! `holomush status`: remote status of both processes over the control
//! plane. The process exits 0 even when components are down; the payload
//! carries the failure.

use clap::Args;
use holomush_control::ControlClient;
use holomush_types::{Component, STATUS_DIAL_TIMEOUT};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit JSON instead of a table.
    #[clap(long)]
    json: bool,

    /// Control address of the core process.
    #[clap(long, default_value = "127.0.0.1:9001")]
    core_addr: String,

    /// Control address of the gateway process.
    #[clap(long, default_value = "127.0.0.1:9002")]
    gateway_addr: String,
}

/// One component's reported (or inferred) state.
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub component: String,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentStatus {
    fn down(component: Component, error: String) -> Self {
        Self {
            component: component.name().to_string(),
            running: false,
            health: None,
            pid: None,
            uptime_seconds: None,
            error: Some(error),
        }
    }
}

pub async fn run(args: StatusArgs) -> Result<(), holomush_types::error::StartupError> {
    let certs_dir = holomush_types::paths::certs_dir();
    let targets = [
        (Component::Core, args.core_addr.clone()),
        (Component::Gateway, args.gateway_addr.clone()),
    ];

    let mut statuses = Vec::with_capacity(targets.len());
    for (component, addr) in targets {
        statuses.push(probe(&certs_dir, component, &addr).await);
    }

    if args.json {
        let by_component: BTreeMap<_, _> = statuses
            .iter()
            .map(|s| (s.component.clone(), s))
            .collect();
        match serde_json::to_string_pretty(&by_component) {
            Ok(payload) => println!("{payload}"),
            Err(e) => eprintln!("error: failed to render status payload: {e}"),
        }
    } else {
        print!("{}", render_table(&statuses));
    }

    // Down components are reported in the payload, never via the exit code.
    Ok(())
}

/// Dials one component's control server and maps every failure into the
/// payload instead of an error.
async fn probe(certs_dir: &Path, component: Component, addr: &str) -> ComponentStatus {
    // Dial with the opposite component's leaf, the same pairing the
    // processes use between themselves.
    let bundle = match holomush_identity::load_existing(certs_dir, component.peer()) {
        Ok(bundle) => bundle,
        Err(e) => return ComponentStatus::down(component, e.to_string()),
    };

    let mut client = match ControlClient::connect(addr, bundle.client, STATUS_DIAL_TIMEOUT).await {
        Ok(client) => client,
        Err(e) => return ComponentStatus::down(component, format!("{e:#}")),
    };

    match client.status().await {
        Ok(status) => ComponentStatus {
            component: component.name().to_string(),
            running: status.running,
            health: Some(if status.running { "healthy" } else { "stopping" }.to_string()),
            pid: Some(status.pid),
            uptime_seconds: Some(status.uptime_seconds),
            error: None,
        },
        Err(e) => ComponentStatus::down(component, format!("{e:#}")),
    }
}

/// Renders the text table. Kept pure for tests.
fn render_table(statuses: &[ComponentStatus]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<10} {:<8} {:<9} {:<7} {:<8}\n",
        "COMPONENT", "RUNNING", "HEALTH", "PID", "UPTIME"
    ));
    for status in statuses {
        let health = status.health.as_deref().unwrap_or("-");
        let pid = status
            .pid
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let uptime = status
            .uptime_seconds
            .map(|s| format!("{s}s"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<10} {:<8} {:<9} {:<7} {:<8}",
            status.component, status.running, health, pid, uptime
        ));
        if let Some(error) = &status.error {
            out.push_str(&format!("  error: {error}"));
        }
        out.push('\n');
    }
    out
}
