//! Command execution.

use crate::{Commands, LoadBalancerAction};
use colored::Colorize;
use serde_json::{json, Value};
use ybrpc_client::{Client, ClientConfig, ClientError};
use ybrpc_protocol::message::list_tablet_servers_response_pb::Entry as TabletServerEntry;
use ybrpc_protocol::message::{
    GetMasterRegistrationResponsePb, HostPortPb, NodeInstancePb, PeerRole, ServerEntryPb,
    ServerRegistrationPb,
};
use ybrpc_protocol::{HybridTime, ObjectId};

/// Connects to the node a command targets: the given server, or the leader.
pub async fn connect(cmd: &Commands, config: &ClientConfig) -> Result<Client, ClientError> {
    match target(cmd) {
        Some(addr) => Client::connect_node(addr, config).await,
        None => Client::connect_leader(config).await,
    }
}

fn target(cmd: &Commands) -> Option<&str> {
    match cmd {
        Commands::MasterRegistration { server }
        | Commands::Ping { server }
        | Commands::ServerClock { server } => server.as_deref(),
        _ => None,
    }
}

/// Executes a command and returns the formatted output.
pub async fn execute(
    client: &Client,
    cmd: Commands,
    json: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Leader => {
            let registration = client.get_master_registration().await?;
            if json {
                let mut value = registration_json(&registration);
                value["address"] = json!(client.addr());
                return Ok(format_json(&value));
            }
            Ok(format!(
                "{} at {} ({})",
                "Leader".green(),
                client.addr().cyan(),
                instance_uuid(registration.instance_id.as_ref())
            ))
        }

        Commands::MasterRegistration { .. } => {
            let registration = client.get_master_registration().await?;
            if json {
                return Ok(format_json(&registration_json(&registration)));
            }
            Ok(format!(
                "{}\n  UUID: {}\n  Role: {}\n{}",
                format!("Master {}", client.addr().cyan()).bold(),
                instance_uuid(registration.instance_id.as_ref()),
                role_label(registration.peer_role()),
                format_registration(registration.registration.as_ref())
            ))
        }

        Commands::ListMasters => {
            let masters = client.list_masters().await?;
            if json {
                let items: Vec<Value> = masters.iter().map(server_entry_json).collect();
                return Ok(format_json(&Value::Array(items)));
            }
            if masters.is_empty() {
                return Ok("No masters reported".yellow().to_string());
            }

            let mut output = String::new();
            for entry in &masters {
                let addrs = entry
                    .registration
                    .as_ref()
                    .map(|r| join_host_ports(&r.private_rpc_addresses))
                    .unwrap_or_default();
                output.push_str(&format!(
                    "  {} {} [{}]",
                    instance_uuid(entry.instance_id.as_ref()).cyan(),
                    role_label(entry.peer_role()),
                    addrs
                ));
                if let Some(error) = &entry.error {
                    output.push_str(&format!(" {}: {}", "error".red(), error));
                }
                output.push('\n');
            }
            Ok(output)
        }

        Commands::ListTservers { primary_only } => {
            let servers = client.list_tablet_servers(primary_only).await?;
            if json {
                let items: Vec<Value> = servers.iter().map(tablet_server_json).collect();
                return Ok(format_json(&Value::Array(items)));
            }
            if servers.is_empty() {
                return Ok("No tablet servers registered".yellow().to_string());
            }

            let mut output = String::new();
            for server in &servers {
                let addrs = server
                    .registration
                    .as_ref()
                    .and_then(|r| r.common.as_ref())
                    .map(|c| join_host_ports(&c.private_rpc_addresses))
                    .unwrap_or_default();
                let alive = if server.alive.unwrap_or(false) {
                    "ALIVE".green()
                } else {
                    "DEAD".red()
                };
                output.push_str(&format!(
                    "  {} {} [{}] heartbeat {}ms ago\n",
                    instance_uuid(server.instance_id.as_ref()).cyan(),
                    alive,
                    addrs,
                    server.millis_since_heartbeat.unwrap_or(-1)
                ));
            }
            Ok(output)
        }

        Commands::Ping { .. } => {
            client.ping().await?;
            if json {
                return Ok(format_json(&json!({ "address": client.addr(), "ok": true })));
            }
            Ok("PONG".green().to_string())
        }

        Commands::ServerClock { .. } => {
            let clock = client.server_clock().await?;
            if json {
                return Ok(format_json(&clock_json(clock)));
            }
            match clock.to_datetime() {
                Some(at) => Ok(format!("{} ({})", clock, at.to_rfc3339().yellow())),
                None => Ok(clock.to_string()),
            }
        }

        Commands::LoadBalancer { action } => {
            let (label, value) = match action {
                LoadBalancerAction::Status => {
                    ("enabled", client.get_load_balancer_state().await?)
                }
                LoadBalancerAction::Enable => {
                    client.set_load_balancer_enabled(true).await?;
                    ("enabled", true)
                }
                LoadBalancerAction::Disable => {
                    client.set_load_balancer_enabled(false).await?;
                    ("enabled", false)
                }
                LoadBalancerAction::Idle => ("idle", client.is_load_balancer_idle().await?),
                LoadBalancerAction::Balanced { expected_servers } => (
                    "balanced",
                    client.is_load_balanced(expected_servers).await?,
                ),
            };
            if json {
                return Ok(format_json(&json!({ label: value })));
            }
            let shown = if value {
                "yes".green()
            } else {
                "no".yellow()
            };
            Ok(format!("Load balancer {}: {}", label, shown))
        }
    }
}

/// Permanent uuid in the 32-char form, or `?` if missing or malformed.
fn instance_uuid(instance: Option<&NodeInstancePb>) -> String {
    instance
        .and_then(|i| ObjectId::from_wire(&i.permanent_uuid).ok())
        .map(|id| id.to_string())
        .unwrap_or_else(|| "?".to_string())
}

fn role_label(role: Option<PeerRole>) -> String {
    match role {
        Some(PeerRole::Leader) => PeerRole::Leader.to_string().green().to_string(),
        Some(role) => role.to_string(),
        None => "UNKNOWN".dimmed().to_string(),
    }
}

fn join_host_ports(list: &[HostPortPb]) -> String {
    list.iter()
        .map(|hp| hp.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_registration(registration: Option<&ServerRegistrationPb>) -> String {
    let Some(registration) = registration else {
        return "  Registration: (none)".dimmed().to_string();
    };
    let mut output = format!(
        "  RPC: {}\n  HTTP: {}",
        join_host_ports(&registration.private_rpc_addresses),
        join_host_ports(&registration.http_addresses)
    );
    if let Some(cloud) = &registration.cloud_info {
        output.push_str(&format!("\n  Placement: {}", cloud));
    }
    output
}

fn host_ports_json(list: &[HostPortPb]) -> Value {
    list.iter().map(|hp| json!(hp.to_string())).collect()
}

fn server_registration_json(registration: Option<&ServerRegistrationPb>) -> Value {
    match registration {
        Some(r) => json!({
            "rpc_addresses": host_ports_json(&r.private_rpc_addresses),
            "http_addresses": host_ports_json(&r.http_addresses),
            "broadcast_addresses": host_ports_json(&r.broadcast_addresses),
            "placement": r.cloud_info.as_ref().map(|c| c.to_string()),
        }),
        None => Value::Null,
    }
}

fn role_json(role: Option<PeerRole>) -> Value {
    role.map(|r| json!(r.to_string())).unwrap_or(Value::Null)
}

fn registration_json(response: &GetMasterRegistrationResponsePb) -> Value {
    json!({
        "uuid": instance_uuid(response.instance_id.as_ref()),
        "role": role_json(response.peer_role()),
        "registration": server_registration_json(response.registration.as_ref()),
    })
}

fn server_entry_json(entry: &ServerEntryPb) -> Value {
    json!({
        "uuid": instance_uuid(entry.instance_id.as_ref()),
        "role": role_json(entry.peer_role()),
        "registration": server_registration_json(entry.registration.as_ref()),
        "error": entry.error.as_ref().map(|e| e.to_string()),
    })
}

fn tablet_server_json(server: &TabletServerEntry) -> Value {
    json!({
        "uuid": instance_uuid(server.instance_id.as_ref()),
        "alive": server.alive,
        "millis_since_heartbeat": server.millis_since_heartbeat,
        "registration": server_registration_json(
            server.registration.as_ref().and_then(|r| r.common.as_ref())
        ),
    })
}

fn clock_json(clock: HybridTime) -> Value {
    if !clock.is_valid() {
        return Value::Null;
    }
    json!({
        "raw": clock.raw(),
        "physical_micros": clock.physical_micros(),
        "logical": clock.logical(),
        "utc": clock.to_datetime().map(|t| t.to_rfc3339()),
    })
}

/// Formats JSON for display.
fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(uuid: &str) -> NodeInstancePb {
        NodeInstancePb {
            permanent_uuid: uuid.as_bytes().to_vec(),
            instance_seqno: 1,
        }
    }

    #[test]
    fn test_target() {
        let ping = Commands::Ping {
            server: Some("10.0.0.1:9100".to_string()),
        };
        assert_eq!(target(&ping), Some("10.0.0.1:9100"));
        assert_eq!(target(&Commands::Ping { server: None }), None);
        assert_eq!(target(&Commands::ListMasters), None);
    }

    #[test]
    fn test_instance_uuid() {
        let instance = node("0f1e2d3c4b5a69788796a5b4c3d2e1f0");
        assert_eq!(
            instance_uuid(Some(&instance)),
            "0f1e2d3c4b5a69788796a5b4c3d2e1f0"
        );
        assert_eq!(instance_uuid(Some(&node("not-a-uuid"))), "?");
        assert_eq!(instance_uuid(None), "?");
    }

    #[test]
    fn test_registration_json() {
        let response = GetMasterRegistrationResponsePb {
            instance_id: Some(node("0f1e2d3c4b5a69788796a5b4c3d2e1f0")),
            registration: Some(ServerRegistrationPb {
                private_rpc_addresses: vec![HostPortPb {
                    host: "10.0.0.1".to_string(),
                    port: 7100,
                }],
                ..Default::default()
            }),
            role: Some(PeerRole::Leader as i32),
            error: None,
        };

        let value = registration_json(&response);
        assert_eq!(value["uuid"], "0f1e2d3c4b5a69788796a5b4c3d2e1f0");
        assert_eq!(value["role"], PeerRole::Leader.to_string());
        assert_eq!(value["registration"]["rpc_addresses"][0], "10.0.0.1:7100");
        assert!(value["registration"]["placement"].is_null());
    }

    #[test]
    fn test_clock_json() {
        assert!(clock_json(HybridTime::INVALID).is_null());

        let value = clock_json(HybridTime::from_parts(1_000_000, 3));
        assert_eq!(value["physical_micros"], 1_000_000);
        assert_eq!(value["logical"], 3);
        assert_eq!(value["utc"], "1970-01-01T00:00:01+00:00");
    }
}
