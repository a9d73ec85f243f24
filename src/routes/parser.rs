// Route table parsing from recorded resource configuration payloads

use super::{Route, RouteTableConfiguration};
use serde_json::Value;

/// Parse the `configuration` object of a route table configuration item.
///
/// Individual route fields are read leniently and entries that are not
/// objects are skipped; only a payload whose shape is not a route table at
/// all is rejected.
pub fn parse_route_table(configuration: &Value) -> Result<RouteTableConfiguration, String> {
    let object = configuration
        .as_object()
        .ok_or_else(|| format!("Route table configuration is not an object: {}", configuration))?;

    let route_table_id = object
        .get("routeTableId")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let vpc_id = object
        .get("vpcId")
        .and_then(|v| v.as_str())
        .map(String::from);

    let routes = match object.get("routes") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(entries)) => entries.iter().filter_map(parse_route).collect(),
        Some(other) => return Err(format!("Route list is not an array: {}", other)),
    };

    Ok(RouteTableConfiguration {
        route_table_id,
        vpc_id,
        routes,
    })
}

/// Parse a configuration that AWS Config delivered as a JSON-encoded string
pub fn parse_route_table_str(json_str: &str) -> Result<RouteTableConfiguration, String> {
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| format!("Failed to parse JSON: {}", e))?;
    parse_route_table(&value)
}

fn parse_route(entry: &Value) -> Option<Route> {
    if !entry.is_object() {
        tracing::debug!("Skipping route entry that is not an object: {}", entry);
        return None;
    }

    let text = |key: &str| {
        entry
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    let optional = |key: &str| {
        entry
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
    };

    Some(Route {
        destination_cidr_block: text("destinationCidrBlock"),
        destination_ipv6_cidr_block: optional("destinationIpv6CidrBlock"),
        destination_prefix_list_id: optional("destinationPrefixListId"),
        gateway_id: text("gatewayId"),
        nat_gateway_id: optional("natGatewayId"),
        network_interface_id: optional("networkInterfaceId"),
        vpc_peering_connection_id: optional("vpcPeeringConnectionId"),
        transit_gateway_id: optional("transitGatewayId"),
        instance_id: optional("instanceId"),
        state: text("state"),
        origin: text("origin"),
    })
}
