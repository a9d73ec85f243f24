// Routes module - route table snapshots, CIDR matching and the compliance check

pub mod cidr;
pub mod evaluator;
pub mod parser;

use serde::{Deserialize, Serialize};

/// Gateway id AWS assigns to the implicit route for the VPC's own range
pub const LOCAL_GATEWAY: &str = "local";

/// Origin of routes created together with the route table
pub const ORIGIN_CREATE_ROUTE_TABLE: &str = "CreateRouteTable";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Route {
    pub destination_cidr_block: String, // CIDR notation, either family
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_ipv6_cidr_block: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_prefix_list_id: Option<String>,
    pub gateway_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nat_gateway_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_interface_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_peering_connection_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transit_gateway_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    pub state: String,
    pub origin: String,
}

impl Route {
    /// Destination blocks this route applies to, IPv4 field first
    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.destination_cidr_block.as_str())
            .chain(self.destination_ipv6_cidr_block.as_deref())
            .filter(|d| !d.is_empty())
    }

    /// Whether the route is the table's implicit local route rather than
    /// one created to send traffic somewhere else
    pub fn is_default_gateway(&self) -> bool {
        self.gateway_id == LOCAL_GATEWAY || self.origin == ORIGIN_CREATE_ROUTE_TABLE
    }

    /// The target traffic is sent to, whichever kind it is
    pub fn target(&self) -> &str {
        [
            Some(self.gateway_id.as_str()),
            self.nat_gateway_id.as_deref(),
            self.network_interface_id.as_deref(),
            self.vpc_peering_connection_id.as_deref(),
            self.transit_gateway_id.as_deref(),
            self.instance_id.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|t| !t.is_empty())
        .unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTableConfiguration {
    pub route_table_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(default)]
    pub routes: Vec<Route>,
}
