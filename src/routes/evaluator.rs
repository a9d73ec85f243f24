// Route compliance evaluation against the watched metadata address blocks

use super::cidr::{Cidr, CidrError};
use super::{Route, RouteTableConfiguration};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

/// The instance metadata endpoint, watched when nothing else is configured
pub const DEFAULT_METADATA_ADDRESS: Ipv4Addr = Ipv4Addr::new(169, 254, 169, 254);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    NotApplicable,
}

impl ComplianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceStatus::Compliant => "COMPLIANT",
            ComplianceStatus::NonCompliant => "NON_COMPLIANT",
            ComplianceStatus::NotApplicable => "NOT_APPLICABLE",
        }
    }
}

/// Address blocks a route must not redirect. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedCidrSet {
    blocks: Vec<Cidr>,
}

impl WatchedCidrSet {
    /// Build a set from parsed blocks, falling back to the metadata address
    /// when none are given
    pub fn new(blocks: impl IntoIterator<Item = Cidr>) -> Self {
        let mut unique: Vec<Cidr> = Vec::new();
        for block in blocks {
            if !unique.contains(&block) {
                unique.push(block);
            }
        }
        if unique.is_empty() {
            return Self::default();
        }
        WatchedCidrSet { blocks: unique }
    }

    pub fn parse<I, S>(blocks: I) -> Result<Self, CidrError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = blocks
            .into_iter()
            .map(|b| b.as_ref().parse::<Cidr>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(parsed))
    }

    pub fn blocks(&self) -> &[Cidr] {
        &self.blocks
    }
}

impl Default for WatchedCidrSet {
    fn default() -> Self {
        WatchedCidrSet {
            blocks: vec![Cidr::host(IpAddr::V4(DEFAULT_METADATA_ADDRESS))],
        }
    }
}

/// A route that sends watched traffic through a non-default gateway
#[derive(Debug, Clone, Copy)]
pub struct RedirectingRoute<'a> {
    pub route: &'a Route,
    pub destination: Cidr,
    pub watched: Cidr,
}

impl RedirectingRoute<'_> {
    pub fn annotation(&self) -> String {
        format!(
            "Route to {} (within watched block {}) is sent through {} instead of the local gateway.",
            self.destination,
            self.watched,
            self.route.target()
        )
    }
}

pub struct RouteEvaluator<'a> {
    watched: &'a WatchedCidrSet,
}

impl<'a> RouteEvaluator<'a> {
    pub fn new(watched: &'a WatchedCidrSet) -> Self {
        RouteEvaluator { watched }
    }

    /// Find the first route whose destination falls inside a watched block
    /// and whose target is not the table's local gateway.
    ///
    /// Watched blocks are checked in order; the scan stops at the first hit.
    pub fn find_redirect<'t>(&self, table: &'t RouteTableConfiguration) -> Option<RedirectingRoute<'t>> {
        for watched in self.watched.blocks() {
            for route in &table.routes {
                if route.is_default_gateway() {
                    continue;
                }
                // Unparseable destinations (e.g. prefix list routes) never match
                let hit = route
                    .destinations()
                    .filter_map(|d| d.parse::<Cidr>().ok())
                    .find(|dest| watched.contains(dest));

                if let Some(destination) = hit {
                    return Some(RedirectingRoute {
                        route,
                        destination,
                        watched: *watched,
                    });
                }
            }
        }
        None
    }

    /// Classify a table and keep the redirect that decided it, from a single scan
    pub fn assess<'t>(
        &self,
        table: Option<&'t RouteTableConfiguration>,
    ) -> (ComplianceStatus, Option<RedirectingRoute<'t>>) {
        let Some(table) = table else {
            return (ComplianceStatus::NotApplicable, None);
        };
        match self.find_redirect(table) {
            Some(redirect) => (ComplianceStatus::NonCompliant, Some(redirect)),
            None => (ComplianceStatus::Compliant, None),
        }
    }

    pub fn evaluate(&self, table: Option<&RouteTableConfiguration>) -> ComplianceStatus {
        self.assess(table).0
    }
}

/// Classify a route table; `None` stands for an absent or unreadable configuration
#[allow(dead_code)] // Used in tests
pub fn evaluate(table: Option<&RouteTableConfiguration>, watched: &WatchedCidrSet) -> ComplianceStatus {
    RouteEvaluator::new(watched).evaluate(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(dest: &str, gateway: &str, origin: &str) -> Route {
        Route {
            destination_cidr_block: dest.to_string(),
            gateway_id: gateway.to_string(),
            state: "active".to_string(),
            origin: origin.to_string(),
            ..Default::default()
        }
    }

    fn table(routes: Vec<Route>) -> RouteTableConfiguration {
        RouteTableConfiguration {
            route_table_id: "rtb-0123".to_string(),
            vpc_id: Some("vpc-0123".to_string()),
            routes,
        }
    }

    fn baseline_routes() -> Vec<Route> {
        vec![
            route("10.0.0.0/16", "local", "CreateRouteTable"),
            route("0.0.0.0/0", "igw-a5f227c1", "CreateRoute"),
        ]
    }

    #[test]
    fn test_empty_routes_are_compliant() {
        let watched = WatchedCidrSet::parse(["169.254.169.254/32"]).unwrap();
        assert_eq!(evaluate(Some(&table(vec![])), &watched), ComplianceStatus::Compliant);
    }

    #[test]
    fn test_metadata_route_through_gateway_is_non_compliant() {
        let t = table(vec![route("169.254.169.254/32", "igw-x", "CreateRoute")]);
        assert_eq!(
            evaluate(Some(&t), &WatchedCidrSet::default()),
            ComplianceStatus::NonCompliant
        );
    }

    #[test]
    fn test_ipv6_route_never_matches_ipv4_block() {
        let watched = WatchedCidrSet::parse(["169.254.169.254/32"]).unwrap();
        let t = table(vec![route("2001:db8:a::00/64", "igw-x", "CreateRoute")]);
        assert_eq!(evaluate(Some(&t), &watched), ComplianceStatus::Compliant);
    }

    #[test]
    fn test_ipv4_route_never_matches_ipv6_block() {
        let watched = WatchedCidrSet::parse(["fd00:ec2::254/128"]).unwrap();
        let t = table(vec![route("169.254.169.254/32", "igw-x", "CreateRoute")]);
        assert_eq!(evaluate(Some(&t), &watched), ComplianceStatus::Compliant);

        let mut v6 = route("", "igw-x", "CreateRoute");
        v6.destination_ipv6_cidr_block = Some("fd00:ec2::254/128".to_string());
        let t = table(vec![v6]);
        assert_eq!(evaluate(Some(&t), &watched), ComplianceStatus::NonCompliant);
    }

    #[test]
    fn test_unrelated_routes_are_compliant() {
        let t = table(baseline_routes());
        assert_eq!(
            evaluate(Some(&t), &WatchedCidrSet::default()),
            ComplianceStatus::Compliant
        );
    }

    #[test]
    fn test_local_route_to_metadata_is_compliant() {
        let t = table(vec![route("169.254.169.254/32", "local", "CreateRouteTable")]);
        assert_eq!(
            evaluate(Some(&t), &WatchedCidrSet::default()),
            ComplianceStatus::Compliant
        );
    }

    #[test]
    fn test_missing_configuration_is_not_applicable() {
        assert_eq!(
            evaluate(None, &WatchedCidrSet::default()),
            ComplianceStatus::NotApplicable
        );
    }

    #[test]
    fn test_empty_watched_set_falls_back_to_metadata_address() {
        let watched = WatchedCidrSet::parse(Vec::<String>::new()).unwrap();
        assert_eq!(watched, WatchedCidrSet::default());
        assert_eq!(watched.blocks()[0].to_string(), "169.254.169.254/32");
    }

    #[test]
    fn test_first_redirect_wins() {
        let mut routes = baseline_routes();
        routes.push(route("169.254.169.254/32", "igw-first", "CreateRoute"));
        routes.push(route("169.254.169.254/32", "igw-second", "CreateRoute"));
        let t = table(routes);

        let watched = WatchedCidrSet::default();
        let evaluator = RouteEvaluator::new(&watched);
        let hit = evaluator.find_redirect(&t).unwrap();
        assert_eq!(hit.route.gateway_id, "igw-first");
        assert!(hit.annotation().contains("igw-first"));
        assert_eq!(evaluator.evaluate(Some(&t)), ComplianceStatus::NonCompliant);

        let (status, redirect) = evaluator.assess(Some(&t));
        assert_eq!(status, ComplianceStatus::NonCompliant);
        assert_eq!(redirect.unwrap().route.gateway_id, "igw-first");
    }

    #[test]
    fn test_assess_without_redirect() {
        let watched = WatchedCidrSet::default();
        let evaluator = RouteEvaluator::new(&watched);
        let t = table(baseline_routes());
        assert!(matches!(
            evaluator.assess(Some(&t)),
            (ComplianceStatus::Compliant, None)
        ));
        assert!(matches!(
            evaluator.assess(None),
            (ComplianceStatus::NotApplicable, None)
        ));
    }

    #[test]
    fn test_route_inside_wider_watched_block_matches() {
        let watched = WatchedCidrSet::parse(["169.254.0.0/16"]).unwrap();
        let t = table(vec![route("169.254.170.2/32", "eni-1", "CreateRoute")]);
        assert_eq!(evaluate(Some(&t), &watched), ComplianceStatus::NonCompliant);
    }

    #[test]
    fn test_default_route_does_not_cover_watched_host() {
        let watched = WatchedCidrSet::default();
        let t = table(vec![route("0.0.0.0/0", "igw-x", "CreateRoute")]);
        assert_eq!(evaluate(Some(&t), &watched), ComplianceStatus::Compliant);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let mut routes = baseline_routes();
        routes.push(route("169.254.169.254/32", "igw-x", "CreateRoute"));
        let t = table(routes);
        let watched = WatchedCidrSet::default();
        assert_eq!(evaluate(Some(&t), &watched), evaluate(Some(&t), &watched));
    }

    #[test]
    fn test_duplicate_watched_blocks_collapse() {
        let watched = WatchedCidrSet::parse(["169.254.169.254/32", "169.254.169.254"]).unwrap();
        assert_eq!(watched.blocks().len(), 1);

        let watched = WatchedCidrSet::parse(["10.0.0.0/8", "10.1.2.3/8"]).unwrap();
        assert_eq!(watched.blocks().len(), 1);
        assert_eq!(watched.blocks()[0].to_string(), "10.0.0.0/8");
    }
}
