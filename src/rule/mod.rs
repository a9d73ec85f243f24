// Rule module - AWS Config rule adapter around the route evaluator

pub mod event;
pub mod handler;
pub mod params;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::routes::evaluator::{ComplianceStatus, WatchedCidrSet};

pub const RULE_NAME: &str = "NonDefaultMetadataServer";

/// Resource type this rule evaluates
pub const ROUTE_TABLE_RESOURCE_TYPE: &str = "AWS::EC2::RouteTable";

/// Resource type reported for account-level (scheduled) evaluations
pub const ACCOUNT_RESOURCE_TYPE: &str = "AWS::::Account";

const MAX_ANNOTATION_LEN: usize = 256;
const TRUNCATED_SUFFIX: &str = " [truncated]";

/// Per-invocation settings passed to the handler
#[derive(Debug, Clone)]
pub struct RuleSettings {
    /// Assume the event's execution role before calling AWS Config
    pub assume_role_mode: bool,
    /// Watched blocks used when the rule parameters name none
    pub default_watched: WatchedCidrSet,
    /// Send verdicts to AWS Config in addition to returning them
    pub submit_evaluations: bool,
    /// Attach internal error messages to customer errors
    pub expose_internal_errors: bool,
}

impl Default for RuleSettings {
    fn default() -> Self {
        RuleSettings {
            assume_role_mode: false,
            default_watched: WatchedCidrSet::default(),
            submit_evaluations: true,
            expose_internal_errors: false,
        }
    }
}

/// One compliance result, in the shape AWS Config's PutEvaluations expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComplianceVerdict {
    pub compliance_resource_type: String,
    pub compliance_resource_id: String,
    pub compliance_type: ComplianceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    pub ordering_timestamp: DateTime<Utc>,
}

impl ComplianceVerdict {
    pub fn new(
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        status: ComplianceStatus,
        ordering_timestamp: DateTime<Utc>,
    ) -> Self {
        ComplianceVerdict {
            compliance_resource_type: resource_type.into(),
            compliance_resource_id: resource_id.into(),
            compliance_type: status,
            annotation: None,
            ordering_timestamp,
        }
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        let annotation = annotation.into();
        if !annotation.is_empty() {
            self.annotation = Some(truncate_annotation(&annotation));
        }
        self
    }
}

/// AWS Config rejects annotations longer than 256 characters
fn truncate_annotation(annotation: &str) -> String {
    if annotation.chars().count() <= MAX_ANNOTATION_LEN {
        return annotation.to_string();
    }
    let keep = MAX_ANNOTATION_LEN - TRUNCATED_SUFFIX.len();
    let mut truncated: String = annotation.chars().take(keep).collect();
    truncated.push_str(TRUNCATED_SUFFIX);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_wire_format() {
        let ts = "2020-08-25T17:20:52.158Z".parse::<DateTime<Utc>>().unwrap();
        let verdict = ComplianceVerdict::new(
            ROUTE_TABLE_RESOURCE_TYPE,
            "rtb-1",
            ComplianceStatus::NonCompliant,
            ts,
        )
        .with_annotation("redirected");

        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["ComplianceResourceType"], "AWS::EC2::RouteTable");
        assert_eq!(json["ComplianceResourceId"], "rtb-1");
        assert_eq!(json["ComplianceType"], "NON_COMPLIANT");
        assert_eq!(json["Annotation"], "redirected");
        assert!(json["OrderingTimestamp"].as_str().unwrap().starts_with("2020-08-25T17:20:52"));
    }

    #[test]
    fn test_long_annotation_is_truncated() {
        let long = "x".repeat(400);
        let verdict = ComplianceVerdict::new("t", "id", ComplianceStatus::Compliant, Utc::now())
            .with_annotation(long);
        let annotation = verdict.annotation.unwrap();
        assert_eq!(annotation.chars().count(), 256);
        assert!(annotation.ends_with(" [truncated]"));
    }

    #[test]
    fn test_empty_annotation_is_omitted() {
        let verdict = ComplianceVerdict::new("t", "id", ComplianceStatus::Compliant, Utc::now())
            .with_annotation("");
        assert!(verdict.annotation.is_none());
        let json = serde_json::to_value(&verdict).unwrap();
        assert!(json.get("Annotation").is_none());
    }
}
