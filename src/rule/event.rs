// Rule invocation envelope and its normalisation into a single input type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ACCOUNT_RESOURCE_TYPE, ROUTE_TABLE_RESOURCE_TYPE};
use crate::error::{AppError, AppResult};
use crate::routes::parser;
use crate::routes::RouteTableConfiguration;

pub const CHANGE_NOTIFICATION: &str = "ConfigurationItemChangeNotification";
pub const OVERSIZED_CHANGE_NOTIFICATION: &str = "OversizedConfigurationItemChangeNotification";
pub const SCHEDULED_NOTIFICATION: &str = "ScheduledNotification";

/// Result token AWS Config sends when the rule is invoked in test mode
pub const TEST_MODE_TOKEN: &str = "TESTMODE";

const DELETED_STATUSES: [&str; 2] = ["ResourceDeleted", "ResourceDeletedNotRecorded"];

/// The event a custom AWS Config rule is invoked with
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigRuleEvent {
    pub config_rule_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_role_arn: Option<String>,
    pub event_left_scope: bool,
    /// JSON-encoded [`InvokingEvent`]
    pub invoking_event: String,
    /// JSON-encoded rule parameter map
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_parameters: Option<String>,
    pub account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_rule_arn: Option<String>,
    pub result_token: String,
}

impl ConfigRuleEvent {
    pub fn invoking_event(&self) -> AppResult<InvokingEvent> {
        serde_json::from_str(&self.invoking_event)
            .map_err(|e| AppError::InvalidEvent(format!("invokingEvent is not valid JSON: {}", e)))
    }

    pub fn is_test_mode(&self) -> bool {
        self.result_token == TEST_MODE_TOKEN
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvokingEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_item: Option<ConfigurationItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_item_summary: Option<ConfigurationItemSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_creation_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigurationItem {
    pub resource_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_item_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_item_capture_time: Option<DateTime<Utc>>,
    /// Resource configuration, either an object or a JSON-encoded string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Value>,
}

/// Summary sent instead of the item when the item is too large for the event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigurationItemSummary {
    pub resource_id: String,
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_item_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_item_capture_time: Option<DateTime<Utc>>,
}

/// The shapes of notification this rule understands
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Change(ConfigurationItem),
    Oversized(ConfigurationItemSummary),
    Scheduled,
}

impl InvokingEvent {
    pub fn notification(&self) -> AppResult<Notification> {
        match (self.message_type.as_deref(), &self.configuration_item) {
            (Some(CHANGE_NOTIFICATION), Some(item)) | (None, Some(item)) => {
                Ok(Notification::Change(item.clone()))
            }
            (Some(CHANGE_NOTIFICATION), None) => Err(AppError::InvalidEvent(
                "change notification without a configurationItem".to_string(),
            )),
            (Some(OVERSIZED_CHANGE_NOTIFICATION), _) => self
                .configuration_item_summary
                .clone()
                .map(Notification::Oversized)
                .ok_or_else(|| {
                    AppError::InvalidEvent(
                        "oversized notification without a configurationItemSummary".to_string(),
                    )
                }),
            (Some(SCHEDULED_NOTIFICATION), _) => Ok(Notification::Scheduled),
            (Some(other), _) => Err(AppError::UnexpectedMessageType(other.to_string())),
            (None, None) => Err(AppError::UnexpectedMessageType("<missing>".to_string())),
        }
    }
}

/// One route table as seen by the evaluator, whatever notification carried it
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSnapshot {
    pub resource_id: String,
    pub resource_type: Option<String>,
    pub status: Option<String>,
    pub event_left_scope: bool,
    /// `None` when the configuration is absent or unreadable
    pub configuration: Option<RouteTableConfiguration>,
}

impl ResourceSnapshot {
    pub fn from_item(item: &ConfigurationItem, event_left_scope: bool) -> Self {
        let configuration = match &item.configuration {
            None | Some(Value::Null) => None,
            Some(Value::String(encoded)) => parser::parse_route_table_str(encoded).ok(),
            Some(value) => parser::parse_route_table(value).ok(),
        };

        if configuration.is_none() {
            tracing::debug!(
                "No readable route table configuration for {}",
                item.resource_id
            );
        }

        ResourceSnapshot {
            resource_id: item.resource_id.clone(),
            resource_type: item.resource_type.clone(),
            status: item.configuration_item_status.clone(),
            event_left_scope,
            configuration,
        }
    }

    /// Why the resource cannot be evaluated, if it cannot
    pub fn not_applicable_reason(&self) -> Option<String> {
        if self.event_left_scope {
            return Some("Resource left the scope of the rule.".to_string());
        }
        if let Some(status) = self.status.as_deref() {
            if DELETED_STATUSES.contains(&status) {
                return Some("Resource was deleted.".to_string());
            }
        }
        if let Some(resource_type) = self.resource_type.as_deref() {
            if resource_type != ROUTE_TABLE_RESOURCE_TYPE {
                return Some(format!("Resource type {} is not evaluated by this rule.", resource_type));
            }
        }
        if self.configuration.is_none() {
            return Some("Route table configuration is missing or malformed.".to_string());
        }
        None
    }
}

/// Normalised rule input
#[derive(Debug, Clone, PartialEq)]
pub enum RuleInput {
    Resource {
        snapshot: ResourceSnapshot,
        ordering_timestamp: DateTime<Utc>,
    },
    Scheduled {
        account_id: String,
        ordering_timestamp: DateTime<Utc>,
    },
}

impl RuleInput {
    pub fn resource(
        item: &ConfigurationItem,
        event: &ConfigRuleEvent,
        invoking: &InvokingEvent,
    ) -> Self {
        RuleInput::Resource {
            snapshot: ResourceSnapshot::from_item(item, event.event_left_scope),
            ordering_timestamp: ordering_timestamp(item.configuration_item_capture_time, invoking),
        }
    }

    pub fn scheduled(event: &ConfigRuleEvent, invoking: &InvokingEvent) -> Self {
        RuleInput::Scheduled {
            account_id: event.account_id.clone(),
            ordering_timestamp: ordering_timestamp(None, invoking),
        }
    }

    /// Resource type to report; the item's own type when it carries one
    pub fn resource_type(&self) -> &str {
        match self {
            RuleInput::Resource { snapshot, .. } => snapshot
                .resource_type
                .as_deref()
                .unwrap_or(ROUTE_TABLE_RESOURCE_TYPE),
            RuleInput::Scheduled { .. } => ACCOUNT_RESOURCE_TYPE,
        }
    }
}

fn ordering_timestamp(capture_time: Option<DateTime<Utc>>, invoking: &InvokingEvent) -> DateTime<Utc> {
    capture_time
        .or(invoking.notification_creation_time)
        .unwrap_or_else(Utc::now)
}
