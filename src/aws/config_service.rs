// AWS Config API: configuration history lookups and evaluation submission

use async_trait::async_trait;
use aws_sdk_config::Client;
use aws_sdk_config::config::{Builder, Credentials};
use aws_sdk_config::primitives::DateTime as AwsDateTime;
use aws_sdk_config::types::{ComplianceType, Evaluation, ResourceType};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use super::{ConfigService, SessionCredentials};
use crate::error::{AppError, AppResult};
use crate::rule::ComplianceVerdict;
use crate::rule::event::ConfigurationItem;

/// PutEvaluations accepts at most this many evaluations per call
pub const MAX_EVALUATIONS_PER_CALL: usize = 100;

pub struct AwsConfigService {
    sdk_config: aws_config::SdkConfig,
}

impl AwsConfigService {
    pub fn new(sdk_config: aws_config::SdkConfig) -> Self {
        AwsConfigService { sdk_config }
    }

    fn client(&self, session: Option<&SessionCredentials>) -> Client {
        match session {
            None => Client::new(&self.sdk_config),
            Some(session) => {
                let credentials = Credentials::new(
                    session.access_key_id.clone(),
                    session.secret_access_key.clone(),
                    Some(session.session_token.clone()),
                    None,
                    "assumed-execution-role",
                );
                let conf = Builder::from(&self.sdk_config)
                    .credentials_provider(credentials)
                    .build();
                Client::from_conf(conf)
            }
        }
    }
}

#[async_trait]
impl ConfigService for AwsConfigService {
    async fn resource_history(
        &self,
        session: Option<&SessionCredentials>,
        resource_type: &str,
        resource_id: &str,
    ) -> AppResult<ConfigurationItem> {
        let output = self
            .client(session)
            .get_resource_config_history()
            .resource_type(ResourceType::from(resource_type))
            .resource_id(resource_id)
            .limit(1)
            .send()
            .await
            .map_err(|e| AppError::ConfigService(format!("GetResourceConfigHistory: {}", e)))?;

        let item = output.configuration_items().first().ok_or_else(|| {
            AppError::ConfigService(format!("No configuration history for {}", resource_id))
        })?;

        Ok(ConfigurationItem {
            resource_id: item.resource_id().unwrap_or(resource_id).to_string(),
            resource_type: item.resource_type().map(|t| t.as_str().to_string()),
            configuration_item_status: item
                .configuration_item_status()
                .map(|s| s.as_str().to_string()),
            configuration_item_capture_time: item
                .configuration_item_capture_time()
                .and_then(|t| Utc.timestamp_opt(t.secs(), t.subsec_nanos()).single()),
            // Left encoded; unreadable payloads are judged NOT_APPLICABLE downstream
            configuration: item.configuration().map(|raw| Value::String(raw.to_string())),
        })
    }

    async fn put_evaluations(
        &self,
        session: Option<&SessionCredentials>,
        evaluations: &[ComplianceVerdict],
        result_token: &str,
        test_mode: bool,
    ) -> AppResult<()> {
        let client = self.client(session);
        let evaluations = evaluations
            .iter()
            .map(to_evaluation)
            .collect::<AppResult<Vec<_>>>()?;

        for batch in evaluations.chunks(MAX_EVALUATIONS_PER_CALL) {
            let output = client
                .put_evaluations()
                .set_evaluations(Some(batch.to_vec()))
                .result_token(result_token)
                .test_mode(test_mode)
                .send()
                .await
                .map_err(|e| AppError::ConfigService(format!("PutEvaluations: {}", e)))?;

            let failed = output.failed_evaluations();
            if !failed.is_empty() {
                tracing::warn!("AWS Config rejected {} evaluation(s)", failed.len());
            }
        }

        tracing::info!(
            "Submitted {} evaluation(s){}",
            evaluations.len(),
            if test_mode { " in test mode" } else { "" }
        );
        Ok(())
    }
}

fn to_evaluation(verdict: &ComplianceVerdict) -> AppResult<Evaluation> {
    Evaluation::builder()
        .compliance_resource_type(&verdict.compliance_resource_type)
        .compliance_resource_id(&verdict.compliance_resource_id)
        .compliance_type(ComplianceType::from(verdict.compliance_type.as_str()))
        .set_annotation(verdict.annotation.clone())
        .ordering_timestamp(to_aws_timestamp(verdict.ordering_timestamp))
        .build()
        .map_err(|e| AppError::ConfigService(format!("Invalid evaluation: {}", e)))
}

fn to_aws_timestamp(ts: DateTime<Utc>) -> AwsDateTime {
    AwsDateTime::from_millis(ts.timestamp_millis())
}
