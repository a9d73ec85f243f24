// Rule invocation handling: event in, verdicts or a customer error out

use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use super::event::{ConfigRuleEvent, Notification, RuleInput};
use super::params::RuleParameters;
use super::{ComplianceVerdict, RULE_NAME, RuleSettings};
use crate::aws::{ConfigService, CredentialProvider, SessionCredentials};
use crate::error::{AppError, AppResult, CustomerError};
use crate::routes::evaluator::{ComplianceStatus, RouteEvaluator, WatchedCidrSet};

/// Everything an invocation needs besides the event itself
#[derive(Clone)]
pub struct RuleContext {
    pub settings: RuleSettings,
    pub credentials: Arc<dyn CredentialProvider>,
    pub config_service: Arc<dyn ConfigService>,
}

impl RuleContext {
    pub fn new(
        settings: RuleSettings,
        credentials: Arc<dyn CredentialProvider>,
        config_service: Arc<dyn ConfigService>,
    ) -> Self {
        RuleContext {
            settings,
            credentials,
            config_service,
        }
    }

    /// Handle one rule invocation.
    ///
    /// Returns the verdicts (also submitted to AWS Config when enabled) or the
    /// customer error the framework should see.
    pub async fn handle(&self, event: &ConfigRuleEvent) -> Result<Vec<ComplianceVerdict>, CustomerError> {
        let rule_name = if event.config_rule_name.is_empty() {
            RULE_NAME
        } else {
            event.config_rule_name.as_str()
        };
        let span = tracing::info_span!("invocation", id = %Uuid::new_v4(), rule = %rule_name);

        async {
            self.run(event).await.map_err(|err| {
                if err.is_customer_fixable() {
                    tracing::warn!("Rule invocation rejected: {}", err);
                } else {
                    tracing::error!("Rule invocation failed: {}", err);
                }
                err.to_customer_error(self.settings.expose_internal_errors)
            })
        }
        .instrument(span)
        .await
    }

    async fn run(&self, event: &ConfigRuleEvent) -> AppResult<Vec<ComplianceVerdict>> {
        let invoking = event.invoking_event()?;

        let watched = RuleParameters::parse(event.rule_parameters.as_deref())?
            .watched(&self.settings.default_watched)?;

        let session = self.session(event).await?;

        let input = match invoking.notification()? {
            Notification::Change(item) => RuleInput::resource(&item, event, &invoking),
            Notification::Oversized(summary) => {
                tracing::info!("Fetching oversized configuration item for {}", summary.resource_id);
                let mut item = self
                    .config_service
                    .resource_history(session.as_ref(), &summary.resource_type, &summary.resource_id)
                    .await?;
                if item.configuration_item_capture_time.is_none() {
                    item.configuration_item_capture_time = summary.configuration_item_capture_time;
                }
                if item.configuration_item_status.is_none() {
                    item.configuration_item_status = summary.configuration_item_status.clone();
                }
                RuleInput::resource(&item, event, &invoking)
            }
            Notification::Scheduled => RuleInput::scheduled(event, &invoking),
        };

        let verdicts = vec![evaluate_input(&input, &watched)];

        if self.settings.submit_evaluations {
            self.config_service
                .put_evaluations(
                    session.as_ref(),
                    &verdicts,
                    &event.result_token,
                    event.is_test_mode(),
                )
                .await?;
        }

        Ok(verdicts)
    }

    async fn session(&self, event: &ConfigRuleEvent) -> AppResult<Option<SessionCredentials>> {
        if !self.settings.assume_role_mode {
            return Ok(None);
        }

        let role_arn = event
            .execution_role_arn
            .as_deref()
            .filter(|arn| !arn.is_empty())
            .ok_or_else(|| {
                AppError::InvalidEvent("executionRoleArn is required in assume-role mode".to_string())
            })?;

        self.credentials.assume_role(role_arn).await.map(Some)
    }
}

/// Build the verdict for a normalised input
pub fn evaluate_input(input: &RuleInput, watched: &WatchedCidrSet) -> ComplianceVerdict {
    match input {
        RuleInput::Scheduled {
            account_id,
            ordering_timestamp,
        } => ComplianceVerdict::new(
            input.resource_type(),
            account_id.clone(),
            ComplianceStatus::NotApplicable,
            *ordering_timestamp,
        )
        .with_annotation("Route tables are evaluated on configuration changes only."),

        RuleInput::Resource {
            snapshot,
            ordering_timestamp,
        } => {
            let verdict = |status| {
                ComplianceVerdict::new(
                    input.resource_type(),
                    snapshot.resource_id.clone(),
                    status,
                    *ordering_timestamp,
                )
            };

            if let Some(reason) = snapshot.not_applicable_reason() {
                tracing::info!("{} is not applicable: {}", snapshot.resource_id, reason);
                return verdict(ComplianceStatus::NotApplicable).with_annotation(reason);
            }

            let table = snapshot.configuration.as_ref();
            let (status, redirect) = RouteEvaluator::new(watched).assess(table);
            if let Some(table) = table {
                tracing::debug!(
                    "Checked {} route(s) of {} against {} watched block(s)",
                    table.routes.len(),
                    table.route_table_id,
                    watched.blocks().len()
                );
            }

            match redirect {
                Some(redirect) => {
                    tracing::info!(
                        "{} is {}: {}",
                        snapshot.resource_id,
                        status.as_str(),
                        redirect.annotation()
                    );
                    verdict(status).with_annotation(redirect.annotation())
                }
                None => {
                    tracing::info!("{} is {}", snapshot.resource_id, status.as_str());
                    verdict(status)
                }
            }
        }
    }
}
