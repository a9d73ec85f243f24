// AWS collaborators: role assumption and the AWS Config API

pub mod config_service;
pub mod sts;

use async_trait::async_trait;
use std::fmt;

use crate::error::AppResult;
use crate::rule::ComplianceVerdict;
use crate::rule::event::ConfigurationItem;

pub use config_service::AwsConfigService;
pub use sts::StsCredentialProvider;

/// Session name used when assuming the rule's execution role
pub const ROLE_SESSION_NAME: &str = "configLambdaExecution";

/// Lifetime requested for assumed-role sessions
pub const ROLE_SESSION_SECONDS: i32 = 900;

/// Temporary credentials obtained by assuming a role
#[derive(Clone, PartialEq)]
pub struct SessionCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Assume `role_arn`. Failures are reported as `AppError::AssumeRole`
    /// carrying the provider's error code.
    async fn assume_role(&self, role_arn: &str) -> AppResult<SessionCredentials>;
}

#[async_trait]
pub trait ConfigService: Send + Sync {
    /// Latest recorded configuration item for a resource
    async fn resource_history(
        &self,
        session: Option<&SessionCredentials>,
        resource_type: &str,
        resource_id: &str,
    ) -> AppResult<ConfigurationItem>;

    async fn put_evaluations(
        &self,
        session: Option<&SessionCredentials>,
        evaluations: &[ComplianceVerdict],
        result_token: &str,
        test_mode: bool,
    ) -> AppResult<()>;
}
