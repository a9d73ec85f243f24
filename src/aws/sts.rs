// Role assumption through AWS STS

use async_trait::async_trait;
use aws_sdk_sts::Client;
use aws_sdk_sts::error::ProvideErrorMetadata;

use super::{CredentialProvider, ROLE_SESSION_NAME, ROLE_SESSION_SECONDS, SessionCredentials};
use crate::error::{AppError, AppResult, INTERNAL_ERROR_CODE};

pub struct StsCredentialProvider {
    client: Client,
}

impl StsCredentialProvider {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        StsCredentialProvider {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl CredentialProvider for StsCredentialProvider {
    async fn assume_role(&self, role_arn: &str) -> AppResult<SessionCredentials> {
        tracing::debug!("Assuming role {}", role_arn);

        let output = self
            .client
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(ROLE_SESSION_NAME)
            .duration_seconds(ROLE_SESSION_SECONDS)
            .send()
            .await
            .map_err(|err| {
                let service_error = err.as_service_error();
                let code = service_error
                    .and_then(|e| e.code())
                    .unwrap_or(INTERNAL_ERROR_CODE)
                    .to_string();
                let message = service_error
                    .and_then(|e| e.message())
                    .map(String::from)
                    .unwrap_or_else(|| err.to_string());
                tracing::warn!("Failed to assume role {}: {} ({})", role_arn, message, code);
                AppError::AssumeRole { code, message }
            })?;

        let credentials = output.credentials().ok_or_else(|| AppError::AssumeRole {
            code: INTERNAL_ERROR_CODE.to_string(),
            message: "AssumeRole returned no credentials".to_string(),
        })?;

        Ok(SessionCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
        })
    }
}
