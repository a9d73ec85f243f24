// Error types for the metadata route rule and their customer-facing form

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ACCESS_DENIED_CODE: &str = "AccessDenied";
pub const ACCESS_DENIED_MESSAGE: &str = "AWS Config does not have permission to assume the IAM role.";
pub const INTERNAL_ERROR_CODE: &str = "InternalError";
pub const INVALID_PARAMETER_CODE: &str = "InvalidParameterValueException";

/// Main error type for the rule
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid rule parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Unexpected message type: {0}")]
    UnexpectedMessageType(String),

    #[error("Failed to assume role ({code}): {message}")]
    AssumeRole { code: String, message: String },

    #[error("AWS Config request failed: {0}")]
    ConfigService(String),
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Error shape returned to the rule-evaluation framework
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerError {
    pub customer_error_code: String,
    pub customer_error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_error_details: Option<String>,
}

impl CustomerError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        CustomerError {
            customer_error_code: code.into(),
            customer_error_message: message.into(),
            internal_error_message: None,
            internal_error_details: None,
        }
    }

    pub fn internal() -> Self {
        CustomerError::new(INTERNAL_ERROR_CODE, INTERNAL_ERROR_CODE)
    }
}

impl AppError {
    /// Whether the caller can fix this error (bad parameters, missing permissions)
    pub fn is_customer_fixable(&self) -> bool {
        match self {
            AppError::InvalidParameter(_) => true,
            AppError::AssumeRole { code, .. } => code.contains(ACCESS_DENIED_CODE),
            _ => false,
        }
    }

    /// Translate into the structured customer error.
    ///
    /// Internal errors only carry their detail when `expose_internal` is set.
    pub fn to_customer_error(&self, expose_internal: bool) -> CustomerError {
        match self {
            AppError::InvalidParameter(msg) => CustomerError::new(INVALID_PARAMETER_CODE, msg.clone()),
            AppError::AssumeRole { code, .. } if code.contains(ACCESS_DENIED_CODE) => {
                CustomerError::new(ACCESS_DENIED_CODE, ACCESS_DENIED_MESSAGE)
            }
            other => {
                let mut error = CustomerError::internal();
                if expose_internal {
                    error.internal_error_message = Some(other.internal_summary().to_string());
                    error.internal_error_details = Some(other.to_string());
                }
                error
            }
        }
    }

    fn internal_summary(&self) -> &'static str {
        match self {
            AppError::UnexpectedMessageType(_) => "Unexpected message type",
            AppError::AssumeRole { .. } | AppError::ConfigService(_) => {
                "Unexpected error while completing API request"
            }
            _ => "Unexpected error while evaluating the rule",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_maps_to_fixed_message() {
        let err = AppError::AssumeRole {
            code: "AccessDenied".to_string(),
            message: "access-denied".to_string(),
        };
        assert!(err.is_customer_fixable());
        let customer = err.to_customer_error(false);
        assert_eq!(customer.customer_error_code, "AccessDenied");
        assert_eq!(
            customer.customer_error_message,
            "AWS Config does not have permission to assume the IAM role."
        );
    }

    #[test]
    fn test_unknown_provider_code_is_internal() {
        let err = AppError::AssumeRole {
            code: "unknown-code".to_string(),
            message: "unknown-message".to_string(),
        };
        assert!(!err.is_customer_fixable());
        let customer = err.to_customer_error(false);
        assert_eq!(customer, CustomerError::internal());
        assert!(customer.internal_error_message.is_none());
    }

    #[test]
    fn test_internal_detail_only_when_exposed() {
        let err = AppError::UnexpectedMessageType("SomethingElse".to_string());
        let customer = err.to_customer_error(true);
        assert_eq!(customer.customer_error_code, "InternalError");
        assert_eq!(
            customer.internal_error_message.as_deref(),
            Some("Unexpected message type")
        );
        assert!(customer.internal_error_details.unwrap().contains("SomethingElse"));
    }

    #[test]
    fn test_invalid_parameter_keeps_message() {
        let err = AppError::InvalidParameter("invalid address in CIDR block 'x'".to_string());
        let customer = err.to_customer_error(false);
        assert_eq!(customer.customer_error_code, "InvalidParameterValueException");
        assert!(customer.customer_error_message.contains("'x'"));
    }

    #[test]
    fn test_customer_error_wire_format() {
        let json = serde_json::to_value(CustomerError::internal()).unwrap();
        assert_eq!(json["customerErrorCode"], "InternalError");
        assert_eq!(json["customerErrorMessage"], "InternalError");
        assert!(json.get("internalErrorMessage").is_none());
    }
}
