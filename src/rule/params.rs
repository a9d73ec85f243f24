// Rule parameters: the watched CIDR blocks

use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::routes::evaluator::WatchedCidrSet;

const ROUTES_KEY: &str = "routes";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleParameters {
    /// Watched blocks as given; `None` when the key is absent
    pub routes: Option<Vec<String>>,
}

impl RuleParameters {
    /// Parse the JSON-encoded parameter map sent with the event.
    ///
    /// `routes` may be a list of strings or one comma-separated string.
    pub fn parse(raw: Option<&str>) -> AppResult<Self> {
        let raw = match raw.map(str::trim) {
            None | Some("") => return Ok(RuleParameters::default()),
            Some(raw) => raw,
        };

        let value: Value = serde_json::from_str(raw)
            .map_err(|e| AppError::InvalidParameter(format!("ruleParameters is not valid JSON: {}", e)))?;

        let object = match value {
            Value::Object(object) => object,
            Value::Null => return Ok(RuleParameters::default()),
            other => {
                return Err(AppError::InvalidParameter(format!(
                    "ruleParameters must be a JSON object, got {}",
                    other
                )));
            }
        };

        let routes = match object.get(ROUTES_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(list)) => Some(
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|item| {
                        item.as_str().map(String::from).ok_or_else(|| {
                            AppError::InvalidParameter(format!(
                                "'{}' entries must be strings, got {}",
                                ROUTES_KEY, item
                            ))
                        })
                    })
                    .collect::<AppResult<Vec<_>>>()?,
            ),
            Some(other) => {
                return Err(AppError::InvalidParameter(format!(
                    "'{}' must be a list of CIDR blocks, got {}",
                    ROUTES_KEY, other
                )));
            }
        };

        Ok(RuleParameters { routes })
    }

    /// The watched set these parameters describe, or `fallback` when they name none
    pub fn watched(&self, fallback: &WatchedCidrSet) -> AppResult<WatchedCidrSet> {
        match &self.routes {
            Some(routes) if !routes.is_empty() => {
                WatchedCidrSet::parse(routes).map_err(|e| AppError::InvalidParameter(e.to_string()))
            }
            _ => Ok(fallback.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_route_list() {
        let params = RuleParameters::parse(Some(r#"{"routes": ["169.254.169.254/32"]}"#)).unwrap();
        assert_eq!(params.routes, Some(vec!["169.254.169.254/32".to_string()]));

        let watched = params.watched(&WatchedCidrSet::default()).unwrap();
        assert_eq!(watched.blocks().len(), 1);
    }

    #[test]
    fn test_comma_separated_routes() {
        let params =
            RuleParameters::parse(Some(r#"{"routes": "169.254.169.254/32, fd00:ec2::254/128"}"#))
                .unwrap();
        let watched = params.watched(&WatchedCidrSet::default()).unwrap();
        assert_eq!(watched.blocks().len(), 2);
    }

    #[test]
    fn test_missing_or_empty_routes_use_fallback() {
        let fallback = WatchedCidrSet::parse(["10.0.0.0/8"]).unwrap();
        for raw in [None, Some(""), Some("{}"), Some(r#"{"routes": []}"#)] {
            let params = RuleParameters::parse(raw).unwrap();
            assert_eq!(params.watched(&fallback).unwrap(), fallback);
        }
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        assert!(matches!(
            RuleParameters::parse(Some("not json")),
            Err(AppError::InvalidParameter(_))
        ));
        assert!(matches!(
            RuleParameters::parse(Some(r#"["169.254.169.254/32"]"#)),
            Err(AppError::InvalidParameter(_))
        ));
        assert!(matches!(
            RuleParameters::parse(Some(r#"{"routes": [1, 2]}"#)),
            Err(AppError::InvalidParameter(_))
        ));
        assert!(matches!(
            RuleParameters::parse(Some(r#"{"routes": 7}"#)),
            Err(AppError::InvalidParameter(_))
        ));

        let params = RuleParameters::parse(Some(r#"{"routes": ["169.254.169.254/40"]}"#)).unwrap();
        assert!(matches!(
            params.watched(&WatchedCidrSet::default()),
            Err(AppError::InvalidParameter(_))
        ));
    }
}
