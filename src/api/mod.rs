// API module - HTTP surface for rule invocations

pub mod rest;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub rule: String,
    pub watched_cidrs: Vec<String>,
    pub assume_role_mode: bool,
}
