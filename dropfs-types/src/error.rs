use serde::Deserialize;
use thiserror::Error;

/// The JSON error body every Dropbox endpoint returns on failure.
#[derive(Deserialize, Debug, Clone, Error)]
#[error("{error_summary}")]
pub struct ApiError {
	pub error_summary: String,
	#[serde(default)]
	pub error: serde_json::Value,
}

impl ApiError {
	pub fn summary(error_summary: impl Into<String>) -> Self {
		ApiError {
			error_summary: error_summary.into(),
			error: serde_json::Value::Null,
		}
	}
}
