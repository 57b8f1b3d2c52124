use dropfs_types::error::ApiError;
use log::debug;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::Error;

pub(crate) mod files;
pub(crate) mod users;

/// Sends a JSON RPC request and decodes the JSON response. Authentication
/// failures map to the fatal [`Error::Auth`]; any other non-success status is
/// decoded into the endpoint's error body.
pub(crate) async fn send_json<T, B>(
	builder: RequestBuilder,
	body: &B,
	endpoint: &str,
) -> Result<T, Error>
where
	T: DeserializeOwned,
	B: Serialize + ?Sized,
{
	let response = builder.json(body).send().await?;
	let response = check_status(response, endpoint).await?;
	let bytes = response.bytes().await?;
	Ok(serde_json::from_slice(&bytes)?)
}

pub(crate) async fn check_status(response: Response, endpoint: &str) -> Result<Response, Error> {
	let status = response.status();
	if status == StatusCode::UNAUTHORIZED {
		return Err(Error::Auth);
	}
	if !status.is_success() {
		let body = response.text().await.unwrap_or_default();
		debug!("{endpoint} failed with status {status}: {body}");
		let error = serde_json::from_str::<ApiError>(&body)
			.unwrap_or_else(|_| ApiError::summary(format!("{endpoint}: http status {status}")));
		return Err(Error::Api(error));
	}
	Ok(response)
}

/// Serializes a value for the `Dropbox-API-Arg` header, which must be pure
/// ASCII: non-ASCII characters are escaped as `\uXXXX`.
pub(crate) fn header_safe_json<B: Serialize>(value: &B) -> Result<String, Error> {
	use std::fmt::Write;

	let json = serde_json::to_string(value)?;
	let mut out = String::with_capacity(json.len());
	for c in json.chars() {
		if c.is_ascii() {
			out.push(c);
		} else {
			for unit in c.encode_utf16(&mut [0u16; 2]) {
				let _ = write!(out, "\\u{unit:04x}");
			}
		}
	}
	Ok(out)
}
