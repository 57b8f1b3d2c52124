use log::info;
use reqwest::RequestBuilder;

use crate::{
	api,
	consts::{API_TIMEOUT, CONNECT_TIMEOUT, api_url, content_url, notify_url},
	error::Error,
};

/// An authorized connection to the remote store: the OAuth bearer token plus
/// a shared HTTP client. Cloning is cheap and shares the connection pool.
#[derive(Clone)]
pub struct Client {
	http: reqwest::Client,
	token: String,
}

impl Client {
	pub fn connect(token: &str) -> Result<Self, Error> {
		info!("connecting to dropbox");
		let http = reqwest::Client::builder()
			.connect_timeout(CONNECT_TIMEOUT)
			.build()?;
		Ok(Client {
			http,
			token: token.to_string(),
		})
	}

	/// Checks that the access token is valid and returns the account it
	/// belongs to.
	pub async fn current_account(&self) -> Result<dropfs_types::api::users::Account, Error> {
		api::users::current_account(self).await
	}

	pub(crate) fn post_api(&self, endpoint: &str) -> RequestBuilder {
		self.http
			.post(api_url(endpoint))
			.bearer_auth(&self.token)
			.timeout(API_TIMEOUT)
	}

	pub(crate) fn post_content(&self, endpoint: &str) -> RequestBuilder {
		// no overall timeout: downloads are bounded by the transport only
		self.http.post(content_url(endpoint)).bearer_auth(&self.token)
	}

	pub(crate) fn post_notify(&self, endpoint: &str) -> RequestBuilder {
		// the notify host takes no authorization; the cursor identifies the
		// account
		self.http.post(notify_url(endpoint))
	}
}
