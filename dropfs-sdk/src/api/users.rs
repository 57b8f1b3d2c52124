use dropfs_types::api::users::{Account, SpaceUsage};

use crate::{api::send_json, auth::Client, error::Error};

pub(crate) async fn space_usage(client: &Client) -> Result<SpaceUsage, Error> {
	send_json(
		client.post_api("users/get_space_usage"),
		&serde_json::Value::Null,
		"users/get_space_usage",
	)
	.await
}

pub(crate) async fn current_account(client: &Client) -> Result<Account, Error> {
	send_json(
		client.post_api("users/get_current_account"),
		&serde_json::Value::Null,
		"users/get_current_account",
	)
	.await
}
