use std::time::Duration;

use dropfs_types::{
	api::files::{
		DownloadArg, LatestCursorResult, ListFolderArg, ListFolderContinueArg, ListFolderResult,
		LongpollArg, LongpollResult,
	},
	error::ApiError,
	fs::FileEntry,
};
use futures::{StreamExt, TryStreamExt};

use crate::{
	api::{check_status, header_safe_json, send_json},
	auth::Client,
	consts::LONGPOLL_JITTER,
	error::Error,
	remote::ByteStream,
};

pub(crate) async fn list_folder(
	client: &Client,
	path: &str,
	recursive: bool,
) -> Result<ListFolderResult, Error> {
	send_json(
		client.post_api("files/list_folder"),
		&ListFolderArg {
			path: path.to_string(),
			recursive,
			include_deleted: false,
		},
		"files/list_folder",
	)
	.await
}

pub(crate) async fn list_folder_continue(
	client: &Client,
	cursor: &str,
) -> Result<ListFolderResult, Error> {
	send_json(
		client.post_api("files/list_folder/continue"),
		&ListFolderContinueArg {
			cursor: cursor.to_string(),
		},
		"files/list_folder/continue",
	)
	.await
}

pub(crate) async fn get_latest_cursor(
	client: &Client,
	path: &str,
	recursive: bool,
	include_deleted: bool,
) -> Result<String, Error> {
	let result: LatestCursorResult = send_json(
		client.post_api("files/list_folder/get_latest_cursor"),
		&ListFolderArg {
			path: path.to_string(),
			recursive,
			include_deleted,
		},
		"files/list_folder/get_latest_cursor",
	)
	.await?;
	Ok(result.cursor)
}

pub(crate) async fn longpoll(
	client: &Client,
	cursor: &str,
	timeout: Duration,
) -> Result<LongpollResult, Error> {
	send_json(
		client
			.post_notify("files/list_folder/longpoll")
			.timeout(timeout + LONGPOLL_JITTER),
		&LongpollArg {
			cursor: cursor.to_string(),
			timeout: timeout.as_secs(),
		},
		"files/list_folder/longpoll",
	)
	.await
}

/// Starts a streaming download. The file's metadata travels in the
/// `Dropbox-API-Result` response header; the body is the raw content.
pub(crate) async fn download(client: &Client, path: &str) -> Result<(FileEntry, ByteStream), Error> {
	let arg = DownloadArg {
		path: path.to_string(),
	};
	let response = client
		.post_content("files/download")
		.header("Dropbox-API-Arg", header_safe_json(&arg)?)
		.send()
		.await?;
	let response = check_status(response, "files/download").await?;
	let metadata = match response.headers().get("dropbox-api-result") {
		Some(value) => serde_json::from_slice::<FileEntry>(value.as_bytes())?,
		None => {
			return Err(Error::Api(ApiError::summary(
				"files/download: missing dropbox-api-result header",
			)));
		}
	};
	let stream = response.bytes_stream().map_err(Error::from).boxed();
	Ok((metadata, stream))
}
