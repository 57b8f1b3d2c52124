use std::{future::Future, time::Duration};

use bytes::Bytes;
use dropfs_types::{
	api::{
		files::{ListFolderResult, LongpollResult},
		users::SpaceUsage,
	},
	fs::FileEntry,
};
use futures::stream::BoxStream;

use crate::{api, auth::Client, error::Error};

pub type ByteStream = BoxStream<'static, Result<Bytes, Error>>;

/// The capabilities of the remote object store that the crawler and the file
/// cache consume. [`auth::Client`] is the production implementation; tests
/// substitute scripted remotes.
pub trait RemoteClient: Clone + Send + Sync + 'static {
	fn list_folder(
		&self,
		path: &str,
		recursive: bool,
	) -> impl Future<Output = Result<ListFolderResult, Error>> + Send;

	fn list_folder_continue(
		&self,
		cursor: &str,
	) -> impl Future<Output = Result<ListFolderResult, Error>> + Send;

	fn get_latest_cursor(
		&self,
		path: &str,
		recursive: bool,
		include_deleted: bool,
	) -> impl Future<Output = Result<String, Error>> + Send;

	/// Blocks up to `timeout` (plus server-side jitter) and returns early
	/// when the remote state has advanced past `cursor`.
	fn longpoll(
		&self,
		cursor: &str,
		timeout: Duration,
	) -> impl Future<Output = Result<LongpollResult, Error>> + Send;

	fn download(
		&self,
		path: &str,
	) -> impl Future<Output = Result<(FileEntry, ByteStream), Error>> + Send;

	fn space_usage(&self) -> impl Future<Output = Result<SpaceUsage, Error>> + Send;
}

impl RemoteClient for Client {
	fn list_folder(
		&self,
		path: &str,
		recursive: bool,
	) -> impl Future<Output = Result<ListFolderResult, Error>> + Send {
		api::files::list_folder(self, path, recursive)
	}

	fn list_folder_continue(
		&self,
		cursor: &str,
	) -> impl Future<Output = Result<ListFolderResult, Error>> + Send {
		api::files::list_folder_continue(self, cursor)
	}

	fn get_latest_cursor(
		&self,
		path: &str,
		recursive: bool,
		include_deleted: bool,
	) -> impl Future<Output = Result<String, Error>> + Send {
		api::files::get_latest_cursor(self, path, recursive, include_deleted)
	}

	fn longpoll(
		&self,
		cursor: &str,
		timeout: Duration,
	) -> impl Future<Output = Result<LongpollResult, Error>> + Send {
		api::files::longpoll(self, cursor, timeout)
	}

	fn download(
		&self,
		path: &str,
	) -> impl Future<Output = Result<(FileEntry, ByteStream), Error>> + Send {
		api::files::download(self, path)
	}

	fn space_usage(&self) -> impl Future<Output = Result<SpaceUsage, Error>> + Send {
		api::users::space_usage(self)
	}
}
