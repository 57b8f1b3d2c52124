#![allow(dead_code)]

use std::{
	collections::{HashMap, VecDeque},
	sync::{Arc, Mutex},
	time::Duration,
};

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use dropfs_sdk::{
	Error,
	remote::{ByteStream, RemoteClient},
};
use dropfs_types::{
	api::{
		files::{ListFolderResult, LongpollResult},
		users::{SpaceAllocation, SpaceUsage},
	},
	fs::{DeletedEntry, Entry, FileEntry, FolderEntry},
};
use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

pub fn leaf_name(path: &str) -> String {
	path.rsplit('/').next().unwrap_or(path).to_string()
}

pub fn file_entry(path: &str, size: u64) -> Entry {
	Entry::File(FileEntry {
		name: leaf_name(path),
		path_display: path.to_string(),
		size,
		server_modified: Utc.with_ymd_and_hms(2023, 4, 5, 6, 7, 8).unwrap(),
	})
}

pub fn folder_entry(path: &str) -> Entry {
	Entry::Folder(FolderEntry {
		name: leaf_name(path),
		path_display: path.to_string(),
	})
}

pub fn deleted_entry(path: &str) -> Entry {
	Entry::Deleted(DeletedEntry {
		name: leaf_name(path),
		path_display: path.to_string(),
	})
}

pub fn batch(entries: Vec<Entry>, cursor: &str, has_more: bool) -> ListFolderResult {
	ListFolderResult {
		entries,
		cursor: cursor.to_string(),
		has_more,
	}
}

pub fn transient_error() -> Error {
	Error::Io(std::io::Error::new(
		std::io::ErrorKind::TimedOut,
		"simulated timeout",
	))
}

/// One scripted download body.
pub enum Download {
	Chunks(Vec<Bytes>),
	Channel(tokio::sync::mpsc::Receiver<Result<Bytes, Error>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
	ListFolder(String),
	ListContinue(String),
	LatestCursor,
	Longpoll(String),
	Download(String),
	SpaceUsage,
}

#[derive(Default)]
pub struct MockState {
	batches: Mutex<VecDeque<ListFolderResult>>,
	longpolls: Mutex<VecDeque<Result<LongpollResult, Error>>>,
	downloads: Mutex<HashMap<String, VecDeque<Download>>>,
	calls: Mutex<Vec<Call>>,
}

/// A scripted remote: list batches and longpoll results are consumed in
/// order, downloads are looked up by remote path. An exhausted longpoll
/// queue behaves like a quick timeout without changes so the crawler's live
/// loop keeps spinning until it is stopped.
#[derive(Clone, Default)]
pub struct MockRemote {
	state: Arc<MockState>,
}

impl MockRemote {
	pub fn new() -> Self {
		let _ = env_logger::builder().is_test(true).try_init();
		Self::default()
	}

	pub fn push_batch(&self, batch: ListFolderResult) {
		self.state.batches.lock().unwrap().push_back(batch);
	}

	pub fn push_longpoll(&self, result: Result<LongpollResult, Error>) {
		self.state.longpolls.lock().unwrap().push_back(result);
	}

	pub fn add_download(&self, remote_path: &str, download: Download) {
		self.state
			.downloads
			.lock()
			.unwrap()
			.entry(remote_path.to_string())
			.or_default()
			.push_back(download);
	}

	pub fn calls(&self) -> Vec<Call> {
		self.state.calls.lock().unwrap().clone()
	}

	pub fn download_calls(&self, remote_path: &str) -> usize {
		self.calls()
			.iter()
			.filter(|call| matches!(call, Call::Download(path) if path == remote_path))
			.count()
	}

	fn record(&self, call: Call) {
		self.state.calls.lock().unwrap().push(call);
	}
}

impl RemoteClient for MockRemote {
	fn list_folder(
		&self,
		path: &str,
		_recursive: bool,
	) -> impl Future<Output = Result<ListFolderResult, Error>> + Send {
		let this = self.clone();
		let path = path.to_string();
		async move {
			this.record(Call::ListFolder(path));
			this.state
				.batches
				.lock()
				.unwrap()
				.pop_front()
				.ok_or_else(|| Error::Io(std::io::Error::other("no scripted batch")))
		}
	}

	fn list_folder_continue(
		&self,
		cursor: &str,
	) -> impl Future<Output = Result<ListFolderResult, Error>> + Send {
		let this = self.clone();
		let cursor = cursor.to_string();
		async move {
			this.record(Call::ListContinue(cursor));
			this.state
				.batches
				.lock()
				.unwrap()
				.pop_front()
				.ok_or_else(|| Error::Io(std::io::Error::other("no scripted batch")))
		}
	}

	fn get_latest_cursor(
		&self,
		_path: &str,
		_recursive: bool,
		_include_deleted: bool,
	) -> impl Future<Output = Result<String, Error>> + Send {
		let this = self.clone();
		async move {
			this.record(Call::LatestCursor);
			Ok("cursor-init".to_string())
		}
	}

	fn longpoll(
		&self,
		cursor: &str,
		_timeout: Duration,
	) -> impl Future<Output = Result<LongpollResult, Error>> + Send {
		let this = self.clone();
		let cursor = cursor.to_string();
		async move {
			this.record(Call::Longpoll(cursor));
			let scripted = this.state.longpolls.lock().unwrap().pop_front();
			match scripted {
				Some(result) => result,
				None => {
					tokio::time::sleep(Duration::from_millis(20)).await;
					Ok(LongpollResult {
						changes: false,
						backoff: None,
					})
				}
			}
		}
	}

	fn download(
		&self,
		path: &str,
	) -> impl Future<Output = Result<(FileEntry, ByteStream), Error>> + Send {
		let this = self.clone();
		let path = path.to_string();
		async move {
			this.record(Call::Download(path.clone()));
			let download = this
				.state
				.downloads
				.lock()
				.unwrap()
				.get_mut(&path)
				.and_then(VecDeque::pop_front)
				.ok_or_else(|| Error::Io(std::io::Error::other("no scripted download")))?;
			let (size, stream): (u64, ByteStream) = match download {
				Download::Chunks(chunks) => (
					chunks.iter().map(|c| c.len() as u64).sum(),
					futures::stream::iter(chunks.into_iter().map(Ok)).boxed(),
				),
				Download::Channel(receiver) => (0, ReceiverStream::new(receiver).boxed()),
			};
			let metadata = FileEntry {
				name: leaf_name(&path),
				path_display: path,
				size,
				server_modified: Utc.with_ymd_and_hms(2023, 4, 5, 6, 7, 8).unwrap(),
			};
			Ok((metadata, stream))
		}
	}

	fn space_usage(&self) -> impl Future<Output = Result<SpaceUsage, Error>> + Send {
		let this = self.clone();
		async move {
			this.record(Call::SpaceUsage);
			Ok(SpaceUsage {
				used: 314_159,
				allocation: SpaceAllocation::Individual {
					allocated: 2_000_000,
				},
			})
		}
	}
}
