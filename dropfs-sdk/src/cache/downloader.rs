use std::{
	path::{Path, PathBuf},
	sync::{
		Arc, Mutex,
		atomic::{AtomicU64, Ordering},
	},
};

use bytes::BytesMut;
use futures::StreamExt;
use log::{debug, warn};
use tokio::{io::AsyncWriteExt, sync::Notify};

use crate::{
	consts::{DOWNLOAD_CHUNK_SIZE, WATCHER_RECHECK},
	error::Error,
	remote::RemoteClient,
	util::lock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
	Working,
	Success,
	Failure,
}

/// A reader's registration stating the byte count it needs before it can
/// proceed.
struct SizeWatcher {
	threshold: u64,
	notify: Arc<Notify>,
}

/// One in-flight streaming fetch of a remote file, publishing its progress
/// to any number of waiting readers.
pub struct Downloader {
	virtual_path: String,
	remote_path: String,
	local_path: PathBuf,
	bytes_downloaded: AtomicU64,
	state: Mutex<DownloadState>,
	watchers: Mutex<Vec<SizeWatcher>>,
}

impl Downloader {
	/// Builds the handle for a fetch about to start. The local file itself
	/// is created by [`Downloader::open_write_file`], never under a cache
	/// lock.
	pub(crate) fn new(virtual_path: &str, remote_path: &str, local_path: &Path) -> Arc<Self> {
		Arc::new(Downloader {
			virtual_path: virtual_path.to_string(),
			remote_path: remote_path.to_string(),
			local_path: local_path.to_path_buf(),
			bytes_downloaded: AtomicU64::new(0),
			state: Mutex::new(DownloadState::Working),
			watchers: Mutex::new(Vec::new()),
		})
	}

	/// Creates the parent directories and the local file, returning the
	/// write handle for [`Downloader::run`]. The open does not truncate, so
	/// a racing open of the same path cannot clobber the progress of a
	/// downloader that won the insert race.
	pub(crate) fn open_write_file(&self) -> Result<std::fs::File, Error> {
		if let Some(parent) = self.local_path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		let file = std::fs::OpenOptions::new()
			.write(true)
			.create(true)
			.open(&self.local_path)?;
		Ok(file)
	}

	pub fn virtual_path(&self) -> &str {
		&self.virtual_path
	}

	pub fn remote_path(&self) -> &str {
		&self.remote_path
	}

	pub fn bytes_downloaded(&self) -> u64 {
		self.bytes_downloaded.load(Ordering::Acquire)
	}

	pub fn state(&self) -> DownloadState {
		*lock(&self.state)
	}

	/// The worker: streams the remote file into `file`, then publishes the
	/// terminal state and wakes every watcher so no reader is stranded.
	pub(crate) async fn run<R: RemoteClient>(&self, client: R, file: std::fs::File) {
		let result = self.download(client, file).await;
		let state = match &result {
			Ok(()) => DownloadState::Success,
			Err(e) => {
				warn!("download of {} failed: {e}", self.remote_path);
				DownloadState::Failure
			}
		};
		*lock(&self.state) = state;
		if state == DownloadState::Failure {
			// drop the partial file so the next open starts a fresh download
			// instead of serving truncated content
			if let Err(e) = std::fs::remove_file(&self.local_path) {
				warn!("removing partial {} failed: {e}", self.local_path.display());
			}
		}
		for watcher in lock(&self.watchers).iter() {
			watcher.notify.notify_one();
		}
		if state == DownloadState::Success {
			debug!("download finished: {}", self.remote_path);
		}
	}

	async fn download<R: RemoteClient>(&self, client: R, file: std::fs::File) -> Result<(), Error> {
		debug!("downloading {}", self.remote_path);
		let mut file = tokio::fs::File::from_std(file);
		let (_metadata, mut stream) = client.download(&self.remote_path).await?;
		// the transport delivers arbitrary chunk boundaries; re-chunk so
		// writes and watcher notifications happen per 64 KiB
		let mut pending = BytesMut::new();
		while let Some(chunk) = stream.next().await {
			pending.extend_from_slice(&chunk?);
			while pending.len() >= DOWNLOAD_CHUNK_SIZE {
				let chunk = pending.split_to(DOWNLOAD_CHUNK_SIZE);
				self.write_chunk(&mut file, &chunk).await?;
			}
		}
		if !pending.is_empty() {
			self.write_chunk(&mut file, &pending).await?;
		}
		file.sync_all().await?;
		Ok(())
	}

	async fn write_chunk(&self, file: &mut tokio::fs::File, chunk: &[u8]) -> Result<(), Error> {
		file.write_all(chunk).await?;
		// the flush forces the bytes into the file before the new count is
		// published, so a granted size is always readable
		file.flush().await?;
		let downloaded = self
			.bytes_downloaded
			.fetch_add(chunk.len() as u64, Ordering::AcqRel)
			+ chunk.len() as u64;
		for watcher in lock(&self.watchers).iter() {
			if watcher.threshold <= downloaded {
				watcher.notify.notify_one();
			}
		}
		Ok(())
	}

	/// Blocks until at least `size` bytes are present in the local file or
	/// the download left the working state. Returns `false` when the
	/// download failed; reading past `bytes_downloaded` is then forbidden.
	pub async fn wait_for_size(&self, size: u64) -> bool {
		debug!("waiting for size {size}: {}", self.remote_path);
		if self.state() == DownloadState::Working && self.bytes_downloaded() < size {
			debug!("new size watcher for {}", self.remote_path);
			let notify = Arc::new(Notify::new());
			lock(&self.watchers).push(SizeWatcher {
				threshold: size,
				notify: notify.clone(),
			});
			while self.bytes_downloaded() < size && self.state() == DownloadState::Working {
				let _ = tokio::time::timeout(WATCHER_RECHECK, notify.notified()).await;
			}
			let mut watchers = lock(&self.watchers);
			if let Some(idx) = watchers
				.iter()
				.position(|w| Arc::ptr_eq(&w.notify, &notify))
			{
				watchers.remove(idx);
			}
		}
		self.state() != DownloadState::Failure
	}
}
