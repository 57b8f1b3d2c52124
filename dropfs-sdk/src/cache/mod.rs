use std::{
	collections::{HashMap, hash_map::Entry},
	path::{Path, PathBuf},
	sync::{Arc, Mutex},
};

use log::{debug, error};

use crate::{error::Error, remote::RemoteClient, util::lock};

mod downloader;

pub use downloader::{DownloadState, Downloader};

#[cfg(unix)]
fn file_handle(file: &std::fs::File) -> u64 {
	use std::os::fd::AsRawFd;
	file.as_raw_fd() as u64
}

#[cfg(windows)]
fn file_handle(file: &std::fs::File) -> u64 {
	use std::os::windows::io::AsRawHandle;
	file.as_raw_handle() as u64
}

#[cfg(unix)]
fn read_at(file: &std::fs::File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
	use std::os::unix::fs::FileExt;
	file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &std::fs::File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
	use std::os::windows::fs::FileExt;
	file.seek_read(buf, offset)
}

/// The on-disk read-through cache. Every virtual path maps to a local file
/// under `base_path`, mirroring the remote layout; misses spawn a
/// [`Downloader`] and readers consume bytes concurrently with the in-flight
/// fetch.
pub struct FileCache<R> {
	base_path: PathBuf,
	client: R,
	downloading: Mutex<HashMap<String, Arc<Downloader>>>,
	files_opened: Mutex<HashMap<u64, Arc<std::fs::File>>>,
}

impl<R: RemoteClient> FileCache<R> {
	pub fn new(base_path: PathBuf, client: R) -> Self {
		FileCache {
			base_path,
			client,
			downloading: Mutex::new(HashMap::new()),
			files_opened: Mutex::new(HashMap::new()),
		}
	}

	/// Opens `virtual_path` for reading. On a miss the remote file starts
	/// downloading into place and the caller's handle reads the growing
	/// file; a second open of the same path attaches to the existing
	/// download instead of spawning another one. Blocks on disk; callers in
	/// async context go through `spawn_blocking`.
	pub fn open(
		self: &Arc<Self>,
		virtual_path: &str,
		rel_path: &str,
		remote_path: &str,
	) -> Result<u64, Error> {
		let local = self.base_path.join(rel_path);
		if !local.exists() && !self.is_downloading(virtual_path) {
			debug!("cache miss for {virtual_path}");
			// the file is created before the map is touched; the lock below
			// only guards the check-and-insert itself
			let downloader = Downloader::new(virtual_path, remote_path, &local);
			let write_file = downloader.open_write_file()?;
			let lost_to_failed = {
				let mut downloading = lock(&self.downloading);
				match downloading.entry(virtual_path.to_string()) {
					Entry::Vacant(slot) => {
						slot.insert(downloader.clone());
						let cache = Arc::clone(self);
						let client = self.client.clone();
						tokio::spawn(async move {
							downloader.run(client, write_file).await;
							cache.finished_downloading(&downloader);
						});
						false
					}
					// another open won the insert race; our downloader never
					// runs and the write handle just closes
					Entry::Occupied(slot) => slot.get().state() == DownloadState::Failure,
				}
			};
			if lost_to_failed {
				// the occupant already deleted its partial file, so the one
				// created above would later read as complete and empty
				let _ = std::fs::remove_file(&local);
			}
		}
		self.open_file(&local)
	}

	fn is_downloading(&self, virtual_path: &str) -> bool {
		lock(&self.downloading).contains_key(virtual_path)
	}

	/// Registers an already-present local file (the pre-seeded mirror) in
	/// the handle table.
	pub fn open_local(&self, path: &Path) -> Result<u64, Error> {
		self.open_file(path)
	}

	fn open_file(&self, path: &Path) -> Result<u64, Error> {
		let file = std::fs::File::open(path)?;
		let fh = file_handle(&file);
		lock(&self.files_opened).insert(fh, Arc::new(file));
		Ok(fh)
	}

	/// Reads up to `size` bytes at `offset` from the handle. While the path
	/// is still downloading the read blocks until the requested range is
	/// available or the download leaves the working state.
	pub async fn read(
		&self,
		virtual_path: &str,
		size: u32,
		offset: u64,
		fh: u64,
	) -> Result<Vec<u8>, Error> {
		let file = lock(&self.files_opened)
			.get(&fh)
			.cloned()
			.ok_or(Error::BadHandle(fh))?;
		let downloader = lock(&self.downloading).get(virtual_path).cloned();
		if let Some(downloader) = downloader {
			if !downloader.wait_for_size(offset + size as u64).await {
				return Err(Error::DownloadFailed(virtual_path.to_string()));
			}
		}
		let size = size as usize;
		let buf = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, Error> {
			let mut buf = vec![0u8; size];
			let mut filled = 0;
			while filled < size {
				let n = read_at(&file, &mut buf[filled..], offset + filled as u64)?;
				if n == 0 {
					break;
				}
				filled += n;
			}
			buf.truncate(filled);
			Ok(buf)
		})
		.await
		.map_err(std::io::Error::from)??;
		Ok(buf)
	}

	/// Drops the handle, closing the underlying file.
	pub fn close(&self, fh: u64) {
		if lock(&self.files_opened).remove(&fh).is_none() {
			error!("no open file found for file handle {fh}");
		}
	}

	fn finished_downloading(&self, downloader: &Downloader) {
		debug!("removing {} from downloading", downloader.remote_path());
		lock(&self.downloading).remove(downloader.virtual_path());
	}
}
