use std::{
	path::{Path, PathBuf},
	sync::{
		Mutex,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration,
};

use chrono::{DateTime, Utc};
use dropfs_types::api::files::ListFolderResult;
use log::{debug, error, info, warn};
use tokio::sync::{RwLock, watch};

use crate::{
	consts::{LONGPOLL_TIMEOUT, SAVE_INTERVAL, SAVE_INTERVAL_ENTRIES},
	error::Error,
	index::Folder,
	remote::RemoteClient,
	snapshot::{SNAPSHOT_VERSION, Snapshot},
	util::lock,
};

struct Cursors {
	crawl: Option<String>,
	update: String,
}

/// Owns the index tree, the server cursors, and the crawl lifecycle. The
/// crawl task is the sole writer of the tree; filesystem readers share it
/// through [`Crawler::root`].
pub struct Crawler<R> {
	client: R,
	db_token: String,
	db_base_path: String,
	local_folder: Option<PathBuf>,
	snapshot_dir: PathBuf,

	root: RwLock<Folder>,
	cursors: Mutex<Cursors>,
	finished_crawling: AtomicBool,
	space: Mutex<(u64, u64)>,

	stop_request: AtomicBool,
	updated_entries: AtomicUsize,
	last_save: Mutex<DateTime<Utc>>,
	finished: watch::Sender<bool>,
	initial_crawl: watch::Sender<bool>,
}

impl<R: RemoteClient> Crawler<R> {
	/// Starts a fresh index: obtains the initial update cursor from the
	/// remote and begins with an empty root. `db_base_path` is `''` for the
	/// remote root, otherwise it must start with `/`.
	pub async fn init(
		client: R,
		db_token: String,
		db_base_path: String,
		local_folder: Option<PathBuf>,
		snapshot_dir: PathBuf,
	) -> Result<Self, Error> {
		debug!("getting update cursor");
		let update_cursor = client.get_latest_cursor(&db_base_path, true, true).await?;
		let root = Folder::new(db_base_path.as_str());
		Ok(Self::build(
			client,
			db_token,
			db_base_path,
			local_folder,
			snapshot_dir,
			root,
			None,
			update_cursor,
			false,
			Utc::now(),
		))
	}

	/// Resumes from the saved snapshot, reconnecting with the stored token
	/// via `connect`.
	pub fn load(
		snapshot_dir: PathBuf,
		connect: impl FnOnce(&str) -> Result<R, Error>,
	) -> Result<Self, Error> {
		let snapshot = Snapshot::load(&snapshot_dir)?;
		info!("successfully loaded data");
		let client = connect(&snapshot.db_token)?;
		Ok(Self::build(
			client,
			snapshot.db_token,
			snapshot.root_path,
			snapshot.local_folder,
			snapshot_dir,
			snapshot.root,
			snapshot.crawl_cursor,
			snapshot.update_cursor,
			snapshot.finished_crawling,
			snapshot.last_save,
		))
	}

	#[allow(clippy::too_many_arguments)]
	fn build(
		client: R,
		db_token: String,
		db_base_path: String,
		local_folder: Option<PathBuf>,
		snapshot_dir: PathBuf,
		root: Folder,
		crawl_cursor: Option<String>,
		update_cursor: String,
		finished_crawling: bool,
		last_save: DateTime<Utc>,
	) -> Self {
		Crawler {
			client,
			db_token,
			db_base_path,
			local_folder,
			snapshot_dir,
			root: RwLock::new(root),
			cursors: Mutex::new(Cursors {
				crawl: crawl_cursor,
				update: update_cursor,
			}),
			finished_crawling: AtomicBool::new(finished_crawling),
			space: Mutex::new((0, 0)),
			stop_request: AtomicBool::new(false),
			updated_entries: AtomicUsize::new(0),
			last_save: Mutex::new(last_save),
			finished: watch::channel(false).0,
			initial_crawl: watch::channel(false).0,
		}
	}

	pub fn client(&self) -> &R {
		&self.client
	}

	pub fn base_path(&self) -> &str {
		&self.db_base_path
	}

	pub fn local_folder(&self) -> Option<&Path> {
		self.local_folder.as_deref()
	}

	pub fn root(&self) -> &RwLock<Folder> {
		&self.root
	}

	pub fn finished_crawling(&self) -> bool {
		self.finished_crawling.load(Ordering::Acquire)
	}

	/// `(used, allocated)` in bytes, as of the last crawl start.
	pub fn space_usage(&self) -> (u64, u64) {
		*lock(&self.space)
	}

	/// Asks the crawl task to stop at its next loop boundary.
	pub fn request_stop(&self) {
		self.stop_request.store(true, Ordering::Release);
	}

	fn stop_requested(&self) -> bool {
		self.stop_request.load(Ordering::Acquire)
	}

	/// Resolves once the crawl task has exited (after its final snapshot).
	pub async fn finished(&self) {
		let mut rx = self.finished.subscribe();
		while !*rx.borrow_and_update() {
			if rx.changed().await.is_err() {
				return;
			}
		}
	}

	/// Resolves once the first full enumeration is complete; latching, so
	/// late subscribers are released immediately. When a loaded snapshot had
	/// already finished crawling this fires right after crawl start.
	pub async fn initial_crawl_done(&self) {
		let mut rx = self.initial_crawl.subscribe();
		while !*rx.borrow_and_update() {
			if rx.changed().await.is_err() {
				return;
			}
		}
	}

	/// Applies one batch to the tree and returns the cursor to continue
	/// from. The write lock spans the whole batch: readers observe batch
	/// boundaries only.
	pub async fn apply_batch(&self, batch: ListFolderResult) -> String {
		debug!("new data ({} entries)", batch.entries.len());
		self.updated_entries
			.fetch_add(batch.entries.len(), Ordering::Relaxed);
		let mut root = self.root.write().await;
		root.apply_batch(&batch.entries);
		batch.cursor
	}

	/// The worker loop: initial enumeration, then longpolling for changes
	/// until [`Crawler::request_stop`]. Transient transport errors are
	/// absorbed; anything else (including authentication failures) aborts.
	pub async fn crawl(&self) -> Result<(), Error> {
		let result = self.crawl_inner().await;
		match &result {
			Ok(()) => info!("crawler task exited normally"),
			Err(e) => error!("crawler task failed: {e}"),
		}
		self.finished.send_replace(true);
		result
	}

	async fn crawl_inner(&self) -> Result<(), Error> {
		debug!("get space usage..");
		let space = self.client.space_usage().await?;
		let allocated = space.allocation.allocated();
		*lock(&self.space) = (space.used, allocated);
		debug!("space used: {} of {} bytes", space.used, allocated);

		if !self.finished_crawling() {
			info!("doing initial crawl..");
			// a cursor restored from a snapshot is resumed as if the last
			// batch had promised more data
			let existing_cursor = lock(&self.cursors).crawl.clone();
			let (mut cursor, mut has_more) = match existing_cursor {
				Some(cursor) => (cursor, true),
				None => {
					let batch = self.client.list_folder(&self.db_base_path, true).await?;
					let has_more = batch.has_more;
					let cursor = self.apply_batch(batch).await;
					lock(&self.cursors).crawl = Some(cursor.clone());
					(cursor, has_more)
				}
			};
			while !self.stop_requested() {
				if !has_more {
					info!("no further data");
					self.finished_crawling.store(true, Ordering::Release);
					self.save_snapshot().await;
					break;
				}
				let batch = match self.client.list_folder_continue(&cursor).await {
					Ok(batch) => batch,
					Err(e) if e.is_transient() => {
						warn!("{e}");
						continue;
					}
					Err(e) => return Err(e),
				};
				has_more = batch.has_more;
				cursor = self.apply_batch(batch).await;
				lock(&self.cursors).crawl = Some(cursor.clone());
			}
		}

		self.initial_crawl.send_replace(true);

		info!("poll for changes..");
		let mut cursor = lock(&self.cursors).update.clone();
		while !self.stop_requested() {
			debug!("longpoll");
			match self.client.longpoll(&cursor, LONGPOLL_TIMEOUT).await {
				Ok(poll) => {
					if poll.changes {
						match self.client.list_folder_continue(&cursor).await {
							Ok(batch) => {
								cursor = self.apply_batch(batch).await;
								lock(&self.cursors).update = cursor.clone();
							}
							Err(e) if e.is_transient() => warn!("{e}"),
							Err(e) => return Err(e),
						}
					}
					if let Some(backoff) = poll.backoff {
						debug!("longpoll backoff: {backoff}s");
						self.sleep_unless_stopped(Duration::from_secs(backoff)).await;
					}
				}
				Err(e) if e.is_transient() => warn!("{e}"),
				Err(e) => return Err(e),
			}
			if self.stop_requested() {
				break;
			}
			let elapsed = Utc::now() - *lock(&self.last_save);
			let save_due = elapsed.num_seconds() > SAVE_INTERVAL.as_secs() as i64
				|| self.updated_entries.load(Ordering::Relaxed) >= SAVE_INTERVAL_ENTRIES;
			if save_due {
				self.save_snapshot().await;
			}
		}

		self.save_snapshot().await;
		Ok(())
	}

	/// Writes the current state through the snapshot store. The finished
	/// latch is cleared for the duration of the write so a shutdown waiter
	/// cannot observe completion while the file is half-written.
	async fn save_snapshot(&self) {
		let was_finished = self.finished.send_replace(false);
		let snapshot = {
			let root = self.root.read().await;
			let cursors = lock(&self.cursors);
			Snapshot {
				version: SNAPSHOT_VERSION,
				root_path: self.db_base_path.clone(),
				db_token: self.db_token.clone(),
				local_folder: self.local_folder.clone(),
				root: root.clone(),
				crawl_cursor: cursors.crawl.clone(),
				update_cursor: cursors.update.clone(),
				finished_crawling: self.finished_crawling(),
				last_save: Utc::now(),
			}
		};
		*lock(&self.last_save) = snapshot.last_save;
		if let Err(e) = snapshot.save(&self.snapshot_dir) {
			warn!("saving snapshot failed: {e}");
		}
		self.updated_entries.store(0, Ordering::Relaxed);
		if was_finished {
			self.finished.send_replace(true);
		}
	}

	async fn sleep_unless_stopped(&self, duration: Duration) {
		let deadline = tokio::time::Instant::now() + duration;
		while !self.stop_requested() {
			let now = tokio::time::Instant::now();
			if now >= deadline {
				break;
			}
			tokio::time::sleep((deadline - now).min(Duration::from_secs(1))).await;
		}
	}
}
