use std::{
	io::Write,
	path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
	consts::{SNAPSHOT_FILE, SNAPSHOT_FILE_PREV},
	error::Error,
	index::Folder,
};

/// Bump this on changes to how the data is saved.
pub const SNAPSHOT_VERSION: u32 = 1;

/// The durable form of the index: the tree, the cursors, and enough
/// configuration to reconnect without arguments. Serialized as MessagePack,
/// which is self-delimiting; compatibility is gated by `version`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Snapshot {
	pub version: u32,
	pub root_path: String,
	pub db_token: String,
	pub local_folder: Option<PathBuf>,
	pub root: Folder,
	pub crawl_cursor: Option<String>,
	pub update_cursor: String,
	pub finished_crawling: bool,
	pub last_save: DateTime<Utc>,
}

impl Snapshot {
	/// Writes the snapshot next to the previous one. The previous file is
	/// kept as a one-deep backup: after a crash at any point, either the old
	/// or the new snapshot is loadable in full.
	pub fn save(&self, dir: &Path) -> Result<(), Error> {
		let current = dir.join(SNAPSHOT_FILE);
		let prev = dir.join(SNAPSHOT_FILE_PREV);
		debug!("save data to {}", current.display());
		match std::fs::rename(&current, &prev) {
			Ok(()) => {}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
			Err(e) => warn!(
				"moving {} to {} failed ({e})",
				current.display(),
				prev.display()
			),
		}
		let bytes = rmp_serde::to_vec_named(self)?;
		let mut file = std::fs::File::create(&current)?;
		file.write_all(&bytes)?;
		file.flush()?;
		Ok(())
	}

	/// Loads the current snapshot, falling back to the backup when the
	/// current file is missing or torn. A version mismatch is never recovered
	/// from; the operator has to re-initialize.
	pub fn load(dir: &Path) -> Result<Snapshot, Error> {
		let current = dir.join(SNAPSHOT_FILE);
		match Self::load_file(&current) {
			Ok(snapshot) => Ok(snapshot),
			Err(e @ Error::SnapshotVersion { .. }) => Err(e),
			Err(e) => {
				warn!("loading {} failed ({e}), trying backup", current.display());
				Self::load_file(&dir.join(SNAPSHOT_FILE_PREV))
			}
		}
	}

	fn load_file(path: &Path) -> Result<Snapshot, Error> {
		let bytes = std::fs::read(path)?;
		let snapshot: Snapshot = rmp_serde::from_slice(&bytes)?;
		if snapshot.version != SNAPSHOT_VERSION {
			return Err(Error::SnapshotVersion {
				expected: SNAPSHOT_VERSION,
				found: snapshot.version,
			});
		}
		Ok(snapshot)
	}
}
