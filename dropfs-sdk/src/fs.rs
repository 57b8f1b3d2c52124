use std::{
	path::{Path, PathBuf},
	sync::Arc,
	time::SystemTime,
};

use log::{debug, warn};

use crate::{
	cache::FileCache,
	crawler::Crawler,
	error::Error,
	index::File,
	remote::RemoteClient,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
	Folder,
	File,
}

/// Attributes as presented to the host filesystem binding. Ownership is not
/// reported here; the mount inherits it from the mounting process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttributes {
	pub kind: EntryKind,
	pub mode: u32,
	pub nlink: u32,
	pub size: u64,
	pub atime: SystemTime,
	pub mtime: SystemTime,
	pub ctime: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
	pub name: String,
	pub kind: EntryKind,
}

/// Translates host filesystem operations into index lookups, attribute
/// synthesis, and file-cache calls. All operations are read-only.
pub struct DropboxFs<R> {
	crawler: Arc<Crawler<R>>,
	cache: Arc<FileCache<R>>,
	local_folder: Option<PathBuf>,
	time_created: SystemTime,
}

fn split_path(path: &str) -> (&str, &str) {
	match path.rsplit_once('/') {
		Some((parent, name)) => (parent, name),
		None => ("", path),
	}
}

impl<R: RemoteClient> DropboxFs<R> {
	pub fn new(crawler: Arc<Crawler<R>>, cache: Arc<FileCache<R>>) -> Self {
		let local_folder = crawler.local_folder().map(Path::to_path_buf);
		DropboxFs {
			crawler,
			cache,
			local_folder,
			time_created: SystemTime::now(),
		}
	}

	/// The remote path a virtual path resolves to, used by the cache to
	/// start downloads. Entries are indexed under their absolute remote
	/// paths, so the virtual namespace already carries the base-path
	/// segments.
	pub fn remote_path_of(&self, path: &str) -> String {
		format!("/{}", path.trim_start_matches('/'))
	}

	fn local_path(&self, path: &str) -> Option<PathBuf> {
		self.local_folder
			.as_ref()
			.map(|local| local.join(path.trim_start_matches('/')))
	}

	/// `.` and `..`, then folders, then files. An unknown path lists as an
	/// empty directory.
	pub async fn readdir(&self, path: &str) -> Vec<DirEntry> {
		debug!("readdir {path}");
		let mut entries = vec![
			DirEntry {
				name: ".".to_string(),
				kind: EntryKind::Folder,
			},
			DirEntry {
				name: "..".to_string(),
				kind: EntryKind::Folder,
			},
		];
		let root = self.crawler.root().read().await;
		match root.find_folder(path) {
			Some(folder) => {
				let (folders, files) = folder.list();
				entries.extend(folders.into_iter().map(|name| DirEntry {
					name,
					kind: EntryKind::Folder,
				}));
				entries.extend(files.into_iter().map(|name| DirEntry {
					name,
					kind: EntryKind::File,
				}));
			}
			None => warn!("unknown path: {path}"),
		}
		entries
	}

	/// Attributes from the pre-seeded local mirror when present, otherwise
	/// synthesized from the index.
	pub async fn getattr(&self, path: &str) -> Result<FileAttributes, Error> {
		if let Some(local) = self.local_path(path)
			&& let Ok(metadata) = std::fs::metadata(&local)
		{
			return Ok(self.attributes_from_metadata(&metadata));
		}
		if path == "/" {
			return Ok(self.folder_attributes());
		}
		let (parent, name) = split_path(path);
		let root = self.crawler.root().read().await;
		let folder = root
			.find_folder(parent)
			.ok_or_else(|| Error::NotFound(path.to_string()))?;
		if folder.folders.contains_key(name) {
			Ok(self.folder_attributes())
		} else if let Some(file) = folder.files.get(name) {
			Ok(self.file_attributes(file))
		} else {
			Err(Error::NotFound(path.to_string()))
		}
	}

	/// Returns a read handle, or `0` when the path does not name a file in
	/// the index (reads against `0` fail).
	pub async fn open(&self, path: &str) -> Result<u64, Error> {
		if let Some(local) = self.local_path(path)
			&& local.exists()
		{
			debug!("open locally: {path}");
			let cache = self.cache.clone();
			let fh = tokio::task::spawn_blocking(move || cache.open_local(&local))
				.await
				.map_err(std::io::Error::from)??;
			return Ok(fh);
		}
		let (parent, name) = split_path(path);
		let is_file = {
			let root = self.crawler.root().read().await;
			root.find_folder(parent)
				.is_some_and(|folder| folder.files.contains_key(name))
		};
		if !is_file {
			return Ok(0);
		}
		debug!("trying to open from cache: {path}");
		let cache = self.cache.clone();
		let virtual_path = path.to_string();
		let rel_path = path.trim_start_matches('/').to_string();
		let remote_path = self.remote_path_of(path);
		let fh = tokio::task::spawn_blocking(move || {
			cache.open(&virtual_path, &rel_path, &remote_path)
		})
		.await
		.map_err(std::io::Error::from)??;
		Ok(fh)
	}

	pub async fn read(
		&self,
		path: &str,
		size: u32,
		offset: u64,
		fh: u64,
	) -> Result<Vec<u8>, Error> {
		if fh == 0 {
			return Err(Error::BadHandle(0));
		}
		debug!("read {size} @ {offset}: {path}");
		self.cache.read(path, size, offset, fh).await
	}

	pub fn release(&self, path: &str, fh: u64) {
		debug!("close {path}");
		if fh == 0 {
			return;
		}
		self.cache.close(fh);
	}

	fn folder_attributes(&self) -> FileAttributes {
		FileAttributes {
			kind: EntryKind::Folder,
			mode: 0o777,
			nlink: 1,
			size: 0,
			atime: self.time_created,
			mtime: self.time_created,
			ctime: self.time_created,
		}
	}

	fn file_attributes(&self, file: &File) -> FileAttributes {
		let modified: SystemTime = file.modified.into();
		FileAttributes {
			kind: EntryKind::File,
			mode: 0o666,
			nlink: 1,
			size: file.size,
			atime: modified,
			mtime: modified,
			ctime: self.time_created,
		}
	}

	fn attributes_from_metadata(&self, metadata: &std::fs::Metadata) -> FileAttributes {
		FileAttributes {
			kind: if metadata.is_dir() {
				EntryKind::Folder
			} else {
				EntryKind::File
			},
			mode: metadata_mode(metadata),
			nlink: 1,
			size: metadata.len(),
			atime: metadata.accessed().unwrap_or(self.time_created),
			mtime: metadata.modified().unwrap_or(self.time_created),
			ctime: metadata.created().unwrap_or(self.time_created),
		}
	}
}

#[cfg(unix)]
fn metadata_mode(metadata: &std::fs::Metadata) -> u32 {
	use std::os::unix::fs::PermissionsExt;
	metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn metadata_mode(metadata: &std::fs::Metadata) -> u32 {
	if metadata.is_dir() { 0o777 } else { 0o666 }
}
