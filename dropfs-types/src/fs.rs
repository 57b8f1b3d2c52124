use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One change-log entry as returned by `files/list_folder` and
/// `files/list_folder/continue`. The wire discriminator is the `".tag"`
/// field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = ".tag", rename_all = "lowercase")]
pub enum Entry {
	File(FileEntry),
	Folder(FolderEntry),
	Deleted(DeletedEntry),
}

impl Entry {
	/// The canonical user-visible path, beginning with `/`.
	pub fn path_display(&self) -> &str {
		match self {
			Entry::File(entry) => &entry.path_display,
			Entry::Folder(entry) => &entry.path_display,
			Entry::Deleted(entry) => &entry.path_display,
		}
	}
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FileEntry {
	pub name: String,
	pub path_display: String,
	pub size: u64,
	pub server_modified: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FolderEntry {
	pub name: String,
	pub path_display: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeletedEntry {
	pub name: String,
	pub path_display: String,
}
