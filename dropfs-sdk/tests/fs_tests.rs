use std::{path::PathBuf, sync::Arc, time::Duration};

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use dropfs_sdk::{
	cache::FileCache,
	crawler::Crawler,
	fs::{DropboxFs, EntryKind},
};

mod test_utils;
use test_utils::*;

struct Fixture {
	// owns the on-disk state for the lifetime of the test
	_snapshot_dir: tempfile::TempDir,
	_cache_dir: tempfile::TempDir,
	crawler: Arc<Crawler<MockRemote>>,
	fs: DropboxFs<MockRemote>,
	remote: MockRemote,
}

async fn fixture(local_folder: Option<PathBuf>) -> Fixture {
	let snapshot_dir = tempfile::tempdir().unwrap();
	let cache_dir = tempfile::tempdir().unwrap();
	let remote = MockRemote::new();
	let crawler = Arc::new(
		Crawler::init(
			remote.clone(),
			"token".to_string(),
			String::new(),
			local_folder,
			snapshot_dir.path().to_path_buf(),
		)
		.await
		.unwrap(),
	);
	let cache = Arc::new(FileCache::new(
		cache_dir.path().to_path_buf(),
		remote.clone(),
	));
	let fs = DropboxFs::new(crawler.clone(), cache);
	Fixture {
		_snapshot_dir: snapshot_dir,
		_cache_dir: cache_dir,
		crawler,
		fs,
		remote,
	}
}

#[tokio::test]
async fn readdir_on_an_empty_index() {
	let fixture = fixture(None).await;
	let entries = fixture.fs.readdir("/").await;
	let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
	assert_eq!(names, vec![".", ".."]);
}

#[tokio::test]
async fn readdir_lists_folders_before_files() {
	let fixture = fixture(None).await;
	fixture
		.crawler
		.apply_batch(batch(
			vec![
				file_entry("/notes.txt", 4),
				folder_entry("/Docs"),
				file_entry("/Docs/inner.txt", 2),
			],
			"c1",
			false,
		))
		.await;

	let entries = fixture.fs.readdir("/").await;
	let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
	assert_eq!(names, vec![".", "..", "Docs", "notes.txt"]);
	assert_eq!(entries[2].kind, EntryKind::Folder);
	assert_eq!(entries[3].kind, EntryKind::File);

	// unknown directories list as empty instead of failing
	let entries = fixture.fs.readdir("/nope").await;
	assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn getattr_synthesizes_attributes_from_the_index() {
	let fixture = fixture(None).await;
	fixture
		.crawler
		.apply_batch(batch(
			vec![file_entry("/Docs/a.txt", 11), folder_entry("/Music")],
			"c1",
			false,
		))
		.await;

	let attr = fixture.fs.getattr("/Docs/a.txt").await.unwrap();
	assert_eq!(attr.kind, EntryKind::File);
	assert_eq!(attr.mode, 0o666);
	assert_eq!(attr.size, 11);
	let expected = Utc.with_ymd_and_hms(2023, 4, 5, 6, 7, 8).unwrap();
	assert_eq!(attr.mtime, std::time::SystemTime::from(expected));

	let attr = fixture.fs.getattr("/Music").await.unwrap();
	assert_eq!(attr.kind, EntryKind::Folder);
	assert_eq!(attr.mode, 0o777);

	let attr = fixture.fs.getattr("/").await.unwrap();
	assert_eq!(attr.kind, EntryKind::Folder);

	let missing = fixture.fs.getattr("/Docs/missing.txt").await.unwrap_err();
	assert!(missing.is_not_found());
	let missing = fixture.fs.getattr("/nope/deep.txt").await.unwrap_err();
	assert!(missing.is_not_found());
}

#[tokio::test]
async fn getattr_prefers_the_local_mirror() {
	let local = tempfile::tempdir().unwrap();
	std::fs::write(local.path().join("a.txt"), b"abc").unwrap();
	let fixture = fixture(Some(local.path().to_path_buf())).await;
	fixture
		.crawler
		.apply_batch(batch(vec![file_entry("/a.txt", 999)], "c1", false))
		.await;

	let attr = fixture.fs.getattr("/a.txt").await.unwrap();
	// the local stat wins over the index's size
	assert_eq!(attr.size, 3);
}

#[tokio::test]
async fn open_returns_zero_for_non_files_and_reads_on_zero_fail() {
	let fixture = fixture(None).await;
	fixture
		.crawler
		.apply_batch(batch(vec![folder_entry("/Music")], "c1", false))
		.await;

	assert_eq!(fixture.fs.open("/Music").await.unwrap(), 0);
	assert_eq!(fixture.fs.open("/unknown.txt").await.unwrap(), 0);
	assert!(fixture.fs.read("/unknown.txt", 16, 0, 0).await.is_err());
	// releasing a zero handle is a no-op
	fixture.fs.release("/unknown.txt", 0);
}

#[tokio::test]
async fn open_read_release_through_the_cache() {
	let fixture = fixture(None).await;
	fixture
		.crawler
		.apply_batch(batch(vec![file_entry("/Docs/song.txt", 9)], "c1", false))
		.await;
	fixture.remote.add_download(
		"/Docs/song.txt",
		Download::Chunks(vec![Bytes::from_static(b"la la la!")]),
	);

	let fh = fixture.fs.open("/Docs/song.txt").await.unwrap();
	assert_ne!(fh, 0);
	let data = tokio::time::timeout(
		Duration::from_secs(10),
		fixture.fs.read("/Docs/song.txt", 9, 0, fh),
	)
	.await
	.unwrap()
	.unwrap();
	assert_eq!(data, b"la la la!");
	fixture.fs.release("/Docs/song.txt", fh);
}

#[tokio::test]
async fn open_short_circuits_to_the_local_mirror() {
	let local = tempfile::tempdir().unwrap();
	std::fs::write(local.path().join("seeded.txt"), b"from disk").unwrap();
	let fixture = fixture(Some(local.path().to_path_buf())).await;
	fixture
		.crawler
		.apply_batch(batch(vec![file_entry("/seeded.txt", 9)], "c1", false))
		.await;

	let fh = fixture.fs.open("/seeded.txt").await.unwrap();
	assert_ne!(fh, 0);
	let data = fixture.fs.read("/seeded.txt", 64, 0, fh).await.unwrap();
	assert_eq!(data, b"from disk");
	assert_eq!(fixture.remote.download_calls("/seeded.txt"), 0);
	fixture.fs.release("/seeded.txt", fh);
}

#[tokio::test]
async fn remote_paths_mirror_the_virtual_namespace() {
	let fixture = fixture(None).await;
	assert_eq!(fixture.fs.remote_path_of("/Docs/a.txt"), "/Docs/a.txt");
	assert_eq!(fixture.fs.remote_path_of("Docs/a.txt"), "/Docs/a.txt");
}
