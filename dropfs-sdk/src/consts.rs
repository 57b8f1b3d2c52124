use std::time::Duration;

pub const API_URL: &str = "https://api.dropboxapi.com/2";
pub const CONTENT_URL: &str = "https://content.dropboxapi.com/2";
pub const NOTIFY_URL: &str = "https://notify.dropboxapi.com/2";

pub fn api_url(endpoint: &str) -> String {
	format!("{API_URL}/{endpoint}")
}

pub fn content_url(endpoint: &str) -> String {
	format!("{CONTENT_URL}/{endpoint}")
}

pub fn notify_url(endpoint: &str) -> String {
	format!("{NOTIFY_URL}/{endpoint}")
}

/// Timeout for plain RPC endpoints. Longpoll and download requests manage
/// their own deadlines.
pub const API_TIMEOUT: Duration = Duration::from_secs(60);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Server-side longpoll timeout.
pub const LONGPOLL_TIMEOUT: Duration = Duration::from_secs(30);
/// The notify host may hold a longpoll up to 90 s past the requested timeout.
pub const LONGPOLL_JITTER: Duration = Duration::from_secs(90);

pub const SNAPSHOT_FILE: &str = "data.snap";
pub const SNAPSHOT_FILE_PREV: &str = "data.snap.prev";

/// Periodically save every n seconds.
pub const SAVE_INTERVAL: Duration = Duration::from_secs(120);
/// Save when n entries have been updated.
pub const SAVE_INTERVAL_ENTRIES: usize = 500;

/// Where downloaded file contents are laid out, mirroring remote paths.
pub const CACHE_DIR: &str = "file-cache";

/// Download streams are re-chunked to this size before each write and
/// watcher notification.
pub const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// How long a reader waits on a size watcher before re-checking the
/// downloader state.
pub const WATCHER_RECHECK: Duration = Duration::from_secs(2);

/// How long shutdown waits for the crawler task before giving up.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);
