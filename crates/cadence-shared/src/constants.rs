/// One-time codes are six decimal digits, drawn uniformly from this
/// inclusive range.
pub const CODE_MIN: u32 = 100_000;
pub const CODE_MAX: u32 = 999_999;

/// One-time code lifetime in seconds (10 minutes)
pub const CODE_TTL_SECS: i64 = 10 * 60;

/// Bearer session lifetime in seconds (24 hours)
pub const SESSION_TTL_SECS: i64 = 24 * 60 * 60;

/// Number of weeks shown on the scheduling grid
pub const GRID_WEEKS: usize = 12;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Keys of the independently persisted client-local blobs
pub const BLOB_TASKS: &str = "tasks";
pub const BLOB_CELL_DATA: &str = "cell-data";
pub const BLOB_COLLAPSED: &str = "collapsed-state";
pub const BLOB_CHANGE_LOG: &str = "change-log";

/// Default path of the shared snapshot document in the remote store
pub const SNAPSHOT_PATH: &str = "shared-data/tracker-snapshot.json";
