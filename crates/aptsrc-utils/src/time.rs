use chrono::Local;

/// Format used for timestamp-derived backup extensions, e.g. `261019.1432`.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%y%m%d.%H%M";

/// Returns a backup extension derived from the current local time.
///
/// # Examples
///
/// ```
/// use aptsrc_utils::time::backup_timestamp;
///
/// let ext = backup_timestamp();
/// assert_eq!(ext.len(), 11);
/// ```
pub fn backup_timestamp() -> String {
    Local::now().format(BACKUP_TIMESTAMP_FORMAT).to_string()
}
