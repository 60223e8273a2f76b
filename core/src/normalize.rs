//! Single-line SQL for execution and logging.

/// Collapses a multi-line SQL template into one line.
///
/// Each line is trimmed and the lines are joined with a single space; the
/// result is trimmed again. Blank lines therefore leave a double space
/// behind, which SQLite ignores.
///
/// # Examples
///
/// ```
/// use sqlrepo_core::normalize_query;
///
/// let sql = "
///     SELECT *
///     FROM Settings
///     WHERE Owner = ?
/// ";
/// assert_eq!(normalize_query(sql), "SELECT * FROM Settings WHERE Owner = ?");
/// ```
pub fn normalize_query(query: &str) -> String {
    query
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}
