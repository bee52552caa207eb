//! Renders a remote timeline directory as text, newest entry first.

use std::io::Write;

use shared::{domain::DirEntry, protocol::ENTRY_READ_LIMIT};

use crate::{error::ClientError, RemoteFs};

/// Writes every entry under `path` to `out` as a `--- <name>` line followed
/// by the first [`ENTRY_READ_LIMIT`] bytes of the entry.
///
/// The first failure aborts the render; whatever was already written to
/// `out` stays there.
pub async fn render<W>(fsys: &dyn RemoteFs, path: &str, out: &mut W) -> Result<(), ClientError>
where
    W: Write + Send,
{
    let mut entries = fsys
        .read_dir(path)
        .await
        .map_err(|source| ClientError::Timeline {
            path: path.to_string(),
            source,
        })?;
    sort_newest_first(&mut entries);

    for entry in &entries {
        let entry_path = format!("{path}/{}", entry.name);
        let chunk = fsys
            .read_chunk(&entry_path, ENTRY_READ_LIMIT)
            .await
            .map_err(|source| ClientError::Timeline {
                path: entry_path.clone(),
                source,
            })?;
        writeln!(out, "--- {}", entry.name)?;
        out.write_all(&chunk)?;
    }
    Ok(())
}

/// Orders by modification time, newest first. Entries with equal times keep
/// their listing order.
pub fn sort_newest_first(entries: &mut [DirEntry]) {
    entries.sort_by(|a, b| b.modified.cmp(&a.modified));
}

#[cfg(test)]
#[path = "tests/timeline_tests.rs"]
mod tests;
