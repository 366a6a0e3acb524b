use std::cell::Cell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::constants::{SNAPSHOT_MAGIC, SNAPSHOT_VERSION};
use crate::errors::{EngineError, EngineResult};
use crate::page_directory::Rid;
use crate::table::{Table, TableSnapshot};

/// Whole-engine on-disk snapshot: every table's persistent state in one
/// file, written atomically by `save`.
#[derive(Serialize, Deserialize)]
struct DbSnapshot {
    magic: String,
    version: u16,
    tables: Vec<TableSnapshot>,
}

/// Serialize every table to JSON and replace `path` atomically (write to a
/// sibling `.tmp` file, then rename over the target).
pub fn save(path: &Path, tables: &HashMap<String, Table>) -> EngineResult<()> {
    let snapshot = DbSnapshot {
        magic: SNAPSHOT_MAGIC.to_string(),
        version: SNAPSHOT_VERSION,
        tables: tables.values().map(Table::snapshot).collect(),
    };

    let bytes = serde_json::to_vec(&snapshot)
        .map_err(|e| EngineError::Corrupt(format!("failed to serialize snapshot: {e}")))?;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    fs::write(tmp_path, bytes)
        .map_err(|e| EngineError::Corrupt(format!("failed to write snapshot: {e}")))?;
    fs::rename(tmp_path, path)
        .map_err(|e| EngineError::Corrupt(format!("failed to finalize snapshot: {e}")))?;

    log::debug!("wrote snapshot with {} tables to {}", snapshot.tables.len(), path.display());
    Ok(())
}

/// Load a snapshot written by `save`, rehydrating every table and advancing
/// `next_rid` past the highest value any table had already allocated so the
/// cross-table RID monotonicity invariant survives a close/open round trip.
pub fn load(path: &Path, next_rid: Rc<Cell<Rid>>) -> EngineResult<HashMap<String, Table>> {
    let bytes = fs::read(path)
        .map_err(|e| EngineError::Corrupt(format!("failed to read snapshot: {e}")))?;
    let snapshot: DbSnapshot = serde_json::from_slice(&bytes)
        .map_err(|e| EngineError::Corrupt(format!("failed to parse snapshot: {e}")))?;

    if snapshot.magic != SNAPSHOT_MAGIC {
        return Err(EngineError::Corrupt("snapshot magic mismatch".to_string()));
    }
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(EngineError::Corrupt(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }

    let max_rid = snapshot.tables.iter().map(|t| t.next_rid).max().unwrap_or(0);
    if max_rid > next_rid.get() {
        next_rid.set(max_rid);
    }

    let mut tables = HashMap::with_capacity(snapshot.tables.len());
    for table_snapshot in snapshot.tables {
        let name = table_snapshot.name.clone();
        tables.insert(name, Table::from_snapshot(table_snapshot, next_rid.clone()));
    }

    log::debug!("loaded snapshot with {} tables from {}", tables.len(), path.display());
    Ok(tables)
}
