use ahash::AHashMap as HashMap;
use log::trace;
use std::sync::Arc;

use crate::data_store::var_cell::VarCell;
use crate::transaction::LogEntry;

/// Represents the type of conflict detected at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictType {
    /// A variable the transaction only read was changed by another commit.
    ReadWrite,
    /// A variable the transaction writes was changed by another commit after it was observed.
    WriteWrite,
    /// Another transaction is in the middle of committing to the variable.
    Locked,
}

/// The first variable that made a commit attempt fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Conflict {
    pub(crate) var_id: u64,
    pub(crate) kind: ConflictType,
}

/// Locks every written variable of the log for `txn_id`.
///
/// Each lock is a compare-and-lock against the version the transaction
/// observed. The first failure releases everything taken so far; nothing
/// here ever waits for another transaction.
pub(crate) fn lock_write_set(
    txn_id: u64,
    log: &HashMap<u64, LogEntry>,
) -> std::result::Result<Vec<Arc<VarCell>>, Conflict> {
    let mut locked: Vec<Arc<VarCell>> = Vec::new();
    for (var_id, entry) in log.iter().filter(|(_, entry)| entry.written) {
        if let Err(kind) = entry.cell.try_lock(txn_id, entry.observed.version()) {
            release_all(txn_id, &locked);
            return Err(Conflict {
                var_id: *var_id,
                kind,
            });
        }
        locked.push(Arc::clone(&entry.cell));
    }
    Ok(locked)
}

/// Checks that every read-only variable of the log is unchanged.
pub(crate) fn validate_read_set(log: &HashMap<u64, LogEntry>) -> std::result::Result<(), Conflict> {
    for (var_id, entry) in log.iter().filter(|(_, entry)| !entry.written) {
        entry
            .cell
            .validate(entry.observed.version())
            .map_err(|kind| Conflict {
                var_id: *var_id,
                kind,
            })?;
    }
    Ok(())
}

/// Checks every variable of the log, written ones included, without locking.
///
/// Used before a blocked transaction goes to sleep: if anything it looked at
/// already moved on, it must run again instead of waiting.
pub(crate) fn validate_log(log: &HashMap<u64, LogEntry>) -> std::result::Result<(), Conflict> {
    for (var_id, entry) in log.iter() {
        entry
            .cell
            .validate(entry.observed.version())
            .map_err(|kind| Conflict {
                var_id: *var_id,
                kind,
            })?;
    }
    Ok(())
}

pub(crate) fn release_all(txn_id: u64, cells: &[Arc<VarCell>]) {
    for cell in cells {
        cell.release(txn_id);
    }
    if !cells.is_empty() {
        trace!("Tx {} released {} locks", txn_id, cells.len());
    }
}
