//! Column-overlay helpers shared by `Table::update`/`increment` and by
//! `Transaction`'s compensating-update path.

/// Bitmask over `update`'s columns: bit `i` is set iff `update[i]` is `Some`,
/// i.e. column `i` is being written by this update.
pub fn changed_mask(update: &[Option<i64>]) -> i64 {
    let mut mask: i64 = 0;
    for (i, value) in update.iter().enumerate() {
        if value.is_some() {
            mask |= 1 << i;
        }
    }
    mask
}

/// OR-accumulate a newly changed-columns mask into a record's running
/// `SCHEMA_ENCODING`.
pub fn accumulate_schema(existing: i64, changed: i64) -> i64 {
    existing | changed
}

/// Materialize a full post-image by overlaying `update` onto `current`: a
/// hole (`None`) in `update[i]` means "keep `current[i]`".
pub fn overlay_columns(current: &[i64], update: &[Option<i64>]) -> Vec<i64> {
    current
        .iter()
        .zip(update.iter())
        .map(|(&orig, upd)| upd.unwrap_or(orig))
        .collect()
}
