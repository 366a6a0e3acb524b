/// Number of cells that can be stored in a single physical page.
pub const CELLS_PER_PAGE: usize = 512;

/// The number of base page groups per page range before a table must roll
/// over to a new range.
pub const BASE_PAGES_PER_RANGE: usize = 16;

/// Number of metadata columns carried alongside the user columns in every
/// page group: `RID`, `INDIRECTION`, `SCHEMA_ENCODING`, `TIMESTAMP`.
pub const NUM_METADATA_COLS: usize = 4;

/// Offset (from the start of the metadata block) of the `RID` column.
pub const META_RID: usize = 0;

/// Offset (from the start of the metadata block) of the `INDIRECTION` column.
pub const META_INDIRECTION: usize = 1;

/// Offset (from the start of the metadata block) of the `SCHEMA_ENCODING` column.
pub const META_SCHEMA_ENCODING: usize = 2;

/// Offset (from the start of the metadata block) of the `TIMESTAMP` column.
pub const META_TIMESTAMP: usize = 3;

/// Magic marker written at the start of every persisted snapshot.
pub const SNAPSHOT_MAGIC: &str = "LSTORE_RS_SNAPSHOT";

/// Current on-disk snapshot format version.
pub const SNAPSHOT_VERSION: u16 = 1;
