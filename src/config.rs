use serde::{Deserialize, Serialize};

use crate::constants::{BASE_PAGES_PER_RANGE, CELLS_PER_PAGE};

/// Engine-wide page geometry: how many cells fit in a page, and how many
/// base pages a range holds before a table rolls over to a new one. Threaded
/// through `Database`/`Table`/`PageRange` as an explicit construction-time
/// parameter rather than read from the environment. `LStoreConfig::default()`
/// matches the hardcoded values every test in this crate relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LStoreConfig {
    pub cells_per_page: usize,
    pub base_pages_per_range: usize,
}

impl Default for LStoreConfig {
    fn default() -> Self {
        LStoreConfig {
            cells_per_page: CELLS_PER_PAGE,
            base_pages_per_range: BASE_PAGES_PER_RANGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_compile_time_constants() {
        let config = LStoreConfig::default();
        assert_eq!(config.cells_per_page, CELLS_PER_PAGE);
        assert_eq!(config.base_pages_per_range, BASE_PAGES_PER_RANGE);
    }
}
