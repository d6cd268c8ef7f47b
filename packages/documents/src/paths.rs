//! Where state documents live, on disk and remotely.

use std::path::{Path, PathBuf};

/// Subdirectory of the data directory holding one document per state.
pub const BY_STATE_DIR: &str = "by-state";

/// Returns the `by-state/` directory under `data_dir`.
#[must_use]
pub fn by_state_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(BY_STATE_DIR)
}

/// Returns the document URL for one state under a remote base URL.
#[must_use]
pub fn state_url(base_url: &str, abbr: &str) -> String {
    format!(
        "{}/{}.json",
        base_url.trim_end_matches('/'),
        abbr.to_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_tolerate_trailing_slash() {
        assert_eq!(
            state_url("https://data.example.org/rmp/", "oh"),
            "https://data.example.org/rmp/OH.json"
        );
        assert_eq!(state_url("http://x", "DC"), "http://x/DC.json");
    }

    #[test]
    fn documents_live_under_by_state() {
        assert_eq!(
            by_state_dir(Path::new("/srv/data")),
            PathBuf::from("/srv/data/by-state")
        );
    }
}
