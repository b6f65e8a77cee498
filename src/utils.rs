use std::env::temp_dir;
use std::fs::{create_dir_all, remove_dir_all};
use std::path::{Path, PathBuf};

/// Root of every scratch directory created by unit tests
const SCRATCH_ROOT: &str = "portfolio_risk";

/// Create an empty scratch directory under the system temp dir.
///
/// Leftovers from a previous run are removed first.
pub fn create_temp_dir(dir: &Path) -> PathBuf {
    let path = temp_dir().join(SCRATCH_ROOT).join(dir);

    if path.exists() {
        remove_dir_all(&path).unwrap();
    }
    create_dir_all(&path).unwrap();
    path
}
