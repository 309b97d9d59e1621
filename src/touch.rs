use std::fs::{self, FileTimes, OpenOptions};
use std::path::Path;
use std::time::SystemTime;

use anyhow::Context;

/// Ensure `path` exists as a file and carries fresh access/modification times.
/// Missing files are created empty; the parent directory must already exist.
pub fn touch_file(path: &Path) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open or create: {}", path.display()))?;
    let now = SystemTime::now();
    let times = FileTimes::new().set_accessed(now).set_modified(now);
    file.set_times(times)
        .with_context(|| format!("set times: {}", path.display()))?;
    Ok(())
}

/// Depth-first walk: directories recurse into each child (enumeration order is
/// whatever the filesystem yields), anything else is touched as a file.
/// The first failure aborts the walk; entries already touched stay touched.
pub fn touch_recursive(path: &Path) -> anyhow::Result<()> {
    if path.is_dir() {
        let entries =
            fs::read_dir(path).with_context(|| format!("read dir: {}", path.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("read dir entry: {}", path.display()))?;
            touch_recursive(&entry.path())?;
        }
        return Ok(());
    }
    touch_file(path)
}
