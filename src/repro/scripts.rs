use std::io;
use std::path::Path;

/// Default script extensions copied into a snapshot
pub const DEFAULT_SCRIPT_EXTENSIONS: &[&str] = &[".py"];

/// Copy the workflow scripts sitting directly in `source_dir` into `dest_dir`.
///
/// Every regular file whose name ends with one of `extensions` is copied to
/// `<name>_<timestamp>.txt`. Subdirectories are not searched. Returns the
/// written file names, sorted.
pub fn save_files_rootdir(
    source_dir: &Path,
    dest_dir: &Path,
    extensions: &[String],
    timestamp: &str,
) -> io::Result<Vec<String>> {
    let mut written = Vec::new();

    for entry in std::fs::read_dir(source_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if !extensions.iter().any(|ext| name.ends_with(ext.as_str())) {
            continue;
        }

        let out_name = format!("{}_{}.txt", name, timestamp);
        std::fs::copy(entry.path(), dest_dir.join(&out_name))?;
        tracing::debug!(script = %name, saved_as = %out_name, "Saved script");
        written.push(out_name);
    }

    written.sort();
    Ok(written)
}
