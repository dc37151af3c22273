use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Input files directly under `dir` whose name ends in `.<suffix>`
/// (case-insensitive). Sorted for readable logs; callers should not depend on
/// the order. A missing directory yields nothing.
pub fn discover_inputs(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    let re = match Regex::new(&format!(r"(?i)\.{}$", regex::escape(suffix))) {
        Ok(re) => re,
        Err(e) => {
            tracing::warn!(suffix, error = %e, "unusable file suffix");
            return Vec::new();
        }
    };
    if !dir.exists() {
        tracing::warn!(dir = %dir.display(), "input directory does not exist");
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_str().is_some_and(|n| re.is_match(n)))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// `name` → `name.csv`, unless it already ends in `.csv` (any case).
pub fn with_csv_extension(path: &Path) -> PathBuf {
    let has_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if has_csv {
        path.to_path_buf()
    } else {
        let mut s = path.as_os_str().to_os_string();
        s.push(".csv");
        PathBuf::from(s)
    }
}

/// `<output_dir>/<index>_output.csv`
pub fn export_file_name(output_dir: &Path, index: usize) -> PathBuf {
    output_dir.join(format!("{index}_output.csv"))
}

pub fn total_size(files: &[PathBuf]) -> u64 {
    files
        .iter()
        .map(|p| std::fs::metadata(p).map(|m| m.len()).unwrap_or(0))
        .sum()
}
