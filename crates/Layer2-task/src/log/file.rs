//! On-disk log files owned by the supervised process

use ralph_foundation::Result;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Directories (relative to the project) that may hold `*.log` / `*.txt`
const LOG_DIRS: [&str; 3] = [".ralph-tui/logs", "logs", ".ralph-tui"];

/// Per-iteration transcripts; every file counts
const ITERATIONS_DIR: &str = ".ralph-tui/iterations";

/// Log files of a project, newest name first within each pattern.
pub fn find_log_files(project_dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for dir in LOG_DIRS {
        let dir = project_dir.join(dir);
        for pattern in ["*.log", "*.txt"] {
            files.extend(glob_files(&dir, pattern));
        }
    }

    files.extend(glob_files(&project_dir.join(ITERATIONS_DIR), "*"));
    files
}

/// Regular files in `dir` matching `pattern`, reverse-sorted by path.
fn glob_files(dir: &Path, pattern: &str) -> Vec<PathBuf> {
    let full = Path::new(&glob::Pattern::escape(&dir.to_string_lossy())).join(pattern);
    let Ok(paths) = glob::glob(&full.to_string_lossy()) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = paths
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    files.sort_by(|a, b| b.cmp(a));
    files
}

/// Lines `[offset, offset + max_lines)` of a file. A missing file reads as
/// empty; invalid UTF-8 is replaced.
pub async fn read_log_file(path: &Path, max_lines: usize, offset: usize) -> Result<Vec<String>> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut reader = BufReader::new(file);
    let mut raw = Vec::new();
    let mut lines = Vec::new();
    let mut index = 0usize;

    while lines.len() < max_lines {
        raw.clear();
        if reader.read_until(b'\n', &mut raw).await? == 0 {
            break;
        }
        if index >= offset {
            lines.push(super::parse::decode_line(&raw));
        }
        index += 1;
    }
    Ok(lines)
}
