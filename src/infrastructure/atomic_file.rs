//! 原子写文件
//!
//! 先在目标文件同目录写临时文件并 fsync，再一次 rename 到目标位置。
//! 读者要么看到旧文件，要么看到完整的新文件；中途失败时临时文件被删除。

use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// 原子地写入文件
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    write_atomic_with(path, bytes, |_| Ok(()))
}

/// 原子地写入文件，`before_commit` 在临时文件写完、rename 之前调用
///
/// `before_commit` 返回错误时放弃本次写入，目标文件保持原样。
pub fn write_atomic_with<F>(path: &Path, bytes: &[u8], before_commit: F) -> io::Result<()>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;

    before_commit(tmp.path())?;

    tmp.persist(path).map_err(|e| e.error)?;
    sync_dir(dir);
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = std::fs::File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("review_a.json");

        write_atomic(&target, b"first").unwrap();
        write_atomic(&target, b"second").unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"second");
        assert_eq!(dir_entries(dir.path()), vec!["review_a.json"]);
    }

    #[test]
    fn test_failure_before_rename_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("review_a.json");
        write_atomic(&target, b"{\"old\": true}").unwrap();

        let err = write_atomic_with(&target, b"{\"new\": tr", |staged| {
            // 临时文件已经完整写好，目标文件还没动
            assert_eq!(std::fs::read(staged).unwrap(), b"{\"new\": tr");
            assert_eq!(std::fs::read(&target).unwrap(), b"{\"old\": true}");
            Err(io::Error::new(io::ErrorKind::Other, "simulated crash"))
        })
        .unwrap_err();

        assert_eq!(err.to_string(), "simulated crash");
        assert_eq!(std::fs::read(&target).unwrap(), b"{\"old\": true}");
        assert_eq!(dir_entries(dir.path()), vec!["review_a.json"]);
    }

    #[test]
    fn test_failure_before_first_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("review_b.json");

        let result = write_atomic_with(&target, b"data", |_| {
            Err(io::Error::new(io::ErrorKind::Other, "simulated crash"))
        });

        assert!(result.is_err());
        assert!(!target.exists());
        assert!(dir_entries(&dir.path().join("nested")).is_empty());
    }
}
