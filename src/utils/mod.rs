pub mod template;

use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs::{DirEntry, ReadDir};
use tokio::io;

/// Depth-first walk over the regular files below one or more roots.
pub struct FileWalker {
    omit_directories: bool,
    stack: Vec<ReadDir>,
}

impl FileWalker {
    pub fn empty(with_directories: bool) -> Self {
        Self {
            omit_directories: !with_directories,
            stack: vec![],
        }
    }

    pub async fn push(&mut self, path: impl AsRef<Path>) -> io::Result<&mut Self> {
        self.stack.push(tokio::fs::read_dir(path).await?);

        Ok(self)
    }

    pub async fn next(&mut self) -> io::Result<Option<DirEntry>> {
        loop {
            let next = {
                let top = if let Some(top) = self.stack.last_mut() {
                    top
                } else {
                    return Ok(None);
                };

                top.next_entry().await?
            };

            let next = if let Some(v) = next {
                v
            } else {
                self.stack.pop();
                continue;
            };

            if !next.file_type().await?.is_dir() {
                return Ok(Some(next));
            }

            self.stack.push(tokio::fs::read_dir(next.path()).await?);

            if !self.omit_directories {
                return Ok(Some(next));
            }
        }
    }

    /// All files below `root`, relative to it and sorted.
    pub async fn collect_relative(root: impl AsRef<Path>) -> io::Result<Vec<PathBuf>> {
        let root = root.as_ref();
        let mut walker = FileWalker::empty(false);
        walker.push(root).await?;

        let mut files = vec![];
        while let Some(entry) = walker.next().await? {
            let path = entry.path();
            if let Ok(relative) = path.strip_prefix(root) {
                files.push(relative.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }
}

/// Replaces `path` with `contents` through a sibling temporary file, so readers observe either
/// the previous file or the complete new one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(parent)?;

    let mut file = tempfile::NamedTempFile::new_in(parent)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;

    Ok(())
}
