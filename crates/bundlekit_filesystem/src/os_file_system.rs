use std::io;
use std::path::Path;
use std::time::SystemTime;

use crate::FileSystem;

#[derive(Default, Debug)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
  fn create_dir_all(&self, path: &Path) -> io::Result<()> {
    std::fs::create_dir_all(path)
  }

  fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
    std::fs::read(path)
  }

  fn read_to_string(&self, path: &Path) -> io::Result<String> {
    std::fs::read_to_string(path)
  }

  fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)
  }

  fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
    if let Some(parent) = to.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(from, to)
  }

  fn is_file(&self, path: &Path) -> bool {
    path.is_file()
  }

  fn is_dir(&self, path: &Path) -> bool {
    path.is_dir()
  }

  fn modified(&self, path: &Path) -> io::Result<SystemTime> {
    std::fs::metadata(path)?.modified()
  }

  fn file_size(&self, path: &Path) -> io::Result<u64> {
    Ok(std::fs::metadata(path)?.len())
  }
}
