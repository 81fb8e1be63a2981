use std::collections::HashMap;
use std::io;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::SystemTime;

use parking_lot::RwLock;

use crate::FileSystem;

#[cfg(not(target_os = "windows"))]
fn root_dir() -> PathBuf {
  PathBuf::from("/")
}

#[cfg(target_os = "windows")]
fn root_dir() -> PathBuf {
  PathBuf::from("C:/")
}

/// In memory implementation of a file-system entry
#[derive(Debug)]
enum InMemoryFileSystemEntry {
  File {
    contents: Vec<u8>,
    modified: SystemTime,
  },
  Directory,
}

/// In memory implementation of the `FileSystem` trait, for testing purposes.
///
/// Modification times come from a logical clock that ticks once per write, so
/// rewriting a file always changes its mtime and tests stay deterministic.
#[derive(Debug)]
pub struct InMemoryFileSystem {
  files: RwLock<HashMap<PathBuf, InMemoryFileSystemEntry>>,
  current_working_directory: RwLock<PathBuf>,
  clock: AtomicU64,
}

impl Default for InMemoryFileSystem {
  fn default() -> Self {
    Self {
      files: Default::default(),
      current_working_directory: RwLock::new(root_dir()),
      clock: AtomicU64::new(1),
    }
  }
}

impl InMemoryFileSystem {
  /// Change the current working directory. Used for resolving relative paths.
  pub fn set_current_working_directory(&self, cwd: &Path) {
    let cwd = self.canonicalize(cwd);
    *self.current_working_directory.write() = cwd;
  }

  /// Resolves `path` against the working directory and drops `.` and `..`
  /// components. Every entry of the tree is keyed by its canonical path.
  pub fn canonicalize(&self, path: &Path) -> PathBuf {
    let mut result = if path.is_absolute() {
      PathBuf::new()
    } else {
      self.current_working_directory.read().clone()
    };

    for component in path.components() {
      match component {
        Component::Prefix(_) | Component::RootDir => {
          result.push(component.as_os_str());
        }
        Component::CurDir => {}
        Component::ParentDir => {
          result.pop();
        }
        Component::Normal(name) => result.push(name),
      }
    }

    result
  }

  /// Override the modification time of an existing file.
  pub fn set_modified(&self, path: &Path, time: SystemTime) -> io::Result<()> {
    let path = self.canonicalize(path);
    let mut files = self.files.write();
    match files.get_mut(&path) {
      Some(InMemoryFileSystemEntry::File { modified, .. }) => {
        *modified = time;
        Ok(())
      }
      _ => Err(not_found()),
    }
  }

  /// Remove a file if it exists.
  pub fn remove_file(&self, path: &Path) {
    let path = self.canonicalize(path);
    self.files.write().remove(&path);
  }

  fn tick(&self) -> SystemTime {
    let tick = self.clock.fetch_add(1, Ordering::Relaxed);
    SystemTime::UNIX_EPOCH + Duration::from_secs(tick)
  }

  fn insert_file(&self, path: PathBuf, contents: Vec<u8>) {
    let modified = self.tick();
    let mut files = self.files.write();

    let mut dir = path.parent();
    while let Some(parent) = dir {
      files.insert(parent.to_path_buf(), InMemoryFileSystemEntry::Directory);
      dir = parent.parent();
    }

    files.insert(path, InMemoryFileSystemEntry::File { contents, modified });
  }
}

fn not_found() -> io::Error {
  io::Error::new(io::ErrorKind::NotFound, "File not found")
}

fn is_directory() -> io::Error {
  io::Error::new(io::ErrorKind::InvalidInput, "Path is a directory")
}

impl FileSystem for InMemoryFileSystem {
  fn create_dir_all(&self, path: &Path) -> io::Result<()> {
    let path = self.canonicalize(path);
    let mut files = self.files.write();

    let mut dir = Some(path.as_path());
    while let Some(current) = dir {
      files
        .entry(current.to_path_buf())
        .or_insert(InMemoryFileSystemEntry::Directory);
      dir = current.parent();
    }

    Ok(())
  }

  fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
    let path = self.canonicalize(path);
    let files = self.files.read();
    match files.get(&path) {
      None => Err(not_found()),
      Some(InMemoryFileSystemEntry::File { contents, .. }) => Ok(contents.clone()),
      Some(InMemoryFileSystemEntry::Directory) => Err(is_directory()),
    }
  }

  fn read_to_string(&self, path: &Path) -> io::Result<String> {
    let bytes = self.read(path)?;
    String::from_utf8(bytes).map_err(|_| io::Error::other("Unable to read file as string"))
  }

  fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
    let path = self.canonicalize(path);
    self.insert_file(path, contents.to_vec());
    Ok(())
  }

  fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
    let contents = self.read(from)?;
    let len = contents.len() as u64;
    self.insert_file(self.canonicalize(to), contents);
    Ok(len)
  }

  fn is_file(&self, path: &Path) -> bool {
    let path = self.canonicalize(path);
    matches!(
      self.files.read().get(&path),
      Some(InMemoryFileSystemEntry::File { .. })
    )
  }

  fn is_dir(&self, path: &Path) -> bool {
    let path = self.canonicalize(path);
    matches!(
      self.files.read().get(&path),
      Some(InMemoryFileSystemEntry::Directory)
    )
  }

  fn modified(&self, path: &Path) -> io::Result<SystemTime> {
    let path = self.canonicalize(path);
    match self.files.read().get(&path) {
      Some(InMemoryFileSystemEntry::File { modified, .. }) => Ok(*modified),
      Some(InMemoryFileSystemEntry::Directory) => Err(is_directory()),
      None => Err(not_found()),
    }
  }

  fn file_size(&self, path: &Path) -> io::Result<u64> {
    let path = self.canonicalize(path);
    match self.files.read().get(&path) {
      Some(InMemoryFileSystemEntry::File { contents, .. }) => Ok(contents.len() as u64),
      Some(InMemoryFileSystemEntry::Directory) => Err(is_directory()),
      None => Err(not_found()),
    }
  }
}

#[cfg(test)]
mod test {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn test_canonicalize_noop() {
    let fs = InMemoryFileSystem::default();
    let path = root_dir().join("foo/bar");
    assert_eq!(fs.canonicalize(&path), path);
  }

  #[test]
  fn test_remove_relative_parent_dots() {
    let fs = InMemoryFileSystem::default();
    let result = fs.canonicalize(&root_dir().join("foo/./bar/../baz/"));
    assert_eq!(result, root_dir().join("foo/baz"));
  }

  #[test]
  fn test_with_cwd() {
    let fs = InMemoryFileSystem::default();
    fs.set_current_working_directory(Path::new("/other"));
    let result = fs.canonicalize(Path::new("./foo/./bar/../baz/"));
    assert_eq!(result, root_dir().join("other/foo/baz"));
  }

  #[test]
  fn test_read_file() {
    let fs = InMemoryFileSystem::default();
    fs.write(Path::new("/foo/bar"), b"contents").unwrap();
    assert_eq!(fs.read_to_string(Path::new("/foo/bar")).unwrap(), "contents");
    assert!(fs.is_dir(Path::new("/foo")));
  }

  #[test]
  fn test_read_file_not_found() {
    let fs = InMemoryFileSystem::default();
    assert!(fs.read_to_string(Path::new("/foo/bar")).is_err());
    assert!(!fs.is_file(Path::new("/foo/bar")));
  }

  #[test]
  fn test_rewriting_a_file_advances_its_mtime() {
    let fs = InMemoryFileSystem::default();
    let path = Path::new("/tex/a.png");

    fs.write(path, b"one").unwrap();
    let first = fs.modified(path).unwrap();
    fs.write(path, b"two").unwrap();
    let second = fs.modified(path).unwrap();

    assert!(second > first);
  }

  #[test]
  fn test_copy_and_size() {
    let fs = InMemoryFileSystem::default();
    fs.write(Path::new("/a.png"), b"12345").unwrap();

    fs.copy(Path::new("/a.png"), Path::new("/out/b.png")).unwrap();

    assert_eq!(fs.file_size(Path::new("/out/b.png")).unwrap(), 5);
    assert!(fs.is_dir(Path::new("/out")));
  }

  #[test]
  fn test_remove_file() {
    let fs = InMemoryFileSystem::default();
    fs.write(Path::new("/a.png"), b"x").unwrap();
    fs.remove_file(Path::new("/a.png"));
    assert!(!fs.is_file(Path::new("/a.png")));
  }
}
