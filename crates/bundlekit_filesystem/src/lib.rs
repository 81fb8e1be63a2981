use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

/// In-memory file-system for testing
pub mod in_memory;

/// File-system implementation using std::fs
pub mod os_file_system;

pub use in_memory::InMemoryFileSystem;
pub use os_file_system::OsFileSystem;

/// FileSystem abstraction instance
///
/// This should be `OsFileSystem` for non-testing environments and `InMemoryFileSystem` for testing.
pub type FileSystemRef = Arc<dyn FileSystem + Send + Sync>;

/// Trait abstracting the file-system operations the build pipeline performs.
///
/// Compression backends, the cache store and the manifest writer all go through
/// this trait so that whole builds can run against an in-memory tree in tests.
#[mockall::automock]
pub trait FileSystem: std::fmt::Debug {
  /// Create a directory and all of its missing parents
  fn create_dir_all(&self, path: &Path) -> io::Result<()>;

  fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
  fn read_to_string(&self, path: &Path) -> io::Result<String>;

  /// Write `contents` to `path`, creating parent directories as needed.
  fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

  /// Copy a file, returning the number of bytes copied.
  fn copy(&self, from: &Path, to: &Path) -> io::Result<u64>;

  fn is_file(&self, path: &Path) -> bool;
  fn is_dir(&self, path: &Path) -> bool;

  /// Last modification time of a file.
  fn modified(&self, path: &Path) -> io::Result<SystemTime>;

  /// Size of a file in bytes.
  fn file_size(&self, path: &Path) -> io::Result<u64>;
}
