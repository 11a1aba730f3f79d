//! JWalk-based directory walker.

use std::cmp::Ordering;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use jwalk::{Parallelism, WalkDir};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, warn};

use dirstat_core::{
    FileEntry, FileTree, Timestamp, Tree, WalkConfig, WalkError, WalkWarning, WarningKind,
    timestamp,
};

use crate::progress::{ProgressTracker, WalkProgress};

/// Walk `root` with the given exclusion globs and depth limit.
///
/// `max_depth` of `None` materializes every level.
pub fn walk(
    root: impl Into<PathBuf>,
    exclude: &[String],
    max_depth: Option<usize>,
) -> Result<FileTree, WalkError> {
    let mut config = WalkConfig::new(root);
    config.exclude = exclude.to_vec();
    config.max_depth = max_depth;
    Walker::new(config).walk()
}

/// Directory walker producing a rolled-up [`FileTree`].
pub struct Walker {
    config: WalkConfig,
    progress_tx: broadcast::Sender<WalkProgress>,
}

impl Walker {
    /// Create a new walker.
    pub fn new(config: WalkConfig) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            config,
            progress_tx,
        }
    }

    /// Subscribe to progress deltas.
    pub fn subscribe(&self) -> broadcast::Receiver<WalkProgress> {
        self.progress_tx.subscribe()
    }

    /// Run the walk on a dedicated thread.
    ///
    /// Subscribe before spawning to see every progress event.
    pub fn spawn(self) -> WalkHandle {
        let (done_tx, done) = oneshot::channel();
        let spawned = thread::Builder::new()
            .name("dirstat-walk".into())
            .spawn(move || {
                let _ = done_tx.send(self.walk());
            });
        if let Err(err) = spawned {
            // The sender went down with the closure; the handle reports Interrupted.
            warn!(error = %err, "failed to spawn walk thread");
        }
        WalkHandle { done }
    }

    /// Walk the configured root, then roll up the resulting tree.
    pub fn walk(&self) -> Result<FileTree, WalkError> {
        let start = Instant::now();
        let excludes = self.config.compile_excludes()?;

        let root_path = self
            .config
            .root
            .canonicalize()
            .map_err(|e| WalkError::io(&self.config.root, e))?;
        let root_metadata =
            std::fs::metadata(&root_path).map_err(|e| WalkError::io(&root_path, e))?;
        if !root_metadata.is_dir() {
            return Err(WalkError::NotADirectory { path: root_path });
        }
        if root_path.file_name().is_some_and(|name| excludes.is_match(name)) {
            return Err(WalkError::EmptyResult { path: root_path });
        }

        debug!(
            root = %root_path.display(),
            max_depth = ?self.config.max_depth,
            excludes = self.config.exclude.len(),
            "walk started"
        );

        let parallelism = match self.config.threads {
            0 => Parallelism::RayonDefaultPool {
                busy_timeout: Duration::from_millis(100),
            },
            1 => Parallelism::Serial,
            n => Parallelism::RayonNewPool(n),
        };

        let walker = WalkDir::new(&root_path)
            .parallelism(parallelism)
            .skip_hidden(false)
            .follow_links(self.config.follow_symlinks)
            .process_read_dir(move |_depth, _path, _state, children| {
                children.retain(|entry| match entry {
                    Ok(e) => !excludes.is_match(e.file_name()),
                    Err(_) => true,
                });
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => listing_order(
                        (a.file_type().is_dir(), a.file_name()),
                        (b.file_type().is_dir(), b.file_name()),
                    ),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => Ordering::Equal,
                });
            });

        let mut builder = TreeBuilder::new(&self.config);
        let mut progress = ProgressTracker::new(self.progress_tx.clone());
        let mut warnings = Vec::new();

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    let denied = err
                        .io_error()
                        .is_some_and(|e| e.kind() == ErrorKind::PermissionDenied);
                    absorb_unreadable(
                        self.config.strict,
                        path,
                        denied,
                        err.to_string(),
                        &mut warnings,
                    )?;
                    continue;
                }
            };

            let depth = entry.depth();
            let name = entry.file_name().to_string_lossy().into_owned();

            if entry.file_type().is_dir() {
                builder.enter_dir(depth, name);
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    let path = entry.path();
                    warn!(path = %path.display(), error = %err, "skipping entry without metadata");
                    warnings.push(WalkWarning::new(
                        path,
                        err.to_string(),
                        WarningKind::MetadataError,
                    ));
                    continue;
                }
            };

            let size = metadata.len();
            let modified = metadata.modified().ok().map(timestamp);
            builder.add_file(depth, name, size, modified);
            progress.record_file(size);
        }
        progress.flush();

        let visited = builder.visited;
        let Some(root) = builder.finish() else {
            return Err(WalkError::EmptyResult { path: root_path });
        };

        let mut tree = FileTree::new(root).with_warnings(warnings);
        tree.aggregate()?;

        debug!(
            visited,
            size = tree.total_size(),
            files = tree.total_files(),
            nodes = tree.root().node_count(),
            warnings = tree.warnings().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "walk finished"
        );

        Ok(tree)
    }
}

/// Completion side of a spawned walk.
///
/// Exactly one result is delivered through `done`.
pub struct WalkHandle {
    /// Resolves with the finished tree or the error that stopped the walk.
    pub done: oneshot::Receiver<Result<FileTree, WalkError>>,
}

impl WalkHandle {
    /// Wait for the walk to finish.
    pub async fn finish(self) -> Result<FileTree, WalkError> {
        self.done.await.unwrap_or(Err(WalkError::Interrupted))
    }

    /// Block the current (non-async) thread until the walk finishes.
    pub fn blocking_finish(self) -> Result<FileTree, WalkError> {
        self.done.blocking_recv().unwrap_or(Err(WalkError::Interrupted))
    }
}

/// Apply the unreadable-entry policy: abort when `strict`, otherwise record a
/// warning and let the directory stand as empty.
fn absorb_unreadable(
    strict: bool,
    path: PathBuf,
    denied: bool,
    message: String,
    warnings: &mut Vec<WalkWarning>,
) -> Result<(), WalkError> {
    if strict {
        return Err(if denied {
            WalkError::PermissionDenied { path }
        } else {
            WalkError::Io {
                path,
                source: std::io::Error::other(message),
            }
        });
    }

    warn!(path = %path.display(), error = %message, "treating unreadable entry as empty");
    warnings.push(if denied {
        WalkWarning::permission_denied(path)
    } else {
        WalkWarning::read_error(path, message)
    });
    Ok(())
}

/// Directories before files, then case-insensitive by name.
pub(crate) fn listing_order(a: (bool, &OsStr), b: (bool, &OsStr)) -> Ordering {
    b.0.cmp(&a.0)
        .then_with(|| compare_names(&a.1.to_string_lossy(), &b.1.to_string_lossy()))
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| a.cmp(b))
}

/// A directory that is still receiving entries.
struct Frame {
    depth: usize,
    node: Tree<FileEntry>,
}

/// Builds the tree from a depth-first entry stream.
///
/// The stack holds the chain of materialized directories enclosing the
/// current entry. Entries past the depth limit never get a node; their
/// statistics land in the top of the stack.
struct TreeBuilder<'a> {
    config: &'a WalkConfig,
    stack: Vec<Frame>,
    visited: u64,
}

impl<'a> TreeBuilder<'a> {
    fn new(config: &'a WalkConfig) -> Self {
        Self {
            config,
            stack: Vec::new(),
            visited: 0,
        }
    }

    /// Attach every finished directory at `depth` or deeper to its parent.
    fn close_to(&mut self, depth: usize) {
        while self.stack.len() > 1 && self.stack.last().is_some_and(|f| f.depth >= depth) {
            if let Some(done) = self.stack.pop() {
                if let Some(parent) = self.stack.last_mut() {
                    parent.node.add_subtree(done.node);
                }
            }
        }
    }

    fn enter_dir(&mut self, depth: usize, name: String) {
        self.visited += 1;
        self.close_to(depth);
        if self.stack.is_empty() || self.config.materializes(depth) {
            self.stack.push(Frame {
                depth,
                node: Tree::new(FileEntry::directory(name)),
            });
        }
    }

    fn add_file(&mut self, depth: usize, name: String, size: u64, modified: Option<Timestamp>) {
        self.visited += 1;
        self.close_to(depth);
        let materialize = self.config.materializes(depth);
        let Some(parent) = self.stack.last_mut() else {
            return;
        };
        parent.node.value.add_file(&name, size, modified);
        if materialize {
            parent.node.add_child(FileEntry::file(name, size, modified));
        }
    }

    fn finish(mut self) -> Option<Tree<FileEntry>> {
        self.close_to(1);
        self.stack.pop().map(|f| f.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// root/{a (10 bytes), b (20 bytes), d/c (5 bytes)}
    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::write(root.join("a"), [0u8; 10]).unwrap();
        fs::write(root.join("b"), [0u8; 20]).unwrap();
        fs::create_dir(root.join("d")).unwrap();
        fs::write(root.join("d/c"), [0u8; 5]).unwrap();

        temp
    }

    fn names(node: &Tree<FileEntry>) -> Vec<&str> {
        node.children.iter().map(|c| c.value.name.as_str()).collect()
    }

    #[test]
    fn test_basic_walk() {
        let temp = create_test_tree();
        let tree = walk(temp.path(), &[], None).unwrap();

        assert!(tree.is_aggregated());
        assert_eq!(tree.total_size(), 35);
        assert_eq!(tree.total_files(), 3);
        assert_eq!(names(tree.root()), vec!["d", "a", "b"]);

        let d = tree.select(&["d"]).unwrap();
        assert_eq!(d.value.size, 5);
        assert_eq!(d.value.count, 1);
        assert!(d.value.is_dir);
        assert_eq!(names(d), vec!["c"]);
        assert!(d.children[0].value.extensions.is_none());
    }

    #[test]
    fn test_crop_after_walk() {
        let temp = create_test_tree();
        let mut tree = walk(temp.path(), &[], None).unwrap();
        tree.crop(Some(0));

        assert!(tree.root().is_leaf());
        assert_eq!(tree.total_size(), 35);
        assert_eq!(tree.total_files(), 3);
    }

    #[test]
    fn test_exclude_directory() {
        let temp = create_test_tree();
        let tree = walk(temp.path(), &["d".to_string()], None).unwrap();

        assert_eq!(tree.total_size(), 30);
        assert_eq!(tree.total_files(), 2);
        assert_eq!(names(tree.root()), vec!["a", "b"]);
    }

    #[test]
    fn test_exclude_file_glob() {
        let temp = create_test_tree();
        fs::write(temp.path().join("d/skip.log"), [0u8; 100]).unwrap();
        let tree = walk(temp.path(), &["*.log".to_string()], None).unwrap();

        assert_eq!(tree.total_size(), 35);
        assert!(!tree.value().extensions.as_ref().unwrap().contains_key(".log"));
    }

    #[test]
    fn test_depth_zero_folds_into_root() {
        let temp = create_test_tree();
        let tree = walk(temp.path(), &[], Some(0)).unwrap();

        assert!(tree.root().is_leaf());
        assert_eq!(tree.total_size(), 35);
        assert_eq!(tree.total_files(), 3);
        assert_eq!(tree.value().extensions.as_ref().unwrap()[""].count, 3);
    }

    #[test]
    fn test_depth_one_truncates_below() {
        let temp = create_test_tree();
        fs::create_dir_all(temp.path().join("d/e/f")).unwrap();
        fs::write(temp.path().join("d/e/f/g.txt"), [0u8; 7]).unwrap();

        let tree = walk(temp.path(), &[], Some(1)).unwrap();
        assert_eq!(tree.total_size(), 42);
        assert_eq!(tree.total_files(), 4);

        let d = tree.select(&["d"]).unwrap();
        assert!(d.is_leaf());
        assert_eq!(d.value.size, 12);
        assert_eq!(d.value.count, 2);
        assert_eq!(d.value.extensions.as_ref().unwrap()[".txt"].size, 7);
        assert_eq!(tree.root().node_count(), 4);
    }

    #[test]
    fn test_listing_order() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("B.txt"), "b").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::create_dir(root.join("Zdir")).unwrap();
        fs::create_dir(root.join("adir")).unwrap();

        let tree = walk(root, &[], None).unwrap();
        assert_eq!(names(tree.root()), vec!["adir", "Zdir", "a.txt", "B.txt"]);
    }

    #[test]
    fn test_invalid_glob_fails_first() {
        let err = walk("/definitely/not/here", &["[".to_string()], None).unwrap_err();
        assert!(matches!(err, WalkError::InvalidGlob { .. }));
    }

    #[test]
    fn test_missing_root() {
        let temp = TempDir::new().unwrap();
        let err = walk(temp.path().join("missing"), &[], None).unwrap_err();
        assert!(matches!(err, WalkError::NotFound { .. }));
    }

    #[test]
    fn test_root_is_file() {
        let temp = create_test_tree();
        let err = walk(temp.path().join("a"), &[], None).unwrap_err();
        assert!(matches!(err, WalkError::NotADirectory { .. }));
    }

    #[test]
    fn test_everything_excluded() {
        let temp = create_test_tree();
        let err = walk(temp.path(), &["*".to_string()], None).unwrap_err();
        assert!(matches!(err, WalkError::EmptyResult { .. }));
    }

    #[test]
    fn test_empty_directory_is_not_empty_result() {
        let temp = TempDir::new().unwrap();
        let tree = walk(temp.path(), &[], None).unwrap();
        assert_eq!(tree.total_files(), 0);
        assert!(tree.root().is_leaf());
    }

    #[test]
    fn test_serial_and_parallel_agree() {
        let temp = create_test_tree();
        fs::create_dir_all(temp.path().join("x/y")).unwrap();
        fs::write(temp.path().join("x/y/z.bin"), [0u8; 64]).unwrap();

        let mut serial = WalkConfig::new(temp.path());
        serial.threads = 1;
        let mut parallel = WalkConfig::new(temp.path());
        parallel.threads = 4;

        let a = Walker::new(serial).walk().unwrap();
        let b = Walker::new(parallel).walk().unwrap();
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn test_spawn_delivers_progress_and_result() {
        let temp = create_test_tree();
        let walker = Walker::new(WalkConfig::new(temp.path()));
        let mut progress = walker.subscribe();

        let tree = walker.spawn().blocking_finish().unwrap();
        assert_eq!(tree.total_size(), 35);

        let mut bytes = 0;
        let mut files = 0;
        while let Ok(delta) = progress.try_recv() {
            bytes += delta.bytes;
            files += delta.files;
        }
        assert_eq!(bytes, 35);
        assert_eq!(files, 3);
    }

    #[test]
    fn test_spawn_delivers_error() {
        let walker = Walker::new(WalkConfig::new("/definitely/not/here"));
        let err = walker.spawn().blocking_finish().unwrap_err();
        assert!(matches!(err, WalkError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory() {
        use std::os::unix::fs::PermissionsExt;

        let temp = create_test_tree();
        let locked = temp.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("hidden"), [0u8; 50]).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can still list it; nothing to observe then.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let tree = walk(temp.path(), &[], None).unwrap();
        assert_eq!(tree.total_size(), 35);
        let node = tree.select(&["locked"]).unwrap();
        assert!(node.is_leaf());
        assert!(!tree.warnings().is_empty());

        let mut strict = WalkConfig::new(temp.path());
        strict.strict = true;
        let err = Walker::new(strict).walk().unwrap_err();
        assert!(matches!(err, WalkError::PermissionDenied { .. } | WalkError::Io { .. }));

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_unreadable_entry_is_absorbed() {
        let mut warnings = Vec::new();

        absorb_unreadable(false, "/x/locked".into(), true, "denied".into(), &mut warnings).unwrap();
        absorb_unreadable(false, "/x/broken".into(), false, "io".into(), &mut warnings).unwrap();

        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].kind, WarningKind::PermissionDenied);
        assert_eq!(warnings[0].path, PathBuf::from("/x/locked"));
        assert_eq!(warnings[1].kind, WarningKind::ReadError);
    }

    #[test]
    fn test_unreadable_entry_aborts_when_strict() {
        let mut warnings = Vec::new();

        let err = absorb_unreadable(true, "/x/locked".into(), true, "denied".into(), &mut warnings)
            .unwrap_err();
        assert!(matches!(err, WalkError::PermissionDenied { ref path } if path == Path::new("/x/locked")));

        let err = absorb_unreadable(true, "/x/broken".into(), false, "io".into(), &mut warnings)
            .unwrap_err();
        assert!(matches!(err, WalkError::Io { .. }));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unlisted_directory_stays_empty() {
        // The stream a walk yields when `locked` cannot be listed.
        let config = WalkConfig::new("/x");
        let mut builder = TreeBuilder::new(&config);
        builder.enter_dir(0, "x".into());
        builder.enter_dir(1, "locked".into());
        builder.add_file(1, "a".into(), 10, None);

        let mut tree = FileTree::new(builder.finish().unwrap());
        tree.aggregate().unwrap();

        assert_eq!(tree.total_size(), 10);
        assert_eq!(tree.total_files(), 1);
        let locked = tree.select(&["locked"]).unwrap();
        assert!(locked.is_leaf());
        assert_eq!(locked.value.size, 0);
        assert_eq!(locked.value.count, 0);
    }

    #[test]
    fn test_epoch_mtime_is_kept() {
        let temp = TempDir::new().unwrap();
        let file = fs::File::create(temp.path().join("old.txt")).unwrap();
        file.set_modified(std::time::SystemTime::UNIX_EPOCH).unwrap();
        drop(file);

        let tree = walk(temp.path(), &[], None).unwrap();
        let epoch = Some(timestamp(std::time::SystemTime::UNIX_EPOCH));

        assert_eq!(tree.root().children[0].value.modified, epoch);
        assert_eq!(tree.value().modified, epoch);
        assert_eq!(tree.value().extensions.as_ref().unwrap()[".txt"].modified, epoch);

        let json = tree.to_json_pretty().unwrap();
        assert!(json.contains("\"1970-01-01T00:00:00Z\""));
        assert!(!json.contains("0001-01-01T00:00:00Z"));
    }

    #[test]
    fn test_compare_names() {
        assert_eq!(compare_names("abc", "ABD"), Ordering::Less);
        assert_eq!(compare_names("b", "A"), Ordering::Greater);
        assert_eq!(
            listing_order((false, OsStr::new("a")), (true, OsStr::new("z"))),
            Ordering::Greater
        );
    }
}
