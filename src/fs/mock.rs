// src/fs/mock.rs

use super::{normalize_lexically, FileSystem};
use crate::types::{CaseSensitivity, PathKey};
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { path: PathBuf, content: Vec<u8> },
    Dir { path: PathBuf, children: Vec<PathBuf> },
}

#[derive(Debug)]
struct MockState {
    entries: HashMap<PathKey, MockEntry>,
    /// Remaining forced read failures per path.
    failing_reads: HashMap<PathKey, usize>,
    /// Base for relative paths in `canonicalize`.
    cwd: PathBuf,
}

/// In-memory filesystem for tests.
///
/// Cloning shares the underlying state, so a test can keep one handle to
/// mutate files while the engine reads through another. With
/// [`MockFileSystem::case_insensitive`] lookups ignore letter case the way
/// APFS or NTFS do.
#[derive(Debug, Clone)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
    case: CaseSensitivity,
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::with_case(CaseSensitivity::Sensitive)
    }

    pub fn case_insensitive() -> Self {
        Self::with_case(CaseSensitivity::Insensitive)
    }

    pub fn with_case(case: CaseSensitivity) -> Self {
        let fs = Self {
            state: Arc::new(Mutex::new(MockState {
                entries: HashMap::new(),
                failing_reads: HashMap::new(),
                cwd: PathBuf::from("/"),
            })),
            case,
        };
        // Ensure root exists
        {
            let mut state = fs.state.lock().unwrap();
            fs.ensure_dir_entry(&mut state, Path::new("."));
        }
        fs
    }

    pub fn case(&self) -> CaseSensitivity {
        self.case
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.state.lock().unwrap();
        state.entries.insert(
            self.case.key(&path),
            MockEntry::File {
                path: path.clone(),
                content: content.into(),
            },
        );
        self.link_to_parent(&mut state, &path);
    }

    /// Remove a file. Returns false if nothing was there.
    pub fn remove_file(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let mut state = self.state.lock().unwrap();
        let key = self.case.key(path);
        let stored = match state.entries.get(&key) {
            Some(MockEntry::File { path, .. }) => path.clone(),
            _ => return false,
        };
        state.entries.remove(&key);
        let parent = parent_or_root(&stored).to_path_buf();
        if let Some(MockEntry::Dir { children, .. }) =
            state.entries.get_mut(&self.case.key(&parent))
        {
            children.retain(|child| self.case.key(child) != key);
        }
        true
    }

    /// Move a file, keeping its content.
    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
        let content = {
            let state = self.state.lock().unwrap();
            match state.entries.get(&self.case.key(from.as_ref())) {
                Some(MockEntry::File { content, .. }) => content.clone(),
                _ => return Err(anyhow!("File not found: {:?}", from.as_ref())),
            }
        };
        self.remove_file(&from);
        self.add_file(&to, content);
        Ok(())
    }

    /// Directory relative paths are resolved against. Defaults to `/`.
    pub fn set_current_dir(&self, dir: impl AsRef<Path>) {
        self.state.lock().unwrap().cwd = dir.as_ref().to_path_buf();
    }

    /// Make the next `times` reads of `path` fail, e.g. to simulate a file
    /// that is still being written.
    pub fn fail_next_reads(&self, path: impl AsRef<Path>, times: usize) {
        let mut state = self.state.lock().unwrap();
        state.failing_reads.insert(self.case.key(path.as_ref()), times);
    }

    fn link_to_parent(&self, state: &mut MockState, path: &Path) {
        let parent = parent_or_root(path);
        if parent == path {
            return;
        }
        self.ensure_dir_entry(state, parent);
        let key = self.case.key(path);
        if let Some(MockEntry::Dir { children, .. }) =
            state.entries.get_mut(&self.case.key(parent))
        {
            children.retain(|child| self.case.key(child) != key);
            children.push(path.to_path_buf());
        }
    }

    fn ensure_dir_entry(&self, state: &mut MockState, path: &Path) {
        let key = self.case.key(path);
        if state.entries.contains_key(&key) {
            return;
        }
        state.entries.insert(
            key,
            MockEntry::Dir {
                path: path.to_path_buf(),
                children: Vec::new(),
            },
        );
        // Avoid infinite loop at root
        if parent_or_root(path) != path {
            self.link_to_parent(state, path);
        }
    }
}

fn parent_or_root(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
        Some(parent) => parent,
        None => path,
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        let key = self.case.key(path);
        if let Some(remaining) = state.failing_reads.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(anyhow!("Resource temporarily unavailable: {:?}", path));
            }
        }
        match state.entries.get(&key) {
            Some(MockEntry::File { content, .. }) => {
                String::from_utf8(content.clone())
                    .with_context(|| format!("Invalid UTF-8 in {:?}", path))
            }
            Some(MockEntry::Dir { .. }) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn is_file(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        matches!(
            state.entries.get(&self.case.key(path)),
            Some(MockEntry::File { .. })
        )
    }

    fn is_dir(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        matches!(
            state.entries.get(&self.case.key(path)),
            Some(MockEntry::Dir { .. })
        )
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let state = self.state.lock().unwrap();
        match state.entries.get(&self.case.key(path)) {
            Some(MockEntry::Dir { children, .. }) => Ok(children.clone()),
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        let state = self.state.lock().unwrap();
        let absolute = normalize_lexically(&state.cwd.join(path));
        match state.entries.get(&self.case.key(&absolute)) {
            Some(MockEntry::File { path, .. } | MockEntry::Dir { path, .. }) => Ok(path.clone()),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }
}
