//! Class-bytes providers for compiled classes on disk.
//!
//! [`Classpath`] searches class directories, jars and jmods in order. [`ClassBytesCache`] puts a
//! read-through, thread-safe cache in front of any [`ClassBytesProvider`], and
//! [`ClasspathTypeLoader`] exposes cached class headers as a [`nova_types::TypeLoader`].

#![forbid(unsafe_code)]

mod cache;
mod loader;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

pub use cache::ClassBytesCache;
pub use loader::ClasspathTypeLoader;

#[derive(Debug, Error)]
pub enum ClasspathError {
    #[error("class `{0}` not found")]
    ClassNotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("classfile error: {0}")]
    ClassFile(#[from] nova_classfile::Error),
}

impl ClasspathError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClasspathError::ClassNotFound(_))
    }
}

/// Supplies raw class-file bytes by binary name (`com.example.App$Inner`).
pub trait ClassBytesProvider: Send + Sync {
    /// Fails with [`ClasspathError::ClassNotFound`] when no entry defines the class.
    fn load(&self, binary_name: &str) -> Result<Vec<u8>, ClasspathError>;
}

impl<T: ClassBytesProvider + ?Sized> ClassBytesProvider for &T {
    fn load(&self, binary_name: &str) -> Result<Vec<u8>, ClasspathError> {
        (**self).load(binary_name)
    }
}

impl<T: ClassBytesProvider + ?Sized> ClassBytesProvider for Box<T> {
    fn load(&self, binary_name: &str) -> Result<Vec<u8>, ClasspathError> {
        (**self).load(binary_name)
    }
}

impl<T: ClassBytesProvider + ?Sized> ClassBytesProvider for Arc<T> {
    fn load(&self, binary_name: &str) -> Result<Vec<u8>, ClasspathError> {
        (**self).load(binary_name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClasspathEntry {
    ClassDir(PathBuf),
    Jar(PathBuf),
    Jmod(PathBuf),
}

impl ClasspathEntry {
    /// Classifies `path`: directories are class roots, `*.jmod` are jmods, anything else a jar.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            ClasspathEntry::ClassDir(path)
        } else if path.extension().is_some_and(|ext| ext == "jmod") {
            ClasspathEntry::Jmod(path)
        } else {
            ClasspathEntry::Jar(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ClasspathEntry::ClassDir(p) | ClasspathEntry::Jar(p) | ClasspathEntry::Jmod(p) => p,
        }
    }
}

/// `com.example.App$Inner` -> `com/example/App$Inner.class`.
fn class_file_path(binary_name: &str) -> String {
    format!("{}.class", binary_name.replace('.', "/"))
}

/// An ordered list of classpath entries; the first entry defining a class wins.
///
/// Archives are opened lazily and kept open for subsequent lookups.
pub struct Classpath {
    entries: Vec<ClasspathEntry>,
    archives: Mutex<HashMap<PathBuf, zip::ZipArchive<File>>>,
}

impl std::fmt::Debug for Classpath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classpath")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl Classpath {
    pub fn new(entries: Vec<ClasspathEntry>) -> Self {
        Self {
            entries,
            archives: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::new(paths.into_iter().map(ClasspathEntry::from_path).collect())
    }

    pub fn entries(&self) -> &[ClasspathEntry] {
        &self.entries
    }

    fn load_from_entry(
        &self,
        entry: &ClasspathEntry,
        file_path: &str,
    ) -> Result<Option<Vec<u8>>, ClasspathError> {
        match entry {
            ClasspathEntry::ClassDir(dir) => {
                let path = dir.join(file_path);
                match std::fs::read(&path) {
                    Ok(bytes) => Ok(Some(bytes)),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
                    Err(err) => Err(err.into()),
                }
            }
            ClasspathEntry::Jar(path) => self.with_archive(path, |archive| {
                if let Some(bytes) = read_zip_entry(archive, file_path)? {
                    return Ok(Some(bytes));
                }
                if !jar_is_multi_release(archive) {
                    return Ok(None);
                }
                match best_versioned_entry(archive, file_path) {
                    Some(name) => read_zip_entry(archive, &name),
                    None => Ok(None),
                }
            }),
            // JMODs place class files under `classes/`.
            ClasspathEntry::Jmod(path) => self.with_archive(path, |archive| {
                read_zip_entry(archive, &format!("classes/{file_path}"))
            }),
        }
    }

    /// Runs `f` over the archive at `path`, opening it on first use. A missing archive
    /// holds no classes.
    fn with_archive(
        &self,
        path: &Path,
        f: impl FnOnce(&mut zip::ZipArchive<File>) -> Result<Option<Vec<u8>>, ClasspathError>,
    ) -> Result<Option<Vec<u8>>, ClasspathError> {
        let mut archives = self.archives.lock();
        let archive = match archives.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                if !path.is_file() {
                    return Ok(None);
                }
                entry.insert(zip::ZipArchive::new(File::open(path)?)?)
            }
        };
        f(archive)
    }
}

impl ClassBytesProvider for Classpath {
    fn load(&self, binary_name: &str) -> Result<Vec<u8>, ClasspathError> {
        let file_path = class_file_path(binary_name);
        for entry in &self.entries {
            if let Some(bytes) = self.load_from_entry(entry, &file_path)? {
                tracing::trace!(
                    target: "nova.classpath",
                    class = binary_name,
                    entry = %entry.path().display(),
                    "loaded class bytes"
                );
                return Ok(bytes);
            }
        }
        Err(ClasspathError::ClassNotFound(binary_name.to_string()))
    }
}

fn read_zip_entry<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, ClasspathError> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut bytes = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut bytes)?;
            Ok(Some(bytes))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Highest `META-INF/versions/<n>/<file_path>` present in the jar.
fn best_versioned_entry<R: Read + Seek>(
    archive: &zip::ZipArchive<R>,
    file_path: &str,
) -> Option<String> {
    archive
        .file_names()
        .filter_map(|name| {
            let rest = name.strip_prefix("META-INF/versions/")?;
            let (version, path) = rest.split_once('/')?;
            if path != file_path {
                return None;
            }
            version.parse::<u32>().ok().map(|v| (v, name.to_string()))
        })
        .max_by_key(|(version, _)| *version)
        .map(|(_, name)| name)
}

fn jar_is_multi_release<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> bool {
    let mut file = match archive.by_name("META-INF/MANIFEST.MF") {
        Ok(file) => file,
        Err(_) => return false,
    };

    let mut manifest = String::new();
    if file.read_to_string(&mut manifest).is_err() {
        return false;
    }

    manifest_is_multi_release(&manifest)
}

fn manifest_is_multi_release(manifest: &str) -> bool {
    for line in manifest.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("Multi-Release") {
            return value.trim().eq_ignore_ascii_case("true");
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_names_map_to_class_file_paths() {
        assert_eq!(class_file_path("com.example.App"), "com/example/App.class");
        assert_eq!(
            class_file_path("com.example.App$Inner"),
            "com/example/App$Inner.class"
        );
    }

    #[test]
    fn manifest_multi_release_flag() {
        assert!(manifest_is_multi_release(
            "Manifest-Version: 1.0\r\nMulti-Release: true\r\n"
        ));
        assert!(!manifest_is_multi_release("Manifest-Version: 1.0\n"));
        assert!(!manifest_is_multi_release("multi-release: false\n"));
    }
}
