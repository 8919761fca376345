//! Path portability for bundle headers.
//!
//! Headers record where every file originally lived. Absolute paths are
//! written relative to the bundle directory so a bundle can be moved or
//! copied as a whole; `"."` stands for the bundle directory itself and an
//! empty string for "no recorded origin". Headers written by older tools
//! may still hold absolute paths; those are resolved through an optional
//! prefix (the mount point of a relocated tree) and flag the bundle as
//! not relocatable.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// A path read back from a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Resolved path (empty if nothing was recorded)
    pub path: PathBuf,
    /// False if the stored form was absolute
    pub was_relative: bool,
}

/// Remove `.` components and fold `..` into the preceding component
/// without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.iter().collect()
}

/// Lexical path of `target` relative to the directory `base`. Both should
/// be absolute. Returns `"."` when they are the same directory.
pub fn relative_path(base: &Path, target: &Path) -> PathBuf {
    let base = normalize_lexically(base);
    let target = normalize_lexically(target);
    let base_parts: Vec<_> = base.components().collect();
    let target_parts: Vec<_> = target.components().collect();

    let common = base_parts
        .iter()
        .zip(&target_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base_parts.len() {
        out.push("..");
    }
    for part in &target_parts[common..] {
        out.push(part.as_os_str());
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// True if a stored path string is absolute. Headers always use `/` as
/// separator, so a leading slash counts on every platform.
pub fn is_absolute_stored(stored: &str) -> bool {
    stored.starts_with('/') || Path::new(stored).is_absolute()
}

/// Stored form of an original directory: `""` if none was recorded, `"."`
/// for the bundle directory itself, otherwise a relative path using `/`
/// separators.
pub fn portable_dir_path(bundle_dir: &Path, original: &Path) -> String {
    if original.as_os_str().is_empty() {
        return String::new();
    }
    if normalize_lexically(original) == normalize_lexically(bundle_dir) {
        return ".".to_string();
    }
    to_stored_string(&relative_path(bundle_dir, original))
}

/// Stored form of a segment file name. Absolute names are made relative
/// to the bundle directory.
pub fn portable_file_name(bundle_dir: &Path, name: &str) -> String {
    if is_absolute_stored(name) {
        to_stored_string(&relative_path(bundle_dir, Path::new(name)))
    } else {
        name.to_string()
    }
}

/// Resolve a stored directory path against the bundle directory.
///
/// Relative paths are joined to `bundle_dir` and normalized. Absolute
/// paths are taken as they are, behind `prefix` if one is given.
pub fn resolve_stored_path(bundle_dir: &Path, stored: &str, prefix: Option<&Path>) -> ResolvedPath {
    if stored.is_empty() {
        return ResolvedPath {
            path: PathBuf::new(),
            was_relative: true,
        };
    }
    if is_absolute_stored(stored) {
        return ResolvedPath {
            path: apply_prefix(stored, prefix),
            was_relative: false,
        };
    }
    let path = if stored == "." {
        bundle_dir.to_path_buf()
    } else {
        normalize_lexically(&bundle_dir.join(stored))
    };
    ResolvedPath {
        path,
        was_relative: true,
    }
}

/// Resolve a stored segment file name. The result is relative to the
/// bundle directory.
pub fn resolve_file_name(bundle_dir: &Path, stored: &str, prefix: Option<&Path>) -> ResolvedPath {
    if is_absolute_stored(stored) {
        let absolute = apply_prefix(stored, prefix);
        ResolvedPath {
            path: relative_path(bundle_dir, &absolute),
            was_relative: false,
        }
    } else {
        ResolvedPath {
            path: PathBuf::from(stored),
            was_relative: true,
        }
    }
}

fn apply_prefix(stored: &str, prefix: Option<&Path>) -> PathBuf {
    match prefix {
        Some(prefix) if !prefix.as_os_str().is_empty() => {
            let mut joined = OsString::from(prefix.as_os_str());
            joined.push(stored);
            normalize_lexically(Path::new(&joined))
        }
        _ => normalize_lexically(Path::new(stored)),
    }
}

pub(crate) fn to_stored_string(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize_lexically(Path::new("/data/a/./b/../c/")),
            PathBuf::from("/data/a/c")
        );
        assert_eq!(normalize_lexically(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(normalize_lexically(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_relative_path() {
        let base = Path::new("/data/bundles/b1");
        assert_eq!(relative_path(base, base), PathBuf::from("."));
        assert_eq!(
            relative_path(base, Path::new("/data/bundles/b2")),
            PathBuf::from("../b2")
        );
        assert_eq!(
            relative_path(base, Path::new("/data/bundles/b1/sub")),
            PathBuf::from("sub")
        );
        assert_eq!(
            relative_path(base, Path::new("/other")),
            PathBuf::from("../../../other")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_portable_dir_path() {
        let dir = Path::new("/data/b1");
        assert_eq!(portable_dir_path(dir, Path::new("")), "");
        assert_eq!(portable_dir_path(dir, dir), ".");
        assert_eq!(portable_dir_path(dir, Path::new("/data/b1/")), ".");
        assert_eq!(portable_dir_path(dir, Path::new("/data/src")), "../src");
    }

    #[cfg(unix)]
    #[test]
    fn test_portable_file_name() {
        let dir = Path::new("/data/b1");
        assert_eq!(portable_file_name(dir, "bundle.0003"), "bundle.0003");
        assert_eq!(portable_file_name(dir, "/data/packs/pack.0001"), "../packs/pack.0001");
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_relative() {
        let dir = Path::new("/data/b1");
        assert_eq!(
            resolve_stored_path(dir, ".", None),
            ResolvedPath {
                path: PathBuf::from("/data/b1"),
                was_relative: true
            }
        );
        assert_eq!(
            resolve_stored_path(dir, "../src/", None).path,
            PathBuf::from("/data/src")
        );
        assert_eq!(
            resolve_stored_path(dir, "", Some(Path::new("/mnt"))),
            ResolvedPath {
                path: PathBuf::new(),
                was_relative: true
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_absolute_with_prefix() {
        let dir = Path::new("/mnt/data/b1");
        assert_eq!(
            resolve_stored_path(dir, "/data/src/", Some(Path::new("/mnt"))),
            ResolvedPath {
                path: PathBuf::from("/mnt/data/src"),
                was_relative: false
            }
        );
        assert_eq!(
            resolve_stored_path(dir, "/data/src", None).path,
            PathBuf::from("/data/src")
        );

        let name = resolve_file_name(dir, "/data/b1/bundle.0000", Some(Path::new("/mnt")));
        assert_eq!(name.path, PathBuf::from("bundle.0000"));
        assert!(!name.was_relative);
    }

    #[cfg(unix)]
    #[test]
    fn test_store_then_resolve() {
        let dir = Path::new("/srv/globe/bundle");
        for original in ["/srv/globe/bundle", "/srv/globe/other", "/srv", "/tmp/x/y"] {
            let stored = portable_dir_path(dir, Path::new(original));
            assert!(!is_absolute_stored(&stored));
            let resolved = resolve_stored_path(dir, &stored, None);
            assert_eq!(resolved.path, PathBuf::from(original));
            assert!(resolved.was_relative);
        }
    }
}
