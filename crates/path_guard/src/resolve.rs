//! Sandbox-confined path resolution

use std::{
    fs,
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use crate::{PathError, PathResult};

/// Resolves `user_path` against `base_dir`, guaranteeing the result stays
/// inside `base_dir` once every symlink is resolved.
///
/// Relative paths are joined onto `base_dir`; absolute paths are taken as-is
/// and must still land inside it. The target does not need to exist yet: when
/// it doesn't, the nearest existing ancestor is canonicalized and the missing
/// components are re-appended, so a later `create_dir_all` + write lands
/// exactly where the check said it would.
///
/// The returned path is absolute and canonical (up to the not-yet-existing
/// suffix).
pub fn resolve_safe_path(base_dir: &Path, user_path: &str) -> PathResult<PathBuf> {
    if user_path.trim().is_empty() {
        return Err(PathError::Empty);
    }
    if user_path.contains('\0') {
        return Err(PathError::NullByte);
    }

    let requested = Path::new(user_path);
    let candidate = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        base_dir.join(requested)
    };
    let candidate = normalize_lexically(&candidate);

    let resolved = match fs::canonicalize(&candidate) {
        Ok(resolved) => resolved,
        Err(err) if err.kind() == ErrorKind::NotFound => resolve_missing(&candidate)?,
        Err(err) => return Err(PathError::resolve(&candidate)(err)),
    };

    let base_resolved = fs::canonicalize(base_dir).map_err(PathError::resolve(base_dir))?;

    if resolved.strip_prefix(&base_resolved).is_err() {
        tracing::debug!(
            user_path,
            resolved = %resolved.display(),
            base = %base_resolved.display(),
            "rejected path outside base directory"
        );
        return Err(PathError::Escape(user_path.to_string()));
    }

    Ok(resolved)
}

/// Resolves a candidate whose final component does not exist.
fn resolve_missing(candidate: &Path) -> PathResult<PathBuf> {
    // canonicalize reports NotFound for a dangling link too; writing through it
    // would create the link target wherever it points.
    if fs::symlink_metadata(candidate).is_ok_and(|meta| meta.file_type().is_symlink()) {
        return Err(PathError::DanglingSymlink(candidate.to_path_buf()));
    }

    let Some(name) = candidate.file_name() else {
        return Err(PathError::NoExistingAncestor(candidate.to_path_buf()));
    };
    let parent = parent_of(candidate)
        .ok_or_else(|| PathError::NoExistingAncestor(candidate.to_path_buf()))?;

    let resolved_parent = match fs::canonicalize(parent) {
        Ok(resolved) => resolved,
        Err(_) => resolve_existing_parent(parent)?,
    };

    Ok(resolved_parent.join(name))
}

/// Walks up from `path` until an existing directory is found, canonicalizes
/// it, then re-appends the components that were stripped on the way up.
fn resolve_existing_parent(path: &Path) -> PathResult<PathBuf> {
    let mut current = path.to_path_buf();
    let mut unresolved = Vec::new();

    loop {
        let exists = current.exists();
        if !exists
            && fs::symlink_metadata(&current).is_ok_and(|meta| meta.file_type().is_symlink())
        {
            return Err(PathError::DanglingSymlink(current));
        }

        if exists {
            let mut resolved =
                fs::canonicalize(&current).map_err(PathError::resolve(&current))?;
            for part in unresolved.iter().rev() {
                resolved.push(part);
            }
            return Ok(resolved);
        }

        let Some(parent) = parent_of(&current).map(Path::to_path_buf) else {
            return Err(PathError::NoExistingAncestor(path.to_path_buf()));
        };
        if parent == current {
            return Err(PathError::NoExistingAncestor(path.to_path_buf()));
        }

        match current.file_name() {
            Some(name) => unresolved.push(name.to_os_string()),
            None => return Err(PathError::NoExistingAncestor(path.to_path_buf())),
        }
        current = parent;
    }
}

/// Parent directory, treating the empty parent of a bare relative name as `.`.
fn parent_of(path: &Path) -> Option<&Path> {
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Some(Path::new(".")),
        other => other,
    }
}

/// Lexically normalizes a path: drops `.` and redundant separators and folds
/// `..` into the preceding normal component. Does not touch the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                // `..` above the root is the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}
