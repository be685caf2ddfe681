//! Path helpers shared by the caches, the adapter and the inode table
//!
//! Every path used as a key is normalized first: leading slash, no trailing
//! slash, empty string is the root.

/// Normalize a path to a consistent key
pub fn normalize(path: &str) -> String {
    let path = path.trim();
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }

    let mut key = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    while key.len() > 1 && key.ends_with('/') {
        key.pop();
    }

    key
}

/// Path of `name` directly under `parent`
pub fn join(parent: &str, name: &str) -> String {
    let parent = normalize(parent);
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Parent path of a given path; the root is its own parent
pub fn parent(path: &str) -> String {
    let normalized = normalize(path);
    match normalized.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(pos) => normalized[..pos].to_string(),
    }
}

/// Whether `name` can stand as a single entry inside a directory
pub fn is_leaf_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}
