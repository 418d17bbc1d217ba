//! Path resolution and normalization
//!
//! Every path handed to an adapter is absolute, slash-separated, has no
//! empty or `.`/`..` segments and no trailing slash (except `/` itself).

use crate::config::ConfigError;

/// Resolves caller paths against a current directory, anchored under a root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    cwd: String,
    root: String,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self {
            cwd: "/".to_string(),
            root: "/".to_string(),
        }
    }
}

impl PathResolver {
    /// Create a resolver; both `cwd` and `root` must be absolute
    pub fn new(cwd: &str, root: &str) -> Result<Self, ConfigError> {
        if !is_absolute(cwd) {
            return Err(ConfigError::RelativeCwd(cwd.to_string()));
        }
        if !is_absolute(root) {
            return Err(ConfigError::RelativeRoot(root.to_string()));
        }
        Ok(Self {
            cwd: normalize(cwd),
            root: normalize(root),
        })
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Anchor path: what callers see as `/`
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Join `segments` onto the cwd and anchor the result under the root
    ///
    /// An absolute segment restarts from the top of the caller's namespace.
    /// `..` never climbs above that top, so results always stay under the root.
    pub fn resolve<I, S>(&self, segments: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parts: Vec<String> = components(&self.cwd).map(str::to_string).collect();
        for segment in segments {
            let segment = segment.as_ref().replace('\\', "/");
            if segment.starts_with('/') {
                parts.clear();
            }
            push_components(&mut parts, &segment);
        }

        let mut anchored: Vec<&str> = components(&self.root).collect();
        anchored.extend(parts.iter().map(String::as_str));
        render(&anchored)
    }

    /// Resolve a single path
    pub fn resolve_one(&self, path: &str) -> String {
        self.resolve([path])
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || path.starts_with('\\')
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn push_components(parts: &mut Vec<String>, path: &str) {
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name.to_string()),
        }
    }
}

fn render<S: AsRef<str>>(parts: &[S]) -> String {
    let mut out = String::new();
    for part in parts {
        out.push('/');
        out.push_str(part.as_ref());
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Normalize an absolute path (collapse separators, `.` and `..`, strip trailing `/`)
pub fn normalize(path: &str) -> String {
    let mut parts = Vec::new();
    push_components(&mut parts, &path.replace('\\', "/"));
    render(&parts)
}

/// Parent of a normalized path; `None` for `/`
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Last segment of a normalized path; `/` for the root
pub fn basename(path: &str) -> &str {
    if path == "/" {
        return "/";
    }
    path.rsplit('/').next().unwrap_or(path)
}

/// Append a single name to a directory path
pub fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// True when `path` lies strictly below `ancestor`
pub fn is_within(ancestor: &str, path: &str) -> bool {
    if ancestor == "/" {
        return path != "/" && path.starts_with('/');
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// Re-root `path` (equal to or below `from`) under `to`
pub fn rebase(path: &str, from: &str, to: &str) -> String {
    if path == from {
        return to.to_string();
    }
    let suffix = if from == "/" {
        &path[1..]
    } else {
        &path[from.len() + 1..]
    };
    join(to, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_against_cwd() {
        let resolver = PathResolver::new("/home/user", "/").unwrap();
        assert_eq!(resolver.resolve(["docs/a.txt"]), "/home/user/docs/a.txt");
        assert_eq!(resolver.resolve(["..", "other"]), "/home/other");
        assert_eq!(resolver.resolve(["/abs", "x"]), "/abs/x");
        assert_eq!(resolver.resolve::<[&str; 0], &str>([]), "/home/user");
    }

    #[test]
    fn test_resolve_collapses_and_strips() {
        let resolver = PathResolver::default();
        assert_eq!(resolver.resolve_one("tmp//a/./b/"), "/tmp/a/b");
        assert_eq!(resolver.resolve_one("tmp\\win\\path"), "/tmp/win/path");
        assert_eq!(resolver.resolve_one("/"), "/");
        assert_eq!(resolver.resolve_one(""), "/");
        assert_eq!(resolver.resolve_one("../../.."), "/");
    }

    #[test]
    fn test_resolve_anchors_under_root() {
        let resolver = PathResolver::new("/work", "/sandbox/").unwrap();
        assert_eq!(resolver.root(), "/sandbox");
        assert_eq!(resolver.resolve_one("a.txt"), "/sandbox/work/a.txt");
        assert_eq!(resolver.resolve_one("/"), "/sandbox");
        // `..` cannot climb out of the sandbox
        assert_eq!(resolver.resolve_one("../../../etc/passwd"), "/sandbox/etc/passwd");
    }

    #[test]
    fn test_relative_config_rejected() {
        assert!(matches!(
            PathResolver::new("relative", "/"),
            Err(ConfigError::RelativeCwd(_))
        ));
        assert!(matches!(
            PathResolver::new("/", "root"),
            Err(ConfigError::RelativeRoot(_))
        ));
    }

    #[test]
    fn test_helpers() {
        assert_eq!(parent("/"), None);
        assert_eq!(parent("/a"), Some("/"));
        assert_eq!(parent("/a/b/c"), Some("/a/b"));
        assert_eq!(basename("/a/b.txt"), "b.txt");
        assert_eq!(basename("/"), "/");
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/a", "b"), "/a/b");

        assert!(is_within("/a", "/a/b"));
        assert!(!is_within("/a", "/a"));
        assert!(!is_within("/a", "/ab"));
        assert!(is_within("/", "/x"));

        assert_eq!(rebase("/src/x/y", "/src", "/dst"), "/dst/x/y");
        assert_eq!(rebase("/src", "/src", "/dst"), "/dst");
        assert_eq!(rebase("/x", "/", "/dst"), "/dst/x");
    }
}
