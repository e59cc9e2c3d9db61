//! Logical ↔ backend path translation.
//!
//! Logical paths are relative to a configured absolute prefix (container
//! plus optional sub-prefix). Backend paths are the logical path joined onto
//! that prefix. All functions here are pure.

/// Translates logical paths to backend-absolute paths and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    prefix: String,
    separator: String,
}

impl PathResolver {
    /// Create a resolver for `container` with an optional sub-prefix.
    ///
    /// An empty container yields a prefix of just `prefix`.
    pub fn new(container: &str, prefix: &str, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        let mut resolver = Self {
            prefix: String::new(),
            separator,
        };
        resolver.prefix = resolver.join(&[container, prefix]);
        resolver
    }

    /// The absolute prefix every backend path starts with.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Remove leading and trailing separators.
    pub fn strip<'a>(&self, path: &'a str) -> &'a str {
        let sep = self.separator.as_str();
        let mut path = path;
        while let Some(rest) = path.strip_prefix(sep) {
            path = rest;
        }
        while let Some(rest) = path.strip_suffix(sep) {
            path = rest;
        }
        path
    }

    /// Strip every element of a sequence.
    pub fn strip_all<'a>(&self, paths: &[&'a str]) -> Vec<&'a str> {
        paths.iter().map(|p| self.strip(p)).collect()
    }

    /// Join components with the separator, skipping empty segments.
    ///
    /// Runs of separators inside a component collapse to one.
    pub fn join(&self, paths: &[&str]) -> String {
        paths
            .iter()
            .flat_map(|p| self.segments(p))
            .collect::<Vec<_>>()
            .join(&self.separator)
    }

    /// Normalized form of a logical path.
    pub fn normalize(&self, path: &str) -> String {
        self.join(&[path])
    }

    /// Remove the absolute prefix if `path` starts with it.
    ///
    /// The prefix only matches whole segments: with prefix `data`, the path
    /// `database/x` is left alone.
    pub fn unprefix(&self, path: &str) -> String {
        let path = self.strip(path);
        if self.prefix.is_empty() {
            return self.normalize(path);
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some("") => String::new(),
            Some(rest) if rest.starts_with(self.separator.as_str()) => self.normalize(rest),
            _ => self.normalize(path),
        }
    }

    /// Unprefix every element of a sequence.
    pub fn unprefix_all<S: AsRef<str>>(&self, paths: &[S]) -> Vec<String> {
        paths.iter().map(|p| self.unprefix(p.as_ref())).collect()
    }

    /// Backend-absolute path for a logical path.
    pub fn resolve(&self, path: &str) -> String {
        let rel = self.unprefix(path);
        self.join(&[&self.prefix, &rel])
    }

    /// Backend-absolute path for a child of a logical path.
    pub fn resolve_child(&self, path: &str, name: &str) -> String {
        let rel = self.unprefix(path);
        self.join(&[&self.prefix, &rel, name])
    }

    /// Final segment of a path (empty for the root).
    pub fn file_name<'a>(&self, path: &'a str) -> &'a str {
        let path = self.strip(path);
        match path.rfind(self.separator.as_str()) {
            Some(idx) => &path[idx + self.separator.len()..],
            None => path,
        }
    }

    /// Logical ancestors of `path`, nearest first, ending with the root `""`.
    pub fn ancestors(&self, path: &str) -> Vec<String> {
        let segments: Vec<&str> = self.segments(path).collect();
        (0..segments.len())
            .rev()
            .map(|n| segments[..n].join(&self.separator))
            .collect()
    }

    /// Returns true if `path` is `dir` or lies beneath it, comparing segments.
    pub fn is_within(&self, path: &str, dir: &str) -> bool {
        let mut path_segments = self.segments(path);
        self.segments(dir)
            .all(|d| path_segments.next().is_some_and(|p| p == d))
    }

    /// Move `path` from under `old_dir` to under `new_dir`.
    ///
    /// Only the leading segments matching `old_dir` are replaced, so a
    /// segment sequence that recurs deeper in `path` is preserved. Returns
    /// `None` if `path` is not inside `old_dir`.
    pub fn rebase(&self, path: &str, old_dir: &str, new_dir: &str) -> Option<String> {
        if !self.is_within(path, old_dir) {
            return None;
        }
        let skip = self.segments(old_dir).count();
        let rest: Vec<&str> = self.segments(path).skip(skip).collect();
        let rest = rest.join(&self.separator);
        Some(self.join(&[new_dir, &rest]))
    }

    fn segments<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        path.split(self.separator.as_str()).filter(|s| !s.is_empty())
    }
}
