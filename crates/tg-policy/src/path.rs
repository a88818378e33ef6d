// path.rs: Authorization of `open` path arguments.
//
// The traced program names files by path. Before matching a path against
// the session's prefix rules, `..` components are collapsed textually so
// that "/usr/lib/../../etc/passwd" is judged as "/etc/passwd". A `..` that
// would climb above the root (or above the working directory, for relative
// paths) cannot be resolved and is always denied.
//
// Prefix matching is a raw string-prefix test: a rule for "/tmp/ab" also
// covers "/tmp/abc". Prefixes should carry a trailing separator when that
// matters.

use serde::{Deserialize, Serialize};

use crate::decision::PolicyDecision;
use crate::error::PolicyError;
use crate::state::SessionState;

/// `open(2)` flag values for the supported Linux ABIs.
pub const O_RDONLY: u64 = 0;
pub const O_WRONLY: u64 = 0o1;
pub const O_RDWR: u64 = 0o2;
pub const O_CREAT: u64 = 0o100;
pub const O_TRUNC: u64 = 0o1000;
pub const O_APPEND: u64 = 0o2000;
pub const O_CLOEXEC: u64 = 0o2000000;

/// True for modes a read-only rule may grant.
///
/// Only plain `O_RDONLY`, optionally with `O_CLOEXEC`. Any other flag
/// (including `O_CREAT` with a read-only access mode) needs a writable rule.
pub fn is_read_only_mode(mode: u64) -> bool {
    mode == O_RDONLY || mode == (O_RDONLY | O_CLOEXEC)
}

/// One readable or writable path prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathRule {
    pub prefix: String,
    pub writable: bool,
}

impl PathRule {
    pub fn readable(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            writable: false,
        }
    }

    pub fn writable(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            writable: true,
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }

    /// Whether this rule allows opening a matching path with `mode`.
    pub fn grants(&self, mode: u64) -> bool {
        self.writable || is_read_only_mode(mode)
    }
}

/// Collapse `..` components of a path without touching the filesystem.
///
/// The path is split on `/`. A `..` removes the previous named component;
/// when there is none (only the root, or only earlier unresolved `..`), the
/// `..` is kept literally. `.` and empty components between separators are
/// redundant and dropped, so they can never absorb a `..`. A leading `/`
/// and a trailing `/` are preserved.
///
/// If nothing is left the original string is returned unchanged; a bare
/// root canonicalizes to `/`.
pub fn collapse_dot_dots(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut kept: Vec<&str> = Vec::new();

    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => match kept.last() {
                Some(last) if *last != ".." => {
                    kept.pop();
                }
                _ => kept.push(".."),
            },
            name => kept.push(name),
        }
    }

    if kept.is_empty() {
        return if absolute || path.is_empty() {
            "/".to_string()
        } else {
            path.to_string()
        };
    }

    let mut canonical = kept.join("/");
    if absolute {
        canonical.insert(0, '/');
    }
    if path.ends_with('/') {
        canonical.push('/');
    }
    canonical
}

/// True if any component of `path` is `..`.
pub fn has_parent_component(path: &str) -> bool {
    path.split('/').any(|c| c == "..")
}

/// Checks `open` calls against the session's prefix rules.
#[derive(Debug, Clone, Default)]
pub struct PathAuthorizer {
    rules: Vec<PathRule>,
}

impl PathAuthorizer {
    /// Readable rules first, then writable. Order does not affect the result.
    pub fn new(readable: &[String], writable: &[String]) -> Self {
        let rules = readable
            .iter()
            .map(PathRule::readable)
            .chain(writable.iter().map(PathRule::writable))
            .collect();
        Self { rules }
    }

    pub fn from_rules(rules: Vec<PathRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[PathRule] {
        &self.rules
    }

    /// Decide an `open(path, mode)` call.
    ///
    /// On denial the message is recorded in `state`.
    pub fn authorize_open(
        &self,
        path_bytes: &[u8],
        mode: u64,
        state: &mut SessionState,
    ) -> Result<PolicyDecision, PolicyError> {
        let decoded = String::from_utf8(path_bytes.to_vec())?;
        let path = collapse_dot_dots(decoded.trim());

        if has_parent_component(&path) {
            return Ok(deny(state, &path, mode));
        }

        // Relative paths resolve inside the isolated working directory.
        if !path.starts_with('/') {
            tracing::debug!("open: relative path '{}' allowed", path);
            return Ok(PolicyDecision::Continue);
        }

        let granted = self
            .rules
            .iter()
            .any(|rule| rule.matches(&path) && rule.grants(mode));
        if granted {
            tracing::debug!("open: '{}' mode {:#o} allowed", path, mode);
            Ok(PolicyDecision::Continue)
        } else {
            Ok(deny(state, &path, mode))
        }
    }
}

fn deny(state: &mut SessionState, path: &str, mode: u64) -> PolicyDecision {
    state.record_denial(format!("ILLEGAL FILE ACCESS ({},{})", path, mode));
    PolicyDecision::kill_rf()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authorizer() -> PathAuthorizer {
        PathAuthorizer::new(&["/lib".to_string()], &["/work".to_string()])
    }

    fn open(auth: &PathAuthorizer, path: &str, mode: u64) -> PolicyDecision {
        let mut state = SessionState::new();
        auth.authorize_open(path.as_bytes(), mode, &mut state).unwrap()
    }

    #[test]
    fn collapse_simple_parent() {
        assert_eq!(collapse_dot_dots("/usr/lib/../bin/ls"), "/usr/bin/ls");
        assert_eq!(collapse_dot_dots("/a/b/../../c"), "/c");
    }

    #[test]
    fn collapse_keeps_unresolvable_parents() {
        assert_eq!(collapse_dot_dots("/.."), "/..");
        assert_eq!(collapse_dot_dots("/../etc/passwd"), "/../etc/passwd");
        assert_eq!(collapse_dot_dots("../../x"), "../../x");
        assert_eq!(collapse_dot_dots("x/../../y"), "../y");
    }

    #[test]
    fn collapse_edge_cases() {
        assert_eq!(collapse_dot_dots("/"), "/");
        assert_eq!(collapse_dot_dots(""), "/");
        assert_eq!(collapse_dot_dots("/a/.."), "/");
        // Nothing left of a relative path: the original comes back.
        assert_eq!(collapse_dot_dots("a/.."), "a/..");
        assert_eq!(collapse_dot_dots("."), ".");
    }

    #[test]
    fn redundant_components_do_not_absorb_parents() {
        assert_eq!(collapse_dot_dots("/work//../etc/passwd"), "/etc/passwd");
        assert_eq!(collapse_dot_dots("/work/./../etc/passwd"), "/etc/passwd");
    }

    #[test]
    fn collapse_is_identity_on_canonical_paths() {
        for path in ["/", "/usr/lib/libc.so.6", "/work/", "prog.out", "dir/file.txt"] {
            assert_eq!(collapse_dot_dots(path), path);
        }
    }

    #[test]
    fn collapse_is_idempotent() {
        for path in ["/a/b/../c/", "x/../../y", "/work//./f", "/../z"] {
            let once = collapse_dot_dots(path);
            assert_eq!(collapse_dot_dots(&once), once);
        }
    }

    #[test]
    fn prefix_matrix() {
        let auth = authorizer();
        assert_eq!(open(&auth, "/work/x", O_WRONLY | O_CREAT), PolicyDecision::Continue);
        assert_eq!(open(&auth, "/work/x", O_RDWR), PolicyDecision::Continue);
        assert_eq!(open(&auth, "/lib/x", O_WRONLY), PolicyDecision::kill_rf());
        assert_eq!(open(&auth, "/lib/x", O_RDONLY), PolicyDecision::Continue);
        assert_eq!(open(&auth, "/etc/passwd", O_RDONLY), PolicyDecision::kill_rf());
    }

    #[test]
    fn cloexec_does_not_unlock_writes() {
        let auth = authorizer();
        assert_eq!(
            open(&auth, "/lib/libc.so.6", O_RDONLY | O_CLOEXEC),
            PolicyDecision::Continue
        );
        assert_eq!(
            open(&auth, "/lib/libc.so.6", O_WRONLY | O_CLOEXEC),
            PolicyDecision::kill_rf()
        );
        assert_eq!(
            open(&auth, "/lib/libc.so.6", O_RDONLY | O_CREAT),
            PolicyDecision::kill_rf()
        );
    }

    #[test]
    fn relative_paths_always_allowed() {
        let auth = PathAuthorizer::default();
        for mode in [O_RDONLY, O_WRONLY | O_CREAT | O_TRUNC, O_RDWR | O_APPEND] {
            assert_eq!(open(&auth, "prog.out", mode), PolicyDecision::Continue);
            assert_eq!(open(&auth, "sub/dir/../f", mode), PolicyDecision::Continue);
        }
    }

    #[test]
    fn uncollapsible_parent_always_denied() {
        let auth = PathAuthorizer::new(&["/".to_string()], &["/".to_string()]);
        for path in ["/../etc/passwd", "../secret", "a/..", "/.."] {
            assert_eq!(open(&auth, path, O_RDONLY), PolicyDecision::kill_rf(), "{}", path);
        }
    }

    #[test]
    fn traversal_out_of_writable_prefix_is_judged_on_the_target() {
        let auth = authorizer();
        assert_eq!(
            open(&auth, "/work/../etc/passwd", O_RDONLY),
            PolicyDecision::kill_rf()
        );
        assert_eq!(
            open(&auth, "/work/../lib/x", O_RDONLY),
            PolicyDecision::Continue
        );
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let auth = authorizer();
        assert_eq!(open(&auth, "  /lib/x\n", O_RDONLY), PolicyDecision::Continue);
    }

    #[test]
    fn prefix_match_is_not_segment_aware() {
        let auth = PathAuthorizer::new(&[], &["/tmp/ab".to_string()]);
        assert_eq!(open(&auth, "/tmp/abc/f", O_WRONLY), PolicyDecision::Continue);
    }

    #[test]
    fn any_granting_rule_suffices() {
        let auth = PathAuthorizer::from_rules(vec![
            PathRule::readable("/data/"),
            PathRule::writable("/data/"),
        ]);
        assert_eq!(open(&auth, "/data/f", O_WRONLY), PolicyDecision::Continue);
    }

    #[test]
    fn denial_message_names_path_and_mode() {
        let auth = authorizer();
        let mut state = SessionState::new();
        auth.authorize_open(b"/etc/../etc/shadow", O_RDONLY, &mut state)
            .unwrap();
        assert_eq!(
            state.last_denial(),
            Some("ILLEGAL FILE ACCESS (/etc/shadow,0)")
        );
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        let auth = authorizer();
        let mut state = SessionState::new();
        match auth.authorize_open(&[0x2f, 0xff, 0xfe], O_RDONLY, &mut state) {
            Err(PolicyError::InvalidUtf8(_)) => {}
            other => panic!("expected InvalidUtf8, got {:?}", other),
        }
    }
}
