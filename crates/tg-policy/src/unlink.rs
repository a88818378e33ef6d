// unlink.rs: Deletion is confined to the scratch root.

use crate::decision::PolicyDecision;
use crate::error::PolicyError;
use crate::path::{collapse_dot_dots, has_parent_component};
use crate::state::SessionState;

/// Where the traced program may delete files unless the session says otherwise.
pub const DEFAULT_SCRATCH_ROOT: &str = "/tmp/";

/// Allows `unlink` only below a single scratch root.
///
/// The root is fixed when the session is built and is separate from the
/// readable/writable prefix rules: a writable prefix does not imply the
/// right to delete.
#[derive(Debug, Clone)]
pub struct UnlinkAuthorizer {
    scratch_root: String,
}

impl UnlinkAuthorizer {
    pub fn new(scratch_root: impl Into<String>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
        }
    }

    pub fn scratch_root(&self) -> &str {
        &self.scratch_root
    }

    /// Decide an `unlink(path)` call.
    ///
    /// The path is collapsed first, so "/tmp/../etc/hosts" is judged as
    /// "/etc/hosts". An unresolvable `..` is denied.
    pub fn authorize_unlink(
        &self,
        path_bytes: &[u8],
        state: &mut SessionState,
    ) -> Result<PolicyDecision, PolicyError> {
        let path = String::from_utf8(path_bytes.to_vec())?;
        let canonical = collapse_dot_dots(&path);

        if !has_parent_component(&canonical) && canonical.starts_with(&self.scratch_root) {
            tracing::debug!("unlink: '{}' allowed", canonical);
            return Ok(PolicyDecision::Continue);
        }

        state.record_denial(format!("Attempt to unlink {}", path));
        Ok(PolicyDecision::kill_rf())
    }
}

impl Default for UnlinkAuthorizer {
    fn default() -> Self {
        Self::new(DEFAULT_SCRATCH_ROOT)
    }
}
