// config.rs: Per-session policy configuration.
//
// A SessionConfig is built fresh for every traced process and moved into
// that session's dispatcher. Nothing in it is shared between sessions.
//
// Files can be TOML (`.toml`) or JSON (any other extension):
//
//   architecture = "x86_64"
//   readable_path_prefixes = ["/lib/", "/usr/lib/"]
//   writable_path_prefixes = ["/tmp/tg_run_1234/"]
//   scratch_root = "/tmp/"
//   scratch_writable = true
//   extra_safe_syscalls = [110]

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::arch::Architecture;
use crate::error::{ConfigError, PolicyError};
use crate::path::PathAuthorizer;
use crate::unlink::DEFAULT_SCRATCH_ROOT;
use crate::whitelist::TABLE_SIZE;

/// Policy inputs for one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    /// Syscall profile to use. `None` means the host architecture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<Architecture>,

    /// Prefixes the program may open read-only.
    #[serde(default)]
    pub readable_path_prefixes: Vec<String>,

    /// Prefixes the program may open in any mode.
    #[serde(default)]
    pub writable_path_prefixes: Vec<String>,

    /// The only subtree where `unlink` is allowed.
    #[serde(default = "default_scratch_root")]
    pub scratch_root: String,

    /// Also grant writes below `scratch_root`, wherever it ends up pointing.
    #[serde(default)]
    pub scratch_writable: bool,

    /// Syscall numbers added to the architecture's safe set for this session.
    #[serde(default)]
    pub extra_safe_syscalls: Vec<u32>,
}

fn default_scratch_root() -> String {
    DEFAULT_SCRATCH_ROOT.to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            architecture: None,
            readable_path_prefixes: Vec::new(),
            writable_path_prefixes: Vec::new(),
            scratch_root: default_scratch_root(),
            scratch_writable: false,
            extra_safe_syscalls: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Config for a run in `workdir`: the working directory and the
    /// scratch root are writable, nothing else is readable yet.
    pub fn for_workdir(workdir: impl AsRef<Path>) -> Self {
        let mut config = Self::default().with_writable_scratch();
        config.add_writable(workdir.as_ref().to_string_lossy());
        config
    }

    /// Add read-only prefixes (builder style).
    pub fn with_readable<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.readable_path_prefixes
            .extend(prefixes.into_iter().map(Into::into));
        self
    }

    /// Add writable prefixes (builder style).
    pub fn with_writable<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for prefix in prefixes {
            self.add_writable(prefix);
        }
        self
    }

    pub fn with_architecture(mut self, arch: Architecture) -> Self {
        self.architecture = Some(arch);
        self
    }

    /// Move the scratch root. When the scratch root is writable the grant
    /// moves with it.
    pub fn with_scratch_root(mut self, root: impl Into<String>) -> Self {
        self.scratch_root = root.into();
        self
    }

    pub fn with_writable_scratch(mut self) -> Self {
        self.scratch_writable = true;
        self
    }

    /// Writable prefixes as enforced: the configured list, plus the
    /// scratch root when it is writable.
    pub fn effective_writable_prefixes(&self) -> Vec<String> {
        let mut prefixes = self.writable_path_prefixes.clone();
        if self.scratch_writable && !prefixes.contains(&self.scratch_root) {
            prefixes.push(self.scratch_root.clone());
        }
        prefixes
    }

    /// Path rules for a session built from this config.
    pub fn path_authorizer(&self) -> PathAuthorizer {
        PathAuthorizer::new(&self.readable_path_prefixes, &self.effective_writable_prefixes())
    }

    fn add_writable(&mut self, prefix: impl Into<String>) {
        let prefix = prefix.into();
        if !self.writable_path_prefixes.contains(&prefix) {
            self.writable_path_prefixes.push(prefix);
        }
    }

    /// The configured architecture, or the host's.
    pub fn resolve_architecture(&self) -> Result<Architecture, PolicyError> {
        match self.architecture {
            Some(arch) => Ok(arch),
            None => Architecture::host(),
        }
    }

    /// Check the config before any session is built from it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let prefixes = self
            .readable_path_prefixes
            .iter()
            .chain(&self.writable_path_prefixes)
            .chain(std::iter::once(&self.scratch_root));
        for prefix in prefixes {
            if !prefix.starts_with('/') {
                return Err(ConfigError::RelativePrefix {
                    prefix: prefix.clone(),
                });
            }
        }
        if let Some(number) = self
            .extra_safe_syscalls
            .iter()
            .find(|n| (**n as usize) >= TABLE_SIZE)
        {
            return Err(PolicyError::NumberOutOfRange {
                number: u64::from(*number),
            }
            .into());
        }
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file. `.toml` files are TOML, anything
    /// else is parsed as JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }
}
