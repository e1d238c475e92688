use std::{fs, path::Path};

use kdispatch_common::{Fallback, SockVerdict, XdpVerdict};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    error::{DispatchError, Result},
    plan::{TailCallEntry, TailCallPlan},
};

/// Verdicts applied when a dispatch finds its slot empty.
///
/// Failing open or closed on a missing handler is a security decision of the
/// deployment, so both fields are mandatory in configuration files and the
/// type has no `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FallbackPolicy {
    /// Verdict of a connect hook with no handler for its address family.
    pub connect: SockVerdict,
    /// Verdict of the edge hook, or of a stage whose next stage is missing.
    pub xdp: XdpVerdict,
}

impl From<FallbackPolicy> for Fallback {
    fn from(policy: FallbackPolicy) -> Self {
        Fallback::new(policy.connect, policy.xdp)
    }
}

/// Loader configuration: what fills the tables, and what happens when a
/// slot stays empty.
///
/// ```json
/// {
///   "fallback": { "connect": "allow", "xdp": "pass" },
///   "tail_calls": [
///     { "table": "cgroup", "stage": "connect4", "program": "cgroup_connect4_tail" },
///     { "table": "xdp", "stage": 0, "program": "xdp_policies_check_tail" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    pub fallback: FallbackPolicy,
    #[serde(default)]
    pub tail_calls: Vec<TailCallEntry>,
}

impl DispatchConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|error| DispatchError::Io {
            path: path.to_owned(),
            error,
        })?;
        let config = Self::from_json(&content)?;
        debug!(
            "loaded {} tail call entries from {}",
            config.tail_calls.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Validates the tail call entries against the stage enumerations.
    pub fn plan(&self) -> Result<TailCallPlan> {
        TailCallPlan::from_entries(&self.tail_calls)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use assert_matches::assert_matches;
    use tempfile::NamedTempFile;

    use super::*;

    const CONFIG: &str = r#"{
        "fallback": { "connect": "allow", "xdp": "pass" },
        "tail_calls": [
            { "table": "cgroup", "stage": "connect4", "program": "cgroup_connect4_tail" },
            { "table": "xdp", "stage": 0, "program": "xdp_policies_check_tail" }
        ]
    }"#;

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let config = DispatchConfig::load(file.path()).unwrap();
        assert_eq!(
            config.fallback,
            FallbackPolicy {
                connect: SockVerdict::Allow,
                xdp: XdpVerdict::Pass,
            }
        );
        let plan = config.plan().unwrap();
        assert_eq!(plan.cgroup().len(), 1);
        assert_eq!(plan.xdp().len(), 1);
    }

    #[test]
    fn fallback_is_mandatory() {
        assert_matches!(
            DispatchConfig::from_json(r#"{ "tail_calls": [] }"#),
            Err(DispatchError::Parse(_))
        );
        assert_matches!(
            DispatchConfig::from_json(r#"{ "fallback": { "connect": "allow" } }"#),
            Err(DispatchError::Parse(_))
        );
    }

    #[test]
    fn missing_file() {
        assert_matches!(
            DispatchConfig::load("/nonexistent/kdispatch.json"),
            Err(DispatchError::Io { .. })
        );
    }

    #[test]
    fn fallback_to_kernel_layout() {
        let fallback = Fallback::from(FallbackPolicy {
            connect: SockVerdict::Allow,
            xdp: XdpVerdict::Drop,
        });
        assert_eq!(fallback, Fallback { connect: 1, xdp: 1 });
    }
}
