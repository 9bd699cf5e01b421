//! # Circuit Resolution
//!
//! Each compiled version of the policy circuit is a triad of files under a
//! version-tagged directory:
//!
//! ```text
//! <root>/v2/policy.wasm               witness generator
//! <root>/v2/policy.zkey               proving key
//! <root>/v2/verification_key.json     verification key
//! ```
//!
//! [`CircuitResolver::resolve`] probes once, at bootstrap, and picks the
//! newest version whose triad is complete. The resulting [`CircuitMode`] is
//! carried by the prover and verifier; nothing re-probes per call.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Witness generator file name.
pub const WASM_FILE: &str = "policy.wasm";
/// Proving key file name.
pub const ZKEY_FILE: &str = "policy.zkey";
/// Verification key file name.
pub const VKEY_FILE: &str = "verification_key.json";

/// A compiled policy circuit version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CircuitVersion {
    /// Legacy: proves the pattern sub-statement only. No status or key
    /// version checks.
    #[serde(rename = "v1")]
    V1,
    /// Current: proves the full predicate.
    #[serde(rename = "v2")]
    V2,
}

impl CircuitVersion {
    /// Newest first.
    pub const PREFERENCE: [CircuitVersion; 2] = [CircuitVersion::V2, CircuitVersion::V1];

    /// Integer version.
    pub fn number(self) -> u8 {
        match self {
            CircuitVersion::V1 => 1,
            CircuitVersion::V2 => 2,
        }
    }

    /// Directory name under the circuits root.
    pub fn dir_name(self) -> &'static str {
        match self {
            CircuitVersion::V1 => "v1",
            CircuitVersion::V2 => "v2",
        }
    }
}

impl fmt::Display for CircuitVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Paths of one complete artifact triad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitArtifacts {
    /// Which circuit these files belong to.
    pub version: CircuitVersion,
    /// Witness generator.
    pub wasm: PathBuf,
    /// Proving key.
    pub zkey: PathBuf,
    /// Verification key.
    pub verification_key: PathBuf,
}

impl CircuitArtifacts {
    /// The triad for `version` under `root`, if all three are regular files.
    pub fn probe(root: &Path, version: CircuitVersion) -> Option<Self> {
        let dir = root.join(version.dir_name());
        let artifacts = Self {
            version,
            wasm: dir.join(WASM_FILE),
            zkey: dir.join(ZKEY_FILE),
            verification_key: dir.join(VKEY_FILE),
        };
        let missing: Vec<&Path> = [&artifacts.wasm, &artifacts.zkey, &artifacts.verification_key]
            .into_iter()
            .map(PathBuf::as_path)
            .filter(|p| !p.is_file())
            .collect();
        if missing.is_empty() {
            Some(artifacts)
        } else {
            if missing.len() < 3 {
                tracing::warn!(
                    version = %version,
                    missing = ?missing,
                    "incomplete circuit artifact triad ignored"
                );
            }
            None
        }
    }
}

/// How proofs are produced for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum CircuitMode {
    /// A complete triad was found.
    Real(CircuitArtifacts),
    /// No complete triad; every proof is simulated.
    Simulated,
}

impl CircuitMode {
    /// The active circuit version, if any.
    pub fn version(&self) -> Option<CircuitVersion> {
        match self {
            CircuitMode::Real(a) => Some(a.version),
            CircuitMode::Simulated => None,
        }
    }

    /// Whether proofs can be real.
    pub fn is_real(&self) -> bool {
        matches!(self, CircuitMode::Real(_))
    }
}

impl fmt::Display for CircuitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitMode::Real(a) => write!(f, "real circuit {}", a.version),
            CircuitMode::Simulated => f.write_str("simulated"),
        }
    }
}

/// Probes the circuits directory.
pub struct CircuitResolver;

impl CircuitResolver {
    /// Pick the proving mode: newest complete triad, else simulated.
    pub fn resolve(root: &Path) -> CircuitMode {
        Self::select(root, &Self::available(root))
    }

    /// Pick the proving mode from an already probed `available` list.
    pub fn select(root: &Path, available: &[CircuitArtifacts]) -> CircuitMode {
        let mode = available
            .first()
            .cloned()
            .map(CircuitMode::Real)
            .unwrap_or(CircuitMode::Simulated);
        match &mode {
            CircuitMode::Real(a) => tracing::info!(
                version = %a.version,
                root = %root.display(),
                "policy circuit resolved"
            ),
            CircuitMode::Simulated => tracing::warn!(
                root = %root.display(),
                "no complete policy circuit found; proofs will be simulated"
            ),
        }
        mode
    }

    /// Every complete triad under `root`, newest first.
    pub fn available(root: &Path) -> Vec<CircuitArtifacts> {
        CircuitVersion::PREFERENCE
            .into_iter()
            .filter_map(|v| CircuitArtifacts::probe(root, v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_triad(root: &Path, version: CircuitVersion) {
        let dir = root.join(version.dir_name());
        fs::create_dir_all(&dir).unwrap();
        for f in [WASM_FILE, ZKEY_FILE, VKEY_FILE] {
            fs::write(dir.join(f), b"x").unwrap();
        }
    }

    #[test]
    fn empty_root_is_simulated() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(CircuitResolver::resolve(dir.path()), CircuitMode::Simulated);
        assert!(CircuitResolver::available(dir.path()).is_empty());
    }

    #[test]
    fn missing_root_is_simulated() {
        let dir = tempfile::tempdir().unwrap();
        let mode = CircuitResolver::resolve(&dir.path().join("nope"));
        assert!(!mode.is_real());
        assert_eq!(mode.version(), None);
    }

    #[test]
    fn prefers_current_version() {
        let dir = tempfile::tempdir().unwrap();
        write_triad(dir.path(), CircuitVersion::V1);
        write_triad(dir.path(), CircuitVersion::V2);
        let mode = CircuitResolver::resolve(dir.path());
        assert_eq!(mode.version(), Some(CircuitVersion::V2));
        assert_eq!(CircuitResolver::available(dir.path()).len(), 2);
    }

    #[test]
    fn falls_back_to_legacy() {
        let dir = tempfile::tempdir().unwrap();
        write_triad(dir.path(), CircuitVersion::V1);
        let mode = CircuitResolver::resolve(dir.path());
        assert_eq!(mode.version(), Some(CircuitVersion::V1));
        match mode {
            CircuitMode::Real(a) => assert!(a.zkey.ends_with("v1/policy.zkey")),
            CircuitMode::Simulated => panic!("expected legacy circuit"),
        }
    }

    #[test]
    fn select_reuses_a_probed_list() {
        let dir = tempfile::tempdir().unwrap();
        write_triad(dir.path(), CircuitVersion::V1);
        write_triad(dir.path(), CircuitVersion::V2);
        let available = CircuitResolver::available(dir.path());

        // Later changes on disk do not affect a selection from the list.
        fs::remove_dir_all(dir.path().join("v2")).unwrap();
        let mode = CircuitResolver::select(dir.path(), &available);
        assert_eq!(mode.version(), Some(CircuitVersion::V2));
        assert_eq!(
            CircuitResolver::select(dir.path(), &[]),
            CircuitMode::Simulated
        );
    }

    #[test]
    fn incomplete_triad_does_not_count() {
        let dir = tempfile::tempdir().unwrap();
        write_triad(dir.path(), CircuitVersion::V1);
        write_triad(dir.path(), CircuitVersion::V2);
        fs::remove_file(dir.path().join("v2").join(ZKEY_FILE)).unwrap();
        assert_eq!(
            CircuitResolver::resolve(dir.path()).version(),
            Some(CircuitVersion::V1)
        );
    }

    #[test]
    fn directory_in_place_of_file_does_not_count() {
        let dir = tempfile::tempdir().unwrap();
        write_triad(dir.path(), CircuitVersion::V2);
        let wasm = dir.path().join("v2").join(WASM_FILE);
        fs::remove_file(&wasm).unwrap();
        fs::create_dir(&wasm).unwrap();
        assert!(CircuitArtifacts::probe(dir.path(), CircuitVersion::V2).is_none());
    }

    #[test]
    fn mode_serializes_with_tag() {
        let json = serde_json::to_value(CircuitMode::Simulated).unwrap();
        assert_eq!(json["mode"], "simulated");
        assert_eq!(CircuitVersion::V2.to_string(), "v2");
        assert_eq!(CircuitVersion::V1.number(), 1);
    }
}
