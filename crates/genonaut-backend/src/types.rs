//! Wire types exchanged with a generation backend (§4.2).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSubmission {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub checkpoint_model: String,
    pub lora_models: Vec<genonaut_core::types::LoraEntry>,
    pub width: u32,
    pub height: u32,
    pub batch_size: u32,
    pub sampler_params: genonaut_core::types::SamplerParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatusKind {
    Queued,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendStatusReport {
    pub status: BackendStatusKind,
    pub percent: Option<f32>,
    pub queue_position: Option<u32>,
    /// Populated only once `status == Failed`.
    pub error: Option<String>,
}

/// One produced file, as reported by the backend (§4.2 FetchOutput).
/// `filename` may be relative, including `..` segments — callers must
/// normalize before joining against `output_dir`.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputDescriptor {
    pub filename: String,
    pub subfolder: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Join `output_dir` and an `OutputDescriptor`'s (subfolder, filename),
/// collapsing `.`/`..` components so the result always stays a normal path
/// rooted at `output_dir` — never walks above it via `..` segments (§4.2,
/// §4.8 scenario 2's "mock in-place reference" case).
pub fn resolve_output_path(
    output_dir: &std::path::Path,
    descriptor: &OutputDescriptor,
) -> std::path::PathBuf {
    let mut resolved = output_dir.to_path_buf();
    let joined = std::path::Path::new(&descriptor.subfolder).join(&descriptor.filename);
    for component in joined.components() {
        use std::path::Component;
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::ParentDir => {
                resolved.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_output_path_collapses_parent_segments() {
        let dir = std::path::Path::new("/var/mock/output");
        let desc = OutputDescriptor {
            filename: "../input/fixture.jpg".into(),
            subfolder: String::new(),
            kind: "output".into(),
        };
        let resolved = resolve_output_path(dir, &desc);
        assert_eq!(resolved, std::path::PathBuf::from("/var/mock/input/fixture.jpg"));
    }

    #[test]
    fn resolve_output_path_joins_plain_filenames() {
        let dir = std::path::Path::new("/var/primary/output");
        let desc = OutputDescriptor {
            filename: "out_001.png".into(),
            subfolder: "batch_1".into(),
            kind: "output".into(),
        };
        let resolved = resolve_output_path(dir, &desc);
        assert_eq!(
            resolved,
            std::path::PathBuf::from("/var/primary/output/batch_1/out_001.png")
        );
    }

    #[test]
    fn resolve_output_path_cannot_escape_above_root_via_excess_parent_segments() {
        let dir = std::path::Path::new("/var/mock/output");
        let desc = OutputDescriptor {
            filename: "../../../../etc/passwd".into(),
            subfolder: String::new(),
            kind: "output".into(),
        };
        let resolved = resolve_output_path(dir, &desc);
        // `pop()` on a path with no remaining components is a no-op, so the
        // result stays rooted and never walks above the filesystem root.
        assert!(resolved.starts_with("/"));
        assert!(!resolved.to_string_lossy().contains(".."));
    }
}
