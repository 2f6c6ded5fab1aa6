use anyhow::{anyhow, Context};
use semver::Version;
use serde::Deserialize;

/// Subset of the payload's `package.json` the launcher cares about.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PayloadManifest {
    pub version: Version,
    #[serde(default)]
    pub name: Option<String>,
}

impl PayloadManifest {
    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("payload manifest is empty"));
        }
        let manifest: Self =
            serde_json::from_str(trimmed).context("failed to parse payload manifest")?;
        Ok(manifest)
    }
}
