use crate::error::{Error, Result};

use serde::{Deserialize, Serialize};

/// One staged file's entry in a [`Manifest`]: its name relative to the group prefix and the
/// sha256 the store verified it against (or computed, when no upstream digest was supplied).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ManifestFile {
    pub name: String,
    pub sha256: String,
}

/// The completion marker written to `models/{group}/manifest.yml` once staging succeeds.
/// `quantization`, `prompt_template_name`, `prompt_template_str`, and `main_model` are carried
/// over from the original tool's manifest even though the core reconcile loop here never reads
/// them back; downstream runtime selection (outside this crate) may.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    pub name: String,

    pub files: Vec<ManifestFile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization: Option<String>,

    #[serde(
        default,
        rename = "promptTemplateName",
        skip_serializing_if = "Option::is_none"
    )]
    pub prompt_template_name: Option<String>,

    #[serde(
        default,
        rename = "promptTemplateStr",
        skip_serializing_if = "Option::is_none"
    )]
    pub prompt_template_str: Option<String>,

    #[serde(default, rename = "mainModel", skip_serializing_if = "Option::is_none")]
    pub main_model: Option<String>,
}

impl Manifest {
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(Error::Manifest)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(Error::Manifest)
    }
}
