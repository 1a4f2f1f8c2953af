//! Static description of the render service

use serde::{Deserialize, Serialize};

use crate::credentials::credential_key;

/// Service name, also the prefix of credential keys
pub const SERVICE_NAME: &str = "carsRender";

/// Version reported by the manifest
pub const SERVICE_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

/// A parameter accepted by `Start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestParam {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
}

/// What the service is and what it needs from callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestInfo {
    pub name: String,
    pub description: String,
    pub version: String,
    pub categories: Vec<String>,
    pub repository: String,
    pub scope: Vec<String>,
    pub params: Vec<ManifestParam>,
    pub services: Vec<String>,
}

impl ManifestInfo {
    /// Manifest of the render service
    pub fn render() -> Self {
        Self {
            name: SERVICE_NAME.to_string(),
            description: "provide cars render services".to_string(),
            version: SERVICE_VERSION.to_string(),
            categories: Vec::new(),
            repository: env!("CARGO_PKG_REPOSITORY").to_string(),
            scope: vec![
                "keyayun.seal.workItems".to_string(),
                "keyayun.seal.files".to_string(),
                "keyayun.cars.projectDoc".to_string(),
            ],
            params: vec![ManifestParam {
                name: "workItemID".to_string(),
                param_type: "string".to_string(),
                description: "keyayun.seal.workItem DocID".to_string(),
            }],
            services: vec![
                "Start".to_string(),
                "Stop".to_string(),
                "Stream".to_string(),
                "Register".to_string(),
                "Update".to_string(),
                "UnRegister".to_string(),
                "Manifest".to_string(),
            ],
        }
    }

    /// Credential key for a caller domain
    pub fn credential_key(&self, domain: &str) -> String {
        credential_key(&self.name, domain)
    }
}

impl Default for ManifestInfo {
    fn default() -> Self {
        Self::render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_manifest_describes_work_item_param() {
        let manifest = ManifestInfo::render();
        assert_eq!(manifest.name, SERVICE_NAME);
        assert_eq!(manifest.params.len(), 1);
        assert_eq!(manifest.params[0].name, "workItemID");
        assert!(manifest.version.starts_with('v'));
    }

    #[test]
    fn param_type_serializes_as_type() {
        let json = serde_json::to_value(ManifestInfo::render()).unwrap();
        assert_eq!(json["params"][0]["type"], "string");
        assert!(json["params"][0].get("param_type").is_none());
    }

    #[test]
    fn credential_key_uses_service_name() {
        let manifest = ManifestInfo::render();
        assert_eq!(manifest.credential_key("example.com"), "carsRender_example.com");
    }
}
