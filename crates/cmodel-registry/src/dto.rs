//! Wire representation of config models.
//!
//! The push request carries the full descriptor including file payloads as a
//! `path → bytes` map; Get and List responses carry module metadata only.

use std::collections::BTreeMap;

use cmodel_core::{FileRecord, ModelDescriptor, ModuleRecord, PluginRecord};
use serde::{Deserialize, Serialize};

/// A config model on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfigModelDto {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub modules: Vec<ConfigModuleDto>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, Vec<u8>>,
}

/// A YANG module reference on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfigModuleDto {
    pub name: String,
    pub organization: String,
    pub revision: String,
    pub file: String,
}

impl ConfigModelDto {
    /// Projects a stored descriptor to the wire, excluding file payloads.
    pub fn from_descriptor(descriptor: &ModelDescriptor) -> Self {
        ConfigModelDto {
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            modules: descriptor
                .modules
                .iter()
                .map(|m| ConfigModuleDto {
                    name: m.name.clone(),
                    organization: m.organization.clone(),
                    revision: m.revision.clone(),
                    file: m.file.clone(),
                })
                .collect(),
            files: BTreeMap::new(),
        }
    }

    /// Builds the normalized descriptor for a push: the plugin record echoes
    /// the model identity.
    pub fn into_descriptor(self) -> ModelDescriptor {
        ModelDescriptor {
            plugin: PluginRecord {
                name: self.name.clone(),
                version: self.version.clone(),
            },
            modules: self
                .modules
                .into_iter()
                .map(|m| ModuleRecord {
                    name: m.name,
                    organization: m.organization,
                    revision: m.revision,
                    file: m.file,
                })
                .collect(),
            files: self
                .files
                .into_iter()
                .map(|(path, data)| FileRecord { path, data })
                .collect(),
            name: self.name,
            version: self.version,
        }
    }
}

/// Response to a get request.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetModelResponse {
    pub model: ConfigModelDto,
}

/// Response to a list request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListModelsResponse {
    pub models: Vec<ConfigModelDto>,
}

/// Body of a push request.
#[derive(Debug, Serialize, Deserialize)]
pub struct PushModelRequest {
    pub model: ConfigModelDto,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dto() -> ConfigModelDto {
        ConfigModelDto {
            name: "foo".to_string(),
            version: "1.0.0".to_string(),
            modules: vec![ConfigModuleDto {
                name: "bar".to_string(),
                organization: "ONF".to_string(),
                revision: "2020-11-18".to_string(),
                file: "bar.yang".to_string(),
            }],
            files: BTreeMap::from([("bar.yang".to_string(), b"Hello world!".to_vec())]),
        }
    }

    #[test]
    fn push_normalization_echoes_identity_into_plugin_record() {
        let descriptor = sample_dto().into_descriptor();
        assert_eq!(descriptor.plugin.name, "foo");
        assert_eq!(descriptor.plugin.version, "1.0.0");
        assert_eq!(descriptor.files[0].path, "bar.yang");
        descriptor.validate().unwrap();
    }

    #[test]
    fn projection_excludes_file_payloads() {
        let descriptor = sample_dto().into_descriptor();
        let dto = ConfigModelDto::from_descriptor(&descriptor);
        assert!(dto.files.is_empty());
        assert_eq!(dto.modules.len(), 1);

        let json = serde_json::to_value(&dto).unwrap();
        assert!(json.get("files").is_none());
    }

    #[test]
    fn dto_round_trips_through_json() {
        let dto = sample_dto();
        let bytes = serde_json::to_vec(&dto).unwrap();
        let decoded: ConfigModelDto = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, dto);
    }
}
