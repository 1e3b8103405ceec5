//! Remote client of the registry HTTP surface.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use cmodel_registry::dto::{
    ConfigModelDto, ConfigModuleDto, GetModelResponse, ListModelsResponse, PushModelRequest,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// A thin client for one registry address.
pub struct RegistryClient {
    base_url: String,
    http: reqwest::Client,
}

impl RegistryClient {
    pub fn new(address: &str) -> Self {
        RegistryClient {
            base_url: format!("http://{address}"),
            http: reqwest::Client::new(),
        }
    }

    pub async fn get_model(&self, name: &str, version: &str) -> Result<ConfigModelDto> {
        let url = format!("{}/v1/models/{name}/{version}", self.base_url);
        let response = self.http.get(url).send().await?;
        let response: GetModelResponse = decode(response).await?;
        Ok(response.model)
    }

    pub async fn list_models(&self) -> Result<Vec<ConfigModelDto>> {
        let url = format!("{}/v1/models", self.base_url);
        let response = self.http.get(url).send().await?;
        let response: ListModelsResponse = decode(response).await?;
        Ok(response.models)
    }

    pub async fn push_model(&self, model: ConfigModelDto) -> Result<()> {
        let url = format!("{}/v1/models", self.base_url);
        let response = self
            .http
            .post(url)
            .json(&PushModelRequest { model })
            .send()
            .await?;
        check(response).await
    }

    pub async fn delete_model(&self, name: &str, version: &str) -> Result<()> {
        let url = format!("{}/v1/models/{name}/{version}", self.base_url);
        let response = self.http.delete(url).send().await?;
        check(response).await
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    if !response.status().is_success() {
        bail!(error_message(response).await);
    }
    Ok(response.json().await?)
}

async fn check(response: reqwest::Response) -> Result<()> {
    if !response.status().is_success() {
        bail!(error_message(response).await);
    }
    Ok(())
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => format!("registry request failed with status {status}"),
    }
}

/// Builds the push payload from CLI flags. Each module argument has the form
/// `NAME@REVISION=FILE`; the file's basename keys the files map and names
/// the module source.
pub fn build_push_model(
    name: &str,
    version: &str,
    organization: &str,
    module_args: &[String],
) -> Result<ConfigModelDto> {
    let mut modules = Vec::with_capacity(module_args.len());
    let mut files = BTreeMap::new();

    for arg in module_args {
        let (name_revision, path) = arg
            .split_once('=')
            .with_context(|| format!("module '{arg}' must be NAME@REVISION=FILE"))?;
        let (module_name, revision) = name_revision
            .split_once('@')
            .with_context(|| format!("module '{arg}' must be NAME@REVISION=FILE"))?;

        let path = Path::new(path);
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("module file '{}' has no file name", path.display()))?
            .to_string();
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read module file '{}'", path.display()))?;

        modules.push(ConfigModuleDto {
            name: module_name.to_string(),
            organization: organization.to_string(),
            revision: revision.to_string(),
            file: file_name.clone(),
        });
        files.insert(file_name, data);
    }

    Ok(ConfigModelDto {
        name: name.to_string(),
        version: version.to_string(),
        modules,
        files,
    })
}
