//! Build-tree scaffolding and native compilation.
//!
//! A compile lays out a throw-away module tree under
//! `{build_path}/{name}_{version}`, renders the template family into it,
//! materializes the descriptor's YANG sources, generates bindings, and
//! invokes the toolchain in shared-object mode. The tree is removed after a
//! successful build unless cleanup is disabled.
//!
//! The compiler is not safe for concurrent compiles of the same descriptor;
//! the service serializes compilations through the cache lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cmodel_core::{ModelDescriptor, ModelResult, descriptor::file_basename};
use cmodel_module::Resolver;
use cmodel_module::exec::go_exec;
use tokio::fs;
use tracing::{debug, error, info};

use crate::templater::{
    CompilerInfo, MAIN_TEMPLATE, MOD_TEMPLATE, MODEL_TEMPLATE, PLUGIN_TEMPLATE, TemplateInfo,
    Templater,
};

const DEFAULT_BUILD_PATH: &str = "/etc/onos/build";
const MODEL_DIR: &str = "model";
const YANG_DIR: &str = "yang";

const MOD_FILE: &str = "go.mod";
const MAIN_FILE: &str = "main.go";
const PLUGIN_FILE: &str = "plugin.go";
const MODEL_FILE: &str = "model.go";
const GENERATED_FILE: &str = "generated.go";

const BINDINGS_GENERATOR: &str = "github.com/openconfig/ygot/generator";
const BINDINGS_PACKAGE: &str = "configmodel";
const PLUGIN_MOD_PREFIX: &str = "github.com/onosproject/config-models";

/// Plugin compiler configuration.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Directory of template overrides; embedded templates are used when
    /// unset or when a template file is absent.
    pub template_path: Option<PathBuf>,
    /// Root under which per-descriptor build trees are scaffolded.
    pub build_path: PathBuf,
    /// Leave the build tree in place after compilation.
    pub skip_cleanup: bool,
    /// Run a dependency-tidy pass before building.
    pub mod_tidy: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            template_path: None,
            build_path: PathBuf::from(DEFAULT_BUILD_PATH),
            skip_cleanup: false,
            mod_tidy: false,
        }
    }
}

/// Compiles model descriptors into loadable shared objects.
pub struct PluginCompiler {
    config: CompilerConfig,
    resolver: Option<Arc<Resolver>>,
    templater: Templater,
    info: CompilerInfo,
}

impl PluginCompiler {
    /// Creates a compiler. When a resolver is supplied the generated build
    /// tree adopts its manifest; otherwise the manifest template is used.
    pub fn new(mut config: CompilerConfig, resolver: Option<Arc<Resolver>>) -> Self {
        if config.build_path.as_os_str().is_empty() {
            config.build_path = PathBuf::from(DEFAULT_BUILD_PATH);
        }
        let templater = Templater::new(config.template_path.clone());
        PluginCompiler {
            config,
            resolver,
            templater,
            info: CompilerInfo::detect(),
        }
    }

    /// Compiles the descriptor into a shared object at `output`.
    pub async fn compile(&self, model: &ModelDescriptor, output: &Path) -> ModelResult<()> {
        info!(
            name = %model.name,
            version = %model.version,
            output = %output.display(),
            "compiling config model",
        );
        self.compile_inner(model, output).await.inspect_err(|e| {
            error!(
                name = %model.name,
                version = %model.version,
                "compiling config model failed: {e}",
            );
        })
    }

    async fn compile_inner(&self, model: &ModelDescriptor, output: &Path) -> ModelResult<()> {
        let module_dir = self.module_dir(model);
        let info = TemplateInfo::new(model, self.info.clone());

        fs::create_dir_all(&self.config.build_path).await?;
        fs::create_dir_all(&module_dir).await?;
        self.write_manifest(model, &module_dir).await?;
        self.templater
            .render(MAIN_TEMPLATE, &module_dir.join(MAIN_FILE), &info)?;

        let model_dir = module_dir.join(MODEL_DIR);
        fs::create_dir_all(&model_dir).await?;
        self.templater
            .render(PLUGIN_TEMPLATE, &model_dir.join(PLUGIN_FILE), &info)?;
        self.templater
            .render(MODEL_TEMPLATE, &model_dir.join(MODEL_FILE), &info)?;

        self.write_yang_sources(model, &module_dir).await?;
        self.generate_bindings(model, &module_dir).await?;

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).await?;
        }
        if self.config.mod_tidy {
            go_exec(&module_dir, &["mod", "tidy"]).await?;
        }
        self.build_plugin(model, &module_dir, output).await?;

        if self.config.skip_cleanup {
            debug!(dir = %module_dir.display(), "leaving build tree in place");
        } else {
            self.clean_build(&module_dir).await?;
        }
        Ok(())
    }

    /// Writes the build tree's dependency manifest: the resolver's manifest
    /// renamed to the plugin's module identity, or the manifest template when
    /// no resolver is configured.
    async fn write_manifest(
        &self,
        model: &ModelDescriptor,
        module_dir: &Path,
    ) -> ModelResult<()> {
        match &self.resolver {
            Some(resolver) => {
                let (mut manifest, _) = resolver.resolve().await?;
                manifest.set_module(self.plugin_module(model));
                fs::write(module_dir.join(MOD_FILE), manifest.format()).await?;
                Ok(())
            }
            None => {
                let info = TemplateInfo::new(model, self.info.clone());
                self.templater
                    .render(MOD_TEMPLATE, &module_dir.join(MOD_FILE), &info)
            }
        }
    }

    /// Materializes every descriptor source under `yang/`, keyed by path
    /// basename. Files already present are left as-is.
    async fn write_yang_sources(
        &self,
        model: &ModelDescriptor,
        module_dir: &Path,
    ) -> ModelResult<()> {
        let yang_dir = module_dir.join(YANG_DIR);
        fs::create_dir_all(&yang_dir).await?;
        for file in &model.files {
            let dest = yang_dir.join(file_basename(&file.path));
            if fs::try_exists(&dest).await.unwrap_or(false) {
                continue;
            }
            debug!(src = %file.path, dest = %dest.display(), "copying YANG module");
            fs::write(&dest, &file.data).await?;
        }
        Ok(())
    }

    /// Runs the YANG binding generator over the materialized sources.
    async fn generate_bindings(
        &self,
        model: &ModelDescriptor,
        module_dir: &Path,
    ) -> ModelResult<()> {
        let output_file = format!("-output_file={MODEL_DIR}/{GENERATED_FILE}");
        let package_name = format!("-package_name={BINDINGS_PACKAGE}");
        let mut args = vec![
            "run",
            BINDINGS_GENERATOR,
            "-path=yang",
            output_file.as_str(),
            package_name.as_str(),
            "-generate_fakeroot",
        ];
        for module in &model.modules {
            args.push(module.file.as_str());
        }
        debug!(dir = %module_dir.display(), "generating YANG bindings");
        go_exec(module_dir, &args).await?;
        Ok(())
    }

    /// Invokes the toolchain in shared-object mode.
    async fn build_plugin(
        &self,
        model: &ModelDescriptor,
        module_dir: &Path,
        output: &Path,
    ) -> ModelResult<()> {
        let out = output.display().to_string();
        let target = self.plugin_module(model);
        info!(output = %out, "building plugin");
        go_exec(
            module_dir,
            &["build", "-o", out.as_str(), "-buildmode=plugin", target.as_str()],
        )
        .await?;
        Ok(())
    }

    async fn clean_build(&self, module_dir: &Path) -> ModelResult<()> {
        if fs::try_exists(module_dir).await.unwrap_or(false) {
            debug!(dir = %module_dir.display(), "removing build tree");
            fs::remove_dir_all(module_dir).await?;
        }
        Ok(())
    }

    /// Module identity adopted by the generated build tree.
    fn plugin_module(&self, model: &ModelDescriptor) -> String {
        format!("{PLUGIN_MOD_PREFIX}/{}", model.safe_qualified_name())
    }

    fn module_dir(&self, model: &ModelDescriptor) -> PathBuf {
        self.config.build_path.join(model.safe_qualified_name())
    }
}
