//! Build-tree template rendering.
//!
//! Templates are embedded at compile time; a configured template directory
//! overrides any embedded template with a file of the same name. Two helpers
//! are exposed to templates as filters: `quote(x)` surrounds the value with
//! double quotes, and `replace(old, new, x)` performs global substring
//! substitution.

use std::path::{Path, PathBuf};

use cmodel_core::{ModelDescriptor, ModelError, ModelResult, ModuleRecord};
use include_dir::{Dir, include_dir};
use minijinja::Environment;
use serde::Serialize;

/// Embedded default templates.
static TEMPLATE_DIR: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/templates");

pub const MOD_TEMPLATE: &str = "go.mod.tpl";
pub const MAIN_TEMPLATE: &str = "main.go.tpl";
pub const PLUGIN_TEMPLATE: &str = "plugin.go.tpl";
pub const MODEL_TEMPLATE: &str = "model.go.tpl";

const DEV_SUFFIX: &str = "-dev";

/// Toolchain-info record handed to templates.
#[derive(Debug, Clone, Serialize)]
pub struct CompilerInfo {
    pub version: String,
    pub root: String,
    pub is_release: bool,
}

impl CompilerInfo {
    /// Derives the compiler record from the build of this crate.
    pub fn detect() -> Self {
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        let root = Path::new(env!("CARGO_MANIFEST_DIR"))
            .ancestors()
            .nth(2)
            .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")))
            .display()
            .to_string();
        CompilerInfo {
            is_release: !version.ends_with(DEV_SUFFIX),
            version,
            root,
        }
    }
}

/// Descriptor projection rendered into templates; file payloads are not
/// template inputs.
#[derive(Debug, Clone, Serialize)]
pub struct ModelView {
    pub name: String,
    pub version: String,
    pub modules: Vec<ModuleRecord>,
}

/// All variables available to templates.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateInfo {
    pub model: ModelView,
    pub compiler: CompilerInfo,
}

impl TemplateInfo {
    pub fn new(descriptor: &ModelDescriptor, compiler: CompilerInfo) -> Self {
        TemplateInfo {
            model: ModelView {
                name: descriptor.name.clone(),
                version: descriptor.version.clone(),
                modules: descriptor.modules.clone(),
            },
            compiler,
        }
    }
}

/// Renders named templates against a descriptor.
pub struct Templater {
    template_path: Option<PathBuf>,
}

impl Templater {
    pub fn new(template_path: Option<PathBuf>) -> Self {
        Templater { template_path }
    }

    /// Renders the named template into `out_path`, overwriting any previous
    /// output.
    pub fn render(&self, name: &str, out_path: &Path, info: &TemplateInfo) -> ModelResult<()> {
        let text = self.render_to_string(name, info)?;
        std::fs::write(out_path, text).map_err(|e| {
            ModelError::internal(format!("failed to write '{}': {e}", out_path.display()))
        })
    }

    /// Renders the named template to a string.
    pub fn render_to_string(&self, name: &str, info: &TemplateInfo) -> ModelResult<String> {
        let source = self.template_source(name)?;

        let mut env = Environment::new();
        env.add_filter("quote", quote);
        env.add_filter("replace", replace);
        env.add_template(name, &source)
            .map_err(|e| ModelError::invalid(format!("failed to parse template '{name}': {e}")))?;

        let template = env
            .get_template(name)
            .map_err(|e| ModelError::invalid(format!("unknown template '{name}': {e}")))?;
        template
            .render(minijinja::Value::from_serialize(info))
            .map_err(|e| ModelError::internal(format!("failed to render '{name}': {e}")))
    }

    /// The template text, preferring an override file under the configured
    /// template directory over the embedded default.
    fn template_source(&self, name: &str) -> ModelResult<String> {
        if let Some(dir) = &self.template_path {
            let path = dir.join(name);
            if path.exists() {
                return std::fs::read_to_string(&path).map_err(|e| {
                    ModelError::internal(format!(
                        "failed to read template '{}': {e}",
                        path.display()
                    ))
                });
            }
        }
        TEMPLATE_DIR
            .get_file(name)
            .and_then(|f| f.contents_utf8())
            .map(|s| s.to_string())
            .ok_or_else(|| ModelError::invalid(format!("unknown template '{name}'")))
    }
}

fn quote(value: String) -> String {
    format!("\"{value}\"")
}

fn replace(value: String, old: String, new: String) -> String {
    value.replace(&old, &new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmodel_core::PluginRecord;

    fn sample_info() -> TemplateInfo {
        let descriptor = ModelDescriptor {
            name: "foo".to_string(),
            version: "1.0.0".to_string(),
            modules: vec![ModuleRecord {
                name: "bar".to_string(),
                organization: "ONF".to_string(),
                revision: "2020-11-18".to_string(),
                file: "bar.yang".to_string(),
            }],
            files: vec![],
            plugin: PluginRecord {
                name: "foo".to_string(),
                version: "1.0.0".to_string(),
            },
        };
        TemplateInfo::new(
            &descriptor,
            CompilerInfo {
                version: "v0.1.0".to_string(),
                root: "/src/config-models".to_string(),
                is_release: true,
            },
        )
    }

    #[test]
    fn model_template_quotes_module_fields() {
        let templater = Templater::new(None);
        let out = templater
            .render_to_string(MODEL_TEMPLATE, &sample_info())
            .unwrap();
        assert!(out.contains("modelName    = \"foo\""));
        assert!(out.contains("modelVersion = \"1.0.0\""));
        assert!(out.contains(
            "{Name: \"bar\", Organization: \"ONF\", Version: \"2020-11-18\"}"
        ));
    }

    #[test]
    fn mod_template_substitutes_dots() {
        let templater = Templater::new(None);
        let out = templater
            .render_to_string(MOD_TEMPLATE, &sample_info())
            .unwrap();
        assert!(out.starts_with("module github.com/onosproject/config-models/foo_1_0_0"));
        assert!(!out.contains("replace github.com/onosproject/onos-config-model"));
    }

    #[test]
    fn mod_template_points_dev_builds_at_the_source_tree() {
        let mut info = sample_info();
        info.compiler.version = "v0.1.0-dev".to_string();
        info.compiler.is_release = false;
        let templater = Templater::new(None);
        let out = templater.render_to_string(MOD_TEMPLATE, &info).unwrap();
        assert!(out.contains(
            "replace github.com/onosproject/onos-config-model => /src/config-models"
        ));
    }

    #[test]
    fn override_directory_wins_over_embedded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MAIN_TEMPLATE),
            "package main // {{ model.name }}\n",
        )
        .unwrap();
        let templater = Templater::new(Some(dir.path().to_path_buf()));
        let out = templater
            .render_to_string(MAIN_TEMPLATE, &sample_info())
            .unwrap();
        assert_eq!(out, "package main // foo\n");
    }

    #[test]
    fn unknown_template_is_invalid() {
        let templater = Templater::new(None);
        let err = templater
            .render_to_string("bogus.tpl", &sample_info())
            .unwrap_err();
        assert!(err.is_invalid());
    }

    #[test]
    fn render_writes_the_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("main.go");
        let templater = Templater::new(None);
        templater
            .render(MAIN_TEMPLATE, &out_path, &sample_info())
            .unwrap();
        let written = std::fs::read_to_string(&out_path).unwrap();
        assert!(written.contains("package main"));
    }
}
