//! Minimal go.mod manifest parsing and formatting.
//!
//! The resolver only needs the module identity statement, the require and
//! replace tables, and stable re-formatting, so the parser covers exactly
//! that subset. Unknown directives (`retract`, `toolchain`, …) are skipped,
//! including their block forms.

use cmodel_core::{ModelError, ModelResult};

/// A parsed dependency manifest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModFile {
    pub module: Option<String>,
    pub go_version: Option<String>,
    pub require: Vec<Requirement>,
    pub exclude: Vec<Requirement>,
    pub replace: Vec<Replacement>,
}

/// A `require` or `exclude` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub path: String,
    pub version: String,
    pub indirect: bool,
}

/// A `replace` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub old_path: String,
    pub old_version: Option<String>,
    pub new_path: String,
    pub new_version: Option<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum Block {
    None,
    Require,
    Exclude,
    Replace,
    Skip,
}

impl ModFile {
    /// Parses go.mod text.
    pub fn parse(text: &str) -> ModelResult<ModFile> {
        let mut file = ModFile::default();
        let mut block = Block::None;

        for raw in text.lines() {
            let indirect = raw.contains("// indirect");
            let line = match raw.split_once("//") {
                Some((before, _)) => before.trim(),
                None => raw.trim(),
            };
            if line.is_empty() {
                continue;
            }

            if block != Block::None {
                if line == ")" {
                    block = Block::None;
                    continue;
                }
                match block {
                    Block::Require => file.require.push(parse_requirement(line, indirect)?),
                    Block::Exclude => file.exclude.push(parse_requirement(line, indirect)?),
                    Block::Replace => file.replace.push(parse_replacement(line)?),
                    Block::Skip => {}
                    Block::None => unreachable!(),
                }
                continue;
            }

            let (directive, rest) = match line.split_once(char::is_whitespace) {
                Some((d, r)) => (d, r.trim()),
                None => (line, ""),
            };
            match directive {
                "module" => file.module = Some(unquote(rest).to_string()),
                "go" => file.go_version = Some(rest.to_string()),
                "require" if rest == "(" => block = Block::Require,
                "require" => file.require.push(parse_requirement(rest, indirect)?),
                "exclude" if rest == "(" => block = Block::Exclude,
                "exclude" => file.exclude.push(parse_requirement(rest, indirect)?),
                "replace" if rest == "(" => block = Block::Replace,
                "replace" => file.replace.push(parse_replacement(rest)?),
                _ if rest == "(" => block = Block::Skip,
                _ => {}
            }
        }

        if block != Block::None {
            return Err(ModelError::invalid("unterminated block in go.mod"));
        }
        Ok(file)
    }

    /// Formats the manifest back into canonical go.mod text.
    pub fn format(&self) -> String {
        let mut out = String::new();
        if let Some(module) = &self.module {
            out.push_str(&format!("module {module}\n"));
        }
        if let Some(go) = &self.go_version {
            out.push_str(&format!("\ngo {go}\n"));
        }
        format_requirements(&mut out, "require", &self.require);
        format_requirements(&mut out, "exclude", &self.exclude);
        if !self.replace.is_empty() {
            out.push('\n');
            for replacement in &self.replace {
                out.push_str(&format!("replace {}\n", format_replacement(replacement)));
            }
        }
        out
    }

    /// Adds or replaces the root module-identity statement.
    pub fn set_module(&mut self, path: impl Into<String>) {
        self.module = Some(path.into());
    }

    /// The require entry for the given module path, if any.
    pub fn require_for(&self, path: &str) -> Option<&Requirement> {
        self.require.iter().find(|r| r.path == path)
    }

    /// The replace directive whose old path matches, if any.
    pub fn replacement_for(&self, old_path: &str) -> Option<&Replacement> {
        self.replace.iter().find(|r| r.old_path == old_path)
    }
}

fn parse_requirement(line: &str, indirect: bool) -> ModelResult<Requirement> {
    let mut parts = line.split_whitespace();
    let (path, version) = match (parts.next(), parts.next(), parts.next()) {
        (Some(path), Some(version), None) => (path, version),
        _ => {
            return Err(ModelError::invalid(format!(
                "malformed requirement '{line}'"
            )));
        }
    };
    Ok(Requirement {
        path: unquote(path).to_string(),
        version: version.to_string(),
        indirect,
    })
}

fn parse_replacement(line: &str) -> ModelResult<Replacement> {
    let (old, new) = line
        .split_once("=>")
        .ok_or_else(|| ModelError::invalid(format!("malformed replace '{line}'")))?;
    let (old_path, old_version) = parse_module_ref(old)?;
    let (new_path, new_version) = parse_module_ref(new)?;
    Ok(Replacement {
        old_path,
        old_version,
        new_path,
        new_version,
    })
}

fn parse_module_ref(text: &str) -> ModelResult<(String, Option<String>)> {
    let mut parts = text.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(path), version, None) => Ok((
            unquote(path).to_string(),
            version.map(|v| v.to_string()),
        )),
        _ => Err(ModelError::invalid(format!("malformed module ref '{text}'"))),
    }
}

fn format_requirements(out: &mut String, directive: &str, entries: &[Requirement]) {
    match entries {
        [] => {}
        [single] => {
            out.push_str(&format!(
                "\n{directive} {}{}\n",
                format_requirement(single),
                indirect_comment(single)
            ));
        }
        many => {
            out.push_str(&format!("\n{directive} (\n"));
            for entry in many {
                out.push_str(&format!(
                    "\t{}{}\n",
                    format_requirement(entry),
                    indirect_comment(entry)
                ));
            }
            out.push_str(")\n");
        }
    }
}

fn format_requirement(entry: &Requirement) -> String {
    format!("{} {}", entry.path, entry.version)
}

fn indirect_comment(entry: &Requirement) -> &'static str {
    if entry.indirect { " // indirect" } else { "" }
}

fn format_replacement(replacement: &Replacement) -> String {
    let mut out = replacement.old_path.clone();
    if let Some(version) = &replacement.old_version {
        out.push_str(&format!(" {version}"));
    }
    out.push_str(&format!(" => {}", replacement.new_path));
    if let Some(version) = &replacement.new_version {
        out.push_str(&format!(" {version}"));
    }
    out
}

fn unquote(token: &str) -> &str {
    token.trim_matches('"')
}

/// Encodes a module path for use in the toolchain's content-addressed module
/// cache: uppercase letters become `!` followed by the lowercase letter.
pub fn encode_path(path: &str) -> ModelResult<String> {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        if ch == '!' {
            return Err(ModelError::invalid(format!(
                "module path '{path}' contains '!'"
            )));
        }
        if ch.is_ascii_uppercase() {
            out.push('!');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    Ok(out)
}

/// Splits a `path@version` module reference.
pub fn split_path_version(reference: &str) -> (&str, Option<&str>) {
    match reference.split_once('@') {
        Some((path, version)) => (path, Some(version)),
        None => (reference, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
module github.com/onosproject/onos-config

go 1.16

require (
\tgithub.com/openconfig/gnmi v0.0.0-20200617225440-d2b4e6a45802
\tgithub.com/openconfig/ygot v0.8.12 // indirect
)

replace github.com/onosproject/onos-lib-go => ../onos-lib-go
";

    #[test]
    fn parses_blocks_and_directives() {
        let file = ModFile::parse(SAMPLE).unwrap();
        assert_eq!(
            file.module.as_deref(),
            Some("github.com/onosproject/onos-config")
        );
        assert_eq!(file.go_version.as_deref(), Some("1.16"));
        assert_eq!(file.require.len(), 2);
        assert!(file.require[1].indirect);
        assert_eq!(file.replace.len(), 1);
        assert_eq!(file.replace[0].new_path, "../onos-lib-go");
        assert_eq!(file.replace[0].new_version, None);
    }

    #[test]
    fn parse_format_parse_is_a_fixpoint() {
        let first = ModFile::parse(SAMPLE).unwrap();
        let formatted = first.format();
        let second = ModFile::parse(&formatted).unwrap();
        assert_eq!(first, second);
        assert_eq!(formatted, second.format());
    }

    #[test]
    fn single_require_formats_inline() {
        let file = ModFile::parse("module m\nrequire example.com/x v1.0.0\n").unwrap();
        assert!(file.format().contains("\nrequire example.com/x v1.0.0\n"));
    }

    #[test]
    fn replace_with_versions_round_trips() {
        let text = "module m\nreplace old.example/a v1.0.0 => new.example/b v2.0.0\n";
        let file = ModFile::parse(text).unwrap();
        let replacement = file.replacement_for("old.example/a").unwrap();
        assert_eq!(replacement.old_version.as_deref(), Some("v1.0.0"));
        assert_eq!(replacement.new_version.as_deref(), Some("v2.0.0"));
        assert_eq!(ModFile::parse(&file.format()).unwrap(), file);
    }

    #[test]
    fn unknown_directives_are_skipped() {
        let text = "module m\ntoolchain go1.22.1\nretract (\n\tv1.0.0\n)\ngo 1.22\n";
        let file = ModFile::parse(text).unwrap();
        assert_eq!(file.module.as_deref(), Some("m"));
        assert_eq!(file.go_version.as_deref(), Some("1.22"));
        assert!(file.require.is_empty());
    }

    #[test]
    fn set_module_overwrites_identity() {
        let mut file = ModFile::parse("module m\n").unwrap();
        file.set_module("example.com/plugin");
        assert!(file.format().starts_with("module example.com/plugin\n"));
    }

    #[test]
    fn malformed_requirement_is_invalid() {
        assert!(ModFile::parse("require just-a-path\n").is_err());
    }

    #[test]
    fn encode_path_bangs_uppercase() {
        assert_eq!(
            encode_path("github.com/Azure/azure-sdk").unwrap(),
            "github.com/!azure/azure-sdk"
        );
        assert_eq!(encode_path("github.com/onos").unwrap(), "github.com/onos");
        assert!(encode_path("bad!path").is_err());
    }

    #[test]
    fn split_path_version_splits_on_at() {
        assert_eq!(
            split_path_version("github.com/onosproject/onos-config@master"),
            ("github.com/onosproject/onos-config", Some("master"))
        );
        assert_eq!(split_path_version("example.com/x"), ("example.com/x", None));
    }
}
