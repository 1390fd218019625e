pub mod options;
pub mod parsing;
pub mod profile;
pub mod reference;
pub mod settings;

use crate::definition::options::OptionDecl;
use crate::definition::reference::PackageReference;
use crate::definition::settings::{CppStd, SettingAxis};
use cook_utils::ObjectTraversal;
use ring::digest::{digest, SHA256};
use serde::Serialize;

pub const DEFAULT_CONFIG_FILE: &str = "conanuser_config.cmake";

#[derive(Default, Debug, Clone)]
pub struct Document {
    pub recipes: Vec<Recipe>,
}

impl Document {
    /// Selects a recipe by name, or the last declared one. Later `recipe` nodes with the same
    /// name are newer revisions of the same descriptor.
    pub fn select(&self, name: Option<&str>) -> Option<&Recipe> {
        match name {
            Some(name) => self.recipes.iter().rev().find(|r| r.name == name),
            None => self.recipes.last(),
        }
    }
}

/// The package descriptor. Immutable once parsed and templated.
#[derive(Debug, Clone, ObjectTraversal)]
pub struct Recipe {
    pub name: String,
    pub version: String,
    pub description: String,
    pub url: Option<String>,
    pub license: Vec<String>,
    pub topics: Vec<String>,
    #[skip]
    pub settings: Option<Vec<SettingAxis>>,
    pub options: Vec<OptionDecl>,
    pub requires: Vec<PackageReference>,
    pub base: Option<PackageReference>,
    #[skip]
    pub generators: Option<Vec<Generator>>,
    #[skip]
    pub build_policy: Option<BuildPolicy>,
    #[skip]
    pub min_cppstd: Option<CppStd>,
    pub config_file: String,
    pub source_dir: String,
    pub changelog: Vec<ChangelogEntry>,
    /// SHA-256 of the recipe node as written, without the comments and blank lines around it.
    #[skip]
    pub revision: String,
}

impl Recipe {
    pub fn reference(&self) -> PackageReference {
        PackageReference::new(&self.name, &self.version).with_revision(&self.revision)
    }

    pub fn template_vars(&self) -> RecipeTemplate {
        RecipeTemplate {
            reference: format!("{}/{}", self.name, self.version),
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct RecipeTemplate {
    pub reference: String,
    pub name: String,
    pub version: String,
    pub description: String,
}

pub fn recipe_revision(source: &str) -> String {
    hex::encode(digest(&SHA256, source.as_bytes()))
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Generator {
    CMakeDeps,
    CMakeToolchain,
}

impl Generator {
    pub fn parse<T: AsRef<str>>(data: T) -> Option<Generator> {
        Some(match data.as_ref() {
            "CMakeDeps" => Generator::CMakeDeps,
            "CMakeToolchain" => Generator::CMakeToolchain,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BuildPolicy {
    Never,
    Missing,
    Always,
}

impl BuildPolicy {
    pub fn parse<T: AsRef<str>>(data: T) -> Option<BuildPolicy> {
        Some(match data.as_ref() {
            "never" => BuildPolicy::Never,
            "missing" => BuildPolicy::Missing,
            "always" => BuildPolicy::Always,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuildPolicy::Never => "never",
            BuildPolicy::Missing => "missing",
            BuildPolicy::Always => "always",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, ObjectTraversal)]
pub struct ChangelogEntry {
    pub version: String,
    pub text: String,
}
