use crate::definition::options::OptionSet;
use crate::definition::settings::{CppStd, Platform, SettingAxis};
use crate::definition::{BuildPolicy, Generator, Recipe};
use crate::engine::base::RecipeBase;
use crate::engine::store::ResolvedDependency;
use std::time::SystemTime;

/// Everything one evaluation of a recipe knows, threaded through the stages.
pub struct BuildState<'a> {
    pub build_time: SystemTime,
    pub recipe: &'a Recipe,
    pub base: &'static dyn RecipeBase,
    pub options: OptionSet,
    pub platform: Platform,
    /// Language standard pinned by the configure stage.
    pub cppstd: Option<CppStd>,
    pub dependencies: Vec<ResolvedDependency>,
}

impl BuildState<'_> {
    /// Declared settings axes, falling back to the base recipe's.
    pub fn settings(&self) -> &[SettingAxis] {
        self.recipe
            .settings
            .as_deref()
            .unwrap_or_else(|| self.base.default_settings())
    }

    pub fn generators(&self) -> &[Generator] {
        self.recipe
            .generators
            .as_deref()
            .unwrap_or_else(|| self.base.default_generators())
    }

    pub fn build_policy(&self) -> BuildPolicy {
        self.recipe
            .build_policy
            .unwrap_or_else(|| self.base.default_build_policy())
    }

    pub fn uses_toolchain(&self) -> bool {
        self.generators().contains(&Generator::CMakeToolchain)
    }

    pub fn uses_deps(&self) -> bool {
        self.generators().contains(&Generator::CMakeDeps)
    }
}
