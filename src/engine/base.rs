use crate::definition::reference::PackageReference;
use crate::definition::settings::{CppStd, SettingAxis};
use crate::definition::{BuildPolicy, Generator, Recipe};
use crate::engine::build_state::BuildState;
use crate::engine::generator::ConfigGenerator;
use crate::error::{CookError, CookResult};
use std::fmt::Debug;
use std::path::Path;
use tracing::debug;

/// Shared behaviour a recipe inherits by naming a base. Recipes only carry data, so the defaults
/// below are what every evaluation runs; a base overrides them to change it for all of its
/// recipes at once.
pub trait RecipeBase: Debug + Sync {
    /// Exact reference recipes use to select this base.
    fn reference(&self) -> &'static str;

    fn default_settings(&self) -> &'static [SettingAxis] {
        &[]
    }

    fn default_generators(&self) -> &'static [Generator] {
        &[]
    }

    fn default_build_policy(&self) -> BuildPolicy {
        BuildPolicy::Missing
    }

    /// Oldest language standard the recipe builds with.
    fn min_cppstd(&self, recipe: &Recipe) -> Option<CppStd> {
        recipe.min_cppstd
    }

    /// Checks the platform against the recipe and pins the language standard.
    fn configure(&self, state: &mut BuildState) -> CookResult<()> {
        for axis in state.settings() {
            if !state.platform.has_axis(*axis) {
                return Err(CookError::MissingSetting {
                    axis: axis.name().to_string(),
                });
            }
        }

        if let Some(minimum) = self.min_cppstd(state.recipe) {
            let compiler = state.platform.compiler.as_ref().ok_or_else(|| {
                CookError::MissingSetting {
                    axis: SettingAxis::Compiler.name().to_string(),
                }
            })?;

            let pinned = compiler.check_min_cppstd(minimum)?;
            debug!(%compiler, %minimum, %pinned, "language standard accepted");
            state.cppstd = Some(pinned);
        } else if let Some(explicit) = state.platform.compiler.as_ref().and_then(|c| c.cppstd) {
            state.cppstd = Some(explicit);
        }

        Ok(())
    }

    /// Writes the user configuration file the project's CMake scripts include.
    fn generate(
        &self,
        state: &BuildState,
        generator: &ConfigGenerator,
        path: &Path,
    ) -> CookResult<()> {
        generator.write_user_config(state, path)
    }
}

/// Used by recipes that do not name a base.
#[derive(Debug)]
pub struct PlainBase;

impl RecipeBase for PlainBase {
    fn reference(&self) -> &'static str {
        "cook_plain_base/1.0"
    }
}

/// Defaults shared by the Shred family of recipes.
#[derive(Debug)]
pub struct ShredBase;

impl RecipeBase for ShredBase {
    fn reference(&self) -> &'static str {
        "shred_conan_base/0.0.1@adnn/develop"
    }

    fn default_settings(&self) -> &'static [SettingAxis] {
        const AXES: [SettingAxis; 4] = SettingAxis::all();
        &AXES
    }

    fn default_generators(&self) -> &'static [Generator] {
        &[Generator::CMakeDeps, Generator::CMakeToolchain]
    }

    /// Every Shred library builds against at least C++17, whatever the recipe declares.
    fn min_cppstd(&self, recipe: &Recipe) -> Option<CppStd> {
        Some(recipe.min_cppstd.map_or(CppStd::CPP17, |m| m.max(CppStd::CPP17)))
    }
}

type BaseRef = &'static dyn RecipeBase;

const BASES: &[BaseRef] = &[&ShredBase];

/// Finds the base a recipe names. Matching is exact on every component of the reference.
pub fn resolve_base(reference: Option<&PackageReference>) -> CookResult<BaseRef> {
    let reference = match reference {
        Some(r) => r,
        None => return Ok(&PlainBase),
    };

    BASES
        .iter()
        .copied()
        .find(|base| {
            base.reference()
                .parse::<PackageReference>()
                .map_or(false, |known| &known == reference)
        })
        .ok_or_else(|| CookError::DependencyResolution {
            reference: reference.clone(),
            reason: "no base recipe with this exact reference is available".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_base_means_plain() {
        assert_eq!(resolve_base(None).unwrap().reference(), PlainBase.reference());
    }

    #[test]
    fn shred_base_matches_exactly() {
        let exact: PackageReference = "shred_conan_base/0.0.1@adnn/develop".parse().unwrap();
        let base = resolve_base(Some(&exact)).unwrap();
        assert_eq!(base.default_generators().len(), 2);
        assert_eq!(base.default_settings().len(), 4);

        for other in [
            "shred_conan_base/0.0.2@adnn/develop",
            "shred_conan_base/0.0.1@adnn/stable",
            "shred_conan_base/0.0.1",
            "shred_conan_base/0.0.1@adnn/develop#abc",
        ] {
            let r: PackageReference = other.parse().unwrap();
            assert!(
                matches!(
                    resolve_base(Some(&r)),
                    Err(CookError::DependencyResolution { .. })
                ),
                "{}",
                other
            );
        }
    }
}
