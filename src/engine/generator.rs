use crate::engine::build_state::BuildState;
use crate::engine::store::ResolvedDependency;
use crate::engine::EngineSettings;
use crate::error::{CookError, CookResult};
use crate::utils::write_atomic;
use handlebars::Handlebars;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub const TOOLCHAIN_FILE: &str = "conan_toolchain.cmake";

const USER_CONFIG_TEMPLATE: &str = r#"message(STATUS "Including user generated conan config.")
set(BUILD_tests {{build_tests}})
set(CMAKE_EXPORT_COMPILE_COMMANDS 1)
"#;

const TOOLCHAIN_TEMPLATE: &str = r#"# Toolchain for {{reference}}, generated by cook.
set(CMAKE_BUILD_TYPE "{{build_type}}" CACHE STRING "Build type" FORCE)
{{#if cppstd}}
set(CMAKE_CXX_STANDARD {{cppstd}})
set(CMAKE_CXX_STANDARD_REQUIRED ON)
set(CMAKE_CXX_EXTENSIONS {{extensions}})
{{/if}}
set(BUILD_SHARED_LIBS {{shared}} CACHE BOOL "Build shared libraries" FORCE)
{{#if shared_pic}}
set(CMAKE_POSITION_INDEPENDENT_CODE ON)
{{/if}}
list(PREPEND CMAKE_PREFIX_PATH "{{generators_dir}}")
list(PREPEND CMAKE_MODULE_PATH "{{generators_dir}}")
{{#each dependencies}}
list(APPEND CMAKE_PREFIX_PATH "{{this}}")
{{/each}}
"#;

const DEPENDENCY_TEMPLATE: &str = r#"# {{reference}}, generated by cook.
set({{name}}_FOUND TRUE)
set({{name}}_VERSION "{{version}}")
set({{name}}_PACKAGE_FOLDER "{{package_folder}}")
set({{name}}_INCLUDE_DIRS{{#each includedirs}} "{{this}}"{{/each}})
set({{name}}_LIB_DIRS{{#each libdirs}} "{{this}}"{{/each}})
set({{name}}_BUILD_DIRS{{#each builddirs}} "{{this}}"{{/each}})
list(APPEND CMAKE_MODULE_PATH{{#each builddirs}} "{{this}}"{{/each}})
if(NOT TARGET {{name}}::{{name}})
    add_library({{name}}::{{name}} INTERFACE IMPORTED)
    set_target_properties({{name}}::{{name}} PROPERTIES
        INTERFACE_INCLUDE_DIRECTORIES "{{include_list}}")
endif()
"#;

#[derive(Serialize)]
struct UserConfigVars {
    build_tests: String,
}

#[derive(Serialize)]
struct ToolchainVars {
    reference: String,
    build_type: &'static str,
    cppstd: Option<u16>,
    extensions: &'static str,
    shared: &'static str,
    shared_pic: bool,
    generators_dir: String,
    dependencies: Vec<String>,
}

#[derive(Serialize)]
struct DependencyVars {
    reference: String,
    name: String,
    version: String,
    package_folder: String,
    includedirs: Vec<String>,
    libdirs: Vec<String>,
    builddirs: Vec<String>,
    include_list: String,
}

fn on_off(value: bool) -> &'static str {
    if value {
        "ON"
    } else {
        "OFF"
    }
}

/// Forward slashes only: CMake reads backslashes as escapes.
fn cmake_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Writes the build configuration consumed by the project's CMake scripts.
#[derive(Debug)]
pub struct ConfigGenerator {
    settings: Arc<EngineSettings>,
    engine: Handlebars<'static>,
}

impl ConfigGenerator {
    pub fn new(settings: Arc<EngineSettings>) -> Self {
        let mut engine = Handlebars::new();
        engine.set_strict_mode(true);
        engine.register_escape_fn(handlebars::no_escape);

        ConfigGenerator { settings, engine }
    }

    pub fn toolchain_path(&self) -> PathBuf {
        self.settings.generators_path().join(TOOLCHAIN_FILE)
    }

    pub fn dependency_path(&self, dependency: &ResolvedDependency) -> PathBuf {
        self.settings
            .generators_path()
            .join(format!("{}-config.cmake", dependency.reference.name))
    }

    fn render<T: Serialize>(&self, template: &str, vars: &T) -> CookResult<String> {
        self.engine
            .render_template(template, vars)
            .map_err(|e| CookError::Template {
                template: template.lines().next().unwrap_or_default().to_string(),
                message: e.to_string(),
            })
    }

    fn write(&self, path: &Path, contents: &str) -> CookResult<()> {
        write_atomic(path, contents.as_bytes()).map_err(|source| CookError::ConfigWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn render_user_config(&self, state: &BuildState) -> CookResult<String> {
        let build_tests = state
            .options
            .get("build_tests")
            .map(ToString::to_string)
            .unwrap_or_else(|| "False".to_string());

        self.render(USER_CONFIG_TEMPLATE, &UserConfigVars { build_tests })
    }

    /// Replaces the file at `path` unconditionally.
    pub fn write_user_config(&self, state: &BuildState, path: &Path) -> CookResult<()> {
        let contents = self.render_user_config(state)?;
        self.write(path, &contents)
    }

    pub fn render_toolchain(&self, state: &BuildState) -> CookResult<String> {
        let shared = state.options.flag("shared");

        let vars = ToolchainVars {
            reference: state.recipe.reference().to_string(),
            build_type: state.platform.build_type_or_default().name(),
            cppstd: state.cppstd.map(|s| s.year()),
            extensions: on_off(state.cppstd.map_or(false, |s| s.extensions())),
            shared: on_off(shared),
            shared_pic: shared,
            generators_dir: cmake_path(self.settings.generators_path()),
            dependencies: state
                .dependencies
                .iter()
                .map(|d| cmake_path(&d.package_folder))
                .collect(),
        };

        self.render(TOOLCHAIN_TEMPLATE, &vars)
    }

    pub fn render_dependency(&self, dependency: &ResolvedDependency) -> CookResult<String> {
        let includedirs: Vec<String> = dependency
            .cpp_info
            .includedirs
            .iter()
            .map(|p| cmake_path(p))
            .collect();

        let vars = DependencyVars {
            reference: dependency.reference.to_string(),
            name: dependency.reference.name.clone(),
            version: dependency.reference.version.clone(),
            package_folder: cmake_path(&dependency.package_folder),
            include_list: includedirs.join(";"),
            includedirs,
            libdirs: dependency
                .cpp_info
                .libdirs
                .iter()
                .map(|p| cmake_path(p))
                .collect(),
            builddirs: dependency
                .cpp_info
                .builddirs
                .iter()
                .map(|p| cmake_path(p))
                .collect(),
        };

        self.render(DEPENDENCY_TEMPLATE, &vars)
    }

    /// Writes the toolchain and dependency lookup files for the generators the recipe selects.
    /// Everything is rendered before the first write so a rendering failure leaves no file behind.
    pub fn write_generators(&self, state: &BuildState) -> CookResult<Vec<PathBuf>> {
        let mut files = vec![];

        if state.uses_toolchain() {
            files.push((self.toolchain_path(), self.render_toolchain(state)?));
        }

        if state.uses_deps() {
            for dependency in &state.dependencies {
                files.push((
                    self.dependency_path(dependency),
                    self.render_dependency(dependency)?,
                ));
            }
        }

        let mut written = vec![];
        for (path, contents) in files {
            self.write(&path, &contents)?;
            debug!(path = %path.display(), "wrote generator file");
            written.push(path);
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::options::OptionSet;
    use crate::definition::parsing::ParseDocument;
    use crate::definition::settings::{CppStd, Platform};
    use crate::definition::{Document, Recipe};
    use crate::engine::base::resolve_base;
    use crate::engine::store::CppInfo;
    use std::time::SystemTime;

    fn recipe() -> Recipe {
        Document::parse_source(
            r#"
recipe "math" {
    version "0.0.1"
    options {
        shared false
        build_tests false
    }
    base "shred_conan_base/0.0.1@adnn/develop"
}
"#,
            None,
        )
        .unwrap()
        .recipes
        .remove(0)
    }

    fn state<'a>(recipe: &'a Recipe, overrides: &[(&'a str, &'a str)]) -> BuildState<'a> {
        BuildState {
            build_time: SystemTime::now(),
            recipe,
            base: resolve_base(recipe.base.as_ref()).unwrap(),
            options: OptionSet::resolve(&recipe.options, overrides.iter().copied()).unwrap(),
            platform: Platform::from_assignments([("build_type", "Debug")]).unwrap(),
            cppstd: Some(CppStd::CPP17),
            dependencies: vec![],
        }
    }

    fn generator(dir: &Path) -> ConfigGenerator {
        ConfigGenerator::new(Arc::new(EngineSettings::new(
            dir.join("src"),
            dir.join("build"),
            dir.join("store"),
        )))
    }

    #[test]
    fn user_config_mirrors_build_tests() {
        let dir = tempfile::tempdir().unwrap();
        let generator = generator(dir.path());
        let recipe = recipe();

        let on = generator
            .render_user_config(&state(&recipe, &[("build_tests", "True")]))
            .unwrap();
        assert_eq!(
            on,
            "message(STATUS \"Including user generated conan config.\")\n\
             set(BUILD_tests True)\n\
             set(CMAKE_EXPORT_COMPILE_COMMANDS 1)\n"
        );

        let off = generator
            .render_user_config(&state(&recipe, &[("build_tests", "false")]))
            .unwrap();
        assert!(off.contains("set(BUILD_tests False)\n"));
    }

    #[test]
    fn user_config_is_idempotent_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let generator = generator(dir.path());
        let recipe = recipe();
        let path = dir.path().join("build/conanuser_config.cmake");

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "stale content that is longer than the new file\n".repeat(10))
            .unwrap();

        let state = state(&recipe, &[("build_tests", "true")]);
        generator.write_user_config(&state, &path).unwrap();
        let first = std::fs::read(&path).unwrap();
        generator.write_user_config(&state, &path).unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
        assert!(!String::from_utf8(first).unwrap().contains("stale"));
    }

    #[test]
    fn toolchain_reflects_options_and_standard() {
        let dir = tempfile::tempdir().unwrap();
        let generator = generator(dir.path());
        let recipe = recipe();

        let toolchain = generator
            .render_toolchain(&state(&recipe, &[("shared", "true")]))
            .unwrap();

        assert!(toolchain.contains("set(CMAKE_BUILD_TYPE \"Debug\""));
        assert!(toolchain.contains("set(CMAKE_CXX_STANDARD 17)"));
        assert!(toolchain.contains("set(CMAKE_CXX_EXTENSIONS OFF)"));
        assert!(toolchain.contains("set(BUILD_SHARED_LIBS ON"));
        assert!(toolchain.contains("CMAKE_POSITION_INDEPENDENT_CODE"));
    }

    #[test]
    fn dependency_file_declares_target() {
        let dir = tempfile::tempdir().unwrap();
        let generator = generator(dir.path());

        let dependency = ResolvedDependency {
            reference: "graphics/0.1@adnn/develop#0a1b".parse().unwrap(),
            package_folder: PathBuf::from("/store/graphics/package"),
            cpp_info: CppInfo {
                builddirs: vec![PathBuf::from("/work/graphics/build")],
                includedirs: vec![PathBuf::from("/store/graphics/package/include")],
                libdirs: vec![],
            },
        };

        let contents = generator.render_dependency(&dependency).unwrap();
        assert!(contents.contains("set(graphics_VERSION \"0.1\")"));
        assert!(contents.contains("set(graphics_INCLUDE_DIRS \"/store/graphics/package/include\")"));
        assert!(contents.contains("add_library(graphics::graphics INTERFACE IMPORTED)"));
        assert!(contents.contains("list(APPEND CMAKE_MODULE_PATH \"/work/graphics/build\")"));
    }
}
