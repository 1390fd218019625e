use crate::definition::options::OptionSet;
use crate::definition::settings::Platform;
use crate::definition::Recipe;
use crate::engine::base::resolve_base;
use crate::engine::build_state::BuildState;
use crate::engine::driver::{BuildDriver, DriverBuilder, Invocation};
use crate::engine::environment::Environment;
use crate::engine::generator::ConfigGenerator;
use crate::engine::store::{CppInfo, PackageMetadata, PackageStore, PublishedPackage};
use crate::error::CookResult;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

pub mod base;
pub mod build_state;
pub mod driver;
mod environment;
pub mod generator;
pub mod store;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(u8)]
pub enum Stage {
    Configure,
    Generate,
    Build,
    Package,
    PackageInfo,
}

impl Stage {
    pub const fn stages() -> [Stage; 5] {
        [
            Stage::Configure,
            Stage::Generate,
            Stage::Build,
            Stage::Package,
            Stage::PackageInfo,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Configure => "configure",
            Stage::Generate => "generate",
            Stage::Build => "build",
            Stage::Package => "package",
            Stage::PackageInfo => "package_info",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Relative folders are taken from the working directory at startup, since the build folder is
/// published to consumers that run elsewhere.
fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }

    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

#[derive(Debug)]
pub struct EngineSettings {
    source_path: PathBuf,
    build_path: PathBuf,
    store_path: PathBuf,
    cmake_program: PathBuf,
}

impl EngineSettings {
    pub fn new(
        source_path: impl Into<PathBuf>,
        build_path: impl Into<PathBuf>,
        store_path: impl Into<PathBuf>,
    ) -> Self {
        EngineSettings {
            source_path: absolute(source_path.into()),
            build_path: absolute(build_path.into()),
            store_path: absolute(store_path.into()),
            cmake_program: PathBuf::from("cmake"),
        }
    }

    pub fn with_cmake_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.cmake_program = program.into();
        self
    }

    pub fn source_path_for_recipe(&self, recipe: &Recipe) -> PathBuf {
        self.source_path.join(&recipe.source_dir)
    }

    pub fn build_path(&self) -> &Path {
        self.build_path.as_path()
    }

    /// Generated toolchain and dependency files live next to the build tree.
    pub fn generators_path(&self) -> &Path {
        self.build_path()
    }

    pub fn config_file_path(&self, recipe: &Recipe) -> PathBuf {
        self.build_path.join(&recipe.config_file)
    }

    pub fn store_path(&self) -> &Path {
        self.store_path.as_path()
    }

    pub fn cmake_program(&self) -> &Path {
        self.cmake_program.as_path()
    }
}

/// What a pipeline run produced, up to the stage it stopped at.
#[derive(Debug, Default)]
pub struct Evaluation {
    pub revision: String,
    pub completed: Vec<Stage>,
    pub config_file: Option<PathBuf>,
    pub package: Option<PublishedPackage>,
    pub cpp_info: Option<CppInfo>,
}

#[derive(Debug)]
pub struct Engine {
    driver: Box<dyn BuildDriver>,
    environment: Environment,
    generator: ConfigGenerator,
    store: PackageStore,
    pub settings: Arc<EngineSettings>,
}

impl Engine {
    pub fn new<T: DriverBuilder>(settings: EngineSettings) -> Self {
        let settings = Arc::from(settings);
        let driver = Box::new(T::build(settings.clone()));
        Self::from_parts(settings, driver)
    }

    pub fn with_driver(settings: EngineSettings, driver: Box<dyn BuildDriver>) -> Self {
        Self::from_parts(Arc::from(settings), driver)
    }

    fn from_parts(settings: Arc<EngineSettings>, driver: Box<dyn BuildDriver>) -> Self {
        Engine {
            driver,
            environment: Environment::new(settings.clone()),
            generator: ConfigGenerator::new(settings.clone()),
            store: PackageStore::new(settings.store_path()),
            settings,
        }
    }

    pub fn store(&self) -> &PackageStore {
        &self.store
    }

    /// Resolves the recipe's base and binds the inputs of one evaluation.
    pub fn prepare<'a>(
        &self,
        recipe: &'a Recipe,
        options: OptionSet,
        platform: Platform,
    ) -> CookResult<BuildState<'a>> {
        let base = resolve_base(recipe.base.as_ref())?;
        debug!(base = %base.reference(), "resolved base recipe");

        Ok(BuildState {
            build_time: SystemTime::now(),
            recipe,
            base,
            options,
            platform,
            cppstd: None,
            dependencies: vec![],
        })
    }

    /// Runs every stage up to and including `until`, aborting on the first failure.
    pub async fn run<'a>(
        &self,
        state: &mut BuildState<'a>,
        until: Stage,
    ) -> CookResult<Evaluation> {
        let mut evaluation = Evaluation {
            revision: state.recipe.revision.clone(),
            ..Evaluation::default()
        };

        for stage in Stage::stages() {
            if stage > until {
                break;
            }

            info!(recipe = %state.recipe.name, %stage, "running stage");

            match stage {
                Stage::Configure => self.configure(state)?,
                Stage::Generate => evaluation.config_file = Some(self.generate(state)?),
                Stage::Build => self.build(state).await?,
                Stage::Package => evaluation.package = Some(self.package(state).await?),
                Stage::PackageInfo => evaluation.cpp_info = Some(self.package_info(state)),
            }

            evaluation.completed.push(stage);
        }

        Ok(evaluation)
    }

    pub fn configure(&self, state: &mut BuildState) -> CookResult<()> {
        let base = state.base;
        base.configure(state)
    }

    pub fn generate(&self, state: &BuildState) -> CookResult<PathBuf> {
        let path = self.settings.config_file_path(state.recipe);
        state.base.generate(state, &self.generator, &path)?;
        info!(path = %path.display(), "wrote configuration file");
        Ok(path)
    }

    pub async fn build(&self, state: &mut BuildState<'_>) -> CookResult<()> {
        let invocation = self.configure_step(state).await?;
        self.driver.build(&invocation).await
    }

    pub async fn package(&self, state: &BuildState<'_>) -> CookResult<PublishedPackage> {
        let staged = self.store.stage().await?;

        let invocation = self.invocation(state);
        self.driver.configure(&invocation).await?;
        self.driver
            .install(&invocation, &staged.package_dir())
            .await?;

        let manifest = staged.manifest().await?;
        let metadata = PackageMetadata::new(state, self.package_info(state), manifest);

        self.store
            .publish(staged, &state.recipe.reference(), &metadata)
            .await
    }

    pub fn package_info(&self, state: &BuildState) -> CppInfo {
        CppInfo::for_build(self.settings.build_path(), state.options.flag("shared"))
    }

    /// Resolves the dependency graph, writes the generator files and configures the build tree.
    async fn configure_step(&self, state: &mut BuildState<'_>) -> CookResult<Invocation> {
        let mut dependencies = Vec::with_capacity(state.recipe.requires.len());
        for reference in &state.recipe.requires {
            let resolved = self.store.resolve(reference).await?;
            debug!(reference = %resolved.reference, "resolved dependency");
            dependencies.push(resolved);
        }
        state.dependencies = dependencies;

        self.generator.write_generators(state)?;

        let invocation = self.invocation(state);
        self.driver.configure(&invocation).await?;
        Ok(invocation)
    }

    fn invocation(&self, state: &BuildState) -> Invocation {
        Invocation {
            source_dir: self.settings.source_path_for_recipe(state.recipe),
            build_dir: self.settings.build_path().to_path_buf(),
            build_type: state.platform.build_type_or_default(),
            toolchain_file: state
                .uses_toolchain()
                .then(|| self.generator.toolchain_path()),
            jobs: self.environment.jobs(),
        }
    }
}
