use crate::definition::settings::BuildType;
use crate::engine::EngineSettings;
use crate::error::CookResult;
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod cmake;

pub use cmake::CMake;

/// One configure/build/install cycle of an out-of-source build tree.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Invocation {
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub build_type: BuildType,
    pub toolchain_file: Option<PathBuf>,
    pub jobs: usize,
}

/// The external build system the recipe delegates to. Failures are reported as they come,
/// the engine never retries.
#[async_trait]
pub trait BuildDriver: Send + Sync + Debug {
    async fn configure(&self, invocation: &Invocation) -> CookResult<()>;

    async fn build(&self, invocation: &Invocation) -> CookResult<()>;

    /// Installs the build tree's artifacts below `prefix`.
    async fn install(&self, invocation: &Invocation, prefix: &Path) -> CookResult<()>;
}

pub trait DriverBuilder {
    type Output: BuildDriver + 'static;

    fn build(settings: Arc<EngineSettings>) -> Self::Output;
}
