use crate::engine::driver::{BuildDriver, DriverBuilder, Invocation};
use crate::engine::environment::Environment;
use crate::engine::EngineSettings;
use crate::error::{CookError, CookResult};
use async_trait::async_trait;
use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::slice::Iter;
use std::sync::Arc;
use std::vec::IntoIter;
use tracing::{debug, warn};

/// Lines of build output kept when a step fails.
const OUTPUT_TAIL: usize = 20;

#[derive(Debug)]
pub struct CMake {
    environment: Environment,
}

impl DriverBuilder for CMake {
    type Output = CMake;

    fn build(settings: Arc<EngineSettings>) -> Self::Output {
        CMake {
            environment: Environment::new(settings),
        }
    }
}

enum Step {
    Configure,
    Build,
    Install,
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Configure => "configure",
            Step::Build => "build",
            Step::Install => "install",
        }
    }

    fn failure(&self, detail: String) -> CookError {
        match self {
            Step::Install => CookError::Install { detail },
            _ => CookError::Compile {
                step: self.name(),
                detail,
            },
        }
    }
}

impl CMake {
    async fn run(&self, step: Step, cwd: &Path, args: CMakeArgs) -> CookResult<()> {
        debug!(step = step.name(), args = ?args.0, "running cmake");

        let output = self
            .environment
            .cmake(cwd, args)
            .output()
            .await
            .map_err(|e| step.failure(format!("unable to run cmake: {}", e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = if stderr.trim().is_empty() { stdout } else { stderr };

        let lines: Vec<&str> = text.lines().collect();
        let tail = lines[lines.len().saturating_sub(OUTPUT_TAIL)..].join("\n");

        warn!(step = step.name(), status = %output.status, "cmake failed");
        Err(step.failure(format!("cmake exited with {}\n{}", output.status, tail)))
    }
}

#[async_trait]
impl BuildDriver for CMake {
    async fn configure(&self, invocation: &Invocation) -> CookResult<()> {
        tokio::fs::create_dir_all(&invocation.build_dir)
            .await
            .map_err(|e| Step::Configure.failure(e.to_string()))?;

        let mut args = CMakeArgs::new();
        args.source(&invocation.source_dir)
            .binary(&invocation.build_dir)
            .define("CMAKE_BUILD_TYPE", invocation.build_type.name());

        if let Some(toolchain) = &invocation.toolchain_file {
            args.define("CMAKE_TOOLCHAIN_FILE", toolchain);
        }

        self.run(Step::Configure, &invocation.build_dir, args).await
    }

    async fn build(&self, invocation: &Invocation) -> CookResult<()> {
        let mut args = CMakeArgs::new();
        args.flag("--build", &invocation.build_dir)
            .flag("--config", invocation.build_type.name())
            .flag("--parallel", invocation.jobs.to_string());

        self.run(Step::Build, &invocation.build_dir, args).await
    }

    async fn install(&self, invocation: &Invocation, prefix: &Path) -> CookResult<()> {
        let mut args = CMakeArgs::new();
        args.flag("--install", &invocation.build_dir)
            .flag("--config", invocation.build_type.name())
            .flag("--prefix", prefix);

        self.run(Step::Install, &invocation.build_dir, args).await
    }
}

pub struct CMakeArgs(Vec<Cow<'static, OsStr>>);

impl<'a> IntoIterator for &'a CMakeArgs {
    type Item = &'a Cow<'static, OsStr>;
    type IntoIter = Iter<'a, Cow<'static, OsStr>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for CMakeArgs {
    type Item = Cow<'static, OsStr>;
    type IntoIter = IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl CMakeArgs {
    pub fn new() -> Self {
        CMakeArgs(vec![])
    }

    pub fn flag<T: Into<OsString>>(&mut self, name: &'static str, value: T) -> &mut Self {
        self.0.push(Cow::Borrowed(OsStr::new(name)));
        self.0.push(Cow::Owned(value.into()));
        self
    }

    pub fn source<T: Into<OsString>>(&mut self, directory: T) -> &mut Self {
        self.flag("-S", directory)
    }

    pub fn binary<T: Into<OsString>>(&mut self, directory: T) -> &mut Self {
        self.flag("-B", directory)
    }

    pub fn define<D1: Into<OsString>, D2: Into<OsString>>(
        &mut self,
        name: D1,
        value: D2,
    ) -> &mut Self {
        let mut x = OsString::from("-D");
        x.push(name.into());
        x.push(OsStr::new("="));
        x.push(value.into());

        self.0.push(Cow::Owned(x));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::settings::BuildType;
    use std::path::PathBuf;

    fn strings(args: &CMakeArgs) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn configure_arguments() {
        let mut args = CMakeArgs::new();
        args.source(PathBuf::from("/src/math"))
            .binary(PathBuf::from("/build"))
            .define("CMAKE_BUILD_TYPE", "Release")
            .define("CMAKE_TOOLCHAIN_FILE", PathBuf::from("/build/conan_toolchain.cmake"));

        assert_eq!(
            strings(&args),
            vec![
                "-S",
                "/src/math",
                "-B",
                "/build",
                "-DCMAKE_BUILD_TYPE=Release",
                "-DCMAKE_TOOLCHAIN_FILE=/build/conan_toolchain.cmake",
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_program_is_a_compile_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = EngineSettings::new(dir.path(), dir.path().join("build"), dir.path())
            .with_cmake_program("false");
        let driver = <CMake as DriverBuilder>::build(Arc::new(settings));

        let invocation = Invocation {
            source_dir: dir.path().to_path_buf(),
            build_dir: dir.path().join("build"),
            build_type: BuildType::Release,
            toolchain_file: None,
            jobs: 2,
        };

        let err = driver.build(&invocation).await.unwrap_err();
        assert!(matches!(err, CookError::Compile { step: "build", .. }));

        let err = driver
            .install(&invocation, &dir.path().join("prefix"))
            .await
            .unwrap_err();
        assert!(matches!(err, CookError::Install { .. }));
    }

    #[tokio::test]
    async fn missing_program_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let settings = EngineSettings::new(dir.path(), dir.path().join("build"), dir.path())
            .with_cmake_program(dir.path().join("no-such-cmake"));
        let driver = <CMake as DriverBuilder>::build(Arc::new(settings));

        let invocation = Invocation {
            source_dir: dir.path().to_path_buf(),
            build_dir: dir.path().join("build"),
            build_type: BuildType::Debug,
            toolchain_file: None,
            jobs: 1,
        };

        let err = driver.configure(&invocation).await.unwrap_err();
        assert!(matches!(err, CookError::Compile { step: "configure", .. }));
    }
}
