use crate::engine::EngineSettings;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

#[derive(Debug)]
pub struct Environment {
    settings: Arc<EngineSettings>,
    pub cpus: usize,
}

impl Environment {
    pub fn new(settings: Arc<EngineSettings>) -> Self {
        Environment {
            settings,
            cpus: num_cpus::get(),
        }
    }

    /// Parallel build jobs handed to the build tool.
    pub fn jobs(&self) -> usize {
        self.cpus + 1
    }

    /// A CMake command running in `cwd`. Output is captured so failures can be reported.
    pub fn cmake<I, S>(&self, cwd: &Path, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(self.settings.cmake_program());
        cmd.current_dir(cwd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jobs_exceed_cpu_count() {
        let env = Environment::new(Arc::new(EngineSettings::new("src", "build", "store")));
        assert_eq!(env.jobs(), env.cpus + 1);
        assert!(env.jobs() >= 2);
    }

    #[test]
    fn command_uses_configured_program() {
        let settings = EngineSettings::new("src", "build", "store").with_cmake_program("/opt/cmake");
        let env = Environment::new(Arc::new(settings));
        let cmd = env.cmake(Path::new("/tmp"), ["--version"]);
        assert_eq!(cmd.as_std().get_program(), "/opt/cmake");
        assert_eq!(cmd.as_std().get_args().collect::<Vec<_>>(), vec!["--version"]);
    }
}
