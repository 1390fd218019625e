use crate::error::{CookError, CookResult};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum SettingAxis {
    Os,
    Compiler,
    BuildType,
    Arch,
}

impl SettingAxis {
    pub const fn all() -> [SettingAxis; 4] {
        [
            SettingAxis::Os,
            SettingAxis::Compiler,
            SettingAxis::BuildType,
            SettingAxis::Arch,
        ]
    }

    pub fn parse<T: AsRef<str>>(data: T) -> Option<SettingAxis> {
        Some(match data.as_ref() {
            "os" => SettingAxis::Os,
            "compiler" => SettingAxis::Compiler,
            "build_type" => SettingAxis::BuildType,
            "arch" => SettingAxis::Arch,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            SettingAxis::Os => "os",
            SettingAxis::Compiler => "compiler",
            SettingAxis::BuildType => "build_type",
            SettingAxis::Arch => "arch",
        }
    }
}

/// A C++ language standard, optionally with GNU extensions.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct CppStd {
    year: u16,
    gnu: bool,
}

impl CppStd {
    pub const CPP98: CppStd = CppStd::new(98);
    pub const CPP11: CppStd = CppStd::new(11);
    pub const CPP14: CppStd = CppStd::new(14);
    pub const CPP17: CppStd = CppStd::new(17);
    pub const CPP20: CppStd = CppStd::new(20);
    pub const CPP23: CppStd = CppStd::new(23);

    const KNOWN: [u16; 6] = [98, 11, 14, 17, 20, 23];

    pub const fn new(year: u16) -> Self {
        CppStd { year, gnu: false }
    }

    pub const fn gnu(year: u16) -> Self {
        CppStd { year, gnu: true }
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn extensions(&self) -> bool {
        self.gnu
    }

    fn rank(&self) -> usize {
        Self::KNOWN
            .iter()
            .position(|y| *y == self.year)
            .unwrap_or(usize::MAX)
    }
}

/// Ordered by language level, then by GNU extensions.
impl Ord for CppStd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then(self.gnu.cmp(&other.gnu))
    }
}

impl PartialOrd for CppStd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl CppStd {
    pub fn at_least(&self, other: &CppStd) -> bool {
        self.rank() >= other.rank()
    }
}

impl FromStr for CppStd {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (gnu, digits) = match s.strip_prefix("gnu") {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let year: u16 = digits.parse().map_err(|_| ())?;
        if !Self::KNOWN.contains(&year) {
            return Err(());
        }

        Ok(CppStd { year, gnu })
    }
}

impl Display for CppStd {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.gnu {
            f.write_str("gnu")?;
        }
        write!(f, "{}", self.year)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub struct CompilerVersion {
    pub major: u32,
    pub minor: u32,
}

impl CompilerVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        CompilerVersion { major, minor }
    }
}

impl FromStr for CompilerVersion {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let major = parts.next().ok_or(())?.parse().map_err(|_| ())?;
        let minor = match parts.next() {
            Some(minor) => minor.parse().map_err(|_| ())?,
            None => 0,
        };

        Ok(CompilerVersion { major, minor })
    }
}

impl Display for CompilerVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.minor == 0 {
            write!(f, "{}", self.major)
        } else {
            write!(f, "{}.{}", self.major, self.minor)
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CompilerKind {
    Gcc,
    Clang,
    AppleClang,
    Msvc,
    Other(String),
}

impl CompilerKind {
    pub fn parse<T: AsRef<str>>(data: T) -> CompilerKind {
        match data.as_ref() {
            "gcc" => CompilerKind::Gcc,
            "clang" => CompilerKind::Clang,
            "apple-clang" => CompilerKind::AppleClang,
            "msvc" => CompilerKind::Msvc,
            other => CompilerKind::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CompilerKind::Gcc => "gcc",
            CompilerKind::Clang => "clang",
            CompilerKind::AppleClang => "apple-clang",
            CompilerKind::Msvc => "msvc",
            CompilerKind::Other(name) => name,
        }
    }
}

/// `(first version, standard)` rows, newest first.
type StdTable = &'static [(CompilerVersion, CppStd)];

const GCC_SUPPORTED: StdTable = &[
    (CompilerVersion::new(11, 0), CppStd::CPP23),
    (CompilerVersion::new(8, 0), CppStd::CPP20),
    (CompilerVersion::new(5, 0), CppStd::CPP17),
    (CompilerVersion::new(4, 9), CppStd::CPP14),
    (CompilerVersion::new(4, 3), CppStd::CPP11),
    (CompilerVersion::new(0, 0), CppStd::CPP98),
];

const GCC_DEFAULT: StdTable = &[
    (CompilerVersion::new(11, 0), CppStd::gnu(17)),
    (CompilerVersion::new(6, 1), CppStd::gnu(14)),
    (CompilerVersion::new(0, 0), CppStd::gnu(98)),
];

const CLANG_SUPPORTED: StdTable = &[
    (CompilerVersion::new(12, 0), CppStd::CPP23),
    (CompilerVersion::new(6, 0), CppStd::CPP20),
    (CompilerVersion::new(3, 5), CppStd::CPP17),
    (CompilerVersion::new(3, 4), CppStd::CPP14),
    (CompilerVersion::new(2, 1), CppStd::CPP11),
    (CompilerVersion::new(0, 0), CppStd::CPP98),
];

const CLANG_DEFAULT: StdTable = &[
    (CompilerVersion::new(16, 0), CppStd::gnu(17)),
    (CompilerVersion::new(6, 0), CppStd::gnu(14)),
    (CompilerVersion::new(0, 0), CppStd::gnu(98)),
];

const APPLE_CLANG_SUPPORTED: StdTable = &[
    (CompilerVersion::new(13, 0), CppStd::CPP23),
    (CompilerVersion::new(10, 0), CppStd::CPP20),
    (CompilerVersion::new(6, 1), CppStd::CPP17),
    (CompilerVersion::new(5, 1), CppStd::CPP14),
    (CompilerVersion::new(4, 0), CppStd::CPP11),
    (CompilerVersion::new(0, 0), CppStd::CPP98),
];

const APPLE_CLANG_DEFAULT: StdTable = &[(CompilerVersion::new(0, 0), CppStd::gnu(98))];

const MSVC_SUPPORTED: StdTable = &[
    (CompilerVersion::new(193, 0), CppStd::CPP23),
    (CompilerVersion::new(192, 0), CppStd::CPP20),
    (CompilerVersion::new(191, 0), CppStd::CPP17),
    (CompilerVersion::new(190, 0), CppStd::CPP14),
];

const MSVC_DEFAULT: StdTable = &[(CompilerVersion::new(190, 0), CppStd::CPP14)];

fn lookup(table: StdTable, version: CompilerVersion) -> Option<CppStd> {
    table
        .iter()
        .find(|(since, _)| version >= *since)
        .map(|(_, std)| *std)
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Compiler {
    pub kind: CompilerKind,
    pub version: CompilerVersion,
    pub cppstd: Option<CppStd>,
    pub libcxx: Option<String>,
}

impl Compiler {
    fn tables(&self) -> Option<(StdTable, StdTable)> {
        Some(match self.kind {
            CompilerKind::Gcc => (GCC_SUPPORTED, GCC_DEFAULT),
            CompilerKind::Clang => (CLANG_SUPPORTED, CLANG_DEFAULT),
            CompilerKind::AppleClang => (APPLE_CLANG_SUPPORTED, APPLE_CLANG_DEFAULT),
            CompilerKind::Msvc => (MSVC_SUPPORTED, MSVC_DEFAULT),
            CompilerKind::Other(_) => return None,
        })
    }

    /// Newest standard this compiler version can compile, if known.
    pub fn max_supported(&self) -> Option<CppStd> {
        self.tables()
            .and_then(|(supported, _)| lookup(supported, self.version))
    }

    /// Standard the compiler uses when no `-std` flag is given, if known.
    pub fn default_cppstd(&self) -> Option<CppStd> {
        self.tables()
            .and_then(|(_, default)| lookup(default, self.version))
    }

    /// Checks that this compiler can build code requiring `minimum` and returns the standard the
    /// build should be pinned to: the explicit `compiler.cppstd` when set, otherwise the newer of
    /// the compiler default and `minimum`.
    pub fn check_min_cppstd(&self, minimum: CppStd) -> CookResult<CppStd> {
        let unsupported = |detected: String| CookError::UnsupportedToolchain {
            compiler: self.to_string(),
            required: minimum,
            detected,
        };

        let max = self.max_supported();

        if let Some(explicit) = self.cppstd {
            if let Some(max) = max {
                if !max.at_least(&explicit) {
                    return Err(unsupported(format!(
                        "cppstd={} but the compiler supports at most {}",
                        explicit, max
                    )));
                }
            }

            if !explicit.at_least(&minimum) {
                return Err(unsupported(format!("cppstd={}", explicit)));
            }

            return Ok(explicit);
        }

        match max {
            None => Err(unsupported("unknown standard support".to_string())),
            Some(max) if !max.at_least(&minimum) => {
                Err(unsupported(format!("supports at most {}", max)))
            }
            Some(_) => Ok(match self.default_cppstd() {
                Some(default) if default.at_least(&minimum) => default,
                _ => minimum,
            }),
        }
    }
}

impl Display for Compiler {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind.name(), self.version)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BuildType {
    Debug,
    Release,
    RelWithDebInfo,
    MinSizeRel,
}

impl BuildType {
    pub fn parse<T: AsRef<str>>(data: T) -> Option<BuildType> {
        Some(match data.as_ref() {
            "Debug" => BuildType::Debug,
            "Release" => BuildType::Release,
            "RelWithDebInfo" => BuildType::RelWithDebInfo,
            "MinSizeRel" => BuildType::MinSizeRel,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuildType::Debug => "Debug",
            BuildType::Release => "Release",
            BuildType::RelWithDebInfo => "RelWithDebInfo",
            BuildType::MinSizeRel => "MinSizeRel",
        }
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Platform {
    pub os: Option<String>,
    pub arch: Option<String>,
    pub build_type: Option<BuildType>,
    pub compiler: Option<Compiler>,
}

impl Platform {
    /// Builds a platform from `axis=value` style assignments. Later assignments win.
    pub fn from_assignments<'a, I>(assignments: I) -> CookResult<Platform>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut raw: BTreeMap<&str, &str> = BTreeMap::new();
        for (key, value) in assignments {
            raw.insert(key, value);
        }

        let invalid = |axis: &str, value: &str| CookError::InvalidSetting {
            axis: axis.to_string(),
            value: value.to_string(),
        };

        let mut platform = Platform::default();
        let mut compiler_name = None;
        let mut compiler_version = None;
        let mut cppstd = None;
        let mut libcxx = None;

        for (key, value) in raw {
            match key {
                "os" => platform.os = Some(value.to_string()),
                "arch" => platform.arch = Some(value.to_string()),
                "build_type" => {
                    platform.build_type =
                        Some(BuildType::parse(value).ok_or_else(|| invalid(key, value))?)
                }
                "compiler" => compiler_name = Some(CompilerKind::parse(value)),
                "compiler.version" => {
                    compiler_version =
                        Some(value.parse::<CompilerVersion>().map_err(|_| invalid(key, value))?)
                }
                "compiler.cppstd" => {
                    cppstd = Some(value.parse::<CppStd>().map_err(|_| invalid(key, value))?)
                }
                "compiler.libcxx" => libcxx = Some(value.to_string()),
                _ => return Err(invalid(key, value)),
            }
        }

        match (compiler_name, compiler_version) {
            (Some(kind), Some(version)) => {
                platform.compiler = Some(Compiler {
                    kind,
                    version,
                    cppstd,
                    libcxx,
                })
            }
            (Some(_), None) => {
                return Err(CookError::MissingSetting {
                    axis: "compiler.version".to_string(),
                })
            }
            (None, Some(_)) => {
                return Err(CookError::MissingSetting {
                    axis: "compiler".to_string(),
                })
            }
            (None, None) => {}
        }

        Ok(platform)
    }

    pub fn has_axis(&self, axis: SettingAxis) -> bool {
        match axis {
            SettingAxis::Os => self.os.is_some(),
            SettingAxis::Compiler => self.compiler.is_some(),
            SettingAxis::BuildType => self.build_type.is_some(),
            SettingAxis::Arch => self.arch.is_some(),
        }
    }

    pub fn build_type_or_default(&self) -> BuildType {
        self.build_type.unwrap_or(BuildType::Release)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiler(kind: &str, version: &str, cppstd: Option<&str>) -> Compiler {
        Compiler {
            kind: CompilerKind::parse(kind),
            version: version.parse().unwrap(),
            cppstd: cppstd.map(|s| s.parse().unwrap()),
            libcxx: None,
        }
    }

    #[test]
    fn cppstd_parsing_and_order() {
        let gnu17: CppStd = "gnu17".parse().unwrap();
        assert!(gnu17.extensions());
        assert_eq!(gnu17.year(), 17);
        assert!(gnu17.at_least(&CppStd::CPP17));
        assert!(CppStd::CPP11 > CppStd::CPP98);
        assert!(CppStd::CPP20 > CppStd::gnu(17));
        assert!("16".parse::<CppStd>().is_err());
        assert!("gnu".parse::<CppStd>().is_err());
    }

    #[test]
    fn modern_gcc_satisfies_cpp17() {
        let std = compiler("gcc", "11", None)
            .check_min_cppstd(CppStd::CPP17)
            .unwrap();
        assert_eq!(std, CppStd::gnu(17));
    }

    #[test]
    fn gcc_capable_but_older_default_is_pinned_to_minimum() {
        let std = compiler("gcc", "9", None)
            .check_min_cppstd(CppStd::CPP17)
            .unwrap();
        assert_eq!(std, CppStd::CPP17);
    }

    #[test]
    fn old_gcc_is_rejected() {
        let err = compiler("gcc", "4.8", None)
            .check_min_cppstd(CppStd::CPP17)
            .unwrap_err();
        assert!(matches!(
            err,
            CookError::UnsupportedToolchain { required, .. } if required == CppStd::CPP17
        ));
    }

    #[test]
    fn explicit_cppstd_below_minimum_is_rejected() {
        assert!(compiler("clang", "15", Some("14"))
            .check_min_cppstd(CppStd::CPP17)
            .is_err());
        assert_eq!(
            compiler("clang", "15", Some("gnu20"))
                .check_min_cppstd(CppStd::CPP17)
                .unwrap(),
            CppStd::gnu(20)
        );
    }

    #[test]
    fn explicit_cppstd_beyond_compiler_is_rejected() {
        assert!(compiler("gcc", "7", Some("20"))
            .check_min_cppstd(CppStd::CPP17)
            .is_err());
    }

    #[test]
    fn msvc_versions() {
        assert!(compiler("msvc", "190", None)
            .check_min_cppstd(CppStd::CPP17)
            .is_err());
        assert_eq!(
            compiler("msvc", "193", None)
                .check_min_cppstd(CppStd::CPP17)
                .unwrap(),
            CppStd::CPP17
        );
    }

    #[test]
    fn unknown_compiler_needs_explicit_standard() {
        assert!(compiler("intel-cc", "2021", None)
            .check_min_cppstd(CppStd::CPP17)
            .is_err());
        assert!(compiler("intel-cc", "2021", Some("17"))
            .check_min_cppstd(CppStd::CPP17)
            .is_ok());
    }

    #[test]
    fn platform_from_assignments() {
        let platform = Platform::from_assignments([
            ("os", "Linux"),
            ("arch", "x86_64"),
            ("build_type", "Release"),
            ("compiler", "gcc"),
            ("compiler.version", "11.2"),
            ("compiler.libcxx", "libstdc++11"),
        ])
        .unwrap();

        for axis in SettingAxis::all() {
            assert!(platform.has_axis(axis), "{:?}", axis);
        }

        let compiler = platform.compiler.unwrap();
        assert_eq!(compiler.kind, CompilerKind::Gcc);
        assert_eq!(compiler.version, CompilerVersion::new(11, 2));
        assert_eq!(compiler.libcxx.as_deref(), Some("libstdc++11"));
    }

    #[test]
    fn platform_rejects_bad_settings() {
        assert!(matches!(
            Platform::from_assignments([("build_type", "Fast")]),
            Err(CookError::InvalidSetting { .. })
        ));
        assert!(matches!(
            Platform::from_assignments([("compiler", "gcc")]),
            Err(CookError::MissingSetting { .. })
        ));
        assert!(matches!(
            Platform::from_assignments([("os.distro", "debian")]),
            Err(CookError::InvalidSetting { .. })
        ));
    }
}
