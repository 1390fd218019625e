use crate::definition::reference::PackageReference;
use crate::definition::settings::CppStd;
use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

pub type CookResult<T> = Result<T, CookError>;

#[derive(Debug, Diagnostic, Error)]
pub enum CookError {
    #[error("{compiler} cannot provide C++{required} (detected {detected})")]
    #[diagnostic(
        code(cook::unsupported_toolchain),
        help("select a newer compiler or set compiler.cppstd to at least {required}")
    )]
    UnsupportedToolchain {
        compiler: String,
        required: CppStd,
        detected: String,
    },

    #[error("unable to resolve {reference}: {reason}")]
    #[diagnostic(code(cook::dependency_resolution))]
    DependencyResolution {
        reference: PackageReference,
        reason: String,
    },

    #[error("failed writing configuration file {}", path.display())]
    #[diagnostic(code(cook::config_write))]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} step failed: {detail}")]
    #[diagnostic(code(cook::compile))]
    Compile { step: &'static str, detail: String },

    #[error("install step failed: {detail}")]
    #[diagnostic(code(cook::install))]
    Install { detail: String },

    #[error("unknown option '{name}'")]
    #[diagnostic(code(cook::unknown_option), help("recognized options: {known}"))]
    UnknownOption { name: String, known: String },

    #[error("value '{value}' is not valid for option '{name}'")]
    #[diagnostic(code(cook::invalid_option), help("possible values: {domain}"))]
    InvalidOptionValue {
        name: String,
        value: String,
        domain: String,
    },

    #[error("setting '{axis}' is required by the recipe but was not given")]
    #[diagnostic(code(cook::missing_setting))]
    MissingSetting { axis: String },

    #[error("invalid value '{value}' for setting '{axis}'")]
    #[diagnostic(code(cook::invalid_setting))]
    InvalidSetting { axis: String, value: String },

    #[error("invalid package reference '{input}': {reason}")]
    #[diagnostic(code(cook::invalid_reference))]
    InvalidReference { input: String, reason: &'static str },

    #[error("no recipe named '{0}' in document")]
    #[diagnostic(code(cook::recipe_not_found))]
    RecipeNotFound(String),

    #[error("template error in '{template}': {message}")]
    #[diagnostic(code(cook::template))]
    Template { template: String, message: String },

    #[error(transparent)]
    #[diagnostic(code(cook::io))]
    Io(#[from] std::io::Error),
}
