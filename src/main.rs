use crate::definition::options::OptionSet;
use crate::definition::parsing::ParseDocument;
use crate::definition::profile::Profile;
use crate::definition::settings::Platform;
use crate::definition::{Document, Recipe};
use crate::engine::driver::CMake;
use crate::engine::{Engine, EngineSettings, Evaluation, Stage};
use crate::error::CookError;
use crate::utils::template::expand_recipe;
use clap::{Args, Parser, Subcommand};
use miette::{miette, IntoDiagnostic};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod definition;
mod engine;
mod error;
mod utils;

/// Evaluates package recipes and drives their CMake builds.
#[derive(Parser)]
#[command(name = "cook")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every stage and publish the package to the store
    Create(EvaluateArgs),

    /// Check the toolchain and write the user configuration file
    Generate(EvaluateArgs),

    /// Resolve dependencies, configure and compile
    Build(EvaluateArgs),

    /// Build and publish the package to the store
    Package(EvaluateArgs),

    /// Print the resolved recipe
    Inspect(RecipeArgs),
}

#[derive(Args)]
struct RecipeArgs {
    /// Recipe file
    recipe: PathBuf,

    /// Recipe to pick when the file declares several (default: the last one)
    #[arg(long)]
    recipe_name: Option<String>,
}

#[derive(Args)]
struct EvaluateArgs {
    #[command(flatten)]
    recipe: RecipeArgs,

    /// Option value, for example `build_tests=True`
    #[arg(short = 'o', long = "option", value_name = "NAME=VALUE")]
    options: Vec<String>,

    /// Setting value, for example `compiler.version=11`
    #[arg(short = 's', long = "setting", value_name = "AXIS=VALUE")]
    settings: Vec<String>,

    /// Profile file providing settings and options
    #[arg(short, long)]
    profile: Option<PathBuf>,

    #[arg(long, default_value = ".")]
    source_folder: PathBuf,

    #[arg(long, default_value = "build")]
    build_folder: PathBuf,

    /// Package store (default: ~/.cook/store)
    #[arg(long)]
    store: Option<PathBuf>,

    /// CMake executable
    #[arg(long, default_value = "cmake")]
    cmake: PathBuf,
}

fn default_store() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".cook")
        .join("store")
}

fn split_assignment(raw: &str) -> miette::Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(miette!("expected NAME=VALUE, got '{}'", raw)),
    }
}

async fn load_recipe(args: &RecipeArgs) -> miette::Result<Recipe> {
    let source = tokio::fs::read_to_string(&args.recipe)
        .await
        .into_diagnostic()?;
    let filename = args.recipe.to_string_lossy();
    let document = Document::parse_source(&source, Some(filename.as_ref()))?;

    let mut recipe = document
        .select(args.recipe_name.as_deref())
        .cloned()
        .ok_or_else(|| {
            CookError::RecipeNotFound(args.recipe_name.clone().unwrap_or_default())
        })?;

    expand_recipe(&mut recipe)?;
    Ok(recipe)
}

async fn load_profile(args: &EvaluateArgs) -> miette::Result<Profile> {
    let mut profile = match &args.profile {
        Some(path) => {
            let source = tokio::fs::read_to_string(path).await.into_diagnostic()?;
            let filename = path.to_string_lossy();
            Profile::parse_source(&source, Some(filename.as_ref()))?
        }
        None => Profile::default(),
    };

    let mut overrides = Profile::default();
    for raw in &args.settings {
        overrides.settings.push(split_assignment(raw)?);
    }
    for raw in &args.options {
        overrides.options.push(split_assignment(raw)?);
    }
    profile.extend(overrides);

    Ok(profile)
}

async fn evaluate(args: EvaluateArgs, until: Stage) -> miette::Result<()> {
    let recipe = load_recipe(&args.recipe).await?;
    let profile = load_profile(&args).await?;

    // Both are validated before the engine touches the filesystem.
    let options = OptionSet::resolve(&recipe.options, profile.options())?;
    let platform = Platform::from_assignments(profile.settings())?;

    let settings = EngineSettings::new(
        args.source_folder,
        args.build_folder,
        args.store.unwrap_or_else(default_store),
    )
    .with_cmake_program(args.cmake);

    let engine = Engine::new::<CMake>(settings);
    let mut state = engine.prepare(&recipe, options, platform)?;
    let evaluation = engine.run(&mut state, until).await?;

    report(&recipe, &evaluation);
    Ok(())
}

fn report(recipe: &Recipe, evaluation: &Evaluation) {
    info!(reference = %recipe.reference(), "evaluation finished");

    println!("{}/{}#{}", recipe.name, recipe.version, evaluation.revision);
    for stage in &evaluation.completed {
        println!("  {:<13} ok", stage.name());
    }
    if let Some(path) = &evaluation.config_file {
        println!("config file: {}", path.display());
    }
    if let Some(package) = &evaluation.package {
        println!("package: {} -> {}", package.reference, package.folder.display());
    }
    if let Some(info) = &evaluation.cpp_info {
        for dir in &info.builddirs {
            println!("builddir: {}", dir.display());
        }
    }
}

fn inspect(recipe: &Recipe) {
    println!("{}", recipe.reference());
    if !recipe.description.is_empty() {
        println!("description: {}", recipe.description);
    }
    if let Some(url) = &recipe.url {
        println!("url: {}", url);
    }
    if !recipe.license.is_empty() {
        println!("license: {}", recipe.license.join(", "));
    }
    if !recipe.topics.is_empty() {
        println!("topics: {}", recipe.topics.join(", "));
    }
    if let Some(base) = &recipe.base {
        println!("base: {}", base);
    }
    for option in &recipe.options {
        println!(
            "option {} = {} ({})",
            option.name,
            option.default,
            option.domain.describe()
        );
    }
    for requirement in &recipe.requires {
        println!("requires: {}", requirement);
    }
    for entry in &recipe.changelog {
        println!("{}: {}", entry.version, entry.text);
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    match cli.command {
        Commands::Create(args) => evaluate(args, Stage::PackageInfo).await,
        Commands::Generate(args) => evaluate(args, Stage::Generate).await,
        Commands::Build(args) => evaluate(args, Stage::Build).await,
        Commands::Package(args) => evaluate(args, Stage::Package).await,
        Commands::Inspect(args) => {
            let recipe = load_recipe(&args).await?;
            info!(file = %args.recipe.display(), "loaded recipe");
            inspect(&recipe);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments_split_on_first_equals() {
        assert_eq!(
            split_assignment("compiler.version=11").unwrap(),
            ("compiler.version".to_string(), "11".to_string())
        );
        assert_eq!(
            split_assignment("flags=-O2=x").unwrap(),
            ("flags".to_string(), "-O2=x".to_string())
        );
        assert!(split_assignment("shared").is_err());
        assert!(split_assignment("=True").is_err());
    }

    #[test]
    fn cli_parses_repeated_flags() {
        let cli = Cli::try_parse_from([
            "cook",
            "create",
            "recipes/math.kdl",
            "-o",
            "build_tests=True",
            "-s",
            "os=Linux",
            "-s",
            "compiler=gcc",
            "--store",
            "/tmp/store",
        ])
        .unwrap();

        match cli.command {
            Commands::Create(args) => {
                assert_eq!(args.options, vec!["build_tests=True"]);
                assert_eq!(args.settings.len(), 2);
                assert_eq!(args.store, Some(PathBuf::from("/tmp/store")));
                assert_eq!(args.build_folder, PathBuf::from("build"));
            }
            _ => panic!("expected create"),
        }
    }

    #[tokio::test]
    async fn unknown_option_is_rejected_before_anything_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let recipe = dir.path().join("math.kdl");
        std::fs::write(
            &recipe,
            r#"recipe "math" {
    version "0.0.1"
    options {
        shared false
        build_tests false
    }
}"#,
        )
        .unwrap();

        let args = EvaluateArgs {
            recipe: RecipeArgs {
                recipe,
                recipe_name: None,
            },
            options: vec!["build_tests=maybe".to_string()],
            settings: vec![],
            profile: None,
            source_folder: dir.path().to_path_buf(),
            build_folder: dir.path().join("build"),
            store: Some(dir.path().join("store")),
            cmake: PathBuf::from("cmake"),
        };

        assert!(evaluate(args, Stage::Generate).await.is_err());
        assert!(!dir.path().join("build").exists());
        assert!(!dir.path().join("store").exists());
    }
}
