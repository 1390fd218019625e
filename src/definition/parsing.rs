use crate::definition::options::{OptionDecl, OptionDomain, OptionValue};
use crate::definition::reference::{valid_component, PackageReference};
use crate::definition::settings::{CppStd, SettingAxis};
use crate::definition::{
    recipe_revision, BuildPolicy, ChangelogEntry, Document, Generator, Recipe, DEFAULT_CONFIG_FILE,
};
use crate::error::CookError;
use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[error("Failed parsing cook document")]
pub struct CookParserCompoundError {
    #[source_code]
    pub source_code: NamedSource,
    #[related]
    pub(crate) errors: Vec<CookParseError>,
}

#[derive(Debug, Diagnostic, Eq, PartialEq, Error)]
#[error("{kind}")]
pub struct CookParseError {
    /// Offset in chars of the error.
    #[label("{}", label.unwrap_or("here"))]
    pub span: SourceSpan,

    /// Label text for this span. Defaults to `"here"`.
    pub label: Option<&'static str>,

    /// Suggestion for fixing the parser error.
    #[help]
    pub help: Option<String>,

    /// Specific error kind for this parser error.
    pub kind: &'static str,
}

impl CookParseError {
    pub fn new(span: SourceSpan, kind: &'static str) -> Self {
        CookParseError {
            span,
            label: None,
            help: None,
            kind,
        }
    }

    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

const EMPTY_NODES: &[KdlNode] = &[];

pub(crate) trait GetNodes {
    fn nodes(&self) -> &[KdlNode];
}

impl GetNodes for KdlNode {
    fn nodes(&self) -> &[KdlNode] {
        self.children().map_or(EMPTY_NODES, |x| x.nodes())
    }
}

fn compound(errors: Vec<CookParseError>, source: &str, filename: Option<&str>) -> miette::Report {
    CookParserCompoundError {
        source_code: NamedSource::new(
            filename
                .map(ToString::to_string)
                .unwrap_or_else(|| "[memory.kdl]".to_string()),
            source.to_string(),
        ),
        errors,
    }
    .into()
}

pub trait ParseDocument {
    /// Parses `source` as KDL and then as `Self`, failing on the first error of either step.
    fn parse_source(source: &str, filename: Option<&str>) -> miette::Result<Self>
    where
        Self: Sized,
    {
        let document: KdlDocument = source.parse()?;
        Self::parse_document_strict(&document, source, filename)
    }

    fn parse_document_strict(
        input: &KdlDocument,
        source: &str,
        filename: Option<&str>,
    ) -> miette::Result<Self>
    where
        Self: Sized,
    {
        let (data, errors) = Self::parse_document_with_errors(input);

        match data {
            Some(obj) if errors.is_empty() => Ok(obj),
            _ => Err(compound(errors, source, filename)),
        }
    }

    fn parse_document_with_errors(input: &KdlDocument) -> (Option<Self>, Vec<CookParseError>)
    where
        Self: Sized;
}

pub trait ParseNode {
    fn parse_node_with_errors(input: &KdlNode) -> (Option<Self>, Vec<CookParseError>)
    where
        Self: Sized;
}

#[macro_export]
macro_rules! parse_string_into {
    ($input:ident, $into:expr, $errors:expr, $name:literal) => {
        use $crate::definition::parsing::extract_single_string_value;

        match extract_single_string_value(
            $input,
            concat!($name, " missing"),
            concat!($name, " should be a string"),
            concat!("only 1 string expected for ", $name),
            concat!($name, " expected a value, property found instead"),
        ) {
            Ok(n) => $into = n.into(),
            Err(e) => $errors.push(e),
        };
    };
}

#[macro_export]
macro_rules! parse_string_list_into {
    ($input:ident, $into:expr, $errors:expr, $name:literal) => {
        use $crate::definition::parsing::{extract_string_values, ListExtHelper};

        match extract_string_values(
            $input,
            concat!($name, " expects only string values"),
            concat!($name, " expected values, property found instead"),
        ) {
            Ok(n) => $into.add(n),
            Err(e) => $errors.push(e),
        };
    };
}

pub trait ListExtHelper<T> {
    fn add(&mut self, value: Vec<T>);
}

impl<T> ListExtHelper<T> for Vec<T> {
    fn add(&mut self, value: Vec<T>) {
        self.extend(value);
    }
}

impl<T> ListExtHelper<T> for Option<Vec<T>> {
    fn add(&mut self, value: Vec<T>) {
        if let Some(data) = self {
            data.extend(value)
        } else {
            *self = Some(value)
        }
    }
}

impl ParseDocument for Document {
    fn parse_document_with_errors(input: &KdlDocument) -> (Option<Self>, Vec<CookParseError>)
    where
        Self: Sized,
    {
        let mut recipes = vec![];
        let mut errors = vec![];

        for node in input.nodes() {
            match node.name().value() {
                "recipe" => {
                    let (recipe, err) = Recipe::parse_node_with_errors(node);
                    if let Some(recipe) = recipe {
                        recipes.push(recipe);
                    }
                    errors.extend(err);
                }

                _ => errors.push(
                    CookParseError::new(*node.name().span(), "unknown top level node")
                        .with_help("only `recipe` nodes are allowed at the top level"),
                ),
            }
        }

        (Some(Document { recipes }), errors)
    }
}

impl ParseNode for Recipe {
    fn parse_node_with_errors(input: &KdlNode) -> (Option<Self>, Vec<CookParseError>)
    where
        Self: Sized,
    {
        let mut errors: Vec<CookParseError> = vec![];

        let mut name: String = "<unnamed>".to_string();
        let mut version: Option<String> = None;
        let mut description: String = "".to_string();
        let mut url: Option<String> = None;
        let mut source_dir: Option<String> = None;
        let mut config_file: Option<String> = None;
        let mut license: Vec<String> = vec![];
        let mut topics: Vec<String> = vec![];
        let mut settings: Option<Vec<SettingAxis>> = None;
        let mut options: Vec<OptionDecl> = vec![];
        let mut requires: Vec<PackageReference> = vec![];
        let mut base: Option<PackageReference> = None;
        let mut generators: Option<Vec<Generator>> = None;
        let mut build_policy: Option<BuildPolicy> = None;
        let mut min_cppstd: Option<CppStd> = None;
        let mut changelog: Vec<ChangelogEntry> = vec![];

        let reported = errors.len();
        parse_string_into!(input, name, errors, "name of recipe");
        if errors.len() == reported && !valid_component(&name) {
            let span = input.entries().first().map_or(*input.span(), |e| *e.span());
            errors.push(CookParseError::new(span, "invalid recipe name").with_help(COMPONENT_HELP));
        }

        let mut version_span: Option<SourceSpan> = None;
        for node in input.nodes() {
            match node.name().value() {
                "version" => {
                    parse_string_into!(node, version, errors, "version");
                    version_span = Some(*node.span());
                }

                "description" => {
                    parse_string_into!(node, description, errors, "description");
                }

                "url" => {
                    parse_string_into!(node, url, errors, "url");
                }

                "source-dir" => {
                    parse_string_into!(node, source_dir, errors, "source-dir");
                }

                "config-file" => {
                    parse_string_into!(node, config_file, errors, "config-file");
                }

                "license" => {
                    parse_string_list_into!(node, license, errors, "license");
                }

                "topics" => {
                    parse_string_list_into!(node, topics, errors, "topics");
                }

                "settings" => {
                    let axes = parse_typed_values(node, &mut errors, "unknown settings axis", |v| {
                        SettingAxis::parse(v).ok_or("expected one of os, compiler, build_type, arch")
                    });
                    settings.add(axes);
                }

                "generators" => {
                    let gens = parse_typed_values(node, &mut errors, "unknown generator", |v| {
                        Generator::parse(v).ok_or("expected CMakeDeps or CMakeToolchain")
                    });
                    generators.add(gens);
                }

                "requires" => {
                    let refs = parse_typed_values(node, &mut errors, "invalid package reference", |v| {
                        v.parse::<PackageReference>().map_err(reference_reason)
                    });
                    requires.extend(refs);
                }

                "base" => {
                    let mut raw: Option<String> = None;
                    parse_string_into!(node, raw, errors, "base");
                    if let Some(raw) = raw {
                        match raw.parse::<PackageReference>() {
                            Ok(r) => base = Some(r),
                            Err(e) => errors.push(
                                CookParseError::new(*node.span(), "invalid base reference")
                                    .with_help(reference_reason(e)),
                            ),
                        }
                    }
                }

                "build-policy" => {
                    let mut raw: Option<String> = None;
                    parse_string_into!(node, raw, errors, "build-policy");
                    if let Some(raw) = raw {
                        match BuildPolicy::parse(&raw) {
                            Some(policy) => build_policy = Some(policy),
                            None => errors.push(
                                CookParseError::new(*node.span(), "unknown build policy")
                                    .with_help("expected one of never, missing, always"),
                            ),
                        }
                    }
                }

                "min-cppstd" => match single_scalar(node) {
                    Ok(raw) => match raw.parse::<CppStd>() {
                        Ok(std) if !std.extensions() => min_cppstd = Some(std),
                        _ => errors.push(
                            CookParseError::new(*node.span(), "invalid minimum C++ standard")
                                .with_help("expected one of 98, 11, 14, 17, 20, 23"),
                        ),
                    },
                    Err(e) => errors.push(e),
                },

                "options" => {
                    for option in node.nodes() {
                        let (decl, err) = OptionDecl::parse_node_with_errors(option);
                        errors.extend(err);

                        if let Some(decl) = decl {
                            if options.iter().any(|o: &OptionDecl| o.name == decl.name) {
                                errors.push(
                                    CookParseError::new(*option.span(), "option declared twice")
                                        .with_label("second declaration here"),
                                );
                                continue;
                            }
                            options.push(decl);
                        }
                    }
                }

                "changelog" => {
                    for entry in node.nodes() {
                        let (entry, err) = ChangelogEntry::parse_node_with_errors(entry);
                        errors.extend(err);
                        changelog.extend(entry);
                    }
                }

                _ => errors.push(
                    CookParseError::new(*node.name().span(), "unknown recipe property"),
                ),
            }
        }

        let version = match version {
            Some(version) if !valid_component(&version) => {
                let span = version_span.unwrap_or(*input.span());
                errors.push(
                    CookParseError::new(span, "invalid recipe version").with_help(COMPONENT_HELP),
                );
                version
            }
            Some(version) => version,
            None => {
                errors.push(CookParseError::new(*input.span(), "recipe missing version"));
                "0.0.0".to_string()
            }
        };

        let recipe = Recipe {
            source_dir: source_dir.unwrap_or_else(|| ".".to_string()),
            config_file: config_file.unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string()),
            name,
            version,
            description,
            url,
            license,
            topics,
            settings,
            options,
            requires,
            base,
            generators,
            build_policy,
            min_cppstd,
            changelog,
            revision: recipe_revision(&without_trivia(input).to_string()),
        };

        (Some(recipe), errors)
    }
}

const COMPONENT_HELP: &str =
    "must start with a letter, digit or '_' and contain only letters, digits and '_+.-'";

/// Comments and blank lines around a node do not change what it declares.
fn without_trivia(node: &KdlNode) -> KdlNode {
    let mut node = node.clone();
    node.set_leading("");
    node.set_trailing("");
    node
}

fn reference_reason(err: CookError) -> &'static str {
    match err {
        CookError::InvalidReference { reason, .. } => reason,
        _ => "invalid reference",
    }
}

impl ParseNode for OptionDecl {
    fn parse_node_with_errors(input: &KdlNode) -> (Option<Self>, Vec<CookParseError>)
    where
        Self: Sized,
    {
        let name = input.name().value().to_string();
        let mut errors = vec![];

        let default = match input.entries() {
            [entry] if entry.name().is_none() => entry.value().clone(),
            _ => {
                errors.push(
                    CookParseError::new(*input.span(), "option expects exactly one default value")
                        .with_help(format!("for example: `{} false`", name)),
                );
                return (None, errors);
            }
        };

        let mut values: Option<Vec<String>> = None;
        for node in input.nodes() {
            match node.name().value() {
                "values" => {
                    parse_string_list_into!(node, values, errors, "option values");
                }
                _ => errors.push(CookParseError::new(
                    *node.name().span(),
                    "unknown option property",
                )),
            }
        }

        let (domain, default) = match (default, values) {
            (KdlValue::Bool(b), None) => (OptionDomain::Bool, OptionValue::Bool(b)),
            (KdlValue::String(s) | KdlValue::RawString(s), Some(values)) => {
                (OptionDomain::Choice(values), OptionValue::Choice(s))
            }
            (KdlValue::Bool(_), Some(_)) => {
                errors.push(CookParseError::new(
                    *input.span(),
                    "boolean options cannot declare values",
                ));
                return (None, errors);
            }
            _ => {
                errors.push(
                    CookParseError::new(*input.span(), "option default must be a bool or a string")
                        .with_help("string options must list their `values`"),
                );
                return (None, errors);
            }
        };

        if !domain.contains(&default) {
            errors.push(CookParseError::new(
                *input.span(),
                "default value is not part of the option's values",
            ));
            return (None, errors);
        }

        (
            Some(OptionDecl {
                name,
                domain,
                default,
            }),
            errors,
        )
    }
}

impl ParseNode for ChangelogEntry {
    fn parse_node_with_errors(input: &KdlNode) -> (Option<Self>, Vec<CookParseError>)
    where
        Self: Sized,
    {
        if input.name().value() != "entry" {
            return (
                None,
                vec![CookParseError::new(
                    *input.name().span(),
                    "changelog only contains `entry` nodes",
                )],
            );
        }

        let mut args: Vec<String> = vec![];
        let mut errors = vec![];
        parse_string_list_into!(input, args, errors, "changelog entry");

        match <[String; 2]>::try_from(args) {
            Ok([version, text]) => (Some(ChangelogEntry { version, text }), errors),
            Err(_) => {
                errors.push(
                    CookParseError::new(*input.span(), "changelog entry needs a version and a text")
                        .with_help("entry \"0.0.2\" \"what changed\""),
                );
                (None, errors)
            }
        }
    }
}

fn parse_typed_values<T>(
    input: &KdlNode,
    errors: &mut Vec<CookParseError>,
    kind: &'static str,
    parse: impl Fn(&str) -> Result<T, &'static str>,
) -> Vec<T> {
    let mut values = vec![];

    for entry in input.entries() {
        if entry.name().is_some() {
            errors.push(CookParseError::new(
                *entry.span(),
                "expected values, property found instead",
            ));
            continue;
        }

        match entry.value().as_string() {
            Some(raw) => match parse(raw) {
                Ok(v) => values.push(v),
                Err(help) => errors.push(CookParseError::new(*entry.span(), kind).with_help(help)),
            },
            None => errors.push(CookParseError::new(*entry.span(), "expected a string value")),
        }
    }

    values
}

fn span_of_entries(first: &KdlEntry, last: &KdlEntry) -> SourceSpan {
    let start = first.span().offset();
    let end = last.span().offset() + last.span().len();
    SourceSpan::new(start.into(), (end - start).into())
}

/// A single positional value rendered as a string; strings, integers and bools are accepted.
pub(crate) fn single_scalar(input: &KdlNode) -> Result<String, CookParseError> {
    match input.entries() {
        [] => Err(CookParseError::new(*input.name().span(), "value missing")),
        [entry] if entry.name().is_some() => Err(CookParseError::new(
            *entry.span(),
            "expected a value, property found instead",
        )),
        [entry] => match entry.value() {
            KdlValue::String(s) | KdlValue::RawString(s) => Ok(s.clone()),
            KdlValue::Base10(i) => Ok(i.to_string()),
            KdlValue::Bool(b) => Ok(b.to_string()),
            _ => Err(CookParseError::new(
                *entry.span(),
                "expected a string, integer or bool",
            )),
        },
        [first, .., last] => Err(CookParseError::new(
            span_of_entries(first, last),
            "only 1 value expected",
        )),
    }
}

pub(crate) fn extract_single_string_value(
    input: &KdlNode,
    missing_error: &'static str,
    wrong_type_error: &'static str,
    too_many_error: &'static str,
    property_found_error: &'static str,
) -> Result<String, CookParseError> {
    match input.entries() {
        [] => Err(CookParseError::new(*input.name().span(), missing_error)),

        [entry] => {
            if entry.name().is_some() {
                return Err(CookParseError::new(*entry.span(), property_found_error));
            }

            entry
                .value()
                .as_string()
                .map(ToString::to_string)
                .ok_or_else(|| CookParseError::new(*entry.span(), wrong_type_error))
        }

        [first, .., last] => Err(CookParseError::new(
            span_of_entries(first, last),
            too_many_error,
        )),
    }
}

pub(crate) fn extract_string_values(
    input: &KdlNode,
    wrong_type_error: &'static str,
    property_found_error: &'static str,
) -> Result<Vec<String>, CookParseError> {
    let mut values = vec![];

    for entry in input.entries() {
        if entry.name().is_some() {
            return Err(CookParseError::new(*entry.span(), property_found_error));
        }

        if let Some(v) = entry.value().as_string() {
            values.push(v.to_string());
        } else {
            return Err(CookParseError::new(*entry.span(), wrong_type_error));
        }
    }

    Ok(values)
}
