use crate::definition::parsing::{single_scalar, CookParseError, GetNodes, ParseDocument};
use kdl::KdlDocument;

/// Settings and option values applied before command line overrides.
///
/// ```kdl
/// settings {
///     os "Linux"
///     compiler "gcc"
///     compiler.version "11"
/// }
/// options {
///     build_tests true
/// }
/// ```
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Profile {
    pub settings: Vec<(String, String)>,
    pub options: Vec<(String, String)>,
}

impl Profile {
    /// Appends `other` so that its entries take precedence.
    pub fn extend(&mut self, other: Profile) {
        self.settings.extend(other.settings);
        self.options.extend(other.options);
    }

    pub fn settings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.settings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn options(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl ParseDocument for Profile {
    fn parse_document_with_errors(input: &KdlDocument) -> (Option<Self>, Vec<CookParseError>)
    where
        Self: Sized,
    {
        let mut profile = Profile::default();
        let mut errors = vec![];

        for node in input.nodes() {
            let target = match node.name().value() {
                "settings" => &mut profile.settings,
                "options" => &mut profile.options,
                _ => {
                    errors.push(
                        CookParseError::new(*node.name().span(), "unknown profile section")
                            .with_help("expected `settings` or `options`"),
                    );
                    continue;
                }
            };

            for entry in node.nodes() {
                match single_scalar(entry) {
                    Ok(value) => target.push((entry.name().value().to_string(), value)),
                    Err(e) => errors.push(e),
                }
            }
        }

        (Some(profile), errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections() {
        let source = r#"
settings {
    os "Linux"
    compiler "gcc"
    compiler.version 11
}
options {
    build_tests true
}
"#;
        let profile = Profile::parse_source(source, None).unwrap();
        assert_eq!(
            profile.settings().collect::<Vec<_>>(),
            vec![("os", "Linux"), ("compiler", "gcc"), ("compiler.version", "11")]
        );
        assert_eq!(
            profile.options().collect::<Vec<_>>(),
            vec![("build_tests", "true")]
        );
    }

    #[test]
    fn rejects_unknown_sections() {
        assert!(Profile::parse_source("env { CC \"gcc\" }", None).is_err());
    }

    #[test]
    fn extend_keeps_later_entries_last() {
        let mut base = Profile {
            settings: vec![("os".into(), "Linux".into())],
            options: vec![],
        };
        base.extend(Profile {
            settings: vec![("os".into(), "Macos".into())],
            options: vec![("shared".into(), "True".into())],
        });
        assert_eq!(base.settings.last().unwrap().1, "Macos");
        assert_eq!(base.options.len(), 1);
    }
}
