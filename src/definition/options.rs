use crate::error::{CookError, CookResult};
use cook_utils::{ObjectTraversal, ObjectWalker};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum OptionDomain {
    Bool,
    Choice(Vec<String>),
}

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum OptionValue {
    Bool(bool),
    Choice(String),
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            OptionValue::Choice(_) => None,
        }
    }
}

/// Booleans render the way CMake scripts written for these recipes expect them: `True`/`False`.
impl Display for OptionValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionValue::Bool(true) => f.write_str("True"),
            OptionValue::Bool(false) => f.write_str("False"),
            OptionValue::Choice(c) => f.write_str(c),
        }
    }
}

impl OptionDomain {
    pub fn parse_value(&self, raw: &str) -> Option<OptionValue> {
        match self {
            OptionDomain::Bool => {
                if raw.eq_ignore_ascii_case("true") {
                    Some(OptionValue::Bool(true))
                } else if raw.eq_ignore_ascii_case("false") {
                    Some(OptionValue::Bool(false))
                } else {
                    None
                }
            }
            OptionDomain::Choice(choices) => choices
                .iter()
                .find(|c| c.as_str() == raw)
                .map(|c| OptionValue::Choice(c.clone())),
        }
    }

    pub fn contains(&self, value: &OptionValue) -> bool {
        match (self, value) {
            (OptionDomain::Bool, OptionValue::Bool(_)) => true,
            (OptionDomain::Choice(choices), OptionValue::Choice(c)) => choices.contains(c),
            _ => false,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            OptionDomain::Bool => "True, False".to_string(),
            OptionDomain::Choice(choices) => choices.join(", "),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OptionDecl {
    pub name: String,
    pub domain: OptionDomain,
    pub default: OptionValue,
}

impl ObjectTraversal for OptionDecl {
    fn traverse<T: ObjectWalker>(&mut self, _walker: &mut T) {}
}

/// Option values for one evaluation; every value belongs to its declared domain.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct OptionSet {
    values: BTreeMap<String, OptionValue>,
}

impl OptionSet {
    /// Starts from the declared defaults and applies `overrides` in order, so later entries win.
    pub fn resolve<'a, I>(declared: &[OptionDecl], overrides: I) -> CookResult<OptionSet>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut values = BTreeMap::new();

        for decl in declared {
            values.insert(decl.name.clone(), decl.default.clone());
        }

        for (name, raw) in overrides {
            let decl = declared
                .iter()
                .find(|d| d.name == name)
                .ok_or_else(|| CookError::UnknownOption {
                    name: name.to_string(),
                    known: declared
                        .iter()
                        .map(|d| d.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                })?;

            let value = decl
                .domain
                .parse_value(raw)
                .ok_or_else(|| CookError::InvalidOptionValue {
                    name: name.to_string(),
                    value: raw.to_string(),
                    domain: decl.domain.describe(),
                })?;

            values.insert(decl.name.clone(), value);
        }

        Ok(OptionSet { values })
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    /// Value of a boolean option, `false` when undeclared.
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(OptionValue::as_bool).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn math_options() -> Vec<OptionDecl> {
        vec![
            OptionDecl {
                name: "shared".to_string(),
                domain: OptionDomain::Bool,
                default: OptionValue::Bool(false),
            },
            OptionDecl {
                name: "build_tests".to_string(),
                domain: OptionDomain::Bool,
                default: OptionValue::Bool(false),
            },
        ]
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let set = OptionSet::resolve(&math_options(), std::iter::empty()).unwrap();
        assert!(!set.flag("shared"));
        assert!(!set.flag("build_tests"));
    }

    #[test]
    fn overrides_are_independent() {
        for (shared, tests) in [("True", "False"), ("false", "true"), ("true", "true")] {
            let set =
                OptionSet::resolve(&math_options(), [("shared", shared), ("build_tests", tests)])
                    .unwrap();
            assert_eq!(set.flag("shared"), shared.eq_ignore_ascii_case("true"));
            assert_eq!(set.flag("build_tests"), tests.eq_ignore_ascii_case("true"));
        }
    }

    #[test]
    fn later_override_wins() {
        let set = OptionSet::resolve(
            &math_options(),
            [("build_tests", "true"), ("build_tests", "false")],
        )
        .unwrap();
        assert!(!set.flag("build_tests"));
    }

    #[test]
    fn out_of_domain_value_is_rejected() {
        let err = OptionSet::resolve(&math_options(), [("build_tests", "maybe")]).unwrap_err();
        assert!(matches!(
            err,
            CookError::InvalidOptionValue { ref name, ref value, .. }
                if name == "build_tests" && value == "maybe"
        ));
    }

    #[test]
    fn unknown_option_is_rejected() {
        let err = OptionSet::resolve(&math_options(), [("fPIC", "True")]).unwrap_err();
        assert!(matches!(err, CookError::UnknownOption { ref name, .. } if name == "fPIC"));
    }

    #[test]
    fn choice_domain() {
        let decls = vec![OptionDecl {
            name: "backend".to_string(),
            domain: OptionDomain::Choice(vec!["sse".to_string(), "neon".to_string()]),
            default: OptionValue::Choice("sse".to_string()),
        }];
        let set = OptionSet::resolve(&decls, [("backend", "neon")]).unwrap();
        assert_eq!(set.get("backend").unwrap().to_string(), "neon");
        assert!(OptionSet::resolve(&decls, [("backend", "avx")]).is_err());
    }

    #[test]
    fn bools_render_capitalized() {
        assert_eq!(OptionValue::Bool(true).to_string(), "True");
        assert_eq!(OptionValue::Bool(false).to_string(), "False");
    }
}
