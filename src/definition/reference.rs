use crate::error::{CookError, CookResult};
use cook_utils::{ObjectTraversal, ObjectWalker};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A pinned package identity: `name/version[@user/channel][#revision]`.
///
/// Matching is always exact; two references designate the same package only when every
/// component they both carry is byte-equal.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PackageReference {
    pub name: String,
    pub version: String,
    pub user: Option<String>,
    pub channel: Option<String>,
    pub revision: Option<String>,
}

impl PackageReference {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        PackageReference {
            name: name.into(),
            version: version.into(),
            user: None,
            channel: None,
            revision: None,
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// The reference without its revision pin.
    pub fn unpinned(&self) -> PackageReference {
        PackageReference {
            revision: None,
            ..self.clone()
        }
    }
}

pub(crate) fn valid_component(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '.' | '-'))
}

impl FromStr for PackageReference {
    type Err = CookError;

    fn from_str(input: &str) -> CookResult<Self> {
        let invalid = |reason| CookError::InvalidReference {
            input: input.to_string(),
            reason,
        };

        let (body, revision) = match input.split_once('#') {
            Some((body, rev)) => {
                if rev.is_empty() || !rev.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(invalid("revision must be a non-empty alphanumeric string"));
                }
                (body, Some(rev.to_string()))
            }
            None => (input, None),
        };

        let (name_version, user_channel) = match body.split_once('@') {
            Some((nv, uc)) => (nv, Some(uc)),
            None => (body, None),
        };

        let (name, version) = name_version
            .split_once('/')
            .ok_or_else(|| invalid("expected name/version"))?;

        if !valid_component(name) {
            return Err(invalid("invalid package name"));
        }

        if !valid_component(version) {
            return Err(invalid("invalid version"));
        }

        let (user, channel) = match user_channel {
            Some(uc) => {
                let (user, channel) = uc
                    .split_once('/')
                    .ok_or_else(|| invalid("expected user/channel after '@'"))?;

                if !valid_component(user) || !valid_component(channel) {
                    return Err(invalid("invalid user or channel"));
                }

                (Some(user.to_string()), Some(channel.to_string()))
            }
            None => (None, None),
        };

        Ok(PackageReference {
            name: name.to_string(),
            version: version.to_string(),
            user,
            channel,
            revision,
        })
    }
}

impl Display for PackageReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.version)?;

        if let (Some(user), Some(channel)) = (&self.user, &self.channel) {
            write!(f, "@{}/{}", user, channel)?;
        }

        if let Some(revision) = &self.revision {
            write!(f, "#{}", revision)?;
        }

        Ok(())
    }
}

// References are identities; templating must never rewrite them.
impl ObjectTraversal for PackageReference {
    fn traverse<T: ObjectWalker>(&mut self, _walker: &mut T) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_reference() {
        let r: PackageReference = "shred_conan_base/0.0.1@adnn/develop#ab12".parse().unwrap();
        assert_eq!(r.name, "shred_conan_base");
        assert_eq!(r.version, "0.0.1");
        assert_eq!(r.user.as_deref(), Some("adnn"));
        assert_eq!(r.channel.as_deref(), Some("develop"));
        assert_eq!(r.revision.as_deref(), Some("ab12"));
        assert_eq!(r.to_string(), "shred_conan_base/0.0.1@adnn/develop#ab12");
    }

    #[test]
    fn parses_bare_reference() {
        let r: PackageReference = "zlib/1.2.13".parse().unwrap();
        assert_eq!(r, PackageReference::new("zlib", "1.2.13"));
        assert_eq!(r.to_string(), "zlib/1.2.13");
    }

    #[test]
    fn rejects_malformed_references() {
        for input in ["zlib", "zlib/", "/1.0", "zlib/1.0@adnn", "zlib/1.0#", "zlib/1.0#a-b", "-x/1.0"] {
            assert!(
                matches!(
                    input.parse::<PackageReference>(),
                    Err(CookError::InvalidReference { .. })
                ),
                "{} should be rejected",
                input
            );
        }
    }

    #[test]
    fn unpinned_drops_only_the_revision() {
        let pinned: PackageReference = "math/1.0@adnn/develop#1".parse().unwrap();
        let unpinned = pinned.unpinned();
        assert_eq!(unpinned.to_string(), "math/1.0@adnn/develop");
        assert_ne!(pinned, unpinned);
    }
}
