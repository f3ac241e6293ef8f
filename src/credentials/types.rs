//! Core types for credential configuration.

use std::fmt;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Reference to a configured credential.
///
/// # Serialization
///
/// - `Plaintext("value")` serializes as `"value"` (bare string)
/// - `None` serializes as `""` (empty string, TOML-safe)
/// - `Env { var }` serializes as `{ env = "VAR" }`
///
/// A bare string in config is read as `Plaintext` (non-empty) or `None`
/// (empty).
#[derive(Clone, PartialEq, Eq, Default)]
pub enum CredentialRef {
    /// Read from the named process environment variable at resolve time.
    Env {
        /// Environment variable name.
        var: String,
    },
    /// Value stored inline in the config file.
    Plaintext(String),
    /// No credential configured.
    #[default]
    None,
}

impl fmt::Debug for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env { var } => f.debug_struct("Env").field("var", var).finish(),
            Self::Plaintext(_) => f.write_str("Plaintext(<redacted>)"),
            Self::None => f.write_str("None"),
        }
    }
}

impl Serialize for CredentialRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CredentialRef::Plaintext(value) => serializer.serialize_str(value),
            CredentialRef::None => serializer.serialize_str(""),
            CredentialRef::Env { var } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("env", var)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for CredentialRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CredentialRefVisitor;

        impl<'de> Visitor<'de> for CredentialRefVisitor {
            type Value = CredentialRef;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a string or a map with an 'env' key")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<CredentialRef, E> {
                if value.is_empty() {
                    Ok(CredentialRef::None)
                } else {
                    Ok(CredentialRef::Plaintext(value.to_owned()))
                }
            }

            fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<CredentialRef, M::Error> {
                let mut var: Option<String> = Option::None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "env" => var = Some(map.next_value()?),
                        other => {
                            let _: de::IgnoredAny = map.next_value()?;
                            return Err(de::Error::unknown_field(other, &["env"]));
                        }
                    }
                }

                match var {
                    Some(var) if !var.trim().is_empty() => Ok(CredentialRef::Env { var }),
                    Some(_) => Err(de::Error::invalid_value(
                        de::Unexpected::Str(""),
                        &"a non-empty environment variable name",
                    )),
                    Option::None => Err(de::Error::missing_field("env")),
                }
            }
        }

        deserializer.deserialize_any(CredentialRefVisitor)
    }
}

impl CredentialRef {
    /// Check if this reference points to an actual credential.
    #[must_use]
    pub fn is_set(&self) -> bool {
        !matches!(self, CredentialRef::None)
    }
}

/// A resolved secret value. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the value for use in an outbound request.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, Serialize)]
    struct Holder {
        key: CredentialRef,
    }

    #[test]
    fn bare_string_is_plaintext() {
        let holder: Holder = toml::from_str(r#"key = "tvly-123""#).expect("parse");
        assert_eq!(holder.key, CredentialRef::Plaintext("tvly-123".into()));
    }

    #[test]
    fn empty_string_is_none() {
        let holder: Holder = toml::from_str(r#"key = """#).expect("parse");
        assert_eq!(holder.key, CredentialRef::None);
        assert!(!holder.key.is_set());
    }

    #[test]
    fn env_table_is_env_reference() {
        let holder: Holder = toml::from_str(r#"key = { env = "MY_TAVILY" }"#).expect("parse");
        assert_eq!(
            holder.key,
            CredentialRef::Env {
                var: "MY_TAVILY".into()
            }
        );
    }

    #[test]
    fn unknown_or_empty_env_key_rejected() {
        assert!(toml::from_str::<Holder>(r#"key = { service = "x" }"#).is_err());
        assert!(toml::from_str::<Holder>(r#"key = { env = "" }"#).is_err());
    }

    #[test]
    fn serializes_back_to_same_shapes() {
        let json = serde_json::to_string(&CredentialRef::Env { var: "A".into() }).expect("json");
        assert_eq!(json, r#"{"env":"A"}"#);
        let json = serde_json::to_string(&CredentialRef::None).expect("json");
        assert_eq!(json, r#""""#);
    }

    #[test]
    fn debug_redacts_values() {
        let debug = format!("{:?}", CredentialRef::Plaintext("sk-secret".into()));
        assert!(!debug.contains("sk-secret"));
        let debug = format!("{:?}", Secret::new("sk-secret"));
        assert!(!debug.contains("sk-secret"));
        assert_eq!(Secret::new("sk-secret").expose(), "sk-secret");
    }
}
