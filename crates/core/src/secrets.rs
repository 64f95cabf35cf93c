//! Secret store collaborators.
//!
//! Credentials never live in the backend configuration. A profile names a vault path and the
//! fields to read; the store is asked for those fields under a path scoped to the operating user.

use crate::constants::SECRET_ENV_PREFIX;
use crate::{CoreError, CoreResult};
use seneca_types::NonEmptyText;

/// Read-only access to named secret fields.
pub trait SecretStore {
    /// The user whose scope secret paths are resolved under.
    fn user(&self) -> &str;

    /// Read one field at an already-scoped path.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Secret`] if the field is not available.
    fn read_field(&self, path: &str, field: &str) -> CoreResult<String>;
}

/// Scope a vault path to a user: `<user lower-cased>/<vault path>`.
pub fn scoped_secret_path(user: &str, vault_path: &str) -> String {
    format!(
        "{}/{}",
        user.to_lowercase(),
        vault_path.trim_start_matches('/')
    )
}

/// Secrets served from process environment variables.
///
/// A field at `alice/fhir/hapi` named `password` is read from
/// `SENECA_SECRET__ALICE_FHIR_HAPI__PASSWORD`. The environment is only consulted when a
/// connection is established.
#[derive(Clone, Debug)]
pub struct EnvSecretStore {
    user: NonEmptyText,
}

impl EnvSecretStore {
    pub fn new(user: NonEmptyText) -> Self {
        Self { user }
    }

    /// Environment variable name that holds `field` at `path`.
    pub fn variable_name(path: &str, field: &str) -> String {
        format!(
            "{SECRET_ENV_PREFIX}__{}__{}",
            env_segment(path),
            env_segment(field)
        )
    }
}

fn env_segment(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

impl SecretStore for EnvSecretStore {
    fn user(&self) -> &str {
        self.user.as_str()
    }

    fn read_field(&self, path: &str, field: &str) -> CoreResult<String> {
        let name = Self::variable_name(path, field);
        std::env::var(&name).map_err(|e| CoreError::Secret {
            path: path.to_owned(),
            field: field.to_owned(),
            message: format!("{name}: {e}"),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;

    /// In-memory store keyed by `(scoped path, field)`.
    pub(crate) struct MapSecretStore {
        pub(crate) user: String,
        pub(crate) fields: HashMap<(String, String), String>,
    }

    impl MapSecretStore {
        pub(crate) fn new(user: &str) -> Self {
            Self {
                user: user.to_owned(),
                fields: HashMap::new(),
            }
        }

        pub(crate) fn with(mut self, path: &str, field: &str, value: &str) -> Self {
            self.fields
                .insert((path.to_owned(), field.to_owned()), value.to_owned());
            self
        }
    }

    impl SecretStore for MapSecretStore {
        fn user(&self) -> &str {
            &self.user
        }

        fn read_field(&self, path: &str, field: &str) -> CoreResult<String> {
            self.fields
                .get(&(path.to_owned(), field.to_owned()))
                .cloned()
                .ok_or_else(|| CoreError::Secret {
                    path: path.to_owned(),
                    field: field.to_owned(),
                    message: "not found".into(),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_path_to_lowercased_user() {
        assert_eq!(scoped_secret_path("Alice", "fhir/hapi"), "alice/fhir/hapi");
        assert_eq!(scoped_secret_path("bob", "/fhir/epic"), "bob/fhir/epic");
    }

    #[test]
    fn env_variable_names_are_normalised() {
        assert_eq!(
            EnvSecretStore::variable_name("alice/fhir-hapi", "pwd"),
            "SENECA_SECRET__ALICE_FHIR_HAPI__PWD"
        );
    }

    #[test]
    fn missing_env_secret_is_secret_error() {
        let store = EnvSecretStore::new(NonEmptyText::new("nobody").expect("user"));
        let err = store
            .read_field("nobody/seneca-test-absent", "field-that-is-never-set")
            .expect_err("should fail");
        match err {
            CoreError::Secret { field, .. } => assert_eq!(field, "field-that-is-never-set"),
            other => panic!("expected Secret error, got {other:?}"),
        }
    }
}
