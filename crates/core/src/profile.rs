//! Backend profiles.
//!
//! A profile is the validated form of one backend section: which dialect to speak, where the
//! server lives, and how requests authenticate. Profiles are resolved once when a connection is
//! established and never re-read afterwards.

use crate::config::BackendSection;
use crate::constants::{DEFAULT_API_KEY_FIELD, DEFAULT_CERT_BUNDLE};
use crate::dialect::DialectKind;
use crate::{CoreError, CoreResult};
use seneca_types::NonEmptyText;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

/// How requests to a backend authenticate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthStrategy {
    /// No credentials beyond the configured headers.
    None,
    /// HTTP basic auth with a username and password read from the secret store.
    Basic {
        vault_path: String,
        user_field: String,
        password_field: String,
    },
    /// An API key header read from the secret store, with a pinned certificate bundle.
    Token {
        vault_path: String,
        key_field: String,
        cert_bundle: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AuthKind {
    None,
    Basic,
    Token,
}

impl FromStr for AuthKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(AuthKind::None),
            "basic" => Ok(AuthKind::Basic),
            "token" => Ok(AuthKind::Token),
            other => Err(CoreError::Configuration(format!(
                "unrecognised auth_type '{other}' (expected basic, token or none)"
            ))),
        }
    }
}

/// A validated backend configuration.
#[derive(Clone, Debug)]
pub struct BackendProfile {
    id: NonEmptyText,
    dialect: DialectKind,
    fhir_root: Url,
    service_root: Option<Url>,
    lookup_path: Option<String>,
    headers: BTreeMap<String, String>,
    auth: AuthStrategy,
}

impl BackendProfile {
    /// Validate a backend section into a profile.
    ///
    /// # Arguments
    ///
    /// * `id` - Backend identifier the section was stored under.
    /// * `section` - Raw section as read from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if a required field is missing, a URL does not
    /// parse, the dialect is unknown, or the auth strategy is unrecognised.
    pub fn resolve(id: &str, section: &BackendSection) -> CoreResult<Self> {
        let id = NonEmptyText::new(id)
            .map_err(|_| CoreError::Configuration("backend id cannot be empty".into()))?;

        let fhir_root_raw = required(&id, "url_root_fhir", &section.url_root_fhir)?;
        let fhir_root = parse_root(&id, "url_root_fhir", fhir_root_raw)?;
        let service_root = section
            .url_root_service
            .as_deref()
            .map(|raw| parse_root(&id, "url_root_service", raw))
            .transpose()?;

        let dialect = required(&id, "conn_type", &section.conn_type)?.parse::<DialectKind>()?;
        let auth = resolve_auth(&id, section)?;

        Ok(Self {
            id,
            dialect,
            fhir_root,
            service_root,
            lookup_path: section.lookup_path.clone(),
            headers: section.headers.clone(),
            auth,
        })
    }

    pub fn id(&self) -> &NonEmptyText {
        &self.id
    }

    pub fn dialect(&self) -> DialectKind {
        self.dialect
    }

    pub fn fhir_root(&self) -> &Url {
        &self.fhir_root
    }

    pub fn service_root(&self) -> Option<&Url> {
        self.service_root.as_ref()
    }

    pub fn lookup_path(&self) -> Option<&str> {
        self.lookup_path.as_deref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn auth(&self) -> &AuthStrategy {
        &self.auth
    }
}

fn required<'a>(
    id: &NonEmptyText,
    field: &str,
    value: &'a Option<String>,
) -> CoreResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CoreError::Configuration(format!("backend '{id}' is missing {field}")))
}

fn parse_root(id: &NonEmptyText, field: &str, raw: &str) -> CoreResult<Url> {
    Url::parse(raw.trim()).map_err(|e| {
        CoreError::Configuration(format!("backend '{id}' has an invalid {field}: {e}"))
    })
}

fn resolve_auth(id: &NonEmptyText, section: &BackendSection) -> CoreResult<AuthStrategy> {
    let kind = required(id, "auth_type", &section.auth_type)?.parse::<AuthKind>()?;

    match kind {
        AuthKind::None => Ok(AuthStrategy::None),
        AuthKind::Basic => Ok(AuthStrategy::Basic {
            vault_path: required(id, "api_vault_path", &section.api_vault_path)?.to_owned(),
            user_field: required(id, "user_id_field", &section.user_id_field)?.to_owned(),
            password_field: required(id, "pwd_field", &section.pwd_field)?.to_owned(),
        }),
        AuthKind::Token => Ok(AuthStrategy::Token {
            vault_path: required(id, "api_vault_path", &section.api_vault_path)?.to_owned(),
            key_field: section
                .api_key_field
                .clone()
                .unwrap_or_else(|| DEFAULT_API_KEY_FIELD.to_owned()),
            cert_bundle: section
                .cert_bundle
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CERT_BUNDLE)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hapi_section() -> BackendSection {
        BackendSection {
            url_root_fhir: Some("https://hapi.example.org/".into()),
            conn_type: Some("hapi".into()),
            auth_type: Some("Basic".into()),
            user_id_field: Some("username".into()),
            pwd_field: Some("password".into()),
            api_vault_path: Some("fhir/hapi".into()),
            ..BackendSection::default()
        }
    }

    #[test]
    fn resolves_basic_profile() {
        let profile = BackendProfile::resolve("hapi_prod", &hapi_section()).expect("resolve");

        assert_eq!(profile.id().as_str(), "hapi_prod");
        assert_eq!(profile.dialect(), DialectKind::Hapi);
        assert_eq!(profile.fhir_root().as_str(), "https://hapi.example.org/");
        assert_eq!(
            profile.auth(),
            &AuthStrategy::Basic {
                vault_path: "fhir/hapi".into(),
                user_field: "username".into(),
                password_field: "password".into(),
            }
        );
    }

    #[test]
    fn token_profile_uses_defaults() {
        let section = BackendSection {
            url_root_fhir: Some("https://epic.example.org/api/".into()),
            url_root_service: Some("https://epic.example.org/service".into()),
            conn_type: Some("EPIC".into()),
            auth_type: Some("token".into()),
            api_vault_path: Some("fhir/epic".into()),
            ..BackendSection::default()
        };

        let profile = BackendProfile::resolve("epic", &section).expect("resolve");

        assert_eq!(profile.dialect(), DialectKind::Epic);
        assert!(profile.service_root().is_some());
        match profile.auth() {
            AuthStrategy::Token {
                key_field,
                cert_bundle,
                ..
            } => {
                assert_eq!(key_field, "apikey");
                assert_eq!(cert_bundle, &PathBuf::from("gitlab-bundle.pem"));
            }
            other => panic!("expected token auth, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_auth_strategy() {
        let mut section = hapi_section();
        section.auth_type = Some("kerberos".into());

        let err = BackendProfile::resolve("hapi_prod", &section).expect_err("should fail");
        match err {
            CoreError::Configuration(msg) => assert!(msg.contains("kerberos")),
            other => panic!("expected Configuration error, got {other:?}"),
        }
    }

    #[test]
    fn basic_auth_requires_vault_fields() {
        let mut section = hapi_section();
        section.pwd_field = None;

        let err = BackendProfile::resolve("hapi_prod", &section).expect_err("should fail");
        match err {
            CoreError::Configuration(msg) => assert!(msg.contains("pwd_field")),
            other => panic!("expected Configuration error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_root_url() {
        let mut section = hapi_section();
        section.url_root_fhir = Some("not a url".into());

        let err = BackendProfile::resolve("hapi_prod", &section).expect_err("should fail");
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[test]
    fn auth_none_needs_no_vault() {
        let section = BackendSection {
            url_root_fhir: Some("http://localhost:8080/".into()),
            conn_type: Some("hapi".into()),
            auth_type: Some("none".into()),
            ..BackendSection::default()
        };

        let profile = BackendProfile::resolve("local", &section).expect("resolve");
        assert_eq!(profile.auth(), &AuthStrategy::None);
    }
}
