//! Backend dialects.
//!
//! The two supported backends agree on FHIR resources but disagree on where they live and how
//! their `next` links should be followed:
//!
//! - **Epic**: each resource type has its own endpoint, `<root>/epicfhir<type lower>/r4`.
//!   Next links are resolved by keeping the first request URL and swapping in the query
//!   string of the link. Patient ids come from a separate identifier service.
//! - **HAPI**: resources live under `/fhir/<Type>` on the server root. Next links are resolved
//!   by applying the link's query string to `<root>/fhir`. Patient ids come from an
//!   `identifier` search.

use crate::constants::FHIR_IDENTIFIER_TYPE;
use crate::profile::BackendProfile;
use crate::{CoreError, CoreResult};
use serde_json::{json, Value};
use std::str::FromStr;
use url::Url;

/// Which dialect a backend speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DialectKind {
    Epic,
    Hapi,
}

impl DialectKind {
    pub fn dialect(self) -> Box<dyn Dialect> {
        match self {
            DialectKind::Epic => Box::new(EpicDialect),
            DialectKind::Hapi => Box::new(HapiDialect),
        }
    }
}

impl FromStr for DialectKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "epic" => Ok(DialectKind::Epic),
            "hapi" => Ok(DialectKind::Hapi),
            other => Err(CoreError::Configuration(format!(
                "unrecognised conn_type '{other}' (expected epic or hapi)"
            ))),
        }
    }
}

impl std::fmt::Display for DialectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DialectKind::Epic => write!(f, "epic"),
            DialectKind::Hapi => write!(f, "hapi"),
        }
    }
}

/// The request a dialect needs made to turn an identifier into a patient id.
#[derive(Clone, Debug, PartialEq)]
pub enum LookupCall {
    Get(Url),
    Post { url: Url, body: Value },
}

/// URL construction and identifier lookup rules for one backend family.
///
/// Dialects are pure: they build URLs and interpret responses but never perform I/O.
pub trait Dialect: std::fmt::Debug + Send + Sync {
    fn kind(&self) -> DialectKind;

    /// Build a search URL for `resource_type` with the given query parameters appended in order.
    fn build_url(&self, root: &Url, resource_type: &str, query: &[(&str, String)])
        -> CoreResult<Url>;

    /// Build the URL that reads a single resource by id.
    fn read_url(&self, root: &Url, resource_type: &str, id: &str) -> CoreResult<Url> {
        let mut url = self.build_url(root, resource_type, &[])?;
        url.path_segments_mut()
            .map_err(|_| {
                CoreError::Configuration(format!("cannot append a resource id to {root}"))
            })?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }

    /// Resolve a raw `next` link into the URL the next page should be requested from.
    ///
    /// # Arguments
    ///
    /// * `root` - Backend FHIR root.
    /// * `request_url` - URL of the first page of this search.
    /// * `next_link` - The `url` of the bundle's `next` link, absolute or relative.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Parse`] if the link carries no query string.
    fn resolve_next_url(&self, root: &Url, request_url: &Url, next_link: &str) -> CoreResult<Url>;

    /// Describe the request that maps `identifier` to a FHIR patient id.
    fn patient_lookup(
        &self,
        profile: &BackendProfile,
        identifier: &str,
        scope: Option<&str>,
    ) -> CoreResult<LookupCall>;

    /// Pull the patient id out of a lookup response.
    fn patient_id_from(&self, response: &Value) -> Option<String>;
}

fn append_query(url: &mut Url, query: &[(&str, String)]) {
    if query.is_empty() {
        return;
    }
    let mut pairs = url.query_pairs_mut();
    for (key, value) in query {
        pairs.append_pair(key, value);
    }
}

fn next_link_query(request_url: &Url, next_link: &str) -> CoreResult<String> {
    let resolved = Url::parse(next_link).or_else(|_| request_url.join(next_link))?;
    resolved
        .query()
        .filter(|q| !q.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| CoreError::parse("next link", format!("'{next_link}' has no query string")))
}

/// Epic interconnect dialect.
#[derive(Clone, Copy, Debug, Default)]
pub struct EpicDialect;

impl Dialect for EpicDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Epic
    }

    fn build_url(
        &self,
        root: &Url,
        resource_type: &str,
        query: &[(&str, String)],
    ) -> CoreResult<Url> {
        let mut url = root.join(&format!("epicfhir{}/r4", resource_type.to_lowercase()))?;
        append_query(&mut url, query);
        Ok(url)
    }

    fn resolve_next_url(&self, _root: &Url, request_url: &Url, next_link: &str) -> CoreResult<Url> {
        let query = next_link_query(request_url, next_link)?;
        let mut url = request_url.clone();
        url.set_query(Some(&query));
        Ok(url)
    }

    fn patient_lookup(
        &self,
        profile: &BackendProfile,
        identifier: &str,
        scope: Option<&str>,
    ) -> CoreResult<LookupCall> {
        let service_root = profile.service_root().ok_or_else(|| {
            CoreError::Configuration(format!(
                "backend '{}' has no url_root_service for patient lookup",
                profile.id()
            ))
        })?;
        let url = match profile.lookup_path() {
            Some(path) => service_root.join(path)?,
            None => service_root.clone(),
        };

        let mut body = json!({
            "PatientID": identifier,
            "PatientIDType": "MRN",
        });
        if let (Some(scope), Some(obj)) = (scope, body.as_object_mut()) {
            obj.insert("ScopeID".into(), Value::String(scope.to_owned()));
        }

        Ok(LookupCall::Post { url, body })
    }

    fn patient_id_from(&self, response: &Value) -> Option<String> {
        response
            .get("Identifiers")?
            .as_array()?
            .iter()
            .filter(|item| item.get("IDType").and_then(Value::as_str) == Some(FHIR_IDENTIFIER_TYPE))
            .filter_map(|item| item.get("ID").and_then(Value::as_str))
            .last()
            .map(str::to_owned)
    }
}

/// HAPI FHIR server dialect.
#[derive(Clone, Copy, Debug, Default)]
pub struct HapiDialect;

impl Dialect for HapiDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Hapi
    }

    fn build_url(
        &self,
        root: &Url,
        resource_type: &str,
        query: &[(&str, String)],
    ) -> CoreResult<Url> {
        let mut url = root.join(&format!("/fhir/{resource_type}"))?;
        append_query(&mut url, query);
        Ok(url)
    }

    fn resolve_next_url(&self, root: &Url, request_url: &Url, next_link: &str) -> CoreResult<Url> {
        let query = next_link_query(request_url, next_link)?;
        let mut url = root.join("/fhir")?;
        url.set_query(Some(&query));
        Ok(url)
    }

    fn patient_lookup(
        &self,
        profile: &BackendProfile,
        identifier: &str,
        _scope: Option<&str>,
    ) -> CoreResult<LookupCall> {
        let url = self.build_url(
            profile.fhir_root(),
            "Patient",
            &[("identifier", identifier.to_owned())],
        )?;
        Ok(LookupCall::Get(url))
    }

    fn patient_id_from(&self, response: &Value) -> Option<String> {
        response
            .get("entry")?
            .get(0)?
            .get("resource")?
            .get("id")?
            .as_str()
            .map(str::to_owned)
    }
}
