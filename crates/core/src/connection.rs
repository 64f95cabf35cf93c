//! Backend connections.
//!
//! A `Connection` binds a resolved profile to its dialect and an authenticated transport. All
//! retrieval goes through it, so request parameters are computed exactly once, when the
//! connection is established.

use crate::config::BackendConfigSource;
use crate::dialect::{Dialect, LookupCall};
use crate::fetcher::PageFetcher;
use crate::profile::BackendProfile;
use crate::secrets::SecretStore;
use crate::transport::{HttpTransport, RequestParams, Transport};
use crate::{CoreError, CoreResult};
use serde_json::Value;
use url::Url;

pub struct Connection {
    profile: BackendProfile,
    dialect: Box<dyn Dialect>,
    transport: Box<dyn Transport>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("profile", &self.profile)
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Establish a connection to a configured backend.
    ///
    /// Resolves the backend's profile, reads its credentials from `secrets`, and builds an
    /// HTTP transport carrying them.
    ///
    /// # Arguments
    ///
    /// * `config` - Source of backend sections.
    /// * `backend_id` - Key of the backend to connect to.
    /// * `secrets` - Store holding the backend's credentials.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if the backend is unknown or its section is invalid
    /// (including an unrecognised auth strategy), [`CoreError::Secret`] if credentials cannot be
    /// read, and [`CoreError::FileRead`] if a pinned certificate bundle is missing.
    pub fn establish(
        config: &dyn BackendConfigSource,
        backend_id: &str,
        secrets: &dyn SecretStore,
    ) -> CoreResult<Self> {
        let section = config.section(backend_id)?;
        let profile = BackendProfile::resolve(backend_id, &section)?;
        let params = RequestParams::resolve(&profile, secrets)?;
        let transport = HttpTransport::new(&params)?;

        tracing::info!(
            "connected to backend {} ({} dialect) at {}",
            profile.id(),
            profile.dialect(),
            profile.fhir_root()
        );

        Ok(Self::with_transport(profile, Box::new(transport)))
    }

    /// Build a connection over an arbitrary transport.
    pub fn with_transport(profile: BackendProfile, transport: Box<dyn Transport>) -> Self {
        let dialect = profile.dialect().dialect();
        Self {
            profile,
            dialect,
            transport,
        }
    }

    pub fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Search URL for `resource_type` under this backend's dialect.
    pub fn build_url(&self, resource_type: &str, query: &[(&str, String)]) -> CoreResult<Url> {
        self.dialect
            .build_url(self.profile.fhir_root(), resource_type, query)
    }

    /// Read URL for a single resource.
    pub fn read_url(&self, resource_type: &str, id: &str) -> CoreResult<Url> {
        self.dialect
            .read_url(self.profile.fhir_root(), resource_type, id)
    }

    /// Resolve a bundle's `next` link relative to the search that produced it.
    pub fn resolve_next_url(&self, request_url: &Url, next_link: &str) -> CoreResult<Url> {
        self.dialect
            .resolve_next_url(self.profile.fhir_root(), request_url, next_link)
    }

    /// GET a JSON document using this connection's credentials.
    pub fn get_json(&self, url: &Url) -> CoreResult<Value> {
        self.transport.get_json(url)
    }

    /// Read one resource by type and id.
    pub fn read(&self, resource_type: &str, id: &str) -> CoreResult<Value> {
        let url = self.read_url(resource_type, id)?;
        self.get_json(&url)
    }

    /// Start a paged search. Nothing is requested until the fetcher is iterated.
    pub fn search(
        &self,
        resource_type: &str,
        query: &[(&str, String)],
    ) -> CoreResult<PageFetcher<'_>> {
        let url = self.build_url(resource_type, query)?;
        Ok(PageFetcher::new(self, resource_type, url))
    }

    /// Map an identifier such as an MRN to this backend's patient id.
    ///
    /// # Arguments
    ///
    /// * `identifier` - The patient's external identifier.
    /// * `scope` - Identifier scope passed to lookup services that need one. Ignored by
    ///   dialects that search by identifier directly.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Lookup`] if the request fails or the response carries no patient id.
    pub fn lookup_patient_id(&self, identifier: &str, scope: Option<&str>) -> CoreResult<String> {
        let call = self
            .dialect
            .patient_lookup(&self.profile, identifier, scope)?;

        let response = match &call {
            LookupCall::Get(url) => self.transport.get_json(url),
            LookupCall::Post { url, body } => self.transport.post_json(url, body),
        }
        .map_err(|e| CoreError::Lookup(format!("identifier {identifier}: {e}")))?;

        let id = self.dialect.patient_id_from(&response).ok_or_else(|| {
            CoreError::Lookup(format!("no patient found for identifier {identifier}"))
        })?;

        tracing::debug!("resolved identifier {} to patient {}", identifier, id);
        Ok(id)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::BackendSection;
    use crate::transport::testing::FakeTransport;

    pub(crate) const HAPI_ROOT: &str = "https://hapi.example.org/";

    pub(crate) fn hapi_connection(transport: FakeTransport) -> Connection {
        let section = BackendSection {
            url_root_fhir: Some(HAPI_ROOT.into()),
            conn_type: Some("hapi".into()),
            auth_type: Some("none".into()),
            ..BackendSection::default()
        };
        let profile = BackendProfile::resolve("hapi_test", &section).expect("profile");
        Connection::with_transport(profile, Box::new(transport))
    }
}
