//! FHIR search Bundle wire model and pagination link extraction.
//!
//! Entries are handed on as raw JSON so each resource can be parsed by its own module, and so
//! a malformed entry does not prevent reading the paging links.

use crate::{expect_resource_type, strict, FhirResult};
use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// Public domain-level types
// ============================================================================

/// One page of search results.
#[derive(Clone, Debug, PartialEq)]
pub struct BundleData {
    /// Raw `entry[].resource` payloads in server order.
    pub entries: Vec<Value>,

    /// `total` as reported by the server, when present.
    pub total: Option<u64>,
}

impl BundleData {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Public Bundle operations
// ============================================================================

/// Bundle operations.
///
/// This is a zero-sized type used for namespacing bundle-related operations.
pub struct Bundle;

impl Bundle {
    /// Parse a search page.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError`] if the payload is not a Bundle or an entry has no
    /// `resource` object.
    pub fn parse(value: &Value) -> FhirResult<BundleData> {
        let wire: BundleWire = strict(value, "Bundle")?;
        expect_resource_type(&wire.resource_type, "Bundle")?;

        Ok(BundleData {
            entries: wire.entry.into_iter().map(|e| e.resource).collect(),
            total: wire.total,
        })
    }

    /// URL of the first link whose relation is `next`.
    ///
    /// Returns `Ok(None)` when the page has no link list or no `next` relation. Works on any
    /// response shape, including error outcomes returned mid-paging.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError`] if a link list is present but malformed.
    pub fn next_link(value: &Value) -> FhirResult<Option<String>> {
        let Some(links) = value.get("link") else {
            return Ok(None);
        };
        let links: Vec<LinkWire> = strict(links, "Bundle.link")?;

        Ok(links
            .into_iter()
            .find(|l| l.relation == "next")
            .map(|l| l.url))
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
struct BundleWire {
    #[serde(rename = "resourceType")]
    resource_type: String,

    #[serde(default)]
    total: Option<u64>,

    #[serde(default)]
    entry: Vec<EntryWire>,
}

#[derive(Clone, Debug, Deserialize)]
struct EntryWire {
    resource: Value,
}

#[derive(Clone, Debug, Deserialize)]
struct LinkWire {
    relation: String,
    url: String,
}
