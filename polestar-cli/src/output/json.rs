//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use polestar_core::{EndpointCatalog, FieldValue, TelemetryValue};
use polestar_store::DataError;
use serde::Serialize;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for a single field read.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOutput {
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub value: Option<TelemetryValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FieldOutput {
    /// Builds the output for one read.
    pub fn from_result(name: &str, result: &Result<FieldValue, DataError>) -> Self {
        match result {
            Ok(value) => Self {
                field: value.field.name().to_string(),
                endpoint: Some(value.source_endpoint.to_string()),
                value: value.value.clone(),
                unit: value.field.unit(),
                last_updated: Some(value.last_updated),
                stale: value.stale,
                error: None,
            },
            Err(e) => Self {
                field: name.to_string(),
                endpoint: None,
                value: None,
                unit: None,
                last_updated: None,
                stale: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Catalog entry output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInfoOutput {
    pub field: &'static str,
    pub endpoint: &'static str,
    pub operation: &'static str,
    pub ttl_secs: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats field reads, as an object for one read and a list otherwise.
    pub fn format_reads(&self, reads: &[(String, Result<FieldValue, DataError>)]) -> Result<String> {
        let outputs: Vec<FieldOutput> = reads
            .iter()
            .map(|(name, result)| FieldOutput::from_result(name, result))
            .collect();

        if outputs.len() == 1 {
            self.format(&outputs[0])
        } else {
            self.format(&outputs)
        }
    }

    /// Formats the field catalog.
    pub fn format_catalog(&self, catalog: &EndpointCatalog) -> Result<String> {
        let outputs: Vec<FieldInfoOutput> = catalog
            .endpoints()
            .iter()
            .flat_map(|endpoint| {
                endpoint.produces.iter().map(move |field| FieldInfoOutput {
                    field: field.name(),
                    endpoint: endpoint.id.as_str(),
                    operation: endpoint.id.operation(),
                    ttl_secs: endpoint.ttl.num_seconds(),
                    unit: field.unit(),
                })
            })
            .collect();
        self.format(&outputs)
    }
}
