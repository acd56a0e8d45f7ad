//! Outgoing payload construction
//!
//! ServiceDesk Plus v3 takes every structured argument as JSON text inside a
//! single `input_data` field, whatever the transport encoding.

use serde_json::{json, Map, Value};

use crate::config::{EntityRef, ServiceDeskConfig};
use crate::core::FormFields;
use crate::error::Result;

use super::models::NewTicket;

/// Name of the field carrying the JSON payload
pub const INPUT_DATA: &str = "input_data";

/// Wrap a payload as the single `input_data` field
pub fn input_data(payload: &Value) -> Result<FormFields> {
    Ok(vec![(INPUT_DATA.to_string(), serde_json::to_string(payload)?)])
}

/// `list_info` asking for the first record whose `field` equals `value`
pub fn single_record_search(field: &str, value: &str) -> Value {
    json!({
        "list_info": {
            "row_count": 1,
            "start_index": 1,
            "search_fields": { field: value },
        }
    })
}

/// Defaults injected into ticket creation, read once from configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketDefaults {
    pub site: Option<EntityRef>,
    pub template: Option<EntityRef>,
    pub allow_template_fallback: bool,
}

impl TicketDefaults {
    pub fn from_config(config: &ServiceDeskConfig) -> Self {
        Self {
            site: config.default_site.clone(),
            template: config.default_template.clone(),
            allow_template_fallback: config.allow_template_fallback,
        }
    }

    /// Add the `site` clause and, if asked, the `template` clause.
    ///
    /// Each clause uses the configured id, else the configured name, else is
    /// left out. Existing keys are overwritten.
    pub fn apply_site_and_template(&self, request: &mut Map<String, Value>, include_template: bool) {
        if let Some(site) = &self.site {
            request.insert("site".to_string(), site.to_clause());
        }

        if include_template {
            if let Some(template) = &self.template {
                request.insert("template".to_string(), template.to_clause());
            }
        }
    }

    /// Creation payload: `{"request": {requester, subject, description, site?, template?}}`
    pub fn create_payload(&self, ticket: &NewTicket, include_template: bool) -> Value {
        let mut request = Map::new();
        request.insert(
            "requester".to_string(),
            json!({ "email_id": ticket.requester_email }),
        );
        request.insert("subject".to_string(), Value::from(ticket.subject.as_str()));
        request.insert(
            "description".to_string(),
            Value::from(ticket.description.as_str()),
        );

        self.apply_site_and_template(&mut request, include_template);

        json!({ "request": request })
    }
}
