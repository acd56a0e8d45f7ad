//! Ticket actions facade
//!
//! Public entry points used by the HTTP bridge. Each call gets its own
//! request id for log correlation; nothing is shared between calls apart
//! from the transport and the read-only creation defaults.

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;

use crate::config::ServiceDeskConfig;
use crate::core::Transport;
use crate::error::{RejectionReason, Result};
use crate::util::{generate_request_id, html_to_text, sanitize_for_logging, truncate_string};

use super::compact::{first_present, scalar_text};
use super::extract::extract_items;
use super::listing::{list_requester_tickets, REQUESTS_ENDPOINT};
use super::models::{Announcement, Announcements, NewTicket, PageResult, TicketQuery, TicketStatus};
use super::notes::submit_note;
use super::payload::{input_data, TicketDefaults};
use super::resolve::{requester_id, resolve_request_id, status_by_display};
use super::ServiceDeskClient;

const ANNOUNCEMENTS_ENDPOINT: &str = "/api/v3/announcements";
const SITES_ENDPOINT: &str = "/api/v3/sites";
const TEMPLATES_ENDPOINT: &str = "/api/v3/request_templates";

const DEFAULT_ANNOUNCEMENT_TITLE: &str = "Announcement";

/// Entry points over a ServiceDesk Plus transport
#[derive(Clone)]
pub struct TicketActions {
    transport: Arc<dyn Transport>,
    defaults: TicketDefaults,
}

impl TicketActions {
    /// Facade over any transport
    pub fn new(transport: Arc<dyn Transport>, defaults: TicketDefaults) -> Self {
        Self { transport, defaults }
    }

    /// Facade over the HTTP client, both built from `config`
    pub fn from_config(config: ServiceDeskConfig) -> Result<Self> {
        let defaults = TicketDefaults::from_config(&config);
        let client = ServiceDeskClient::new(config)?;
        Ok(Self::new(Arc::new(client), defaults))
    }

    pub fn defaults(&self) -> &TicketDefaults {
        &self.defaults
    }

    /// Active announcements with their HTML flattened
    pub async fn announcements(&self) -> Result<Announcements> {
        let request_id = generate_request_id();
        debug!("[{}] fetching announcements", request_id);

        let response = self.transport.get(ANNOUNCEMENTS_ENDPOINT, &[]).await?;
        let announcements = extract_items(&response)
            .iter()
            .filter(|item| item.is_object())
            .map(project_announcement)
            .collect::<Vec<_>>();

        debug!("[{}] {} announcements", request_id, announcements.len());
        Ok(Announcements { announcements })
    }

    /// Open a ticket, retrying once without the template if it was rejected.
    ///
    /// The retry only happens when template fallback is enabled and the
    /// failure is classified as a template rejection. The upstream answer is
    /// returned unchanged.
    pub async fn create_ticket(&self, ticket: &NewTicket) -> Result<Value> {
        let request_id = generate_request_id();
        info!(
            "[{}] creating ticket for {}",
            request_id, ticket.requester_email
        );

        let fields = input_data(&self.defaults.create_payload(ticket, true))?;
        match self.transport.post_form(REQUESTS_ENDPOINT, &fields).await {
            Ok(response) => Ok(response),
            Err(err)
                if self.defaults.allow_template_fallback
                    && err.rejection_reason() == Some(RejectionReason::TemplateRejected) =>
            {
                warn!(
                    "[{}] template rejected, retrying without it: {}",
                    request_id,
                    truncate_string(&sanitize_for_logging(&err.to_string()), 300)
                );
                let fields = input_data(&self.defaults.create_payload(ticket, false))?;
                self.transport.post_form(REQUESTS_ENDPOINT, &fields).await
            }
            Err(err) => Err(err),
        }
    }

    /// One page of the requester's tickets, newest first where the upstream
    /// or the local fallback can order them
    pub async fn list_my_tickets(
        &self,
        requester_email: &str,
        page: u32,
        page_size: u32,
    ) -> Result<PageResult> {
        let request_id = generate_request_id();
        let query = TicketQuery::new(requester_email, page, page_size)?;

        let outcome = list_requester_tickets(self.transport.as_ref(), &query).await?;
        info!(
            "[{}] listed {} tickets for {} via {}",
            request_id, outcome.value.list_info.row_count, requester_email, outcome.strategy
        );

        Ok(outcome.into_inner())
    }

    /// Compact status of a ticket by its display identifier
    pub async fn ticket_status_by_display(&self, display_id: &str) -> Result<TicketStatus> {
        let request_id = generate_request_id();
        debug!("[{}] status lookup for {}", request_id, display_id);

        status_by_display(self.transport.as_ref(), display_id).await
    }

    /// Attach a note to a ticket by internal id
    pub async fn add_note(&self, ticket_id: u64, requester_email: &str, note: &str) -> Result<Value> {
        self.submit(Value::from(ticket_id), requester_email, note).await
    }

    /// Attach a note to a ticket by display identifier
    pub async fn add_note_by_display(
        &self,
        display_id: &str,
        requester_email: &str,
        note: &str,
    ) -> Result<Value> {
        let ticket_id = resolve_request_id(self.transport.as_ref(), display_id).await?;
        self.submit(ticket_id, requester_email, note).await
    }

    async fn submit(&self, ticket_id: Value, requester_email: &str, note: &str) -> Result<Value> {
        let request_id = generate_request_id();
        debug!(
            "[{}] adding note to {} on behalf of {}",
            request_id, ticket_id, requester_email
        );

        let outcome = submit_note(self.transport.as_ref(), &ticket_id, note).await?;
        info!(
            "[{}] note added to {} via {}",
            request_id, ticket_id, outcome.strategy
        );

        Ok(outcome.into_inner())
    }

    /// Sites configured upstream, unchanged
    pub async fn list_sites(&self) -> Result<Value> {
        self.transport.get(SITES_ENDPOINT, &[]).await
    }

    /// Request templates configured upstream, unchanged
    pub async fn list_request_templates(&self) -> Result<Value> {
        self.transport.get(TEMPLATES_ENDPOINT, &[]).await
    }

    /// Internal id of a requester, for builds that expose `/requesters`
    pub async fn requester_id(&self, email: &str) -> Result<Value> {
        requester_id(self.transport.as_ref(), email).await
    }
}

fn project_announcement(item: &Value) -> Announcement {
    let title = first_present(item, &["title", "name"])
        .and_then(scalar_text)
        .unwrap_or_else(|| DEFAULT_ANNOUNCEMENT_TITLE.to_string());

    let html = first_present(item, &["description", "content"])
        .and_then(scalar_text)
        .unwrap_or_default();

    Announcement {
        title,
        description_text: html_to_text(&html),
        description_html_present: !html.is_empty(),
        status: item.get("status").cloned().unwrap_or(Value::Null),
        start_time: pick(item, &["start_time", "start_time_ms"]),
        end_time: pick(item, &["end_time", "end_time_ms"]),
        id: pick(item, &["id", "announcement_id"]),
    }
}

fn pick(item: &Value, keys: &[&str]) -> Value {
    first_present(item, keys).cloned().unwrap_or(Value::Null)
}
