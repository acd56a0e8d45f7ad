//! List My Tickets Example
//!
//! Lists one page of a requester's tickets and prints the compact view of
//! each, then looks up the first one by its display identifier.
//!
//! To run this example:
//! ```
//! SDP_URL=https://sdp.example.com SDP_API_KEY=your_key \
//!     cargo run --example list_my_tickets -- ana@corp.com
//! ```

use anyhow::Context;
use ticket_sdk::servicedesk::compact_ticket;
use ticket_sdk::ticket_actions_from_env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let email = std::env::args()
        .nth(1)
        .context("usage: list_my_tickets <requester-email> [page] [page-size]")?;
    let page: u32 = std::env::args().nth(2).map_or(Ok(1), |p| p.parse())?;
    let page_size: u32 = std::env::args().nth(3).map_or(Ok(10), |p| p.parse())?;

    let actions = ticket_actions_from_env().context("ServiceDesk configuration")?;

    let result = actions.list_my_tickets(&email, page, page_size).await?;
    println!(
        "{} tickets (total: {:?}, more: {:?})",
        result.list_info.row_count, result.list_info.total_count, result.list_info.has_more_rows
    );

    for record in &result.requests {
        let ticket = compact_ticket(record);
        println!(
            "  #{:<8} {:<12} {}",
            ticket.display_id,
            ticket.status.as_deref().unwrap_or("-"),
            ticket.subject.as_deref().unwrap_or("(no subject)")
        );
    }

    if let Some(first) = result.requests.first().map(compact_ticket) {
        let status = actions.ticket_status_by_display(&first.display_id).await?;
        println!("\n{}", serde_json::to_string_pretty(&status.ticket)?);
    }

    Ok(())
}
