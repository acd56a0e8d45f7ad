//! Add Note Example
//!
//! Attaches a note to a ticket by display identifier, letting the client
//! negotiate which note payload the server accepts.
//!
//! To run this example:
//! ```
//! SDP_URL=https://sdp.example.com SDP_API_KEY=your_key \
//!     cargo run --example add_note -- REQ-77 ana@corp.com "Any update?"
//! ```

use anyhow::Context;
use ticket_sdk::ticket_actions_from_env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("debug"));

    let mut args = std::env::args().skip(1);
    let usage = "usage: add_note <display-id> <requester-email> <note>";
    let display_id = args.next().context(usage)?;
    let email = args.next().context(usage)?;
    let note = args.next().context(usage)?;

    let actions = ticket_actions_from_env()?;

    match actions.add_note_by_display(&display_id, &email, &note).await {
        Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
        Err(e) if e.is_not_found() => eprintln!("{}", e),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
