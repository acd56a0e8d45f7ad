//! Listing a requester's tickets
//!
//! Four request shapes are negotiated in order. The first three let the
//! server filter and page; the last pulls an unfiltered block and does the
//! filtering, ordering and paging here.

use serde_json::{json, Value};

use crate::core::Transport;
use crate::error::Result;
use crate::negotiation::{Negotiated, StrategyChain};

use super::extract::extract_items;
use super::models::{ListInfo, PageResult, TicketQuery};
use super::payload::input_data;

pub(crate) const REQUESTS_ENDPOINT: &str = "/api/v3/requests";

/// Strategy 1: GET with flat `search_fields`, newest first, total requested
pub fn search_fields_read(query: &TicketQuery) -> Value {
    json!({
        "list_info": {
            "row_count": query.page_size(),
            "start_index": query.start_index(),
            "sort_field": "created_time",
            "sort_order": "desc",
            "get_total_count": true,
            "search_fields": { "requester.email_id": query.requester_email() },
        }
    })
}

/// Strategy 2: form POST with flat `search_fields`
pub fn search_fields_write(query: &TicketQuery) -> Value {
    json!({
        "list_info": {
            "search_fields": { "requester.email_id": query.requester_email() },
            "row_count": query.page_size(),
            "start_index": query.start_index(),
        }
    })
}

/// Strategy 3: form POST with the structured `search_criteria` dialect
pub fn search_criteria_write(query: &TicketQuery) -> Value {
    json!({
        "list_info": {
            "search_criteria": {
                "criteria": [{
                    "field": "requester.email_id",
                    "condition": "is",
                    "value": query.requester_email(),
                }],
                "operator": "and",
            },
            "row_count": query.page_size(),
            "start_index": query.start_index(),
        }
    })
}

/// Strategy 4 pull: an unfiltered block from the start
pub fn raw_pull(query: &TicketQuery) -> Value {
    json!({
        "list_info": {
            "row_count": query.raw_pull_size(),
            "start_index": 1,
        }
    })
}

/// Page produced by a server-side strategy.
///
/// Paging fields the upstream reported are kept when well-typed; the row
/// count always reflects the records actually extracted.
pub fn server_page(response: &Value, query: &TicketQuery) -> PageResult {
    let requests = extract_items(response);
    let upstream = response.get("list_info");
    let field = |name: &str| upstream.and_then(|info| info.get(name));

    PageResult {
        list_info: ListInfo {
            row_count: requests.len(),
            start_index: field("start_index")
                .and_then(Value::as_u64)
                .unwrap_or_else(|| query.start_index()),
            get_total_count: field("get_total_count")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            total_count: field("total_count").and_then(Value::as_u64),
            has_more_rows: field("has_more_rows").and_then(Value::as_bool),
        },
        requests,
    }
}

/// Numeric creation time of a raw record, if it has a usable one
fn created_value(record: &Value) -> Option<i64> {
    match record.get("created_time")?.get("value")? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn requester_matches(record: &Value, email_norm: &str) -> bool {
    record
        .get("requester")
        .and_then(Value::as_object)
        .and_then(|requester| requester.get("email_id"))
        .and_then(Value::as_str)
        .map_or(false, |email| email.trim().to_lowercase() == email_norm)
}

/// Filter, order and page raw records without any upstream help.
///
/// Keeps records whose `requester.email_id` equals `requester_email` after
/// trimming and lowercasing both sides, orders them newest first by
/// `created_time.value` (records without a usable value go last, in their
/// original order), then cuts out the requested page. Totals describe the
/// whole filtered set.
pub fn paginate_locally(
    records: &[Value],
    requester_email: &str,
    page: u32,
    page_size: u32,
) -> PageResult {
    let email_norm = requester_email.trim().to_lowercase();

    let mut filtered: Vec<&Value> = records
        .iter()
        .filter(|record| requester_matches(record, &email_norm))
        .collect();

    // Stable sort: Some(_) outranks None, larger values first.
    filtered.sort_by(|a, b| created_value(b).cmp(&created_value(a)));

    let total = filtered.len();
    let start = (page.max(1) as usize - 1).saturating_mul(page_size as usize);
    let end = start.saturating_add(page_size as usize);

    let requests: Vec<Value> = filtered
        .into_iter()
        .skip(start)
        .take(page_size as usize)
        .cloned()
        .collect();

    PageResult {
        list_info: ListInfo {
            row_count: requests.len(),
            start_index: if total > 0 { start as u64 + 1 } else { 1 },
            get_total_count: true,
            total_count: Some(total as u64),
            has_more_rows: Some(end < total),
        },
        requests,
    }
}

/// Unfiltered pull, form POST first and GET second
async fn pull_unfiltered(transport: &dyn Transport, query: &TicketQuery) -> Result<Value> {
    let fields = input_data(&raw_pull(query))?;
    let post_fields = fields.clone();

    let pulled = StrategyChain::new("raw-pull")
        .attempt("post-form", move || async move {
            transport.post_form(REQUESTS_ENDPOINT, &post_fields).await
        })
        .attempt("get", move || async move {
            transport.get(REQUESTS_ENDPOINT, &fields).await
        })
        .run()
        .await?;

    Ok(pulled.into_inner())
}

/// List the tickets of `query`'s requester, negotiating the request shape.
///
/// When every strategy fails the last strategy's error is returned.
pub async fn list_requester_tickets(
    transport: &dyn Transport,
    query: &TicketQuery,
) -> Result<Negotiated<PageResult>> {
    let read_fields = input_data(&search_fields_read(query))?;
    let write_fields = input_data(&search_fields_write(query))?;
    let criteria_fields = input_data(&search_criteria_write(query))?;

    StrategyChain::new("list-requester-tickets")
        .attempt("search-fields-get", move || async move {
            let response = transport.get(REQUESTS_ENDPOINT, &read_fields).await?;
            Ok(server_page(&response, query))
        })
        .attempt("search-fields-post", move || async move {
            let response = transport.post_form(REQUESTS_ENDPOINT, &write_fields).await?;
            Ok(server_page(&response, query))
        })
        .attempt("search-criteria-post", move || async move {
            let response = transport
                .post_form(REQUESTS_ENDPOINT, &criteria_fields)
                .await?;
            Ok(server_page(&response, query))
        })
        .attempt("local-pagination", move || async move {
            let response = pull_unfiltered(transport, query).await?;
            let records = extract_items(&response);
            Ok(paginate_locally(
                &records,
                query.requester_email(),
                query.page(),
                query.page_size(),
            ))
        })
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(id: u64, email: &str, created: Value) -> Value {
        json!({
            "id": id,
            "requester": {"email_id": email},
            "created_time": {"value": created},
        })
    }

    fn ids(page: &PageResult) -> Vec<u64> {
        page.requests
            .iter()
            .map(|r| r["id"].as_u64().unwrap())
            .collect()
    }

    #[test]
    fn test_filter_is_trimmed_and_case_insensitive() {
        let records = vec![
            ticket(1, "Ana@Corp.com ", json!(10)),
            ticket(2, "bob@corp.com", json!(20)),
            ticket(3, "ana@corp.com", json!(30)),
            json!("not a record"),
            json!({"id": 4, "requester": "ana@corp.com"}),
        ];

        let page = paginate_locally(&records, " ANA@corp.com", 1, 25);
        assert_eq!(ids(&page), vec![3, 1]);
        assert_eq!(page.list_info.total_count, Some(2));
        assert_eq!(page.list_info.row_count, 2);
        assert_eq!(page.list_info.has_more_rows, Some(false));
    }

    #[test]
    fn test_invalid_created_time_sorts_last() {
        let records = vec![
            ticket(1, "a@x.com", json!("garbage")),
            ticket(2, "a@x.com", json!("1700000000000")),
            json!({"id": 3, "requester": {"email_id": "a@x.com"}}),
            ticket(4, "a@x.com", json!(1800000000000u64)),
            ticket(5, "a@x.com", json!(null)),
        ];

        let page = paginate_locally(&records, "a@x.com", 1, 10);
        assert_eq!(ids(&page), vec![4, 2, 1, 3, 5]);
    }

    #[test]
    fn test_page_slicing_and_totals() {
        let records: Vec<Value> = (1..=7).map(|i| ticket(i, "a@x.com", json!(i))).collect();

        let second = paginate_locally(&records, "a@x.com", 2, 3);
        assert_eq!(ids(&second), vec![4, 3, 2]);
        assert_eq!(second.list_info.start_index, 4);
        assert_eq!(second.list_info.has_more_rows, Some(true));

        let last = paginate_locally(&records, "a@x.com", 3, 3);
        assert_eq!(ids(&last), vec![1]);
        assert_eq!(last.list_info.has_more_rows, Some(false));

        let beyond = paginate_locally(&records, "a@x.com", 9, 3);
        assert!(beyond.requests.is_empty());
        assert_eq!(beyond.list_info.row_count, 0);
        assert_eq!(beyond.list_info.total_count, Some(7));
    }

    #[test]
    fn test_page_length_matches_formula() {
        let records: Vec<Value> = (0..37)
            .map(|i| ticket(i, if i % 3 == 0 { "b@x.com" } else { "a@x.com" }, json!(i)))
            .collect();
        let total = records
            .iter()
            .filter(|r| r["requester"]["email_id"] == "a@x.com")
            .count();

        for page_size in [1u32, 2, 5, 7, 24, 25, 200] {
            for page in 1u32..=8 {
                let result = paginate_locally(&records, "a@x.com", page, page_size);
                let skipped = (page as usize - 1) * page_size as usize;
                let expected = (page_size as usize).min(total.saturating_sub(skipped));
                assert_eq!(result.requests.len(), expected, "page={} size={}", page, page_size);
                assert_eq!(result.list_info.row_count, result.requests.len());
            }
        }
    }

    #[test]
    fn test_empty_filtered_set_starts_at_one() {
        let page = paginate_locally(&[], "a@x.com", 4, 10);
        assert_eq!(page.list_info.start_index, 1);
        assert_eq!(page.list_info.total_count, Some(0));
        assert_eq!(page.list_info.has_more_rows, Some(false));
    }

    #[test]
    fn test_server_page_keeps_typed_upstream_fields() {
        let query = TicketQuery::new("a@x.com", 2, 10).unwrap();
        let response = json!({
            "list_info": {"start_index": 11, "total_count": 12, "has_more_rows": false, "row_count": 99},
            "requests": [{"id": 1}, {"id": 2}],
        });
        let page = server_page(&response, &query);
        assert_eq!(page.list_info.row_count, 2);
        assert_eq!(page.list_info.start_index, 11);
        assert_eq!(page.list_info.total_count, Some(12));
        assert_eq!(page.list_info.has_more_rows, Some(false));

        let bare = server_page(&json!({"requests": [], "list_info": {"total_count": "x"}}), &query);
        assert_eq!(bare.list_info.start_index, 11);
        assert_eq!(bare.list_info.total_count, None);
        assert!(bare.list_info.get_total_count);
    }

    #[test]
    fn test_payload_shapes() {
        let query = TicketQuery::new("a@x.com", 3, 20).unwrap();

        let read = search_fields_read(&query);
        assert_eq!(read["list_info"]["start_index"], 41);
        assert_eq!(read["list_info"]["sort_order"], "desc");
        assert_eq!(read["list_info"]["search_fields"]["requester.email_id"], "a@x.com");

        let criteria = search_criteria_write(&query);
        assert_eq!(criteria["list_info"]["search_criteria"]["operator"], "and");
        assert_eq!(
            criteria["list_info"]["search_criteria"]["criteria"][0]["condition"],
            "is"
        );

        assert_eq!(raw_pull(&query)["list_info"]["row_count"], 200);
        assert_eq!(raw_pull(&query)["list_info"]["start_index"], 1);
    }
}
