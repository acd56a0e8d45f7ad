// trace-ledger-rs/src/lib.rs
// Append-only execution trace ledger for the ServiceDesk bridge.
//
// Every call the bridge serves is recorded once, with its outcome:
//
// - One JSON object per line, oldest first
// - Each line participates in a SHA-256 hash chain for tamper detection
// - Public API:
//     * TraceLedger::append
//     * TraceLedger::recent
//     * TraceLedger::prune_older_than

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Timelike, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Longest message kept on a record, in characters.
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Newest records kept in memory for `TraceLedger::recent`.
pub const TAIL_CAPACITY: usize = 500;

const DEFAULT_PATH: &str = "data/trace/executions.jsonl";
const DEFAULT_RETENTION_DAYS: i64 = 180;

/// Outcome of one served call, as reported by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExecution {
    pub endpoint: String,
    pub email: Option<String>,
    pub action: Option<String>,
    /// Relevant request parameters; non-object values are stored as `{}`.
    pub params: Value,
    pub ok: bool,
    pub code: Option<u16>,
    pub message: Option<String>,
}

impl NewExecution {
    pub fn success(endpoint: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            email: None,
            action: Some(action.into()),
            params: Value::Object(Map::new()),
            ok: true,
            code: None,
            message: None,
        }
    }

    pub fn failure(
        endpoint: impl Into<String>,
        action: impl Into<String>,
        code: u16,
        message: impl Into<String>,
    ) -> Self {
        Self {
            ok: false,
            code: Some(code),
            message: Some(message.into()),
            ..Self::success(endpoint, action)
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// A stored trace record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Sequential id, starting at 1.
    pub id: u64,
    /// UTC, second precision, rendered as `YYYY-MM-DDTHH:MM:SSZ`.
    #[serde(with = "ts_format")]
    pub ts: DateTime<Utc>,
    pub endpoint: String,
    pub email: Option<String>,
    pub action: Option<String>,
    pub params: Value,
    pub ok: bool,
    pub code: Option<u16>,
    pub message: String,
}

/// On-disk representation of a single line.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerLine {
    /// Hex SHA-256(prev_hash || record_json).
    hash_chain: String,
    record: ExecutionRecord,
}

/// Where the ledger lives and how long its records are kept.
#[derive(Debug, Clone)]
pub struct TraceLedgerConfig {
    /// Path to the append-only JSON-lines file.
    pub path: PathBuf,
    /// Records older than this many days are dropped by pruning.
    pub retention_days: i64,
}

impl Default for TraceLedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PATH),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

struct LedgerState {
    /// Newest records, oldest first, at most `TAIL_CAPACITY` of them.
    tail: VecDeque<ExecutionRecord>,
    /// Records in the ledger, including those no longer in `tail`.
    count: usize,
    /// Last hash in the chain (or all zeros for an empty ledger).
    last_hash: [u8; 32],
    next_id: u64,
}

impl LedgerState {
    fn empty() -> Self {
        Self {
            tail: VecDeque::with_capacity(TAIL_CAPACITY),
            count: 0,
            last_hash: [0u8; 32],
            next_id: 1,
        }
    }

    fn push(&mut self, record: ExecutionRecord) {
        if self.tail.len() == TAIL_CAPACITY {
            self.tail.pop_front();
        }
        self.tail.push_back(record);
        self.count += 1;
    }
}

/// Append-only execution trace ledger.
///
/// Only the newest `TAIL_CAPACITY` records stay in memory; the file is
/// streamed whenever the whole ledger is needed.
pub struct TraceLedger {
    /// Backing file; `None` keeps everything in memory.
    path: Option<PathBuf>,
    state: Mutex<LedgerState>,
}

impl TraceLedger {
    /// Open (or create) a file-backed ledger.
    ///
    /// Existing lines are read back and the hash chain is verified; a
    /// broken chain is reported as `LedgerError::Integrity`. A partial last
    /// line left by an interrupted append is cut off instead.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut state = LedgerState::empty();
        let scan = scan_chain(&path, |record| {
            state.push(record);
            Ok(())
        })?;
        repair_tail(&path, &scan)?;

        state.last_hash = scan.last_hash;
        state.next_id = scan.next_id;
        info!(
            "trace ledger opened at {} with {} records",
            path.display(),
            state.count
        );

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// Ledger without a backing file.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(LedgerState::empty()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record one execution and return it as stored.
    ///
    /// This is append-only (no previous records are modified).
    pub fn append(&self, execution: NewExecution) -> Result<ExecutionRecord, LedgerError> {
        let now = Utc::now();
        let mut state = self.lock();

        let record = ExecutionRecord {
            id: state.next_id,
            ts: now.with_nanosecond(0).unwrap_or(now),
            endpoint: execution.endpoint,
            email: execution.email,
            action: execution.action,
            params: match execution.params {
                Value::Object(map) => Value::Object(map),
                _ => Value::Object(Map::new()),
            },
            ok: execution.ok,
            code: execution.code,
            message: execution
                .message
                .unwrap_or_default()
                .chars()
                .take(MAX_MESSAGE_CHARS)
                .collect(),
        };

        let hash = chain_hash(&state.last_hash, &record)?;

        if let Some(path) = &self.path {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            write_line(&mut file, &hash, &record)?;
            file.flush()?;
        }

        state.last_hash = hash;
        state.next_id += 1;
        state.push(record.clone());

        Ok(record)
    }

    /// Up to `limit` records, newest first. `limit` is capped at `TAIL_CAPACITY`.
    pub fn recent(&self, limit: usize) -> Vec<ExecutionRecord> {
        self.lock().tail.iter().rev().take(limit).cloned().collect()
    }

    /// Number of records in the ledger.
    pub fn len(&self) -> usize {
        self.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop records older than `days` days and return how many were removed.
    ///
    /// The surviving records keep their ids. The file is streamed into a
    /// re-chained copy which then replaces it.
    pub fn prune_older_than(&self, days: i64) -> Result<usize, LedgerError> {
        let cutoff = Utc::now() - Duration::days(days);
        let mut state = self.lock();

        let path = match &self.path {
            Some(path) => path,
            None => {
                let before = state.tail.len();
                let kept: Vec<ExecutionRecord> =
                    state.tail.drain(..).filter(|record| record.ts >= cutoff).collect();
                let mut last_hash = [0u8; 32];
                for record in &kept {
                    last_hash = chain_hash(&last_hash, record)?;
                }
                let removed = before - kept.len();
                state.count = kept.len();
                state.tail = kept.into();
                state.last_hash = last_hash;
                return Ok(removed);
            }
        };

        let tmp = path.with_extension("jsonl.tmp");
        let mut pruned = LedgerState::empty();
        pruned.next_id = state.next_id;
        let mut removed = 0;
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            scan_chain(path, |record| {
                if record.ts < cutoff {
                    removed += 1;
                    return Ok(());
                }
                pruned.last_hash = chain_hash(&pruned.last_hash, &record)?;
                write_line(&mut writer, &pruned.last_hash, &record)?;
                pruned.push(record);
                Ok(())
            })?;
            writer.flush()?;
        }

        if removed == 0 {
            fs::remove_file(&tmp)?;
            return Ok(0);
        }

        fs::rename(&tmp, path)?;
        *state = pruned;
        info!("trace ledger pruned {} records older than {} days", removed, days);

        Ok(removed)
    }

    /// Re-read the backing file and check its chain; returns the record count.
    pub fn verify(&self) -> Result<usize, LedgerError> {
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(self.len()),
        };

        let scan = scan_chain(path, |_| Ok(()))?;
        match scan.torn {
            Some(torn) => Err(LedgerError::Integrity(format!(
                "line {} is a partial write",
                torn.line
            ))),
            None => Ok(scan.count),
        }
    }
}

/// Errors produced by the ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("integrity error: {0}")]
    Integrity(String),
}

// --- helpers ---------------------------------------------------------------

mod ts_format {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .map_err(serde::de::Error::custom)
    }
}

fn chain_hash(prev: &[u8; 32], record: &ExecutionRecord) -> Result<[u8; 32], LedgerError> {
    let mut hasher = Sha256::new();
    hasher.update(prev);
    hasher.update(serde_json::to_vec(record)?);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    Ok(hash)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn write_line<W: Write>(out: &mut W, hash: &[u8; 32], record: &ExecutionRecord) -> Result<(), LedgerError> {
    let line = serde_json::to_string(&LedgerLine {
        hash_chain: to_hex(hash),
        record: record.clone(),
    })?;
    out.write_all(line.as_bytes())?;
    out.write_all(b"\n")?;
    Ok(())
}

/// Unparseable last line of the file.
#[derive(Debug, Clone, Copy)]
struct TornLine {
    /// 1-based line number.
    line: usize,
    /// Byte offset where the line starts.
    offset: u64,
}

/// What a full pass over the file found.
#[derive(Debug, Default)]
struct ChainScan {
    count: usize,
    last_hash: [u8; 32],
    next_id: u64,
    torn: Option<TornLine>,
    /// The last good line has no terminating newline.
    unterminated: bool,
}

/// Stream every record of the file through `visit`, oldest first,
/// checking the hash chain as it goes.
///
/// A line that does not parse is tolerated only as the last line of the
/// file, where an interrupted append leaves it; it is reported in
/// `ChainScan::torn`. Anywhere else it is an integrity error, as is any
/// hash mismatch. A missing file scans as empty.
fn scan_chain<F>(path: &Path, mut visit: F) -> Result<ChainScan, LedgerError>
where
    F: FnMut(ExecutionRecord) -> Result<(), LedgerError>,
{
    let mut scan = ChainScan {
        next_id: 1,
        ..ChainScan::default()
    };
    if !path.exists() {
        return Ok(scan);
    }

    let mut reader = BufReader::new(File::open(path)?);
    let mut buf = Vec::new();
    let mut offset = 0u64;
    let mut index = 0usize;

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf)?;
        if read == 0 {
            break;
        }
        index += 1;
        let line_start = offset;
        offset += read as u64;

        if buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        if let Some(torn) = scan.torn {
            return Err(LedgerError::Integrity(format!(
                "line {} is not a ledger entry",
                torn.line
            )));
        }

        let entry: LedgerLine = match serde_json::from_slice(&buf) {
            Ok(entry) => entry,
            Err(_) => {
                scan.torn = Some(TornLine {
                    line: index,
                    offset: line_start,
                });
                continue;
            }
        };

        let computed = chain_hash(&scan.last_hash, &entry.record)?;
        if entry.hash_chain != to_hex(&computed) {
            return Err(LedgerError::Integrity(format!(
                "hash chain mismatch at line {}; possible tampering",
                index
            )));
        }

        scan.last_hash = computed;
        scan.next_id = scan.next_id.max(entry.record.id + 1);
        scan.count += 1;
        scan.unterminated = buf.last() != Some(&b'\n');
        visit(entry.record)?;
    }

    Ok(scan)
}

/// Cut a torn last line and terminate an unterminated one so the next
/// append starts on a fresh line.
fn repair_tail(path: &Path, scan: &ChainScan) -> Result<(), LedgerError> {
    if let Some(torn) = scan.torn {
        warn!(
            "trace ledger {}: dropping partial line {} left by an interrupted write",
            path.display(),
            torn.line
        );
        OpenOptions::new().write(true).open(path)?.set_len(torn.offset)?;
    } else if scan.unterminated {
        let mut file = OpenOptions::new().append(true).open(path)?;
        file.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(i: usize) -> NewExecution {
        NewExecution::success("/intents/status", "list_mine")
            .with_email(format!("user{}@corp.com", i))
            .with_params(json!({"page": i}))
    }

    #[test]
    fn test_in_memory_recent_is_newest_first() {
        let ledger = TraceLedger::in_memory();
        for i in 0..5 {
            ledger.append(sample(i)).unwrap();
        }

        let recent = ledger.recent(3);
        assert_eq!(recent.iter().map(|r| r.id).collect::<Vec<_>>(), vec![5, 4, 3]);
        assert_eq!(recent[0].params, json!({"page": 4}));
        assert_eq!(ledger.recent(50).len(), 5);
        assert!(ledger.recent(0).is_empty());
    }

    #[test]
    fn test_failure_record_fields() {
        let ledger = TraceLedger::in_memory();
        let long = "x".repeat(MAX_MESSAGE_CHARS + 20);
        let record = ledger
            .append(
                NewExecution::failure("/intents/create", "create", 502, long)
                    .with_params(json!("not an object")),
            )
            .unwrap();

        assert!(!record.ok);
        assert_eq!(record.code, Some(502));
        assert_eq!(record.message.chars().count(), MAX_MESSAGE_CHARS);
        assert_eq!(record.params, json!({}));

        let rendered = serde_json::to_value(&record).unwrap();
        let ts = rendered["ts"].as_str().unwrap();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2025-01-01T00:00:00Z".len());
    }

    #[test]
    fn test_file_ledger_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace").join("executions.jsonl");

        {
            let ledger = TraceLedger::open(&path).unwrap();
            ledger.append(sample(1)).unwrap();
            ledger.append(sample(2)).unwrap();
        }

        let reopened = TraceLedger::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.verify().unwrap(), 2);

        let third = reopened.append(sample(3)).unwrap();
        assert_eq!(third.id, 3);
        assert_eq!(TraceLedger::open(&path).unwrap().recent(1)[0].id, 3);
    }

    #[test]
    fn test_tampering_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("executions.jsonl");

        {
            let ledger = TraceLedger::open(&path).unwrap();
            ledger.append(sample(1)).unwrap();
            ledger.append(sample(2)).unwrap();
        }

        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.replace("user1@corp.com", "intruder@corp.com")).unwrap();

        match TraceLedger::open(&path) {
            Err(LedgerError::Integrity(msg)) => assert!(msg.contains("line 1")),
            other => panic!("expected integrity error, got {:?}", other.map(|l| l.len())),
        }
    }

    #[test]
    fn test_prune_rewrites_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("executions.jsonl");

        let old = LedgerLine {
            hash_chain: String::new(),
            record: ExecutionRecord {
                id: 1,
                ts: Utc::now() - Duration::days(400),
                endpoint: "/intents/create".into(),
                email: None,
                action: Some("create".into()),
                params: json!({}),
                ok: true,
                code: None,
                message: String::new(),
            },
        };
        let old = LedgerLine {
            hash_chain: to_hex(&chain_hash(&[0u8; 32], &old.record).unwrap()),
            ..old
        };
        fs::write(&path, format!("{}\n", serde_json::to_string(&old).unwrap())).unwrap();

        let ledger = TraceLedger::open(&path).unwrap();
        ledger.append(sample(2)).unwrap();
        assert_eq!(ledger.len(), 2);

        assert_eq!(ledger.prune_older_than(180).unwrap(), 1);
        assert_eq!(ledger.prune_older_than(180).unwrap(), 0);
        assert_eq!(ledger.recent(10)[0].id, 2);

        let reopened = TraceLedger::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.append(sample(3)).unwrap().id, 3);
    }

    #[test]
    fn test_torn_last_line_is_cut_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("executions.jsonl");

        {
            let ledger = TraceLedger::open(&path).unwrap();
            ledger.append(sample(1)).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"hash_chain":"ab"#).unwrap();
        drop(file);

        let ledger = TraceLedger::open(&path).unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.verify().unwrap(), 1);

        assert_eq!(ledger.append(sample(2)).unwrap().id, 2);
        let reopened = TraceLedger::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.recent(1)[0].params, json!({"page": 2}));
    }

    #[test]
    fn test_garbage_before_the_last_line_is_an_integrity_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("executions.jsonl");

        {
            let ledger = TraceLedger::open(&path).unwrap();
            ledger.append(sample(1)).unwrap();
        }
        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, format!("not json\n{}", content)).unwrap();

        match TraceLedger::open(&path) {
            Err(LedgerError::Integrity(msg)) => assert!(msg.contains("line 1")),
            other => panic!("expected integrity error, got {:?}", other.map(|l| l.len())),
        }
    }

    #[test]
    fn test_unterminated_last_line_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("executions.jsonl");

        {
            let ledger = TraceLedger::open(&path).unwrap();
            ledger.append(sample(1)).unwrap();
        }
        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.trim_end()).unwrap();

        let ledger = TraceLedger::open(&path).unwrap();
        assert_eq!(ledger.len(), 1);
        ledger.append(sample(2)).unwrap();
        assert_eq!(TraceLedger::open(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_memory_holds_only_the_newest_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("executions.jsonl");
        let total = TAIL_CAPACITY + 20;

        {
            let ledger = TraceLedger::open(&path).unwrap();
            for i in 0..total {
                ledger.append(sample(i)).unwrap();
            }
            assert_eq!(ledger.len(), total);
            assert_eq!(ledger.recent(usize::MAX).len(), TAIL_CAPACITY);
        }

        let reopened = TraceLedger::open(&path).unwrap();
        assert_eq!(reopened.len(), total);
        assert_eq!(reopened.verify().unwrap(), total);

        let recent = reopened.recent(usize::MAX);
        assert_eq!(recent.len(), TAIL_CAPACITY);
        assert_eq!(recent[0].id, total as u64);
        assert_eq!(recent[TAIL_CAPACITY - 1].id, 21);
    }

    #[test]
    fn test_config_defaults() {
        let config = TraceLedgerConfig::default();
        assert_eq!(config.path, PathBuf::from("data/trace/executions.jsonl"));
        assert_eq!(config.retention_days, 180);
    }
}
