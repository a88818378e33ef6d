// log.rs: Append-only JSONL decision log.
//
// One DecisionRecord per line. `previous_hash` of each line is the SHA-256
// of the raw text of the line before it, so the file is a hash chain.
//
// On top of the chain, `verify_chain` replays the engine's own guarantees
// per session: sequence numbers run 0, 1, 2, ... with no gaps, and nothing
// is decided after a Kill or Finish. A forged line that keeps the chain
// intact still has to respect both.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tg_policy::{OutcomeCode, PolicyDecision};
use uuid::Uuid;

use crate::error::AuditError;
use crate::hasher;
use crate::record::DecisionRecord;

/// Writes decision records and links each one to its predecessor.
pub struct DecisionLog {
    sink: Box<dyn Write + Send>,
    path: Option<PathBuf>,
    chain_tip: Option<String>,
}

impl DecisionLog {
    /// Open (or create) a log file. New records extend the chain already
    /// in the file.
    ///
    /// Only regular files are accepted: a device or FIFO could never be
    /// scanned to its end.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let open_failed = |source: io::Error| AuditError::OpenFailed {
            path: path.clone(),
            source,
        };

        let chain_tip = match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => last_line_hash(&path)?,
            Ok(_) => {
                return Err(open_failed(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "not a regular file",
                )))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(open_failed(e)),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(open_failed)?;

        tracing::debug!(
            "decision log {} opened ({})",
            path.display(),
            if chain_tip.is_some() { "resuming chain" } else { "new chain" }
        );

        Ok(Self {
            sink: Box::new(file),
            path: Some(path),
            chain_tip,
        })
    }

    /// A log that writes to an arbitrary sink (a pipe, stdout) and starts a
    /// fresh chain.
    pub fn to_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            sink: Box::new(writer),
            path: None,
            chain_tip: None,
        }
    }

    /// Link `record` to the chain and write it as one line, flushed
    /// immediately: the supervisor may be killed at any point.
    ///
    /// The chain only advances once the line is fully written; nothing is
    /// left buffered after a failed write.
    pub fn append(&mut self, record: &mut DecisionRecord) -> Result<(), AuditError> {
        record.previous_hash = self.chain_tip.clone();
        let line = serde_json::to_string(record)?;

        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.sink.write_all(&bytes)?;
        self.sink.flush()?;

        self.chain_tip = Some(hasher::hash_str(&line));
        Ok(())
    }

    /// The backing file, when the log has one.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Every record in file order.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<DecisionRecord>, AuditError> {
        let mut records = Vec::new();
        for_each_line(path.as_ref(), |_, _, record| {
            records.push(record);
            Ok(())
        })?;
        Ok(records)
    }

    /// Check the hash chain and the per-session ordering rules.
    ///
    /// Stops at the first offending line. On success returns what each
    /// session in the log did.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<ChainReport, AuditError> {
        let mut report = ChainReport::default();
        let mut expected_hash: Option<String> = None;

        for_each_line(path.as_ref(), |line, raw, record| {
            if record.previous_hash != expected_hash {
                return Err(AuditError::IntegrityViolation {
                    line,
                    expected: expected_hash.clone().unwrap_or_else(|| "None".to_string()),
                    actual: record
                        .previous_hash
                        .clone()
                        .unwrap_or_else(|| "None".to_string()),
                });
            }
            expected_hash = Some(hasher::hash_str(raw));

            report
                .sessions
                .entry(record.session_id)
                .or_default()
                .admit(line, &record)?;
            report.records += 1;
            Ok(())
        })?;

        Ok(report)
    }
}

impl std::fmt::Debug for DecisionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionLog")
            .field("path", &self.path)
            .field("chain_tip", &self.chain_tip)
            .finish_non_exhaustive()
    }
}

/// Result of a successful `verify_chain`.
#[derive(Debug, Clone, Default)]
pub struct ChainReport {
    /// Number of records checked.
    pub records: usize,
    pub sessions: BTreeMap<Uuid, SessionTrail>,
}

/// What one session left in the log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTrail {
    /// Decisions logged for the session. Also the next expected sequence.
    pub decisions: u64,
    /// The Kill or Finish that ended the session, if logged.
    pub terminal: Option<PolicyDecision>,
    /// Denial message recorded with a terminal Kill.
    pub denial_message: Option<String>,
}

impl SessionTrail {
    /// RF/OK/AT from the terminal decision, PD if the session never ended.
    pub fn outcome(&self) -> OutcomeCode {
        match &self.terminal {
            Some(PolicyDecision::Kill { reason }) => *reason,
            Some(PolicyDecision::Finish { result, .. }) => *result,
            Some(PolicyDecision::Continue) | None => OutcomeCode::Pd,
        }
    }

    fn admit(&mut self, line: usize, record: &DecisionRecord) -> Result<(), AuditError> {
        if self.terminal.is_some() {
            return Err(AuditError::RecordAfterTerminal {
                line,
                session_id: record.session_id,
            });
        }
        if record.sequence != self.decisions {
            return Err(AuditError::SequenceGap {
                line,
                session_id: record.session_id,
                expected: self.decisions,
                actual: record.sequence,
            });
        }
        self.decisions += 1;
        if record.decision.is_terminal() {
            self.terminal = Some(record.decision.clone());
            self.denial_message = record.denial_message.clone();
        }
        Ok(())
    }
}

/// Parse every non-blank line, passing its 1-based number and raw text
/// along with the record.
fn for_each_line(
    path: &Path,
    mut visit: impl FnMut(usize, &str, DecisionRecord) -> Result<(), AuditError>,
) -> Result<(), AuditError> {
    let file = File::open(path).map_err(|source| AuditError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    for (index, raw) in BufReader::new(file).lines().enumerate() {
        let raw = raw?;
        if raw.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&raw)?;
        visit(index + 1, &raw, record)?;
    }
    Ok(())
}

fn last_line_hash(path: &Path) -> Result<Option<String>, AuditError> {
    let mut tip = None;
    for_each_raw_line(path, |raw| tip = Some(hasher::hash_str(raw)))?;
    Ok(tip)
}

fn for_each_raw_line(path: &Path, mut visit: impl FnMut(&str)) -> Result<(), AuditError> {
    let file = File::open(path).map_err(|source| AuditError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    for raw in BufReader::new(file).lines() {
        let raw = raw?;
        if !raw.trim().is_empty() {
            visit(&raw);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;
    use tg_policy::{EventKind, ExitDetails};

    fn record(session: Uuid, sequence: u64, decision: PolicyDecision) -> DecisionRecord {
        DecisionRecord::new(session, sequence, EventKind::Call, 1, decision)
    }

    fn finish_ok() -> PolicyDecision {
        PolicyDecision::Finish {
            result: OutcomeCode::Ok,
            details: ExitDetails::with_exit_code(0),
        }
    }

    fn write(path: &Path, records: Vec<DecisionRecord>) {
        let mut log = DecisionLog::open(path).unwrap();
        for mut r in records {
            log.append(&mut r).unwrap();
        }
    }

    #[test]
    fn append_and_read_back() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("decisions.jsonl");
        let session = Uuid::new_v4();
        write(
            &log_path,
            vec![
                record(session, 0, PolicyDecision::Continue),
                record(session, 1, PolicyDecision::kill_rf()).with_denial("ILLEGAL SYSTEM CALL (#59)"),
            ],
        );

        let records = DecisionLog::read_all(&log_path).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].previous_hash.is_none());
        let content = fs::read_to_string(&log_path).unwrap();
        let first_line = content.lines().next().unwrap();
        assert_eq!(records[1].previous_hash, Some(hasher::hash_str(first_line)));
    }

    #[test]
    fn report_summarizes_each_session() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("decisions.jsonl");
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        write(
            &log_path,
            vec![
                record(a, 0, PolicyDecision::Continue),
                record(b, 0, PolicyDecision::Continue),
                record(a, 1, PolicyDecision::kill_rf()).with_denial("ILLEGAL SYSTEM CALL (#57)"),
                record(b, 1, finish_ok()),
                record(c, 0, PolicyDecision::Continue),
            ],
        );

        let report = DecisionLog::verify_chain(&log_path).unwrap();
        assert_eq!(report.records, 5);
        assert_eq!(report.sessions.len(), 3);
        assert_eq!(report.sessions[&a].outcome(), OutcomeCode::Rf);
        assert_eq!(
            report.sessions[&a].denial_message.as_deref(),
            Some("ILLEGAL SYSTEM CALL (#57)")
        );
        assert_eq!(report.sessions[&b].outcome(), OutcomeCode::Ok);
        assert_eq!(report.sessions[&c].outcome(), OutcomeCode::Pd);
        assert_eq!(report.sessions[&c].decisions, 1);
    }

    #[test]
    fn reopen_resumes_chain() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("decisions.jsonl");
        write(&log_path, vec![record(Uuid::new_v4(), 0, PolicyDecision::Continue)]);
        write(&log_path, vec![record(Uuid::new_v4(), 0, PolicyDecision::kill_rf())]);
        assert_eq!(DecisionLog::verify_chain(&log_path).unwrap().records, 2);
    }

    #[test]
    fn removed_denial_breaks_chain() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("decisions.jsonl");
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        write(
            &log_path,
            vec![
                record(a, 0, PolicyDecision::Continue),
                record(a, 1, PolicyDecision::kill_rf()),
                record(b, 0, PolicyDecision::Continue),
            ],
        );

        let content = fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        fs::write(&log_path, format!("{}\n{}\n", lines[0], lines[2])).unwrap();

        match DecisionLog::verify_chain(&log_path) {
            Err(AuditError::IntegrityViolation { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected IntegrityViolation, got {:?}", other),
        }
    }

    #[test]
    fn skipped_sequence_is_detected() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("decisions.jsonl");
        let session = Uuid::new_v4();
        write(
            &log_path,
            vec![
                record(session, 0, PolicyDecision::Continue),
                record(session, 2, PolicyDecision::Continue),
            ],
        );

        match DecisionLog::verify_chain(&log_path) {
            Err(AuditError::SequenceGap {
                line,
                session_id,
                expected,
                actual,
            }) => {
                assert_eq!((line, expected, actual), (2, 1, 2));
                assert_eq!(session_id, session);
            }
            other => panic!("expected SequenceGap, got {:?}", other),
        }
    }

    #[test]
    fn decision_after_kill_is_detected() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("decisions.jsonl");
        let session = Uuid::new_v4();
        write(
            &log_path,
            vec![
                record(session, 0, PolicyDecision::kill_rf()),
                record(session, 1, PolicyDecision::Continue),
            ],
        );

        let err = DecisionLog::verify_chain(&log_path).unwrap_err();
        assert!(err.is_tampering());
        match err {
            AuditError::RecordAfterTerminal { line, .. } => assert_eq!(line, 2),
            other => panic!("expected RecordAfterTerminal, got {:?}", other),
        }
    }

    #[test]
    fn directory_is_not_a_log() {
        let dir = tempdir().unwrap();
        match DecisionLog::open(dir.path()) {
            Err(AuditError::OpenFailed { source, .. }) => {
                assert_eq!(source.kind(), io::ErrorKind::InvalidInput)
            }
            other => panic!("expected OpenFailed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn endless_device_is_not_a_log() {
        assert!(matches!(
            DecisionLog::open("/dev/zero"),
            Err(AuditError::OpenFailed { .. })
        ));
    }

    #[test]
    fn missing_log_is_open_failure() {
        let dir = tempdir().unwrap();
        match DecisionLog::read_all(dir.path().join("absent.jsonl")) {
            Err(AuditError::OpenFailed { .. }) => {}
            other => panic!("expected OpenFailed, got {:?}", other),
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_log_chains_from_scratch() {
        let buffer = SharedBuffer::default();
        let mut log = DecisionLog::to_writer(buffer.clone());
        assert!(log.path().is_none());
        let session = Uuid::new_v4();
        log.append(&mut record(session, 0, PolicyDecision::Continue)).unwrap();
        log.append(&mut record(session, 1, finish_ok())).unwrap();

        let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("copy.jsonl");
        fs::write(&log_path, text).unwrap();
        let report = DecisionLog::verify_chain(&log_path).unwrap();
        assert_eq!(report.sessions[&session].outcome(), OutcomeCode::Ok);
    }
}
