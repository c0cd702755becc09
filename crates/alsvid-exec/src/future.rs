//! Serializable handles to in-flight backend jobs.
//!
//! [`AsyncSampleResult`] and [`AsyncObserveResult`] are durable references,
//! not language-level continuations: they carry only job ids and minimal
//! metadata, poll idempotently, and round-trip through a versioned string
//! blob so a job fired in one process can be collected in another.
//!
//! The serialized form deliberately omits the Hamiltonian: observe
//! reconstruction requires the caller to re-supply it, since the term
//! coefficients are needed to aggregate and are not worth persisting in
//! every handle. Dropping a handle never cancels the remote job.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use alsvid_core::{Hamiltonian, ObserveResult, SampleResult};
use alsvid_hal::{JobId, JobPoll, QpuBackend, RetryPolicy};

use crate::dispatch::DispatchState;
use crate::error::{ExecError, ExecResult, TermFailure};

/// Delay between polls while waiting on a pending job.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Envelope version this crate writes and accepts.
const ENVELOPE_VERSION: u32 = 1;

/// What kind of result a persisted future resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    /// Measurement counts.
    Sample,
    /// Expectation values.
    Observe,
}

/// The persisted-future wire format.
#[derive(Debug, Serialize, Deserialize)]
struct FutureEnvelope {
    version: u32,
    backend: String,
    kind: ResultKind,
    job_ids: Vec<String>,
}

impl FutureEnvelope {
    fn parse(blob: &str) -> ExecResult<Self> {
        let envelope: FutureEnvelope = serde_json::from_str(blob)
            .map_err(|e| ExecError::FutureFormat(format!("not a future envelope: {e}")))?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(ExecError::FutureFormat(format!(
                "unsupported envelope version {}, expected {ENVELOPE_VERSION}",
                envelope.version
            )));
        }
        Ok(envelope)
    }

    fn check_backend(&self, backend: &dyn QpuBackend) -> ExecResult<()> {
        if self.backend != backend.name() {
            return Err(ExecError::FutureFormat(format!(
                "future was created on backend '{}', got '{}'",
                self.backend,
                backend.name()
            )));
        }
        Ok(())
    }
}

/// Poll a single job once, through the retry policy.
async fn poll_once(
    backend: &Arc<dyn QpuBackend>,
    retry: &RetryPolicy,
    job_id: &JobId,
) -> ExecResult<JobPoll> {
    Ok(retry.run(|| backend.poll(job_id)).await?)
}

/// Z-parity expectation of a Pauli term's support from rotated counts.
pub(crate) fn term_expectation(sample: &SampleResult, support: &[u32]) -> f64 {
    if sample.shots() == 0 {
        return 0.0;
    }
    let signed: f64 = sample
        .counts()
        .iter()
        .map(|(bits, count)| {
            let bytes = bits.as_bytes();
            let ones = support
                .iter()
                .filter(|&&q| bytes.get(q as usize) == Some(&b'1'))
                .count();
            let sign = if ones % 2 == 0 { 1.0 } else { -1.0 };
            sign * count as f64
        })
        .sum();
    signed / sample.shots() as f64
}

/// Handle to an in-flight sampling job.
#[derive(Clone)]
pub struct AsyncSampleResult {
    backend: Arc<dyn QpuBackend>,
    retry: RetryPolicy,
    job_id: JobId,
}

impl AsyncSampleResult {
    pub(crate) fn new(backend: Arc<dyn QpuBackend>, retry: RetryPolicy, job_id: JobId) -> Self {
        Self {
            backend,
            retry,
            job_id,
        }
    }

    /// The backend job this handle tracks.
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Current aggregate state without blocking.
    pub async fn status(&self) -> ExecResult<DispatchState> {
        Ok(
            match poll_once(&self.backend, &self.retry, &self.job_id).await? {
                JobPoll::Pending => DispatchState::Dispatched,
                JobPoll::Counts(_) => DispatchState::Completed,
                JobPoll::Error(_) => DispatchState::Failed,
            },
        )
    }

    /// Block until counts are available, or until `timeout` elapses.
    ///
    /// Timing out leaves the handle valid; polling never consumes the
    /// backend-side job.
    pub async fn get(&self, timeout: Option<Duration>) -> ExecResult<SampleResult> {
        match timeout {
            Some(waited) => tokio::time::timeout(waited, self.wait())
                .await
                .map_err(|_| ExecError::Timeout { waited })?,
            None => self.wait().await,
        }
    }

    async fn wait(&self) -> ExecResult<SampleResult> {
        loop {
            match poll_once(&self.backend, &self.retry, &self.job_id).await? {
                JobPoll::Pending => tokio::time::sleep(POLL_INTERVAL).await,
                JobPoll::Counts(counts) => {
                    debug!(job_id = %self.job_id, state = %DispatchState::Completed, "sample collected");
                    return Ok(SampleResult::from_counts(counts));
                }
                JobPoll::Error(diagnostic) => {
                    return Err(ExecError::JobFailed {
                        job_id: self.job_id.0.clone(),
                        diagnostic,
                    });
                }
            }
        }
    }

    /// Persist this handle as a versioned string blob.
    pub fn serialize(&self) -> ExecResult<String> {
        let envelope = FutureEnvelope {
            version: ENVELOPE_VERSION,
            backend: self.backend.name().to_string(),
            kind: ResultKind::Sample,
            job_ids: vec![self.job_id.0.clone()],
        };
        serde_json::to_string(&envelope)
            .map_err(|e| ExecError::FutureFormat(format!("serialization failed: {e}")))
    }

    /// Reconstruct a handle from a persisted blob and the backend it was
    /// created on.
    pub fn deserialize(blob: &str, backend: Arc<dyn QpuBackend>) -> ExecResult<Self> {
        let envelope = FutureEnvelope::parse(blob)?;
        if envelope.kind != ResultKind::Sample {
            return Err(ExecError::FutureFormat(
                "envelope holds an observe future, not a sample future".into(),
            ));
        }
        envelope.check_backend(backend.as_ref())?;
        let [job_id] = envelope.job_ids.as_slice() else {
            return Err(ExecError::FutureFormat(format!(
                "sample future must hold exactly one job id, got {}",
                envelope.job_ids.len()
            )));
        };
        Ok(Self {
            backend,
            retry: RetryPolicy::default(),
            job_id: JobId::new(job_id.clone()),
        })
    }
}

impl std::fmt::Debug for AsyncSampleResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncSampleResult")
            .field("backend", &self.backend.name())
            .field("retry", &self.retry)
            .field("job_id", &self.job_id)
            .finish()
    }
}

/// Handle to the in-flight jobs of a multi-term observe request.
#[derive(Clone)]
pub struct AsyncObserveResult {
    backend: Arc<dyn QpuBackend>,
    retry: RetryPolicy,
    /// One job per non-identity term, in term order.
    job_ids: Vec<JobId>,
    hamiltonian: Hamiltonian,
}

impl AsyncObserveResult {
    pub(crate) fn new(
        backend: Arc<dyn QpuBackend>,
        retry: RetryPolicy,
        job_ids: Vec<JobId>,
        hamiltonian: Hamiltonian,
    ) -> Self {
        Self {
            backend,
            retry,
            job_ids,
            hamiltonian,
        }
    }

    /// The backend jobs this handle tracks, in term order.
    pub fn job_ids(&self) -> &[JobId] {
        &self.job_ids
    }

    /// The Hamiltonian snapshot used for aggregation.
    pub fn hamiltonian(&self) -> &Hamiltonian {
        &self.hamiltonian
    }

    /// Current aggregate state without blocking.
    ///
    /// `Failed` wins over `Dispatched`, which wins over `Completed`.
    pub async fn status(&self) -> ExecResult<DispatchState> {
        let mut state = DispatchState::Completed;
        for job_id in &self.job_ids {
            match poll_once(&self.backend, &self.retry, job_id).await? {
                JobPoll::Error(_) => return Ok(DispatchState::Failed),
                JobPoll::Pending => state = DispatchState::Dispatched,
                JobPoll::Counts(_) => {}
            }
        }
        Ok(state)
    }

    /// Block until every term's expectation is recorded, or until
    /// `timeout` elapses.
    pub async fn get(&self, timeout: Option<Duration>) -> ExecResult<ObserveResult> {
        match timeout {
            Some(waited) => tokio::time::timeout(waited, self.wait())
                .await
                .map_err(|_| ExecError::Timeout { waited })?,
            None => self.wait().await,
        }
    }

    async fn wait(&self) -> ExecResult<ObserveResult> {
        let mut result = ObserveResult::new(self.hamiltonian.clone());

        // Re-derive the term → job mapping from the Hamiltonian: identity
        // terms were never dispatched and resolve to expectation 1 locally.
        let mut outstanding: Vec<(usize, JobId, Vec<u32>)> = Vec::new();
        let mut job_iter = self.job_ids.iter();
        for (index, term) in self.hamiltonian.terms().iter().enumerate() {
            if term.pauli.is_identity() {
                result.record(index, 1.0);
                continue;
            }
            let Some(job_id) = job_iter.next() else {
                return Err(ExecError::FutureFormat(format!(
                    "future holds {} job id(s) but the Hamiltonian has more non-identity terms",
                    self.job_ids.len()
                )));
            };
            result.set_job_id(index, job_id.0.clone());
            outstanding.push((index, job_id.clone(), term.pauli.support().collect()));
        }
        if job_iter.next().is_some() {
            return Err(ExecError::FutureFormat(format!(
                "future holds {} job id(s), more than the Hamiltonian's non-identity terms",
                self.job_ids.len()
            )));
        }

        // Poll every job to a terminal state; one term failing must not
        // discard the terms that already completed.
        let mut failures: Vec<TermFailure> = Vec::new();
        while !outstanding.is_empty() {
            let mut still_pending = Vec::new();
            for (index, job_id, support) in outstanding {
                match poll_once(&self.backend, &self.retry, &job_id).await? {
                    JobPoll::Pending => still_pending.push((index, job_id, support)),
                    JobPoll::Counts(counts) => {
                        let sample = SampleResult::from_counts(counts);
                        result.record(index, term_expectation(&sample, &support));
                    }
                    JobPoll::Error(diagnostic) => failures.push(TermFailure {
                        term_index: index,
                        job_id: job_id.0.clone(),
                        diagnostic,
                    }),
                }
            }
            if !still_pending.is_empty() {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            outstanding = still_pending;
        }

        if !failures.is_empty() {
            failures.sort_by_key(|f| f.term_index);
            debug!(failed = failures.len(), state = %DispatchState::Failed, "observe terms failed");
            return Err(ExecError::TermsFailed {
                failures,
                partial: Box::new(result),
            });
        }

        debug!(state = %DispatchState::Completed, "observe collected");
        Ok(result)
    }

    /// Persist this handle as a versioned string blob.
    ///
    /// The Hamiltonian is not included; it must be re-supplied to
    /// [`AsyncObserveResult::deserialize`].
    pub fn serialize(&self) -> ExecResult<String> {
        let envelope = FutureEnvelope {
            version: ENVELOPE_VERSION,
            backend: self.backend.name().to_string(),
            kind: ResultKind::Observe,
            job_ids: self.job_ids.iter().map(|j| j.0.clone()).collect(),
        };
        serde_json::to_string(&envelope)
            .map_err(|e| ExecError::FutureFormat(format!("serialization failed: {e}")))
    }

    /// Reconstruct a handle from a persisted blob, the backend it was
    /// created on, and the original Hamiltonian.
    pub fn deserialize(
        blob: &str,
        backend: Arc<dyn QpuBackend>,
        hamiltonian: Hamiltonian,
    ) -> ExecResult<Self> {
        let envelope = FutureEnvelope::parse(blob)?;
        if envelope.kind != ResultKind::Observe {
            return Err(ExecError::FutureFormat(
                "envelope holds a sample future, not an observe future".into(),
            ));
        }
        envelope.check_backend(backend.as_ref())?;

        let expected_jobs = hamiltonian
            .terms()
            .iter()
            .filter(|t| !t.pauli.is_identity())
            .count();
        if envelope.job_ids.len() != expected_jobs {
            return Err(ExecError::FutureFormat(format!(
                "future holds {} job id(s) but the Hamiltonian has {expected_jobs} non-identity term(s)",
                envelope.job_ids.len()
            )));
        }

        Ok(Self {
            backend,
            retry: RetryPolicy::default(),
            job_ids: envelope.job_ids.into_iter().map(JobId::new).collect(),
            hamiltonian,
        })
    }
}

impl std::fmt::Debug for AsyncObserveResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncObserveResult")
            .field("backend", &self.backend.name())
            .field("retry", &self.retry)
            .field("job_ids", &self.job_ids)
            .field("hamiltonian", &self.hamiltonian)
            .finish()
    }
}
