//! Measurement-count and expectation-value containers.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::hamiltonian::Hamiltonian;

/// Measurement counts keyed by bitstring.
///
/// Iteration order is first-seen order, which for simulator backends means
/// the order outcomes were first sampled in. `insert` accumulates, so
/// repeated bitstrings increment the stored count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<(String, u64)>", into = "Vec<(String, u64)>")]
pub struct Counts {
    entries: Vec<(String, u64)>,
    index: FxHashMap<String, usize>,
}

impl Counts {
    /// Create an empty count map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` occurrences of `bitstring`.
    pub fn insert(&mut self, bitstring: impl Into<String>, count: u64) {
        let bitstring = bitstring.into();
        if let Some(&i) = self.index.get(&bitstring) {
            self.entries[i].1 += count;
        } else {
            self.index.insert(bitstring.clone(), self.entries.len());
            self.entries.push((bitstring, count));
        }
    }

    /// Count recorded for a bitstring (0 if unseen).
    pub fn get(&self, bitstring: &str) -> u64 {
        self.index
            .get(bitstring)
            .map_or(0, |&i| self.entries[i].1)
    }

    /// Number of distinct bitstrings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no outcomes were recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(bitstring, count)` in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(b, c)| (b.as_str(), *c))
    }

    /// The most frequent outcome, if any.
    pub fn most_frequent(&self) -> Option<(&str, u64)> {
        self.entries
            .iter()
            .max_by_key(|(_, c)| *c)
            .map(|(b, c)| (b.as_str(), *c))
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, c)| *c).sum()
    }
}

impl std::fmt::Display for Counts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (bitstring, count) in self.iter() {
            write!(f, " {bitstring}:{count}")?;
        }
        write!(f, " }}")
    }
}

impl From<Vec<(String, u64)>> for Counts {
    fn from(pairs: Vec<(String, u64)>) -> Self {
        let mut counts = Counts::new();
        for (b, c) in pairs {
            counts.insert(b, c);
        }
        counts
    }
}

impl From<Counts> for Vec<(String, u64)> {
    fn from(counts: Counts) -> Self {
        counts.entries
    }
}

/// The outcome of sampling a kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleResult {
    counts: Counts,
    shots: u64,
    register_name: Option<String>,
}

impl SampleResult {
    /// Build from counts; the shot count is the sum of all counts, so the
    /// `sum(counts) == shots` invariant holds by construction.
    pub fn from_counts(counts: Counts) -> Self {
        let shots = counts.total();
        Self {
            counts,
            shots,
            register_name: None,
        }
    }

    /// Tag the result with the measured register's name.
    pub fn with_register_name(mut self, name: impl Into<String>) -> Self {
        self.register_name = Some(name.into());
        self
    }

    /// The measurement counts.
    pub fn counts(&self) -> &Counts {
        &self.counts
    }

    /// Total number of shots.
    pub fn shots(&self) -> u64 {
        self.shots
    }

    /// The measured register's name, if tagged.
    pub fn register_name(&self) -> Option<&str> {
        self.register_name.as_deref()
    }

    /// Empirical probability of a bitstring.
    pub fn probability(&self, bitstring: &str) -> f64 {
        if self.shots == 0 {
            return 0.0;
        }
        self.counts.get(bitstring) as f64 / self.shots as f64
    }

    /// Z-parity expectation over all measured bits:
    /// `Σ (-1)^popcount(bits) · p(bits)`.
    pub fn expectation(&self) -> f64 {
        if self.shots == 0 {
            return 0.0;
        }
        let signed: f64 = self
            .counts
            .iter()
            .map(|(bits, count)| {
                let ones = bits.chars().filter(|c| *c == '1').count();
                let sign = if ones % 2 == 0 { 1.0 } else { -1.0 };
                sign * count as f64
            })
            .sum();
        signed / self.shots as f64
    }
}

impl std::fmt::Display for SampleResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.register_name {
            Some(name) => write!(f, "{name}: {} ({} shots)", self.counts, self.shots),
            None => write!(f, "{} ({} shots)", self.counts, self.shots),
        }
    }
}

/// Per-term measurement record for an observe run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermExpectation {
    /// Backend job that measured this term, if one was dispatched.
    pub job_id: Option<String>,
    /// Measured expectation, once the term's job completed.
    pub value: Option<f64>,
}

/// The outcome of observing a Hamiltonian on a kernel.
///
/// Holds the Hamiltonian snapshot and one [`TermExpectation`] per term, in
/// term order. Aggregation refuses to run until every term has a recorded
/// value: partial sums are never returned silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserveResult {
    hamiltonian: Hamiltonian,
    terms: Vec<TermExpectation>,
}

impl ObserveResult {
    /// Create an empty result for the given Hamiltonian.
    pub fn new(hamiltonian: Hamiltonian) -> Self {
        let terms = vec![
            TermExpectation {
                job_id: None,
                value: None,
            };
            hamiltonian.n_terms()
        ];
        Self { hamiltonian, terms }
    }

    /// The Hamiltonian this result was measured against.
    pub fn hamiltonian(&self) -> &Hamiltonian {
        &self.hamiltonian
    }

    /// Number of terms.
    pub fn n_terms(&self) -> usize {
        self.terms.len()
    }

    /// Attach the backend job id that measures a term.
    pub fn set_job_id(&mut self, term_index: usize, job_id: impl Into<String>) {
        if let Some(t) = self.terms.get_mut(term_index) {
            t.job_id = Some(job_id.into());
        }
    }

    /// Record a term's measured expectation.
    pub fn record(&mut self, term_index: usize, value: f64) {
        if let Some(t) = self.terms.get_mut(term_index) {
            t.value = Some(value);
        }
    }

    /// The per-term records, in term order.
    pub fn terms(&self) -> &[TermExpectation] {
        &self.terms
    }

    /// A single term's expectation.
    pub fn term_expectation(&self, term_index: usize) -> CoreResult<f64> {
        self.terms
            .get(term_index)
            .and_then(|t| t.value)
            .ok_or(CoreError::MissingTermExpectation { term_index })
    }

    /// Whether every term has a recorded expectation.
    pub fn is_complete(&self) -> bool {
        self.terms.iter().all(|t| t.value.is_some())
    }

    /// The weighted sum `Σ c_k·⟨P_k⟩`.
    ///
    /// Fails with [`CoreError::MissingTermExpectation`] if any term has no
    /// recorded value.
    pub fn expectation(&self) -> CoreResult<f64> {
        let mut total = 0.0;
        for (i, (term, record)) in self
            .hamiltonian
            .terms()
            .iter()
            .zip(self.terms.iter())
            .enumerate()
        {
            let value = record
                .value
                .ok_or(CoreError::MissingTermExpectation { term_index: i })?;
            total += term.coeff * value;
        }
        Ok(total)
    }
}
