//! Sink-local job bookkeeping: `expected_count`, `received_count`, and
//! `parts`, kept together per Job so the three tables can never drift out
//! of sync with each other.
//!
//! This is deliberately socket-free so it can be driven directly from
//! tests without a live transport.

use std::collections::HashMap;

use tensorbroker_protocol::{ChunkId, JobId, PartialId, Tensor};
use tracing::warn;

#[derive(Default)]
struct JobEntry {
    expected_count: Option<u64>,
    received_count: u64,
    parts: Vec<(PartialId, Tensor)>,
}

/// Tracks every in-flight Job from registration through delivery.
#[derive(Default)]
pub struct JobTable {
    jobs: HashMap<JobId, JobEntry>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn contains(&self, job: &JobId) -> bool {
        self.jobs.contains_key(job)
    }

    /// Current `(received_count, expected_count)` for a Job, if it has any
    /// state in the table yet (registered, has buffered partials, or both).
    pub fn progress(&self, job: &JobId) -> Option<(u64, Option<u64>)> {
        self.jobs
            .get(job)
            .map(|entry| (entry.received_count, entry.expected_count))
    }

    /// Record the expected row count for a Job, as announced by the
    /// Ventilator's `REGISTER` control message. A Job may already have
    /// buffered partials that arrived first under congestion; registering
    /// can complete it immediately.
    pub fn register(&mut self, job: JobId, expected_count: u64) -> Option<(JobId, Tensor)> {
        let entry = self.jobs.entry(job.clone()).or_default();
        entry.expected_count = Some(expected_count);
        self.try_complete(&job)
    }

    /// Accept a partial result tensor for the chunk it was tagged with.
    /// Buffers it and, if this was the last outstanding partial for its
    /// Job, removes the Job's entries and returns the reassembled tensor.
    pub fn accept_partial(&mut self, chunk: ChunkId, tensor: Tensor) -> Option<(JobId, Tensor)> {
        let job = chunk.job.clone();
        let rows = tensor.rows();
        let entry = self.jobs.entry(job.clone()).or_default();

        if let Some(expected) = entry.expected_count {
            if entry.received_count + rows > expected {
                warn!(
                    job = %job,
                    received = entry.received_count,
                    incoming = rows,
                    expected,
                    "partial would exceed expected row count, refusing completion"
                );
                return None;
            }
        }

        entry.received_count += rows;
        entry.parts.push((chunk.partial_or_zero(), tensor));

        self.try_complete(&job)
    }

    fn try_complete(&mut self, job: &JobId) -> Option<(JobId, Tensor)> {
        let ready = self
            .jobs
            .get(job)
            .map(|entry| entry.expected_count == Some(entry.received_count))
            .unwrap_or(false);

        if !ready {
            return None;
        }

        let entry = self.jobs.remove(job)?;
        let mut parts = entry.parts;
        parts.sort_by_key(|(partial_id, _)| *partial_id);
        let tensors: Vec<Tensor> = parts.into_iter().map(|(_, tensor)| tensor).collect();

        match Tensor::concat(tensors) {
            Ok(tensor) => Some((job.clone(), tensor)),
            Err(e) => {
                warn!(job = %job, error = %e, "failed to concatenate completed job's parts");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensorbroker_protocol::{ClientAddr, DType, ReqId};

    fn job(id: &str) -> JobId {
        let (c, r) = id.split_once('#').unwrap();
        JobId::new(
            ClientAddr::new(c.as_bytes().to_vec()).unwrap(),
            ReqId::new(r.as_bytes().to_vec()).unwrap(),
        )
    }

    fn tensor(rows: u64) -> Tensor {
        Tensor::new(DType::Float32, vec![rows, 1], vec![0u8; rows as usize * 4]).unwrap()
    }

    #[test]
    fn single_chunk_job_completes_on_first_partial() {
        let mut table = JobTable::new();
        let j = job("c#r");
        table.register(j.clone(), 3);
        let result = table.accept_partial(ChunkId::whole(j.clone()), tensor(3));
        assert!(result.is_some());
        assert!(table.is_empty());
    }

    #[test]
    fn partitioned_job_completes_only_once_all_parts_arrive() {
        let mut table = JobTable::new();
        let j = job("c#r");
        table.register(j.clone(), 9);
        assert!(table
            .accept_partial(ChunkId::part(j.clone(), 0), tensor(8))
            .is_none());
        let result = table.accept_partial(ChunkId::part(j.clone(), 8), tensor(1));
        assert!(result.is_some());
        let (_, tensor) = result.unwrap();
        assert_eq!(tensor.rows(), 9);
    }

    #[test]
    fn out_of_order_parts_reassemble_in_partial_id_order() {
        let mut table = JobTable::new();
        let j = job("c#r");
        table.register(j.clone(), 3);
        table.accept_partial(ChunkId::part(j.clone(), 2), tensor(1));
        let result = table.accept_partial(ChunkId::part(j.clone(), 0), tensor(2));
        assert!(result.is_some());
    }

    #[test]
    fn partial_arriving_before_register_is_buffered() {
        let mut table = JobTable::new();
        let j = job("c#r");
        assert!(table
            .accept_partial(ChunkId::whole(j.clone()), tensor(3))
            .is_none());
        assert!(table.contains(&j));
        let result = table.register(j.clone(), 3);
        assert!(result.is_some());
    }

    #[test]
    fn overshooting_expected_count_refuses_completion() {
        let mut table = JobTable::new();
        let j = job("c#r");
        table.register(j.clone(), 2);
        let result = table.accept_partial(ChunkId::whole(j.clone()), tensor(3));
        assert!(result.is_none());
        assert!(table.contains(&j));
    }

    #[test]
    fn progress_reports_none_for_unknown_job() {
        let table = JobTable::new();
        let j = job("c#r");
        assert_eq!(table.progress(&j), None);
    }

    #[test]
    fn progress_tracks_received_and_expected_across_partials() {
        let mut table = JobTable::new();
        let j = job("c#r");
        table.register(j.clone(), 9);
        assert_eq!(table.progress(&j), Some((0, Some(9))));
        table.accept_partial(ChunkId::part(j.clone(), 0), tensor(8));
        assert_eq!(table.progress(&j), Some((8, Some(9))));
    }
}
