//! Device discovery. GPU/CPU device selection is an external collaborator
//! in the core; this stands in with an all-CPU assignment.

/// Returns a `worker_index -> device_id` map of length `num_worker`.
/// `-1` means CPU. Real device discovery (querying installed GPUs,
/// honoring `gpu_memory_fraction`) is out of scope for the core broker.
pub fn discover_devices(num_worker: usize, use_gpu: bool) -> Vec<i32> {
    if !use_gpu {
        return vec![-1; num_worker];
    }
    // No GPU discovery mechanism is wired in; fall back to CPU for every
    // worker rather than guessing device ids.
    vec![-1; num_worker]
}
