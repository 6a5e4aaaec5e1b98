//! Batch partitioning: splits an inbound batch into worker-sized chunks,
//! preserving order and covering the batch exactly once.

use serde_json::Value;
use tensorbroker_protocol::PartialId;

/// A batch that fit in a single chunk carries no `@` suffix on the wire;
/// a partitioned batch does. Keeping this as a two-variant result (rather
/// than always emitting a one-element partitioned list) is what lets the
/// dispatcher produce a bare `JobId` chunk id for the common case.
pub enum BatchPlan {
    Whole(Vec<Value>),
    Partitioned(Vec<(PartialId, Vec<Value>)>),
}

impl BatchPlan {
    pub fn item_count(&self) -> usize {
        match self {
            BatchPlan::Whole(items) => items.len(),
            BatchPlan::Partitioned(chunks) => chunks.iter().map(|(_, c)| c.len()).sum(),
        }
    }
}

pub fn plan_batch(items: Vec<Value>, max_batch_size: usize) -> BatchPlan {
    if items.len() <= max_batch_size || max_batch_size == 0 {
        return BatchPlan::Whole(items);
    }

    let mut chunks = Vec::new();
    let mut offset: PartialId = 0;
    for chunk in items.chunks(max_batch_size) {
        chunks.push((offset, chunk.to_vec()));
        offset += chunk.len() as PartialId;
    }
    BatchPlan::Partitioned(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!(i)).collect()
    }

    #[test]
    fn batch_of_one_is_whole() {
        let plan = plan_batch(items(1), 8);
        match plan {
            BatchPlan::Whole(v) => assert_eq!(v.len(), 1),
            _ => panic!("expected whole batch"),
        }
    }

    #[test]
    fn batch_equal_to_max_is_whole() {
        let plan = plan_batch(items(8), 8);
        match plan {
            BatchPlan::Whole(v) => assert_eq!(v.len(), 8),
            _ => panic!("batch of exactly max_batch_size must not be partitioned"),
        }
    }

    #[test]
    fn batch_over_max_splits_into_two_chunks() {
        let plan = plan_batch(items(9), 8);
        match plan {
            BatchPlan::Partitioned(chunks) => {
                assert_eq!(chunks.len(), 2);
                assert_eq!(chunks[0].0, 0);
                assert_eq!(chunks[0].1.len(), 8);
                assert_eq!(chunks[1].0, 8);
                assert_eq!(chunks[1].1.len(), 1);
            }
            _ => panic!("expected partitioned batch"),
        }
    }

    #[test]
    fn partitioning_preserves_order_and_covers_exactly_once() {
        let plan = plan_batch(items(17), 8);
        match plan {
            BatchPlan::Partitioned(chunks) => {
                let mut seen = Vec::new();
                for (_, chunk) in &chunks {
                    seen.extend(chunk.iter().cloned());
                }
                assert_eq!(seen, items(17));
            }
            _ => panic!("expected partitioned batch"),
        }
    }
}
