//! Fixed-size batch planning for rate-limited requests

use std::ops::Range;
use std::time::Duration;

/// One batch of a wave of requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 0-based batch number within the wave
    pub index: usize,

    /// Task indices covered by this batch
    pub range: Range<usize>,

    /// Pause before issuing the batch; zero for the first batch
    pub delay_before: Duration,
}

/// Splits `total` tasks into `ceil(total / batch_size)` consecutive batches
///
/// Every batch except the first waits `delay` before it starts. A
/// `batch_size` of zero is treated as one.
pub fn plan_batches(total: usize, batch_size: usize, delay: Duration) -> Vec<Batch> {
    let batch_size = batch_size.max(1);

    (0..total.div_ceil(batch_size))
        .map(|index| {
            let start = index * batch_size;
            Batch {
                index,
                range: start..(start + batch_size).min(total),
                delay_before: if index == 0 { Duration::ZERO } else { delay },
            }
        })
        .collect()
}
