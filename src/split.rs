//! Temporal Split
//!
//! Partitions a feature frame into a training prefix and an evaluation
//! suffix at a fixed fraction of the GLOBALLY time-sorted row order. The cut
//! is global, not per-entity: the trained oracle never sees information from
//! the future of any evaluation row, which approximates real deployment
//! causality. A building with sparse history may land entirely on one side
//! of the cut; that is accepted behavior, not corrected.

use crate::types::FeatureFrame;
use tracing::info;

/// Split the frame at `floor(len × train_fraction)` after a stable global
/// sort by timestamp. Returns `(train, eval)`.
///
/// `train_fraction` is validated at config load to lie strictly in (0, 1).
pub fn temporal_split(frame: &FeatureFrame, train_fraction: f64) -> (FeatureFrame, FeatureFrame) {
    let mut order: Vec<usize> = (0..frame.len()).collect();
    order.sort_by_key(|&i| frame.timestamps[i]);

    let split_idx = (frame.len() as f64 * train_fraction).floor() as usize;
    let train = frame.select_rows(&order[..split_idx]);
    let eval = frame.select_rows(&order[split_idx..]);

    info!(
        total_rows = frame.len(),
        train_rows = train.len(),
        eval_rows = eval.len(),
        "Temporal split"
    );

    (train, eval)
}
