use super::{evaluate_binary, is_valid_gain, parent_score, SplitCandidate, SplitKind, SplitSettings, TargetStats};
use fixedbitset::FixedBitSet;
use crate::data::BitColumn;
use crate::memberships::DataMemberships;

/// Zeros left, ones right. There is only one way to split a bit, so no tie breaking.
pub(super) fn best_split<S: TargetStats>(
    column: &BitColumn,
    column_index: usize,
    memberships: &DataMemberships,
    node: &S,
    settings: &SplitSettings,
) -> Option<SplitCandidate> {
    let mut zeros = node.empty();
    let mut ones = node.empty();
    let mut missing = node.empty();
    let mut missed_rows = FixedBitSet::with_capacity(memberships.row_count());
    for e in memberships.entries() {
        match column.value(e.original) {
            Some(false) => zeros.add_row(e.original, e.weight),
            Some(true) => ones.add_row(e.original, e.weight),
            None => {
                missed_rows.insert(e.local);
                missing.add_row(e.original, e.weight);
            }
        }
    }
    let mut present = zeros.clone();
    present.add(&ones);
    let score = parent_score(node, &present, &missing, settings);
    let (gain, missings_go_left) = evaluate_binary(score, &zeros, &ones, &missing, settings)?;
    if !is_valid_gain(gain) {
        return None;
    }
    Some(SplitCandidate {
        column: column_index,
        gain,
        missed_rows,
        kind: SplitKind::BitVector {
            missing_child: usize::from(!missings_go_left),
        },
    })
}
