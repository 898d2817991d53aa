use super::{
    evaluate_binary, is_valid_gain, parent_score, NominalPartition, SplitCandidate, SplitKind, SplitSettings,
    TargetStats, TieBreaker,
};
use crate::bitset;
use crate::constants::{MAX_FULL_ENUMERATION_VALUES, MAX_RANDOM_PARTITIONS};
use crate::data::NominalColumn;
use crate::memberships::DataMemberships;
use crate::utils::cmp_f64;
use fixedbitset::FixedBitSet;
use rand::rngs::StdRng;
use rand::Rng;

pub(super) fn best_split<S: TargetStats>(
    column: &NominalColumn,
    column_index: usize,
    memberships: &DataMemberships,
    node: &S,
    settings: &SplitSettings,
    rng: &mut StdRng,
) -> Option<SplitCandidate> {
    let mut per_value: Vec<S> = vec![node.empty(); column.nr_values()];
    let mut missing = node.empty();
    let mut missed_rows = FixedBitSet::with_capacity(memberships.row_count());
    for e in memberships.entries() {
        match column.value(e.original) {
            Some(v) => per_value[v as usize].add_row(e.original, e.weight),
            None => {
                missed_rows.insert(e.local);
                missing.add_row(e.original, e.weight);
            }
        }
    }
    // present values in ascending index order
    let present: Vec<u32> = (0..column.nr_values() as u32)
        .filter(|v| per_value[*v as usize].weight() > 0.0)
        .collect();
    if present.len() < 2 {
        return None;
    }
    let present_stats = node.subtract(&missing);
    let score = parent_score(node, &present_stats, &missing, settings);

    let (gain, partition, missing_child) = if settings.use_binary_nominal_splits {
        binary_split(column.nr_values(), &present, &per_value, &missing, score, settings, rng)?
    } else {
        multiway_split(&present, &per_value, &missing, score, settings)?
    };
    Some(SplitCandidate {
        column: column_index,
        gain,
        missed_rows,
        kind: SplitKind::Nominal {
            partition,
            missing_child,
        },
    })
}

fn sum_of<S: TargetStats>(template: &S, values: &[u32], per_value: &[S]) -> S {
    let mut sum = template.empty();
    for v in values {
        sum.add(&per_value[*v as usize]);
    }
    sum
}

/// Partitions to test, each given by the values going right. The right side always holds the last
/// (highest) present value so every partition is only tested once.
fn candidate_partitions<S: TargetStats>(present: &[u32], per_value: &[S], rng: &mut StdRng) -> Vec<Vec<u32>> {
    let k = present.len();
    let keys: Option<Vec<f64>> = present.iter().map(|v| per_value[*v as usize].ordering_key()).collect();
    if let Some(keys) = keys {
        // Two classes or a numeric target, the best partition is a prefix of the values sorted by key.
        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|a, b| cmp_f64(&keys[*a], &keys[*b]).then(a.cmp(b)));
        (1..k)
            .map(|i| order[i..].iter().map(|p| present[*p]).collect())
            .collect()
    } else if k <= MAX_FULL_ENUMERATION_VALUES {
        let last = present[k - 1];
        // bit j of the mask sends present[j] right, the all ones mask would leave nothing on the left
        (0..(1u32 << (k - 1)) - 1)
            .map(|mask| {
                let mut right: Vec<u32> = (0..k - 1).filter(|j| mask >> j & 1 == 1).map(|j| present[j]).collect();
                right.push(last);
                right
            })
            .collect()
    } else {
        let last = present[k - 1];
        let mut partitions = Vec::with_capacity(MAX_RANDOM_PARTITIONS);
        for _ in 0..MAX_RANDOM_PARTITIONS {
            let mut right: Vec<u32> = present[..k - 1].iter().copied().filter(|_| rng.gen::<bool>()).collect();
            if right.len() == k - 1 {
                continue;
            }
            right.push(last);
            partitions.push(right);
        }
        partitions
    }
}

fn binary_split<S: TargetStats>(
    nr_values: usize,
    present: &[u32],
    per_value: &[S],
    missing: &S,
    score: f64,
    settings: &SplitSettings,
    rng: &mut StdRng,
) -> Option<(f64, NominalPartition, usize)> {
    let template = &per_value[present[0] as usize];
    let total = sum_of(template, present, per_value);
    let mut best: Option<(f64, Vec<u32>, bool)> = None;
    let mut ties = TieBreaker::new();
    for right_values in candidate_partitions(present, per_value, rng) {
        let right = sum_of(template, &right_values, per_value);
        let left = total.subtract(&right);
        let Some((gain, missings_go_left)) = evaluate_binary(score, &left, &right, missing, settings) else {
            continue;
        };
        if is_valid_gain(gain) && ties.offer(gain, rng) {
            best = Some((gain, right_values, missings_go_left));
        }
    }
    best.map(|(gain, right_values, missings_go_left)| {
        let last = present[present.len() - 1];
        // the ordered scan may end with the highest value on the left, flip to the canonical form
        let (right, missings_go_right) = if right_values.contains(&last) {
            (right_values, !missings_go_left)
        } else {
            let flipped = present.iter().copied().filter(|v| !right_values.contains(v)).collect();
            (flipped, missings_go_left)
        };
        let right_values = bitset::from_indices(nr_values, right.iter().map(|v: &u32| *v as usize));
        (
            gain,
            NominalPartition::Binary { right_values },
            usize::from(missings_go_right),
        )
    })
}

fn multiway_split<S: TargetStats>(
    present: &[u32],
    per_value: &[S],
    missing: &S,
    score: f64,
    settings: &SplitSettings,
) -> Option<(f64, NominalPartition, usize)> {
    let children: Vec<&S> = present.iter().map(|v| &per_value[*v as usize]).collect();
    if children.iter().any(|c| c.weight() < settings.min_child_size) {
        return None;
    }
    let heaviest = (0..children.len()).fold(0, |best, i| {
        if children[i].weight() > children[best].weight() {
            i
        } else {
            best
        }
    });
    let (gain, missing_child) = if settings.learns_missing_direction() && missing.weight() > 0.0 {
        // try the missing rows in every child and keep the best
        let mut best = (f64::NEG_INFINITY, 0);
        for i in 0..children.len() {
            let mut with_missing = children[i].clone();
            with_missing.add(missing);
            let mut parts = children.clone();
            parts[i] = &with_missing;
            let gain = with_missing.gain(score, &parts);
            if gain > best.0 {
                best = (gain, i);
            }
        }
        best
    } else {
        (children[0].gain(score, &children), heaviest)
    };
    if !is_valid_gain(gain) {
        return None;
    }
    Some((
        gain,
        NominalPartition::Multiway {
            values: present.to_vec(),
        },
        missing_child,
    ))
}
