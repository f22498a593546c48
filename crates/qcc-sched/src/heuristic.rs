//! Criticality heuristics (§4.6): the `available` set is ordered by
//! `(criticality desc, order asc)`; a heuristic supplies the criticality
//! key.

use qcc_ir::DeepCriticality;

use crate::ddg::Ddg;

/// A criticality comparator, used as the `available`-set ordering key.
/// Higher values schedule first.
pub trait Criticality {
    /// The criticality key for the DDG node at `node_idx`.
    fn criticality(&self, node_idx: usize) -> i64;
}

/// Always equal: statements are ordered purely by `order` (§4.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct Trivial;

impl Criticality for Trivial {
    fn criticality(&self, _node_idx: usize) -> i64 {
        0
    }
}

/// Uses `abs(cycle)` from a prior reverse-direction ASAP/ALAP schedule
/// (§4.6).
#[derive(Debug, Clone)]
pub struct CriticalPath {
    /// Cycle assigned to each DDG node index by the prior schedule.
    pub cycles: Vec<i64>,
}

impl Criticality for CriticalPath {
    fn criticality(&self, node_idx: usize) -> i64 {
        self.cycles.get(node_idx).copied().unwrap_or(0).abs()
    }
}

/// Uses [`DeepCriticality::critical_path_length`], computed once per
/// block via [`compute`] (§4.6).
#[derive(Debug, Clone)]
pub struct DeepCriticalityHeuristic {
    /// Per-node deep-criticality annotation, indexed by DDG node index.
    pub annotations: Vec<DeepCriticality>,
}

impl Criticality for DeepCriticalityHeuristic {
    fn criticality(&self, node_idx: usize) -> i64 {
        self.annotations
            .get(node_idx)
            .map(|dc| i64::from(dc.critical_path_length))
            .unwrap_or(0)
    }
}

/// Compute deep criticality for every node in `ddg` (§4.6).
///
/// Because [`crate::ddg::build_ddg`] only ever adds an edge from a
/// lower-index node to a higher-index one, the node list is already in
/// topological order; this walks it in reverse so every successor's
/// annotation is known before its predecessors need it.
pub fn compute(ddg: &Ddg) -> Vec<DeepCriticality> {
    let n = ddg.nodes.len();
    let mut result = vec![DeepCriticality::default(); n];
    for i in (0..n).rev() {
        let mut best: Option<(u32, usize)> = None;
        for &(succ, edge) in &ddg.nodes[i].succs {
            let length = edge.weight + result[succ].critical_path_length;
            let candidate_key = (length, result[succ].critical_path_length);
            let is_better = match best {
                None => true,
                Some((best_len, best_succ)) => {
                    let best_key = (best_len, result[best_succ].critical_path_length);
                    candidate_key > best_key
                }
            };
            if is_better {
                best = Some((length, succ));
            }
        }
        result[i] = match best {
            None => DeepCriticality {
                critical_path_length: 0,
                most_critical_dependent: None,
            },
            Some((length, succ)) => DeepCriticality {
                critical_path_length: length,
                most_critical_dependent: Some(succ),
            },
        };
    }
    result
}

/// Clear a set of deep-criticality annotations back to their default
/// (zero length, no dependent) — the transient annotation must not leak
/// across passes (§4.6).
pub fn clear(annotations: &mut [DeepCriticality]) {
    for a in annotations {
        *a = DeepCriticality::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddg::{DdgNode, Edge};

    fn linear_ddg(weights: &[u32]) -> Ddg {
        let n = weights.len() + 1;
        let mut nodes: Vec<DdgNode> = (0..n)
            .map(|i| DdgNode {
                order: i as u32,
                preds: Vec::new(),
                succs: Vec::new(),
            })
            .collect();
        for (i, &w) in weights.iter().enumerate() {
            nodes[i].succs.push((i + 1, Edge { weight: w }));
            nodes[i + 1].preds.push((i, Edge { weight: w }));
        }
        Ddg { nodes, direction: 1 }
    }

    #[test]
    fn deep_criticality_is_monotonic_along_chain() {
        let ddg = linear_ddg(&[10, 20, 30]);
        let annotations = compute(&ddg);
        assert_eq!(annotations[3].critical_path_length, 0);
        assert_eq!(annotations[2].critical_path_length, 30);
        assert_eq!(annotations[1].critical_path_length, 50);
        assert_eq!(annotations[0].critical_path_length, 60);
        assert_eq!(annotations[0].most_critical_dependent, Some(1));
    }

    #[test]
    fn clear_resets_to_default() {
        let ddg = linear_ddg(&[10]);
        let mut annotations = compute(&ddg);
        clear(&mut annotations);
        assert!(annotations.iter().all(|a| a.critical_path_length == 0 && a.most_critical_dependent.is_none()));
    }
}
