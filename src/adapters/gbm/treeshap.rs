//! Exact path-dependent TreeSHAP for a single decision tree.
//!
//! Walks every root-to-leaf path once, tracking for each feature on the path
//! the fraction of "zero" (feature unknown, follow covers) and "one" (feature
//! known, follow the row) paths that reach the current node. The weights in
//! the path are the permutation weights of the Shapley formula; unwinding a
//! feature out of the path gives its marginal contribution at each leaf.
//!
//! Complexity is O(leaves * depth^2) per tree.

use super::{Node, Tree};

#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// `None` for the synthetic root element
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    weight: f64,
}

/// Add this tree's attributions for row `x` into `phi`, scaled by `scale`.
///
/// `covers` must hold one non-negative weight per node, with split nodes > 0.
pub(super) fn accumulate(tree: &Tree, covers: &[f64], x: &[f64], scale: f64, phi: &mut [f64]) {
    let walker = Walker {
        tree,
        covers,
        x,
        scale,
    };
    walker.recurse(0, phi, Vec::with_capacity(16), 1.0, 1.0, None);
}

struct Walker<'a> {
    tree: &'a Tree,
    covers: &'a [f64],
    x: &'a [f64],
    scale: f64,
}

impl Walker<'_> {
    fn recurse(
        &self,
        node: usize,
        phi: &mut [f64],
        mut path: Vec<PathElement>,
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        extend(&mut path, zero_fraction, one_fraction, feature);

        match self.tree.nodes[node] {
            Node::Leaf { value } => {
                for i in 1..path.len() {
                    let w = unwound_sum(&path, i);
                    let el = path[i];
                    if let Some(f) = el.feature {
                        phi[f] += w * (el.one_fraction - el.zero_fraction) * value * self.scale;
                    }
                }
            }
            Node::Split {
                feature: split,
                threshold,
                left,
                right,
            } => {
                let (hot, cold) = if self.x[split] <= threshold {
                    (left, right)
                } else {
                    (right, left)
                };
                let cover = self.covers[node];
                let hot_zero = self.covers[hot] / cover;
                let cold_zero = self.covers[cold] / cover;

                // A feature seen higher up the path is merged with this split.
                let mut incoming_zero = 1.0;
                let mut incoming_one = 1.0;
                if let Some(k) = path
                    .iter()
                    .skip(1)
                    .position(|e| e.feature == Some(split))
                    .map(|p| p + 1)
                {
                    incoming_zero = path[k].zero_fraction;
                    incoming_one = path[k].one_fraction;
                    unwind(&mut path, k);
                }

                self.recurse(
                    hot,
                    phi,
                    path.clone(),
                    hot_zero * incoming_zero,
                    incoming_one,
                    Some(split),
                );
                self.recurse(
                    cold,
                    phi,
                    path,
                    cold_zero * incoming_zero,
                    0.0,
                    Some(split),
                );
            }
        }
    }
}

fn extend(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let d = depth as f64;
    for i in (0..depth).rev() {
        let fi = i as f64;
        path[i + 1].weight += one_fraction * path[i].weight * (fi + 1.0) / (d + 1.0);
        path[i].weight = zero_fraction * path[i].weight * (d - fi) / (d + 1.0);
    }
}

fn unwind(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let d = depth as f64;
    let one = path[index].one_fraction;
    let zero = path[index].zero_fraction;
    let mut next_one = path[depth].weight;

    for i in (0..depth).rev() {
        let fi = i as f64;
        if one != 0.0 {
            let tmp = path[i].weight;
            path[i].weight = next_one * (d + 1.0) / ((fi + 1.0) * one);
            next_one = tmp - path[i].weight * zero * (d - fi) / (d + 1.0);
        } else {
            path[i].weight = path[i].weight * (d + 1.0) / (zero * (d - fi));
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight of the path with element `index` removed.
fn unwound_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let d = depth as f64;
    let one = path[index].one_fraction;
    let zero = path[index].zero_fraction;
    let mut next_one = path[depth].weight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        let fi = i as f64;
        if one != 0.0 {
            let tmp = next_one * (d + 1.0) / ((fi + 1.0) * one);
            total += tmp;
            next_one = path[i].weight - tmp * zero * ((d - fi) / (d + 1.0));
        } else if zero != 0.0 {
            total += (path[i].weight / zero) / ((d - fi) / (d + 1.0));
        }
    }

    total
}

/// Cover-weighted mean leaf value of a tree.
pub(super) fn expected_value(tree: &Tree, covers: &[f64]) -> f64 {
    fn walk(tree: &Tree, covers: &[f64], node: usize) -> f64 {
        match tree.nodes[node] {
            Node::Leaf { value } => value,
            Node::Split { left, right, .. } => {
                (covers[left] * walk(tree, covers, left) + covers[right] * walk(tree, covers, right))
                    / covers[node]
            }
        }
    }
    walk(tree, covers, 0)
}
