// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Derive the order targets must be signed in.
//!
//! A bundle's signature seals digests of everything inside it. So every
//! contained target must carry its final signature before the bundle is
//! signed. This is a post-order traversal of the containment forest.

use crate::target::{SigningTarget, TargetForest, TargetId};

/// Obtain the signing order for all targets in a forest.
///
/// Every target appears after all targets it (transitively) contains.
/// Siblings and roots retain discovery order.
pub fn signing_order(forest: &TargetForest) -> Vec<&SigningTarget> {
    let mut children: Vec<Vec<TargetId>> = vec![vec![]; forest.len()];
    let mut roots = vec![];

    for (id, target) in forest.iter() {
        match target.parent() {
            Some(parent) => children[parent.index()].push(id),
            None => roots.push(id),
        }
    }

    let mut order = Vec::with_capacity(forest.len());

    // Explicit stack of (node, next child index) so deep trees don't recurse.
    for root in roots {
        let mut stack = vec![(root, 0usize)];

        while let Some((id, next)) = stack.pop() {
            if let Some(child) = children[id.index()].get(next) {
                stack.push((id, next + 1));
                stack.push((*child, 0));
            } else if let Some(target) = forest.get(id) {
                order.push(target);
            }
        }
    }

    order
}
