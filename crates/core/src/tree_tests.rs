// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sample() -> Tree<u32> {
    Tree::from_studies(vec![
        vec![vec![1, 2], vec![3]],
        vec![vec![], vec![4, 5]],
    ])
}

#[test]
fn flatten_is_study_major() {
    assert_eq!(sample().into_flat(), vec![1, 2, 3, 4, 5]);
}

#[test]
fn empty_branches_do_not_count_as_leaves() {
    let tree: Tree<u32> = Tree::from_studies(vec![vec![vec![], vec![]], vec![]]);
    assert!(tree.is_empty());
    assert_eq!(tree.len(), 0);
    assert!(tree.first().is_none());
}

#[test]
fn split_keeps_shape_and_covers_every_leaf() {
    let (even, odd) = sample().split(|n| n % 2 == 0);

    assert_eq!(even.studies().len(), 2);
    assert_eq!(odd.studies().len(), 2);
    assert_eq!(even.studies()[0].len(), 2);
    assert_eq!(odd.studies()[0].len(), 2);

    let mut all: Vec<u32> = even.iter().chain(odd.iter()).copied().collect();
    all.sort_unstable();
    assert_eq!(all, vec![1, 2, 3, 4, 5]);
}

#[test]
fn project_drops_leaves_in_place() {
    let projected = sample().project(|n| (*n > 2).then_some(*n * 10));
    assert_eq!(
        projected,
        Tree::from_studies(vec![vec![vec![], vec![30]], vec![vec![], vec![40, 50]]])
    );
}

#[test]
fn prune_removes_empty_series_then_studies() {
    let tree = Tree::from_studies(vec![
        vec![vec![], vec![1]],
        vec![vec![], vec![]],
    ]);
    let pruned = tree.prune();
    assert_eq!(pruned, Tree::from_studies(vec![vec![vec![1]]]));
}

#[test]
fn prune_of_all_empty_is_empty() {
    let tree: Tree<u32> = Tree::from_studies(vec![vec![vec![]], vec![]]);
    assert_eq!(tree.prune(), Tree::new());
}
