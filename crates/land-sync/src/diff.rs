// SPDX-License-Identifier: Apache-2.0
//! Generic tree diff over [`SnapshotValue`], used by both the
//! dirty-snapshot-diff and full-diff sync modes.

use land_wire::{join_path, Patch, PatchOp, SnapshotValue};

/// Diff `old` against `new`, emitting absolute-path patches rooted at
/// `prefix`. Maps recurse key-by-key (insert → `add`, remove → `delete`,
/// changed leaf/array/differently-shaped subtree → `set`); every other
/// value kind is compared for equality and emits a single `set` when it
/// differs. There is no partial-array diff: an array is a leaf for this
/// purpose, matching `land-state`'s `ReactiveSet`/`ReactiveArray`
/// recording whole-value patches rather than per-index ones.
#[must_use]
pub fn diff_snapshot(prefix: &str, old: &SnapshotValue, new: &SnapshotValue) -> Vec<Patch> {
    let mut patches = Vec::new();
    diff_into(prefix, old, new, &mut patches);
    patches
}

fn diff_into(path: &str, old: &SnapshotValue, new: &SnapshotValue, out: &mut Vec<Patch>) {
    match (old, new) {
        (SnapshotValue::Map(old_map), SnapshotValue::Map(new_map)) => {
            for (key, old_value) in old_map {
                if !new_map.contains_key(key) {
                    out.push(Patch {
                        path: join_path(path, key),
                        op: PatchOp::Delete,
                        value: None,
                    });
                } else {
                    let _ = old_value;
                }
            }
            for (key, new_value) in new_map {
                let child_path = join_path(path, key);
                match old_map.get(key) {
                    None => out.push(Patch {
                        path: child_path,
                        op: PatchOp::Add,
                        value: Some(new_value.clone()),
                    }),
                    Some(old_value) => diff_into(&child_path, old_value, new_value, out),
                }
            }
        }
        _ if old == new => {}
        _ => out.push(Patch {
            path: path.to_string(),
            op: PatchOp::Set,
            value: Some(new.clone()),
        }),
    }
}

/// Navigate to the subtree at `path` (a `/`-joined sequence of map keys,
/// matching [`land_wire::join_path`]'s escaping), returning `None` if any
/// segment is absent or the path crosses a non-map value.
#[must_use]
pub fn subtree_at<'a>(root: &'a SnapshotValue, path: &str) -> Option<&'a SnapshotValue> {
    let mut current = root;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let unescaped = segment.replace("~1", "/").replace("~0", "~");
        let SnapshotValue::Map(map) = current else {
            return None;
        };
        current = map.get(&unescaped)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_detects_added_removed_and_changed_keys() {
        let old = SnapshotValue::map([("a", SnapshotValue::Int(1)), ("b", SnapshotValue::Int(2))]);
        let new = SnapshotValue::map([("a", SnapshotValue::Int(9)), ("c", SnapshotValue::Int(3))]);
        let mut patches = diff_snapshot("", &old, &new);
        patches.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(patches.len(), 3);
        assert_eq!(patches[0].path, "/a");
        assert_eq!(patches[0].op, PatchOp::Set);
        assert_eq!(patches[1].path, "/b");
        assert_eq!(patches[1].op, PatchOp::Delete);
        assert_eq!(patches[2].path, "/c");
        assert_eq!(patches[2].op, PatchOp::Add);
    }

    #[test]
    fn diff_of_equal_trees_is_empty() {
        let v = SnapshotValue::map([("a", SnapshotValue::Int(1))]);
        assert!(diff_snapshot("", &v, &v).is_empty());
    }

    #[test]
    fn diff_recurses_into_nested_maps() {
        let old = SnapshotValue::map([("players", SnapshotValue::map([("p1", SnapshotValue::Int(0))]))]);
        let new = SnapshotValue::map([("players", SnapshotValue::map([("p1", SnapshotValue::Int(5))]))]);
        let patches = diff_snapshot("", &old, &new);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].path, "/players/p1");
    }

    #[test]
    fn subtree_at_navigates_nested_maps() {
        let root = SnapshotValue::map([("players", SnapshotValue::map([("p1", SnapshotValue::Int(7))]))]);
        assert_eq!(subtree_at(&root, "/players/p1"), Some(&SnapshotValue::Int(7)));
        assert_eq!(subtree_at(&root, "/players/p2"), None);
    }
}
