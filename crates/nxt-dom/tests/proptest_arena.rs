//! Property tests for the element arena under random tree edits.
//!
//! Verifies:
//! - parent and child links always agree
//! - `remove` purges exactly the subtree it reports, root first
//! - purged ids are never handed out again
//! - every removal is reported to a whole-document observer with its purged ids

use nxt_dom::{Document, ElementId, MutationRecord, ObserveOptions};
use proptest::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Op {
    Create,
    Append { parent: usize, child: usize },
    Remove(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Create),
        4 => (any::<usize>(), any::<usize>()).prop_map(|(parent, child)| Op::Append { parent, child }),
        1 => any::<usize>().prop_map(Op::Remove),
    ]
}

fn pick(live: &[ElementId], index: usize) -> Option<ElementId> {
    (!live.is_empty()).then(|| live[index % live.len()])
}

fn assert_links(doc: &Document, live: &[ElementId]) -> Result<(), TestCaseError> {
    for id in live {
        for child in doc.children(*id) {
            prop_assert_eq!(doc.parent(*child), Some(*id));
        }
        if let Some(parent) = doc.parent(*id) {
            prop_assert!(doc.children(parent).contains(id));
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn random_edits_keep_the_arena_consistent(ops in prop::collection::vec(op(), 1..60)) {
        let mut doc = Document::new();
        let root = doc.root();
        let observer = doc.observe(root, ObserveOptions::default()).unwrap();
        let mut live = vec![doc.body()];
        let mut purged_ever: HashSet<ElementId> = HashSet::new();
        let mut reported: HashSet<ElementId> = HashSet::new();

        for op in ops {
            match op {
                Op::Create => {
                    let id = doc.create_element("div");
                    prop_assert!(!purged_ever.contains(&id));
                    live.push(id);
                }
                Op::Append { parent, child } => {
                    if let (Some(parent), Some(child)) = (pick(&live, parent), pick(&live, child)) {
                        let cyclic = doc.is_inclusive_ancestor(child, parent);
                        prop_assert_eq!(doc.append_child(parent, child).is_err(), cyclic);
                    }
                }
                Op::Remove(index) => {
                    if let Some(id) = pick(&live, index) {
                        let expected = doc.subtree(id);
                        let connected = doc.is_connected(id);
                        let purged = doc.remove(id).unwrap();
                        prop_assert_eq!(&purged, &expected);
                        prop_assert_eq!(purged.first(), Some(&id));
                        for gone in &purged {
                            prop_assert!(!doc.contains_element(*gone));
                        }
                        if connected {
                            reported.extend(purged.iter().copied());
                        }
                        purged_ever.extend(purged.iter().copied());
                        live.retain(|l| !purged_ever.contains(l));
                    }
                }
            }
            assert_links(&doc, &live)?;
        }

        let mut seen = HashSet::new();
        for record in doc.take_records(observer) {
            if let MutationRecord::ChildList { removed, .. } = record {
                for node in removed {
                    seen.extend(node.purged);
                }
            }
        }
        prop_assert!(reported.is_subset(&seen));
    }
}
