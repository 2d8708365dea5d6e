//! Tree and branch invariants over random operation sequences.

use std::collections::{HashMap, HashSet};

use assert_matches::assert_matches;
use proptest::prelude::*;

use arbor_core::{ConversationId, MessageId, MessageNode, NewMessage};
use arbor_store::{BranchStore, CreateBranchOptions, ListOptions, StoreError};

#[derive(Clone, Debug)]
enum Op {
    AppendActive,
    Fork { from: usize, name: u8 },
    Switch { name: Option<u8> },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::AppendActive),
        2 => (any::<usize>(), 0u8..4).prop_map(|(from, name)| Op::Fork { from, name }),
        2 => proptest::option::of(0u8..4).prop_map(|name| Op::Switch { name }),
    ]
}

fn branch(name: u8) -> String {
    format!("b{name}")
}

fn apply(store: &BranchStore, conv: &ConversationId, ops: &[Op]) -> Vec<MessageId> {
    let mut created: Vec<MessageId> = Vec::new();
    let mut branches: HashSet<String> = HashSet::new();

    for op in ops {
        match op {
            Op::AppendActive => {
                let node = store
                    .append_to_active(conv, &NewMessage::user("turn"))
                    .unwrap();
                created.push(node.id);
            }
            Op::Fork { from, name } => {
                if created.is_empty() {
                    continue;
                }
                let origin = &created[from % created.len()];
                let name = branch(*name);
                let result = store.create_branch(&CreateBranchOptions {
                    conversation_id: conv,
                    from_message_id: origin,
                    branch_name: &name,
                    message: &NewMessage::assistant("fork"),
                });
                if branches.contains(&name) {
                    assert_matches!(result, Err(StoreError::DuplicateBranchName { .. }));
                } else {
                    let node = result.unwrap();
                    assert_eq!(node.parent_id.as_ref(), Some(origin));
                    assert_eq!(node.branch_name.as_deref(), Some(name.as_str()));
                    created.push(node.id);
                    let _ = branches.insert(name);
                }
            }
            Op::Switch { name } => {
                let name = name.map(branch);
                let result = store.switch_active(conv, name.as_deref());
                match &name {
                    Some(n) if !branches.contains(n) => {
                        assert_matches!(result, Err(StoreError::BranchNotFound { .. }));
                    }
                    _ => {
                        let _ = result.unwrap();
                    }
                }
            }
        }
    }
    created
}

fn all_nodes(store: &BranchStore, conv: &ConversationId) -> Vec<MessageNode> {
    let mut nodes = store
        .list_branch_messages(conv, None, ListOptions::default())
        .unwrap();
    for name in store.list_branch_names(conv).unwrap() {
        nodes.extend(
            store
                .list_branch_messages(conv, Some(&name), ListOptions::default())
                .unwrap(),
        );
    }
    nodes.sort_by_key(|n| n.sequence);
    nodes
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn branching_invariants_hold(ops in proptest::collection::vec(op(), 1..30)) {
        let store = BranchStore::open_in_memory().unwrap();
        let conv = store.create_conversation(None).unwrap().id;
        let created = apply(&store, &conv, &ops);

        let conversation = store.get_conversation(&conv).unwrap();
        let nodes = all_nodes(&store, &conv);

        // every created node is stored, sequences are 1..=n
        prop_assert_eq!(nodes.len(), created.len());
        prop_assert_eq!(conversation.message_count, i64::try_from(created.len()).unwrap());
        for (i, node) in nodes.iter().enumerate() {
            prop_assert_eq!(node.sequence, i64::try_from(i).unwrap() + 1);
        }

        // activity is exactly membership in the conversation's active branch
        for node in &nodes {
            prop_assert_eq!(node.is_active, node.branch_name == conversation.active_branch);
        }
        let active_branches: HashSet<_> = nodes
            .iter()
            .filter(|n| n.is_active)
            .map(|n| n.branch_name.clone())
            .collect();
        prop_assert!(active_branches.len() <= 1);

        // per-branch counts agree with the stored labels
        let mut by_branch: HashMap<Option<String>, i64> = HashMap::new();
        for node in &nodes {
            *by_branch.entry(node.branch_name.clone()).or_default() += 1;
        }
        for (name, count) in &by_branch {
            prop_assert_eq!(store.count_branch(&conv, name.as_deref()).unwrap(), *count);
        }

        // ancestry round-trip
        for node in &nodes {
            let path = store.resolve_path(&node.id).unwrap();
            prop_assert_eq!(&path.last().unwrap().id, &node.id);
            prop_assert!(path[0].is_root());
            for pair in path.windows(2) {
                prop_assert_eq!(pair[1].parent_id.as_ref(), Some(&pair[0].id));
            }
        }

        // branch points are exactly the nodes with children
        let parents: HashSet<&MessageId> = nodes.iter().filter_map(|n| n.parent_id.as_ref()).collect();
        let points = store.list_branch_points(&conv).unwrap();
        let point_ids: HashSet<&MessageId> = points.iter().map(|n| &n.id).collect();
        prop_assert_eq!(point_ids, parents);
        prop_assert!(points.windows(2).all(|w| w[0].sequence < w[1].sequence));

        // the active transcript ends at the active branch's newest node
        let transcript = store.active_transcript(&conv).unwrap();
        let newest = nodes
            .iter()
            .filter(|n| n.branch_name == conversation.active_branch)
            .max_by_key(|n| n.sequence);
        prop_assert_eq!(transcript.last().map(|n| &n.id), newest.map(|n| &n.id));
    }
}
