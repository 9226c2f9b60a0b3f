use dom_morph::{
	dom::{is_inclusive_ancestor, Dom},
	h,
	memory::{MemoryDocument, MemoryNode},
	morph,
	vnode::AttrValue,
	MorphOptions, Target, VNode,
};
use proptest::prelude::*;
use std::cell::RefCell;

mod memory_document_;
use memory_document_::descendant_elements;

fn tag() -> impl Strategy<Value = &'static str> {
	prop::sample::select(vec!["div", "p", "span", "li"])
}

fn key() -> impl Strategy<Value = Option<String>> {
	prop::option::of(prop::sample::select(vec!["a", "b", "c", "d", "e", "f"]).prop_map(str::to_owned))
}

fn attributes() -> impl Strategy<Value = Vec<(&'static str, String)>> {
	prop::collection::vec((prop::sample::select(vec!["class", "title", "data-x"]), "[xy]{0,2}"), 0..3)
}

fn element(tag: &str, key: Option<String>, attributes: Vec<(&'static str, String)>, children: Vec<VNode>) -> VNode {
	let mut all: Vec<(&str, AttrValue)> = attributes.into_iter().map(|(name, value)| (name, value.into())).collect();
	if let Some(key) = key {
		all.push(("id", key.into()))
	}
	h(tag, all, children)
}

fn node() -> impl Strategy<Value = VNode> {
	let leaf = prop_oneof![
		"[a-c]{0,3}".prop_map(VNode::text),
		(tag(), key(), attributes()).prop_map(|(tag, key, attributes)| element(tag, key, attributes, vec![])),
	];
	leaf.prop_recursive(3, 24, 4, |inner| {
		(tag(), key(), attributes(), prop::collection::vec(inner, 0..4))
			.prop_map(|(tag, key, attributes, children)| element(tag, key, attributes, children))
	})
}

/// Keys are unique within each generated tree.
fn tree() -> impl Strategy<Value = VNode> {
	(attributes(), prop::collection::vec(node(), 0..5)).prop_map(|(attributes, children)| {
		let mut root = element("div", None, attributes, children);
		dedupe_keys(&mut root, &mut Vec::new());
		root
	})
}

/// Keys may repeat anywhere in the tree.
fn tree_with_duplicate_keys() -> impl Strategy<Value = VNode> {
	(attributes(), prop::collection::vec(node(), 0..5)).prop_map(|(attributes, children)| element("div", None, attributes, children))
}

fn dedupe_keys(vnode: &mut VNode, seen: &mut Vec<String>) {
	if let VNode::Element(element) = vnode {
		if let Some(position) = element.attributes.iter().position(|(name, _)| name == "id") {
			let key = element.attributes[position].1.clone();
			if seen.contains(&key) {
				element.attributes.remove(position);
			} else {
				seen.push(key)
			}
		}
		for child in &mut element.children {
			dedupe_keys(child, seen)
		}
	}
}

/// (key, node name, node) for each keyed element below `root`.
fn keyed(document: &MemoryDocument, root: &MemoryNode) -> Vec<(String, String, MemoryNode)> {
	descendant_elements(document, root)
		.into_iter()
		.filter_map(|element| {
			let key = document.get_attribute(&element, None, "id")?;
			Some((key, document.node_name(&element), element))
		})
		.collect()
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(200))]

	#[test]
	fn converges_and_settles(live in tree(), target in tree()) {
		let document = MemoryDocument::new();
		let root = live.materialize(&document).unwrap();
		let expected = {
			let target = target.materialize(&document).unwrap();
			let expected = document.outer_html(&target);
			let result = morph(&document, &root, Target::Node(&target), MorphOptions::new());
			prop_assert_eq!(&result, &root);
			expected
		};
		prop_assert_eq!(document.outer_html(&root), expected);

		let again = target.materialize(&document).unwrap();
		document.reset_mutation_count();
		morph(&document, &root, Target::Node(&again), MorphOptions::new());
		prop_assert_eq!(document.mutation_count(), 0);
	}

	#[test]
	fn keyed_identity_and_discards(live in tree(), target in tree()) {
		let document = MemoryDocument::new();
		let root = live.materialize(&document).unwrap();
		let target_root = target.materialize(&document).unwrap();
		let live_keyed = keyed(&document, &root);
		let target_keyed: Vec<(String, String)> =
			keyed(&document, &target_root).into_iter().map(|(key, name, _)| (key, name)).collect();

		let discarded = RefCell::new(Vec::<MemoryNode>::new());
		morph(
			&document,
			&root,
			Target::Node(&target_root),
			MorphOptions::<MemoryDocument>::new().on_node_discarded(|node| discarded.borrow_mut().push(node.clone())),
		);
		let discarded = discarded.into_inner();

		for (i, node) in discarded.iter().enumerate() {
			prop_assert!(!discarded[i + 1..].contains(node), "{:?} was discarded twice", node);
		}

		let final_keyed = keyed(&document, &root);
		for (key, name, node) in &live_keyed {
			match target_keyed.iter().find(|(target_key, _)| target_key == key) {
				Some((_, target_name)) if target_name == name => {
					let survivor = final_keyed.iter().find(|(final_key, _, _)| final_key == key).map(|(_, _, node)| node);
					prop_assert_eq!(survivor, Some(node), "key {:?} lost its node", key);
				}
				Some(_) => (),
				None => {
					prop_assert_eq!(discarded.iter().filter(|discarded| *discarded == node).count(), 1);
					prop_assert!(!is_inclusive_ancestor(&document, &root, node));
				}
			}
		}
	}

	#[test]
	fn duplicate_live_keys_converge(live in tree_with_duplicate_keys(), target in tree()) {
		let document = MemoryDocument::new();
		let root = live.materialize(&document).unwrap();
		let target_root = target.materialize(&document).unwrap();
		let expected = document.outer_html(&target_root);
		let live_keyed = keyed(&document, &root);
		let target_keys: Vec<String> = keyed(&document, &target_root).into_iter().map(|(key, _, _)| key).collect();

		let discarded = RefCell::new(Vec::<MemoryNode>::new());
		morph(
			&document,
			&root,
			Target::Node(&target_root),
			MorphOptions::<MemoryDocument>::new().on_node_discarded(|node| discarded.borrow_mut().push(node.clone())),
		);
		let discarded = discarded.into_inner();

		prop_assert_eq!(document.outer_html(&root), expected);
		for (i, node) in discarded.iter().enumerate() {
			prop_assert!(!discarded[i + 1..].contains(node), "{:?} was discarded twice", node);
		}
		for (key, _, node) in live_keyed.iter().filter(|(key, _, _)| !target_keys.contains(key)) {
			prop_assert!(discarded.contains(node), "{:?} with key {:?} was never discarded", node, key);
			prop_assert!(!is_inclusive_ancestor(&document, &root, node));
		}
	}
}
