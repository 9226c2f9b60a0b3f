#![allow(dead_code)]

use dom_morph::{
	dom::{children, Dom, NodeKind},
	memory::{MemoryDocument, MemoryNode},
};
use tracing::Level;

pub fn init_tracing() {
	tracing_subscriber::fmt().with_test_writer().with_max_level(Level::TRACE).try_init().ok();
}

pub fn parse(document: &MemoryDocument, markup: &str) -> MemoryNode {
	document.parse_markup(markup).expect("markup without nodes")
}

/// All elements below `root` (exclusive) in document order.
pub fn descendant_elements(document: &MemoryDocument, root: &MemoryNode) -> Vec<MemoryNode> {
	let mut elements = Vec::new();
	collect(document, root, &mut elements);
	elements
}

fn collect(document: &MemoryDocument, node: &MemoryNode, elements: &mut Vec<MemoryNode>) {
	for child in children(document, node) {
		if document.kind(&child) == NodeKind::Element {
			elements.push(child.clone());
			collect(document, &child, elements)
		}
	}
}

pub fn by_id(document: &MemoryDocument, root: &MemoryNode, id: &str) -> Option<MemoryNode> {
	descendant_elements(document, root)
		.into_iter()
		.find(|element| document.get_attribute(element, None, "id").as_deref() == Some(id))
}

pub fn by_selector(document: &MemoryDocument, root: &MemoryNode, selector: &str) -> Vec<MemoryNode> {
	descendant_elements(document, root)
		.into_iter()
		.filter(|element| document.matches(element, selector))
		.collect()
}
