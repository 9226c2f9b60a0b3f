use crate::dom::{children, Dom, NodeKind};
use hashbrown::HashMap;
use tracing::{trace, warn};

/// Identity key → live node, for keyed elements that haven't been matched yet during one morph pass.
pub(crate) struct KeyIndex<N> {
	nodes: HashMap<String, N>,
}
impl<N: Clone> KeyIndex<N> {
	/// Indexes all keyed descendant elements of `root`, in pre-order. `root` itself isn't included.
	///
	/// Where keys collide, the later node wins.
	pub fn build<D: Dom<Node = N>>(dom: &D, root: &N, key_of: &dyn Fn(&D, &N) -> Option<String>) -> Self {
		let mut index = Self { nodes: HashMap::new() };
		index.walk(dom, root, key_of);
		trace!("Indexed {} keyed element(s).", index.nodes.len());
		index
	}

	fn walk<D: Dom<Node = N>>(&mut self, dom: &D, node: &N, key_of: &dyn Fn(&D, &N) -> Option<String>) {
		if dom.kind(node) != NodeKind::Element {
			return;
		}
		for child in children(dom, node) {
			if dom.kind(&child) == NodeKind::Element {
				if let Some(key) = key_of(dom, &child).filter(|key| !key.is_empty()) {
					if self.nodes.insert(key, child.clone()).is_some() {
						warn!("Duplicate identity key in the live tree. Only the last node with it can be matched.");
					}
				}
			}
			self.walk(dom, &child, key_of);
		}
	}

	pub fn get(&self, key: &str) -> Option<&N> {
		self.nodes.get(key)
	}

	/// Removes `key`, returning its node if it was still unmatched.
	pub fn claim(&mut self, key: &str) -> Option<N> {
		self.nodes.remove(key)
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}
}

/// Live keyed nodes left in place provisionally, with their keys.
/// They are discarded after the pass unless they were matched in the meantime.
#[derive(Debug)]
pub(crate) struct KeyedRemovals<N> {
	deferred: Vec<(String, N)>,
}
impl<N> Default for KeyedRemovals<N> {
	fn default() -> Self {
		Self { deferred: Vec::new() }
	}
}
impl<N> KeyedRemovals<N> {
	pub fn defer(&mut self, key: String, node: N) {
		self.deferred.push((key, node))
	}

	pub fn len(&self) -> usize {
		self.deferred.len()
	}

	pub fn drain(&mut self) -> impl '_ + Iterator<Item = (String, N)> {
		self.deferred.drain(..)
	}
}
