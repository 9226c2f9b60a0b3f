//! The tree morpher.
//!
//! [`morph`] walks a live tree and a target tree side by side and mutates the live one until it has the target's shape.
//! Nodes are reused wherever a compatible counterpart exists, so focus, selection, running transitions
//! and outside references to live nodes survive a pass.
//!
//! # Keyed elements
//!
//! Elements with an identity key (by default their `id`) are matched by key anywhere in the live tree,
//! not just at the same position. A keyed live node that's skipped during a scan isn't discarded right away,
//! since a later target element may still claim it. Only keys that are still unclaimed after the whole pass are discarded.
//!
//! If several live elements share a key, only the last one in document order can be matched by it.
//! The others are discarded like any other unmatched keyed node.

use crate::{
	attributes::morph_attributes,
	dom::{Dom, NodeKind},
	key_index::{KeyIndex, KeyedRemovals},
	loggable,
	options::{BeforeNodeAdded, MorphOptions, Target},
	special::ElementKind,
};
use tracing::{debug, error, instrument, level_filters::STATIC_MAX_LEVEL, trace, trace_span, Level};

/// Morphs `from` into the shape of `target` and returns the resulting root.
///
/// The result is `from` itself unless the roots were incompatible, in which case it's a replacement
/// that has already been put into `from`'s place if `from` had a parent.
///
/// Markup that doesn't contain any node leaves the live tree untouched.
#[instrument(skip(dom, target, options))]
pub fn morph<D: Dom>(dom: &D, from: &D::Node, target: Target<'_, D::Node>, mut options: MorphOptions<'_, D>) -> D::Node {
	let to = match target {
		Target::Node(node) => node.clone(),
		Target::Markup(markup) => match dom.parse_markup(markup) {
			Some(node) => node,
			None => {
				error!("Target markup contains no nodes. Leaving the live tree as is.");
				return from.clone();
			}
		},
		Target::Virtual(vnode) => match vnode.materialize(dom) {
			Some(node) => node,
			None => {
				error!("Failed to materialize the target. Leaving the live tree as is.");
				return from.clone();
			}
		},
	};

	if &to == from {
		trace!("The target is the live root itself. Nothing to do.");
		return to;
	}

	let key_index = {
		let options = &options;
		KeyIndex::build(dom, from, &|dom: &D, node: &D::Node| options.key_of(dom, node))
	};
	let children_only = options.children_only;
	let mut morpher = Morpher {
		dom,
		options: &mut options,
		key_index,
		keyed_removals: KeyedRemovals::default(),
		settled: Vec::new(),
	};

	let mut morphed = from.clone();
	if !children_only {
		match (dom.kind(from), dom.kind(&to)) {
			(NodeKind::Element, NodeKind::Element) => {
				if !compare_node_names(dom, from, &to) {
					trace!("Incompatible root elements. Replacing.");
					morpher.options.node_discarded(from);
					let namespace = dom.namespace_uri(&to);
					match dom.create_element(&dom.node_name(&to), namespace.as_deref()) {
						Some(element) => {
							move_children(dom, from, &element);
							morphed = element
						}
						None => {
							error!("Failed to create the replacement root. Leaving the live tree as is.");
							return from.clone();
						}
					}
				}
			}
			(NodeKind::Text, NodeKind::Text) | (NodeKind::Comment, NodeKind::Comment) => {
				sync_node_value(dom, from, &to);
				return from.clone();
			}
			(NodeKind::Other, NodeKind::Other) => (),
			_ => {
				trace!("Root kinds differ. Using the target root.");
				morphed = to.clone()
			}
		}
	}

	if morphed == to {
		morpher.options.node_discarded(from);
	} else {
		morpher.morph_element(&morphed, &to, children_only);
		morpher.discard_unclaimed();
	}

	if !children_only && &morphed != from {
		if let Some(parent) = dom.parent_node(from) {
			dom.replace_child(&parent, &morphed, from)
		}
	}

	morphed
}

/// Whether a live element can be morphed into a target element instead of being replaced.
///
/// Names must match exactly, except that an upper-cased live name also matches its lower-cased target counterpart
/// (as browsers upper-case HTML element names while descriptions usually don't).
pub fn compare_node_names<D: Dom>(dom: &D, from: &D::Node, to: &D::Node) -> bool {
	let from_name = dom.node_name(from);
	let to_name = dom.node_name(to);
	if from_name == to_name {
		return true;
	}
	match (from_name.bytes().next(), to_name.bytes().next()) {
		(Some(first_from), Some(first_to)) if first_from <= b'Z' && first_to > b'Z' => from_name == to_name.to_ascii_uppercase(),
		_ => false,
	}
}

fn sync_node_value<D: Dom>(dom: &D, from: &D::Node, to: &D::Node) {
	let value = dom.node_value(to).unwrap_or_default();
	if dom.node_value(from).as_deref() != Some(value.as_str()) {
		trace!(value = loggable(&value), "Updating node value.");
		dom.set_node_value(from, &value)
	}
}

fn move_children<D: Dom>(dom: &D, from: &D::Node, to: &D::Node) {
	while let Some(child) = dom.first_child(from) {
		dom.append_child(to, &child)
	}
}

struct Morpher<'o, 'a, D: Dom> {
	dom: &'o D,
	options: &'o mut MorphOptions<'a, D>,
	key_index: KeyIndex<D::Node>,
	keyed_removals: KeyedRemovals<D::Node>,
	/// Keyed live nodes that were matched or already discarded. Deferred removals skip these.
	settled: Vec<D::Node>,
}
impl<'o, 'a, D: Dom> Morpher<'o, 'a, D> {
	fn key(&self, node: &D::Node) -> Option<String> {
		if self.dom.kind(node) == NodeKind::Element {
			self.options.key_of(self.dom, node)
		} else {
			None
		}
	}

	fn morph_element(&mut self, from: &D::Node, to: &D::Node, children_only: bool) {
		let span = trace_span!("Morphing element", ?from, ?to);
		let _enter = span.enter();

		if let Some(key) = self.key(to) {
			self.key_index.claim(&key);
			self.settled.push(from.clone());
		}

		if !children_only {
			if !self.options.before_el_updated(from, to) {
				return trace!("Element update vetoed.");
			}
			morph_attributes(self.dom, from, to);
			self.options.el_updated(from);
			if !self.options.before_el_children_updated(from, to) {
				return trace!("Child update vetoed.");
			}
		}

		if ElementKind::of(&self.dom.node_name(from)) != Some(ElementKind::TextArea) {
			self.morph_children(from, to);
		}
		self.options.special_elements.apply(self.dom, from, to);
	}

	#[allow(clippy::too_many_lines)]
	fn morph_children(&mut self, from_parent: &D::Node, to_parent: &D::Node) {
		let dom = self.dom;
		let mut to_cursor = dom.first_child(to_parent);
		let mut from_cursor = dom.first_child(from_parent);

		'to_children: while let Some(to_child) = to_cursor {
			let to_next = dom.next_sibling(&to_child);
			let to_kind = dom.kind(&to_child);
			let to_key = self.key(&to_child);

			while let Some(from_child) = from_cursor.take() {
				if from_child == to_child {
					trace!("Target child is already in place.");
					from_cursor = dom.next_sibling(&from_child);
					to_cursor = to_next;
					continue 'to_children;
				}

				let from_next = dom.next_sibling(&from_child);
				let from_key = self.key(&from_child);
				let mut candidate = from_child.clone();

				let compatible = match (dom.kind(&from_child), to_kind) {
					(NodeKind::Element, NodeKind::Element) => {
						let keys_agree = match (&to_key, &from_key) {
							(Some(to_key), from_key) if Some(to_key) != from_key.as_ref() => {
								match self.key_index.get(to_key).cloned() {
									Some(matching) if Some(&matching) == from_next.as_ref() => {
										trace!("Keyed match is next in line. Treating the current node as removed.");
										false
									}
									Some(matching) if compare_node_names(dom, &matching, &to_child) => {
										trace!(key = %to_key, "Relocating keyed element.");
										dom.insert_before(from_parent, &matching, Some(&from_child));
										self.discard_or_defer(&from_child, from_key.clone(), from_parent);
										candidate = matching;
										true
									}
									_ => false,
								}
							}
							(None, Some(_)) => false,
							_ => true,
						};
						keys_agree && compare_node_names(dom, &candidate, &to_child)
					}
					(NodeKind::Text, NodeKind::Text) | (NodeKind::Comment, NodeKind::Comment) => {
						sync_node_value(dom, &candidate, &to_child);
						true
					}
					_ => false,
				};

				if compatible {
					if dom.kind(&candidate) == NodeKind::Element {
						self.morph_element(&candidate, &to_child, false);
					}
					from_cursor = dom.next_sibling(&candidate);
					to_cursor = to_next;
					continue 'to_children;
				}

				self.discard_or_defer(&from_child, from_key, from_parent);
				from_cursor = from_next;
			}

			// No live counterpart left in this list.
			let relocatable = to_key
				.as_ref()
				.and_then(|key| self.key_index.get(key).cloned())
				.filter(|matching| compare_node_names(dom, matching, &to_child));
			if let Some(matching) = relocatable {
				trace!("Moving keyed element to the end.");
				dom.append_child(from_parent, &matching);
				self.morph_element(&matching, &to_child, false);
			} else {
				self.add_node(from_parent, to_child);
			}
			to_cursor = to_next;
		}

		while let Some(from_child) = from_cursor {
			let from_next = dom.next_sibling(&from_child);
			let from_key = self.key(&from_child);
			self.discard_or_defer(&from_child, from_key, from_parent);
			from_cursor = from_next;
		}
	}

	fn discard_or_defer(&mut self, node: &D::Node, key: Option<String>, parent: &D::Node) {
		match key {
			Some(key) => {
				trace!(key = %key, "Deferring removal of keyed node.");
				self.keyed_removals.defer(key, node.clone())
			}
			None => self.remove_node(node, Some(parent), true),
		}
	}

	/// The single insertion point for new nodes.
	fn add_node(&mut self, parent: &D::Node, node: D::Node) {
		let node = match self.options.before_node_added(&node) {
			BeforeNodeAdded::Add => node,
			BeforeNodeAdded::Skip => return trace!("Insertion vetoed."),
			BeforeNodeAdded::Substitute(substitute) => substitute,
		};
		trace!(?node, "Appending new node.");
		self.dom.append_child(parent, &node);
		self.node_added(&node);
	}

	/// Reports `node` and its descendants as added, swapping in unclaimed live nodes for matching keyed descendants.
	fn node_added(&mut self, node: &D::Node) {
		self.options.node_added(node);

		let dom = self.dom;
		let mut cursor = dom.first_child(node);
		while let Some(child) = cursor {
			let next = dom.next_sibling(&child);
			let unmatched = self
				.key(&child)
				.and_then(|key| self.key_index.get(&key).cloned())
				.filter(|unmatched| compare_node_names(dom, &child, unmatched));
			match unmatched {
				Some(unmatched) => {
					trace!(?unmatched, "Swapping in unmatched keyed node.");
					dom.replace_child(node, &unmatched, &child);
					self.morph_element(&unmatched, &child, false);
				}
				None => self.node_added(&child),
			}
			cursor = next;
		}
	}

	/// The single removal point for live nodes.
	///
	/// With `skip_keyed`, keyed descendants aren't reported but deferred instead, as they may still be claimed.
	fn remove_node(&mut self, node: &D::Node, parent: Option<&D::Node>, skip_keyed: bool) {
		if !self.options.before_node_discarded(node) {
			return trace!(?node, "Discard vetoed.");
		}
		if let Some(parent) = parent {
			self.dom.remove_child(parent, node);
		}
		self.options.node_discarded(node);
		self.walk_discarded_children(node, skip_keyed);
	}

	fn walk_discarded_children(&mut self, node: &D::Node, skip_keyed: bool) {
		if self.dom.kind(node) != NodeKind::Element {
			return;
		}
		let dom = self.dom;
		let mut cursor = dom.first_child(node);
		while let Some(child) = cursor {
			match self.key(&child) {
				Some(key) if skip_keyed => self.keyed_removals.defer(key, child.clone()),
				key => {
					if let Some(key) = key {
						self.claim_discarded(&key, &child);
					}
					self.options.node_discarded(&child);
					self.walk_discarded_children(&child, skip_keyed);
				}
			}
			cursor = dom.next_sibling(&child);
		}
	}

	/// Marks a keyed node as discarded, unindexing it unless its key now refers to another node.
	fn claim_discarded(&mut self, key: &str, node: &D::Node) {
		if self.key_index.get(key) == Some(node) {
			self.key_index.claim(key);
		}
		self.settled.push(node.clone());
	}

	/// Discards each deferred node that was never matched, once.
	///
	/// Nodes sharing a key are handled individually, so duplicates the index couldn't hold are discarded too.
	fn discard_unclaimed(&mut self) {
		let span = trace_span!("Discarding unclaimed keyed nodes", deferred = self.keyed_removals.len());
		let _enter = span.enter();

		let deferred: Vec<(String, D::Node)> = self.keyed_removals.drain().collect();
		for (key, node) in deferred {
			if self.settled.contains(&node) {
				continue;
			}
			self.claim_discarded(&key, &node);
			let parent = self.dom.parent_node(&node);
			self.remove_node(&node, parent.as_ref(), false);
		}

		if STATIC_MAX_LEVEL >= Level::DEBUG && self.key_index.len() > 0 {
			debug!("{} keyed node(s) were neither matched nor discarded.", self.key_index.len());
		}
	}
}
