//! Per-call configuration of [`morph`](`crate::diff::morph`).

use crate::{dom::Dom, special::SpecialElements, vnode::VNode};
use core::fmt::{self, Debug, Formatter};

/// What a live tree should be morphed into.
#[derive(Debug, Clone)]
pub enum Target<'a, N> {
	/// A detached node (with its subtree). Parts of it may be moved into the live tree.
	Node(&'a N),
	/// Markup that's parsed into a transient fragment. Only its first node is used.
	Markup(&'a str),
	/// A description that's materialized through the same [`Dom`] first.
	Virtual(&'a VNode),
}

/// The answer of an [`on_before_node_added`](`MorphOptions::on_before_node_added`) hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeforeNodeAdded<N> {
	/// Insert the node as is.
	Add,
	/// Don't insert anything.
	Skip,
	/// Insert this node instead.
	Substitute(N),
}

type KeyFn<'a, D> = Box<dyn 'a + Fn(&D, &<D as Dom>::Node) -> Option<String>>;
type NodeHook<'a, D> = Box<dyn 'a + FnMut(&<D as Dom>::Node)>;
type NodeVeto<'a, D> = Box<dyn 'a + FnMut(&<D as Dom>::Node) -> bool>;
type PairVeto<'a, D> = Box<dyn 'a + FnMut(&<D as Dom>::Node, &<D as Dom>::Node) -> bool>;
type AddHook<'a, D> = Box<dyn 'a + FnMut(&<D as Dom>::Node) -> BeforeNodeAdded<<D as Dom>::Node>>;

/// Hooks and switches of one morph pass.
///
/// All hooks are optional. Vetoes (hooks returning `bool`) skip the mutation they guard by returning `false`.
///
/// ```
/// use dom_morph::{memory::MemoryDocument, MorphOptions};
///
/// let mut discarded = 0;
/// let options = MorphOptions::<MemoryDocument>::new()
/// 	.children_only(true)
/// 	.on_node_discarded(|_| discarded += 1);
/// # drop(options);
/// ```
pub struct MorphOptions<'a, D: Dom> {
	pub(crate) get_node_key: Option<KeyFn<'a, D>>,
	pub(crate) on_before_node_added: Option<AddHook<'a, D>>,
	pub(crate) on_node_added: Option<NodeHook<'a, D>>,
	pub(crate) on_before_el_updated: Option<PairVeto<'a, D>>,
	pub(crate) on_el_updated: Option<NodeHook<'a, D>>,
	pub(crate) on_before_node_discarded: Option<NodeVeto<'a, D>>,
	pub(crate) on_node_discarded: Option<NodeHook<'a, D>>,
	pub(crate) on_before_el_children_updated: Option<PairVeto<'a, D>>,
	pub(crate) children_only: bool,
	pub(crate) special_elements: SpecialElements<D>,
}

/// The default identity key: the element's `id` attribute.
pub fn id_key<D: Dom>(dom: &D, node: &D::Node) -> Option<String> {
	dom.get_attribute(node, None, "id")
}

impl<'a, D: Dom> MorphOptions<'a, D> {
	#[must_use]
	pub fn new() -> Self {
		Self {
			get_node_key: None,
			on_before_node_added: None,
			on_node_added: None,
			on_before_el_updated: None,
			on_el_updated: None,
			on_before_node_discarded: None,
			on_node_discarded: None,
			on_before_el_children_updated: None,
			children_only: false,
			special_elements: SpecialElements::default(),
		}
	}

	/// Replaces the identity key function. It's only called for elements, and empty keys count as no key.
	#[must_use]
	pub fn get_node_key(mut self, get_node_key: impl 'a + Fn(&D, &D::Node) -> Option<String>) -> Self {
		self.get_node_key = Some(Box::new(get_node_key));
		self
	}

	/// Called with each node (target or substitute) before it's inserted into the live tree.
	#[must_use]
	pub fn on_before_node_added(mut self, hook: impl 'a + FnMut(&D::Node) -> BeforeNodeAdded<D::Node>) -> Self {
		self.on_before_node_added = Some(Box::new(hook));
		self
	}

	/// Called after a node was inserted, and for each of its descendants.
	#[must_use]
	pub fn on_node_added(mut self, hook: impl 'a + FnMut(&D::Node)) -> Self {
		self.on_node_added = Some(Box::new(hook));
		self
	}

	/// Called with the live and target element before the live one's attributes are updated.
	#[must_use]
	pub fn on_before_el_updated(mut self, veto: impl 'a + FnMut(&D::Node, &D::Node) -> bool) -> Self {
		self.on_before_el_updated = Some(Box::new(veto));
		self
	}

	#[must_use]
	pub fn on_el_updated(mut self, hook: impl 'a + FnMut(&D::Node)) -> Self {
		self.on_el_updated = Some(Box::new(hook));
		self
	}

	/// Called before a live node is removed. Returning `false` keeps it (and its subtree) in place.
	#[must_use]
	pub fn on_before_node_discarded(mut self, veto: impl 'a + FnMut(&D::Node) -> bool) -> Self {
		self.on_before_node_discarded = Some(Box::new(veto));
		self
	}

	/// Called once for each discarded node and each of its descendants that isn't matched elsewhere.
	#[must_use]
	pub fn on_node_discarded(mut self, hook: impl 'a + FnMut(&D::Node)) -> Self {
		self.on_node_discarded = Some(Box::new(hook));
		self
	}

	/// Called with the live and target element before the live one's children are updated.
	#[must_use]
	pub fn on_before_el_children_updated(mut self, veto: impl 'a + FnMut(&D::Node, &D::Node) -> bool) -> Self {
		self.on_before_el_children_updated = Some(Box::new(veto));
		self
	}

	/// Leave the root itself alone and only morph its children.
	#[must_use]
	pub fn children_only(mut self, children_only: bool) -> Self {
		self.children_only = children_only;
		self
	}

	#[must_use]
	pub fn special_elements(mut self, special_elements: SpecialElements<D>) -> Self {
		self.special_elements = special_elements;
		self
	}

	pub(crate) fn key_of(&self, dom: &D, node: &D::Node) -> Option<String> {
		match &self.get_node_key {
			Some(get_node_key) => get_node_key(dom, node),
			None => id_key(dom, node),
		}
		.filter(|key| !key.is_empty())
	}

	pub(crate) fn before_node_added(&mut self, node: &D::Node) -> BeforeNodeAdded<D::Node> {
		match &mut self.on_before_node_added {
			Some(hook) => hook(node),
			None => BeforeNodeAdded::Add,
		}
	}

	pub(crate) fn node_added(&mut self, node: &D::Node) {
		if let Some(hook) = &mut self.on_node_added {
			hook(node)
		}
	}

	pub(crate) fn before_el_updated(&mut self, from: &D::Node, to: &D::Node) -> bool {
		self.on_before_el_updated.as_mut().map_or(true, |veto| veto(from, to))
	}

	pub(crate) fn el_updated(&mut self, node: &D::Node) {
		if let Some(hook) = &mut self.on_el_updated {
			hook(node)
		}
	}

	pub(crate) fn before_node_discarded(&mut self, node: &D::Node) -> bool {
		self.on_before_node_discarded.as_mut().map_or(true, |veto| veto(node))
	}

	pub(crate) fn node_discarded(&mut self, node: &D::Node) {
		if let Some(hook) = &mut self.on_node_discarded {
			hook(node)
		}
	}

	pub(crate) fn before_el_children_updated(&mut self, from: &D::Node, to: &D::Node) -> bool {
		self.on_before_el_children_updated.as_mut().map_or(true, |veto| veto(from, to))
	}
}

impl<'a, D: Dom> Default for MorphOptions<'a, D> {
	fn default() -> Self {
		Self::new()
	}
}

impl<'a, D: Dom> Debug for MorphOptions<'a, D> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("MorphOptions")
			.field("get_node_key", &self.get_node_key.as_ref().map_or("id", |_| "custom"))
			.field("on_before_node_added", &self.on_before_node_added.is_some())
			.field("on_node_added", &self.on_node_added.is_some())
			.field("on_before_el_updated", &self.on_before_el_updated.is_some())
			.field("on_el_updated", &self.on_el_updated.is_some())
			.field("on_before_node_discarded", &self.on_before_node_discarded.is_some())
			.field("on_node_discarded", &self.on_node_discarded.is_some())
			.field("on_before_el_children_updated", &self.on_before_el_children_updated.is_some())
			.field("children_only", &self.children_only)
			.field("special_elements", &self.special_elements)
			.finish()
	}
}
