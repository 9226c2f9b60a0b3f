//! Declarative view binding.
//!
//! A [`BindingRegistry`] associates CSS selectors with [`View`]s. Each matching element is rendered from its
//! [`Dataset`] (children only, the element itself is left alone) and then re-rendered whenever it changes.
//!
//! Changes don't reach the registry directly. The host reports them as [`Change`] records, the caller queues them
//! in a [`ChangeSource`] and the registry only reacts when [`flush`](`BindingRegistry::flush`)ed, rendering each
//! dirty element at most once per flush no matter how many changes it received.

use crate::{
	diff::morph,
	dom::{children, Dom, NodeKind},
	options::{MorphOptions, Target},
	vnode::VNode,
};
use core::fmt::{self, Debug, Formatter};
use std::{collections::BTreeMap, rc::Rc};
use tracing::{instrument, trace, trace_span, warn};

/// A tree mutation as reported by a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<N> {
	Attributes {
		target: N,
		name: String,
	},
	ChildList {
		target: N,
		added: Vec<N>,
		removed: Vec<N>,
	},
}
impl<N> Change<N> {
	pub fn target(&self) -> &N {
		match self {
			Change::Attributes { target, .. } | Change::ChildList { target, .. } => target,
		}
	}

	/// Whether this change requires a re-render of a view bound to its target.
	#[must_use]
	pub fn dirties_target(&self) -> bool {
		match self {
			Change::Attributes { name, .. } => name.starts_with("data-"),
			Change::ChildList { removed, .. } => !removed.is_empty(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Coalesced pending changes, as returned by [`ChangeSource::take`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch<N> {
	/// Subscriptions whose node was dirtied, each once, in order of their first change.
	pub dirty: Vec<SubscriptionId>,
	/// Nodes that were inserted anywhere, each once.
	pub added: Vec<N>,
}
impl<N> ChangeBatch<N> {
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.dirty.is_empty() && self.added.is_empty()
	}
}

/// A caller-owned queue of [`Change`]s with explicit subscriptions.
///
/// Nothing is delivered while changes are pushed. Subscribers learn about them only through [`take`](`ChangeSource::take`).
///
/// A subscription only sees changes pushed after it was created.
/// Host records describing earlier mutations must therefore be pushed *before* subscribing, or they count as new.
pub struct ChangeSource<N> {
	subscriptions: Vec<Subscription<N>>,
	pending: Vec<(u64, Change<N>)>,
	next_id: u64,
	next_sequence: u64,
}
struct Subscription<N> {
	id: SubscriptionId,
	node: N,
	/// Sequence number of the first change this subscription can see.
	since: u64,
}
impl<N> Default for ChangeSource<N> {
	fn default() -> Self {
		Self {
			subscriptions: Vec::new(),
			pending: Vec::new(),
			next_id: 0,
			next_sequence: 0,
		}
	}
}
impl<N> Debug for ChangeSource<N> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ChangeSource")
			.field("subscriptions", &self.subscriptions.len())
			.field("pending", &self.pending.len())
			.finish()
	}
}
impl<N: Clone + PartialEq> ChangeSource<N> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Marks `node` as interesting from now on. The same node may be subscribed more than once.
	///
	/// Changes that are already queued don't dirty the new subscription.
	pub fn subscribe(&mut self, node: N) -> SubscriptionId {
		let id = SubscriptionId(self.next_id);
		self.next_id += 1;
		self.subscriptions.push(Subscription {
			id,
			node,
			since: self.next_sequence,
		});
		id
	}

	/// Returns whether the subscription existed.
	pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
		let before = self.subscriptions.len();
		self.subscriptions.retain(|subscription| subscription.id != id);
		self.subscriptions.len() != before
	}

	#[must_use]
	pub fn subscription_count(&self) -> usize {
		self.subscriptions.len()
	}

	pub fn push(&mut self, change: Change<N>) {
		self.pending.push((self.next_sequence, change));
		self.next_sequence += 1;
	}

	#[must_use]
	pub fn pending(&self) -> usize {
		self.pending.len()
	}

	/// Drains and coalesces all pending changes.
	pub fn take(&mut self) -> ChangeBatch<N> {
		let mut batch = ChangeBatch {
			dirty: Vec::new(),
			added: Vec::new(),
		};
		for (sequence, change) in self.pending.drain(..) {
			if let Change::ChildList { added, .. } = &change {
				for node in added {
					if !batch.added.contains(node) {
						batch.added.push(node.clone())
					}
				}
			}
			if change.dirties_target() {
				for subscription in &self.subscriptions {
					if subscription.since <= sequence && &subscription.node == change.target() && !batch.dirty.contains(&subscription.id) {
						batch.dirty.push(subscription.id)
					}
				}
			}
		}
		batch
	}
}
impl<N> Extend<Change<N>> for ChangeSource<N> {
	fn extend<T: IntoIterator<Item = Change<N>>>(&mut self, changes: T) {
		for change in changes {
			self.pending.push((self.next_sequence, change));
			self.next_sequence += 1;
		}
	}
}

/// An element's `data-*` attributes, keyed by camel-cased name (`data-selected-vertex-id` becomes `selectedVertexId`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset(BTreeMap<String, String>);
impl Dataset {
	#[must_use]
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str)
	}

	#[must_use]
	pub fn contains(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
		self.0.insert(key.into(), value.into())
	}

	pub fn remove(&mut self, key: &str) -> Option<String> {
		self.0.remove(key)
	}

	pub fn iter(&self) -> impl '_ + Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

/// Reads the [`Dataset`] of `element`.
pub fn dataset<D: Dom>(dom: &D, element: &D::Node) -> Dataset {
	Dataset(
		dom.attributes(element)
			.into_iter()
			.filter(|attribute| attribute.namespace.is_none())
			.filter_map(|attribute| Some((dataset_key(&attribute.name)?, attribute.value)))
			.collect(),
	)
}

fn dataset_key(attribute: &str) -> Option<String> {
	let rest = attribute.strip_prefix("data-")?;
	let mut key = String::with_capacity(rest.len());
	let mut chars = rest.chars().peekable();
	while let Some(c) = chars.next() {
		match (c, chars.peek().copied()) {
			('-', Some(next)) if next.is_ascii_lowercase() => {
				key.push(next.to_ascii_uppercase());
				chars.next();
			}
			(c, _) => key.push(c),
		}
	}
	Some(key)
}

/// The attribute name of a dataset key.
#[must_use]
pub fn data_attribute_name(key: &str) -> String {
	let mut name = String::with_capacity(key.len() + 8);
	name.push_str("data-");
	for c in key.chars() {
		if c.is_ascii_uppercase() {
			name.push('-');
			name.push(c.to_ascii_lowercase());
		} else {
			name.push(c)
		}
	}
	name
}

/// Writes `value` into the dataset of `element`.
pub fn set_data<D: Dom>(dom: &D, element: &D::Node, key: &str, value: &str) {
	dom.set_attribute(element, None, &data_attribute_name(key), value)
}

pub fn remove_data<D: Dom>(dom: &D, element: &D::Node, key: &str) {
	dom.remove_attribute(element, None, &data_attribute_name(key))
}

/// Renders the children of bound elements.
pub trait View<D: Dom> {
	/// Describes the bound element from its dataset. Only the children of the returned root are used.
	///
	/// [`None`] skips this render.
	fn render(&self, dataset: &Dataset) -> Option<VNode>;

	/// Called once per element, before its first render.
	fn init(&self, _dom: &D, _element: &D::Node) {}

	/// Options for each render. [`children_only`](`MorphOptions::children_only`) is always enforced.
	fn morph_options(&self) -> MorphOptions<'_, D> {
		MorphOptions::new()
	}
}

struct Binding<D: Dom + 'static> {
	selector: String,
	view: Rc<dyn View<D>>,
}

struct Bound<D: Dom + 'static> {
	selector: String,
	element: D::Node,
	subscription: SubscriptionId,
	view: Rc<dyn View<D>>,
}

/// Selector → [`View`] registrations and the elements bound through them.
pub struct BindingRegistry<D: Dom + 'static> {
	bindings: Vec<Binding<D>>,
	bound: Vec<Bound<D>>,
}
impl<D: Dom + 'static> Default for BindingRegistry<D> {
	fn default() -> Self {
		Self {
			bindings: Vec::new(),
			bound: Vec::new(),
		}
	}
}
impl<D: Dom + 'static> Debug for BindingRegistry<D> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("BindingRegistry")
			.field("selectors", &self.bindings.iter().map(|binding| &binding.selector).collect::<Vec<_>>())
			.field("bound", &self.bound.len())
			.finish()
	}
}
impl<D: Dom + 'static> BindingRegistry<D> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Binds `view` to every descendant of `root` that matches `selector` and registers it for elements
	/// reported as added later on. Returns the number of newly bound elements.
	///
	/// If `selector` is already registered, the earlier view stays in place for later additions.
	///
	/// Push any host records of mutations made so far into `source` first.
	/// Records pushed after binding count as changes to the new bindings and re-render them on the next [`flush`](`BindingRegistry::flush`).
	#[instrument(skip(self, dom, source, root, view))]
	pub fn bind(
		&mut self,
		dom: &D,
		source: &mut ChangeSource<D::Node>,
		root: &D::Node,
		selector: &str,
		view: impl View<D> + 'static,
	) -> usize {
		let view: Rc<dyn View<D>> = Rc::new(view);
		let mut matching = Vec::new();
		collect_matching(dom, root, selector, &mut matching);

		let mut count = 0;
		for element in matching {
			if self.init(dom, source, element, selector, &view) {
				count += 1
			}
		}

		if self.bindings.iter().any(|binding| binding.selector == selector) {
			warn!("Selector is already bound. Keeping the earlier view for added elements.");
		} else {
			self.bindings.push(Binding {
				selector: selector.to_owned(),
				view,
			})
		}
		count
	}

	/// Binds `node` to each registered view whose selector it matches. Returns the number of new bindings.
	pub fn node_added(&mut self, dom: &D, source: &mut ChangeSource<D::Node>, node: &D::Node) -> usize {
		if dom.kind(node) != NodeKind::Element {
			return 0;
		}
		let matching: Vec<(String, Rc<dyn View<D>>)> = self
			.bindings
			.iter()
			.filter(|binding| dom.matches(node, &binding.selector))
			.map(|binding| (binding.selector.clone(), Rc::clone(&binding.view)))
			.collect();
		matching
			.into_iter()
			.filter(|(selector, view)| self.init(dom, source, node.clone(), selector, view))
			.count()
	}

	/// Drops the registration of `selector` and unsubscribes all elements bound through it.
	/// Returns the number of released elements.
	pub fn unbind(&mut self, source: &mut ChangeSource<D::Node>, selector: &str) -> usize {
		self.bindings.retain(|binding| binding.selector != selector);
		let before = self.bound.len();
		self.bound.retain(|bound| {
			if bound.selector == selector {
				source.unsubscribe(bound.subscription);
				false
			} else {
				true
			}
		});
		before - self.bound.len()
	}

	/// Processes all pending changes: newly added elements are bound, then each dirty bound element is re-rendered once.
	///
	/// Returns the number of renders.
	#[instrument(skip(self, dom, source))]
	pub fn flush(&mut self, dom: &D, source: &mut ChangeSource<D::Node>) -> usize {
		let batch = source.take();
		if batch.is_empty() {
			return 0;
		}

		let mut renders = 0;
		for node in &batch.added {
			renders += self.node_added(dom, source, node);
		}

		let mut rendered = Vec::new();
		for id in batch.dirty {
			if let Some(bound) = self.bound.iter().find(|bound| bound.subscription == id) {
				if rendered.contains(&bound.element) {
					continue;
				}
				render(dom, &bound.element, &*bound.view);
				rendered.push(bound.element.clone());
				renders += 1;
			}
		}
		trace!("{} render(s).", renders);
		renders
	}

	#[must_use]
	pub fn bound_count(&self) -> usize {
		self.bound.len()
	}

	#[must_use]
	pub fn is_bound(&self, element: &D::Node) -> bool {
		self.bound.iter().any(|bound| &bound.element == element)
	}

	fn init(&mut self, dom: &D, source: &mut ChangeSource<D::Node>, element: D::Node, selector: &str, view: &Rc<dyn View<D>>) -> bool {
		if self.bound.iter().any(|bound| bound.selector == selector && bound.element == element) {
			return false;
		}
		let span = trace_span!("Binding element", ?element, selector);
		let _enter = span.enter();

		let subscription = source.subscribe(element.clone());
		view.init(dom, &element);
		render(dom, &element, &**view);
		self.bound.push(Bound {
			selector: selector.to_owned(),
			element,
			subscription,
			view: Rc::clone(view),
		});
		true
	}
}

fn collect_matching<D: Dom>(dom: &D, node: &D::Node, selector: &str, matching: &mut Vec<D::Node>) {
	for child in children(dom, node) {
		if dom.kind(&child) == NodeKind::Element {
			if dom.matches(&child, selector) {
				matching.push(child.clone())
			}
			collect_matching(dom, &child, selector, matching)
		}
	}
}

fn render<D: Dom>(dom: &D, element: &D::Node, view: &dyn View<D>) {
	let span = trace_span!("Rendering bound element", ?element);
	let _enter = span.enter();

	match view.render(&dataset(dom, element)) {
		Some(vnode) => {
			morph(dom, element, Target::Virtual(&vnode), view.morph_options().children_only(true));
		}
		None => trace!("View rendered nothing."),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn dataset_keys_are_camel_cased() {
		assert_eq!(dataset_key("data-selected-vertex-id").as_deref(), Some("selectedVertexId"));
		assert_eq!(dataset_key("data-config").as_deref(), Some("config"));
		assert_eq!(dataset_key("data-x-1").as_deref(), Some("x-1"));
		assert_eq!(dataset_key("id"), None);
		assert_eq!(data_attribute_name("editedEdgeIndex"), "data-edited-edge-index");
	}

	#[test]
	fn changes_coalesce_per_subscription() {
		let mut source = ChangeSource::<u32>::new();
		let a = source.subscribe(1);
		let b = source.subscribe(2);
		source.push(Change::Attributes {
			target: 1,
			name: "data-x".to_owned(),
		});
		source.push(Change::Attributes {
			target: 1,
			name: "data-y".to_owned(),
		});
		source.push(Change::Attributes {
			target: 2,
			name: "class".to_owned(),
		});
		source.push(Change::ChildList {
			target: 2,
			added: vec![7, 7],
			removed: vec![],
		});
		assert_eq!(source.pending(), 4);

		let batch = source.take();
		assert_eq!(batch.dirty, vec![a]);
		assert_eq!(batch.added, vec![7]);
		assert_eq!(source.pending(), 0);

		source.push(Change::ChildList {
			target: 2,
			added: vec![],
			removed: vec![3],
		});
		assert!(source.unsubscribe(b));
		assert!(!source.unsubscribe(b));
		assert!(source.take().is_empty());
	}

	#[test]
	fn subscriptions_ignore_earlier_changes() {
		let mut source = ChangeSource::<u32>::new();
		source.push(Change::Attributes {
			target: 1,
			name: "data-x".to_owned(),
		});
		let early = source.subscribe(1);
		source.extend(vec![Change::Attributes {
			target: 2,
			name: "data-x".to_owned(),
		}]);
		let late = source.subscribe(2);
		assert!(source.take().dirty.is_empty());

		source.extend(vec![
			Change::Attributes {
				target: 2,
				name: "data-y".to_owned(),
			},
			Change::Attributes {
				target: 1,
				name: "data-y".to_owned(),
			},
		]);
		assert_eq!(source.take().dirty, vec![late, early]);
	}
}
