//! An in-memory [`Dom`] host.
//!
//! Nodes are reference-counted and own their children. Parents are only referenced weakly,
//! so a detached subtree is freed as soon as the last handle to it is dropped.
//!
//! The host mimics the browser where the morpher can observe a difference:
//!
//! - Names of HTML elements are upper-cased.
//! - Form controls carry live `value`, `checked`, `disabled` and `selected` state that falls back to
//!   the reflecting attributes until it is written.
//! - Inserting a node into its own subtree or removing a node from something other than its parent
//!   are refused (and logged).

use crate::{
	binding::Change,
	dom::{self, Attribute, BoolProperty, Dom, NodeKind, XHTML_NAMESPACE},
	load,
	selector::Selector,
	special::ElementKind,
};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
};
use std::{
	collections::BTreeMap,
	rc::{Rc, Weak},
};
use tracing::{error, instrument, trace, warn};

type AttributeKey = (Option<String>, String);

struct NodeData {
	kind: NodeKind,
	name: String,
	namespace: Option<String>,
	data: String,
	attributes: BTreeMap<AttributeKey, String>,
	children: Vec<MemoryNode>,
	parent: Weak<RefCell<NodeData>>,
	value: Option<String>,
	checked: Option<bool>,
	disabled: Option<bool>,
	selected: Option<bool>,
}
impl NodeData {
	fn new(kind: NodeKind, name: String) -> Self {
		Self {
			kind,
			name,
			namespace: None,
			data: String::new(),
			attributes: BTreeMap::new(),
			children: Vec::new(),
			parent: Weak::new(),
			value: None,
			checked: None,
			disabled: None,
			selected: None,
		}
	}

	fn bool_override(&mut self, property: BoolProperty) -> &mut Option<bool> {
		match property {
			BoolProperty::Checked => &mut self.checked,
			BoolProperty::Disabled => &mut self.disabled,
			BoolProperty::Selected => &mut self.selected,
		}
	}
}

/// A node handle of [`MemoryDocument`]. Equality is identity.
#[derive(Clone)]
pub struct MemoryNode(Rc<RefCell<NodeData>>);
impl PartialEq for MemoryNode {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}
impl Eq for MemoryNode {}
impl Debug for MemoryNode {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let data = self.0.borrow();
		match data.kind {
			NodeKind::Element => write!(f, "MemoryNode(<{}>)", data.name),
			NodeKind::Text => f.write_str("MemoryNode(#text)"),
			NodeKind::Comment => f.write_str("MemoryNode(#comment)"),
			NodeKind::Other => write!(f, "MemoryNode({})", data.name),
		}
	}
}
impl MemoryNode {
	fn new(data: NodeData) -> Self {
		Self(Rc::new(RefCell::new(data)))
	}

	fn parent(&self) -> Option<MemoryNode> {
		self.0.borrow().parent.upgrade().map(MemoryNode)
	}

	fn index_in(&self, parent: &MemoryNode) -> Option<usize> {
		parent.0.borrow().children.iter().position(|child| child == self)
	}

	/// Unlinks `self` from its parent, returning the former parent.
	fn detach(&self) -> Option<MemoryNode> {
		let parent = self.parent()?;
		if let Some(index) = self.index_in(&parent) {
			parent.0.borrow_mut().children.remove(index);
		}
		self.0.borrow_mut().parent = Weak::new();
		Some(parent)
	}

	fn set_parent(&self, parent: &MemoryNode) {
		self.0.borrow_mut().parent = Rc::downgrade(&parent.0);
	}
}

/// The environment handle for [`MemoryNode`] trees.
///
/// Counts effective mutations (writes that change nothing aren't counted) and can record them as [`Change`]s.
#[derive(Default)]
pub struct MemoryDocument {
	mutations: Cell<usize>,
	records: RefCell<Option<Vec<Change<MemoryNode>>>>,
}
impl Debug for MemoryDocument {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("MemoryDocument")
			.field("mutations", &self.mutations.get())
			.field("recording", &self.records.borrow().is_some())
			.finish()
	}
}
impl MemoryDocument {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// The number of effective mutations since creation or the last [`reset_mutation_count`](`MemoryDocument::reset_mutation_count`).
	#[must_use]
	pub fn mutation_count(&self) -> usize {
		self.mutations.get()
	}

	pub fn reset_mutation_count(&self) {
		self.mutations.set(0)
	}

	/// Starts or stops recording [`Change`]s. Stopping discards pending records.
	pub fn record_changes(&self, enabled: bool) {
		let mut records = self.records.borrow_mut();
		match (enabled, records.is_some()) {
			(true, false) => *records = Some(Vec::new()),
			(false, true) => *records = None,
			_ => (),
		}
	}

	/// Drains recorded [`Change`]s, in the order the mutations happened.
	pub fn take_records(&self) -> Vec<Change<MemoryNode>> {
		self.records.borrow_mut().as_mut().map(core::mem::take).unwrap_or_default()
	}

	/// A detached container node, like a ***DocumentFragment***.
	#[must_use]
	pub fn create_fragment(&self) -> MemoryNode {
		MemoryNode::new(NodeData::new(NodeKind::Other, "#document-fragment".to_owned()))
	}

	#[must_use]
	pub fn child_nodes(&self, node: &MemoryNode) -> Vec<MemoryNode> {
		node.0.borrow().children.clone()
	}

	/// Serializes `node` and its descendants. Attributes are written in a canonical order.
	#[must_use]
	pub fn outer_html(&self, node: &MemoryNode) -> String {
		let mut html = String::new();
		serialize(node, &mut html);
		html
	}

	#[must_use]
	pub fn inner_html(&self, node: &MemoryNode) -> String {
		let mut html = String::new();
		for child in node.0.borrow().children.iter() {
			serialize(child, &mut html)
		}
		html
	}

	fn mutated(&self) {
		self.mutations.set(self.mutations.get() + 1)
	}

	fn record(&self, change: impl FnOnce() -> Change<MemoryNode>) {
		if let Some(records) = self.records.borrow_mut().as_mut() {
			records.push(change())
		}
	}

	fn record_child_list(&self, target: &MemoryNode, added: Option<&MemoryNode>, removed: Option<&MemoryNode>) {
		self.record(|| Change::ChildList {
			target: target.clone(),
			added: added.cloned().into_iter().collect(),
			removed: removed.cloned().into_iter().collect(),
		})
	}

	fn form_kind(node: &MemoryNode) -> Option<ElementKind> {
		let data = node.0.borrow();
		if data.kind == NodeKind::Element {
			ElementKind::of(&data.name)
		} else {
			None
		}
	}
}

impl Dom for MemoryDocument {
	type Node = MemoryNode;

	fn kind(&self, node: &MemoryNode) -> NodeKind {
		node.0.borrow().kind
	}

	fn node_name(&self, node: &MemoryNode) -> String {
		let data = node.0.borrow();
		match data.kind {
			NodeKind::Element | NodeKind::Other => data.name.clone(),
			NodeKind::Text => "#text".to_owned(),
			NodeKind::Comment => "#comment".to_owned(),
		}
	}

	fn namespace_uri(&self, node: &MemoryNode) -> Option<String> {
		node.0.borrow().namespace.clone()
	}

	fn node_value(&self, node: &MemoryNode) -> Option<String> {
		let data = node.0.borrow();
		match data.kind {
			NodeKind::Text | NodeKind::Comment => Some(data.data.clone()),
			NodeKind::Element | NodeKind::Other => None,
		}
	}

	fn set_node_value(&self, node: &MemoryNode, value: &str) {
		{
			let mut data = node.0.borrow_mut();
			if !matches!(data.kind, NodeKind::Text | NodeKind::Comment) {
				return trace!("Ignoring node value write to {:?}.", data.name);
			}
			if data.data == value {
				return;
			}
			data.data = value.to_owned();
		}
		self.mutated();
	}

	fn parent_node(&self, node: &MemoryNode) -> Option<MemoryNode> {
		node.parent()
	}

	fn first_child(&self, node: &MemoryNode) -> Option<MemoryNode> {
		node.0.borrow().children.first().cloned()
	}

	fn next_sibling(&self, node: &MemoryNode) -> Option<MemoryNode> {
		let parent = node.parent()?;
		let index = node.index_in(&parent)?;
		let sibling = parent.0.borrow().children.get(index + 1).cloned();
		sibling
	}

	fn attributes(&self, element: &MemoryNode) -> Vec<Attribute> {
		element
			.0
			.borrow()
			.attributes
			.iter()
			.map(|((namespace, name), value)| Attribute {
				namespace: namespace.clone(),
				name: name.clone(),
				value: value.clone(),
			})
			.collect()
	}

	fn get_attribute(&self, element: &MemoryNode, namespace: Option<&str>, name: &str) -> Option<String> {
		element.0.borrow().attributes.get(&(namespace.map(str::to_owned), name.to_owned())).cloned()
	}

	fn set_attribute(&self, element: &MemoryNode, namespace: Option<&str>, name: &str, value: &str) {
		{
			let mut data = element.0.borrow_mut();
			if data.kind != NodeKind::Element {
				return error!("Can't set attribute {:?} on {:?}.", name, data.name);
			}
			let previous = data.attributes.insert((namespace.map(str::to_owned), name.to_owned()), value.to_owned());
			if previous.as_deref() == Some(value) {
				return;
			}
		}
		self.mutated();
		self.record(|| Change::Attributes {
			target: element.clone(),
			name: name.to_owned(),
		});
	}

	fn remove_attribute(&self, element: &MemoryNode, namespace: Option<&str>, name: &str) {
		let removed = element.0.borrow_mut().attributes.remove(&(namespace.map(str::to_owned), name.to_owned()));
		if removed.is_some() {
			self.mutated();
			self.record(|| Change::Attributes {
				target: element.clone(),
				name: name.to_owned(),
			});
		}
	}

	#[instrument(skip(self))]
	fn insert_before(&self, parent: &MemoryNode, child: &MemoryNode, reference: Option<&MemoryNode>) {
		if matches!(self.kind(parent), NodeKind::Text | NodeKind::Comment) {
			return error!("Can't insert children into a text or comment node.");
		}
		if dom::is_inclusive_ancestor(self, child, parent) {
			return error!("Refusing to insert a node into its own subtree.");
		}
		if let Some(reference) = reference {
			if reference == child {
				return;
			}
			if reference.parent().as_ref() != Some(parent) {
				return error!("Reference node is not a child of the parent.");
			}
		}

		let previous_parent = child.detach();
		let index = match reference {
			Some(reference) => match reference.index_in(parent) {
				Some(index) => index,
				None => return error!("Lost the reference node while inserting."),
			},
			None => parent.0.borrow().children.len(),
		};
		parent.0.borrow_mut().children.insert(index, child.clone());
		child.set_parent(parent);
		self.mutated();

		if let Some(previous_parent) = previous_parent {
			self.record_child_list(&previous_parent, None, Some(child));
		}
		self.record_child_list(parent, Some(child), None);
	}

	#[instrument(skip(self))]
	fn remove_child(&self, parent: &MemoryNode, child: &MemoryNode) {
		let index = match child.index_in(parent) {
			Some(index) => index,
			None => return error!("Can't remove a node from something other than its parent."),
		};
		parent.0.borrow_mut().children.remove(index);
		child.0.borrow_mut().parent = Weak::new();
		self.mutated();
		self.record_child_list(parent, None, Some(child));
	}

	#[instrument(skip(self))]
	fn replace_child(&self, parent: &MemoryNode, new_child: &MemoryNode, old_child: &MemoryNode) {
		if new_child == old_child {
			return;
		}
		if old_child.parent().as_ref() != Some(parent) {
			return error!("Can't replace a node that isn't a child of the parent.");
		}
		if dom::is_inclusive_ancestor(self, new_child, parent) {
			return error!("Refusing to insert a node into its own subtree.");
		}

		let previous_parent = new_child.detach();
		let index = match old_child.index_in(parent) {
			Some(index) => index,
			None => return error!("Lost the replaced node while detaching its replacement."),
		};
		parent.0.borrow_mut().children[index] = new_child.clone();
		new_child.set_parent(parent);
		old_child.0.borrow_mut().parent = Weak::new();
		self.mutated();

		if let Some(previous_parent) = previous_parent {
			self.record_child_list(&previous_parent, None, Some(new_child));
		}
		self.record(|| Change::ChildList {
			target: parent.clone(),
			added: vec![new_child.clone()],
			removed: vec![old_child.clone()],
		});
	}

	fn create_element(&self, name: &str, namespace: Option<&str>) -> Option<MemoryNode> {
		let (name, namespace) = match namespace {
			None | Some(XHTML_NAMESPACE) => (name.to_ascii_uppercase(), XHTML_NAMESPACE),
			Some(namespace) => (name.to_owned(), namespace),
		};
		let mut data = NodeData::new(NodeKind::Element, name);
		data.namespace = Some(namespace.to_owned());
		Some(MemoryNode::new(data))
	}

	fn create_text_node(&self, text: &str) -> MemoryNode {
		let mut data = NodeData::new(NodeKind::Text, String::new());
		data.data = text.to_owned();
		MemoryNode::new(data)
	}

	fn create_comment(&self, comment: &str) -> MemoryNode {
		let mut data = NodeData::new(NodeKind::Comment, String::new());
		data.data = comment.to_owned();
		MemoryNode::new(data)
	}

	fn parse_markup(&self, markup: &str) -> Option<MemoryNode> {
		let fragment = self.create_fragment();
		for node in load::parse_fragment(self, markup) {
			self.append_child(&fragment, &node)
		}
		self.first_child(&fragment)
	}

	fn bool_property(&self, element: &MemoryNode, property: BoolProperty) -> bool {
		let explicit = *element.0.borrow_mut().bool_override(property);
		explicit.unwrap_or_else(|| self.has_attribute(element, None, property.attribute_name()))
	}

	fn set_bool_property(&self, element: &MemoryNode, property: BoolProperty, value: bool) {
		let changed = self.bool_property(element, property) != value;
		*element.0.borrow_mut().bool_override(property) = Some(value);
		if changed {
			self.mutated()
		}
	}

	fn value(&self, element: &MemoryNode) -> Option<String> {
		let kind = Self::form_kind(element)?;
		if let Some(value) = element.0.borrow().value.clone() {
			return Some(value);
		}
		Some(match kind {
			ElementKind::TextArea => dom::text_content(self, element),
			ElementKind::Option => self.get_attribute(element, None, "value").unwrap_or_else(|| dom::text_content(self, element)),
			ElementKind::Input | ElementKind::Select => self.get_attribute(element, None, "value").unwrap_or_default(),
		})
	}

	fn set_value(&self, element: &MemoryNode, value: &str) {
		if Self::form_kind(element).is_none() {
			return warn!("Ignoring value write to {:?}, which is not a form control.", element);
		}
		let changed = self.value(element).as_deref() != Some(value);
		element.0.borrow_mut().value = Some(value.to_owned());
		if changed {
			self.mutated()
		}
	}

	fn matches(&self, element: &MemoryNode, selector: &str) -> bool {
		match Selector::parse(selector) {
			Some(selector) => selector.matches(self, element),
			None => {
				warn!("Unsupported selector {:?}.", selector);
				false
			}
		}
	}
}

const VOID_ELEMENTS: &[&str] = &[
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

fn serialize(node: &MemoryNode, html: &mut String) {
	let data = node.0.borrow();
	match data.kind {
		NodeKind::Text => escape_into(&data.data, false, html),
		NodeKind::Comment => {
			html.push_str("<!--");
			html.push_str(&data.data);
			html.push_str("-->");
		}
		NodeKind::Other => {
			for child in &data.children {
				serialize(child, html)
			}
		}
		NodeKind::Element => {
			let name = if data.namespace.as_deref() == Some(XHTML_NAMESPACE) {
				data.name.to_ascii_lowercase()
			} else {
				data.name.clone()
			};
			html.push('<');
			html.push_str(&name);
			for ((_, attribute), value) in &data.attributes {
				html.push(' ');
				html.push_str(attribute);
				html.push_str("=\"");
				escape_into(value, true, html);
				html.push('"');
			}
			html.push('>');
			if data.children.is_empty() && VOID_ELEMENTS.contains(&name.as_str()) {
				return;
			}
			for child in &data.children {
				serialize(child, html)
			}
			html.push_str("</");
			html.push_str(&name);
			html.push('>');
		}
	}
}

fn escape_into(text: &str, attribute: bool, html: &mut String) {
	for c in text.chars() {
		match c {
			'&' => html.push_str("&amp;"),
			'<' => html.push_str("&lt;"),
			'>' => html.push_str("&gt;"),
			'"' if attribute => html.push_str("&quot;"),
			c => html.push(c),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parent_references_are_weak() {
		let document = MemoryDocument::new();
		let child = document.create_text_node("orphan");
		{
			let parent = document.create_element("div", None).unwrap();
			document.append_child(&parent, &child);
			assert_eq!(document.parent_node(&child).as_ref(), Some(&parent));
		}
		assert_eq!(document.parent_node(&child), None);
	}

	#[test]
	fn refuses_cycles() {
		let document = MemoryDocument::new();
		let outer = document.create_element("div", None).unwrap();
		let inner = document.create_element("div", None).unwrap();
		document.append_child(&outer, &inner);
		document.append_child(&inner, &outer);
		assert_eq!(document.parent_node(&outer), None);
		assert_eq!(document.outer_html(&outer), "<div><div></div></div>");
	}

	#[test]
	fn moves_between_parents() {
		let document = MemoryDocument::new();
		let a = document.create_element("ul", None).unwrap();
		let b = document.create_element("ol", None).unwrap();
		let item = document.create_element("li", None).unwrap();
		document.append_child(&a, &item);
		document.append_child(&b, &item);
		assert_eq!(document.outer_html(&a), "<ul></ul>");
		assert_eq!(document.outer_html(&b), "<ol><li></li></ol>");
		assert_eq!(document.mutation_count(), 2);
	}

	#[test]
	fn form_state_falls_back_to_attributes() {
		let document = MemoryDocument::new();
		let input = document.create_element("input", None).unwrap();
		document.set_attribute(&input, None, "value", "initial");
		document.set_attribute(&input, None, "checked", "");
		assert_eq!(document.value(&input).as_deref(), Some("initial"));
		assert!(document.bool_property(&input, BoolProperty::Checked));

		document.set_value(&input, "typed");
		document.set_bool_property(&input, BoolProperty::Checked, false);
		document.set_attribute(&input, None, "value", "ignored");
		assert_eq!(document.value(&input).as_deref(), Some("typed"));
		assert!(!document.bool_property(&input, BoolProperty::Checked));
	}

	#[test]
	fn unchanged_writes_are_not_counted() {
		let document = MemoryDocument::new();
		let div = document.create_element("div", None).unwrap();
		document.set_attribute(&div, None, "class", "a");
		document.set_attribute(&div, None, "class", "a");
		document.remove_attribute(&div, None, "title");
		assert_eq!(document.mutation_count(), 1);
	}

	#[test]
	fn records_changes_when_enabled() {
		let document = MemoryDocument::new();
		let div = document.create_element("div", None).unwrap();
		document.set_attribute(&div, None, "data-a", "1");
		document.record_changes(true);
		document.set_attribute(&div, None, "data-b", "2");
		let text = document.create_text_node("x");
		document.append_child(&div, &text);
		let records = document.take_records();
		assert_eq!(records.len(), 2);
		assert!(matches!(&records[0], Change::Attributes { name, .. } if name == "data-b"));
		assert!(matches!(&records[1], Change::ChildList { added, .. } if added.len() == 1 && added[0] == text));
		assert!(document.take_records().is_empty());
	}
}
