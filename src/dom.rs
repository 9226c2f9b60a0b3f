//! The host tree abstraction.
//!
//! Everything in this crate reaches the tree it works on through a [`Dom`] handle that is passed in explicitly,
//! so independent documents (or a browser document and any number of in-memory ones) can coexist.
//!
//! Like the browser [***DOM***](https://developer.mozilla.org/en-US/docs/Web/API/Document_Object_Model),
//! all methods take `&self`: Nodes are handles and mutation happens through interior mutability.

use core::fmt::Debug;

/// The [***namespaceURI***](https://developer.mozilla.org/en-US/docs/Web/API/Element/namespaceURI) of HTML elements.
pub const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";
/// The [***namespaceURI***](https://developer.mozilla.org/en-US/docs/Web/API/Element/namespaceURI) of SVG elements.
pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
	Element,
	Text,
	Comment,
	/// Documents, fragments, doctypes and anything else the morpher doesn't update in place.
	Other,
}

/// An attribute as seen on an element.
///
/// For namespaced attributes, `name` is the local name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
	pub namespace: Option<String>,
	pub name: String,
	pub value: String,
}

/// Boolean live state of form controls that can diverge from the element's attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolProperty {
	Checked,
	Disabled,
	Selected,
}
impl BoolProperty {
	/// The attribute that reflects this property's initial state.
	#[must_use]
	pub fn attribute_name(self) -> &'static str {
		match self {
			BoolProperty::Checked => "checked",
			BoolProperty::Disabled => "disabled",
			BoolProperty::Selected => "selected",
		}
	}
}

/// A tree host.
///
/// Implementations log and skip failing mutations instead of reporting them,
/// so a morph pass always runs to completion.
pub trait Dom {
	/// A node handle. Equality is node identity.
	type Node: Clone + PartialEq + Debug;

	fn kind(&self, node: &Self::Node) -> NodeKind;

	/// The [***nodeName***](https://developer.mozilla.org/en-US/docs/Web/API/Node/nodeName).
	///
	/// Hosts that follow the browser upper-case the names of HTML elements here.
	fn node_name(&self, node: &Self::Node) -> String;
	fn namespace_uri(&self, node: &Self::Node) -> Option<String>;

	/// Text or comment data. [`None`] for other nodes.
	fn node_value(&self, node: &Self::Node) -> Option<String>;
	fn set_node_value(&self, node: &Self::Node, value: &str);

	fn parent_node(&self, node: &Self::Node) -> Option<Self::Node>;
	fn first_child(&self, node: &Self::Node) -> Option<Self::Node>;
	fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

	/// A snapshot of `element`'s attributes.
	fn attributes(&self, element: &Self::Node) -> Vec<Attribute>;
	fn get_attribute(&self, element: &Self::Node, namespace: Option<&str>, name: &str) -> Option<String>;
	fn has_attribute(&self, element: &Self::Node, namespace: Option<&str>, name: &str) -> bool {
		self.get_attribute(element, namespace, name).is_some()
	}
	fn set_attribute(&self, element: &Self::Node, namespace: Option<&str>, name: &str, value: &str);
	fn remove_attribute(&self, element: &Self::Node, namespace: Option<&str>, name: &str);

	/// Moves `child` (out of its current parent, if any) in front of `reference`, or to the end if `reference` is [`None`].
	fn insert_before(&self, parent: &Self::Node, child: &Self::Node, reference: Option<&Self::Node>);
	fn append_child(&self, parent: &Self::Node, child: &Self::Node) {
		self.insert_before(parent, child, None)
	}
	fn remove_child(&self, parent: &Self::Node, child: &Self::Node);
	fn replace_child(&self, parent: &Self::Node, new_child: &Self::Node, old_child: &Self::Node) {
		self.insert_before(parent, new_child, Some(old_child));
		self.remove_child(parent, old_child);
	}

	/// Creates a detached element. HTML elements are created for [`None`] and [`XHTML_NAMESPACE`].
	fn create_element(&self, name: &str, namespace: Option<&str>) -> Option<Self::Node>;
	fn create_text_node(&self, data: &str) -> Self::Node;
	fn create_comment(&self, data: &str) -> Self::Node;

	/// Parses `markup` as a fragment and returns its first node.
	///
	/// The remaining top-level nodes stay reachable as that node's siblings.
	fn parse_markup(&self, markup: &str) -> Option<Self::Node>;

	fn bool_property(&self, element: &Self::Node, property: BoolProperty) -> bool;
	fn set_bool_property(&self, element: &Self::Node, property: BoolProperty, value: bool);

	/// The live ***value*** of a form control. [`None`] for elements without one.
	fn value(&self, element: &Self::Node) -> Option<String>;
	fn set_value(&self, element: &Self::Node, value: &str);

	/// Whether `element` matches a CSS selector.
	fn matches(&self, element: &Self::Node, selector: &str) -> bool;
}

/// Iterates over `node`'s children, reading each next sibling lazily.
///
/// Mutating the list while iterating is fine as long as the current child stays in place.
pub fn children<'a, D: Dom>(dom: &'a D, node: &D::Node) -> Children<'a, D> {
	Children {
		dom,
		next: dom.first_child(node),
	}
}

pub struct Children<'a, D: Dom> {
	dom: &'a D,
	next: Option<D::Node>,
}
impl<'a, D: Dom> Iterator for Children<'a, D> {
	type Item = D::Node;

	fn next(&mut self) -> Option<Self::Item> {
		let current = self.next.take()?;
		self.next = self.dom.next_sibling(&current);
		Some(current)
	}
}

/// Whether `ancestor` is `node` or one of its ancestors.
pub fn is_inclusive_ancestor<D: Dom>(dom: &D, ancestor: &D::Node, node: &D::Node) -> bool {
	let mut current = Some(node.clone());
	while let Some(candidate) = current {
		if &candidate == ancestor {
			return true;
		}
		current = dom.parent_node(&candidate);
	}
	false
}

/// Concatenated data of all text descendants.
pub fn text_content<D: Dom>(dom: &D, node: &D::Node) -> String {
	let mut text = String::new();
	collect_text(dom, node, &mut text);
	text
}

fn collect_text<D: Dom>(dom: &D, node: &D::Node, text: &mut String) {
	match dom.kind(node) {
		NodeKind::Text => text.push_str(&dom.node_value(node).unwrap_or_default()),
		NodeKind::Comment => (),
		NodeKind::Element | NodeKind::Other => {
			for child in children(dom, node) {
				collect_text(dom, &child, text)
			}
		}
	}
}
