//! The browser [***DOM***](https://developer.mozilla.org/en-US/docs/Web/API/Document_Object_Model) as [`Dom`] host.
//!
//! Failing calls (which surface as [`JsValue`] errors) are logged and otherwise ignored.

use crate::{
	binding::{Change, Dataset, View},
	dom::{Attribute, BoolProperty, Dom, NodeKind, XHTML_NAMESPACE},
	graph::ConceptMap,
	interaction::{delegate, EventKind, UiEvent},
	vnode::VNode,
};
use core::{cell::RefCell, mem};
use std::rc::Rc;
use tracing::{error, instrument, trace, trace_span};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{
	Document, Element, Event, HtmlInputElement, HtmlOptionElement, HtmlSelectElement, HtmlTextAreaElement, KeyboardEvent, MouseEvent,
	MutationObserver, MutationObserverInit, MutationRecord, Node, NodeList,
};

/// Handle of one [***Document***](https://developer.mozilla.org/en-US/docs/Web/API/Document).
#[derive(Debug, Clone)]
pub struct WebDom {
	document: Document,
}
impl WebDom {
	#[must_use]
	pub fn new(document: Document) -> Self {
		Self { document }
	}

	/// The current window's document, if there is one.
	#[must_use]
	pub fn from_window() -> Option<Self> {
		Some(Self::new(web_sys::window()?.document()?))
	}

	#[must_use]
	pub fn document(&self) -> &Document {
		&self.document
	}
}

fn element(node: &Node) -> Option<&Element> {
	node.dyn_ref::<Element>()
}

impl Dom for WebDom {
	type Node = Node;

	fn kind(&self, node: &Node) -> NodeKind {
		match node.node_type() {
			Node::ELEMENT_NODE => NodeKind::Element,
			Node::TEXT_NODE => NodeKind::Text,
			Node::COMMENT_NODE => NodeKind::Comment,
			_ => NodeKind::Other,
		}
	}

	fn node_name(&self, node: &Node) -> String {
		node.node_name()
	}

	fn namespace_uri(&self, node: &Node) -> Option<String> {
		element(node)?.namespace_uri()
	}

	fn node_value(&self, node: &Node) -> Option<String> {
		node.node_value()
	}

	fn set_node_value(&self, node: &Node, value: &str) {
		node.set_node_value(Some(value))
	}

	fn parent_node(&self, node: &Node) -> Option<Node> {
		node.parent_node()
	}

	fn first_child(&self, node: &Node) -> Option<Node> {
		node.first_child()
	}

	fn next_sibling(&self, node: &Node) -> Option<Node> {
		node.next_sibling()
	}

	fn attributes(&self, element_node: &Node) -> Vec<Attribute> {
		let element = match element(element_node) {
			Some(element) => element,
			None => return Vec::new(),
		};
		let attributes = element.attributes();
		(0..attributes.length())
			.filter_map(|i| attributes.item(i))
			.map(|attribute| {
				let namespace = attribute.namespace_uri();
				Attribute {
					name: if namespace.is_some() { attribute.local_name() } else { attribute.name() },
					namespace,
					value: attribute.value(),
				}
			})
			.collect()
	}

	fn get_attribute(&self, element_node: &Node, namespace: Option<&str>, name: &str) -> Option<String> {
		let element = element(element_node)?;
		match namespace {
			None => element.get_attribute(name),
			Some(namespace) => element.get_attribute_ns(Some(namespace), name),
		}
	}

	fn set_attribute(&self, element_node: &Node, namespace: Option<&str>, name: &str, value: &str) {
		let element = match element(element_node) {
			Some(element) => element,
			None => return error!("Can't set attribute {:?} on a non-element.", name),
		};
		let result = match namespace {
			None => element.set_attribute(name, value),
			Some(namespace) => element.set_attribute_ns(Some(namespace), name, value),
		};
		if let Err(error) = result {
			error!("Failed to set attribute {:?}: {:?}", name, error)
		}
	}

	fn remove_attribute(&self, element_node: &Node, namespace: Option<&str>, name: &str) {
		if let Some(element) = element(element_node) {
			let result = match namespace {
				None => element.remove_attribute(name),
				Some(namespace) => element.remove_attribute_ns(Some(namespace), name),
			};
			if let Err(error) = result {
				error!("Failed to remove attribute {:?}: {:?}", name, error)
			}
		}
	}

	fn insert_before(&self, parent: &Node, child: &Node, reference: Option<&Node>) {
		if let Err(error) = parent.insert_before(child, reference) {
			error!("Failed to insert node: {:?}", error)
		}
	}

	fn remove_child(&self, parent: &Node, child: &Node) {
		if let Err(error) = parent.remove_child(child) {
			error!("Failed to remove node: {:?}", error)
		}
	}

	fn replace_child(&self, parent: &Node, new_child: &Node, old_child: &Node) {
		if let Err(error) = parent.replace_child(new_child, old_child) {
			error!("Failed to replace node: {:?}", error)
		}
	}

	fn create_element(&self, name: &str, namespace: Option<&str>) -> Option<Node> {
		let result = match namespace {
			None | Some(XHTML_NAMESPACE) => self.document.create_element(name),
			Some(namespace) => self.document.create_element_ns(Some(namespace), name),
		};
		match result {
			Ok(element) => Some(element.into()),
			Err(error) => {
				error!("Failed to create element {:?}: {:?}", name, error);
				None
			}
		}
	}

	fn create_text_node(&self, data: &str) -> Node {
		self.document.create_text_node(data).into()
	}

	fn create_comment(&self, data: &str) -> Node {
		self.document.create_comment(data).into()
	}

	#[instrument(skip(self, markup))]
	fn parse_markup(&self, markup: &str) -> Option<Node> {
		let fragment = match self.document.create_range().and_then(|range| range.create_contextual_fragment(markup)) {
			Ok(fragment) => fragment,
			Err(error) => {
				error!("Failed to parse markup: {:?}", error);
				return None;
			}
		};
		fragment.first_child()
	}

	fn bool_property(&self, element_node: &Node, property: BoolProperty) -> bool {
		match property {
			BoolProperty::Checked => {
				if let Some(input) = element_node.dyn_ref::<HtmlInputElement>() {
					return input.checked();
				}
			}
			BoolProperty::Selected => {
				if let Some(option) = element_node.dyn_ref::<HtmlOptionElement>() {
					return option.selected();
				}
			}
			BoolProperty::Disabled => {
				if let Some(input) = element_node.dyn_ref::<HtmlInputElement>() {
					return input.disabled();
				}
				if let Some(option) = element_node.dyn_ref::<HtmlOptionElement>() {
					return option.disabled();
				}
				if let Some(text_area) = element_node.dyn_ref::<HtmlTextAreaElement>() {
					return text_area.disabled();
				}
			}
		}
		self.has_attribute(element_node, None, property.attribute_name())
	}

	fn set_bool_property(&self, element_node: &Node, property: BoolProperty, value: bool) {
		match property {
			BoolProperty::Checked => {
				if let Some(input) = element_node.dyn_ref::<HtmlInputElement>() {
					return input.set_checked(value);
				}
			}
			BoolProperty::Selected => {
				if let Some(option) = element_node.dyn_ref::<HtmlOptionElement>() {
					return option.set_selected(value);
				}
			}
			BoolProperty::Disabled => {
				if let Some(input) = element_node.dyn_ref::<HtmlInputElement>() {
					return input.set_disabled(value);
				}
				if let Some(option) = element_node.dyn_ref::<HtmlOptionElement>() {
					return option.set_disabled(value);
				}
				if let Some(text_area) = element_node.dyn_ref::<HtmlTextAreaElement>() {
					return text_area.set_disabled(value);
				}
			}
		}
		trace!("No live {:?} property. Writing the attribute instead.", property);
		if value {
			self.set_attribute(element_node, None, property.attribute_name(), "")
		} else {
			self.remove_attribute(element_node, None, property.attribute_name())
		}
	}

	fn value(&self, element_node: &Node) -> Option<String> {
		if let Some(input) = element_node.dyn_ref::<HtmlInputElement>() {
			Some(input.value())
		} else if let Some(text_area) = element_node.dyn_ref::<HtmlTextAreaElement>() {
			Some(text_area.value())
		} else if let Some(option) = element_node.dyn_ref::<HtmlOptionElement>() {
			Some(option.value())
		} else {
			element_node.dyn_ref::<HtmlSelectElement>().map(HtmlSelectElement::value)
		}
	}

	fn set_value(&self, element_node: &Node, value: &str) {
		if let Some(input) = element_node.dyn_ref::<HtmlInputElement>() {
			input.set_value(value)
		} else if let Some(text_area) = element_node.dyn_ref::<HtmlTextAreaElement>() {
			text_area.set_value(value)
		} else if let Some(option) = element_node.dyn_ref::<HtmlOptionElement>() {
			option.set_value(value)
		} else if let Some(select) = element_node.dyn_ref::<HtmlSelectElement>() {
			select.set_value(value)
		} else {
			error!("Can't set the value of {:?}, which is not a form control.", element_node.node_name())
		}
	}

	fn matches(&self, element_node: &Node, selector: &str) -> bool {
		match element(element_node).map(|element| element.matches(selector)) {
			Some(Ok(matches)) => matches,
			Some(Err(error)) => {
				error!("Invalid selector {:?}: {:?}", selector, error);
				false
			}
			None => false,
		}
	}
}

/// Collects the mutations below a root as [`Change`] records, for a [`ChangeSource`](`crate::ChangeSource`).
///
/// Observation stops when the instance is dropped.
pub struct Observer {
	observer: MutationObserver,
	pending: Rc<RefCell<Vec<Change<Node>>>>,
	_callback: Closure<dyn FnMut(js_sys::Array, JsValue)>,
}
impl Observer {
	/// Observes attributes and child lists of `root` and all its descendants.
	#[instrument]
	pub fn new(root: &Node) -> Result<Self, JsValue> {
		let pending = Rc::new(RefCell::new(Vec::new()));
		let callback = {
			let pending = Rc::clone(&pending);
			Closure::wrap(Box::new(move |records: js_sys::Array, _observer: JsValue| {
				pending.borrow_mut().extend(convert_records(&records))
			}) as Box<dyn FnMut(js_sys::Array, JsValue)>)
		};
		let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
		let mut options = MutationObserverInit::new();
		options.attributes(true).child_list(true).subtree(true);
		observer.observe_with_options(root, &options)?;
		Ok(Self {
			observer,
			pending,
			_callback: callback,
		})
	}

	/// Drains all records, including those not yet delivered to the observer callback.
	pub fn take_records(&self) -> Vec<Change<Node>> {
		let mut changes = mem::take(&mut *self.pending.borrow_mut());
		changes.extend(convert_records(&self.observer.take_records()));
		changes
	}
}
impl Drop for Observer {
	fn drop(&mut self) {
		self.observer.disconnect()
	}
}

/// A [`ConceptMap`] that handles its own pointer and keyboard events.
///
/// Binding an element attaches delegated listeners to it, which apply each recognized event through
/// [`ConceptMap::interact`]. The resulting `data-*` changes reach the registry through an [`Observer`] like any other.
///
/// Listeners are removed when the instance is dropped.
#[derive(Default)]
pub struct InteractiveConceptMap {
	listeners: RefCell<Vec<Listener>>,
}
struct Listener {
	element: Element,
	kind: EventKind,
	callback: Closure<dyn Fn(Event)>,
}
impl InteractiveConceptMap {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}
}
impl View<WebDom> for InteractiveConceptMap {
	fn render(&self, dataset: &Dataset) -> Option<VNode> {
		View::<WebDom>::render(&ConceptMap, dataset)
	}

	#[instrument(skip(self, dom))]
	fn init(&self, dom: &WebDom, element: &Node) {
		View::<WebDom>::init(&ConceptMap, dom, element);

		let target = match element.dyn_ref::<Element>() {
			Some(target) => target,
			None => return error!("Concept maps can only be bound to elements."),
		};
		for &kind in &EventKind::ALL {
			let callback = {
				let dom = dom.clone();
				let map = element.clone();
				Closure::wrap(Box::new(move |event: Event| handle_event(&dom, &map, kind, &event)) as Box<dyn Fn(Event)>)
			};
			if let Err(error) = target.add_event_listener_with_callback(kind.name(), callback.as_ref().unchecked_ref()) {
				error!("Failed to add event listener {:?}: {:?}", kind.name(), error);
				continue;
			}
			self.listeners.borrow_mut().push(Listener {
				element: target.clone(),
				kind,
				callback,
			})
		}
	}
}
impl Drop for InteractiveConceptMap {
	fn drop(&mut self) {
		for listener in self.listeners.get_mut().drain(..) {
			if let Err(error) = listener
				.element
				.remove_event_listener_with_callback(listener.kind.name(), listener.callback.as_ref().unchecked_ref())
			{
				error!("Failed to remove event listener {:?}: {:?}", listener.kind.name(), error)
			}
		}
	}
}

fn handle_event(dom: &WebDom, map: &Node, kind: EventKind, event: &Event) {
	let span = trace_span!("Concept map event", ?kind);
	let _enter = span.enter();

	if kind == EventKind::DragOver {
		// Allows dropping.
		event.prevent_default()
	}
	let target = match event.target().and_then(|target| target.dyn_into::<Node>().ok()) {
		Some(target) => target,
		None => return trace!("Event without a node target."),
	};
	let (client_x, client_y) = event
		.dyn_ref::<MouseEvent>()
		.map_or((0., 0.), |event| (f64::from(event.client_x()), f64::from(event.client_y())));
	let target_height = target.dyn_ref::<Element>().map_or(0., |element| f64::from(element.client_height()));
	let key = event.dyn_ref::<KeyboardEvent>().map(KeyboardEvent::key);

	let mut ui_event = UiEvent::new(kind, &target).at(client_x, client_y).with_height(target_height);
	if let Some(key) = &key {
		ui_event = ui_event.with_key(key)
	}
	match delegate(dom, map, &ui_event) {
		Some(interaction) => {
			ConceptMap::interact(dom, map, &interaction);
		}
		None => trace!("Event has no meaning here."),
	}
}

fn convert_records(records: &js_sys::Array) -> Vec<Change<Node>> {
	records
		.iter()
		.filter_map(|record| record.dyn_into::<MutationRecord>().ok())
		.filter_map(|record| {
			let target = record.target()?;
			match record.type_().as_str() {
				"attributes" => Some(Change::Attributes {
					target,
					name: record.attribute_name()?,
				}),
				"childList" => Some(Change::ChildList {
					target,
					added: nodes(&record.added_nodes()),
					removed: nodes(&record.removed_nodes()),
				}),
				_ => None,
			}
		})
		.collect()
}

fn nodes(list: &NodeList) -> Vec<Node> {
	(0..list.length()).filter_map(|i| list.get(i)).collect()
}
