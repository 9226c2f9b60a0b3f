//! Live state of form controls that attributes don't capture.
//!
//! After an element's attributes and children are updated, the morpher looks up a handler by the element's
//! [`ElementKind`] in a [`SpecialElements`] table and runs it with the live and target element.

use crate::dom::{BoolProperty, Dom};
use core::fmt::{self, Debug, Formatter};
use tracing::trace;

/// Element kinds that can carry a special handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
	Option,
	Input,
	Select,
	TextArea,
}
impl ElementKind {
	pub const ALL: [ElementKind; 4] = [ElementKind::Option, ElementKind::Input, ElementKind::Select, ElementKind::TextArea];

	/// Classifies an element by (ASCII case-insensitive) tag name.
	#[must_use]
	pub fn of(node_name: &str) -> Option<Self> {
		Self::ALL.iter().copied().find(|kind| kind.tag_name().eq_ignore_ascii_case(node_name))
	}

	#[must_use]
	pub fn tag_name(self) -> &'static str {
		match self {
			ElementKind::Option => "option",
			ElementKind::Input => "input",
			ElementKind::Select => "select",
			ElementKind::TextArea => "textarea",
		}
	}

	fn index(self) -> usize {
		self as usize
	}
}

/// Receives the live element first and the target element second.
pub type SpecialHandler<D> = fn(&D, &<D as Dom>::Node, &<D as Dom>::Node);

/// A handler table indexed by [`ElementKind`].
pub struct SpecialElements<D: Dom> {
	handlers: [Option<SpecialHandler<D>>; 4],
}
impl<D: Dom> SpecialElements<D> {
	/// A table without any handlers.
	#[must_use]
	pub fn empty() -> Self {
		Self { handlers: [None; 4] }
	}

	/// Installs `handler` for `kind`, returning the one it replaces.
	pub fn register(&mut self, kind: ElementKind, handler: SpecialHandler<D>) -> Option<SpecialHandler<D>> {
		self.handlers[kind.index()].replace(handler)
	}

	pub fn unregister(&mut self, kind: ElementKind) -> Option<SpecialHandler<D>> {
		self.handlers[kind.index()].take()
	}

	#[must_use]
	pub fn get(&self, kind: ElementKind) -> Option<SpecialHandler<D>> {
		self.handlers[kind.index()]
	}

	pub(crate) fn apply(&self, dom: &D, from: &D::Node, to: &D::Node) {
		if let Some(kind) = ElementKind::of(&dom.node_name(from)) {
			if let Some(handler) = self.get(kind) {
				trace!("Syncing {:?} state.", kind);
				handler(dom, from, to)
			}
		}
	}
}
impl<D: Dom> Default for SpecialElements<D> {
	/// Handlers for [`ElementKind::Option`], [`ElementKind::Input`] and [`ElementKind::TextArea`].
	fn default() -> Self {
		let mut special_elements = Self::empty();
		special_elements.register(ElementKind::Option, sync_option);
		special_elements.register(ElementKind::Input, sync_input);
		special_elements.register(ElementKind::TextArea, sync_text_area);
		special_elements
	}
}
impl<D: Dom> Clone for SpecialElements<D> {
	fn clone(&self) -> Self {
		Self { handlers: self.handlers }
	}
}
impl<D: Dom> Debug for SpecialElements<D> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_set()
			.entries(ElementKind::ALL.iter().filter(|kind| self.get(**kind).is_some()))
			.finish()
	}
}

/// Copies a boolean live property and mirrors it into the attribute, since some hosts only honor one or the other.
pub fn sync_bool_property<D: Dom>(dom: &D, from: &D::Node, to: &D::Node, property: BoolProperty) {
	let wanted = dom.bool_property(to, property);
	if dom.bool_property(from, property) != wanted {
		dom.set_bool_property(from, property, wanted);
		if wanted {
			dom.set_attribute(from, None, property.attribute_name(), "")
		} else {
			dom.remove_attribute(from, None, property.attribute_name())
		}
	}
}

pub fn sync_option<D: Dom>(dom: &D, from: &D::Node, to: &D::Node) {
	sync_bool_property(dom, from, to, BoolProperty::Selected)
}

/// The ***value*** attribute of an input only sets its initial value, so the live property is written directly.
pub fn sync_input<D: Dom>(dom: &D, from: &D::Node, to: &D::Node) {
	sync_bool_property(dom, from, to, BoolProperty::Checked);
	sync_bool_property(dom, from, to, BoolProperty::Disabled);

	let value = dom.value(to).unwrap_or_default();
	if dom.value(from).as_deref() != Some(value.as_str()) {
		dom.set_value(from, &value)
	}

	if !dom.has_attribute(to, None, "value") && dom.has_attribute(from, None, "value") {
		dom.remove_attribute(from, None, "value")
	}
}

pub fn sync_text_area<D: Dom>(dom: &D, from: &D::Node, to: &D::Node) {
	let value = dom.value(to).unwrap_or_default();
	if dom.value(from).as_deref() != Some(value.as_str()) {
		dom.set_value(from, &value)
	}

	if let Some(first_child) = dom.first_child(from) {
		if dom.node_value(&first_child).map_or(false, |text| text != value) {
			dom.set_node_value(&first_child, &value)
		}
	}
}
