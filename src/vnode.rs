//! Declarative target trees.
//!
//! [`h`] builds a [`VNode`] description in the style of a JSX factory. Descriptions are host-independent
//! and turned into real nodes by [`VNode::materialize`], usually implicitly through [`Target::Virtual`](`crate::Target::Virtual`).

use crate::dom::{Dom, SVG_NAMESPACE};
use tracing::{error, instrument};

/// Tags that are created in the SVG namespace.
pub const SVG_TAGS: &[&str] = &[
	"svg",
	"altGlyph",
	"altGlyphDef",
	"altGlyphItem",
	"animate",
	"animateColor",
	"animateMotion",
	"animateTransform",
	"circle",
	"clipPath",
	"color-profile",
	"cursor",
	"defs",
	"desc",
	"ellipse",
	"feBlend",
	"feColorMatrix",
	"feComponentTransfer",
	"feComposite",
	"feConvolveMatrix",
	"feDiffuseLighting",
	"feDisplacementMap",
	"feDistantLight",
	"feFlood",
	"feFuncA",
	"feFuncB",
	"feFuncG",
	"feFuncR",
	"feGaussianBlur",
	"feImage",
	"feMerge",
	"feMergeNode",
	"feMorphology",
	"feOffset",
	"fePointLight",
	"feSpecularLighting",
	"feSpotLight",
	"feTile",
	"feTurbulence",
	"filter",
	"font",
	"font-face",
	"font-face-format",
	"font-face-name",
	"font-face-src",
	"font-face-uri",
	"foreignObject",
	"g",
	"glyph",
	"glyphRef",
	"hkern",
	"image",
	"line",
	"linearGradient",
	"marker",
	"mask",
	"metadata",
	"missing-glyph",
	"mpath",
	"path",
	"pattern",
	"polygon",
	"polyline",
	"radialGradient",
	"rect",
	"set",
	"stop",
	"switch",
	"symbol",
	"text",
	"textPath",
	"title",
	"tref",
	"tspan",
	"use",
	"view",
	"vkern",
];

/// A node description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VNode {
	Element(VElement),
	Text(String),
	Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VElement {
	pub name: String,
	/// [`None`] for HTML elements.
	pub namespace: Option<String>,
	/// Final attribute names and values, in insertion order.
	pub attributes: Vec<(String, String)>,
	pub children: Vec<VNode>,
}

/// An attribute value as accepted by [`h`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
	Text(String),
	/// CSS declarations. Property names are given in camel case and written in kebab case.
	Style(Vec<(String, String)>),
	/// Omits the attribute.
	Absent,
}
impl AttrValue {
	/// A [`Style`](`AttrValue::Style`) from property/value pairs.
	pub fn style<K: Into<String>, V: ToString>(declarations: impl IntoIterator<Item = (K, V)>) -> Self {
		Self::Style(
			declarations
				.into_iter()
				.map(|(property, value)| (property.into(), value.to_string()))
				.collect(),
		)
	}

	fn render(self) -> Option<String> {
		match self {
			AttrValue::Text(text) => Some(text),
			AttrValue::Style(declarations) => Some(
				declarations
					.iter()
					.map(|(property, value)| format!("{}:{}", kebab_case(property), value))
					.collect::<Vec<_>>()
					.join(";"),
			),
			AttrValue::Absent => None,
		}
	}
}
impl From<&str> for AttrValue {
	fn from(text: &str) -> Self {
		Self::Text(text.to_owned())
	}
}
impl From<String> for AttrValue {
	fn from(text: String) -> Self {
		Self::Text(text)
	}
}
impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
	fn from(value: Option<T>) -> Self {
		value.map_or(AttrValue::Absent, Into::into)
	}
}

fn kebab_case(property: &str) -> String {
	let mut kebab = String::with_capacity(property.len() + 4);
	for c in property.chars() {
		if c.is_ascii_uppercase() {
			kebab.push('-');
			kebab.push(c.to_ascii_lowercase());
		} else {
			kebab.push(c)
		}
	}
	kebab
}

/// Maps property-style attribute names to their markup names.
fn attribute_name(name: &str) -> &str {
	match name {
		"className" => "class",
		"htmlFor" => "for",
		name => name,
	}
}

/// Describes an element.
///
/// ```
/// use dom_morph::vnode::{h, AttrValue, VNode};
///
/// let vnode = h(
/// 	"label",
/// 	vec![
/// 		("className", "Caption".into()),
/// 		("htmlFor", "name".into()),
/// 		("title", AttrValue::Absent),
/// 		("style", AttrValue::style(vec![("fontSize", "12px")])),
/// 	],
/// 	vec![VNode::text("Name")],
/// );
/// match vnode {
/// 	VNode::Element(element) => assert_eq!(
/// 		element.attributes,
/// 		vec![
/// 			("class".to_owned(), "Caption".to_owned()),
/// 			("for".to_owned(), "name".to_owned()),
/// 			("style".to_owned(), "font-size:12px".to_owned()),
/// 		]
/// 	),
/// 	_ => unreachable!(),
/// }
/// ```
pub fn h<'a>(name: &str, attributes: impl IntoIterator<Item = (&'a str, AttrValue)>, children: impl IntoIterator<Item = VNode>) -> VNode {
	let namespace = if SVG_TAGS.contains(&name) { Some(SVG_NAMESPACE.to_owned()) } else { None };
	let mut rendered: Vec<(String, String)> = Vec::new();
	for (attribute, value) in attributes {
		let attribute = attribute_name(attribute);
		match value.render() {
			Some(value) => match rendered.iter_mut().find(|(existing, _)| existing == attribute) {
				Some(existing) => existing.1 = value,
				None => rendered.push((attribute.to_owned(), value)),
			},
			None => rendered.retain(|(existing, _)| existing != attribute),
		}
	}
	VNode::Element(VElement {
		name: name.to_owned(),
		namespace,
		attributes: rendered,
		children: children.into_iter().collect(),
	})
}

impl VNode {
	pub fn text(text: impl Into<String>) -> Self {
		Self::Text(text.into())
	}

	pub fn comment(comment: impl Into<String>) -> Self {
		Self::Comment(comment.into())
	}

	/// Creates real nodes for this description through `dom`.
	#[instrument(skip(self, dom))]
	pub fn materialize<D: Dom>(&self, dom: &D) -> Option<D::Node> {
		match self {
			VNode::Text(text) => Some(dom.create_text_node(text)),
			VNode::Comment(comment) => Some(dom.create_comment(comment)),
			VNode::Element(element) => {
				let node = match dom.create_element(&element.name, element.namespace.as_deref()) {
					Some(node) => node,
					None => {
						error!(name = %element.name, "Failed to create element.");
						return None;
					}
				};
				for (attribute, value) in &element.attributes {
					dom.set_attribute(&node, None, attribute, value)
				}
				for child in &element.children {
					let child = child.materialize(dom)?;
					dom.append_child(&node, &child)
				}
				Some(node)
			}
		}
	}
}

/// A missing child still takes up its place, as an empty text node, so siblings keep their positions across renders.
impl From<Option<VNode>> for VNode {
	fn from(vnode: Option<VNode>) -> Self {
		vnode.unwrap_or_else(|| VNode::text(""))
	}
}
impl From<&str> for VNode {
	fn from(text: &str) -> Self {
		Self::text(text)
	}
}
impl From<String> for VNode {
	fn from(text: String) -> Self {
		Self::Text(text)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::memory::MemoryDocument;

	#[test]
	fn svg_tags_get_the_svg_namespace() {
		let document = MemoryDocument::new();
		let svg = h("svg", vec![("viewBox", "0 0 1 1".into())], vec![h("circle", vec![], vec![])])
			.materialize(&document)
			.unwrap();
		assert_eq!(document.namespace_uri(&svg).as_deref(), Some(SVG_NAMESPACE));
		assert_eq!(document.node_name(&svg), "svg");
		let circle = document.first_child(&svg).unwrap();
		assert_eq!(document.namespace_uri(&circle).as_deref(), Some(SVG_NAMESPACE));
	}

	#[test]
	fn style_properties_are_kebab_cased() {
		assert_eq!(kebab_case("backgroundColor"), "background-color");
		assert_eq!(kebab_case("zIndex"), "z-index");
		assert_eq!(
			AttrValue::style(vec![("position", "absolute"), ("marginLeft", "0.25em")]).render().as_deref(),
			Some("position:absolute;margin-left:0.25em")
		);
	}

	#[test]
	fn absent_values_omit_the_attribute() {
		let document = MemoryDocument::new();
		let div = h(
			"div",
			vec![("title", Some("shown").into()), ("lang", AttrValue::from(None::<&str>)), ("className", "a".into())],
			vec![VNode::from(None::<VNode>), "text".into()],
		)
		.materialize(&document)
		.unwrap();
		assert_eq!(document.outer_html(&div), r#"<div class="a" title="shown">text</div>"#);
		assert_eq!(document.child_nodes(&div).len(), 2);
	}
}
