//! A small CSS selector matcher for hosts without a native one.
//!
//! Supported are comma-separated lists of compound selectors made of a type selector (or `*`),
//! `#id`, `.class`, `[attribute]` and `[attribute=value]` (value optionally quoted). Combinators are not supported.

use crate::dom::{Dom, NodeKind};
use core::str::Chars;
use std::iter::Peekable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
	alternatives: Vec<Compound>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
	tag: Option<String>,
	id: Option<String>,
	classes: Vec<String>,
	attributes: Vec<(String, Option<String>)>,
}

impl Selector {
	/// Parses `selector`, or returns [`None`] if it's malformed or uses unsupported syntax.
	#[must_use]
	pub fn parse(selector: &str) -> Option<Self> {
		let alternatives = selector.split(',').map(|compound| Compound::parse(compound.trim())).collect::<Option<Vec<_>>>()?;
		Some(Self { alternatives })
	}

	#[must_use]
	pub fn matches<D: Dom>(&self, dom: &D, element: &D::Node) -> bool {
		dom.kind(element) == NodeKind::Element && self.alternatives.iter().any(|compound| compound.matches(dom, element))
	}
}

fn is_name_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

fn name(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
	let mut name = String::new();
	while let Some(&c) = chars.peek() {
		if !is_name_char(c) {
			break;
		}
		name.push(c);
		chars.next();
	}
	if name.is_empty() {
		None
	} else {
		Some(name)
	}
}

impl Compound {
	fn parse(compound: &str) -> Option<Self> {
		if compound.is_empty() {
			return None;
		}

		let mut parsed = Self::default();
		let mut chars = compound.chars().peekable();
		match chars.peek().copied() {
			Some('*') => {
				chars.next();
			}
			Some(c) if is_name_char(c) => parsed.tag = Some(name(&mut chars)?),
			_ => (),
		}

		while let Some(c) = chars.next() {
			match c {
				'#' => parsed.id = Some(name(&mut chars)?),
				'.' => parsed.classes.push(name(&mut chars)?),
				'[' => {
					let attribute = name(&mut chars)?.to_ascii_lowercase();
					match chars.next()? {
						']' => parsed.attributes.push((attribute, None)),
						'=' => {
							let value = match chars.peek().copied() {
								Some(quote) if quote == '"' || quote == '\'' => {
									chars.next();
									let value: String = chars.by_ref().take_while(|&c| c != quote).collect();
									if chars.next()? != ']' {
										return None;
									}
									value
								}
								_ => {
									let value = name(&mut chars)?;
									if chars.next()? != ']' {
										return None;
									}
									value
								}
							};
							parsed.attributes.push((attribute, Some(value)))
						}
						_ => return None,
					}
				}
				_ => return None,
			}
		}
		Some(parsed)
	}

	fn matches<D: Dom>(&self, dom: &D, element: &D::Node) -> bool {
		if let Some(tag) = &self.tag {
			if !dom.node_name(element).eq_ignore_ascii_case(tag) {
				return false;
			}
		}
		if let Some(id) = &self.id {
			if dom.get_attribute(element, None, "id").as_ref() != Some(id) {
				return false;
			}
		}
		if !self.classes.is_empty() {
			let class = dom.get_attribute(element, None, "class").unwrap_or_default();
			if !self.classes.iter().all(|wanted| class.split_ascii_whitespace().any(|class| class == wanted)) {
				return false;
			}
		}
		self.attributes.iter().all(|(attribute, wanted)| match (dom.get_attribute(element, None, attribute), wanted) {
			(None, _) => false,
			(Some(_), None) => true,
			(Some(value), Some(wanted)) => &value == wanted,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::memory::MemoryDocument;

	#[test]
	fn parses_compounds_and_lists() {
		assert!(Selector::parse(".Edge, .EdgeLabel").is_some());
		assert!(Selector::parse("div#main.a.b[data-x='1'][hidden]").is_some());
		assert!(Selector::parse("*").is_some());
		assert!(Selector::parse("div > p").is_none());
		assert!(Selector::parse("a,").is_none());
		assert!(Selector::parse("[x=\"1\"").is_none());
	}

	#[test]
	fn matches_elements() {
		let document = MemoryDocument::new();
		let element = document
			.parse_markup(r#"<div id="main" class="ConceptMap wide" data-config="{}"></div>"#)
			.unwrap();
		let matches = |selector: &str| Selector::parse(selector).unwrap().matches(&document, &element);

		assert!(matches("div"));
		assert!(matches("DIV.ConceptMap"));
		assert!(matches(".wide.ConceptMap"));
		assert!(matches("#main[data-config]"));
		assert!(matches("[data-config=\"{}\"]"));
		assert!(matches("span, .wide"));
		assert!(!matches(".Concept"));
		assert!(!matches("div#other"));
		assert!(!matches("[data-missing]"));

		let text = document.create_text_node("div");
		assert!(!Selector::parse("*").unwrap().matches(&document, &text));
	}
}
