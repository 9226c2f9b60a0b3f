//! Lenient loading of HTML fragments into a [`Dom`].
//!
//! This is used by hosts without a native parser. It understands enough HTML for templates:
//! elements with quoted or unquoted attributes, void and raw-text elements, comments, SVG namespacing
//! and basic character references. It does not implement the HTML5 insertion modes, so optional end tags
//! aren't inferred: Unmatched end tags are ignored and unclosed elements are closed at the end of input.

use crate::dom::{Dom, SVG_NAMESPACE};
use std::borrow::Cow;
use tracing::{error, instrument, trace};

const VOID_ELEMENTS: &[&str] = &[
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

/// Elements whose content is read verbatim up to the matching end tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Raw-text elements whose content still has character references resolved.
const ESCAPABLE_RAW_TEXT_ELEMENTS: &[&str] = &["textarea", "title"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
	StartTag {
		name: String,
		attributes: Vec<(String, String)>,
		self_closing: bool,
	},
	EndTag {
		name: String,
	},
	Text(String),
	Comment(String),
	Doctype,
}

struct Tokenizer<'a> {
	input: &'a str,
	position: usize,
	/// Set after a raw-text start tag, with the lower-case element name.
	raw_text: Option<String>,
}

impl<'a> Tokenizer<'a> {
	fn new(input: &'a str) -> Self {
		Self {
			input,
			position: 0,
			raw_text: None,
		}
	}

	fn rest(&self) -> &'a str {
		&self.input[self.position..]
	}

	fn raw_text_token(&mut self, element: &str) -> Option<Token> {
		let rest = self.rest();
		let end = rest.to_ascii_lowercase().find(&format!("</{}", element)).unwrap_or(rest.len());
		self.position += end;
		if end == 0 {
			return None;
		}
		let text = &rest[..end];
		Some(Token::Text(if ESCAPABLE_RAW_TEXT_ELEMENTS.contains(&element) {
			decode_character_references(text).into_owned()
		} else {
			text.to_owned()
		}))
	}

	fn comment(&mut self) -> Token {
		let body = &self.rest()[4..];
		match body.find("-->") {
			Some(end) => {
				self.position += 4 + end + 3;
				Token::Comment(body[..end].to_owned())
			}
			None => {
				self.position = self.input.len();
				Token::Comment(body.to_owned())
			}
		}
	}

	/// Doctypes, processing instructions and CDATA are dropped.
	fn bogus(&mut self) -> Token {
		match self.rest().find('>') {
			Some(end) => self.position += end + 1,
			None => self.position = self.input.len(),
		}
		Token::Doctype
	}

	fn end_tag(&mut self) -> Token {
		let bytes = self.input.as_bytes();
		let start = self.position + 2;
		let mut i = start;
		while i < bytes.len() && !is_tag_name_delimiter(bytes[i]) {
			i += 1;
		}
		let name = self.input[start..i].to_ascii_lowercase();
		while i < bytes.len() && bytes[i] != b'>' {
			i += 1;
		}
		self.position = (i + 1).min(bytes.len());
		Token::EndTag { name }
	}

	fn start_tag(&mut self) -> Token {
		let input = self.input;
		let bytes = input.as_bytes();
		let len = bytes.len();
		let mut i = self.position + 1;

		let name_start = i;
		while i < len && !is_tag_name_delimiter(bytes[i]) {
			i += 1;
		}
		let name = input[name_start..i].to_owned();

		let mut attributes: Vec<(String, String)> = Vec::new();
		let mut self_closing = false;
		loop {
			while i < len && bytes[i].is_ascii_whitespace() {
				i += 1;
			}
			if i >= len {
				break;
			}
			match bytes[i] {
				b'>' => {
					i += 1;
					break;
				}
				b'/' => {
					i += 1;
					if i < len && bytes[i] == b'>' {
						self_closing = true;
						i += 1;
						break;
					}
					continue;
				}
				_ => (),
			}

			let attribute_start = i;
			while i < len && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'/' | b'>' | b'=') {
				i += 1;
			}
			if i == attribute_start {
				// A stray '='.
				i += 1;
			}
			let attribute_name = input[attribute_start..i].to_ascii_lowercase();

			while i < len && bytes[i].is_ascii_whitespace() {
				i += 1;
			}
			let mut value = String::new();
			if i < len && bytes[i] == b'=' {
				i += 1;
				while i < len && bytes[i].is_ascii_whitespace() {
					i += 1;
				}
				if i < len && matches!(bytes[i], b'"' | b'\'') {
					let quote = bytes[i];
					i += 1;
					let value_start = i;
					while i < len && bytes[i] != quote {
						i += 1;
					}
					value = decode_character_references(&input[value_start..i]).into_owned();
					if i < len {
						i += 1;
					}
				} else {
					let value_start = i;
					while i < len && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
						i += 1;
					}
					value = decode_character_references(&input[value_start..i]).into_owned();
				}
			}

			if attributes.iter().any(|(existing, _)| existing == &attribute_name) {
				trace!("Ignoring duplicate attribute.");
			} else {
				attributes.push((attribute_name, value));
			}
		}
		self.position = i;

		let lower_case = name.to_ascii_lowercase();
		if !self_closing && RAW_TEXT_ELEMENTS.contains(&lower_case.as_str()) {
			self.raw_text = Some(lower_case);
		}
		Token::StartTag {
			name,
			attributes,
			self_closing,
		}
	}

	fn text(&mut self) -> Token {
		let rest = self.rest();
		// A '<' that didn't open markup is text, so always consume at least one character.
		let first_len = rest.chars().next().map_or(0, char::len_utf8);
		let end = rest[first_len..].find('<').map_or(rest.len(), |end| end + first_len);
		self.position += end;
		Token::Text(decode_character_references(&rest[..end]).into_owned())
	}
}

impl<'a> Iterator for Tokenizer<'a> {
	type Item = Token;

	fn next(&mut self) -> Option<Self::Item> {
		if let Some(element) = self.raw_text.take() {
			if let Some(text) = self.raw_text_token(&element) {
				return Some(text);
			}
		}

		let rest = self.rest();
		let mut chars = rest.chars();
		Some(match (chars.next()?, chars.next()) {
			('<', Some('!')) if rest.starts_with("<!--") => self.comment(),
			('<', Some('!')) | ('<', Some('?')) => self.bogus(),
			('<', Some('/')) if rest[2..].starts_with(|c: char| c.is_ascii_alphabetic()) => self.end_tag(),
			('<', Some(c)) if c.is_ascii_alphabetic() => self.start_tag(),
			_ => self.text(),
		})
	}
}

fn is_tag_name_delimiter(byte: u8) -> bool {
	byte.is_ascii_whitespace() || byte == b'/' || byte == b'>'
}

/// Resolves `&amp;`, `&lt;`, `&gt;`, `&quot;`, `&apos;`, `&nbsp;` and numeric character references.
/// Anything else is left as-is.
#[must_use]
pub fn decode_character_references(text: &str) -> Cow<'_, str> {
	if !text.contains('&') {
		return Cow::Borrowed(text);
	}

	let mut decoded = String::with_capacity(text.len());
	let mut rest = text;
	while let Some(ampersand) = rest.find('&') {
		decoded.push_str(&rest[..ampersand]);
		rest = &rest[ampersand..];
		let resolved = rest[1..]
			.find(';')
			.filter(|&length| length <= 8)
			.and_then(|length| resolve_character_reference(&rest[1..=length]).map(|c| (c, length)));
		match resolved {
			Some((c, length)) => {
				decoded.push(c);
				rest = &rest[length + 2..];
			}
			None => {
				decoded.push('&');
				rest = &rest[1..];
			}
		}
	}
	decoded.push_str(rest);
	Cow::Owned(decoded)
}

fn resolve_character_reference(reference: &str) -> Option<char> {
	match reference {
		"amp" => Some('&'),
		"lt" => Some('<'),
		"gt" => Some('>'),
		"quot" => Some('"'),
		"apos" => Some('\''),
		"nbsp" => Some('\u{a0}'),
		_ => {
			let number = reference.strip_prefix('#')?;
			let code = match number.strip_prefix('x').or_else(|| number.strip_prefix('X')) {
				Some(hex) => u32::from_str_radix(hex, 16).ok()?,
				None => number.parse().ok()?,
			};
			core::char::from_u32(code)
		}
	}
}

struct OpenElement<N> {
	node: N,
	/// Lower-case.
	name: String,
	/// Namespace for children; [`None`] means HTML.
	child_namespace: Option<&'static str>,
}

/// Parses `markup` into detached top-level nodes, in document order.
#[instrument(skip(dom, markup))]
pub fn parse_fragment<D: Dom>(dom: &D, markup: &str) -> Vec<D::Node> {
	let mut top_level = Vec::new();
	let mut open: Vec<OpenElement<D::Node>> = Vec::new();

	for token in Tokenizer::new(markup) {
		match token {
			Token::Text(text) => attach(dom, &open, &mut top_level, dom.create_text_node(&text)),
			Token::Comment(comment) => attach(dom, &open, &mut top_level, dom.create_comment(&comment)),
			Token::Doctype => trace!("Skipping doctype or bogus comment."),
			Token::StartTag {
				name,
				attributes,
				self_closing,
			} => {
				let lower_case = name.to_ascii_lowercase();
				let namespace = if lower_case == "svg" {
					Some(SVG_NAMESPACE)
				} else {
					open.last().and_then(|parent| parent.child_namespace)
				};
				let element_name = if namespace.is_some() { name } else { lower_case.clone() };

				let element = match dom.create_element(&element_name, namespace) {
					Some(element) => element,
					None => {
						error!("Could not create element {:?}. Skipping it.", element_name);
						continue;
					}
				};
				for (attribute, value) in attributes {
					dom.set_attribute(&element, None, &attribute, &value)
				}
				attach(dom, &open, &mut top_level, element.clone());

				let is_void = namespace.is_none() && VOID_ELEMENTS.contains(&lower_case.as_str());
				if !self_closing && !is_void {
					let child_namespace = if lower_case == "foreignobject" { None } else { namespace };
					open.push(OpenElement {
						node: element,
						name: lower_case,
						child_namespace,
					})
				}
			}
			Token::EndTag { name } => match open.iter().rposition(|element| element.name == name) {
				Some(position) => open.truncate(position),
				None => trace!("Ignoring unmatched end tag."),
			},
		}
	}
	top_level
}

fn attach<D: Dom>(dom: &D, open: &[OpenElement<D::Node>], top_level: &mut Vec<D::Node>, node: D::Node) {
	match open.last() {
		Some(parent) => dom.append_child(&parent.node, &node),
		None => top_level.push(node),
	}
}
