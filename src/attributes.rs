use crate::{dom::Dom, loggable};
use tracing::{instrument, trace};

/// Makes the attribute set of `from` equal to that of `to`.
///
/// Values are only written where they differ, so unchanged attributes cause no host mutation.
/// Namespaced attributes are compared and written by namespace and local name.
#[instrument(skip(dom))]
pub fn morph_attributes<D: Dom>(dom: &D, from: &D::Node, to: &D::Node) {
	let wanted = dom.attributes(to);
	for attribute in &wanted {
		let namespace = attribute.namespace.as_deref();
		if dom.get_attribute(from, namespace, &attribute.name).as_deref() != Some(attribute.value.as_str()) {
			trace!(namespace, name = %attribute.name, value = loggable(&attribute.value), "Setting attribute.");
			dom.set_attribute(from, namespace, &attribute.name, &attribute.value)
		}
	}

	for attribute in dom.attributes(from) {
		let namespace = attribute.namespace.as_deref();
		if !wanted.iter().any(|w| w.namespace.as_deref() == namespace && w.name == attribute.name) {
			trace!(namespace, name = %attribute.name, "Removing attribute.");
			dom.remove_attribute(from, namespace, &attribute.name)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::memory::MemoryDocument;

	#[test]
	fn sets_changed_and_removes_stale() {
		let document = MemoryDocument::new();
		let from = document.parse_markup(r#"<div class="a" title="t" data-x="1"></div>"#).unwrap();
		let to = document.parse_markup(r#"<div class="b" data-x="1" hidden></div>"#).unwrap();
		document.reset_mutation_count();

		morph_attributes(&document, &from, &to);
		assert_eq!(document.outer_html(&from), r#"<div class="b" data-x="1" hidden=""></div>"#);
		assert_eq!(document.mutation_count(), 3);

		document.reset_mutation_count();
		morph_attributes(&document, &from, &to);
		assert_eq!(document.mutation_count(), 0);
	}

	#[test]
	fn namespaced_attributes_are_distinct() {
		let document = MemoryDocument::new();
		let from = document.create_element("use", Some(crate::dom::SVG_NAMESPACE)).unwrap();
		let to = document.create_element("use", Some(crate::dom::SVG_NAMESPACE)).unwrap();
		document.set_attribute(&from, None, "href", "#a");
		document.set_attribute(&to, Some("http://www.w3.org/1999/xlink"), "href", "#b");

		morph_attributes(&document, &from, &to);
		assert_eq!(document.get_attribute(&from, None, "href"), None);
		assert_eq!(
			document.get_attribute(&from, Some("http://www.w3.org/1999/xlink"), "href").as_deref(),
			Some("#b")
		);
	}
}
