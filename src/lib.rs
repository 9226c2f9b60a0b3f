#![doc(html_root_url = "https://docs.rs/dom-morph/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! An identity-preserving tree morpher.
//!
//! [`morph`] mutates a live node tree in place until it has the shape of a target tree,
//! reusing live nodes wherever it can. Elements with an identity key are matched across positions,
//! and form controls have their live state synced along with their attributes.
//!
//! All tree access goes through an explicit [`Dom`] handle. This crate ships an in-memory host ([`memory::MemoryDocument`])
//! and one backed by the browser ([`web::WebDom`]).
//!
//! On top of the morpher, [`binding`] re-renders [`View`]s bound to elements by selector whenever their data changes,
//! and [`graph`] contains a concept-map view that's driven this way, with user actions handled in [`interaction`].

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

mod attributes;
pub mod binding;
pub mod diff;
pub mod dom;
pub mod graph;
pub mod interaction;
mod key_index;
pub mod load;
pub mod memory;
pub mod options;
pub mod selector;
pub mod special;
pub mod vnode;
pub mod web;

pub use attributes::morph_attributes;
pub use binding::{BindingRegistry, Change, ChangeSource, Dataset, View};
pub use diff::morph;
pub use dom::Dom;
pub use options::{BeforeNodeAdded, MorphOptions, Target};
pub use vnode::{h, VNode};

/// Text and attribute values as they may appear in log output.
#[cfg(feature = "dangerous-logging")]
fn loggable(text: &str) -> &str {
	text
}

/// Text and attribute values as they may appear in log output.
#[cfg(not(feature = "dangerous-logging"))]
fn loggable(_text: &str) -> &str {
	"[redacted]"
}
