//! The concept-map graph and its view.
//!
//! A [`Graph`] is stored as JSON in the `data-config` attribute of a bound element. Every edit replaces
//! the whole blob, and the [`ConceptMap`] view re-renders the element from it together with the UI state
//! that lives in the same element's other `data-*` attributes.
//!
//! User actions change both through [`ConceptMap::interact`].

use crate::{
	binding::{dataset, remove_data, Dataset, View},
	dom::Dom,
	vnode::{h, AttrValue, VNode},
};
use core::fmt::{self, Display, Formatter};
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace, warn};

/// A vertex identifier. Either a JSON number or a string.
///
/// Identifiers compare loosely: a number equals a string that parses to the same number,
/// since ids travel through `data-*` attributes as text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VertexId {
	Number(f64),
	Text(String),
}
impl VertexId {
	pub(crate) fn as_number(&self) -> Option<f64> {
		match self {
			VertexId::Number(number) => Some(*number),
			VertexId::Text(text) => text.trim().parse().ok(),
		}
	}
}
impl PartialEq for VertexId {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(VertexId::Text(a), VertexId::Text(b)) => a == b,
			_ => match (self.as_number(), other.as_number()) {
				(Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
				_ => false,
			},
		}
	}
}
impl PartialEq<str> for VertexId {
	fn eq(&self, other: &str) -> bool {
		*self == VertexId::Text(other.to_owned())
	}
}
impl Display for VertexId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			VertexId::Number(number) => write!(f, "{}", number),
			VertexId::Text(text) => f.write_str(text),
		}
	}
}
impl From<&str> for VertexId {
	fn from(text: &str) -> Self {
		Self::Text(text.to_owned())
	}
}
impl From<f64> for VertexId {
	fn from(number: f64) -> Self {
		Self::Number(number)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
	pub id: VertexId,
	#[serde(default)]
	pub label: String,
	pub left: f64,
	pub top: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
	pub from: VertexId,
	pub to: VertexId,
	#[serde(default)]
	pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
	#[serde(default)]
	pub vertices: Vec<Vertex>,
	#[serde(default)]
	pub edges: Vec<Edge>,
}

impl Graph {
	pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(json)
	}

	pub fn to_json(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string(self)
	}

	#[must_use]
	pub fn vertex(&self, id: &VertexId) -> Option<&Vertex> {
		self.vertices.iter().find(|vertex| &vertex.id == id)
	}

	fn vertex_mut(&mut self, id: &VertexId) -> Option<&mut Vertex> {
		self.vertices.iter_mut().find(|vertex| &vertex.id == id)
	}

	/// A numeric id above every id in use that reads as a number.
	#[must_use]
	pub fn next_vertex_id(&self) -> VertexId {
		let highest = self.vertices.iter().filter_map(|vertex| vertex.id.as_number()).fold(0., f64::max);
		VertexId::Number(highest.floor() + 1.)
	}

	/// Adds an unlabeled vertex.
	pub fn add_vertex(&mut self, id: VertexId, left: f64, top: f64) {
		self.vertices.push(Vertex {
			id,
			label: String::new(),
			left,
			top,
		})
	}

	/// Whether `a` and `b` are connected, in either direction.
	#[must_use]
	pub fn edge_exists(&self, a: &VertexId, b: &VertexId) -> bool {
		self.edges.iter().any(|edge| (&edge.from == a && &edge.to == b) || (&edge.from == b && &edge.to == a))
	}

	/// Connects `from` and `to` with an unlabeled edge, unless that would be a loop or a duplicate.
	pub fn add_edge(&mut self, from: VertexId, to: VertexId) -> bool {
		if from == to || self.edge_exists(&from, &to) {
			return false;
		}
		self.edges.push(Edge {
			from,
			to,
			label: String::new(),
		});
		true
	}

	pub fn set_vertex_label(&mut self, id: &VertexId, label: impl Into<String>) -> bool {
		self.vertex_mut(id).map(|vertex| vertex.label = label.into()).is_some()
	}

	pub fn set_edge_label(&mut self, index: usize, label: impl Into<String>) -> bool {
		self.edges.get_mut(index).map(|edge| edge.label = label.into()).is_some()
	}

	pub fn move_vertex(&mut self, id: &VertexId, left: f64, top: f64) -> bool {
		self.vertex_mut(id)
			.map(|vertex| {
				vertex.left = left;
				vertex.top = top;
			})
			.is_some()
	}

	/// Removes a vertex together with all edges touching it.
	pub fn remove_vertex(&mut self, id: &VertexId) -> Option<Vertex> {
		let index = self.vertices.iter().position(|vertex| &vertex.id == id)?;
		self.edges.retain(|edge| &edge.from != id && &edge.to != id);
		Some(self.vertices.remove(index))
	}

	pub fn remove_edge(&mut self, index: usize) -> Option<Edge> {
		if index < self.edges.len() {
			Some(self.edges.remove(index))
		} else {
			None
		}
	}
}

const VERTEX_BORDER: &str = "1px solid #999";
const SELECTED_VERTEX_BORDER: &str = "2px solid blue";
const EDGE_BORDER_DRAGGING: &str = "1px dashed #666";
const EDGE_CONNECTOR_BACKGROUND: &str = "blue";
const EDGE_LABEL_BACKGROUND: &str = "rgba(255, 255, 255, 0.8)";
const VERTEX_BACKGROUND: &str = "white";
const VERTEX_BORDER_RADIUS: &str = "5px";

fn symbol_style(extra: &[(&'static str, &'static str)]) -> AttrValue {
	let mut style = vec![
		("backgroundColor", "#fff"),
		("border", "1px solid #999"),
		("borderRadius", "50%"),
		("color", "#333"),
		("cursor", "pointer"),
		("display", "inline-block"),
		("width", "1em"),
		("lineHeight", "1em"),
		("fontSize", "130%"),
		("marginLeft", "0.25em"),
		("padding", "2px"),
		("textAlign", "center"),
	];
	for &(property, value) in extra {
		match style.iter_mut().find(|(existing, _)| *existing == property) {
			Some(existing) => existing.1 = value,
			None => style.push((property, value)),
		}
	}
	AttrValue::style(style)
}

fn modal_overlay() -> VNode {
	h(
		"div",
		vec![
			("className", "ModalOverlay".into()),
			(
				"style",
				AttrValue::style(vec![
					("backgroundColor", "#fff"),
					("opacity", "0.8"),
					("position", "fixed"),
					("left", "0"),
					("top", "0"),
					("right", "0"),
					("bottom", "0"),
					("zIndex", "100"),
				]),
			),
		],
		vec![],
	)
}

pub(crate) const CONFIG: &str = "config";
pub(crate) const SELECTED_VERTEX: &str = "selectedVertexId";
pub(crate) const EDITED_VERTEX: &str = "editedVertexId";
pub(crate) const DRAGGED_VERTEX: &str = "draggedVertexId";
pub(crate) const DROP_VERTEX: &str = "dropVertexId";
pub(crate) const CONNECTOR_FROM: &str = "vertexConnectorFrom";
pub(crate) const SELECTED_EDGE: &str = "selectedEdgeIndex";
pub(crate) const EDITED_EDGE: &str = "editedEdgeIndex";

/// UI state that only exists while a drag is in progress.
const DRAG_STATE: [&str; 3] = [DRAGGED_VERTEX, DROP_VERTEX, CONNECTOR_FROM];

/// Renders a graph stored in the `config` dataset entry.
///
/// Recognized UI state: `selectedVertexId`, `editedVertexId`, `draggedVertexId`, `dropVertexId`,
/// `vertexConnectorFrom`, `selectedEdgeIndex` and `editedEdgeIndex`.
///
/// Binding drops any drag state the element carries, as no drag can be in progress on a map that was just bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConceptMap;

struct UiState<'a> {
	selected_vertex: Option<&'a str>,
	edited_vertex: Option<&'a str>,
	dragged_vertex: Option<&'a str>,
	drop_vertex: Option<&'a str>,
	connector_from: Option<&'a str>,
	selected_edge: Option<usize>,
	edited_edge: Option<usize>,
}
impl<'a> UiState<'a> {
	fn new(dataset: &'a Dataset) -> Self {
		let index = |key: &str| -> Option<usize> { dataset.get(key).and_then(|index| index.trim().parse().ok()) };
		Self {
			selected_vertex: dataset.get(SELECTED_VERTEX),
			edited_vertex: dataset.get(EDITED_VERTEX),
			dragged_vertex: dataset.get(DRAGGED_VERTEX),
			drop_vertex: dataset.get(DROP_VERTEX),
			connector_from: dataset.get(CONNECTOR_FROM),
			selected_edge: index(SELECTED_EDGE),
			edited_edge: index(EDITED_EDGE),
		}
	}
}

fn is(id: &VertexId, state: Option<&str>) -> bool {
	state.map_or(false, |state| id == state)
}

impl ConceptMap {
	/// Describes `graph` with the UI state found in `dataset`.
	#[must_use]
	pub fn render_graph(graph: &Graph, dataset: &Dataset) -> VNode {
		let state = UiState::new(dataset);
		let mut content: Vec<VNode> = Vec::new();
		for (index, edge) in graph.edges.iter().enumerate() {
			match (graph.vertex(&edge.from), graph.vertex(&edge.to)) {
				(Some(from), Some(to)) => content.push(edge_view(index, edge, from, to, &state)),
				_ => warn!(index, "Edge references a missing vertex. Not rendering it."),
			}
		}
		for vertex in &graph.vertices {
			content.push(vertex_view(vertex, &state))
		}
		let display = if state.selected_vertex.is_some() || state.selected_edge.is_some() { "none" } else { "block" };
		content.push(add_new_vertex(display));

		h(
			"body",
			vec![],
			vec![h("div", vec![("style", AttrValue::style(vec![("position", "relative")]))], content)],
		)
	}
}

impl<D: Dom> View<D> for ConceptMap {
	#[instrument(skip(self, dataset))]
	fn render(&self, dataset: &Dataset) -> Option<VNode> {
		let config = match dataset.get(CONFIG) {
			Some(config) => config,
			None => {
				warn!("No `data-config` to render.");
				return None;
			}
		};
		match Graph::from_json(config) {
			Ok(graph) => Some(Self::render_graph(&graph, dataset)),
			Err(error) => {
				warn!(%error, "Invalid graph configuration.");
				None
			}
		}
	}

	fn init(&self, dom: &D, element: &D::Node) {
		let dataset = dataset(dom, element);
		for &key in &DRAG_STATE {
			if dataset.contains(key) {
				trace!(key, "Dropping stale drag state.");
				remove_data(dom, element, key)
			}
		}
	}
}

fn vertex_view(vertex: &Vertex, state: &UiState<'_>) -> VNode {
	let id = vertex.id.to_string();
	let selected = is(&vertex.id, state.selected_vertex);
	let editing = is(&vertex.id, state.edited_vertex);
	let dragged = is(&vertex.id, state.dragged_vertex);
	let drop_target = is(&vertex.id, state.drop_vertex);
	let connecting = is(&vertex.id, state.connector_from) || dragged;

	let border = if dragged {
		EDGE_BORDER_DRAGGING
	} else if selected || drop_target {
		SELECTED_VERTEX_BORDER
	} else {
		VERTEX_BORDER
	};

	let body = if editing {
		h(
			"div",
			vec![],
			vec![
				h(
					"input",
					vec![
						("className", "EditVertexLabelInput".into()),
						("data-id", id.as_str().into()),
						(
							"style",
							AttrValue::style(vec![
								("border", "1px solid #999"),
								("borderRadius", "1em"),
								("fontSize", "100%"),
								("padding", "0.25em 1em"),
								("width", "5em"),
							]),
						),
						("placeholder", "Vertex label".into()),
						("value", vertex.label.as_str().into()),
					],
					vec![],
				),
				h(
					"a",
					vec![
						("className", "EditVertexLabelOk".into()),
						("data-id", id.as_str().into()),
						("style", symbol_style(&[("color", "green")])),
						("title", "OK".into()),
					],
					vec![VNode::text("\u{2714}")],
				),
				h(
					"a",
					vec![
						("className", "EditVertexLabelCancel".into()),
						("data-id", id.as_str().into()),
						("style", symbol_style(&[("color", "red")])),
						("title", "Cancel".into()),
					],
					vec![VNode::text("\u{2716}")],
				),
			],
		)
	} else {
		VNode::text(vertex.label.as_str())
	};

	let connector = if selected {
		Some(h(
			"a",
			vec![
				("className", "VertexConnector".into()),
				("draggable", "true".into()),
				(
					"style",
					AttrValue::style(vec![
						("color", "white"),
						("display", if connecting { "none" } else { "block" }),
						("background", EDGE_CONNECTOR_BACKGROUND),
						("border", "2px solid white"),
						("borderRadius", "50%"),
						("position", "absolute"),
						("left", "calc(50% - 0.75em)"),
						("top", "calc(100% - 0.5em)"),
						("width", "1.5em"),
						("height", "1.5em"),
						("textAlign", "center"),
					]),
				),
				("title", "Drag connector to another vertex to create edge".into()),
			],
			vec![VNode::text("\u{2192}")],
		))
	} else {
		None
	};

	let actions = if selected {
		Some(h(
			"div",
			vec![
				("className", "ActionButtonBar".into()),
				(
					"style",
					AttrValue::style(vec![
						("display", if connecting { "none" } else { "block" }),
						("position", "absolute"),
						("width", "10em"),
						("left", "calc(100% + 0.5em)"),
						("top", "50%"),
						("transform", "translateY(-50%)"),
					]),
				),
			],
			vec![
				h(
					"a",
					vec![
						("className", "EditVertexLabelAction".into()),
						("data-id", id.as_str().into()),
						("style", symbol_style(&[])),
						("title", "Edit vertex label".into()),
					],
					vec![VNode::text("\u{270E}")],
				),
				h(
					"a",
					vec![
						("className", "DeleteVertexAction".into()),
						("data-id", id.as_str().into()),
						("style", symbol_style(&[("color", "red")])),
						("title", "Delete vertex".into()),
					],
					vec![VNode::text("\u{2716}")],
				),
			],
		))
	} else {
		None
	};

	h(
		"div",
		vec![("id", format!("vertex-{}", id).into())],
		vec![
			editing.then(modal_overlay).into(),
			h(
				"div",
				vec![
					("className", "Vertex".into()),
					("data-id", id.as_str().into()),
					("draggable", "true".into()),
					(
						"style",
						AttrValue::style(vec![
							("background", if drop_target { "#EEEEFF" } else { VERTEX_BACKGROUND }.to_owned()),
							("border", border.to_owned()),
							("borderRadius", VERTEX_BORDER_RADIUS.to_owned()),
							("color", if selected { "blue" } else { "inherit" }.to_owned()),
							("minHeight", "1em".to_owned()),
							("position", "absolute".to_owned()),
							("left", format!("{}px", vertex.left)),
							("top", format!("{}px", vertex.top)),
							("padding", if editing { "0.25em" } else { "0.5em 1em" }.to_owned()),
							("transform", "translate(-50%, -50%)".to_owned()),
							("zIndex", if editing { "101" } else { "1" }.to_owned()),
						]),
					),
				],
				vec![body, connector.into(), actions.into()],
			),
		],
	)
}

fn line_transform(x1: f64, y1: f64, x2: f64, y2: f64) -> Vec<(&'static str, String)> {
	let delta_x = x2 - x1;
	let delta_y = y2 - y1;
	let length = delta_x.hypot(delta_y);
	let mut angle = if length > 0. { (delta_x / length).acos() } else { 0. };
	if delta_y < 0. {
		angle = -angle;
	}
	vec![("transform", format!("rotate({}rad)", angle)), ("width", format!("{}px", length))]
}

fn edge_view(index: usize, edge: &Edge, from: &Vertex, to: &Vertex, state: &UiState<'_>) -> VNode {
	let index_text = index.to_string();
	let selected = state.selected_edge == Some(index);
	let editing = state.edited_edge == Some(index);
	let label_left = from.left + (to.left - from.left) / 2.;
	let label_top = from.top + (to.top - from.top) / 2.;

	let mut line_style = vec![
		("left", format!("{}px", from.left)),
		("top", format!("{}px", from.top)),
		("height", "10px".to_owned()),
	];
	line_style.extend(line_transform(from.left, from.top, to.left, to.top));

	let label = if editing {
		h(
			"div",
			vec![],
			vec![
				h(
					"input",
					vec![
						("className", "EditEdgeLabelInput".into()),
						("data-index", index_text.as_str().into()),
						(
							"style",
							AttrValue::style(vec![
								("border", "1px solid #999"),
								("borderRadius", "1em"),
								("fontSize", "100%"),
								("padding", "0.25em 1em"),
								("width", "5em"),
							]),
						),
						("placeholder", "Edge label".into()),
						("value", edge.label.as_str().into()),
					],
					vec![],
				),
				h(
					"a",
					vec![
						("className", "EditEdgeLabelOk".into()),
						("data-index", index_text.as_str().into()),
						("style", symbol_style(&[("color", "green")])),
						("title", "OK".into()),
					],
					vec![VNode::text("\u{2714}")],
				),
				h(
					"a",
					vec![
						("className", "EditEdgeLabelCancel".into()),
						("data-index", index_text.as_str().into()),
						("style", symbol_style(&[("color", "red")])),
						("title", "Cancel".into()),
					],
					vec![VNode::text("\u{2716}")],
				),
			],
		)
	} else {
		h(
			"span",
			vec![
				("className", "EdgeLabel".into()),
				("data-index", index_text.as_str().into()),
				(
					"style",
					AttrValue::style(vec![
						("color", if selected { "blue" } else { "inherit" }),
						("cursor", "pointer"),
						("marginRight", "0.5em"),
					]),
				),
			],
			vec![VNode::text(edge.label.as_str())],
		)
	};

	let actions = if selected {
		Some(h(
			"div",
			vec![
				("className", "ActionButtonBar".into()),
				(
					"style",
					AttrValue::style(vec![("position", "absolute"), ("width", "10em"), ("left", "100%"), ("top", "-20%")]),
				),
			],
			vec![
				h(
					"a",
					vec![
						("className", "EditEdgeLabelAction".into()),
						("data-index", index_text.as_str().into()),
						("style", symbol_style(&[])),
						("title", "Edit edge label".into()),
					],
					vec![VNode::text("\u{270E}")],
				),
				h(
					"a",
					vec![
						("className", "DeleteEdgeAction".into()),
						("data-index", index_text.as_str().into()),
						("style", symbol_style(&[("color", "red")])),
						("title", "Delete edge".into()),
					],
					vec![VNode::text("\u{2716}")],
				),
			],
		))
	} else {
		None
	};

	h(
		"div",
		vec![],
		vec![
			editing.then(modal_overlay).into(),
			h(
				"div",
				vec![
					("className", if selected { "Edge --selected" } else { "Edge" }.into()),
					("data-index", index_text.as_str().into()),
					("style", AttrValue::style(line_style)),
				],
				vec![],
			),
			h(
				"div",
				vec![(
					"style",
					AttrValue::style(vec![
						("background", if edge.label.is_empty() { "transparent" } else { EDGE_LABEL_BACKGROUND }.to_owned()),
						("position", "absolute".to_owned()),
						("left", format!("{}px", label_left)),
						("top", format!("{}px", label_top)),
						("transform", "translate(-50%, -50%)".to_owned()),
						("zIndex", if editing { "101" } else { "default" }.to_owned()),
					]),
				)],
				vec![label, actions.into()],
			),
		],
	)
}

fn add_new_vertex(display: &str) -> VNode {
	h(
		"div",
		vec![(
			"style",
			AttrValue::style(vec![("position", "fixed"), ("right", "0"), ("top", "0"), ("display", display)]),
		)],
		vec![
			h(
				"a",
				vec![
					("className", "NewVertexAction".into()),
					("draggable", "true".into()),
					(
						"style",
						AttrValue::style(vec![
							("backgroundColor", "blue"),
							("borderRadius", "50%"),
							("color", "white"),
							("cursor", "move"),
							("fontSize", "42px"),
							("display", "block"),
							("margin", "16px 16px 16px"),
							("width", "64px"),
							("lineHeight", "64px"),
							("textAlign", "center"),
						]),
					),
				],
				vec![VNode::text("+")],
			),
			h(
				"div",
				vec![(
					"style",
					AttrValue::style(vec![("color", "#666"), ("fontSize", "12px"), ("lineHeight", "1"), ("textAlign", "center")]),
				)],
				vec![VNode::text("Drag to add"), h("br", vec![], vec![]), VNode::text(" new vertex")],
			),
		],
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	const CONFIG: &str = r#"{"vertices":[{"id":1,"label":"Rust","left":10,"top":20},{"id":"b","label":"Trees","left":50,"top":20}],"edges":[{"from":1,"to":"b","label":"grows"}]}"#;

	#[test]
	fn json_shape() {
		let graph = Graph::from_json(CONFIG).unwrap();
		assert_eq!(graph.vertices.len(), 2);
		assert_eq!(graph.vertices[1].id, VertexId::from("b"));
		assert_eq!(graph.edges[0].label, "grows");

		let value: serde_json::Value = serde_json::from_str(&graph.to_json().unwrap()).unwrap();
		assert_eq!(value["vertices"][0]["id"], serde_json::json!(1.0));
		assert_eq!(value["edges"][0]["to"], serde_json::json!("b"));
	}

	#[test]
	fn ids_compare_loosely() {
		assert_eq!(VertexId::Number(0.25), *"0.25");
		assert_eq!(VertexId::from("3"), VertexId::from(3.));
		assert_ne!(VertexId::from("a"), VertexId::from(1.));
		assert_eq!(VertexId::Number(3.).to_string(), "3");
	}

	#[test]
	fn edits() {
		let mut graph = Graph::from_json(CONFIG).unwrap();
		let rust = VertexId::from(1.);
		let trees = VertexId::from("b");

		assert!(!graph.add_edge(trees.clone(), rust.clone()));
		assert!(!graph.add_edge(rust.clone(), rust.clone()));
		graph.add_vertex(VertexId::from(0.5), 1., 2.);
		assert!(graph.add_edge(VertexId::from("0.5"), trees.clone()));
		assert!(graph.edge_exists(&trees, &VertexId::from(0.5)));

		assert!(graph.set_vertex_label(&trees, "Forests"));
		assert!(graph.set_edge_label(1, "contains"));
		assert!(!graph.set_edge_label(5, "nothing"));
		assert!(graph.move_vertex(&rust, 100., 200.));
		assert_eq!(graph.vertex(&rust).map(|vertex| (vertex.left, vertex.top)), Some((100., 200.)));

		let removed = graph.remove_vertex(&trees).unwrap();
		assert_eq!(removed.label, "Forests");
		assert!(graph.edges.is_empty());
		assert!(graph.remove_edge(0).is_none());
	}

	#[test]
	fn renders_keyed_vertices() {
		let graph = Graph::from_json(CONFIG).unwrap();
		let mut dataset = Dataset::default();
		dataset.insert("selectedVertexId", "1");
		let vnode = ConceptMap::render_graph(&graph, &dataset);

		let container = match vnode {
			VNode::Element(body) => match body.children.into_iter().next() {
				Some(VNode::Element(container)) => container,
				other => panic!("unexpected {:?}", other),
			},
			other => panic!("unexpected {:?}", other),
		};
		// One edge, two vertices, the "new vertex" handle.
		assert_eq!(container.children.len(), 4);
		let ids: Vec<_> = container.children[1..3]
			.iter()
			.map(|vertex| match vertex {
				VNode::Element(vertex) => vertex.attributes[0].clone(),
				other => panic!("unexpected {:?}", other),
			})
			.collect();
		assert_eq!(
			ids,
			vec![("id".to_owned(), "vertex-1".to_owned()), ("id".to_owned(), "vertex-b".to_owned())]
		);
	}
}
