//! Concept-map interactions.
//!
//! Hosts listen for pointer and keyboard events on a bound concept map and describe each one as a [`UiEvent`].
//! [`delegate`] resolves it against the element it hit into an [`Interaction`], which [`ConceptMap::interact`] then
//! applies to the map's dataset. The changed `data-*` attributes reach the [`BindingRegistry`](`crate::BindingRegistry`)
//! like any other change, so the map re-renders on the next flush.

use crate::{
	binding::{dataset, remove_data, set_data, Dataset},
	dom::{children, Dom, NodeKind},
	graph::{
		ConceptMap, Graph, VertexId, CONFIG, CONNECTOR_FROM, DRAGGED_VERTEX, DROP_VERTEX, EDITED_EDGE, EDITED_VERTEX, SELECTED_EDGE,
		SELECTED_VERTEX,
	},
};
use tracing::{error, instrument, trace, warn};

/// Something with an editable label.
#[derive(Debug, Clone, PartialEq)]
pub enum Labelled {
	Vertex(VertexId),
	Edge(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LabelAction {
	/// Opens the label editor.
	Edit(Labelled),
	/// Stores the new label and closes the editor.
	Confirm(Labelled, String),
	/// Closes the editor without storing anything.
	Cancel(Labelled),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Click {
	/// Anything without a more specific meaning.
	Background,
	Vertex(VertexId),
	/// An edge line or its label.
	Edge(usize),
	Label(LabelAction),
	Delete(Labelled),
}

/// A user action on a concept map.
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
	/// A connector handle started being dragged away from vertex `from`.
	ConnectorDragStarted { from: VertexId },
	VertexDragStarted { id: VertexId },
	/// The "new vertex" handle was dropped at the given position.
	NewVertexDropped { left: f64, top: f64 },
	/// A connector handle was let go, over a vertex or not.
	ConnectorDropped,
	/// A vertex was let go with its centre at `left` and its top edge at `top`.
	VertexDropped { id: VertexId, left: f64, top: f64 },
	DraggedOverVertex { id: VertexId },
	DragLeftVertex,
	/// Every click clears the current selection before taking effect.
	Clicked(Click),
	/// Enter or Escape in a label editor.
	Key(LabelAction),
}

impl Interaction {
	/// Applies this interaction to the UI state in `state` and to `graph`.
	///
	/// Returns whether `graph` changed.
	pub fn apply(&self, state: &mut Dataset, graph: &mut Graph) -> bool {
		match self {
			Interaction::ConnectorDragStarted { from } => {
				state.insert(CONNECTOR_FROM, from.to_string());
				false
			}
			Interaction::VertexDragStarted { id } => {
				state.insert(SELECTED_VERTEX, id.to_string());
				state.remove(SELECTED_EDGE);
				state.insert(DRAGGED_VERTEX, id.to_string());
				false
			}
			Interaction::NewVertexDropped { left, top } => {
				let id = graph.next_vertex_id();
				graph.add_vertex(id.clone(), *left, *top);
				state.insert(EDITED_VERTEX, id.to_string());
				true
			}
			Interaction::ConnectorDropped => match (state.remove(CONNECTOR_FROM), state.remove(DROP_VERTEX)) {
				(Some(from), Some(to)) => connect(graph, &from, &to),
				_ => false,
			},
			Interaction::VertexDropped { id, left, top } => {
				state.remove(DRAGGED_VERTEX);
				graph.move_vertex(id, *left, *top)
			}
			Interaction::DraggedOverVertex { id } => {
				let connectable = match state.get(SELECTED_VERTEX).map(VertexId::from) {
					Some(selected) => &selected != id && !graph.edge_exists(&selected, id),
					None => true,
				};
				if connectable {
					state.insert(DROP_VERTEX, id.to_string());
				}
				false
			}
			Interaction::DragLeftVertex => {
				state.remove(DROP_VERTEX);
				false
			}
			Interaction::Clicked(click) => {
				state.remove(SELECTED_VERTEX);
				state.remove(SELECTED_EDGE);
				match click {
					Click::Background => false,
					Click::Vertex(id) => {
						state.insert(SELECTED_VERTEX, id.to_string());
						false
					}
					Click::Edge(index) => {
						state.insert(SELECTED_EDGE, index.to_string());
						false
					}
					Click::Label(action) => apply_label_action(action, state, graph),
					Click::Delete(Labelled::Vertex(id)) => graph.remove_vertex(id).is_some(),
					Click::Delete(Labelled::Edge(index)) => graph.remove_edge(*index).is_some(),
				}
			}
			Interaction::Key(action) => apply_label_action(action, state, graph),
		}
	}
}

fn apply_label_action(action: &LabelAction, state: &mut Dataset, graph: &mut Graph) -> bool {
	match action {
		LabelAction::Edit(Labelled::Vertex(id)) => {
			state.insert(EDITED_VERTEX, id.to_string());
			false
		}
		LabelAction::Edit(Labelled::Edge(index)) => {
			state.insert(EDITED_EDGE, index.to_string());
			false
		}
		LabelAction::Confirm(Labelled::Vertex(id), label) => {
			state.remove(EDITED_VERTEX);
			graph.set_vertex_label(id, label.as_str())
		}
		LabelAction::Confirm(Labelled::Edge(index), label) => {
			state.remove(EDITED_EDGE);
			graph.set_edge_label(*index, label.as_str())
		}
		LabelAction::Cancel(Labelled::Vertex(id)) => {
			state.remove(EDITED_VERTEX);
			state.insert(SELECTED_VERTEX, id.to_string());
			false
		}
		LabelAction::Cancel(Labelled::Edge(_)) => {
			state.remove(EDITED_EDGE);
			false
		}
	}
}

/// Adds an edge between the vertices named in the UI state, using the ids as the graph spells them.
fn connect(graph: &mut Graph, from: &str, to: &str) -> bool {
	let canonical = |id: &str| graph.vertex(&VertexId::from(id)).map(|vertex| vertex.id.clone());
	match (canonical(from), canonical(to)) {
		(Some(from), Some(to)) => graph.add_edge(from, to),
		_ => {
			warn!("Connector dropped between unknown vertices. Not adding an edge.");
			false
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
	DragStart,
	DragEnd,
	DragOver,
	DragLeave,
	Click,
	KeyDown,
}
impl EventKind {
	/// The DOM event type.
	#[must_use]
	pub fn name(self) -> &'static str {
		match self {
			EventKind::DragStart => "dragstart",
			EventKind::DragEnd => "dragend",
			EventKind::DragOver => "dragover",
			EventKind::DragLeave => "dragleave",
			EventKind::Click => "click",
			EventKind::KeyDown => "keydown",
		}
	}

	pub const ALL: [EventKind; 6] = [
		EventKind::DragStart,
		EventKind::DragEnd,
		EventKind::DragOver,
		EventKind::DragLeave,
		EventKind::Click,
		EventKind::KeyDown,
	];
}

/// A pointer or keyboard event as far as a concept map cares.
#[derive(Debug, Clone)]
pub struct UiEvent<'a, N> {
	pub kind: EventKind,
	/// The innermost node the event was dispatched to.
	pub target: &'a N,
	/// Pointer position in client coordinates.
	pub client_x: f64,
	pub client_y: f64,
	/// Rendered height of `target`.
	pub target_height: f64,
	/// The `key` of a keyboard event.
	pub key: Option<&'a str>,
}
impl<'a, N> UiEvent<'a, N> {
	#[must_use]
	pub fn new(kind: EventKind, target: &'a N) -> Self {
		Self {
			kind,
			target,
			client_x: 0.,
			client_y: 0.,
			target_height: 0.,
			key: None,
		}
	}

	#[must_use]
	pub fn at(self, client_x: f64, client_y: f64) -> Self {
		Self { client_x, client_y, ..self }
	}

	#[must_use]
	pub fn with_height(self, target_height: f64) -> Self {
		Self { target_height, ..self }
	}

	#[must_use]
	pub fn with_key(self, key: &'a str) -> Self {
		Self { key: Some(key), ..self }
	}
}

/// Resolves `event` on the concept map rendered into `map` to the interaction it stands for, if any.
///
/// Only the event's own target is considered.
pub fn delegate<D: Dom>(dom: &D, map: &D::Node, event: &UiEvent<'_, D::Node>) -> Option<Interaction> {
	let target = event.target;
	if dom.kind(target) != NodeKind::Element {
		return match event.kind {
			EventKind::Click => Some(Interaction::Clicked(Click::Background)),
			_ => None,
		};
	}
	let matches = |selector: &str| dom.matches(target, selector);
	let vertex_id = || dom.get_attribute(target, None, "data-id").map(|id| VertexId::from(id.as_str()));
	let edge_index = || dom.get_attribute(target, None, "data-index").and_then(|index| index.trim().parse::<usize>().ok());

	match event.kind {
		EventKind::DragStart => {
			if matches(".VertexConnector") {
				let from = dom.parent_node(target).and_then(|vertex| dom.get_attribute(&vertex, None, "data-id"))?;
				Some(Interaction::ConnectorDragStarted {
					from: VertexId::from(from.as_str()),
				})
			} else if matches(".Vertex") {
				Some(Interaction::VertexDragStarted { id: vertex_id()? })
			} else {
				None
			}
		}
		EventKind::DragEnd => {
			if matches(".NewVertexAction") {
				Some(Interaction::NewVertexDropped {
					left: event.client_x,
					top: event.client_y,
				})
			} else if matches(".VertexConnector") {
				Some(Interaction::ConnectorDropped)
			} else if matches(".Vertex") {
				Some(Interaction::VertexDropped {
					id: vertex_id()?,
					left: event.client_x,
					top: event.client_y - event.target_height,
				})
			} else {
				None
			}
		}
		EventKind::DragOver if matches(".Vertex") => Some(Interaction::DraggedOverVertex { id: vertex_id()? }),
		EventKind::DragLeave if matches(".Vertex") => Some(Interaction::DragLeftVertex),
		EventKind::DragOver | EventKind::DragLeave => None,
		EventKind::Click => {
			let click = if matches(".Vertex") {
				vertex_id().map(Click::Vertex)
			} else if matches(".EditVertexLabelAction") {
				vertex_id().map(|id| Click::Label(LabelAction::Edit(Labelled::Vertex(id))))
			} else if matches(".EditVertexLabelOk") {
				vertex_id().map(|id| Click::Label(LabelAction::Confirm(Labelled::Vertex(id), input_value(dom, map, ".EditVertexLabelInput"))))
			} else if matches(".EditVertexLabelCancel") {
				vertex_id().map(|id| Click::Label(LabelAction::Cancel(Labelled::Vertex(id))))
			} else if matches(".DeleteVertexAction") {
				vertex_id().map(|id| Click::Delete(Labelled::Vertex(id)))
			} else if matches(".Edge, .EdgeLabel") {
				edge_index().map(Click::Edge)
			} else if matches(".EditEdgeLabelAction") {
				edge_index().map(|index| Click::Label(LabelAction::Edit(Labelled::Edge(index))))
			} else if matches(".EditEdgeLabelOk") {
				edge_index().map(|index| Click::Label(LabelAction::Confirm(Labelled::Edge(index), input_value(dom, map, ".EditEdgeLabelInput"))))
			} else if matches(".EditEdgeLabelCancel") {
				edge_index().map(|index| Click::Label(LabelAction::Cancel(Labelled::Edge(index))))
			} else if matches(".DeleteEdgeAction") {
				edge_index().map(|index| Click::Delete(Labelled::Edge(index)))
			} else {
				None
			};
			Some(Interaction::Clicked(click.unwrap_or(Click::Background)))
		}
		EventKind::KeyDown => {
			let labelled = if matches(".EditVertexLabelInput") {
				Labelled::Vertex(vertex_id()?)
			} else if matches(".EditEdgeLabelInput") {
				Labelled::Edge(edge_index()?)
			} else {
				return None;
			};
			match event.key {
				Some("Enter") => Some(Interaction::Key(LabelAction::Confirm(
					labelled,
					dom.value(target).unwrap_or_default(),
				))),
				Some("Escape") => Some(Interaction::Key(LabelAction::Cancel(labelled))),
				_ => None,
			}
		}
	}
}

/// The live value of the first element below `root` that matches `selector`, or an empty string.
fn input_value<D: Dom>(dom: &D, root: &D::Node, selector: &str) -> String {
	find(dom, root, selector).and_then(|input| dom.value(&input)).unwrap_or_default()
}

fn find<D: Dom>(dom: &D, node: &D::Node, selector: &str) -> Option<D::Node> {
	for child in children(dom, node) {
		if dom.kind(&child) == NodeKind::Element {
			if dom.matches(&child, selector) {
				return Some(child);
			}
			if let Some(found) = find(dom, &child, selector) {
				return Some(found);
			}
		}
	}
	None
}

impl ConceptMap {
	/// Applies `interaction` to the concept map bound to `element` and writes the outcome back into its dataset.
	///
	/// Returns whether any `data-*` attribute was written.
	#[instrument(skip(dom, element))]
	pub fn interact<D: Dom>(dom: &D, element: &D::Node, interaction: &Interaction) -> bool {
		let before = dataset(dom, element);
		let mut graph = match before.get(CONFIG).map(Graph::from_json) {
			Some(Ok(graph)) => graph,
			Some(Err(error)) => {
				warn!(%error, "Invalid graph configuration. Ignoring the interaction.");
				return false;
			}
			None => {
				warn!("No `data-config` to interact with.");
				return false;
			}
		};

		let mut after = before.clone();
		if interaction.apply(&mut after, &mut graph) {
			match graph.to_json() {
				Ok(json) => {
					after.insert(CONFIG, json);
				}
				Err(error) => {
					error!(%error, "Failed to serialize the edited graph. Ignoring the interaction.");
					return false;
				}
			}
		}
		write_dataset(dom, element, &before, &after)
	}
}

/// Writes the entries that differ between `before` and `after`.
fn write_dataset<D: Dom>(dom: &D, element: &D::Node, before: &Dataset, after: &Dataset) -> bool {
	let mut written = false;
	for (key, _) in before.iter().filter(|(key, _)| !after.contains(key)) {
		remove_data(dom, element, key);
		written = true;
	}
	for (key, value) in after.iter().filter(|(key, value)| before.get(key) != Some(*value)) {
		set_data(dom, element, key, value);
		written = true;
	}
	if !written {
		trace!("Interaction changed nothing.");
	}
	written
}
