use dom_morph::{
	binding::{dataset, set_data},
	dom::Dom,
	graph::{ConceptMap, Graph, VertexId},
	interaction::{delegate, EventKind, UiEvent},
	memory::{MemoryDocument, MemoryNode},
	BindingRegistry, ChangeSource,
};

mod memory_document_;
use memory_document_::{by_id, by_selector, init_tracing, parse};

const CONFIG: &str = r#"{"vertices":[{"id":1,"label":"Rust","left":10,"top":20},{"id":"b","label":"Trees","left":50,"top":20}],"edges":[{"from":1,"to":"b","label":"grows"}]}"#;

struct Fixture {
	document: MemoryDocument,
	root: MemoryNode,
	map: MemoryNode,
	source: ChangeSource<MemoryNode>,
	registry: BindingRegistry<MemoryDocument>,
}

impl Fixture {
	fn new() -> Self {
		Self::with_state(&[])
	}

	fn with_state(state: &[(&str, &str)]) -> Self {
		init_tracing();
		let document = MemoryDocument::new();
		document.record_changes(true);
		let root = parse(&document, r#"<main><div class="ConceptMap"></div></main>"#);
		let map = document.first_child(&root).unwrap();
		set_data(&document, &map, "config", CONFIG);
		for &(key, value) in state {
			set_data(&document, &map, key, value);
		}

		let mut source = ChangeSource::new();
		let mut registry = BindingRegistry::new();
		source.extend(document.take_records());
		assert_eq!(registry.bind(&document, &mut source, &root, ".ConceptMap", ConceptMap), 1);
		let mut fixture = Self {
			document,
			root,
			map,
			source,
			registry,
		};
		if state.is_empty() {
			assert_eq!(fixture.flush(), 0);
		}
		fixture
	}

	/// Handles `event` the way a host listener would, then flushes.
	fn dispatch(&mut self, event: UiEvent<'_, MemoryNode>) -> usize {
		if let Some(interaction) = delegate(&self.document, &self.map, &event) {
			ConceptMap::interact(&self.document, &self.map, &interaction);
		}
		self.flush()
	}

	fn state(&self, key: &str) -> Option<String> {
		dataset(&self.document, &self.map).get(key).map(str::to_owned)
	}

	fn find(&self, selector: &str) -> Vec<MemoryNode> {
		by_selector(&self.document, &self.root, selector)
	}

	/// The `.Vertex` element of the vertex with `id`.
	fn vertex_body(&self, id: &str) -> MemoryNode {
		by_selector(&self.document, &self.vertex(id).unwrap(), ".Vertex").remove(0)
	}

	fn graph(&self) -> Graph {
		Graph::from_json(&self.state("config").unwrap()).unwrap()
	}

	fn flush(&mut self) -> usize {
		self.source.extend(self.document.take_records());
		self.registry.flush(&self.document, &mut self.source)
	}

	fn edit(&mut self, edit: impl FnOnce(&mut Graph)) {
		let config = dataset(&self.document, &self.map).get("config").unwrap().to_owned();
		let mut graph = Graph::from_json(&config).unwrap();
		edit(&mut graph);
		set_data(&self.document, &self.map, "config", &graph.to_json().unwrap());
	}

	fn vertex(&self, id: &str) -> Option<MemoryNode> {
		by_id(&self.document, &self.root, &format!("vertex-{}", id))
	}
}

#[test]
fn renders_the_graph() {
	let fixture = Fixture::new();
	let document = &fixture.document;

	assert!(fixture.vertex("1").is_some());
	assert!(fixture.vertex("b").is_some());
	assert_eq!(by_selector(document, &fixture.root, ".Vertex").len(), 2);
	assert_eq!(by_selector(document, &fixture.root, ".Edge").len(), 1);
	assert_eq!(by_selector(document, &fixture.root, ".ActionButtonBar").len(), 0);
	let label = &by_selector(document, &fixture.root, ".EdgeLabel")[0];
	assert_eq!(document.inner_html(label), "grows");
}

#[test]
fn selection_keeps_vertex_nodes() {
	let mut fixture = Fixture::new();
	let rust = fixture.vertex("1").unwrap();
	let trees = fixture.vertex("b").unwrap();

	set_data(&fixture.document, &fixture.map, "selectedVertexId", "b");
	assert_eq!(fixture.flush(), 1);

	assert_eq!(fixture.vertex("1"), Some(rust));
	assert_eq!(fixture.vertex("b"), Some(trees.clone()));
	let bars = by_selector(&fixture.document, &trees, ".ActionButtonBar");
	assert_eq!(bars.len(), 1);
	assert_eq!(by_selector(&fixture.document, &bars[0], ".DeleteVertexAction").len(), 1);
	assert_eq!(by_selector(&fixture.document, &fixture.root, ".VertexConnector").len(), 1);
}

#[test]
fn graph_edits_rerender_once() {
	let mut fixture = Fixture::new();
	let rust = fixture.vertex("1").unwrap();

	fixture.edit(|graph| {
		graph.move_vertex(&VertexId::from(1.), 30., 40.);
		graph.add_vertex(VertexId::from("c"), 0., 0.);
		assert!(graph.add_edge(VertexId::from("c"), VertexId::from(1.)));
	});
	set_data(&fixture.document, &fixture.map, "draggedVertexId", "");
	assert_eq!(fixture.flush(), 1);

	assert_eq!(fixture.vertex("1"), Some(rust.clone()));
	assert!(fixture.vertex("c").is_some());
	assert_eq!(by_selector(&fixture.document, &fixture.root, ".Edge").len(), 2);
	let style = by_selector(&fixture.document, &rust, ".Vertex")
		.into_iter()
		.next()
		.and_then(|vertex| fixture.document.get_attribute(&vertex, None, "style"))
		.unwrap();
	assert!(style.contains("left:30px"), "{}", style);

	fixture.edit(|graph| {
		graph.remove_vertex(&VertexId::from("b"));
	});
	assert_eq!(fixture.flush(), 1);
	assert_eq!(fixture.vertex("b"), None);
	assert_eq!(fixture.vertex("1"), Some(rust));
	assert_eq!(by_selector(&fixture.document, &fixture.root, ".Edge").len(), 1);
}

#[test]
fn invalid_config_keeps_the_last_render() {
	let mut fixture = Fixture::new();
	let before = fixture.document.inner_html(&fixture.map);

	set_data(&fixture.document, &fixture.map, "config", "{ not json");
	assert_eq!(fixture.flush(), 1);

	assert_eq!(fixture.document.inner_html(&fixture.map), before);
}

#[test]
fn clicks_select_and_deselect() {
	let mut fixture = Fixture::new();
	let trees = fixture.vertex_body("b");

	assert_eq!(fixture.dispatch(UiEvent::new(EventKind::Click, &trees)), 1);
	assert_eq!(fixture.state("selectedVertexId").as_deref(), Some("b"));
	assert_eq!(fixture.find(".ActionButtonBar").len(), 1);

	let label = fixture.find(".EdgeLabel").remove(0);
	assert_eq!(fixture.dispatch(UiEvent::new(EventKind::Click, &label)), 1);
	assert_eq!(fixture.state("selectedVertexId"), None);
	assert_eq!(fixture.state("selectedEdgeIndex").as_deref(), Some("0"));

	let map = fixture.map.clone();
	assert_eq!(fixture.dispatch(UiEvent::new(EventKind::Click, &map)), 1);
	assert_eq!(fixture.state("selectedEdgeIndex"), None);
	assert_eq!(fixture.find(".ActionButtonBar").len(), 0);
}

#[test]
fn vertex_labels_are_edited_in_place() {
	let mut fixture = Fixture::with_state(&[("selectedVertexId", "1")]);
	fixture.flush();
	let rust = fixture.vertex("1").unwrap();

	let edit = fixture.find(".EditVertexLabelAction").remove(0);
	assert_eq!(fixture.dispatch(UiEvent::new(EventKind::Click, &edit)), 1);
	assert_eq!(fixture.state("editedVertexId").as_deref(), Some("1"));
	let input = fixture.find(".EditVertexLabelInput").remove(0);
	assert_eq!(fixture.document.value(&input).as_deref(), Some("Rust"));

	fixture.document.set_value(&input, "Systems");
	assert_eq!(fixture.dispatch(UiEvent::new(EventKind::KeyDown, &input).with_key("Enter")), 1);

	assert_eq!(fixture.state("editedVertexId"), None);
	assert_eq!(fixture.graph().vertex(&VertexId::from(1.)).unwrap().label, "Systems");
	assert_eq!(fixture.vertex("1"), Some(rust));
	assert_eq!(fixture.document.inner_html(&fixture.vertex_body("1")), "Systems");
}

#[test]
fn ok_button_reads_the_label_input() {
	let mut fixture = Fixture::with_state(&[("editedVertexId", "b")]);
	fixture.flush();

	let input = fixture.find(".EditVertexLabelInput").remove(0);
	fixture.document.set_value(&input, "Forests");
	let ok = fixture.find(".EditVertexLabelOk").remove(0);
	assert_eq!(fixture.dispatch(UiEvent::new(EventKind::Click, &ok)), 1);

	assert_eq!(fixture.graph().vertex(&VertexId::from("b")).unwrap().label, "Forests");
	assert_eq!(fixture.find(".EditVertexLabelInput").len(), 0);
}

#[test]
fn escape_cancels_edge_label_editing() {
	let mut fixture = Fixture::with_state(&[("selectedEdgeIndex", "0")]);
	fixture.flush();

	let edit = fixture.find(".EditEdgeLabelAction").remove(0);
	assert_eq!(fixture.dispatch(UiEvent::new(EventKind::Click, &edit)), 1);
	let input = fixture.find(".EditEdgeLabelInput").remove(0);
	fixture.document.set_value(&input, "discarded");

	assert_eq!(fixture.dispatch(UiEvent::new(EventKind::KeyDown, &input).with_key("Escape")), 1);
	assert_eq!(fixture.find(".EditEdgeLabelInput").len(), 0);
	assert_eq!(fixture.document.inner_html(&fixture.find(".EdgeLabel")[0]), "grows");

	let label = fixture.find(".EdgeLabel").remove(0);
	assert_eq!(fixture.dispatch(UiEvent::new(EventKind::KeyDown, &label).with_key("Enter")), 0);
}

#[test]
fn new_vertices_are_dragged_in() {
	let mut fixture = Fixture::new();
	let handle = fixture.find(".NewVertexAction").remove(0);

	assert_eq!(fixture.dispatch(UiEvent::new(EventKind::DragEnd, &handle).at(100., 120.)), 1);

	let added = fixture.vertex("2").unwrap();
	assert_eq!(fixture.state("editedVertexId").as_deref(), Some("2"));
	assert_eq!(by_selector(&fixture.document, &added, ".EditVertexLabelInput").len(), 1);
	let vertex = fixture.graph().vertex(&VertexId::from(2.)).cloned().unwrap();
	assert_eq!((vertex.left, vertex.top), (100., 120.));
}

#[test]
fn dragging_a_connector_adds_an_edge() {
	let mut fixture = Fixture::with_state(&[("selectedVertexId", "1")]);
	fixture.edit(|graph| graph.add_vertex(VertexId::from("c"), 90., 90.));
	fixture.flush();
	let trees = fixture.vertex_body("b");
	let target = fixture.vertex_body("c");
	let connector = fixture.find(".VertexConnector").remove(0);

	assert_eq!(fixture.dispatch(UiEvent::new(EventKind::DragStart, &connector)), 1);
	assert_eq!(fixture.state("vertexConnectorFrom").as_deref(), Some("1"));

	assert_eq!(fixture.dispatch(UiEvent::new(EventKind::DragOver, &trees)), 0, "already connected");
	assert_eq!(fixture.dispatch(UiEvent::new(EventKind::DragOver, &target)), 1);
	assert_eq!(fixture.state("dropVertexId").as_deref(), Some("c"));
	assert_eq!(fixture.dispatch(UiEvent::new(EventKind::DragLeave, &target)), 1);
	assert_eq!(fixture.state("dropVertexId"), None);
	fixture.dispatch(UiEvent::new(EventKind::DragOver, &target));

	assert_eq!(fixture.dispatch(UiEvent::new(EventKind::DragEnd, &connector)), 1);
	assert_eq!(fixture.state("vertexConnectorFrom"), None);
	assert_eq!(fixture.state("dropVertexId"), None);
	assert_eq!(fixture.find(".Edge").len(), 2);
	assert!(fixture.graph().edge_exists(&VertexId::from(1.), &VertexId::from("c")));
}

#[test]
fn dragging_a_vertex_moves_it() {
	let mut fixture = Fixture::new();
	let rust = fixture.vertex_body("1");

	assert_eq!(fixture.dispatch(UiEvent::new(EventKind::DragStart, &rust)), 1);
	assert_eq!(fixture.state("draggedVertexId").as_deref(), Some("1"));
	assert_eq!(fixture.state("selectedVertexId").as_deref(), Some("1"));

	assert_eq!(fixture.dispatch(UiEvent::new(EventKind::DragEnd, &rust).at(200., 150.).with_height(30.)), 1);
	assert_eq!(fixture.state("draggedVertexId"), None);
	assert_eq!(fixture.vertex_body("1"), rust);
	let style = fixture.document.get_attribute(&rust, None, "style").unwrap();
	assert!(style.contains("left:200px") && style.contains("top:120px"), "{}", style);
}

#[test]
fn vertices_and_edges_are_deleted() {
	let mut fixture = Fixture::with_state(&[("selectedEdgeIndex", "0")]);
	fixture.flush();

	let delete = fixture.find(".DeleteEdgeAction").remove(0);
	assert_eq!(fixture.dispatch(UiEvent::new(EventKind::Click, &delete)), 1);
	assert_eq!(fixture.find(".Edge").len(), 0);

	let trees = fixture.vertex_body("b");
	fixture.dispatch(UiEvent::new(EventKind::Click, &trees));
	let delete = fixture.find(".DeleteVertexAction").remove(0);
	assert_eq!(fixture.dispatch(UiEvent::new(EventKind::Click, &delete)), 1);
	assert_eq!(fixture.vertex("b"), None);
	assert_eq!(fixture.graph().vertices.len(), 1);
}

#[test]
fn binding_drops_stale_drag_state() {
	let fixture = Fixture::with_state(&[("draggedVertexId", "1"), ("dropVertexId", "b"), ("selectedVertexId", "1")]);

	assert_eq!(fixture.state("draggedVertexId"), None);
	assert_eq!(fixture.state("dropVertexId"), None);
	assert_eq!(fixture.state("selectedVertexId").as_deref(), Some("1"));
}
