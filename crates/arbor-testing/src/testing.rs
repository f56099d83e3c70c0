//! A document + renderer + root bundle for driving render passes in tests.

use arbor_core::Child;
use arbor_dom::{Document, Mutation, NodeRef};
use arbor_render::{RenderError, Renderer};

/// One isolated render target. Every harness owns its own document, so
/// focus, listeners and the mutation log never leak between tests.
pub struct TestDom {
    renderer: Renderer,
    root: NodeRef,
}

impl Default for TestDom {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDom {
    pub fn new() -> Self {
        let document = Document::new();
        let root = document.create_element("div");
        Self {
            renderer: Renderer::new(document),
            root,
        }
    }

    pub fn document(&self) -> &Document {
        self.renderer.document()
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    pub fn render(&self, children: Vec<Child>) -> Result<(), RenderError> {
        self.renderer.render(&self.root, children)
    }

    pub fn render_one(&self, child: impl Into<Child>) -> Result<(), RenderError> {
        self.renderer.render_one(&self.root, child)
    }

    /// Serialized content of the root, for whole-tree assertions.
    pub fn html(&self) -> String {
        self.root.inner_html()
    }

    /// Drains the mutation log; call once per pass to assert how much work
    /// the pass performed.
    pub fn take_mutations(&self) -> Vec<Mutation> {
        self.document().take_mutations()
    }

    /// Renders and discards the mutations so far, so the next
    /// `take_mutations` covers exactly one pass.
    pub fn render_and_reset(&self, children: Vec<Child>) -> Result<(), RenderError> {
        let result = self.render(children);
        self.document().clear_mutations();
        result
    }
}

/// Per-kind totals over a drained mutation log.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MutationCounts {
    pub inserts: usize,
    pub removes: usize,
    pub set_texts: usize,
    pub set_attrs: usize,
    pub remove_attrs: usize,
    pub set_props: usize,
    pub style_writes: usize,
    pub listener_changes: usize,
}

pub fn count_mutations(mutations: &[Mutation]) -> MutationCounts {
    let mut counts = MutationCounts::default();
    for mutation in mutations {
        match mutation {
            Mutation::Insert { .. } => counts.inserts += 1,
            Mutation::Remove { .. } => counts.removes += 1,
            Mutation::SetText { .. } => counts.set_texts += 1,
            Mutation::SetAttr { .. } => counts.set_attrs += 1,
            Mutation::RemoveAttr { .. } => counts.remove_attrs += 1,
            Mutation::SetProp { .. } => counts.set_props += 1,
            Mutation::SetStyleProp { .. } | Mutation::SetCssText { .. } => {
                counts.style_writes += 1
            }
            Mutation::AddListener { .. } | Mutation::RemoveListener { .. } => {
                counts.listener_changes += 1
            }
        }
    }
    counts
}

/// Insertions into `parent` itself, ignoring fragment staging and deeper
/// subtree work.
pub fn inserts_into(mutations: &[Mutation], parent: &NodeRef) -> usize {
    mutations
        .iter()
        .filter(|mutation| {
            matches!(mutation, Mutation::Insert { parent: p, .. } if p == parent)
        })
        .count()
}

pub fn removes(mutations: &[Mutation]) -> usize {
    mutations
        .iter()
        .filter(|mutation| matches!(mutation, Mutation::Remove { .. }))
        .count()
}
