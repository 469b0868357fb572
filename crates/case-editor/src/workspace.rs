//! The mutation surface commands operate on.
//!
//! A `Workspace` bundles the live document with the two collaborator
//! channels commands talk to: the selection sink and the host's refresh
//! hooks. Commands receive it by `&mut` on every apply/invert, so nothing
//! reaches for global editor state.

use case_core::{CaseDocument, Element, ElementId, Orientation, StepId};
use smallvec::SmallVec;

/// Host notifications fired by commands after they mutate the document.
///
/// None of these are part of the reversible contract: they may fire more
/// than once for the same change, and hosts are expected to debounce.
pub trait EditorHooks {
    /// An element was inserted into a step and should be rendered.
    fn element_mounted(&mut self, _step: StepId, _element: &Element) {}

    /// An element was removed from a step and its view should be dropped.
    fn element_unmounted(&mut self, _step: StepId, _id: ElementId) {}

    fn selection_changed(&mut self, _selection: &[ElementId]) {}

    /// Schedule a thumbnail / visual refresh of a step.
    fn refresh_step(&mut self, _step: StepId) {}

    /// The step's orientation changed; its layout must be re-rendered.
    fn relayout_step(&mut self, _step: StepId, _orientation: Orientation) {}

    fn refresh_background(&mut self, _step: StepId, _url: Option<&str>) {}

    /// Steps or categories were added, removed, or (re)activated.
    fn structure_changed(&mut self) {}
}

/// Hooks that ignore every notification.
#[derive(Debug, Default)]
pub struct NoopHooks;

impl EditorHooks for NoopHooks {}

/// The set of selected elements, in selection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: SmallVec<[ElementId; 4]>,
}

impl Selection {
    pub fn ids(&self) -> &[ElementId] {
        &self.ids
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.ids.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn clear(&mut self) {
        self.ids.clear();
    }

    fn select_only(&mut self, ids: &[ElementId]) {
        self.ids.clear();
        self.ids.extend_from_slice(ids);
    }

    fn add(&mut self, id: ElementId) {
        if !self.ids.contains(&id) {
            self.ids.push(id);
        }
    }
}

/// Document + selection + host hooks.
pub struct Workspace {
    /// The live document (single source of truth).
    pub doc: CaseDocument,
    selection: Selection,
    hooks: Box<dyn EditorHooks>,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("doc", &self.doc.title)
            .field("selection", &self.selection)
            .finish()
    }
}

impl Workspace {
    pub fn new(doc: CaseDocument) -> Self {
        Self::with_hooks(doc, Box::new(NoopHooks))
    }

    pub fn with_hooks(doc: CaseDocument, hooks: Box<dyn EditorHooks>) -> Self {
        Self {
            doc,
            selection: Selection::default(),
            hooks,
        }
    }

    /// Swap in a different document. Selection is cleared.
    pub fn replace_document(&mut self, doc: CaseDocument) -> CaseDocument {
        let old = std::mem::replace(&mut self.doc, doc);
        self.clear_selection();
        self.hooks.structure_changed();
        old
    }

    // ─── Selection sink ──────────────────────────────────────────────────

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.hooks.selection_changed(self.selection.ids());
    }

    pub fn select_only(&mut self, ids: &[ElementId]) {
        self.selection.select_only(ids);
        self.hooks.selection_changed(self.selection.ids());
    }

    pub fn add_to_selection(&mut self, id: ElementId) {
        self.selection.add(id);
        self.hooks.selection_changed(self.selection.ids());
    }

    // ─── Host notifications ──────────────────────────────────────────────

    pub(crate) fn mounted(&mut self, step: StepId, element: &Element) {
        self.hooks.element_mounted(step, element);
    }

    pub(crate) fn unmounted(&mut self, step: StepId, id: ElementId) {
        self.hooks.element_unmounted(step, id);
    }

    pub(crate) fn refresh(&mut self, step: StepId) {
        self.hooks.refresh_step(step);
    }

    pub(crate) fn relayout(&mut self, step: StepId, orientation: Orientation) {
        self.hooks.relayout_step(step, orientation);
    }

    pub(crate) fn refresh_background(&mut self, step: StepId, url: Option<&str>) {
        self.hooks.refresh_background(step, url);
    }

    pub(crate) fn structure_changed(&mut self) {
        self.hooks.structure_changed();
    }
}
