//! Editor facade: the one object a host UI talks to.
//!
//! Owns the workspace, the history, and the clock that stamps new commands.
//! Hosts call `execute` / `undo` / `redo` from event handlers and read
//! `ui_state()` afterwards to update their undo/redo buttons.

use crate::clock::{Clock, MonotonicClock};
use crate::commands::{Command, StepSetting};
use crate::error::CommandError;
use crate::gesture::{DragGesture, ResizeGesture, ResizeHandle};
use crate::history::{History, HistoryConfig, Recorded};
use crate::workspace::{EditorHooks, Workspace};
use case_core::{
    Bounds, CaseDocument, Category, CategoryId, Element, ElementId, PropertyValue, Step, StepId,
};

/// What the undo/redo controls should show.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoUiState {
    pub can_undo: bool,
    pub can_redo: bool,
    pub undo_label: Option<String>,
    pub redo_label: Option<String>,
}

#[derive(Debug)]
pub struct Editor<C: Clock = MonotonicClock> {
    workspace: Workspace,
    history: History,
    clock: C,
}

impl Editor<MonotonicClock> {
    pub fn new(doc: CaseDocument) -> Self {
        Self::with_parts(Workspace::new(doc), HistoryConfig::default(), MonotonicClock)
    }
}

impl<C: Clock> Editor<C> {
    pub fn with_parts(workspace: Workspace, config: HistoryConfig, clock: C) -> Self {
        Self {
            workspace,
            history: History::new(config),
            clock,
        }
    }

    /// Build an editor around `doc` with custom hooks and clock.
    pub fn with_hooks(doc: CaseDocument, hooks: Box<dyn EditorHooks>, clock: C) -> Self {
        Self::with_parts(Workspace::with_hooks(doc, hooks), HistoryConfig::default(), clock)
    }

    pub fn document(&self) -> &CaseDocument {
        &self.workspace.doc
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Direct workspace access for selection changes and live gestures.
    /// Document edits made here bypass the history.
    pub fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspace
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Swap in a new document: selection cleared, history reset.
    /// Returns the previous document.
    pub fn load_document(&mut self, doc: CaseDocument) -> CaseDocument {
        self.history.reset();
        log::debug!("load document '{}'", doc.title);
        self.workspace.replace_document(doc)
    }

    // ─── History ─────────────────────────────────────────────────────────

    pub fn execute(&mut self, cmd: Command) -> Result<Recorded, CommandError> {
        self.history.execute(&mut self.workspace, cmd)
    }

    pub fn undo(&mut self) -> Result<bool, CommandError> {
        self.history.undo(&mut self.workspace)
    }

    pub fn redo(&mut self) -> Result<bool, CommandError> {
        self.history.redo(&mut self.workspace)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn ui_state(&self) -> UndoUiState {
        UndoUiState {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            undo_label: self.history.undo_description().map(|d| format!("Undo {d}")),
            redo_label: self.history.redo_description().map(|d| format!("Redo {d}")),
        }
    }

    // ─── Stamped command builders ────────────────────────────────────────

    pub fn add_element(&mut self, element: Element) -> Result<ElementId, CommandError> {
        let id = element.id;
        let cmd = Command::add_element(&self.workspace.doc, element, self.clock.now())?;
        self.execute(cmd)?;
        Ok(id)
    }

    pub fn add_elements(&mut self, elements: Vec<Element>) -> Result<Recorded, CommandError> {
        let cmd = Command::add_elements(&self.workspace.doc, elements, self.clock.now())?;
        self.execute(cmd)
    }

    /// Delete the current selection from the active step.
    pub fn delete_selection(&mut self) -> Result<Recorded, CommandError> {
        let ids = self.workspace.selection().ids().to_vec();
        self.delete_elements(&ids)
    }

    pub fn delete_elements(&mut self, ids: &[ElementId]) -> Result<Recorded, CommandError> {
        let cmd = Command::delete_elements(&self.workspace.doc, ids, self.clock.now())?;
        self.execute(cmd)
    }

    /// Nudge elements (arrow keys); repeated nudges merge.
    pub fn move_elements(
        &mut self,
        ids: &[ElementId],
        dx: f32,
        dy: f32,
    ) -> Result<Recorded, CommandError> {
        let cmd = Command::move_elements(ids, dx, dy, self.clock.now())?;
        self.execute(cmd)
    }

    pub fn resize_element(&mut self, id: ElementId, bounds: Bounds) -> Result<Recorded, CommandError> {
        let cmd = Command::resize_element(&self.workspace.doc, id, bounds, self.clock.now())?;
        self.execute(cmd)
    }

    pub fn set_property(
        &mut self,
        id: ElementId,
        path: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<Recorded, CommandError> {
        let cmd =
            Command::change_property(&self.workspace.doc, id, path, value.into(), self.clock.now())?;
        self.execute(cmd)
    }

    pub fn reorder_element(&mut self, id: ElementId, to: usize) -> Result<Recorded, CommandError> {
        let cmd = Command::reorder_element(&self.workspace.doc, id, to, self.clock.now())?;
        self.execute(cmd)
    }

    pub fn add_step(&mut self, category: CategoryId, step: Step) -> Result<StepId, CommandError> {
        let id = step.id;
        let cmd = Command::add_step(&self.workspace.doc, category, step, self.clock.now())?;
        self.execute(cmd)?;
        Ok(id)
    }

    pub fn delete_step(&mut self, id: StepId) -> Result<Recorded, CommandError> {
        let cmd = Command::delete_step(&self.workspace.doc, id, self.clock.now())?;
        self.execute(cmd)
    }

    pub fn set_step_setting(
        &mut self,
        id: StepId,
        setting: StepSetting,
    ) -> Result<Recorded, CommandError> {
        let cmd = Command::change_step_property(&self.workspace.doc, id, setting, self.clock.now())?;
        self.execute(cmd)
    }

    pub fn add_category(&mut self, category: Category) -> Result<CategoryId, CommandError> {
        let id = category.id;
        let cmd = Command::add_category(&self.workspace.doc, category, self.clock.now())?;
        self.execute(cmd)?;
        Ok(id)
    }

    pub fn delete_category(&mut self, id: CategoryId) -> Result<Recorded, CommandError> {
        let cmd = Command::delete_category(&self.workspace.doc, id, self.clock.now())?;
        self.execute(cmd)
    }

    // ─── Gestures ────────────────────────────────────────────────────────

    /// Start dragging the current selection.
    pub fn begin_drag(&self, pointer_x: f32, pointer_y: f32) -> Result<DragGesture, CommandError> {
        DragGesture::begin(
            &self.workspace.doc,
            self.workspace.selection().ids(),
            pointer_x,
            pointer_y,
        )
    }

    pub fn begin_resize(
        &self,
        id: ElementId,
        handle: ResizeHandle,
        pointer_x: f32,
        pointer_y: f32,
    ) -> Result<ResizeGesture, CommandError> {
        ResizeGesture::begin(&self.workspace.doc, id, handle, pointer_x, pointer_y)
    }

    /// Commit a finished drag. `Ok(None)` when the drag was a click.
    pub fn finish_drag(&mut self, gesture: DragGesture) -> Result<Option<Recorded>, CommandError> {
        let at = self.clock.now();
        match gesture.finish(&mut self.workspace, at) {
            Some(cmd) => self.execute(cmd).map(Some),
            None => Ok(None),
        }
    }

    pub fn finish_resize(
        &mut self,
        gesture: ResizeGesture,
    ) -> Result<Option<Recorded>, CommandError> {
        let at = self.clock.now();
        match gesture.finish(&mut self.workspace, at) {
            Some(cmd) => self.execute(cmd).map(Some),
            None => Ok(None),
        }
    }
}
