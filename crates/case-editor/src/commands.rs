//! Reversible document commands.
//!
//! A `Command` is one user-intended edit: it carries everything needed to
//! apply the edit and to restore the exact prior state, so `History` never
//! has to inspect the document. Commands are immutable once built; merging
//! two commands produces a new value instead of folding one into the other.
//!
//! | Kind | apply | invert | merges with |
//! |------|-------|--------|-------------|
//! | `MoveElements` | add `(dx, dy)` | subtract `(dx, dy)` | same element set, deltas summed |
//! | `ResizeElements` | write new bounds | write old bounds | — |
//! | `ChangeProperty` | write `new` | write `old` | same element + path, keeps first `old` |
//! | `AddElement(s)` | append, mount, select | remove, unmount, clear selection | — |
//! | `DeleteElements` | remove, unmount | re-insert at recorded index, reselect | — |
//! | `ReorderElement` | move `from → to` | move `to → from` | — |
//! | `AddStep` / `AddCategory` | append, activate | remove, restore activation | — |
//! | `DeleteStep` / `DeleteCategory` | remove, activate sibling | re-insert, restore activation | — |
//! | `ChangeStepProperty` | write `new` | write `old` | same step + field, keeps first `old` |
//!
//! A command whose target has disappeared (its step was removed, say) no-ops
//! with a warning instead of failing, so the log stays usable.

use crate::clock::Timestamp;
use crate::error::CommandError;
use crate::workspace::Workspace;
use case_core::{
    Activation, Bounds, CaseDocument, Category, CategoryId, Element, ElementId, Orientation,
    PropertyError, PropertyValue, Step, StepId,
};
use smallvec::SmallVec;
use std::cell::RefCell;

/// Fieldless tag for each command variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    AddElement,
    AddElements,
    DeleteElements,
    MoveElements,
    ResizeElements,
    ChangeProperty,
    ReorderElement,
    AddStep,
    DeleteStep,
    ChangeStepProperty,
    AddCategory,
    DeleteCategory,
}

/// An element removed by `DeleteElements`, with the index it occupied.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedElement {
    pub index: usize,
    pub element: Element,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsChange {
    pub id: ElementId,
    pub old: Bounds,
    pub new: Bounds,
}

/// A step-level setting and its value.
#[derive(Debug, Clone, PartialEq)]
pub enum StepSetting {
    Name(String),
    /// Drives a layout re-render.
    Orientation(Orientation),
    /// Drives a background refresh.
    Background(Option<String>),
}

impl StepSetting {
    pub fn field_name(&self) -> &'static str {
        match self {
            StepSetting::Name(_) => "name",
            StepSetting::Orientation(_) => "orient",
            StepSetting::Background(_) => "bgUrl",
        }
    }

    fn read(step: &Step, like: &StepSetting) -> StepSetting {
        match like {
            StepSetting::Name(_) => StepSetting::Name(step.name.clone()),
            StepSetting::Orientation(_) => StepSetting::Orientation(step.orientation),
            StepSetting::Background(_) => StepSetting::Background(step.background_url.clone()),
        }
    }
}

/// The kind-specific payload of a command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOp {
    AddElement {
        step: StepId,
        element: Box<Element>,
    },
    AddElements {
        step: StepId,
        elements: Vec<Element>,
    },
    /// `removed` is sorted by ascending index. `applied` holds the ids the
    /// last `apply` actually took out; `invert` restores only those.
    DeleteElements {
        step: StepId,
        removed: Vec<RemovedElement>,
        applied: RefCell<SmallVec<[ElementId; 4]>>,
    },
    MoveElements {
        ids: SmallVec<[ElementId; 4]>,
        dx: f32,
        dy: f32,
    },
    ResizeElements {
        changes: Vec<BoundsChange>,
    },
    ChangeProperty {
        element: ElementId,
        path: String,
        old: PropertyValue,
        new: PropertyValue,
    },
    ReorderElement {
        step: StepId,
        element: ElementId,
        from: usize,
        to: usize,
    },
    AddStep {
        category: CategoryId,
        step: Box<Step>,
        prior: Activation,
    },
    DeleteStep {
        category: CategoryId,
        index: usize,
        step: Box<Step>,
        prior: Activation,
    },
    ChangeStepProperty {
        step: StepId,
        old: StepSetting,
        new: StepSetting,
    },
    AddCategory {
        category: Box<Category>,
        prior: Activation,
    },
    DeleteCategory {
        index: usize,
        category: Box<Category>,
        prior: Activation,
    },
}

impl CommandOp {
    pub fn kind(&self) -> CommandKind {
        match self {
            CommandOp::AddElement { .. } => CommandKind::AddElement,
            CommandOp::AddElements { .. } => CommandKind::AddElements,
            CommandOp::DeleteElements { .. } => CommandKind::DeleteElements,
            CommandOp::MoveElements { .. } => CommandKind::MoveElements,
            CommandOp::ResizeElements { .. } => CommandKind::ResizeElements,
            CommandOp::ChangeProperty { .. } => CommandKind::ChangeProperty,
            CommandOp::ReorderElement { .. } => CommandKind::ReorderElement,
            CommandOp::AddStep { .. } => CommandKind::AddStep,
            CommandOp::DeleteStep { .. } => CommandKind::DeleteStep,
            CommandOp::ChangeStepProperty { .. } => CommandKind::ChangeStepProperty,
            CommandOp::AddCategory { .. } => CommandKind::AddCategory,
            CommandOp::DeleteCategory { .. } => CommandKind::DeleteCategory,
        }
    }

    fn describe(&self) -> String {
        match self {
            CommandOp::AddElement { element, .. } => format!("Add {}", element.kind.type_name()),
            CommandOp::AddElements { elements, .. } => plural("Add", elements.len()),
            CommandOp::DeleteElements { removed, .. } => plural("Delete", removed.len()),
            CommandOp::MoveElements { ids, .. } => plural("Move", ids.len()),
            CommandOp::ResizeElements { changes } => plural("Resize", changes.len()),
            CommandOp::ChangeProperty { path, .. } => format!("Change {path}"),
            CommandOp::ReorderElement { from, to, .. } if to > from => "Bring forward".into(),
            CommandOp::ReorderElement { .. } => "Send backward".into(),
            CommandOp::AddStep { step, .. } => format!("Add step '{}'", step.name),
            CommandOp::DeleteStep { step, .. } => format!("Delete step '{}'", step.name),
            CommandOp::ChangeStepProperty { new, .. } => match new {
                StepSetting::Name(_) => "Rename step".into(),
                StepSetting::Orientation(_) => "Change orientation".into(),
                StepSetting::Background(_) => "Change background".into(),
            },
            CommandOp::AddCategory { category, .. } => {
                format!("Add category '{}'", category.name)
            }
            CommandOp::DeleteCategory { category, .. } => {
                format!("Delete category '{}'", category.name)
            }
        }
    }
}

fn plural(verb: &str, n: usize) -> String {
    if n == 1 {
        format!("{verb} element")
    } else {
        format!("{verb} {n} elements")
    }
}

/// A reversible edit with a UI label and a creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    op: CommandOp,
    description: String,
    created_at: Timestamp,
}

impl Command {
    /// Wrap a raw payload. The description is derived from the payload.
    pub fn new(op: CommandOp, created_at: Timestamp) -> Self {
        let description = op.describe();
        Self {
            op,
            description,
            created_at,
        }
    }

    /// Builder: override the UI label.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn op(&self) -> &CommandOp {
        &self.op
    }

    pub fn kind(&self) -> CommandKind {
        self.op.kind()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    // ─── Construction helpers ────────────────────────────────────────────
    //
    // These read prior state from the document and reject invalid targets
    // up front, so the engine only ever sees well-formed commands.

    /// Add one element to the active step.
    pub fn add_element(
        doc: &CaseDocument,
        element: Element,
        at: Timestamp,
    ) -> Result<Self, CommandError> {
        let step = doc.active_step.ok_or(CommandError::NoActiveStep)?;
        Self::add_element_to(doc, step, element, at)
    }

    pub fn add_element_to(
        doc: &CaseDocument,
        step: StepId,
        element: Element,
        at: Timestamp,
    ) -> Result<Self, CommandError> {
        if doc.step(step).is_none() {
            return Err(CommandError::StepNotFound(step));
        }
        ensure_new_elements(doc, std::iter::once(&element))?;
        let op = CommandOp::AddElement {
            step,
            element: Box::new(element),
        };
        Ok(Self::new(op, at))
    }

    /// Add several elements (paste, template drop) to the active step.
    pub fn add_elements(
        doc: &CaseDocument,
        elements: Vec<Element>,
        at: Timestamp,
    ) -> Result<Self, CommandError> {
        if elements.is_empty() {
            return Err(CommandError::EmptyTargets("add elements"));
        }
        let step = doc.active_step.ok_or(CommandError::NoActiveStep)?;
        if doc.step(step).is_none() {
            return Err(CommandError::StepNotFound(step));
        }
        ensure_new_elements(doc, &elements)?;
        Ok(Self::new(CommandOp::AddElements { step, elements }, at))
    }

    /// Delete elements of the active step. Every id must live in that step.
    pub fn delete_elements(
        doc: &CaseDocument,
        ids: &[ElementId],
        at: Timestamp,
    ) -> Result<Self, CommandError> {
        if ids.is_empty() {
            return Err(CommandError::EmptyTargets("delete elements"));
        }
        let step_id = doc.active_step.ok_or(CommandError::NoActiveStep)?;
        let step = doc.step(step_id).ok_or(CommandError::StepNotFound(step_id))?;

        let mut removed = ids
            .iter()
            .map(|&id| {
                let index = step.index_of(id).ok_or(CommandError::ElementNotFound(id))?;
                Ok(RemovedElement {
                    index,
                    element: step.elements[index].clone(),
                })
            })
            .collect::<Result<Vec<_>, CommandError>>()?;
        removed.sort_by_key(|r| r.index);
        removed.dedup_by_key(|r| r.index);

        let op = CommandOp::DeleteElements {
            step: step_id,
            removed,
            applied: RefCell::default(),
        };
        Ok(Self::new(op, at))
    }

    pub fn move_elements(
        ids: &[ElementId],
        dx: f32,
        dy: f32,
        at: Timestamp,
    ) -> Result<Self, CommandError> {
        if ids.is_empty() {
            return Err(CommandError::EmptyTargets("move elements"));
        }
        let op = CommandOp::MoveElements {
            ids: dedup_ids(ids),
            dx,
            dy,
        };
        Ok(Self::new(op, at))
    }

    pub fn resize_elements(changes: Vec<BoundsChange>, at: Timestamp) -> Result<Self, CommandError> {
        if changes.is_empty() {
            return Err(CommandError::EmptyTargets("resize elements"));
        }
        Ok(Self::new(CommandOp::ResizeElements { changes }, at))
    }

    /// Resize one element, reading its current bounds as the old value.
    pub fn resize_element(
        doc: &CaseDocument,
        id: ElementId,
        new: Bounds,
        at: Timestamp,
    ) -> Result<Self, CommandError> {
        let old = doc
            .element(id)
            .ok_or(CommandError::ElementNotFound(id))?
            .bounds;
        Self::resize_elements(vec![BoundsChange { id, old, new }], at)
    }

    /// Set a dotted-path property, capturing the current value for undo.
    pub fn change_property(
        doc: &CaseDocument,
        id: ElementId,
        path: &str,
        new: PropertyValue,
        at: Timestamp,
    ) -> Result<Self, CommandError> {
        let element = doc.element(id).ok_or(CommandError::ElementNotFound(id))?;
        let old = element.get_property(path)?;
        if !old.same_shape(&new) {
            return Err(PropertyError::TypeMismatch {
                path: path.to_string(),
                expected: old.type_name(),
                found: new.type_name(),
            }
            .into());
        }
        let op = CommandOp::ChangeProperty {
            element: id,
            path: path.to_string(),
            old,
            new,
        };
        Ok(Self::new(op, at))
    }

    /// Move an element to `to` in its step's paint order (clamped).
    pub fn reorder_element(
        doc: &CaseDocument,
        id: ElementId,
        to: usize,
        at: Timestamp,
    ) -> Result<Self, CommandError> {
        let loc = doc
            .element_location(id)
            .ok_or(CommandError::ElementNotFound(id))?;
        let len = doc.step(loc.step).map_or(1, |s| s.elements.len());
        let to = to.min(len.saturating_sub(1));
        if to == loc.index {
            return Err(CommandError::NoChange("reorder element"));
        }
        let op = CommandOp::ReorderElement {
            step: loc.step,
            element: id,
            from: loc.index,
            to,
        };
        Ok(Self::new(op, at))
    }

    pub fn add_step(
        doc: &CaseDocument,
        category: CategoryId,
        step: Step,
        at: Timestamp,
    ) -> Result<Self, CommandError> {
        if doc.category(category).is_none() {
            return Err(CommandError::CategoryNotFound(category));
        }
        ensure_new_steps(doc, std::iter::once(&step))?;
        let op = CommandOp::AddStep {
            category,
            step: Box::new(step),
            prior: doc.activation(),
        };
        Ok(Self::new(op, at))
    }

    pub fn delete_step(doc: &CaseDocument, id: StepId, at: Timestamp) -> Result<Self, CommandError> {
        let (ci, si) = doc.step_location(id).ok_or(CommandError::StepNotFound(id))?;
        let category = &doc.categories[ci];
        let op = CommandOp::DeleteStep {
            category: category.id,
            index: si,
            step: Box::new(category.steps[si].clone()),
            prior: doc.activation(),
        };
        Ok(Self::new(op, at))
    }

    pub fn change_step_property(
        doc: &CaseDocument,
        id: StepId,
        new: StepSetting,
        at: Timestamp,
    ) -> Result<Self, CommandError> {
        let step = doc.step(id).ok_or(CommandError::StepNotFound(id))?;
        let old = StepSetting::read(step, &new);
        Ok(Self::new(CommandOp::ChangeStepProperty { step: id, old, new }, at))
    }

    pub fn add_category(
        doc: &CaseDocument,
        category: Category,
        at: Timestamp,
    ) -> Result<Self, CommandError> {
        if doc.category(category.id).is_some() {
            return Err(CommandError::DuplicateId(category.id.to_string()));
        }
        ensure_new_steps(doc, &category.steps)?;
        let op = CommandOp::AddCategory {
            category: Box::new(category),
            prior: doc.activation(),
        };
        Ok(Self::new(op, at))
    }

    pub fn delete_category(
        doc: &CaseDocument,
        id: CategoryId,
        at: Timestamp,
    ) -> Result<Self, CommandError> {
        let index = doc
            .category_index(id)
            .ok_or(CommandError::CategoryNotFound(id))?;
        let op = CommandOp::DeleteCategory {
            index,
            category: Box::new(doc.categories[index].clone()),
            prior: doc.activation(),
        };
        Ok(Self::new(op, at))
    }

    // ─── Apply / invert ──────────────────────────────────────────────────

    /// Perform the forward mutation.
    pub fn apply(&self, ws: &mut Workspace) -> Result<(), CommandError> {
        match &self.op {
            CommandOp::AddElement { step, element } => {
                insert_elements(ws, *step, std::slice::from_ref(&**element));
            }
            CommandOp::AddElements { step, elements } => insert_elements(ws, *step, elements),
            CommandOp::DeleteElements {
                step,
                removed,
                applied,
            } => {
                let gone = remove_elements(ws, *step, removed.iter().rev().map(|r| r.element.id));
                *applied.borrow_mut() = gone;
            }
            CommandOp::MoveElements { ids, dx, dy } => translate(ws, ids, *dx, *dy),
            CommandOp::ResizeElements { changes } => {
                write_bounds(ws, changes.iter().map(|c| (c.id, c.new)));
            }
            CommandOp::ChangeProperty {
                element, path, new, ..
            } => write_property(ws, *element, path, new)?,
            CommandOp::ReorderElement {
                step,
                element,
                from,
                to,
            } => shift_element(ws, *step, *element, *from, *to),
            CommandOp::AddStep { category, step, .. } => {
                let Some(cat) = ws.doc.category_mut(*category) else {
                    log::warn!("add step: category {category} vanished, skipping");
                    return Ok(());
                };
                cat.steps.push((**step).clone());
                ws.doc.activate_step(step.id);
                ws.structure_changed();
                ws.refresh(step.id);
            }
            CommandOp::DeleteStep { step, .. } => {
                let Some((ci, si)) = ws.doc.step_location(step.id) else {
                    log::warn!("delete step: {} already gone, skipping", step.id);
                    return Ok(());
                };
                ws.doc.categories[ci].steps.remove(si);
                if ws.doc.active_step == Some(step.id) {
                    activate_step_sibling(&mut ws.doc, ci, si);
                }
                ws.structure_changed();
            }
            CommandOp::ChangeStepProperty { step, new, .. } => write_step_setting(ws, *step, new),
            CommandOp::AddCategory { category, .. } => {
                ws.doc.categories.push((**category).clone());
                ws.doc.activate_category(category.id);
                ws.structure_changed();
            }
            CommandOp::DeleteCategory { category, .. } => {
                let Some(index) = ws.doc.category_index(category.id) else {
                    log::warn!("delete category: {} already gone, skipping", category.id);
                    return Ok(());
                };
                ws.doc.categories.remove(index);
                if ws.doc.active_category == Some(category.id) {
                    activate_category_sibling(&mut ws.doc, index);
                }
                ws.structure_changed();
            }
        }
        Ok(())
    }

    /// Undo the effect of `apply`, restoring the prior state exactly.
    pub fn invert(&self, ws: &mut Workspace) -> Result<(), CommandError> {
        match &self.op {
            CommandOp::AddElement { step, element } => {
                remove_elements(ws, *step, std::iter::once(element.id));
            }
            CommandOp::AddElements { step, elements } => {
                remove_elements(ws, *step, elements.iter().rev().map(|e| e.id));
            }
            CommandOp::DeleteElements {
                step,
                removed,
                applied,
            } => {
                let applied = applied.borrow();
                let restore = removed.iter().filter(|r| applied.contains(&r.element.id));
                restore_elements(ws, *step, restore);
            }
            CommandOp::MoveElements { ids, dx, dy } => translate(ws, ids, -*dx, -*dy),
            CommandOp::ResizeElements { changes } => {
                write_bounds(ws, changes.iter().map(|c| (c.id, c.old)));
            }
            CommandOp::ChangeProperty {
                element, path, old, ..
            } => write_property(ws, *element, path, old)?,
            CommandOp::ReorderElement {
                step,
                element,
                from,
                to,
            } => shift_element(ws, *step, *element, *to, *from),
            CommandOp::AddStep { step, prior, .. } => {
                let Some((ci, si)) = ws.doc.step_location(step.id) else {
                    log::warn!("undo add step: {} already gone, skipping", step.id);
                    return Ok(());
                };
                ws.doc.categories[ci].steps.remove(si);
                if ws.doc.active_step == Some(step.id) && !ws.doc.restore_activation(*prior) {
                    activate_step_sibling(&mut ws.doc, ci, si);
                }
                ws.structure_changed();
            }
            CommandOp::DeleteStep {
                category,
                index,
                step,
                prior,
            } => {
                let Some(cat) = ws.doc.category_mut(*category) else {
                    log::warn!("undo delete step: category {category} vanished, skipping");
                    return Ok(());
                };
                let index = (*index).min(cat.steps.len());
                cat.steps.insert(index, (**step).clone());
                if prior.step == Some(step.id) {
                    ws.doc.restore_activation(*prior);
                }
                ws.structure_changed();
                ws.refresh(step.id);
            }
            CommandOp::ChangeStepProperty { step, old, .. } => write_step_setting(ws, *step, old),
            CommandOp::AddCategory { category, prior } => {
                let Some(index) = ws.doc.category_index(category.id) else {
                    log::warn!("undo add category: {} already gone, skipping", category.id);
                    return Ok(());
                };
                ws.doc.categories.remove(index);
                if ws.doc.active_category == Some(category.id)
                    && !ws.doc.restore_activation(*prior)
                {
                    activate_category_sibling(&mut ws.doc, index);
                }
                ws.structure_changed();
            }
            CommandOp::DeleteCategory {
                index,
                category,
                prior,
            } => {
                let index = (*index).min(ws.doc.categories.len());
                ws.doc.categories.insert(index, (**category).clone());
                if prior.category == Some(category.id) {
                    ws.doc.restore_activation(*prior);
                }
                ws.structure_changed();
            }
        }
        Ok(())
    }

    // ─── Merging ─────────────────────────────────────────────────────────

    /// Whether `candidate` may be folded into this command. Timing is the
    /// engine's concern; this only checks kind and target compatibility.
    pub fn can_merge_with(&self, candidate: &Command) -> bool {
        match (&self.op, &candidate.op) {
            (CommandOp::MoveElements { ids: a, .. }, CommandOp::MoveElements { ids: b, .. }) => {
                a.iter().all(|id| b.contains(id)) && b.iter().all(|id| a.contains(id))
            }
            (
                CommandOp::ChangeProperty {
                    element: a,
                    path: pa,
                    ..
                },
                CommandOp::ChangeProperty {
                    element: b,
                    path: pb,
                    ..
                },
            ) => a == b && pa == pb,
            (
                CommandOp::ChangeStepProperty { step: a, new: na, .. },
                CommandOp::ChangeStepProperty { step: b, new: nb, .. },
            ) => a == b && na.field_name() == nb.field_name(),
            _ => false,
        }
    }

    /// A new command with the combined effect of `self` then `candidate`,
    /// stamped with the candidate's time so the merge window keeps sliding.
    /// `None` when the two cannot merge.
    pub fn merged_with(&self, candidate: &Command) -> Option<Command> {
        if !self.can_merge_with(candidate) {
            return None;
        }
        let op = match (&self.op, &candidate.op) {
            (
                CommandOp::MoveElements { ids, dx, dy },
                CommandOp::MoveElements {
                    dx: next_dx,
                    dy: next_dy,
                    ..
                },
            ) => CommandOp::MoveElements {
                ids: ids.clone(),
                dx: dx + next_dx,
                dy: dy + next_dy,
            },
            (
                CommandOp::ChangeProperty {
                    element, path, old, ..
                },
                CommandOp::ChangeProperty { new, .. },
            ) => CommandOp::ChangeProperty {
                element: *element,
                path: path.clone(),
                old: old.clone(),
                new: new.clone(),
            },
            (
                CommandOp::ChangeStepProperty { step, old, .. },
                CommandOp::ChangeStepProperty { new, .. },
            ) => CommandOp::ChangeStepProperty {
                step: *step,
                old: old.clone(),
                new: new.clone(),
            },
            _ => return None,
        };
        Some(Command {
            op,
            description: self.description.clone(),
            created_at: candidate.created_at,
        })
    }
}

// ─── Construction checks ─────────────────────────────────────────────────

/// Ids in first-seen order, repeats dropped.
pub(crate) fn dedup_ids(ids: &[ElementId]) -> SmallVec<[ElementId; 4]> {
    let mut out: SmallVec<[ElementId; 4]> = SmallVec::new();
    for &id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// New elements must not reuse an id already in the document or in the batch;
/// invert removes by id and would otherwise take out the wrong element.
fn ensure_new_elements<'a>(
    doc: &CaseDocument,
    elements: impl IntoIterator<Item = &'a Element>,
) -> Result<(), CommandError> {
    let mut seen: SmallVec<[ElementId; 8]> = SmallVec::new();
    for element in elements {
        if doc.element(element.id).is_some() || seen.contains(&element.id) {
            return Err(CommandError::DuplicateId(element.id.to_string()));
        }
        seen.push(element.id);
    }
    Ok(())
}

fn ensure_new_steps<'a>(
    doc: &CaseDocument,
    steps: impl IntoIterator<Item = &'a Step> + Clone,
) -> Result<(), CommandError> {
    let mut seen: SmallVec<[StepId; 4]> = SmallVec::new();
    for step in steps.clone() {
        if doc.step(step.id).is_some() || seen.contains(&step.id) {
            return Err(CommandError::DuplicateId(step.id.to_string()));
        }
        seen.push(step.id);
    }
    ensure_new_elements(doc, steps.into_iter().flat_map(|s| s.elements.iter()))
}

// ─── Mutation helpers ────────────────────────────────────────────────────

fn insert_elements(ws: &mut Workspace, step_id: StepId, elements: &[Element]) {
    let Some(step) = ws.doc.step_mut(step_id) else {
        log::warn!("add elements: step {step_id} vanished, skipping");
        return;
    };
    step.elements.extend(elements.iter().cloned());
    for element in elements {
        ws.mounted(step_id, element);
    }
    let ids: SmallVec<[ElementId; 4]> = elements.iter().map(|e| e.id).collect();
    ws.select_only(&ids);
    ws.refresh(step_id);
}

/// Returns the ids that were actually present and removed.
fn remove_elements(
    ws: &mut Workspace,
    step_id: StepId,
    ids: impl Iterator<Item = ElementId>,
) -> SmallVec<[ElementId; 4]> {
    let Some(step) = ws.doc.step_mut(step_id) else {
        log::warn!("remove elements: step {step_id} vanished, skipping");
        return SmallVec::new();
    };
    let gone: SmallVec<[ElementId; 4]> = ids.filter(|&id| step.remove_element(id).is_some()).collect();
    for &id in &gone {
        ws.unmounted(step_id, id);
    }
    ws.clear_selection();
    ws.refresh(step_id);
    gone
}

fn restore_elements<'a>(
    ws: &mut Workspace,
    step_id: StepId,
    removed: impl Iterator<Item = &'a RemovedElement>,
) {
    if ws.doc.step(step_id).is_none() {
        log::warn!("restore elements: step {step_id} vanished, skipping");
        return;
    }
    let mut restored: SmallVec<[&RemovedElement; 4]> = SmallVec::new();
    for r in removed {
        if ws.doc.element(r.element.id).is_some() {
            log::warn!("restore elements: {} already present, skipping", r.element.id);
            continue;
        }
        if let Some(step) = ws.doc.step_mut(step_id) {
            step.insert_element(r.index, r.element.clone());
        }
        restored.push(r);
    }
    for r in &restored {
        ws.mounted(step_id, &r.element);
    }
    let ids: SmallVec<[ElementId; 4]> = restored.iter().map(|r| r.element.id).collect();
    ws.select_only(&ids);
    ws.refresh(step_id);
}

fn translate(ws: &mut Workspace, ids: &[ElementId], dx: f32, dy: f32) {
    write_bounds_with(ws, ids.iter().map(|&id| (id, None)), |b| b.translated(dx, dy));
}

fn write_bounds(ws: &mut Workspace, targets: impl Iterator<Item = (ElementId, Bounds)>) {
    write_bounds_with(ws, targets.map(|(id, b)| (id, Some(b))), |b| b);
}

/// Shared body of move and resize: update each live target, select them,
/// then refresh every touched step once.
fn write_bounds_with(
    ws: &mut Workspace,
    targets: impl Iterator<Item = (ElementId, Option<Bounds>)>,
    map: impl Fn(Bounds) -> Bounds,
) {
    let mut touched: SmallVec<[ElementId; 4]> = SmallVec::new();
    let mut steps: SmallVec<[StepId; 2]> = SmallVec::new();
    for (id, bounds) in targets {
        if touched.contains(&id) {
            continue;
        }
        let Some(step) = ws.doc.step_of(id) else {
            log::warn!("bounds: element {id} vanished, skipping");
            continue;
        };
        if let Some(element) = ws.doc.element_mut(id) {
            element.bounds = map(bounds.unwrap_or(element.bounds));
        }
        touched.push(id);
        if !steps.contains(&step) {
            steps.push(step);
        }
    }
    if !touched.is_empty() {
        ws.select_only(&touched);
    }
    for step in steps {
        ws.refresh(step);
    }
}

fn write_property(
    ws: &mut Workspace,
    id: ElementId,
    path: &str,
    value: &PropertyValue,
) -> Result<(), CommandError> {
    let Some(step) = ws.doc.step_of(id) else {
        log::warn!("property {path}: element {id} vanished, skipping");
        return Ok(());
    };
    if let Some(element) = ws.doc.element_mut(id) {
        element.set_property(path, value.clone())?;
    }
    ws.refresh(step);
    Ok(())
}

fn shift_element(ws: &mut Workspace, step_id: StepId, id: ElementId, from: usize, to: usize) {
    let Some(step) = ws.doc.step_mut(step_id) else {
        log::warn!("reorder: step {step_id} vanished, skipping");
        return;
    };
    let Some(current) = step.index_of(id) else {
        log::warn!("reorder: element {id} vanished, skipping");
        return;
    };
    if current != from {
        log::warn!("reorder: {id} expected at {from}, found at {current}");
    }
    let element = step.elements.remove(current);
    step.insert_element(to, element);
    ws.refresh(step_id);
}

fn write_step_setting(ws: &mut Workspace, step_id: StepId, setting: &StepSetting) {
    let Some(step) = ws.doc.step_mut(step_id) else {
        log::warn!("step {}: step {step_id} vanished, skipping", setting.field_name());
        return;
    };
    match setting {
        StepSetting::Name(name) => {
            step.name = name.clone();
            ws.structure_changed();
        }
        StepSetting::Orientation(orientation) => {
            step.orientation = *orientation;
            ws.relayout(step_id, *orientation);
        }
        StepSetting::Background(url) => {
            step.background_url = url.clone();
            ws.refresh_background(step_id, url.as_deref());
        }
    }
    ws.refresh(step_id);
}

/// After removing the step at `(ci, si)`: activate the next sibling, else the
/// previous one, else leave the category active with no step.
fn activate_step_sibling(doc: &mut CaseDocument, ci: usize, si: usize) {
    let steps = &doc.categories[ci].steps;
    let sibling = steps
        .get(si)
        .or_else(|| si.checked_sub(1).and_then(|i| steps.get(i)))
        .map(|s| s.id);
    match sibling {
        Some(id) => {
            doc.activate_step(id);
        }
        None => {
            doc.active_category = Some(doc.categories[ci].id);
            doc.active_step = None;
        }
    }
}

/// After removing the category at `index`: activate the next, else the
/// previous category, else clear activation.
fn activate_category_sibling(doc: &mut CaseDocument, index: usize) {
    let sibling = doc
        .categories
        .get(index)
        .or_else(|| index.checked_sub(1).and_then(|i| doc.categories.get(i)))
        .map(|c| c.id);
    match sibling {
        Some(id) => {
            doc.activate_category(id);
        }
        None => doc.clear_activation(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use case_core::ElementKind;
    use pretty_assertions::assert_eq;

    const T0: Timestamp = Timestamp(0);

    fn workspace() -> (Workspace, StepId, CategoryId) {
        let category = CategoryId::with_prefix("cmd_cat");
        let step = StepId::with_prefix("cmd_step");
        let doc = CaseDocument::new("commands")
            .with_category(Category::with_id(category, "Intake").with_step(Step::with_id(step, "Contact")));
        let mut ws = Workspace::new(doc);
        ws.doc.activate_step(step);
        (ws, step, category)
    }

    fn add(ws: &mut Workspace, element: Element) -> ElementId {
        let id = element.id;
        Command::add_element(&ws.doc, element, T0)
            .unwrap()
            .apply(ws)
            .unwrap();
        id
    }

    #[test]
    fn add_element_selects_and_invert_clears() {
        let (mut ws, step, _) = workspace();
        let e = Element::label("Name");
        let id = e.id;
        let cmd = Command::add_element(&ws.doc, e, T0).unwrap();
        assert_eq!(cmd.kind(), CommandKind::AddElement);
        assert_eq!(cmd.description(), "Add label");

        cmd.apply(&mut ws).unwrap();
        assert_eq!(ws.doc.step(step).unwrap().elements.len(), 1);
        assert_eq!(ws.selection().ids(), &[id]);

        cmd.invert(&mut ws).unwrap();
        assert!(ws.doc.step(step).unwrap().elements.is_empty());
        assert!(ws.selection().is_empty());
    }

    #[test]
    fn delete_restores_original_indices() {
        let (mut ws, step, _) = workspace();
        let a = add(&mut ws, Element::label("a"));
        let b = add(&mut ws, Element::label("b"));
        let c = add(&mut ws, Element::label("c"));
        let before = ws.doc.clone();

        let cmd = Command::delete_elements(&ws.doc, &[c, a], T0).unwrap();
        cmd.apply(&mut ws).unwrap();
        let ids: Vec<_> = ws.doc.step(step).unwrap().elements.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![b]);

        cmd.invert(&mut ws).unwrap();
        assert_eq!(ws.doc, before);
        assert_eq!(ws.selection().ids(), &[a, c]);
    }

    #[test]
    fn delete_rejects_element_outside_active_step() {
        let (ws, _, _) = workspace();
        let stray = ElementId::intern("cmd_stray");
        let err = Command::delete_elements(&ws.doc, &[stray], T0).unwrap_err();
        assert_eq!(err, CommandError::ElementNotFound(stray));
    }

    #[test]
    fn move_and_invert() {
        let (mut ws, _, _) = workspace();
        let id = add(&mut ws, Element::label("a").at(10.0, 20.0));

        let cmd = Command::move_elements(&[id], 5.0, -4.0, T0).unwrap();
        cmd.apply(&mut ws).unwrap();
        let b = ws.doc.element(id).unwrap().bounds;
        assert_eq!((b.x, b.y), (15.0, 16.0));

        cmd.invert(&mut ws).unwrap();
        let b = ws.doc.element(id).unwrap().bounds;
        assert_eq!((b.x, b.y), (10.0, 20.0));
    }

    #[test]
    fn move_skips_vanished_targets() {
        let (mut ws, _, _) = workspace();
        let id = add(&mut ws, Element::label("a"));
        let ghost = ElementId::intern("cmd_ghost");
        let cmd = Command::move_elements(&[ghost, id], 1.0, 1.0, T0).unwrap();
        cmd.apply(&mut ws).unwrap();
        assert_eq!(ws.doc.element(id).unwrap().bounds.x, 1.0);
        assert_eq!(ws.selection().ids(), &[id]);
    }

    #[test]
    fn resize_writes_old_and_new_bounds() {
        let (mut ws, _, _) = workspace();
        let id = add(&mut ws, Element::image("x.png").at(0.0, 0.0).sized(100.0, 50.0));
        let cmd = Command::resize_element(&ws.doc, id, Bounds::new(0.0, 0.0, 200.0, 80.0), T0).unwrap();

        cmd.apply(&mut ws).unwrap();
        assert_eq!(ws.doc.element(id).unwrap().bounds, Bounds::new(0.0, 0.0, 200.0, 80.0));
        cmd.invert(&mut ws).unwrap();
        assert_eq!(ws.doc.element(id).unwrap().bounds, Bounds::new(0.0, 0.0, 100.0, 50.0));
    }

    #[test]
    fn change_property_captures_old_value() {
        let (mut ws, _, _) = workspace();
        let id = add(&mut ws, Element::label("a"));
        let cmd =
            Command::change_property(&ws.doc, id, "style.fontSize", PropertyValue::Number(18.0), T0)
                .unwrap();
        match cmd.op() {
            CommandOp::ChangeProperty { old, .. } => assert_eq!(old, &PropertyValue::Number(14.0)),
            other => panic!("unexpected op {other:?}"),
        }
        cmd.apply(&mut ws).unwrap();
        assert_eq!(ws.doc.element(id).unwrap().style.font_size, 18.0);
        cmd.invert(&mut ws).unwrap();
        assert_eq!(ws.doc.element(id).unwrap().style.font_size, 14.0);
    }

    #[test]
    fn change_property_rejects_wrong_type_at_construction() {
        let (mut ws, _, _) = workspace();
        let id = add(&mut ws, Element::label("a"));
        let err = Command::change_property(&ws.doc, id, "x", PropertyValue::Bool(true), T0)
            .unwrap_err();
        assert!(matches!(err, CommandError::Property(PropertyError::TypeMismatch { .. })));
    }

    #[test]
    fn reorder_roundtrip() {
        let (mut ws, step, _) = workspace();
        let a = add(&mut ws, Element::label("a"));
        let b = add(&mut ws, Element::label("b"));
        let c = add(&mut ws, Element::label("c"));

        let cmd = Command::reorder_element(&ws.doc, a, 99, T0).unwrap();
        assert_eq!(cmd.description(), "Bring forward");
        cmd.apply(&mut ws).unwrap();
        let order: Vec<_> = ws.doc.step(step).unwrap().elements.iter().map(|e| e.id).collect();
        assert_eq!(order, vec![b, c, a]);

        cmd.invert(&mut ws).unwrap();
        let order: Vec<_> = ws.doc.step(step).unwrap().elements.iter().map(|e| e.id).collect();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn add_step_activates_and_invert_restores() {
        let (mut ws, first, category) = workspace();
        let new_step = Step::new("History");
        let new_id = new_step.id;
        let cmd = Command::add_step(&ws.doc, category, new_step, T0).unwrap();

        cmd.apply(&mut ws).unwrap();
        assert_eq!(ws.doc.active_step, Some(new_id));

        cmd.invert(&mut ws).unwrap();
        assert_eq!(ws.doc.active_step, Some(first));
        assert!(ws.doc.step(new_id).is_none());
    }

    #[test]
    fn delete_active_step_activates_next_then_previous() {
        let (mut ws, first, category) = workspace();
        let second = Step::new("B");
        let second_id = second.id;
        Command::add_step(&ws.doc, category, second, T0)
            .unwrap()
            .apply(&mut ws)
            .unwrap();
        ws.doc.activate_step(first);

        let cmd = Command::delete_step(&ws.doc, first, T0).unwrap();
        cmd.apply(&mut ws).unwrap();
        assert_eq!(ws.doc.active_step, Some(second_id));

        cmd.invert(&mut ws).unwrap();
        assert_eq!(ws.doc.active_step, Some(first));
        assert_eq!(ws.doc.step_location(first), Some((0, 0)));

        ws.doc.activate_step(second_id);
        let cmd = Command::delete_step(&ws.doc, second_id, T0).unwrap();
        cmd.apply(&mut ws).unwrap();
        assert_eq!(ws.doc.active_step, Some(first));
    }

    #[test]
    fn delete_only_step_leaves_category_active() {
        let (mut ws, first, category) = workspace();
        let cmd = Command::delete_step(&ws.doc, first, T0).unwrap();
        cmd.apply(&mut ws).unwrap();
        assert_eq!(ws.doc.active_step, None);
        assert_eq!(ws.doc.active_category, Some(category));
    }

    #[test]
    fn step_setting_roundtrip() {
        let (mut ws, step, _) = workspace();
        let cmd = Command::change_step_property(
            &ws.doc,
            step,
            StepSetting::Orientation(Orientation::Landscape),
            T0,
        )
        .unwrap();
        cmd.apply(&mut ws).unwrap();
        assert_eq!(ws.doc.step(step).unwrap().orientation, Orientation::Landscape);
        cmd.invert(&mut ws).unwrap();
        assert_eq!(ws.doc.step(step).unwrap().orientation, Orientation::Portrait);
    }

    #[test]
    fn category_add_and_delete() {
        let (mut ws, first, category) = workspace();
        let before = ws.doc.clone();
        let extra = Category::new("Exam").with_step(Step::new("Vitals"));
        let extra_id = extra.id;

        let add = Command::add_category(&ws.doc, extra, T0).unwrap();
        add.apply(&mut ws).unwrap();
        assert_eq!(ws.doc.active_category, Some(extra_id));
        add.invert(&mut ws).unwrap();
        assert_eq!(ws.doc, before);

        let delete = Command::delete_category(&ws.doc, category, T0).unwrap();
        delete.apply(&mut ws).unwrap();
        assert!(ws.doc.categories.is_empty());
        assert_eq!(ws.doc.activation(), Activation::default());
        delete.invert(&mut ws).unwrap();
        assert_eq!(ws.doc.active_step, Some(first));
        assert_eq!(ws.doc, before);
    }

    #[test]
    fn add_into_vanished_step_is_a_noop() {
        let (mut ws, step, _) = workspace();
        let cmd = Command::add_element(&ws.doc, Element::label("late"), T0).unwrap();
        ws.doc.categories[0].steps.clear();
        cmd.apply(&mut ws).unwrap();
        assert!(ws.doc.step(step).is_none());
    }

    #[test]
    fn move_merge_sums_deltas_and_takes_later_time() {
        let a = ElementId::intern("cmd_m_a");
        let b = ElementId::intern("cmd_m_b");
        let first = Command::move_elements(&[a, b], 3.0, 1.0, Timestamp(100)).unwrap();
        let second = Command::move_elements(&[b, a], 2.0, -1.0, Timestamp(300)).unwrap();

        assert!(first.can_merge_with(&second));
        let merged = first.merged_with(&second).unwrap();
        assert_eq!(merged.created_at(), Timestamp(300));
        match merged.op() {
            CommandOp::MoveElements { dx, dy, .. } => assert_eq!((*dx, *dy), (5.0, 0.0)),
            other => panic!("unexpected op {other:?}"),
        }
        // Inputs untouched.
        assert_eq!(first.created_at(), Timestamp(100));
    }

    #[test]
    fn move_on_different_sets_does_not_merge() {
        let a = ElementId::intern("cmd_n_a");
        let b = ElementId::intern("cmd_n_b");
        let first = Command::move_elements(&[a], 1.0, 0.0, T0).unwrap();
        let second = Command::move_elements(&[a, b], 1.0, 0.0, T0).unwrap();
        assert!(!first.can_merge_with(&second));
        assert!(first.merged_with(&second).is_none());
    }

    #[test]
    fn resize_never_merges() {
        let id = ElementId::intern("cmd_r");
        let change = BoundsChange {
            id,
            old: Bounds::default(),
            new: Bounds::new(0.0, 0.0, 10.0, 10.0),
        };
        let a = Command::resize_elements(vec![change], T0).unwrap();
        let b = Command::resize_elements(vec![change], T0).unwrap();
        assert!(!a.can_merge_with(&b));
    }

    #[test]
    fn step_setting_merge_requires_same_field() {
        let step = StepId::intern("cmd_s");
        let rename = |from: &str, to: &str| {
            Command::new(
                CommandOp::ChangeStepProperty {
                    step,
                    old: StepSetting::Name(from.into()),
                    new: StepSetting::Name(to.into()),
                },
                T0,
            )
        };
        let orient = Command::new(
            CommandOp::ChangeStepProperty {
                step,
                old: StepSetting::Orientation(Orientation::Portrait),
                new: StepSetting::Orientation(Orientation::Landscape),
            },
            T0,
        );
        let merged = rename("A", "AB").merged_with(&rename("AB", "ABC")).unwrap();
        assert_eq!(
            merged.op(),
            &CommandOp::ChangeStepProperty {
                step,
                old: StepSetting::Name("A".into()),
                new: StepSetting::Name("ABC".into()),
            }
        );
        assert!(!rename("A", "B").can_merge_with(&orient));
    }

    // ─── Construction checks ─────────────────────────────────────────────

    #[test]
    fn add_with_existing_element_id_is_rejected() {
        let (mut ws, step, _) = workspace();
        let id = ElementId::intern("cmd_dup");
        let label = |text: &str| ElementKind::Label { text: text.into() };
        add(&mut ws, Element::with_id(id, label("original")));
        let before = ws.doc.clone();

        let err = Command::add_element(&ws.doc, Element::with_id(id, label("newcomer")), T0)
            .unwrap_err();
        assert_eq!(err, CommandError::DuplicateId("@cmd_dup".into()));

        let other = ElementId::intern("cmd_dup_batch");
        let err = Command::add_elements(
            &ws.doc,
            vec![
                Element::with_id(other, label("x")),
                Element::with_id(other, label("y")),
            ],
            T0,
        )
        .unwrap_err();
        assert_eq!(err, CommandError::DuplicateId("@cmd_dup_batch".into()));
        assert_eq!(ws.doc, before);
        assert_eq!(ws.doc.step(step).unwrap().elements.len(), 1);
    }

    #[test]
    fn add_with_existing_step_or_category_id_is_rejected() {
        let (mut ws, step, category) = workspace();
        let taken = add(&mut ws, Element::label("taken"));

        let err = Command::add_step(&ws.doc, category, Step::with_id(step, "again"), T0).unwrap_err();
        assert_eq!(err, CommandError::DuplicateId(step.to_string()));

        let err = Command::add_category(&ws.doc, Category::with_id(category, "again"), T0)
            .unwrap_err();
        assert_eq!(err, CommandError::DuplicateId(category.to_string()));

        // A fresh category is still rejected when it smuggles in a used element id.
        let mut page = Step::new("Copy");
        page.elements
            .push(Element::with_id(taken, ElementKind::Label { text: "copy".into() }));
        let err = Command::add_category(&ws.doc, Category::new("Copy").with_step(page), T0)
            .unwrap_err();
        assert_eq!(err, CommandError::DuplicateId(taken.to_string()));
    }

    #[test]
    fn move_with_repeated_ids_moves_once() {
        let (mut ws, _, _) = workspace();
        let id = add(&mut ws, Element::label("a").at(0.0, 0.0));

        let cmd = Command::move_elements(&[id, id], 5.0, 0.0, T0).unwrap();
        cmd.apply(&mut ws).unwrap();
        assert_eq!(ws.doc.element(id).unwrap().bounds.x, 5.0);
        cmd.invert(&mut ws).unwrap();
        assert_eq!(ws.doc.element(id).unwrap().bounds.x, 0.0);

        // Hand-built payloads with repeats are applied once per element too.
        let raw = Command::new(
            CommandOp::MoveElements {
                ids: [id, id].into_iter().collect(),
                dx: 3.0,
                dy: 0.0,
            },
            T0,
        );
        raw.apply(&mut ws).unwrap();
        assert_eq!(ws.doc.element(id).unwrap().bounds.x, 3.0);
    }

    #[test]
    fn repeated_ids_do_not_fake_a_matching_set() {
        let a = ElementId::intern("cmd_rep_a");
        let b = ElementId::intern("cmd_rep_b");
        let raw = |ids: [ElementId; 2]| {
            Command::new(
                CommandOp::MoveElements {
                    ids: ids.into_iter().collect(),
                    dx: 1.0,
                    dy: 0.0,
                },
                T0,
            )
        };
        assert!(!raw([a, a]).can_merge_with(&raw([a, b])));
        assert!(!raw([a, b]).can_merge_with(&raw([a, a])));

        let built = Command::move_elements(&[a, a], 1.0, 0.0, T0).unwrap();
        let single = Command::move_elements(&[a], 1.0, 0.0, T0).unwrap();
        assert!(built.can_merge_with(&single));
    }

    #[test]
    fn undo_delete_skips_elements_removed_elsewhere() {
        let (mut ws, step, _) = workspace();
        let a = add(&mut ws, Element::label("a"));
        let b = add(&mut ws, Element::label("b"));

        let cmd = Command::delete_elements(&ws.doc, &[a, b], T0).unwrap();
        cmd.apply(&mut ws).unwrap();
        cmd.invert(&mut ws).unwrap();

        // `a` goes away outside the command log before the redo.
        ws.doc.step_mut(step).unwrap().remove_element(a);
        cmd.apply(&mut ws).unwrap();
        cmd.invert(&mut ws).unwrap();

        let ids: Vec<_> = ws.doc.step(step).unwrap().elements.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![b]);
        assert_eq!(ws.selection().ids(), &[b]);
    }

    #[test]
    fn reorder_to_current_index_is_rejected() {
        let (mut ws, _, _) = workspace();
        let a = add(&mut ws, Element::label("a"));
        add(&mut ws, Element::label("b"));

        let err = Command::reorder_element(&ws.doc, a, 0, T0).unwrap_err();
        assert_eq!(err, CommandError::NoChange("reorder element"));
        let cmd = Command::reorder_element(&ws.doc, a, 1, T0).unwrap();
        assert_eq!(cmd.description(), "Bring forward");
    }
}
