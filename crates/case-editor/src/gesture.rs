//! Interactive drag and resize gestures.
//!
//! While the pointer moves, a gesture writes bounds straight into the
//! document for live feedback; nothing touches the history. On pointer-up
//! `finish` rolls every target back to its snapshot and hands out a single
//! command describing the net change, so the command's own `apply` is the
//! only thing that moves the document forward.
//!
//! | Modifier | Drag | Resize (corner handle) |
//! |----------|------|------------------------|
//! | **Shift** | Constrain to dominant axis | Keep aspect ratio |

use crate::clock::Timestamp;
use crate::commands::{BoundsChange, Command, CommandOp, dedup_ids};
use crate::error::CommandError;
use crate::workspace::Workspace;
use case_core::{Bounds, CaseDocument, ElementId, StepId};
use smallvec::SmallVec;

/// Net changes at or below this (in canvas units) count as no change.
pub const GESTURE_EPSILON: f32 = 0.5;

/// Elements are never resized below this width or height.
pub const MIN_ELEMENT_SIZE: f32 = 4.0;

/// Keyboard modifiers held during a pointer gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Self = Self { shift: false };
    pub const SHIFT: Self = Self { shift: true };
}

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    id: ElementId,
    step: StepId,
    bounds: Bounds,
}

fn snapshot(doc: &CaseDocument, id: ElementId) -> Result<Snapshot, CommandError> {
    let loc = doc
        .element_location(id)
        .ok_or(CommandError::ElementNotFound(id))?;
    let bounds = doc
        .element(id)
        .ok_or(CommandError::ElementNotFound(id))?
        .bounds;
    Ok(Snapshot {
        id,
        step: loc.step,
        bounds,
    })
}

/// Write live bounds for each snapshot and refresh the touched steps.
fn write_live(ws: &mut Workspace, targets: &[Snapshot], bounds: impl Fn(&Snapshot) -> Bounds) {
    let mut steps: SmallVec<[StepId; 2]> = SmallVec::new();
    for snap in targets {
        // A target deleted mid-gesture simply stops following the pointer.
        if let Some(element) = ws.doc.element_mut(snap.id) {
            element.bounds = bounds(snap);
            if !steps.contains(&snap.step) {
                steps.push(snap.step);
            }
        }
    }
    for step in steps {
        ws.refresh(step);
    }
}

fn within_epsilon(a: f32, b: f32) -> bool {
    (a - b).abs() <= GESTURE_EPSILON
}

// ─── Drag ────────────────────────────────────────────────────────────────

/// Moving one or more elements with the pointer.
#[derive(Debug)]
pub struct DragGesture {
    targets: SmallVec<[Snapshot; 4]>,
    start: (f32, f32),
    delta: (f32, f32),
}

impl DragGesture {
    /// Snapshot `ids` and remember where the pointer went down.
    pub fn begin(
        doc: &CaseDocument,
        ids: &[ElementId],
        pointer_x: f32,
        pointer_y: f32,
    ) -> Result<Self, CommandError> {
        if ids.is_empty() {
            return Err(CommandError::EmptyTargets("drag"));
        }
        let targets = dedup_ids(ids)
            .into_iter()
            .map(|id| snapshot(doc, id))
            .collect::<Result<SmallVec<_>, _>>()?;
        Ok(Self {
            targets,
            start: (pointer_x, pointer_y),
            delta: (0.0, 0.0),
        })
    }

    /// Net displacement so far.
    pub fn delta(&self) -> (f32, f32) {
        self.delta
    }

    /// Follow the pointer. The delta is always measured from the start, so
    /// toggling Shift mid-drag snaps back onto (or off) the axis.
    pub fn update(&mut self, ws: &mut Workspace, pointer_x: f32, pointer_y: f32, mods: Modifiers) {
        let mut dx = pointer_x - self.start.0;
        let mut dy = pointer_y - self.start.1;
        if mods.shift {
            if dx.abs() > dy.abs() {
                dy = 0.0;
            } else {
                dx = 0.0;
            }
        }
        self.delta = (dx, dy);
        write_live(ws, &self.targets, |s| s.bounds.translated(dx, dy));
    }

    /// Roll back and produce the move command, or `None` for a click.
    pub fn finish(self, ws: &mut Workspace, at: Timestamp) -> Option<Command> {
        self.rollback(ws);
        let (dx, dy) = self.delta;
        if within_epsilon(dx, 0.0) && within_epsilon(dy, 0.0) {
            log::debug!("drag cancelled: net ({dx}, {dy}) within epsilon");
            return None;
        }
        let op = CommandOp::MoveElements {
            ids: self.targets.iter().map(|s| s.id).collect(),
            dx,
            dy,
        };
        Some(Command::new(op, at))
    }

    /// Abort (Escape): restore the snapshot, produce nothing.
    pub fn cancel(self, ws: &mut Workspace) {
        self.rollback(ws);
    }

    fn rollback(&self, ws: &mut Workspace) {
        write_live(ws, &self.targets, |s| s.bounds);
    }
}

// ─── Resize ──────────────────────────────────────────────────────────────

/// The eight grab handles around an element's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeHandle {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

impl ResizeHandle {
    fn moves_left(self) -> bool {
        matches!(self, Self::TopLeft | Self::BottomLeft | Self::Left)
    }

    fn moves_right(self) -> bool {
        matches!(self, Self::TopRight | Self::BottomRight | Self::Right)
    }

    fn moves_top(self) -> bool {
        matches!(self, Self::TopLeft | Self::TopRight | Self::Top)
    }

    fn moves_bottom(self) -> bool {
        matches!(self, Self::BottomLeft | Self::BottomRight | Self::Bottom)
    }

    pub fn is_corner(self) -> bool {
        matches!(
            self,
            Self::TopLeft | Self::TopRight | Self::BottomRight | Self::BottomLeft
        )
    }

    /// Bounds after dragging this handle of `orig` by `(dx, dy)`.
    ///
    /// The opposite edge stays put and neither side drops below
    /// `MIN_ELEMENT_SIZE`. With `keep_aspect` a corner handle scales both
    /// sides by whichever axis grew more.
    pub fn resize(self, orig: Bounds, dx: f32, dy: f32, keep_aspect: bool) -> Bounds {
        let (mut left, mut top) = (orig.x, orig.y);
        let (mut right, mut bottom) = (orig.x + orig.w, orig.y + orig.h);

        if self.moves_left() {
            left = (left + dx).min(right - MIN_ELEMENT_SIZE);
        }
        if self.moves_right() {
            right = (right + dx).max(left + MIN_ELEMENT_SIZE);
        }
        if self.moves_top() {
            top = (top + dy).min(bottom - MIN_ELEMENT_SIZE);
        }
        if self.moves_bottom() {
            bottom = (bottom + dy).max(top + MIN_ELEMENT_SIZE);
        }
        let mut out = Bounds::new(left, top, right - left, bottom - top);

        if keep_aspect && self.is_corner() && orig.w > 0.0 && orig.h > 0.0 {
            let scale = (out.w / orig.w).max(out.h / orig.h);
            out.w = orig.w * scale;
            out.h = orig.h * scale;
            if self.moves_left() {
                out.x = right - out.w;
            }
            if self.moves_top() {
                out.y = bottom - out.h;
            }
        }
        out
    }
}

/// Resizing a single element by one of its handles.
#[derive(Debug)]
pub struct ResizeGesture {
    target: Snapshot,
    handle: ResizeHandle,
    start: (f32, f32),
    current: Bounds,
}

impl ResizeGesture {
    pub fn begin(
        doc: &CaseDocument,
        id: ElementId,
        handle: ResizeHandle,
        pointer_x: f32,
        pointer_y: f32,
    ) -> Result<Self, CommandError> {
        let target = snapshot(doc, id)?;
        Ok(Self {
            target,
            handle,
            start: (pointer_x, pointer_y),
            current: target.bounds,
        })
    }

    pub fn handle(&self) -> ResizeHandle {
        self.handle
    }

    /// Bounds the element would get if the gesture ended now.
    pub fn current(&self) -> Bounds {
        self.current
    }

    pub fn update(&mut self, ws: &mut Workspace, pointer_x: f32, pointer_y: f32, mods: Modifiers) {
        let dx = pointer_x - self.start.0;
        let dy = pointer_y - self.start.1;
        self.current = self.handle.resize(self.target.bounds, dx, dy, mods.shift);
        let current = self.current;
        write_live(ws, std::slice::from_ref(&self.target), |_| current);
    }

    /// Roll back and produce the resize command, or `None` if the bounds
    /// ended where they started.
    pub fn finish(self, ws: &mut Workspace, at: Timestamp) -> Option<Command> {
        self.rollback(ws);
        let (old, new) = (self.target.bounds, self.current);
        let unchanged = within_epsilon(old.x, new.x)
            && within_epsilon(old.y, new.y)
            && within_epsilon(old.w, new.w)
            && within_epsilon(old.h, new.h);
        if unchanged {
            log::debug!("resize cancelled: bounds unchanged");
            return None;
        }
        let changes = vec![BoundsChange {
            id: self.target.id,
            old,
            new,
        }];
        Some(Command::new(CommandOp::ResizeElements { changes }, at))
    }

    pub fn cancel(self, ws: &mut Workspace) {
        self.rollback(ws);
    }

    fn rollback(&self, ws: &mut Workspace) {
        write_live(ws, std::slice::from_ref(&self.target), |s| s.bounds);
    }
}
