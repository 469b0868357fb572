//! Integration tests: pointer gestures commit exactly one command.
//!
//! Simulates pointer-down → N moves → pointer-up through the `Editor`,
//! checking live feedback, rollback, and the committed history entry.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use case_core::*;
use case_editor::*;
use pretty_assertions::assert_eq;

#[derive(Debug, Default)]
struct Seen {
    refreshed: Vec<StepId>,
    mounted: Vec<ElementId>,
    unmounted: Vec<ElementId>,
}

struct Recorder(Rc<RefCell<Seen>>);

impl EditorHooks for Recorder {
    fn element_mounted(&mut self, _step: StepId, element: &Element) {
        self.0.borrow_mut().mounted.push(element.id);
    }

    fn element_unmounted(&mut self, _step: StepId, id: ElementId) {
        self.0.borrow_mut().unmounted.push(id);
    }

    fn refresh_step(&mut self, step: StepId) {
        self.0.borrow_mut().refreshed.push(step);
    }
}

fn make_editor() -> (Editor<ManualClock>, Rc<RefCell<Seen>>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let seen = Rc::new(RefCell::new(Seen::default()));
    let doc = CaseDocument::from_json(include_str!("fixtures/intake.json")).unwrap();
    let ed = Editor::with_hooks(doc, Box::new(Recorder(seen.clone())), ManualClock::new(0));
    (ed, seen)
}

fn bounds(ed: &Editor<ManualClock>, id: ElementId) -> Bounds {
    ed.document().element(id).unwrap().bounds
}

// ─── Drag ────────────────────────────────────────────────────────────────

#[test]
fn drag_gives_live_feedback_then_one_command() {
    let (mut ed, seen) = make_editor();
    let label = ElementId::intern("name_label");
    let field = ElementId::intern("name_field");
    ed.workspace_mut().select_only(&[label, field]);

    let mut drag = ed.begin_drag(100.0, 100.0).unwrap();
    for step in 1..=5 {
        let p = 100.0 + step as f32 * 4.0;
        drag.update(ed.workspace_mut(), p, p, Modifiers::NONE);
    }
    // Live: moved, but nothing recorded.
    assert_eq!(bounds(&ed, label).x, 40.0);
    assert_eq!(bounds(&ed, field).y, 70.0);
    assert!(ed.history().is_empty());
    assert!(!seen.borrow().refreshed.is_empty());

    assert_eq!(ed.finish_drag(drag), Ok(Some(Recorded::Pushed)));
    assert_eq!(ed.history().len(), 1);
    assert_eq!(bounds(&ed, label), Bounds::new(40.0, 40.0, 160.0, 24.0));

    ed.undo().unwrap();
    assert_eq!(bounds(&ed, label), Bounds::new(20.0, 20.0, 160.0, 24.0));
    assert_eq!(bounds(&ed, field), Bounds::new(20.0, 50.0, 240.0, 28.0));
}

#[test]
fn shift_drag_locks_dominant_axis() {
    let (mut ed, _) = make_editor();
    let label = ElementId::intern("name_label");
    ed.workspace_mut().select_only(&[label]);

    let mut drag = ed.begin_drag(0.0, 0.0).unwrap();
    drag.update(ed.workspace_mut(), 30.0, 7.0, Modifiers::SHIFT);
    assert_eq!(drag.delta(), (30.0, 0.0));
    ed.finish_drag(drag).unwrap();

    assert_eq!(bounds(&ed, label), Bounds::new(50.0, 20.0, 160.0, 24.0));
}

#[test]
fn click_without_movement_records_nothing() {
    let (mut ed, _) = make_editor();
    let label = ElementId::intern("name_label");
    ed.workspace_mut().select_only(&[label]);

    let mut drag = ed.begin_drag(10.0, 10.0).unwrap();
    drag.update(ed.workspace_mut(), 10.2, 9.9, Modifiers::NONE);
    assert_eq!(ed.finish_drag(drag), Ok(None));
    assert!(ed.history().is_empty());
    assert_eq!(bounds(&ed, label), Bounds::new(20.0, 20.0, 160.0, 24.0));
}

#[test]
fn cancelled_drag_rolls_back() {
    let (mut ed, _) = make_editor();
    let label = ElementId::intern("name_label");
    ed.workspace_mut().select_only(&[label]);

    let mut drag = ed.begin_drag(0.0, 0.0).unwrap();
    drag.update(ed.workspace_mut(), 50.0, 50.0, Modifiers::NONE);
    drag.cancel(ed.workspace_mut());
    assert_eq!(bounds(&ed, label).x, 20.0);
    assert!(ed.history().is_empty());
}

#[test]
fn drag_with_empty_selection_is_rejected() {
    let (ed, _) = make_editor();
    assert_eq!(
        ed.begin_drag(0.0, 0.0).unwrap_err(),
        CommandError::EmptyTargets("drag")
    );
}

#[test]
fn successive_drags_of_same_selection_merge() {
    let (mut ed, _) = make_editor();
    let label = ElementId::intern("name_label");
    ed.workspace_mut().select_only(&[label]);

    for _ in 0..2 {
        let mut drag = ed.begin_drag(0.0, 0.0).unwrap();
        drag.update(ed.workspace_mut(), 10.0, 0.0, Modifiers::NONE);
        ed.finish_drag(drag).unwrap();
        ed.clock().advance(Duration::from_millis(300));
    }
    assert_eq!(ed.history().len(), 1);
    assert_eq!(bounds(&ed, label).x, 40.0);
    ed.undo().unwrap();
    assert_eq!(bounds(&ed, label).x, 20.0);
}

// ─── Resize ──────────────────────────────────────────────────────────────

#[test]
fn resize_commits_final_bounds_once() {
    let (mut ed, _) = make_editor();
    let field = ElementId::intern("name_field");

    let mut resize = ed
        .begin_resize(field, ResizeHandle::BottomRight, 260.0, 78.0)
        .unwrap();
    resize.update(ed.workspace_mut(), 280.0, 90.0, Modifiers::NONE);
    resize.update(ed.workspace_mut(), 300.0, 100.0, Modifiers::NONE);
    assert_eq!(bounds(&ed, field), Bounds::new(20.0, 50.0, 280.0, 50.0));
    assert!(ed.history().is_empty());

    assert_eq!(ed.finish_resize(resize), Ok(Some(Recorded::Pushed)));
    assert_eq!(bounds(&ed, field), Bounds::new(20.0, 50.0, 280.0, 50.0));
    assert_eq!(ed.ui_state().undo_label.as_deref(), Some("Undo Resize element"));

    ed.undo().unwrap();
    assert_eq!(bounds(&ed, field), Bounds::new(20.0, 50.0, 240.0, 28.0));
}

#[test]
fn resize_back_to_start_is_cancelled() {
    let (mut ed, _) = make_editor();
    let field = ElementId::intern("name_field");

    let mut resize = ed.begin_resize(field, ResizeHandle::Left, 20.0, 60.0).unwrap();
    resize.update(ed.workspace_mut(), 0.0, 60.0, Modifiers::NONE);
    resize.update(ed.workspace_mut(), 20.0, 60.0, Modifiers::NONE);
    assert_eq!(ed.finish_resize(resize), Ok(None));
    assert!(ed.history().is_empty());
}

#[test]
fn resizes_never_merge() {
    let (mut ed, _) = make_editor();
    let field = ElementId::intern("name_field");

    for _ in 0..2 {
        let mut resize = ed.begin_resize(field, ResizeHandle::Right, 0.0, 0.0).unwrap();
        resize.update(ed.workspace_mut(), 10.0, 0.0, Modifiers::NONE);
        ed.finish_resize(resize).unwrap();
    }
    assert_eq!(ed.history().len(), 2);
    assert_eq!(bounds(&ed, field).w, 260.0);
}

// ─── Hooks ───────────────────────────────────────────────────────────────

#[test]
fn add_and_delete_mount_and_unmount() {
    let (mut ed, seen) = make_editor();
    let id = ed.add_element(Element::image("xray.png")).unwrap();
    assert_eq!(seen.borrow().mounted, vec![id]);

    ed.delete_selection().unwrap();
    assert_eq!(seen.borrow().unmounted, vec![id]);

    ed.undo().unwrap();
    assert_eq!(seen.borrow().mounted, vec![id, id]);
    assert!(ed.workspace().selection().contains(id));
}
