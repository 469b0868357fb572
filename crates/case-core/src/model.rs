//! Case document model.
//!
//! A case is an ordered list of categories, each holding an ordered list of
//! steps. A step is one page: an ordered list of positioned elements plus
//! page-level settings (orientation, background). The element list order is
//! the paint order; later elements draw on top.
//!
//! The model is plain data. The editor crate mutates it through commands;
//! nothing here knows about history.

use crate::id::{CategoryId, ElementId, StepId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// ─── Geometry ────────────────────────────────────────────────────────────

/// Position and size of an element, in step coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Bounds {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Same size, shifted by `(dx, dy)`.
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

// ─── Styling ─────────────────────────────────────────────────────────────

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "left" => Some(TextAlign::Left),
            "center" => Some(TextAlign::Center),
            "right" => Some(TextAlign::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    pub font_size: f32,
    pub font_weight: u16, // 100..900
    /// CSS color string, kept verbatim.
    pub color: String,
    pub background: Option<String>,
    pub align: TextAlign,
    pub opacity: f32,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            font_size: 14.0,
            font_weight: 400,
            color: "#000000".into(),
            background: None,
            align: TextAlign::Left,
            opacity: 1.0,
        }
    }
}

// ─── Elements ────────────────────────────────────────────────────────────

/// The element kinds a step can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ElementKind {
    /// Static text.
    Label { text: String },

    /// Picture loaded from a URL or data URI.
    Image { src: String, alt: String },

    /// Free text input.
    #[serde(rename_all = "camelCase")]
    TextField {
        placeholder: String,
        value: String,
        multiline: bool,
    },

    Checkbox { label: String, checked: bool },

    /// Mutually exclusive options sharing one group `name`.
    RadioGroup {
        name: String,
        options: SmallVec<[String; 4]>,
        selected: Option<usize>,
    },
}

impl ElementKind {
    /// Short lowercase name, also used as the id prefix for new elements.
    pub fn type_name(&self) -> &'static str {
        match self {
            ElementKind::Label { .. } => "label",
            ElementKind::Image { .. } => "image",
            ElementKind::TextField { .. } => "textfield",
            ElementKind::Checkbox { .. } => "checkbox",
            ElementKind::RadioGroup { .. } => "radio",
        }
    }
}

/// A positioned element on a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: ElementId,
    pub kind: ElementKind,
    pub bounds: Bounds,
    /// Rotation in degrees, clockwise.
    pub rotation: f32,
    pub z_index: i32,
    pub style: Style,
}

impl Element {
    /// Create an element with a fresh id derived from its kind.
    pub fn new(kind: ElementKind) -> Self {
        let id = ElementId::with_prefix(kind.type_name());
        Self::with_id(id, kind)
    }

    pub fn with_id(id: ElementId, kind: ElementKind) -> Self {
        Self {
            id,
            kind,
            bounds: Bounds::new(0.0, 0.0, 120.0, 24.0),
            rotation: 0.0,
            z_index: 0,
            style: Style::default(),
        }
    }

    pub fn label(text: impl Into<String>) -> Self {
        Self::new(ElementKind::Label { text: text.into() })
    }

    pub fn image(src: impl Into<String>) -> Self {
        Self::new(ElementKind::Image {
            src: src.into(),
            alt: String::new(),
        })
    }

    pub fn text_field(placeholder: impl Into<String>) -> Self {
        Self::new(ElementKind::TextField {
            placeholder: placeholder.into(),
            value: String::new(),
            multiline: false,
        })
    }

    pub fn checkbox(label: impl Into<String>) -> Self {
        Self::new(ElementKind::Checkbox {
            label: label.into(),
            checked: false,
        })
    }

    pub fn radio_group<I, S>(name: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ElementKind::RadioGroup {
            name: name.into(),
            options: options.into_iter().map(Into::into).collect(),
            selected: None,
        })
    }

    /// Builder: place the element at `(x, y)`.
    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.bounds.x = x;
        self.bounds.y = y;
        self
    }

    /// Builder: set the element size.
    pub fn sized(mut self, w: f32, h: f32) -> Self {
        self.bounds.w = w;
        self.bounds.h = h;
        self
    }
}

// ─── Steps & Categories ──────────────────────────────────────────────────

/// Page orientation of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// One page of a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: StepId,
    pub name: String,
    pub orientation: Orientation,
    pub background_url: Option<String>,
    pub elements: Vec<Element>,
}

impl Step {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(StepId::with_prefix("step"), name)
    }

    pub fn with_id(id: StepId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            orientation: Orientation::Portrait,
            background_url: None,
            elements: Vec::new(),
        }
    }

    pub fn index_of(&self, id: ElementId) -> Option<usize> {
        self.elements.iter().position(|e| e.id == id)
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    /// Insert at `index`, clamped to the end of the list. Returns the index used.
    pub fn insert_element(&mut self, index: usize, element: Element) -> usize {
        let index = index.min(self.elements.len());
        self.elements.insert(index, element);
        index
    }

    /// Remove an element, returning it together with the index it occupied.
    pub fn remove_element(&mut self, id: ElementId) -> Option<(usize, Element)> {
        let index = self.index_of(id)?;
        Some((index, self.elements.remove(index)))
    }
}

/// An ordered group of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub steps: Vec<Step>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(CategoryId::with_prefix("category"), name)
    }

    pub fn with_id(id: CategoryId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Builder: append a step.
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step_index(&self, id: StepId) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }
}

// ─── Document ────────────────────────────────────────────────────────────

/// Where an element lives: its step and its position in the step's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementLocation {
    pub step: StepId,
    pub index: usize,
}

/// Snapshot of which category and step are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Activation {
    pub category: Option<CategoryId>,
    pub step: Option<StepId>,
}

/// A whole case: categories, steps, elements, and the current activation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseDocument {
    pub title: String,
    pub categories: Vec<Category>,
    pub active_category: Option<CategoryId>,
    pub active_step: Option<StepId>,
}

impl CaseDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Builder: append a category.
    pub fn with_category(mut self, category: Category) -> Self {
        self.categories.push(category);
        self
    }

    // ─── Lookup ──────────────────────────────────────────────────────────

    pub fn category_index(&self, id: CategoryId) -> Option<usize> {
        self.categories.iter().position(|c| c.id == id)
    }

    pub fn category(&self, id: CategoryId) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn category_mut(&mut self, id: CategoryId) -> Option<&mut Category> {
        self.categories.iter_mut().find(|c| c.id == id)
    }

    /// Returns `(category index, step index)`.
    pub fn step_location(&self, id: StepId) -> Option<(usize, usize)> {
        self.categories
            .iter()
            .enumerate()
            .find_map(|(ci, c)| c.step_index(id).map(|si| (ci, si)))
    }

    /// The category that owns a step.
    pub fn category_of(&self, id: StepId) -> Option<CategoryId> {
        self.step_location(id).map(|(ci, _)| self.categories[ci].id)
    }

    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps().find(|s| s.id == id)
    }

    pub fn step_mut(&mut self, id: StepId) -> Option<&mut Step> {
        self.categories
            .iter_mut()
            .flat_map(|c| c.steps.iter_mut())
            .find(|s| s.id == id)
    }

    /// All steps in document order.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.categories.iter().flat_map(|c| c.steps.iter())
    }

    pub fn element_location(&self, id: ElementId) -> Option<ElementLocation> {
        self.steps().find_map(|s| {
            s.index_of(id).map(|index| ElementLocation { step: s.id, index })
        })
    }

    /// The step that currently holds an element.
    pub fn step_of(&self, id: ElementId) -> Option<StepId> {
        self.element_location(id).map(|loc| loc.step)
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.steps().find_map(|s| s.element(id))
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.categories
            .iter_mut()
            .flat_map(|c| c.steps.iter_mut())
            .find_map(|s| s.element_mut(id))
    }

    // ─── Activation ──────────────────────────────────────────────────────

    pub fn active_step(&self) -> Option<&Step> {
        self.active_step.and_then(|id| self.step(id))
    }

    /// Make `id` the active step, and its owning category the active category.
    /// Returns `false` (and changes nothing) when the step does not exist.
    pub fn activate_step(&mut self, id: StepId) -> bool {
        match self.category_of(id) {
            Some(category) => {
                self.active_category = Some(category);
                self.active_step = Some(id);
                true
            }
            None => false,
        }
    }

    /// Make `id` the active category and activate its first step, if any.
    pub fn activate_category(&mut self, id: CategoryId) -> bool {
        let Some(category) = self.category(id) else {
            return false;
        };
        let first = category.steps.first().map(|s| s.id);
        self.active_category = Some(id);
        self.active_step = first;
        true
    }

    pub fn clear_activation(&mut self) {
        self.active_category = None;
        self.active_step = None;
    }

    pub fn activation(&self) -> Activation {
        Activation {
            category: self.active_category,
            step: self.active_step,
        }
    }

    /// Restore a previously captured activation. Returns `false` (and changes
    /// nothing) if it names a category or step that no longer exists.
    pub fn restore_activation(&mut self, activation: Activation) -> bool {
        let category_ok = activation.category.is_none_or(|c| self.category(c).is_some());
        let step_ok = activation.step.is_none_or(|s| self.step(s).is_some());
        if !(category_ok && step_ok) {
            return false;
        }
        self.active_category = activation.category;
        self.active_step = activation.step;
        true
    }
}
