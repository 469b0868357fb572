//! Dotted-path property access on elements.
//!
//! Property panels and sliders address element fields by path
//! (`x`, `style.fontSize`, `checked`, ...). Every setter converts and
//! validates the incoming value before touching the element, so a failed
//! `set_property` leaves the element unchanged.
//!
//! | Path | Type | Applies to |
//! |------|------|------------|
//! | `x` `y` `w` `h` `rotation` `z` | number | all |
//! | `style.fontSize` `style.fontWeight` `style.opacity` | number | all |
//! | `style.color` `style.align` | text | all |
//! | `style.background` | text or null | all |
//! | `text` | text | label |
//! | `src` `alt` | text | image |
//! | `placeholder` `value` / `multiline` | text / bool | text field |
//! | `label` / `checked` | text / bool | checkbox |
//! | `name` / `options` / `selected` | text / list / number or null | radio group |

use crate::error::PropertyError;
use crate::model::{Element, ElementKind, TextAlign};
use serde::{Deserialize, Serialize};

/// A property value as seen by property panels and commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(f32),
    Text(String),
    List(Vec<String>),
}

impl PropertyValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Null => "null",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Number(_) => "number",
            PropertyValue::Text(_) => "text",
            PropertyValue::List(_) => "list",
        }
    }

    /// Whether `other` could be written to the property that produced `self`.
    /// Null is compatible with text and numbers, matching optional fields.
    pub fn same_shape(&self, other: &PropertyValue) -> bool {
        use PropertyValue as V;
        matches!(
            (self, other),
            (V::Null, V::Null | V::Text(_) | V::Number(_))
                | (V::Text(_) | V::Number(_), V::Null)
                | (V::Bool(_), V::Bool(_))
                | (V::Number(_), V::Number(_))
                | (V::Text(_), V::Text(_))
                | (V::List(_), V::List(_))
        )
    }

    fn mismatch(&self, path: &str, expected: &'static str) -> PropertyError {
        PropertyError::TypeMismatch {
            path: path.to_string(),
            expected,
            found: self.type_name(),
        }
    }

    fn into_number(self, path: &str) -> Result<f32, PropertyError> {
        match self {
            PropertyValue::Number(n) if n.is_finite() => Ok(n),
            PropertyValue::Number(n) => Err(out_of_range(path, format!("{n} is not finite"))),
            other => Err(other.mismatch(path, "number")),
        }
    }

    fn into_integer(self, path: &str) -> Result<i64, PropertyError> {
        let n = self.into_number(path)?;
        if n.fract() != 0.0 {
            return Err(out_of_range(path, format!("{n} is not a whole number")));
        }
        Ok(n as i64)
    }

    fn into_text(self, path: &str) -> Result<String, PropertyError> {
        match self {
            PropertyValue::Text(s) => Ok(s),
            other => Err(other.mismatch(path, "text")),
        }
    }

    fn into_optional_text(self, path: &str) -> Result<Option<String>, PropertyError> {
        match self {
            PropertyValue::Null => Ok(None),
            PropertyValue::Text(s) => Ok(Some(s)),
            other => Err(other.mismatch(path, "text or null")),
        }
    }

    fn into_optional_index(self, path: &str) -> Result<Option<usize>, PropertyError> {
        match self {
            PropertyValue::Null => Ok(None),
            other => {
                let n = other.into_integer(path)?;
                usize::try_from(n)
                    .map(Some)
                    .map_err(|_| out_of_range(path, format!("{n} is negative")))
            }
        }
    }

    fn into_bool(self, path: &str) -> Result<bool, PropertyError> {
        match self {
            PropertyValue::Bool(b) => Ok(b),
            other => Err(other.mismatch(path, "bool")),
        }
    }

    fn into_list(self, path: &str) -> Result<Vec<String>, PropertyError> {
        match self {
            PropertyValue::List(items) => Ok(items),
            other => Err(other.mismatch(path, "list")),
        }
    }
}

impl From<f32> for PropertyValue {
    fn from(n: f32) -> Self {
        PropertyValue::Number(n)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}

impl From<Option<String>> for PropertyValue {
    fn from(s: Option<String>) -> Self {
        s.map_or(PropertyValue::Null, PropertyValue::Text)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(items: Vec<String>) -> Self {
        PropertyValue::List(items)
    }
}

fn out_of_range(path: &str, reason: String) -> PropertyError {
    PropertyError::OutOfRange {
        path: path.to_string(),
        reason,
    }
}

fn non_negative(path: &str, n: f32) -> Result<f32, PropertyError> {
    if n < 0.0 {
        return Err(out_of_range(path, format!("{n} is negative")));
    }
    Ok(n)
}

impl Element {
    /// Read the property at `path`.
    pub fn get_property(&self, path: &str) -> Result<PropertyValue, PropertyError> {
        use PropertyValue as V;
        let value = match path {
            "x" => V::Number(self.bounds.x),
            "y" => V::Number(self.bounds.y),
            "w" => V::Number(self.bounds.w),
            "h" => V::Number(self.bounds.h),
            "rotation" => V::Number(self.rotation),
            "z" => V::Number(self.z_index as f32),
            "style.fontSize" => V::Number(self.style.font_size),
            "style.fontWeight" => V::Number(f32::from(self.style.font_weight)),
            "style.color" => V::Text(self.style.color.clone()),
            "style.background" => self.style.background.clone().into(),
            "style.align" => V::Text(self.style.align.as_str().to_string()),
            "style.opacity" => V::Number(self.style.opacity),
            _ => return self.kind_property(path),
        };
        Ok(value)
    }

    fn kind_property(&self, path: &str) -> Result<PropertyValue, PropertyError> {
        use PropertyValue as V;
        let value = match (&self.kind, path) {
            (ElementKind::Label { text }, "text") => V::Text(text.clone()),
            (ElementKind::Image { src, .. }, "src") => V::Text(src.clone()),
            (ElementKind::Image { alt, .. }, "alt") => V::Text(alt.clone()),
            (ElementKind::TextField { placeholder, .. }, "placeholder") => {
                V::Text(placeholder.clone())
            }
            (ElementKind::TextField { value, .. }, "value") => V::Text(value.clone()),
            (ElementKind::TextField { multiline, .. }, "multiline") => V::Bool(*multiline),
            (ElementKind::Checkbox { label, .. }, "label") => V::Text(label.clone()),
            (ElementKind::Checkbox { checked, .. }, "checked") => V::Bool(*checked),
            (ElementKind::RadioGroup { name, .. }, "name") => V::Text(name.clone()),
            (ElementKind::RadioGroup { options, .. }, "options") => {
                V::List(options.iter().cloned().collect())
            }
            (ElementKind::RadioGroup { selected, .. }, "selected") => match selected {
                Some(i) => V::Number(*i as f32),
                None => V::Null,
            },
            _ => return Err(self.unknown(path)),
        };
        Ok(value)
    }

    /// Write `value` to the property at `path`.
    ///
    /// # Errors
    /// Unknown paths, mismatched value types and out-of-range values are
    /// rejected before anything is written.
    pub fn set_property(&mut self, path: &str, value: PropertyValue) -> Result<(), PropertyError> {
        match path {
            "x" => self.bounds.x = value.into_number(path)?,
            "y" => self.bounds.y = value.into_number(path)?,
            "w" => self.bounds.w = non_negative(path, value.into_number(path)?)?,
            "h" => self.bounds.h = non_negative(path, value.into_number(path)?)?,
            "rotation" => self.rotation = value.into_number(path)?,
            "z" => {
                let z = value.into_integer(path)?;
                self.z_index = i32::try_from(z)
                    .map_err(|_| out_of_range(path, format!("{z} overflows z-order")))?;
            }
            "style.fontSize" => {
                let size = value.into_number(path)?;
                if size <= 0.0 {
                    return Err(out_of_range(path, format!("{size} is not positive")));
                }
                self.style.font_size = size;
            }
            "style.fontWeight" => {
                let weight = value.into_integer(path)?;
                if !(100..=900).contains(&weight) {
                    return Err(out_of_range(path, format!("{weight} not in 100..=900")));
                }
                self.style.font_weight = weight as u16;
            }
            "style.color" => self.style.color = value.into_text(path)?,
            "style.background" => self.style.background = value.into_optional_text(path)?,
            "style.align" => {
                let raw = value.into_text(path)?;
                self.style.align = TextAlign::parse(&raw)
                    .ok_or_else(|| out_of_range(path, format!("'{raw}' is not an alignment")))?;
            }
            "style.opacity" => {
                let opacity = value.into_number(path)?;
                if !(0.0..=1.0).contains(&opacity) {
                    return Err(out_of_range(path, format!("{opacity} not in 0..=1")));
                }
                self.style.opacity = opacity;
            }
            _ => return self.set_kind_property(path, value),
        }
        Ok(())
    }

    fn set_kind_property(&mut self, path: &str, value: PropertyValue) -> Result<(), PropertyError> {
        let unknown = self.unknown(path);
        match (&mut self.kind, path) {
            (ElementKind::Label { text }, "text") => *text = value.into_text(path)?,
            (ElementKind::Image { src, .. }, "src") => *src = value.into_text(path)?,
            (ElementKind::Image { alt, .. }, "alt") => *alt = value.into_text(path)?,
            (ElementKind::TextField { placeholder, .. }, "placeholder") => {
                *placeholder = value.into_text(path)?
            }
            (ElementKind::TextField { value: current, .. }, "value") => {
                *current = value.into_text(path)?
            }
            (ElementKind::TextField { multiline, .. }, "multiline") => {
                *multiline = value.into_bool(path)?
            }
            (ElementKind::Checkbox { label, .. }, "label") => *label = value.into_text(path)?,
            (ElementKind::Checkbox { checked, .. }, "checked") => {
                *checked = value.into_bool(path)?
            }
            (ElementKind::RadioGroup { name, .. }, "name") => *name = value.into_text(path)?,
            (ElementKind::RadioGroup { options, selected, .. }, "options") => {
                let items = value.into_list(path)?;
                if let Some(i) = *selected
                    && i >= items.len()
                {
                    return Err(out_of_range(
                        path,
                        format!("selected option {i} would no longer exist"),
                    ));
                }
                *options = items.into_iter().collect();
            }
            (ElementKind::RadioGroup { options, selected, .. }, "selected") => {
                let index = value.into_optional_index(path)?;
                if let Some(i) = index
                    && i >= options.len()
                {
                    return Err(out_of_range(
                        path,
                        format!("{i} exceeds {} options", options.len()),
                    ));
                }
                *selected = index;
            }
            _ => return Err(unknown),
        }
        Ok(())
    }

    fn unknown(&self, path: &str) -> PropertyError {
        PropertyError::UnknownPath {
            path: path.to_string(),
            kind: self.kind.type_name(),
        }
    }
}
