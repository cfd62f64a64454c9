//! Annotation model and its mapping onto PDF annotation dictionaries.
//!
//! Highlights are stored as `/Highlight` annotations with `/QuadPoints` and a
//! stroke colour `/C`. Comments and text notes are both `/Text` annotations;
//! the icon name (`/Comment` or `/Note`) keeps the two kinds apart.

use crate::geometry::{PagePoint, PageRect, RgbColor};
use crate::metadata::{resolve, text_of};
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::Serialize;

const COMMENT_ICON: &[u8] = b"Comment";
const NOTE_ICON: &[u8] = b"Note";

/// Annotation flag bit 3 (Print).
const FLAG_PRINT: i64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Highlight,
    Comment,
    TextNote,
    Other,
}

/// An annotation attached to a page, in document space.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Annotation {
    Highlight { rect: PageRect, color: RgbColor },
    Comment { point: PagePoint, text: String },
    TextNote { point: PagePoint, text: String },
    /// Any annotation subtype this crate does not create, surfaced read-only.
    Other { subtype: String, rect: PageRect, text: Option<String> },
}

impl Annotation {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Annotation::Highlight { .. } => AnnotationKind::Highlight,
            Annotation::Comment { .. } => AnnotationKind::Comment,
            Annotation::TextNote { .. } => AnnotationKind::TextNote,
            Annotation::Other { .. } => AnnotationKind::Other,
        }
    }

    /// Text body of point-anchored text annotations.
    pub fn text(&self) -> Option<&str> {
        match self {
            Annotation::Comment { text, .. } | Annotation::TextNote { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Maps document space onto PDF user space for one page.
///
/// PDF user space has its origin at the bottom-left of the MediaBox with y
/// growing upward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PageFrame {
    pub left: f32,
    pub top: f32,
}

impl PageFrame {
    pub fn to_user_space(&self, rect: &PageRect) -> [f32; 4] {
        [self.left + rect.x0, self.top - rect.y1, self.left + rect.x1, self.top - rect.y0]
    }

    pub fn from_user_space(&self, rect: [f32; 4]) -> PageRect {
        PageRect::new(rect[0] - self.left, self.top - rect[3], rect[2] - self.left, self.top - rect[1])
    }
}

fn reals(values: &[f32]) -> Object {
    Object::Array(values.iter().map(|value| Object::Real(*value)).collect())
}

/// Builds the annotation dictionary for a new annotation on `page_id`.
///
/// `icon_size` is the side length, in points, of the rectangle anchored at
/// the point of comments and text notes.
pub(crate) fn to_dictionary(
    annotation: &Annotation,
    frame: &PageFrame,
    page_id: ObjectId,
    icon_size: f32,
) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"Annot".to_vec()));
    dict.set("P", Object::Reference(page_id));
    dict.set("F", Object::Integer(FLAG_PRINT));

    match annotation {
        Annotation::Highlight { rect, color } => {
            let [x0, y0, x1, y1] = frame.to_user_space(rect);
            dict.set("Subtype", Object::Name(b"Highlight".to_vec()));
            dict.set("Rect", reals(&[x0, y0, x1, y1]));
            dict.set("QuadPoints", reals(&[x0, y1, x1, y1, x0, y0, x1, y0]));
            dict.set("C", reals(&color.normalized()));
        }
        Annotation::Comment { point, text } | Annotation::TextNote { point, text } => {
            let icon = if matches!(annotation, Annotation::Comment { .. }) {
                COMMENT_ICON
            } else {
                NOTE_ICON
            };
            let anchor = PageRect::new(point.x, point.y, point.x + icon_size, point.y + icon_size);

            dict.set("Subtype", Object::Name(b"Text".to_vec()));
            dict.set("Rect", reals(&frame.to_user_space(&anchor)));
            dict.set("Contents", lopdf::text_string(text));
            dict.set("Name", Object::Name(icon.to_vec()));
            dict.set("Open", Object::Boolean(false));
            dict.set("C", reals(&RgbColor::YELLOW.normalized()));
        }
        Annotation::Other { subtype, rect, text } => {
            dict.set("Subtype", Object::Name(subtype.as_bytes().to_vec()));
            dict.set("Rect", reals(&frame.to_user_space(rect)));
            if let Some(text) = text {
                dict.set("Contents", lopdf::text_string(text));
            }
        }
    }

    dict
}

pub(crate) fn number(document: &Document, object: &Object) -> Option<f32> {
    match resolve(document, object)? {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

pub(crate) fn numbers<const N: usize>(document: &Document, object: &Object) -> Option<[f32; N]> {
    let array = resolve(document, object)?.as_array().ok()?;
    if array.len() != N {
        return None;
    }

    let mut out = [0.0; N];
    for (slot, item) in out.iter_mut().zip(array) {
        *slot = number(document, item)?;
    }
    Some(out)
}

/// Reads an annotation dictionary back into the model. Returns `None` when
/// the dictionary has no usable `/Subtype` or `/Rect`.
pub(crate) fn from_dictionary(
    document: &Document,
    dict: &Dictionary,
    frame: &PageFrame,
) -> Option<Annotation> {
    let subtype = match resolve(document, dict.get(b"Subtype").ok()?)? {
        Object::Name(name) => name.clone(),
        _ => return None,
    };
    let rect = frame.from_user_space(numbers::<4>(document, dict.get(b"Rect").ok()?)?);
    let text = dict.get(b"Contents").ok().and_then(|object| resolve(document, object)).and_then(text_of);

    match subtype.as_slice() {
        b"Highlight" => {
            let color = dict
                .get(b"C")
                .ok()
                .and_then(|object| numbers::<3>(document, object))
                .map(RgbColor::from_normalized)
                .unwrap_or(RgbColor::YELLOW);
            Some(Annotation::Highlight { rect, color })
        }
        b"Text" => {
            let icon = dict.get(b"Name").ok().and_then(|object| match resolve(document, object) {
                Some(Object::Name(name)) => Some(name.clone()),
                _ => None,
            });
            let point = PagePoint::new(rect.x0, rect.y0);
            let text = text.unwrap_or_default();

            if icon.as_deref() == Some(COMMENT_ICON) {
                Some(Annotation::Comment { point, text })
            } else {
                Some(Annotation::TextNote { point, text })
            }
        }
        other => Some(Annotation::Other {
            subtype: String::from_utf8_lossy(other).into_owned(),
            rect,
            text,
        }),
    }
}
