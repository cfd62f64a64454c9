//! Document information dictionary and PDF text strings.

use lopdf::{decode_text_string, Document, Object};
use serde::Serialize;

/// The standard metadata fields. Missing entries are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub producer: String,
    pub format: String,
    pub encryption: String,
    pub author: String,
    pub mod_date: String,
    pub keywords: String,
    pub title: String,
    pub creation_date: String,
    pub creator: String,
    pub subject: String,
}

impl DocumentMetadata {
    pub const FIELD_NAMES: [&'static str; 10] = [
        "producer",
        "format",
        "encryption",
        "author",
        "modDate",
        "keywords",
        "title",
        "creationDate",
        "creator",
        "subject",
    ];

    /// Field name/value pairs in display order.
    pub fn fields(&self) -> [(&'static str, &str); 10] {
        [
            ("producer", &self.producer),
            ("format", &self.format),
            ("encryption", &self.encryption),
            ("author", &self.author),
            ("modDate", &self.mod_date),
            ("keywords", &self.keywords),
            ("title", &self.title),
            ("creationDate", &self.creation_date),
            ("creator", &self.creator),
            ("subject", &self.subject),
        ]
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields().into_iter().find(|(name, _)| *name == field).map(|(_, value)| value)
    }

    pub(crate) fn read(document: &Document, encryption: Option<&str>) -> Self {
        let info = document
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|object| resolve(document, object))
            .and_then(|object| object.as_dict().ok());

        let entry = |key: &[u8]| {
            info.and_then(|dict| dict.get(key).ok())
                .and_then(|object| resolve(document, object))
                .and_then(text_of)
                .unwrap_or_default()
        };

        Self {
            producer: entry(b"Producer"),
            format: format!("PDF {}", document.version),
            encryption: encryption.unwrap_or_default().to_owned(),
            author: entry(b"Author"),
            mod_date: entry(b"ModDate"),
            keywords: entry(b"Keywords"),
            title: entry(b"Title"),
            creation_date: entry(b"CreationDate"),
            creator: entry(b"Creator"),
            subject: entry(b"Subject"),
        }
    }
}

/// Follows a single level of indirection.
pub(crate) fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Reads a text string object, `None` for non-string objects.
pub(crate) fn text_of(object: &Object) -> Option<String> {
    match object {
        Object::String(bytes, _) => {
            let text = decode_text_string(object)
                .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned());
            Some(text.trim_start_matches('\u{feff}').to_owned())
        }
        Object::Name(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}
