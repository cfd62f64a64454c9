use crate::annotation::{self, Annotation, PageFrame};
use crate::geometry::PageSize;
use crate::metadata::{resolve, DocumentMetadata};
use crate::{AnnotationError, DocumentOpenError, PageOutOfRange, PersistError};
use lopdf::{Dictionary, Document, IncrementalDocument, Object, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::Path;

const ENCRYPT_MARKER: &[u8] = b"/Encrypt";

/// Guards against cyclic `/Parent` chains when resolving inherited attributes.
const MAX_INHERITANCE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// Append changed objects after the existing bytes.
    #[default]
    Incremental,
    /// Rewrite the whole file.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReport {
    pub mode: SaveMode,
    pub bytes_written: usize,
    pub objects_written: usize,
}

/// Identifies an annotation added in the current editing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnnotationHandle {
    pub page: u32,
    id: ObjectId,
}

/// An open PDF document with its pending annotation changes.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    inner: Document,
    page_ids: Vec<ObjectId>,
    encryption: Option<String>,
    /// Bytes of the last persisted state, the base for incremental updates.
    baseline: Vec<u8>,
    changed: BTreeSet<ObjectId>,
    /// Unsaved annotations and the object holding the `/Annots` entry for each.
    added: BTreeMap<ObjectId, ObjectId>,
}

impl PdfDocument {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DocumentOpenError> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .map_err(|source| DocumentOpenError::Unreadable { path: path.to_path_buf(), source })?;

        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, DocumentOpenError> {
        let inner = match Document::load_mem(&bytes) {
            Ok(document) => document,
            // The marker only picks the error for files lopdf cannot parse.
            Err(err) if bytes.windows(ENCRYPT_MARKER.len()).any(|window| window == ENCRYPT_MARKER) => {
                return Err(DocumentOpenError::UnsupportedEncryption(err.to_string()))
            }
            Err(err) => return Err(DocumentOpenError::Malformed(err)),
        };

        let encryption = inner.trailer.has(b"Encrypt").then(|| encryption_filter(&inner));
        if let Some(filter) = &encryption {
            log::warn!("document is encrypted ({filter}); annotations cannot be saved");
        }

        let page_ids: Vec<ObjectId> = inner.get_pages().into_values().collect();
        log::debug!("opened PDF {} with {} pages", inner.version, page_ids.len());

        Ok(Self {
            inner,
            page_ids,
            encryption,
            baseline: bytes,
            changed: BTreeSet::new(),
            added: BTreeMap::new(),
        })
    }

    pub fn page_count(&self) -> u32 {
        self.page_ids.len() as u32
    }

    /// Name of the security handler when the file carries an `/Encrypt`
    /// dictionary.
    pub fn encryption(&self) -> Option<&str> {
        self.encryption.as_deref()
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }

    /// True when annotations were added since opening or the last save.
    pub fn is_modified(&self) -> bool {
        !self.changed.is_empty()
    }

    pub fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata::read(&self.inner, self.encryption.as_deref())
    }

    pub fn page_size(&self, page: u32) -> Result<PageSize, PageOutOfRange> {
        let page_id = self.page_id(page)?;
        Ok(self.media_box(page_id).map_or(PageSize::LETTER, |[x0, y0, x1, y1]| PageSize {
            width_pt: (x1 - x0).abs(),
            height_pt: (y1 - y0).abs(),
        }))
    }

    /// Annotations of a page in storage order.
    pub fn annotations(&self, page: u32) -> Result<Vec<Annotation>, PageOutOfRange> {
        let page_id = self.page_id(page)?;
        let frame = self.frame(page_id);

        let Some(items) = self.annots_array(page_id) else {
            return Ok(Vec::new());
        };

        Ok(items
            .iter()
            .filter_map(|item| resolve(&self.inner, item))
            .filter_map(|item| item.as_dict().ok())
            .filter_map(|dict| annotation::from_dictionary(&self.inner, dict, &frame))
            .collect())
    }

    /// Bodies of the text annotations on a page, in storage order.
    pub fn annotation_texts(&self, page: u32) -> Result<Vec<String>, PageOutOfRange> {
        Ok(self
            .annotations(page)?
            .iter()
            .filter_map(|annotation| annotation.text().map(str::to_owned))
            .collect())
    }

    /// Adds an annotation to a page. `icon_size` sizes the anchor rectangle of
    /// comments and text notes.
    pub fn add_annotation(
        &mut self,
        page: u32,
        annotation: &Annotation,
        icon_size: f32,
    ) -> Result<AnnotationHandle, AnnotationError> {
        let page_id = self.page_id(page)?;
        let frame = self.frame(page_id);

        let dict = annotation::to_dictionary(annotation, &frame, page_id, icon_size);
        let annot_id = self.inner.add_object(Object::Dictionary(dict));

        let holder = match self.attach(page_id, annot_id) {
            Ok(holder) => holder,
            Err(err) => {
                self.inner.objects.remove(&annot_id);
                return Err(AnnotationError::Structure(err));
            }
        };

        self.changed.insert(annot_id);
        self.changed.insert(holder);
        self.added.insert(annot_id, holder);
        log::debug!("added {:?} annotation {:?} to page {page}", annotation.kind(), annot_id);

        Ok(AnnotationHandle { page, id: annot_id })
    }

    /// Undoes an [`PdfDocument::add_annotation`] that has not been saved yet.
    pub fn revert_annotation(&mut self, handle: AnnotationHandle) -> Result<(), AnnotationError> {
        let Some(holder) = self.added.remove(&handle.id) else {
            return Err(AnnotationError::NotRevertible);
        };

        let page_id = self.page_id(handle.page)?;
        let is_handle = |item: &Object| matches!(item, Object::Reference(id) if *id == handle.id);

        let annots = self.inner.get_dictionary(page_id)?.get(b"Annots").ok().cloned();
        match annots {
            Some(Object::Reference(array_id)) => {
                self.inner.get_object_mut(array_id)?.as_array_mut()?.retain(|item| !is_handle(item));
            }
            _ => {
                if let Ok(Object::Array(items)) =
                    self.inner.get_dictionary_mut(page_id)?.get_mut(b"Annots")
                {
                    items.retain(|item| !is_handle(item));
                }
            }
        }

        self.inner.objects.remove(&handle.id);
        self.changed.remove(&handle.id);
        if !self.added.values().any(|other| *other == holder) {
            self.changed.remove(&holder);
        }
        Ok(())
    }

    /// Writes the document to `path`.
    ///
    /// Encrypted documents are refused before anything is written. The bytes
    /// go to a temporary file next to `path` that is renamed over it, so a
    /// failed save leaves the destination as it was.
    pub fn save(&mut self, path: impl AsRef<Path>, mode: SaveMode) -> Result<SaveReport, PersistError> {
        let path = path.as_ref();

        if let Some(filter) = &self.encryption {
            return Err(PersistError::EncryptionConflict { filter: filter.clone() });
        }

        // Without a cross-reference offset there is no section to chain onto.
        let incremental = match mode {
            SaveMode::Incremental if self.inner.xref_start == 0 => {
                log::warn!("no cross-reference offset found; falling back to a full rewrite");
                false
            }
            SaveMode::Incremental => true,
            SaveMode::Full => false,
        };

        let (bytes, report) = if !incremental {
            let bytes = self.to_bytes()?;
            let report = SaveReport {
                mode: SaveMode::Full,
                bytes_written: bytes.len(),
                objects_written: self.inner.objects.len(),
            };
            (bytes, report)
        } else if self.changed.is_empty() {
            let report = SaveReport { mode: SaveMode::Incremental, bytes_written: 0, objects_written: 0 };
            (self.baseline.clone(), report)
        } else {
            let (bytes, objects_written) = self.incremental_update()?;
            let report = SaveReport {
                mode: SaveMode::Incremental,
                bytes_written: bytes.len() - self.baseline.len(),
                objects_written,
            };
            (bytes, report)
        };

        write_atomically(path, &bytes)?;
        log::info!(
            "saved {} ({:?}, {} objects, {} bytes)",
            path.display(),
            report.mode,
            report.objects_written,
            report.bytes_written
        );

        // Reload so the next update chains onto the section just written.
        let reloaded = Document::load_mem(&bytes).map_err(|err| {
            PersistError::Serialize(format!("saved file cannot be read back: {err}"))
        })?;
        self.page_ids = reloaded.get_pages().into_values().collect();
        self.inner = reloaded;
        self.baseline = bytes;
        self.changed.clear();
        self.added.clear();

        Ok(report)
    }

    /// The last persisted bytes followed by an update section holding every
    /// changed object. Returns the new file and the number of objects written.
    fn incremental_update(&self) -> Result<(Vec<u8>, usize), PersistError> {
        let mut update = IncrementalDocument::create_from(self.baseline.clone(), self.inner.clone());
        for &id in &self.changed {
            update
                .opt_clone_object_to_new_document(id)
                .map_err(|err| PersistError::Serialize(format!("object {} {}: {err}", id.0, id.1)))?;
        }

        let objects_written = update.new_document.objects.len();
        let mut bytes = Vec::with_capacity(self.baseline.len() + objects_written * 256);
        update.save_to(&mut bytes).map_err(|err| PersistError::Serialize(err.to_string()))?;
        Ok((bytes, objects_written))
    }

    /// Serializes the current state, pending annotations included.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistError> {
        let mut copy = self.inner.clone();
        let mut bytes = Vec::new();
        copy.save_to(&mut bytes).map_err(|err| PersistError::Serialize(err.to_string()))?;
        Ok(bytes)
    }

    fn page_id(&self, page: u32) -> Result<ObjectId, PageOutOfRange> {
        self.page_ids
            .get(page as usize)
            .copied()
            .ok_or(PageOutOfRange { page, page_count: self.page_count() })
    }

    /// MediaBox as `[x0, y0, x1, y1]`, following `/Parent` inheritance.
    fn media_box(&self, page_id: ObjectId) -> Option<[f32; 4]> {
        let mut dict = self.inner.get_dictionary(page_id).ok()?;

        for _ in 0..MAX_INHERITANCE_DEPTH {
            if let Some(media_box) =
                dict.get(b"MediaBox").ok().and_then(|object| annotation::numbers::<4>(&self.inner, object))
            {
                return Some(media_box);
            }

            let parent = dict.get(b"Parent").ok().and_then(|object| object.as_reference().ok())?;
            dict = self.inner.get_dictionary(parent).ok()?;
        }

        None
    }

    fn frame(&self, page_id: ObjectId) -> PageFrame {
        match self.media_box(page_id) {
            Some([x0, y0, x1, y1]) => PageFrame { left: x0.min(x1), top: y0.max(y1) },
            None => PageFrame { left: 0.0, top: PageSize::LETTER.height_pt },
        }
    }

    fn annots_array(&self, page_id: ObjectId) -> Option<&Vec<Object>> {
        let dict: &Dictionary = self.inner.get_dictionary(page_id).ok()?;
        resolve(&self.inner, dict.get(b"Annots").ok()?)?.as_array().ok()
    }

    /// Appends a reference to `annot_id` to the page's `/Annots` array and
    /// returns the id of the object that now holds the modified array.
    fn attach(&mut self, page_id: ObjectId, annot_id: ObjectId) -> Result<ObjectId, lopdf::Error> {
        let annots = self.inner.get_dictionary(page_id)?.get(b"Annots").ok().cloned();

        if let Some(Object::Reference(array_id)) = annots {
            self.inner.get_object_mut(array_id)?.as_array_mut()?.push(Object::Reference(annot_id));
            return Ok(array_id);
        }

        let page = self.inner.get_dictionary_mut(page_id)?;
        match page.get_mut(b"Annots") {
            Ok(Object::Array(items)) => items.push(Object::Reference(annot_id)),
            _ => page.set("Annots", Object::Array(vec![Object::Reference(annot_id)])),
        }

        Ok(page_id)
    }
}

fn encryption_filter(document: &Document) -> String {
    document
        .trailer
        .get(b"Encrypt")
        .ok()
        .and_then(|object| resolve(document, object))
        .and_then(|object| object.as_dict().ok())
        .and_then(|dict| dict.get(b"Filter").ok())
        .and_then(|object| match object {
            Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
            _ => None,
        })
        .unwrap_or_else(|| "unknown".to_owned())
}

fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let directory = path.parent().filter(|parent| !parent.as_os_str().is_empty()).unwrap_or(Path::new("."));

    let mut temp = tempfile::NamedTempFile::new_in(directory)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;

    if let Ok(existing) = fs::metadata(path) {
        temp.as_file().set_permissions(existing.permissions())?;
    }

    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
