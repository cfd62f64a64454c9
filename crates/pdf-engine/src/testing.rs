//! Small in-memory PDFs for tests.

use lopdf::xref::XrefType;
use lopdf::{dictionary, Document, Object, StringFormat};

/// Letter-sized document with `pages` empty pages and a title/author.
pub fn sample_pdf(pages: u32) -> Vec<u8> {
    sample_pdf_with(pages, [0.0, 0.0, 612.0, 792.0], false)
}

/// Document whose MediaBox sits on the page tree root when `inherited`,
/// otherwise on every page.
pub fn sample_pdf_with(pages: u32, media_box: [f32; 4], inherited: bool) -> Vec<u8> {
    let mut document = build(pages, media_box, inherited);
    serialize(&mut document)
}

/// Like [`sample_pdf`], indexed by a cross-reference stream instead of a table.
pub fn xref_stream_pdf(pages: u32) -> Vec<u8> {
    let mut document = build(pages, [0.0, 0.0, 612.0, 792.0], false);
    document.reference_table.cross_reference_type = XrefType::CrossReferenceStream;
    serialize(&mut document)
}

/// Single page document carrying an `/Encrypt` dictionary with bogus keys.
pub fn encrypted_pdf() -> Vec<u8> {
    let mut document = build(1, [0.0, 0.0, 612.0, 792.0], false);
    let encrypt_id = document.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "O" => Object::String(vec![0x11; 32], StringFormat::Hexadecimal),
        "U" => Object::String(vec![0x22; 32], StringFormat::Hexadecimal),
        "P" => -4,
    });
    document.trailer.set("Encrypt", Object::Reference(encrypt_id));
    document.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(vec![0x33; 16], StringFormat::Hexadecimal),
            Object::String(vec![0x33; 16], StringFormat::Hexadecimal),
        ]),
    );
    serialize(&mut document)
}

fn media_box_object(media_box: [f32; 4]) -> Object {
    Object::Array(media_box.iter().map(|value| Object::Real(*value)).collect())
}

fn build(pages: u32, media_box: [f32; 4], inherited: bool) -> Document {
    let mut document = Document::with_version("1.7");
    let pages_id = document.new_object_id();

    let mut kids = Vec::new();
    for _ in 0..pages {
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
        };
        if !inherited {
            page.set("MediaBox", media_box_object(media_box));
        }
        kids.push(Object::Reference(document.add_object(page)));
    }

    let mut tree = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => pages as i64,
    };
    if inherited {
        tree.set("MediaBox", media_box_object(media_box));
    }
    document.objects.insert(pages_id, Object::Dictionary(tree));

    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    let info_id = document.add_object(dictionary! {
        "Title" => Object::String(b"Sample".to_vec(), StringFormat::Literal),
        "Author" => Object::String(b"Fixture Author".to_vec(), StringFormat::Literal),
        "Producer" => Object::String(b"pdf-engine fixtures".to_vec(), StringFormat::Literal),
    });

    document.trailer.set("Root", Object::Reference(catalog_id));
    document.trailer.set("Info", Object::Reference(info_id));
    document
}

fn serialize(document: &mut Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    document.save_to(&mut bytes).expect("in-memory fixture should serialize");
    bytes
}
