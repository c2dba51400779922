use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, warn};

use super::{ExtractedDocument, FormatExtractor};
use crate::error::ExtractError;

/// Page text plus `/URI` targets of link annotations.
pub struct PdfExtractor;

impl FormatExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedDocument, ExtractError> {
        let doc = Document::load(path)?;
        let mut text = String::new();
        let mut links = Vec::new();

        for (page_no, page_id) in doc.get_pages() {
            match doc.extract_text(&[page_no]) {
                Ok(t) => text.push_str(&t),
                Err(e) => warn!("Skipping text of page {}: {}", page_no, e),
            }
            links.extend(page_uris(&doc, page_id));
        }

        debug!(pages = doc.get_pages().len(), links = links.len(), "pdf extracted");
        Ok(ExtractedDocument::new(text, links))
    }
}

/// URIs of the page's link annotations, in annotation order.
fn page_uris(doc: &Document, page_id: ObjectId) -> Vec<String> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    let Some(annots) = page
        .get(b"Annots")
        .ok()
        .and_then(|o| doc.dereference(o).ok())
        .and_then(|(_, o)| o.as_array().ok())
    else {
        return Vec::new();
    };

    annots
        .iter()
        .filter_map(|annot| resolve_dict(doc, annot))
        .filter_map(|annot| annot.get(b"A").ok())
        .filter_map(|action| resolve_dict(doc, action))
        .filter_map(|action| action.get(b"URI").ok())
        .filter_map(|uri| doc.dereference(uri).ok())
        .filter_map(|(_, uri)| uri.as_str().ok())
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .filter(|uri| !uri.is_empty())
        .collect()
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    doc.dereference(obj).ok()?.1.as_dict().ok()
}
