//! Route handlers, grouped by resource.

pub mod fumigations;
pub mod harvests;
pub mod products;
pub mod records;
pub mod reports;
pub mod system;
pub mod transfers;

use common::DocumentId;

/// Turns a path segment into a document id.
pub(crate) fn document_id(id: String) -> DocumentId {
    DocumentId::new(id)
}
