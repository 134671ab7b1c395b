pub mod batch_item;
pub mod document;
pub mod draft;
pub mod image;
pub mod loaders;
pub mod source_file;

pub use batch_item::{BatchItem, ProcessingState};
pub use document::{DispatchedDetails, Document, DocumentStatus, StatusHistoryEntry};
pub use draft::{parse_letter_date, DocumentDraft, DocumentField, ExtractedFields, IntakeSource};
pub use image::EncodedImage;
pub use loaders::{load_all_source_files, load_source_file};
pub use source_file::{media_type_for, SourceFile, SourceKind};
