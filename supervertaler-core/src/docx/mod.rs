//! DOCX import/export and the tracked-change-aware extraction it shares
//! with [`crate::tracked_changes`].

pub mod codec;
pub mod collect_text;
pub mod xml_tree;

pub use codec::{DocxCodec, DocxParagraphInfo, RunInfo};
pub use collect_text::{collect_text, tidy_text, ExtractMode};
