//! Pipeline stages for tariff extraction.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the external collaborators (pdfium, tesseract, the
//! model) can be swapped behind their traits.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ ocr ──▶ llm ──▶ parse ──▶ sink
//! (path/URL/  (pdfium)  (tesseract) (chat)  (strict,   (pretty JSON,
//!  upload)                                  recovery)  atomic write)
//! ```
//!
//! 1. [`input`] : canonicalise a path, URL or upload to a local PDF file
//! 2. [`render`]: rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`ocr`]   : OCR each page and join the text; any page failure drops
//!    the whole text
//! 4. [`llm`]   : the single model call, with timeout; the only stage with
//!    network I/O besides URL downloads
//! 5. [`parse`] : strict JSON, then greedy-brace recovery
//! 6. [`sink`]  : write the result as indented JSON

pub mod input;
pub mod llm;
pub mod ocr;
pub mod parse;
pub mod render;
pub mod sink;
