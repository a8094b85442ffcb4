//! Prompts for the tariff extraction request.
//!
//! Every prompt lives here so wording changes touch one file and unit tests
//! can inspect the exact text sent to the model. Callers can replace the
//! system prompt via [`crate::config::ExtractionConfig::system_prompt`]; the
//! user prompt is always built by [`extraction_prompt`].

use once_cell::sync::Lazy;

/// Currency assumed when the source document does not state one.
pub const DEFAULT_CURRENCY: &str = "INR";

/// Default system prompt for the extraction request.
pub const SYSTEM_PROMPT: &str =
    "You are an expert data extraction assistant. Ensure precise JSON output.";

/// Field instructions placed before the OCR text.
static FIELD_INSTRUCTIONS: Lazy<String> = Lazy::new(|| {
    format!(
        "Extract the following tariff data into structured JSON format. Ensure precise data mapping for:
- Category (Import, Export, General Charges)
- Job Description
- 20Ft Charges
- 40Ft Charges
- Currency ({DEFAULT_CURRENCY} assumed if not specified)

Each job description should be accurate and detailed. Ensure all numerical values are captured correctly. Avoid summarization."
    )
});

/// Build the user prompt: field instructions followed by the raw OCR text.
///
/// The text is appended verbatim; OCR noise is left for the model to read
/// around rather than cleaned here.
pub fn extraction_prompt(extracted_text: &str) -> String {
    format!("{}\n\nData:\n{extracted_text}", *FIELD_INSTRUCTIONS)
}
