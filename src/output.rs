//! Output types returned by the extraction runner.

use crate::error::StageFailure;
use crate::prompts::DEFAULT_CURRENCY;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The structured data pulled out of one document.
///
/// The model is not bound to a schema, so this is a generic ordered mapping
/// of string keys to JSON values. Key order is the order the model emitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionResult(Map<String, Value>);

impl ExtractionResult {
    /// An empty result, used whenever a stage came up with nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Best-effort typed view over whatever shape the model returned.
    ///
    /// Walks the whole tree and yields every object that carries a job
    /// description, whether records sit at the top level, in an array, or
    /// under category keys like `"Import"`. When a record has no category of
    /// its own, the nearest enclosing key is used.
    pub fn records(&self) -> Vec<TariffRecord> {
        let mut out = Vec::new();
        for (key, value) in &self.0 {
            collect_records(value, Some(key), &mut out);
        }
        if out.is_empty() {
            if let Some(record) = TariffRecord::from_object(&self.0, None) {
                out.push(record);
            }
        }
        out
    }
}

impl From<Map<String, Value>> for ExtractionResult {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn collect_records(value: &Value, context: Option<&str>, out: &mut Vec<TariffRecord>) {
    match value {
        Value::Object(obj) => {
            if let Some(record) = TariffRecord::from_object(obj, context) {
                out.push(record);
                return;
            }
            for (key, child) in obj {
                collect_records(child, Some(key), out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_records(item, context, out);
            }
        }
        _ => {}
    }
}

/// One tariff line as the model usually reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffRecord {
    pub category: Option<String>,
    pub job_description: String,
    pub charge_20ft: Option<Value>,
    pub charge_40ft: Option<Value>,
    pub currency: String,
}

const DESCRIPTION_KEYS: &[&str] = &["job_description", "Job Description", "description"];
const CATEGORY_KEYS: &[&str] = &["category", "Category"];
const CHARGE_20_KEYS: &[&str] = &["20ft_charges", "20Ft Charges", "20ft", "charge_20ft"];
const CHARGE_40_KEYS: &[&str] = &["40ft_charges", "40Ft Charges", "40ft", "charge_40ft"];
const CURRENCY_KEYS: &[&str] = &["currency", "Currency"];

fn first_of<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k)).filter(|v| !v.is_null())
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl TariffRecord {
    fn from_object(obj: &Map<String, Value>, context: Option<&str>) -> Option<Self> {
        let job_description = first_of(obj, DESCRIPTION_KEYS).map(as_text)?;
        let category = first_of(obj, CATEGORY_KEYS)
            .map(as_text)
            .or_else(|| context.map(str::to_string));
        Some(Self {
            category,
            job_description,
            charge_20ft: first_of(obj, CHARGE_20_KEYS).cloned(),
            charge_40ft: first_of(obj, CHARGE_40_KEYS).cloned(),
            currency: first_of(obj, CURRENCY_KEYS)
                .map(as_text)
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        })
    }
}

/// Which tier of the parser produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// The whole response was valid JSON.
    Strict,
    /// JSON was cut out of surrounding prose.
    Recovered,
}

/// Everything the runner learned about one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// OCR text of all pages, joined and trimmed. Empty if OCR failed.
    pub text: String,
    /// The structured data; empty when `failure` is set.
    pub result: ExtractionResult,
    /// Why `result` is empty, if it is.
    pub failure: Option<StageFailure>,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// Treat any degraded outcome as an error.
    pub fn into_result(self) -> Result<ExtractionResult, StageFailure> {
        match self.failure {
            Some(f) => Err(f),
            None => Ok(self.result),
        }
    }
}

/// Counters and timings for a single run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub page_count: usize,
    pub text_chars: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub parse_mode: Option<ParseMode>,
    pub render_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}
