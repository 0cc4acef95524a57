//! `parseCsvToJsonArray`: convert a staged CSV file into a JSON array.

use super::{step_names, HandlerDependencies, StepContext, StepHandler};
use crate::cancellation::CancellationToken;
use crate::core::{payload_keys, PipelineEvent, StepOutcome};
use crate::definition::PipelineStep;
use crate::errors::StepError;
use async_trait::async_trait;
use csv::{ReaderBuilder, Trim};
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

/// CSV dialect for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvOptions {
    /// Field separator byte.
    pub delimiter: u8,
    /// Whether the first record names the columns.
    pub has_header: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
        }
    }
}

impl CsvOptions {
    /// Reads `delimiter` (first character; `\t` or `tab` for a tab) and
    /// `hasHeader` from the step. Unparseable values fall back to defaults.
    #[must_use]
    pub fn from_step(step: &PipelineStep) -> Self {
        let delimiter = match step.parameter("delimiter") {
            Some(raw) if raw == "\\t" || raw.eq_ignore_ascii_case("tab") => b'\t',
            Some(raw) => match raw.chars().find(|c| !c.is_whitespace()) {
                Some(c) => u8::try_from(c).ok().filter(u8::is_ascii).unwrap_or_else(|| {
                    warn!(delimiter = %c, "delimiter must be a single ASCII character; using ','");
                    b','
                }),
                None => b',',
            },
            None => b',',
        };
        let has_header = step
            .parameter("hasHeader")
            .and_then(|raw| raw.trim().to_ascii_lowercase().parse::<bool>().ok())
            .unwrap_or(true);
        Self {
            delimiter,
            has_header,
        }
    }
}

/// Parses CSV text into one JSON object per non-blank data record.
///
/// Without a header, columns are named `col1..colN` after the first record's
/// width. Cells beyond the header width are dropped; short rows simply
/// omit the missing columns. Keys keep the column order.
pub fn parse_csv(text: &str, options: &CsvOptions) -> Result<Vec<Map<String, Value>>, csv::Error> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(false)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if headers.is_none() {
            if options.has_header {
                headers = Some(record.iter().map(str::to_string).collect());
                continue;
            }
            headers = Some((1..=record.len()).map(|i| format!("col{i}")).collect());
        }
        let Some(names) = &headers else {
            continue;
        };
        rows.push(
            names
                .iter()
                .zip(record.iter())
                .map(|(name, cell)| (name.clone(), Value::String(cell.to_string())))
                .collect(),
        );
    }
    Ok(rows)
}

/// CSV to JSON conversion step.
pub struct ParseCsvHandler {
    deps: HandlerDependencies,
}

impl ParseCsvHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(deps: HandlerDependencies) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StepHandler for ParseCsvHandler {
    fn step_name(&self) -> &str {
        step_names::PARSE_CSV
    }

    fn enabled(&self) -> bool {
        self.deps.settings.is_handler_enabled(self.step_name())
    }

    async fn handle(
        &self,
        ctx: &StepContext,
        event: &PipelineEvent,
        cancel: &CancellationToken,
    ) -> Result<StepOutcome, StepError> {
        let Some(s3_path) = event.get_non_blank(payload_keys::S3_PATH) else {
            warn!("payload has no s3Path");
            return Ok(StepOutcome::skip("missing s3Path"));
        };

        let options = CsvOptions::from_step(&ctx.step);
        if let Some(encoding) = ctx.step.parameter("encoding") {
            let normalized = encoding.trim().to_ascii_lowercase();
            if !normalized.is_empty() && normalized != "utf-8" && normalized != "utf8" {
                warn!(%encoding, "unsupported encoding; decoding as UTF-8");
            }
        }

        info!(%s3_path, delimiter = ?char::from(options.delimiter), has_header = options.has_header, "parse started");
        let raw = cancel.guard(self.deps.storage.get(s3_path)).await??;
        let text = String::from_utf8_lossy(&raw);
        if text.trim().is_empty() {
            warn!(%s3_path, "csv file is empty");
            return Ok(StepOutcome::skip("empty csv"));
        }

        let rows = parse_csv(&text, &options)?;
        let document = serde_json::to_vec_pretty(&rows)?;
        let parsed_key = format!(
            "{}{}.json",
            self.deps.settings.storage_paths.parsed_prefix,
            Uuid::new_v4().simple()
        );
        cancel.guard(self.deps.storage.put(&parsed_key, document)).await??;

        let next = ctx.next_event(
            event,
            [
                (payload_keys::PARSED_PATH, parsed_key.clone()),
                (payload_keys::ROWS_COUNT, rows.len().to_string()),
                (payload_keys::IS_DUPLICATE, event.is_duplicate().to_string()),
            ],
        );
        cancel.guard(self.deps.bus.publish(next)).await??;

        info!(rows = rows.len(), parsed_path = %parsed_key, duplicate = event.is_duplicate(), "parse completed");
        Ok(StepOutcome::published())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Topic;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rows(text: &str, options: &CsvOptions) -> Value {
        Value::Array(parse_csv(text, options).unwrap().into_iter().map(Value::Object).collect())
    }

    #[test]
    fn test_header_rows() {
        let parsed = rows("id,amount\n1,10\n\n2,20\n", &CsvOptions::default());
        assert_eq!(
            parsed,
            json!([{ "id": "1", "amount": "10" }, { "id": "2", "amount": "20" }])
        );
    }

    #[test]
    fn test_headerless_uses_positional_names() {
        let options = CsvOptions {
            delimiter: b';',
            has_header: false,
        };
        let parsed = rows("a;b\r\nc;d\r\n", &options);
        assert_eq!(
            parsed,
            json!([{ "col1": "a", "col2": "b" }, { "col1": "c", "col2": "d" }])
        );
    }

    #[test]
    fn test_cells_are_trimmed_and_unquoted() {
        let parsed = rows(
            "\u{feff}name , note\n\"Smith\",\"said \"\"hi\"\"\"\n  Jones ,  plain \n",
            &CsvOptions::default(),
        );
        assert_eq!(
            parsed,
            json!([
                { "name": "Smith", "note": "said \"hi\"" },
                { "name": "Jones", "note": "plain" }
            ])
        );
    }

    #[test]
    fn test_quoted_delimiter_stays_in_cell() {
        let parsed = parse_csv("name,amount\n\"Smith, John\",10\n", &CsvOptions::default()).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].get("name"), Some(&json!("Smith, John")));
        assert_eq!(parsed[0].get("amount"), Some(&json!("10")));
    }

    #[test]
    fn test_quoted_line_break_stays_in_cell() {
        let parsed = rows("id,note\n1,\"two\nlines\"\n2,x\n", &CsvOptions::default());
        assert_eq!(
            parsed,
            json!([{ "id": "1", "note": "two\nlines" }, { "id": "2", "note": "x" }])
        );
    }

    #[test]
    fn test_keys_keep_column_order() {
        let parsed = parse_csv("zeta,alpha\n1,2\n", &CsvOptions::default()).unwrap();
        let keys: Vec<_> = parsed[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);

        let document = serde_json::to_string(&parsed).unwrap();
        assert_eq!(document, r#"[{"zeta":"1","alpha":"2"}]"#);
    }

    #[test]
    fn test_ragged_rows() {
        let parsed = rows("a,b\n1\n1,2,3\n", &CsvOptions::default());
        assert_eq!(parsed, json!([{ "a": "1" }, { "a": "1", "b": "2" }]));
    }

    #[test]
    fn test_header_only_and_empty() {
        assert!(parse_csv("id,amount\n", &CsvOptions::default()).unwrap().is_empty());
        assert!(parse_csv("", &CsvOptions::default()).unwrap().is_empty());
        assert!(parse_csv("id\n \n,\n", &CsvOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn test_options_from_step() {
        let step = PipelineStep::new(Topic::new("t").unwrap(), "parseCsvToJsonArray")
            .with_parameter("delimiter", ";;")
            .with_parameter("hasHeader", "False");
        assert_eq!(
            CsvOptions::from_step(&step),
            CsvOptions {
                delimiter: b';',
                has_header: false
            }
        );

        let tab = PipelineStep::new(Topic::new("t").unwrap(), "parseCsvToJsonArray")
            .with_parameter("delimiter", "tab")
            .with_parameter("hasHeader", "maybe");
        assert_eq!(
            CsvOptions::from_step(&tab),
            CsvOptions {
                delimiter: b'\t',
                has_header: true
            }
        );
    }
}
