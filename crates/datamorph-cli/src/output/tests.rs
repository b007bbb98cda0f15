// Tests for output formatting
//
// Rendering of mapped documents and validation reports in each output
// format, captured through an in-memory writer.

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

fn writer(format: OutputFormat, quiet: bool) -> (OutputWriter, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let writer = OutputWriter::with_writer(format, false, quiet, Box::new(buffer.clone()));
    (writer, buffer)
}

fn invalid_report() -> ValidationReport {
    ValidationReport {
        valid: false,
        errors: vec!["No field mappings configured".to_string()],
        warnings: vec!["Mapping 'extra' references unknown source 'Z'".to_string()],
        unmapped_required: vec!["link".to_string()],
        unmapped_optional: vec![],
        unknown_source_ids: vec!["Z".to_string()],
    }
}

#[test]
fn test_machine_formats() {
    let document = json!([{"title": "A0"}]);
    assert_eq!(OutputFormat::Json.format(&document).unwrap(), "[{\"title\":\"A0\"}]");
    assert_eq!(OutputFormat::Yaml.format(&document).unwrap(), "- title: A0\n");
}

#[test]
fn test_human_report_lists_every_problem() {
    let rendered = OutputFormat::Human
        .format_validation_report(&invalid_report())
        .unwrap();

    assert!(rendered.starts_with("✗ Mapping configuration is invalid"));
    assert!(rendered.contains("Errors (1):\n  • No field mappings configured"));
    assert!(rendered.contains("Unmapped required fields (1):\n  • link"));
    assert!(rendered.contains("Unknown source ids (1):\n  • Z"));
    assert!(!rendered.contains("Unmapped optional fields"));
}

#[test]
fn test_json_report_is_structured() {
    let rendered = OutputFormat::Json
        .format_validation_report(&invalid_report())
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
    assert_eq!(parsed["valid"], json!(false));
    assert_eq!(parsed["unmapped_required"], json!(["link"]));
}

#[test]
fn test_valid_report_is_one_line() {
    let (mut out, buffer) = writer(OutputFormat::Human, false);
    out.validation_report(&ValidationReport { valid: true, ..Default::default() })
        .unwrap();
    assert_eq!(buffer.contents(), "✓ Mapping configuration is valid\n");
}

#[test]
fn test_quiet_suppresses_chatter_but_not_reports() {
    let (mut out, buffer) = writer(OutputFormat::Human, true);
    out.info("Loading").unwrap();
    out.success("Done").unwrap();
    out.validation_report(&ValidationReport { valid: true, ..Default::default() })
        .unwrap();
    assert_eq!(buffer.contents(), "✓ Mapping configuration is valid\n");
}

#[test]
fn test_messages_are_silent_in_machine_formats() {
    let (mut out, buffer) = writer(OutputFormat::JsonPretty, false);
    out.info("Loading").unwrap();
    out.warning("Careful").unwrap();
    assert!(buffer.contents().is_empty());
    assert!(out.spinner("working").is_none());
}
