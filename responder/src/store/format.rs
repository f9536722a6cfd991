//! The line-oriented template file format.
//!
//! Each record spans three lines:
//!
//! ```text
//! form_id: "abc123"
//! Subject: Thanks for reaching out
//! Body: Hi {first_name},<br>we got your submission.
//! ```
//!
//! Parsing is lenient: unknown lines are ignored and incomplete records are
//! skipped. When a form id appears more than once the last complete record
//! wins, and updates target that same record.

use super::types::{TemplateRecord, UpsertOutcome};

const FORM_ID_KEY: &str = "form_id:";
const SUBJECT_KEY: &str = "Subject:";
const BODY_KEY: &str = "Body:";

#[derive(Default)]
struct PendingRecord {
    form_id: String,
    subject: Option<String>,
    body: Option<String>,
}

impl PendingRecord {
    fn finish(self) -> Option<TemplateRecord> {
        let subject = self.subject.filter(|s| !s.is_empty())?;
        let body = self.body.filter(|s| !s.is_empty())?;
        if self.form_id.is_empty() {
            return None;
        }

        Some(TemplateRecord {
            form_id: self.form_id,
            subject,
            body,
        })
    }
}

/// Parse every complete record in file order.
pub fn parse_records(content: &str) -> Vec<TemplateRecord> {
    let mut records = Vec::new();
    let mut current: Option<PendingRecord> = None;

    for line in content.lines() {
        let line = line.trim_start();

        if let Some(value) = line.strip_prefix(FORM_ID_KEY) {
            if let Some(record) = current.take().and_then(PendingRecord::finish) {
                records.push(record);
            }
            current = Some(PendingRecord {
                form_id: unquote(value).to_string(),
                ..Default::default()
            });
        } else if let Some(value) = line.strip_prefix(SUBJECT_KEY) {
            if let Some(pending) = current.as_mut() {
                pending.subject = Some(value.trim().to_string());
            }
        } else if let Some(value) = line.strip_prefix(BODY_KEY) {
            if let Some(pending) = current.as_mut() {
                pending.body = Some(value.trim().to_string());
            }
        }
    }

    if let Some(record) = current.and_then(PendingRecord::finish) {
        records.push(record);
    }

    records
}

/// Find the last complete record for `form_id`.
pub fn find_record(content: &str, form_id: &str) -> Option<TemplateRecord> {
    parse_records(content)
        .into_iter()
        .rev()
        .find(|record| record.form_id == form_id)
}

/// Apply an update-in-place-or-append to the file contents.
///
/// Lines not belonging to the updated record are kept byte for byte,
/// including their line endings.
pub fn apply_upsert(content: &str, record: &TemplateRecord) -> (String, UpsertOutcome) {
    let mut lines: Vec<String> = content.split_inclusive('\n').map(String::from).collect();

    let existing = lines.iter().enumerate().rev().find_map(|(idx, line)| {
        let value = line_text(line).trim_start().strip_prefix(FORM_ID_KEY)?;
        (unquote(value) == record.form_id).then_some(idx)
    });

    let subject_line = format!("{} {}", SUBJECT_KEY, record.subject);
    let body_line = format!("{} {}", BODY_KEY, record.body);

    let Some(start) = existing else {
        if let Some(last) = lines.last_mut() {
            if !last.ends_with('\n') {
                last.push('\n');
            }
        }
        lines.push(format!("{} \"{}\"\n", FORM_ID_KEY, record.form_id));
        lines.push(format!("{subject_line}\n"));
        lines.push(format!("{body_line}\n"));
        return (lines.concat(), UpsertOutcome::Created);
    };

    let end = lines
        .iter()
        .enumerate()
        .skip(start + 1)
        .find(|(_, line)| line_text(line).trim_start().starts_with(FORM_ID_KEY))
        .map(|(idx, _)| idx)
        .unwrap_or(lines.len());

    let last_in_block = |lines: &[String], key: &str| {
        (start + 1..end)
            .rev()
            .find(|&idx| line_text(&lines[idx]).trim_start().starts_with(key))
    };
    let subject_idx = last_in_block(&lines, SUBJECT_KEY);
    let mut body_idx = last_in_block(&lines, BODY_KEY);

    let subject_at = match subject_idx {
        Some(idx) => {
            replace_line(&mut lines, idx, &subject_line);
            idx
        }
        None => {
            insert_after(&mut lines, start, &subject_line);
            if let Some(idx) = body_idx.as_mut() {
                *idx += 1;
            }
            start + 1
        }
    };

    match body_idx {
        Some(idx) => replace_line(&mut lines, idx, &body_line),
        None => insert_after(&mut lines, subject_at, &body_line),
    }

    (lines.concat(), UpsertOutcome::Updated)
}

/// Strip surrounding whitespace and one pair of double quotes.
fn unquote(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn line_text(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

fn replace_line(lines: &mut [String], idx: usize, text: &str) {
    let ending = lines[idx][line_text(&lines[idx]).len()..].to_string();
    lines[idx] = format!("{text}{ending}");
}

fn insert_after(lines: &mut Vec<String>, idx: usize, text: &str) {
    if !lines[idx].ends_with('\n') {
        lines[idx].push('\n');
    }
    lines.insert(idx + 1, format!("{text}\n"));
}
