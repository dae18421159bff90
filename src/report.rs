//! Writers for the files produced by `evaluate`.

use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::definition::Question;
use crate::interpret::{FormStatus, SurveyResult};
use crate::statistics::QuestionStatistics;

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn write_csv_row<W: Write>(writer: &mut W, fields: impl IntoIterator<Item = String>) -> io::Result<()> {
    let row = fields
        .into_iter()
        .map(|f| csv_field(&f))
        .collect::<Vec<String>>();
    writeln!(writer, "{}", row.join(","))
}

/// Writes one row per resolved form, with a header row of question titles.
pub fn write_answers_csv<W: Write>(
    writer: &mut W,
    questions: &[Question],
    result: &SurveyResult,
) -> io::Result<()> {
    write_csv_row(writer, questions.iter().map(|q| q.title.clone()))?;
    for (_, answers) in result.resolved() {
        write_csv_row(writer, answers.answers.iter().map(|a| a.to_string()))?;
    }
    Ok(())
}

pub fn write_statistics_json<W: Write>(writer: &mut W, statistics: &[QuestionStatistics]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, statistics)?;
    writeln!(writer)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorEntry {
    Question { question: String, message: String },
    Unreadable { unreadable: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormErrors {
    pub file: String,
    pub errors: Vec<ErrorEntry>,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

/// Collects, per form, the questions with issues and forms that could not be
/// read at all. Forms without any problem are left out.
pub fn error_log(questions: &[Question], result: &SurveyResult) -> Vec<FormErrors> {
    result
        .forms
        .iter()
        .filter_map(|form| {
            let errors = match &form.status {
                FormStatus::Unreadable(e) => vec![ErrorEntry::Unreadable {
                    unreadable: e.to_string(),
                }],
                FormStatus::Resolved(answers) => answers
                    .issues
                    .iter()
                    .map(|(i, issue)| ErrorEntry::Question {
                        question: questions
                            .get(*i)
                            .map_or_else(|| i.to_string(), |q| q.title.clone()),
                        message: issue.to_string(),
                    })
                    .collect(),
            };
            (!errors.is_empty()).then(|| FormErrors {
                file: file_name(&form.path),
                errors,
            })
        })
        .collect()
}

pub fn write_error_log_json<W: Write>(
    writer: &mut W,
    questions: &[Question],
    result: &SurveyResult,
) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, &error_log(questions, result))?;
    writeln!(writer)
}
