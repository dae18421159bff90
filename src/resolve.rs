use std::fmt::Display;

use serde::Serialize;

use crate::checkbox::Checkbox;
use crate::definition::{MarkThresholds, Question};

/// Separator between labels when several boxes of a question are marked.
pub const LABEL_SEPARATOR: &str = ", ";

/// The answer given to one question on one form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Answer {
    /// Labels of the marked boxes joined by [`LABEL_SEPARATOR`], empty when
    /// nothing is marked.
    Text(String),
    /// Whether each box of the question is marked, in template order.
    Marks(Vec<bool>),
}

impl Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Answer::Text(text) => write!(f, "{}", text),
            Answer::Marks(marks) => write!(f, "{:?}", marks),
        }
    }
}

/// Something unexpected about the marks of a question. Never fatal: the
/// question still gets a best-effort answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionIssue {
    /// An exclusive question without any marked box.
    NoBoxesMarked { means: Vec<f32> },
    /// An exclusive question with several marked boxes; `chosen` was kept.
    MultipleBoxesMarked { means: Vec<f32>, chosen: usize },
}

fn format_means(means: &[f32]) -> String {
    let means = means.iter().map(|m| m.to_string()).collect::<Vec<String>>();
    format!("[{}]", means.join(", "))
}

impl Display for ResolutionIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionIssue::NoBoxesMarked { means } => {
                write!(f, "no boxes marked {}", format_means(means))
            }
            ResolutionIssue::MultipleBoxesMarked { means, .. } => write!(
                f,
                "(warn) multiple boxes marked - took the one with more white {}",
                format_means(means)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Final mark decisions, after exclusivity was enforced.
    pub marks: Vec<bool>,
    pub answer: Answer,
    pub issue: Option<ResolutionIssue>,
}

/// Decides which boxes are marked from their mean intensities.
///
/// A box is marked when its mean is at most the threshold. For exclusive
/// questions at most one mark survives: with several marks only the one with
/// the highest mean is kept.
pub fn mark_decisions(
    question: &Question,
    means: &[f32],
    threshold: f32,
) -> (Vec<bool>, Option<ResolutionIssue>) {
    let marked = means.iter().map(|mean| *mean <= threshold).collect::<Vec<bool>>();
    if !question.is_exclusive() {
        return (marked, None);
    }

    let mut chosen: Option<usize> = None;
    let mut marked_count = 0;
    for (i, _) in marked.iter().enumerate().filter(|(_, m)| **m) {
        marked_count += 1;
        if chosen.map_or(true, |c| means[i] > means[c]) {
            chosen = Some(i);
        }
    }

    match (marked_count, chosen) {
        (1, _) => (marked, None),
        (_, Some(chosen)) => {
            let marks = (0..means.len()).map(|i| i == chosen).collect();
            (
                marks,
                Some(ResolutionIssue::MultipleBoxesMarked {
                    means: means.to_vec(),
                    chosen,
                }),
            )
        }
        (_, None) => (
            vec![false; means.len()],
            Some(ResolutionIssue::NoBoxesMarked {
                means: means.to_vec(),
            }),
        ),
    }
}

/// Joins the labels of the marked boxes.
pub fn reduce_marks(question: &Question, marks: &[bool]) -> String {
    question
        .labels
        .iter()
        .zip(marks)
        .filter(|(_, marked)| **marked)
        .map(|(label, _)| label.as_str())
        .collect::<Vec<&str>>()
        .join(LABEL_SEPARATOR)
}

pub fn resolve_means(
    question: &Question,
    means: &[f32],
    thresholds: &MarkThresholds,
    full: bool,
) -> Resolution {
    let (marks, issue) = mark_decisions(question, means, thresholds.mark);
    let answer = if full {
        Answer::Marks(marks.clone())
    } else {
        Answer::Text(reduce_marks(question, &marks))
    };
    Resolution {
        marks,
        answer,
        issue,
    }
}

/// Resolves the answer to `question` from its located checkboxes.
pub fn resolve_question(
    question: &Question,
    checkboxes: &[Checkbox],
    thresholds: &MarkThresholds,
    full: bool,
) -> Resolution {
    let means = checkboxes.iter().map(|c| c.mean).collect::<Vec<f32>>();
    resolve_means(question, &means, thresholds, full)
}
