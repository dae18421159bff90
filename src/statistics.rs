use serde::{Deserialize, Serialize};

use crate::definition::Question;
use crate::form::FormAnswers;

/// Label under which forms without any marked box are counted.
pub const NO_ANSWER: &str = "";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

/// How often each answer was given to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionStatistics {
    pub title: String,
    /// The question's labels in template order, followed by [`NO_ANSWER`].
    pub counts: Vec<LabelCount>,
}

impl QuestionStatistics {
    fn empty(question: &Question) -> Self {
        let counts = question
            .labels
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(NO_ANSWER))
            .map(|label| LabelCount {
                label: label.to_string(),
                count: 0,
            })
            .collect();
        Self {
            title: question.title.clone(),
            counts,
        }
    }

    pub fn count(&self, label: &str) -> Option<usize> {
        self.counts
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.count)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|c| c.count).sum()
    }

    fn add(&mut self, marks: &[bool]) {
        let label_count = self.counts.len() - 1;
        let mut answered = false;
        for (i, _) in marks.iter().enumerate().filter(|(_, m)| **m) {
            if i < label_count {
                self.counts[i].count += 1;
                answered = true;
            }
        }
        if !answered {
            self.counts[label_count].count += 1;
        }
    }
}

/// Counts the answers of every form, per question. Each marked box adds one
/// to its label; a question without marks adds one to [`NO_ANSWER`].
pub fn tally<'a>(
    questions: &[Question],
    forms: impl IntoIterator<Item = &'a FormAnswers>,
) -> Vec<QuestionStatistics> {
    let mut statistics = questions
        .iter()
        .map(QuestionStatistics::empty)
        .collect::<Vec<QuestionStatistics>>();

    for form in forms {
        for (question, marks) in statistics.iter_mut().zip(&form.marks) {
            question.add(marks);
        }
    }

    statistics
}
