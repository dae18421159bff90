use std::fmt::Display;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{Coord, HeaderRect, Offset, RotationMethod};

#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("unable to read survey definition {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("unable to parse survey definition: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("survey definition has no questions")]
    NoQuestions,

    #[error("question \"{title}\" has {labels} labels but {coords} coordinates")]
    MismatchedQuestion {
        title: String,
        labels: usize,
        coords: usize,
    },
}

/// The survey as described by the survey definition file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyDefinition {
    #[serde(default)]
    pub title: Option<String>,
    pub header: HeaderRect,
    #[serde(default)]
    pub offset: Offset,
    #[serde(default)]
    pub mark_thresholds: MarkThresholds,
    #[serde(default)]
    pub alignment: AlignmentOptions,
    #[serde(default)]
    pub box_geometry: BoxGeometry,
    #[serde(default = "default_yes_no_labels")]
    pub yes_no_labels: (String, String),
    pub questions: Vec<QuestionDefinition>,
}

fn default_yes_no_labels() -> (String, String) {
    ("yes".to_string(), "no".to_string())
}

/// A question as written in the survey definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum QuestionDefinition {
    /// Two boxes, yes then no, exactly one of which should be marked.
    #[serde(rename_all = "camelCase", rename = "yes-no")]
    YesNo { title: String, coords: Vec<Coord> },

    /// One box per label. Exclusive unless `multiple` is set.
    #[serde(rename_all = "camelCase", rename = "choice")]
    Choice {
        title: String,
        labels: Vec<String>,
        coords: Vec<Coord>,
        #[serde(default)]
        multiple: bool,
    },
}

/// Mean intensity thresholds for a checkbox. A box is marked when its mean is
/// at most `mark`; `lower` and `upper` bound the band that is inspected when
/// calibrating `mark`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkThresholds {
    pub lower: f32,
    pub upper: f32,
    pub mark: f32,
}

impl Default for MarkThresholds {
    fn default() -> Self {
        Self {
            lower: 120.0,
            upper: 210.0,
            mark: 197.0,
        }
    }
}

/// Parameters for skew correction and header anchoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlignmentOptions {
    /// Header pixels darker than this are ink.
    pub ink_threshold: u8,
    pub method: RotationMethod,
    /// Maximum number of columns searched inwards from the far edge of the
    /// header when fitting its top edge.
    pub corner_window: u32,
}

impl Default for AlignmentOptions {
    fn default() -> Self {
        Self {
            ink_threshold: 60,
            method: RotationMethod::EdgeFit,
            corner_window: 40,
        }
    }
}

/// Pixel sizes used when locating and sampling a checkbox.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoxGeometry {
    /// Side of the sampled patch around a box.
    pub length: u32,
    /// Side of the printed box itself.
    pub length_box: u32,
    /// Side of the window searched for the box corner.
    pub length_exterior: u32,
    /// Pixels darker than this are ink while searching for the corner.
    pub ink_threshold: u8,
    /// Corner searches scoring below this are reported as warnings.
    pub min_corner_confidence: f32,
}

impl Default for BoxGeometry {
    fn default() -> Self {
        Self {
            length: 30,
            length_box: 24,
            length_exterior: 40,
            ink_threshold: 100,
            min_corner_confidence: 0.5,
        }
    }
}

/// A question template shared by every form in a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
    pub title: String,
    pub labels: Vec<String>,
    pub coords: Vec<Coord>,
    pub multiple: bool,
}

impl Question {
    pub fn new(title: &str, labels: &[&str], coords: Vec<Coord>, multiple: bool) -> Self {
        Self {
            title: title.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            coords,
            multiple,
        }
    }

    /// Exactly one box is expected to be marked.
    pub fn is_exclusive(&self) -> bool {
        !self.multiple
    }
}

impl Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title)
    }
}

/// Everything needed to interpret a batch of forms, with the global offset
/// already applied to the question coordinates.
#[derive(Debug, Clone)]
pub struct SurveyLayout {
    pub header: HeaderRect,
    pub questions: Vec<Question>,
    pub thresholds: MarkThresholds,
    pub alignment: AlignmentOptions,
    pub geometry: BoxGeometry,
}

impl SurveyDefinition {
    pub fn load(path: &Path) -> Result<Self, DefinitionError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| DefinitionError::Read(path.to_path_buf(), e))?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, DefinitionError> {
        let definition: SurveyDefinition = serde_json::from_str(json)?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.questions.is_empty() {
            return Err(DefinitionError::NoQuestions);
        }
        for question in self.templates() {
            if question.labels.len() != question.coords.len() {
                return Err(DefinitionError::MismatchedQuestion {
                    title: question.title,
                    labels: question.labels.len(),
                    coords: question.coords.len(),
                });
            }
        }
        Ok(())
    }

    fn templates(&self) -> impl Iterator<Item = Question> + '_ {
        self.questions.iter().map(|definition| match definition {
            QuestionDefinition::YesNo { title, coords } => Question {
                title: title.clone(),
                labels: vec![self.yes_no_labels.0.clone(), self.yes_no_labels.1.clone()],
                coords: coords.clone(),
                multiple: false,
            },
            QuestionDefinition::Choice {
                title,
                labels,
                coords,
                multiple,
            } => Question {
                title: title.clone(),
                labels: labels.clone(),
                coords: coords.clone(),
                multiple: *multiple,
            },
        })
    }

    /// Builds the immutable layout for a batch, shifting every nominal
    /// coordinate by the configured offset.
    pub fn layout(&self) -> SurveyLayout {
        let offset = self.offset;
        let questions = self
            .templates()
            .map(|question| Question {
                coords: question.coords.iter().map(|c| offset.apply(*c)).collect(),
                ..question
            })
            .collect();

        SurveyLayout {
            header: self.header,
            questions,
            thresholds: self.mark_thresholds,
            alignment: self.alignment,
            geometry: self.box_geometry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITION: &str = r#"{
        "title": "Entrance survey",
        "header": [230, 330, 1510, 470],
        "offset": [0, -4],
        "questions": [
            { "type": "yes-no", "title": "First semester", "coords": [[996, 498], [1081, 498]] },
            {
                "type": "choice",
                "title": "Preparation",
                "labels": ["Bridging course", "Introduction", "other"],
                "coords": [[995, 642], [995, 691], [995, 739]],
                "multiple": true
            },
            {
                "type": "choice",
                "title": "Course level",
                "labels": ["advanced", "basic"],
                "coords": [[996, 546], [1223, 546]]
            }
        ]
    }"#;

    #[test]
    fn parses_definition_with_defaults() {
        let definition = SurveyDefinition::from_json(DEFINITION).unwrap();
        assert_eq!(definition.title.as_deref(), Some("Entrance survey"));
        assert_eq!(definition.mark_thresholds, MarkThresholds::default());
        assert_eq!(definition.alignment, AlignmentOptions::default());
        assert_eq!(definition.box_geometry.length, 30);
        assert_eq!(definition.questions.len(), 3);
    }

    #[test]
    fn layout_applies_offset_once() {
        let definition = SurveyDefinition::from_json(DEFINITION).unwrap();
        let layout = definition.layout();

        assert_eq!(layout.questions[0].coords, vec![(996, 494), (1081, 494)]);
        assert_eq!(layout.questions[0].labels, vec!["yes", "no"]);
        assert!(layout.questions[0].is_exclusive());
        assert!(layout.questions[1].multiple);
        assert!(layout.questions[2].is_exclusive());

        // the definition itself is untouched, so a second layout is identical
        let again = definition.layout();
        assert_eq!(again.questions, layout.questions);
    }

    #[test]
    fn custom_yes_no_labels() {
        let json = r#"{
            "header": [0, 0, 10, 10],
            "yesNoLabels": ["ja", "nein"],
            "questions": [{ "type": "yes-no", "title": "CAS", "coords": [[1, 1], [2, 2]] }]
        }"#;
        let layout = SurveyDefinition::from_json(json).unwrap().layout();
        assert_eq!(layout.questions[0].labels, vec!["ja", "nein"]);
    }

    #[test]
    fn rejects_mismatched_question() {
        let json = r#"{
            "header": [0, 0, 10, 10],
            "questions": [{ "type": "yes-no", "title": "CAS", "coords": [[1, 1]] }]
        }"#;
        match SurveyDefinition::from_json(json) {
            Err(DefinitionError::MismatchedQuestion {
                title,
                labels,
                coords,
            }) => {
                assert_eq!(title, "CAS");
                assert_eq!(labels, 2);
                assert_eq!(coords, 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn rejects_empty_survey() {
        let json = r#"{ "header": [0, 0, 10, 10], "questions": [] }"#;
        assert!(matches!(
            SurveyDefinition::from_json(json),
            Err(DefinitionError::NoQuestions)
        ));
    }
}
