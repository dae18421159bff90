use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::GrayImage;
use log::debug;

use crate::alignment::{deskew, header_anchor, shift_to_anchor, AlignmentError, Anchor};
use crate::checkbox::{locate_question_checkboxes, Checkbox};
use crate::definition::SurveyLayout;
use crate::resolve::{resolve_question, Answer, ResolutionIssue};

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("unable to open image {0}: {1}")]
    ImageOpen(PathBuf, #[source] image::ImageError),

    #[error("unable to align {0}: {1}")]
    Alignment(PathBuf, #[source] AlignmentError),
}

/// A checkbox whose corner could not be found reliably.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckboxWarning {
    pub question: usize,
    pub checkbox: usize,
    pub confidence: f32,
}

/// Everything read from one form.
#[derive(Debug, Clone)]
pub struct FormAnswers {
    /// One answer per question, in template order.
    pub answers: Vec<Answer>,
    /// The mark decisions behind each answer.
    pub marks: Vec<Vec<bool>>,
    /// Issues keyed by question index.
    pub issues: BTreeMap<usize, ResolutionIssue>,
    pub warnings: Vec<CheckboxWarning>,
    /// The sampled checkboxes, only kept when asked for.
    pub checkboxes: Option<Vec<Vec<Checkbox>>>,
}

/// One scanned page bound to the survey layout.
#[derive(Debug)]
pub struct Form {
    pub path: PathBuf,
    pub image: GrayImage,
    /// Skew removed by [`Form::deskew`], in degrees.
    pub skew: f32,
    /// Checkboxes per question, filled by [`Form::init_checkboxes`].
    pub checkboxes: Vec<Vec<Checkbox>>,
}

impl Form {
    pub fn new(path: PathBuf, image: GrayImage) -> Self {
        Self {
            path,
            image,
            skew: 0.0,
            checkboxes: vec![],
        }
    }

    pub fn open(path: &Path) -> Result<Self, FormError> {
        let image = image::open(path)
            .map_err(|e| FormError::ImageOpen(path.to_path_buf(), e))?
            .into_luma8();
        Ok(Self::new(path.to_path_buf(), image))
    }

    fn alignment_error(&self, error: AlignmentError) -> FormError {
        FormError::Alignment(self.path.clone(), error)
    }

    /// Rotates the page so its header is level.
    pub fn deskew(&mut self, layout: &SurveyLayout) -> Result<(), FormError> {
        let skew = deskew(&mut self.image, &layout.header, &layout.alignment)
            .map_err(|e| self.alignment_error(e))?;
        self.skew = skew;
        debug!("{}: removed skew of {:.3}°", self.path.display(), self.skew);
        Ok(())
    }

    pub fn anchor(&self, layout: &SurveyLayout) -> Result<Anchor, FormError> {
        header_anchor(&self.image, &layout.header, layout.alignment.ink_threshold)
            .map_err(|e| self.alignment_error(e))
    }

    /// Translates the page so its header anchor matches `reference`.
    pub fn shift(&mut self, layout: &SurveyLayout, reference: Anchor) -> Result<(), FormError> {
        let anchor = self.anchor(layout)?;
        debug!(
            "{}: anchor {:?}, reference {:?}",
            self.path.display(),
            anchor,
            reference
        );
        shift_to_anchor(&mut self.image, anchor, reference);
        Ok(())
    }

    /// Locates every checkbox of every question. Only meaningful once the
    /// page is aligned.
    pub fn init_checkboxes(&mut self, layout: &SurveyLayout) {
        self.checkboxes = layout
            .questions
            .iter()
            .map(|question| locate_question_checkboxes(&self.image, question, &layout.geometry))
            .collect();
    }

    /// Resolves every question.
    pub fn answers(&self, layout: &SurveyLayout, full: bool) -> FormAnswers {
        let mut answers = vec![];
        let mut marks = vec![];
        let mut issues = BTreeMap::new();

        for (i, (question, checkboxes)) in layout.questions.iter().zip(&self.checkboxes).enumerate() {
            let resolution = resolve_question(question, checkboxes, &layout.thresholds, full);
            answers.push(resolution.answer);
            marks.push(resolution.marks);
            if let Some(issue) = resolution.issue {
                issues.insert(i, issue);
            }
        }

        let warnings = self
            .checkboxes
            .iter()
            .enumerate()
            .flat_map(|(question, checkboxes)| {
                checkboxes
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| !c.is_confident(&layout.geometry))
                    .map(move |(checkbox, c)| CheckboxWarning {
                        question,
                        checkbox,
                        confidence: c.confidence,
                    })
            })
            .collect();

        FormAnswers {
            answers,
            marks,
            issues,
            warnings,
            checkboxes: None,
        }
    }
}
