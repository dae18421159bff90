use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use logging_timer::time;
use rayon::prelude::*;

use crate::alignment::Anchor;
use crate::debug::{
    draw_checkboxes_debug_image_mut, draw_header_debug_image_mut,
    draw_nominal_checkboxes_debug_image_mut, ImageDebugWriter,
};
use crate::definition::SurveyLayout;
use crate::form::{Form, FormAnswers, FormError};
use crate::statistics::{tally, QuestionStatistics};

/// How the forms of a batch are processed once the reference anchor is known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Executor {
    Sequential,
    #[default]
    Parallel,
}

/// Shared flag to stop a running batch. Forms that already started are
/// finished, the remaining ones are skipped.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct InterpretOptions {
    /// Report raw mark vectors instead of label text.
    pub full: bool,
    /// Write overlays of the located boxes next to every scan.
    pub debug: bool,
    /// Keep the sampled checkboxes in the results.
    pub keep_checkboxes: bool,
    pub executor: Executor,
    /// File extensions (without dot, case-insensitive) that count as scans.
    pub extensions: Vec<String>,
    pub cancel: CancelFlag,
}

impl Default for InterpretOptions {
    fn default() -> Self {
        Self {
            full: false,
            debug: false,
            keep_checkboxes: false,
            executor: Executor::default(),
            extensions: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
            cancel: CancelFlag::default(),
        }
    }
}

impl InterpretOptions {
    fn debug_writer(&self, path: &Path) -> ImageDebugWriter {
        if self.debug {
            ImageDebugWriter::new(path.to_path_buf())
        } else {
            ImageDebugWriter::disabled()
        }
    }
}

/// Where a form is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormStage {
    Pending,
    Aligning,
    Extracting,
    Resolved,
    Aggregated,
    Failed,
}

/// Receives progress events while a batch is interpreted. Called from worker
/// threads when running in parallel.
pub trait SurveyObserver: Sync {
    fn on_stage(&self, path: &Path, stage: FormStage);
}

/// Logs every stage change at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl SurveyObserver for LogObserver {
    fn on_stage(&self, path: &Path, stage: FormStage) {
        debug!("{}: {:?}", path.display(), stage);
    }
}

#[derive(Debug)]
pub enum FormStatus {
    Resolved(FormAnswers),
    /// The form could not be read or aligned and is left out of the
    /// statistics.
    Unreadable(FormError),
}

#[derive(Debug)]
pub struct FormOutcome {
    pub path: PathBuf,
    pub status: FormStatus,
}

impl FormOutcome {
    pub fn answers(&self) -> Option<&FormAnswers> {
        match &self.status {
            FormStatus::Resolved(answers) => Some(answers),
            FormStatus::Unreadable(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct SurveyResult {
    /// The form whose header anchor every other form was aligned to.
    pub reference: PathBuf,
    pub reference_anchor: Anchor,
    /// One outcome per processed form, in file name order.
    pub forms: Vec<FormOutcome>,
    pub statistics: Vec<QuestionStatistics>,
    pub unreadable_forms: usize,
    /// Set when the batch was cancelled before every form was processed.
    pub cancelled: bool,
}

impl SurveyResult {
    pub fn resolved(&self) -> impl Iterator<Item = (&Path, &FormAnswers)> {
        self.forms
            .iter()
            .filter_map(|form| form.answers().map(|answers| (form.path.as_path(), answers)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SurveyError {
    #[error("unable to read scan directory {0}: {1}")]
    ReadDirectory(PathBuf, #[source] std::io::Error),

    #[error("no scans found in {0}")]
    NoImages(PathBuf),

    #[error("none of the scans in {0} could be opened")]
    NoReadableImages(PathBuf),

    #[error("unable to use the first form as reference: {0}")]
    ReferenceForm(#[source] FormError),
}

fn has_scan_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// Lists the scans in `directory`, sorted by file name.
pub fn find_scans(directory: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, SurveyError> {
    let entries = std::fs::read_dir(directory)
        .map_err(|e| SurveyError::ReadDirectory(directory.to_path_buf(), e))?;

    let mut paths = vec![];
    for entry in entries {
        let path = entry
            .map_err(|e| SurveyError::ReadDirectory(directory.to_path_buf(), e))?
            .path();
        if path.is_file() && has_scan_extension(&path, extensions) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Shifts an already deskewed form to the reference, samples its boxes and
/// resolves its answers.
fn extract_and_resolve(
    mut form: Form,
    layout: &SurveyLayout,
    reference: Anchor,
    options: &InterpretOptions,
    observer: &dyn SurveyObserver,
) -> Result<FormAnswers, FormError> {
    form.shift(layout, reference)?;

    observer.on_stage(&form.path, FormStage::Extracting);
    form.init_checkboxes(layout);

    options.debug_writer(&form.path).write("check", &form.image, |canvas| {
        draw_header_debug_image_mut(canvas, &layout.header);
        draw_checkboxes_debug_image_mut(canvas, &layout.geometry, &form.checkboxes);
    });

    let mut answers = form.answers(layout, options.full);
    for warning in &answers.warnings {
        warn!(
            "{}: box {} of \"{}\" located with low confidence {:.2}",
            form.path.display(),
            warning.checkbox,
            layout.questions[warning.question],
            warning.confidence
        );
    }
    if options.keep_checkboxes {
        answers.checkboxes = Some(form.checkboxes);
    }

    observer.on_stage(&form.path, FormStage::Resolved);
    Ok(answers)
}

fn align_and_resolve(
    path: &Path,
    layout: &SurveyLayout,
    reference: Anchor,
    options: &InterpretOptions,
    observer: &dyn SurveyObserver,
) -> Result<FormAnswers, FormError> {
    let mut form = Form::open(path)?;
    observer.on_stage(path, FormStage::Aligning);
    form.deskew(layout)?;
    extract_and_resolve(form, layout, reference, options, observer)
}

fn outcome(
    path: &Path,
    result: Result<FormAnswers, FormError>,
    observer: &dyn SurveyObserver,
) -> FormOutcome {
    let status = match result {
        Ok(answers) => FormStatus::Resolved(answers),
        Err(e) => {
            warn!("skipping form: {}", e);
            observer.on_stage(path, FormStage::Failed);
            FormStatus::Unreadable(e)
        }
    };
    FormOutcome {
        path: path.to_path_buf(),
        status,
    }
}

#[time]
fn process_form(
    path: &Path,
    layout: &SurveyLayout,
    reference: Anchor,
    options: &InterpretOptions,
    observer: &dyn SurveyObserver,
) -> Option<FormOutcome> {
    if options.cancel.is_cancelled() {
        return None;
    }
    observer.on_stage(path, FormStage::Pending);
    let result = align_and_resolve(path, layout, reference, options, observer);
    Some(outcome(path, result, observer))
}

/// Interprets every scan in `directory`.
///
/// The first scan (by file name) that can be opened is the reference: its
/// header anchor is the position every other form is shifted to, so the batch
/// fails if it cannot be aligned. Any other form that fails is reported and
/// left out of the statistics.
#[time]
pub fn interpret_survey(
    directory: &Path,
    layout: &SurveyLayout,
    options: &InterpretOptions,
    observer: &dyn SurveyObserver,
) -> Result<SurveyResult, SurveyError> {
    let paths = find_scans(directory, &options.extensions)?;
    if paths.is_empty() {
        return Err(SurveyError::NoImages(directory.to_path_buf()));
    }
    info!("interpreting {} scans from {}", paths.len(), directory.display());

    let mut forms = vec![];
    let mut remaining = paths.iter();
    let (first, mut reference_form) = loop {
        let path = remaining
            .next()
            .ok_or_else(|| SurveyError::NoReadableImages(directory.to_path_buf()))?;
        observer.on_stage(path, FormStage::Pending);
        match Form::open(path) {
            Ok(form) => break (path, form),
            Err(e) => forms.push(outcome(path, Err(e), observer)),
        }
    };
    let rest = remaining.as_slice();

    observer.on_stage(first, FormStage::Aligning);
    reference_form.deskew(layout).map_err(SurveyError::ReferenceForm)?;
    let reference_anchor = reference_form.anchor(layout).map_err(SurveyError::ReferenceForm)?;
    info!(
        "reference anchor {:?} taken from {}",
        reference_anchor,
        first.display()
    );

    options.debug_writer(first).write("nominal", &reference_form.image, |canvas| {
        draw_header_debug_image_mut(canvas, &layout.header);
        draw_nominal_checkboxes_debug_image_mut(canvas, layout);
    });

    let first_result = extract_and_resolve(reference_form, layout, reference_anchor, options, observer);
    forms.push(outcome(first, first_result, observer));

    let process = |path: &PathBuf| process_form(path, layout, reference_anchor, options, observer);
    let rest = match options.executor {
        Executor::Sequential => rest.iter().filter_map(process).collect::<Vec<FormOutcome>>(),
        Executor::Parallel => rest.par_iter().filter_map(process).collect::<Vec<FormOutcome>>(),
    };
    forms.extend(rest);

    let statistics = tally(&layout.questions, forms.iter().filter_map(FormOutcome::answers));
    for form in &forms {
        if form.answers().is_some() {
            observer.on_stage(&form.path, FormStage::Aggregated);
        }
    }

    let unreadable_forms = forms.iter().filter(|f| f.answers().is_none()).count();
    let cancelled = forms.len() < paths.len();
    info!(
        "interpreted {} of {} scans ({} unreadable){}",
        forms.len() - unreadable_forms,
        paths.len(),
        unreadable_forms,
        if cancelled { ", cancelled" } else { "" }
    );

    Ok(SurveyResult {
        reference: first.clone(),
        reference_anchor,
        forms,
        statistics,
        unreadable_forms,
        cancelled,
    })
}
