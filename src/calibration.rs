//! Box dumps and histograms used to pick the mark thresholds.

use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::definition::SurveyLayout;
use crate::interpret::SurveyResult;

/// Number of histogram bins used by `analyze`.
pub const HISTOGRAM_BINS: usize = 50;

/// Distance to a threshold within which a box counts as "near" it.
pub const NEAR_RADIUS: f32 = 15.0;

#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("unable to read box dump {0}: {1}")]
    Read(PathBuf, #[source] io::Error),

    #[error("unable to parse box dump {0}: {1}")]
    Parse(PathBuf, #[source] serde_json::Error),
}

/// One sampled checkbox of one form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSample {
    pub file: String,
    pub question: String,
    pub index: usize,
    pub mean: f32,
    /// The raw patch, row by row.
    pub data: Vec<u8>,
}

/// Collects every checkbox kept in `result`. Forms interpreted without
/// keeping their checkboxes contribute nothing.
pub fn box_samples(result: &SurveyResult, layout: &SurveyLayout) -> Vec<BoxSample> {
    let mut samples = vec![];
    for (path, answers) in result.resolved() {
        let file = path
            .file_name()
            .unwrap_or(path.as_os_str())
            .to_string_lossy()
            .into_owned();
        let Some(checkboxes) = &answers.checkboxes else {
            continue;
        };
        for (question, boxes) in layout.questions.iter().zip(checkboxes) {
            for (index, checkbox) in boxes.iter().enumerate() {
                samples.push(BoxSample {
                    file: file.clone(),
                    question: question.title.clone(),
                    index,
                    mean: checkbox.mean,
                    data: checkbox.data.as_raw().clone(),
                });
            }
        }
    }
    samples
}

pub fn write_box_samples<W: Write>(writer: &mut W, samples: &[BoxSample]) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, samples)?;
    writeln!(writer)
}

pub fn read_box_samples(path: &Path) -> Result<Vec<BoxSample>, CalibrationError> {
    let file = File::open(path).map_err(|e| CalibrationError::Read(path.to_path_buf(), e))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| CalibrationError::Parse(path.to_path_buf(), e))
}

/// Histogram of box means over the full intensity range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeanHistogram {
    pub counts: Vec<usize>,
}

impl MeanHistogram {
    pub fn new(means: impl IntoIterator<Item = f32>, bins: usize) -> Self {
        let bins = bins.max(1);
        let mut counts = vec![0; bins];
        for mean in means {
            let bin = ((mean.clamp(0.0, 255.0) / 255.0) * bins as f32) as usize;
            counts[bin.min(bins - 1)] += 1;
        }
        Self { counts }
    }

    pub fn bin_width(&self) -> f32 {
        255.0 / self.counts.len() as f32
    }
}

impl Display for MeanHistogram {
    /// One line per bin with its range, count and a bar scaled to 40 columns.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let max = self.counts.iter().copied().max().unwrap_or(0).max(1);
        let width = self.bin_width();
        for (i, count) in self.counts.iter().enumerate() {
            let bar = "#".repeat((count * 40 + max - 1) / max);
            writeln!(
                f,
                "{:>6.1} - {:>6.1} {:>6} {}",
                i as f32 * width,
                (i + 1) as f32 * width,
                count,
                bar
            )?;
        }
        Ok(())
    }
}

/// Samples whose mean lies within `radius` of `bound`, sorted by mean.
pub fn near(samples: &[BoxSample], bound: f32, radius: f32) -> Vec<&BoxSample> {
    let mut found = samples
        .iter()
        .filter(|s| (s.mean - bound).abs() <= radius)
        .collect::<Vec<&BoxSample>>();
    found.sort_by(|a, b| a.mean.total_cmp(&b.mean));
    found
}
