extern crate log;
extern crate pretty_env_logger;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

use clap::{arg, command, value_parser, ArgMatches, Command};
use log::{error, info};

use crate::calibration::{near, read_box_samples, write_box_samples, MeanHistogram, HISTOGRAM_BINS, NEAR_RADIUS};
use crate::definition::SurveyDefinition;
use crate::interpret::{interpret_survey, Executor, InterpretOptions, LogObserver};
use crate::report::{write_answers_csv, write_error_log_json, write_statistics_json};

mod alignment;
mod calibration;
mod checkbox;
mod debug;
mod definition;
mod form;
mod geometry;
mod image_utils;
mod interpret;
mod report;
mod resolve;
mod statistics;
#[cfg(test)]
mod test_support;
mod types;

fn main() {
    pretty_env_logger::init_custom_env("LOG");

    let matches = cli().get_matches();
    let result = match matches.subcommand() {
        Some(("evaluate", matches)) => evaluate(matches),
        Some(("analyze", matches)) => analyze(matches),
        _ => unreachable!("subcommand is required"),
    };

    if let Err(e) = result {
        error!("{}", e);
        eprintln!("Error: {}", e);
        exit(1);
    }
}

fn load_definition(matches: &ArgMatches) -> Result<SurveyDefinition, String> {
    let path = matches
        .get_one::<PathBuf>("config")
        .ok_or("survey definition path is required")?;
    let definition = SurveyDefinition::load(path).map_err(|e| e.to_string())?;
    if let Some(title) = &definition.title {
        info!("survey: {}", title);
    }
    Ok(definition)
}

fn write_file(path: &Path, write: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>) -> Result<(), String> {
    let mut writer = File::create(path)
        .map(BufWriter::new)
        .map_err(|e| format!("unable to create {}: {}", path.display(), e))?;
    write(&mut writer)
        .and_then(|_| writer.flush())
        .map_err(|e| format!("unable to write {}: {}", path.display(), e))?;
    info!("wrote {}", path.display());
    Ok(())
}

fn evaluate(matches: &ArgMatches) -> Result<(), String> {
    let definition = load_definition(matches)?;
    let layout = definition.layout();

    let scan_directory = matches
        .get_one::<PathBuf>("scan_directory")
        .ok_or("scan directory is required")?;
    let dump_boxes = matches.get_one::<PathBuf>("dump_boxes");

    let options = InterpretOptions {
        full: matches.get_flag("full"),
        debug: matches.get_flag("check"),
        keep_checkboxes: dump_boxes.is_some(),
        executor: if matches.get_flag("sequential") {
            Executor::Sequential
        } else {
            Executor::Parallel
        },
        ..InterpretOptions::default()
    };

    let result =
        interpret_survey(scan_directory, &layout, &options, &LogObserver).map_err(|e| e.to_string())?;

    if let Some(path) = matches.get_one::<PathBuf>("answers") {
        write_file(path, |w| write_answers_csv(w, &layout.questions, &result))?;
    }
    if let Some(path) = matches.get_one::<PathBuf>("statistics") {
        write_file(path, |w| write_statistics_json(w, &result.statistics))?;
    }
    if let Some(path) = matches.get_one::<PathBuf>("errors") {
        write_file(path, |w| write_error_log_json(w, &layout.questions, &result))?;
    }
    if let Some(path) = dump_boxes {
        let samples = calibration::box_samples(&result, &layout);
        write_file(path, |w| write_box_samples(w, &samples))?;
    }

    println!(
        "{} forms interpreted, {} unreadable",
        result.forms.len() - result.unreadable_forms,
        result.unreadable_forms
    );
    for question in &result.statistics {
        let counts = question
            .counts
            .iter()
            .map(|c| format!("{:?}: {}", c.label, c.count))
            .collect::<Vec<String>>();
        println!("{}: {}", question.title, counts.join(", "));
    }
    Ok(())
}

fn analyze(matches: &ArgMatches) -> Result<(), String> {
    let definition = load_definition(matches)?;
    let thresholds = definition.mark_thresholds;
    let boxes_path = matches
        .get_one::<PathBuf>("boxes")
        .ok_or("box dump path is required")?;
    let samples = read_box_samples(boxes_path).map_err(|e| e.to_string())?;

    let histogram = MeanHistogram::new(samples.iter().map(|s| s.mean), HISTOGRAM_BINS);
    println!("{} boxes", samples.len());
    print!("{}", histogram);

    for (name, bound) in [("lower", thresholds.lower), ("upper", thresholds.upper)] {
        let found = near(&samples, bound, NEAR_RADIUS);
        if found.is_empty() {
            println!("nothing near the {} bound {}", name, bound);
            continue;
        }
        println!("{} boxes near the {} bound {}:", found.len(), name, bound);
        for sample in found {
            println!(
                "  {:>6.1} {} \"{}\" #{}",
                sample.mean, sample.file, sample.question, sample.index
            );
        }
    }
    Ok(())
}

#[allow(clippy::cognitive_complexity)]
fn cli() -> Command {
    let config = arg!(-c --config <PATH> "Path to the survey definition JSON file")
        .required(true)
        .value_parser(value_parser!(PathBuf));

    command!()
        .subcommand_required(true)
        .subcommand(
            Command::new("evaluate")
                .about("Read the answers of every scanned form in a directory")
                .arg(config.clone())
                .arg(
                    arg!(scan_directory: [SCAN_DIR] "Directory containing the scans")
                        .default_value("Scans")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--answers <PATH> "Where to write the answer CSV")
                        .default_value("results.csv")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(arg!(--statistics <PATH> "Where to write the statistics JSON").value_parser(value_parser!(PathBuf)))
                .arg(arg!(--errors <PATH> "Where to write the error log JSON").value_parser(value_parser!(PathBuf)))
                .arg(
                    arg!(dump_boxes: --"dump-boxes" <PATH> "Where to write every sampled box as JSON")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(arg!(--check "Write an overlay of the located boxes next to every scan"))
                .arg(arg!(--full "Write the raw mark decisions instead of labels"))
                .arg(arg!(--sequential "Interpret the forms one after another")),
        )
        .subcommand(
            Command::new("analyze")
                .about("Summarize a box dump to help pick the mark thresholds")
                .arg(config)
                .arg(
                    arg!(boxes: <BOXES> "Box dump written by evaluate --dump-boxes")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
}
