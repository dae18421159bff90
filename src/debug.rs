use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use log::{debug, warn};

use crate::{
    checkbox::Checkbox,
    definition::{BoxGeometry, SurveyLayout},
    image_utils::{BLUE, GREEN, PINK, RED},
    types::HeaderRect,
};

/// Creates a path for a debug image next to `base`.
pub fn debug_image_path(base: &Path, label: &str) -> PathBuf {
    let mut result = PathBuf::from(base);
    result.set_file_name(format!(
        "{}_debug_{}.png",
        base.file_stem().unwrap_or_default().to_string_lossy(),
        label
    ));
    result
}

/// Writes annotated copies of a form image, or does nothing when disabled.
#[derive(Debug, Clone)]
pub struct ImageDebugWriter {
    input_path: Option<PathBuf>,
}

impl ImageDebugWriter {
    pub fn new(input_path: PathBuf) -> Self {
        Self {
            input_path: Some(input_path),
        }
    }

    pub fn disabled() -> Self {
        Self { input_path: None }
    }

    /// Draws onto a color copy of `image` and saves it as `<stem>_debug_<label>.png`.
    pub fn write(&self, label: &str, image: &GrayImage, draw: impl FnOnce(&mut RgbImage)) -> Option<PathBuf> {
        let input_path = self.input_path.as_ref()?;
        let mut canvas = DynamicImage::ImageLuma8(image.clone()).into_rgb8();
        draw(&mut canvas);

        let output_path = debug_image_path(input_path, label);
        match canvas.save(&output_path) {
            Ok(()) => {
                debug!("wrote debug image {}", output_path.display());
                Some(output_path)
            }
            Err(e) => {
                warn!("unable to write debug image {}: {}", output_path.display(), e);
                None
            }
        }
    }
}

fn grown(rect: Rect, by: i32) -> Rect {
    Rect::at(rect.left() - by, rect.top() - by)
        .of_size(rect.width() + 2 * by as u32, rect.height() + 2 * by as u32)
}

/// Outlines the header rectangle.
pub fn draw_header_debug_image_mut(canvas: &mut RgbImage, header: &HeaderRect) {
    draw_hollow_rect_mut(canvas, header.to_rect(), BLUE);
    draw_hollow_rect_mut(canvas, grown(header.to_rect(), 1), BLUE);
}

/// Outlines every sampled checkbox patch; boxes whose corner search was
/// unreliable are drawn in red.
pub fn draw_checkboxes_debug_image_mut(
    canvas: &mut RgbImage,
    geometry: &BoxGeometry,
    checkboxes: &[Vec<Checkbox>],
) {
    for checkbox in checkboxes.iter().flatten() {
        let color = if checkbox.is_confident(geometry) {
            GREEN
        } else {
            RED
        };
        draw_hollow_rect_mut(canvas, checkbox.bounds(), color);
        draw_hollow_rect_mut(canvas, grown(checkbox.bounds(), 1), color);
    }
}

/// Outlines the nominal position of every checkbox of the layout.
pub fn draw_nominal_checkboxes_debug_image_mut(canvas: &mut RgbImage, layout: &SurveyLayout) {
    let length = layout.geometry.length.max(1);
    let half = length as i32 / 2;
    for (x, y) in layout.questions.iter().flat_map(|q| q.coords.iter()) {
        draw_hollow_rect_mut(canvas, Rect::at(x - half, y - half).of_size(length, length), PINK);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkbox::locate_checkbox;
    use crate::test_support::{blank_page, draw_checkbox, Mark};

    #[test]
    fn debug_path_sits_next_to_input() {
        assert_eq!(
            debug_image_path(Path::new("scans/form-001.jpg"), "check"),
            PathBuf::from("scans/form-001_debug_check.png")
        );
    }

    #[test]
    fn disabled_writer_writes_nothing() {
        let writer = ImageDebugWriter::disabled();
        let mut drawn = false;
        assert_eq!(writer.write("check", &blank_page(10, 10), |_| drawn = true), None);
        assert!(!drawn);
    }

    #[test]
    fn writes_overlay_png() {
        let dir = tempfile::tempdir().unwrap();
        let geometry = BoxGeometry::default();
        let mut page = blank_page(200, 120);
        draw_checkbox(&mut page, (100, 60), Mark::Empty);
        let checkboxes = vec![vec![locate_checkbox(&page, (100, 60), &geometry)]];

        let writer = ImageDebugWriter::new(dir.path().join("form.jpg"));
        let path = writer
            .write("check", &page, |canvas| {
                draw_header_debug_image_mut(canvas, &HeaderRect::new(10, 10, 190, 40));
                draw_checkboxes_debug_image_mut(canvas, &geometry, &checkboxes);
            })
            .unwrap();

        assert_eq!(path, dir.path().join("form_debug_check.png"));
        let overlay = image::open(&path).unwrap().into_rgb8();
        assert_eq!(overlay.dimensions(), (200, 120));
        assert_eq!(*overlay.get_pixel(85, 90), GREEN);
        assert_eq!(*overlay.get_pixel(10, 10), BLUE);
    }
}
