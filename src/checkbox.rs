use image::GrayImage;
use imageproc::rect::Rect;

use crate::definition::{BoxGeometry, Question};
use crate::image_utils::{count_ink_in_column, count_ink_in_row, crop, mean_intensity};
use crate::types::Coord;

/// Number of columns and rows tried as the left and top edge of a box.
const CORNER_CANDIDATES: usize = 5;

/// A checkbox of one form, located and sampled.
#[derive(Debug, Clone)]
pub struct Checkbox {
    /// Center as given by the question template.
    pub nominal_center: Coord,
    /// Refined top-left corner of the sampled patch.
    pub left: i32,
    pub upper: i32,
    /// The `length × length` patch of the page at the refined corner.
    pub data: GrayImage,
    pub mean: f32,
    /// How well the corner search matched, from 0 (nothing found) to 1.
    pub confidence: f32,
}

impl Checkbox {
    pub fn bounds(&self) -> Rect {
        Rect::at(self.left, self.upper).of_size(self.data.width().max(1), self.data.height().max(1))
    }

    pub fn is_confident(&self, geometry: &BoxGeometry) -> bool {
        self.confidence >= geometry.min_corner_confidence
    }
}

/// Offset of the best corner match inside a search window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CornerMatch {
    pub left: u32,
    pub upper: u32,
    pub score: u32,
}

/// Returns the indices of the `n` largest sums, largest first. Equal sums keep
/// their index order.
fn top_indices(sums: &[u32], n: usize) -> Vec<u32> {
    let mut indices = (0..sums.len() as u32).collect::<Vec<u32>>();
    indices.sort_by(|a, b| sums[*b as usize].cmp(&sums[*a as usize]));
    indices.truncate(n);
    indices
}

/// Finds the upper left corner of a printed box inside `window`.
///
/// The top and left edges of a box form an "L": the candidates are the
/// inkiest columns of the left half and the inkiest rows of the upper half,
/// and each pair is scored by the ink found along a vertical and a horizontal
/// run of `length_box` pixels starting at it. Returns `None` if no candidate
/// touches any ink.
pub fn find_upper_left_corner(window: &GrayImage, geometry: &BoxGeometry) -> Option<CornerMatch> {
    let (width, height) = window.dimensions();
    let threshold = geometry.ink_threshold;
    let run = geometry.length_box;

    let column_sums = (0..width / 2)
        .map(|x| count_ink_in_column(window, x, 0, height, threshold))
        .collect::<Vec<u32>>();
    let row_sums = (0..height / 2)
        .map(|y| count_ink_in_row(window, y, 0, width, threshold))
        .collect::<Vec<u32>>();

    let mut best: Option<CornerMatch> = None;
    for left in top_indices(&column_sums, CORNER_CANDIDATES) {
        for upper in top_indices(&row_sums, CORNER_CANDIDATES) {
            let score = count_ink_in_column(window, left, upper, upper + run, threshold)
                + count_ink_in_row(window, upper, left, left + run, threshold);
            if score > best.map_or(0, |b| b.score) {
                best = Some(CornerMatch { left, upper, score });
            }
        }
    }

    best
}

/// Copies the `length × length` patch at `(left, upper)`, moved inside the
/// page if it would extend past an edge. Returns the patch and its actual
/// corner.
fn extract_patch(image: &GrayImage, left: i32, upper: i32, length: u32) -> (GrayImage, i32, i32) {
    let max_left = (image.width() as i32 - length as i32).max(0);
    let max_upper = (image.height() as i32 - length as i32).max(0);
    let left = left.clamp(0, max_left);
    let upper = upper.clamp(0, max_upper);
    (crop(image, left as u32, upper as u32, length, length), left, upper)
}

/// Locates the checkbox printed around `nominal_center` and samples it.
///
/// A window of `length_exterior` pixels around the nominal center is searched
/// for the box corner, since scans drift by a few pixels. When the window
/// does not fit the page or holds no ink, the window origin is used and the
/// confidence is 0.
pub fn locate_checkbox(image: &GrayImage, nominal_center: Coord, geometry: &BoxGeometry) -> Checkbox {
    let exterior = geometry.length_exterior;
    let half_exterior = exterior as i32 / 2;
    let wanted_x = nominal_center.0 - half_exterior;
    let wanted_y = nominal_center.1 - half_exterior;
    let origin_x = wanted_x.max(0);
    let origin_y = wanted_y.max(0);
    let window = crop(image, origin_x as u32, origin_y as u32, exterior, exterior);
    let clipped = (origin_x, origin_y) != (wanted_x, wanted_y) || window.dimensions() != (exterior, exterior);

    let found = if clipped {
        None
    } else {
        find_upper_left_corner(&window, geometry)
    };
    let (corner, confidence) = match found {
        Some(found) => (
            (found.left as i32, found.upper as i32),
            (found.score as f32 / (2 * geometry.length_box.max(1)) as f32).min(1.0),
        ),
        None => ((0, 0), 0.0),
    };

    let padding = (geometry.length as i32 - geometry.length_box as i32) / 2;
    let (data, left, upper) = extract_patch(
        image,
        origin_x + corner.0 - padding,
        origin_y + corner.1 - padding,
        geometry.length,
    );
    let mean = mean_intensity(&data);

    Checkbox {
        nominal_center,
        left,
        upper,
        data,
        mean,
        confidence,
    }
}

/// Locates every checkbox of a question, in template order.
pub fn locate_question_checkboxes(
    image: &GrayImage,
    question: &Question,
    geometry: &BoxGeometry,
) -> Vec<Checkbox> {
    question
        .coords
        .iter()
        .map(|center| locate_checkbox(image, *center, geometry))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{blank_page, draw_checkbox, Mark};

    #[test]
    fn top_indices_prefer_first_on_ties() {
        assert_eq!(top_indices(&[1, 5, 5, 0, 3, 5, 2], 5), vec![1, 2, 5, 4, 6]);
        assert_eq!(top_indices(&[2, 1], 5), vec![0, 1]);
    }

    #[test]
    fn finds_corner_of_box_at_nominal_position() {
        let geometry = BoxGeometry::default();
        let mut page = blank_page(200, 200);
        draw_checkbox(&mut page, (100, 100), Mark::Empty);

        let checkbox = locate_checkbox(&page, (100, 100), &geometry);
        assert_eq!((checkbox.left, checkbox.upper), (85, 85));
        assert_eq!(checkbox.data.dimensions(), (30, 30));
        assert_eq!(checkbox.confidence, 1.0);
        assert!(checkbox.is_confident(&geometry));
    }

    #[test]
    fn refines_drifted_nominal_position() {
        let geometry = BoxGeometry::default();
        let mut page = blank_page(200, 200);
        draw_checkbox(&mut page, (100, 100), Mark::Empty);

        let exact = locate_checkbox(&page, (100, 100), &geometry);
        let drifted = locate_checkbox(&page, (103, 98), &geometry);
        assert_eq!((drifted.left, drifted.upper), (85, 85));
        assert_eq!(drifted.mean, exact.mean);
        assert_eq!(drifted.nominal_center, (103, 98));
    }

    #[test]
    fn mean_separates_marked_from_empty() {
        let geometry = BoxGeometry::default();
        let mut page = blank_page(300, 200);
        draw_checkbox(&mut page, (60, 100), Mark::Empty);
        draw_checkbox(&mut page, (160, 100), Mark::Filled);
        draw_checkbox(&mut page, (240, 100), Mark::Cross);

        let empty = locate_checkbox(&page, (60, 100), &geometry);
        let filled = locate_checkbox(&page, (160, 100), &geometry);
        let crossed = locate_checkbox(&page, (240, 100), &geometry);
        assert!(empty.mean > 197.0, "empty mean {}", empty.mean);
        assert!(filled.mean < 120.0, "filled mean {}", filled.mean);
        assert!(crossed.mean < 197.0, "crossed mean {}", crossed.mean);
    }

    #[test]
    fn blank_window_falls_back_to_origin() {
        let geometry = BoxGeometry::default();
        let page = blank_page(200, 200);

        let checkbox = locate_checkbox(&page, (100, 100), &geometry);
        assert_eq!(checkbox.confidence, 0.0);
        assert!(!checkbox.is_confident(&geometry));
        assert_eq!((checkbox.left, checkbox.upper), (77, 77));
        assert_eq!(checkbox.mean, 255.0);
    }

    #[test]
    fn patch_is_kept_inside_the_page() {
        let geometry = BoxGeometry::default();
        let page = blank_page(100, 100);

        let corner = locate_checkbox(&page, (2, 3), &geometry);
        assert_eq!((corner.left, corner.upper), (0, 0));
        assert_eq!(corner.data.dimensions(), (30, 30));

        let far = locate_checkbox(&page, (99, 99), &geometry);
        assert_eq!((far.left, far.upper), (70, 70));
        assert_eq!(far.data.dimensions(), (30, 30));
    }

    #[test]
    fn window_clipped_by_page_edge_has_no_confidence() {
        let geometry = BoxGeometry::default();
        let mut page = blank_page(200, 200);
        draw_checkbox(&mut page, (16, 100), Mark::Empty);
        draw_checkbox(&mut page, (180, 150), Mark::Empty);

        let left_edge = locate_checkbox(&page, (5, 100), &geometry);
        assert_eq!(left_edge.confidence, 0.0);
        assert!(!left_edge.is_confident(&geometry));
        assert_eq!((left_edge.left, left_edge.upper), (0, 77));

        let right_edge = locate_checkbox(&page, (192, 150), &geometry);
        assert_eq!(right_edge.confidence, 0.0);
        assert_eq!((right_edge.left, right_edge.upper), (169, 127));
        assert_eq!(right_edge.data.dimensions(), (30, 30));

        let inside = locate_checkbox(&page, (180, 150), &geometry);
        assert_eq!(inside.confidence, 1.0);
    }

    #[test]
    fn one_checkbox_per_coordinate() {
        let geometry = BoxGeometry::default();
        let mut page = blank_page(300, 100);
        draw_checkbox(&mut page, (50, 50), Mark::Filled);
        draw_checkbox(&mut page, (150, 50), Mark::Empty);
        let question = Question::new("CAS", &["yes", "no"], vec![(50, 50), (150, 50)], false);

        let checkboxes = locate_question_checkboxes(&page, &question, &geometry);
        assert_eq!(checkboxes.len(), question.coords.len());
        assert!(checkboxes[0].mean < checkboxes[1].mean);
    }
}
