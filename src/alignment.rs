use image::GrayImage;
use imageproc::geometric_transformations::{rotate_about_center, warp, Interpolation, Projection};
use imageproc::point::Point;
use logging_timer::time;

use crate::definition::AlignmentOptions;
use crate::geometry::{principal_axis_degrees, Segment};
use crate::image_utils::{
    crop, first_ink_column, first_ink_row, ink_bounds, ink_points, is_ink, WHITE,
};
use crate::types::{HeaderRect, RotationMethod};

/// Skew below this many degrees is left uncorrected.
const MIN_ROTATION_DEGREES: f32 = 0.01;

#[derive(Debug, thiserror::Error)]
pub enum AlignmentError {
    #[error("header {header:?} does not fit a {width}x{height} page")]
    HeaderOutOfBounds {
        header: HeaderRect,
        width: u32,
        height: u32,
    },

    #[error("no ink found in header")]
    HeaderInkNotFound,
}

/// The position of a page's header ink, relative to the header rectangle.
pub type Anchor = (u32, u32);

/// Copies the header region out of a page.
pub fn header_image(image: &GrayImage, header: &HeaderRect) -> Result<GrayImage, AlignmentError> {
    if !header.fits_within(image.dimensions()) {
        return Err(AlignmentError::HeaderOutOfBounds {
            header: *header,
            width: image.width(),
            height: image.height(),
        });
    }
    Ok(crop(image, header.left, header.upper, header.width(), header.height()))
}

/// Estimates how far the header is rotated, in degrees. Positive angles mean
/// the header's top edge descends to the right.
pub fn estimate_skew(header: &GrayImage, options: &AlignmentOptions) -> Result<f32, AlignmentError> {
    match options.method {
        RotationMethod::PrincipalAxis => {
            principal_axis_degrees(&ink_points(header, options.ink_threshold))
                .map(|angle| angle as f32)
                .ok_or(AlignmentError::HeaderInkNotFound)
        }
        RotationMethod::EdgeFit => edge_fit_degrees(header, options.ink_threshold, options.corner_window),
    }
}

fn first_ink_in_column(img: &GrayImage, x: u32, threshold: u8) -> Option<u32> {
    (0..img.height()).find(|y| is_ink(img.get_pixel(x, *y), threshold))
}

/// Fits the top edge of the header's ink.
///
/// The highest ink pixel is one upper corner of the header. If it is in the
/// left half, the other corner is the top ink pixel of the rightmost inked
/// column within `corner_window` of the right edge, and the other way round.
fn edge_fit_degrees(header: &GrayImage, threshold: u8, corner_window: u32) -> Result<f32, AlignmentError> {
    let (left, top, right, bottom) =
        ink_bounds(header, threshold).ok_or(AlignmentError::HeaderInkNotFound)?;
    let bounded = crop(header, left, top, right - left + 1, bottom - top + 1);
    let (width, _) = bounded.dimensions();
    let window = corner_window.clamp(1, width);

    let top_row = (0..width)
        .filter(|x| is_ink(bounded.get_pixel(*x, 0), threshold))
        .collect::<Vec<u32>>();
    let (first, last) = match (top_row.first(), top_row.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Err(AlignmentError::HeaderInkNotFound),
    };

    let (start, end) = if first < width / 2 {
        let (x, y) = (0..window)
            .map(|i| width - 1 - i)
            .find_map(|x| first_ink_in_column(&bounded, x, threshold).map(|y| (x, y)))
            .ok_or(AlignmentError::HeaderInkNotFound)?;
        (Point::new(first as f32, 0.0), Point::new(x as f32, y as f32))
    } else {
        let (x, y) = (0..window)
            .find_map(|x| first_ink_in_column(&bounded, x, threshold).map(|y| (x, y)))
            .ok_or(AlignmentError::HeaderInkNotFound)?;
        (Point::new(x as f32, y as f32), Point::new(last as f32, 0.0))
    };

    Ok(Segment::new(start, end).angle_degrees())
}

/// Corrects the skew of a whole page in place using its header. Returns the
/// angle that was removed. The page is untouched on error.
#[time]
pub fn deskew(
    image: &mut GrayImage,
    header: &HeaderRect,
    options: &AlignmentOptions,
) -> Result<f32, AlignmentError> {
    let angle = estimate_skew(&header_image(image, header)?, options)?;
    if angle.abs() >= MIN_ROTATION_DEGREES {
        *image = rotate_about_center(image, -angle.to_radians(), Interpolation::Nearest, WHITE);
    }
    Ok(angle)
}

/// Finds the first inked column and row of the header, relative to the
/// header rectangle.
pub fn header_anchor(
    image: &GrayImage,
    header: &HeaderRect,
    threshold: u8,
) -> Result<Anchor, AlignmentError> {
    let header_image = header_image(image, header)?;
    match (
        first_ink_column(&header_image, threshold),
        first_ink_row(&header_image, threshold),
    ) {
        (Some(left), Some(upper)) => Ok((left, upper)),
        _ => Err(AlignmentError::HeaderInkNotFound),
    }
}

/// Translates a page in place so that its header anchor lands on `reference`.
#[time]
pub fn shift_to_anchor(image: &mut GrayImage, anchor: Anchor, reference: Anchor) {
    let dx = reference.0 as i32 - anchor.0 as i32;
    let dy = reference.1 as i32 - anchor.1 as i32;
    if dx == 0 && dy == 0 {
        return;
    }

    *image = warp(
        image,
        &Projection::translate(dx as f32, dy as f32),
        Interpolation::Nearest,
        WHITE,
    );
}
