use image::{imageops, GrayImage, Luma, Rgb};

pub const WHITE: Luma<u8> = Luma([u8::MAX]);
pub const BLACK: Luma<u8> = Luma([u8::MIN]);

pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
pub const PINK: Rgb<u8> = Rgb([255, 0, 255]);

/// Whether a pixel counts as ink, i.e. is darker than `threshold`.
pub fn is_ink(pixel: &Luma<u8>, threshold: u8) -> bool {
    pixel.0[0] < threshold
}

/// Copies the region starting at `(x, y)` of the given size out of `img`. The
/// region is clipped to the image bounds, so the result may be smaller than
/// requested (or empty).
pub fn crop(img: &GrayImage, x: u32, y: u32, width: u32, height: u32) -> GrayImage {
    imageops::crop_imm(img, x, y, width, height).to_image()
}

/// Number of ink pixels in column `x` between rows `from` (inclusive) and
/// `to` (exclusive), clipped to the image.
pub fn count_ink_in_column(img: &GrayImage, x: u32, from: u32, to: u32, threshold: u8) -> u32 {
    if x >= img.width() {
        return 0;
    }
    (from..to.min(img.height()))
        .filter(|y| is_ink(img.get_pixel(x, *y), threshold))
        .count() as u32
}

/// Number of ink pixels in row `y` between columns `from` (inclusive) and
/// `to` (exclusive), clipped to the image.
pub fn count_ink_in_row(img: &GrayImage, y: u32, from: u32, to: u32, threshold: u8) -> u32 {
    if y >= img.height() {
        return 0;
    }
    (from..to.min(img.width()))
        .filter(|x| is_ink(img.get_pixel(*x, y), threshold))
        .count() as u32
}

/// Index of the first column containing any ink.
pub fn first_ink_column(img: &GrayImage, threshold: u8) -> Option<u32> {
    (0..img.width()).find(|x| count_ink_in_column(img, *x, 0, img.height(), threshold) > 0)
}

/// Index of the first row containing any ink.
pub fn first_ink_row(img: &GrayImage, threshold: u8) -> Option<u32> {
    (0..img.height()).find(|y| count_ink_in_row(img, *y, 0, img.width(), threshold) > 0)
}

/// Tight bounding box of all ink pixels as `(left, top, right, bottom)`, all
/// inclusive.
pub fn ink_bounds(img: &GrayImage, threshold: u8) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in img.enumerate_pixels() {
        if !is_ink(pixel, threshold) {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((left, top, right, bottom)) => {
                (left.min(x), top.min(y), right.max(x), bottom.max(y))
            }
        });
    }
    bounds
}

/// Coordinates of every ink pixel, as `(x, y)`.
pub fn ink_points(img: &GrayImage, threshold: u8) -> Vec<(f64, f64)> {
    img.enumerate_pixels()
        .filter(|(_, _, pixel)| is_ink(pixel, threshold))
        .map(|(x, y, _)| (x as f64, y as f64))
        .collect()
}

/// Mean luma of all pixels, or white for an empty image.
pub fn mean_intensity(img: &GrayImage) -> f32 {
    let total = img.width() as u64 * img.height() as u64;
    if total == 0 {
        return WHITE.0[0] as f32;
    }
    let sum: u64 = img.pixels().map(|p| p.0[0] as u64).sum();
    (sum as f64 / total as f64) as f32
}
