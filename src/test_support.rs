//! Synthetic scans for unit tests.

use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::image_utils::{BLACK, WHITE};
use crate::types::{Coord, HeaderRect};

pub const BOX_SIDE: i32 = 24;
pub const BOX_BORDER: i32 = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mark {
    Empty,
    Filled,
    Cross,
}

pub fn blank_page(width: u32, height: u32) -> GrayImage {
    GrayImage::from_pixel(width, height, WHITE)
}

/// Draws a printed box of `BOX_SIDE` pixels centered on `center`.
pub fn draw_checkbox(img: &mut GrayImage, center: Coord, mark: Mark) {
    let left = center.0 - BOX_SIDE / 2;
    let top = center.1 - BOX_SIDE / 2;
    for dy in 0..BOX_SIDE {
        for dx in 0..BOX_SIDE {
            let border = dx < BOX_BORDER
                || dy < BOX_BORDER
                || dx >= BOX_SIDE - BOX_BORDER
                || dy >= BOX_SIDE - BOX_BORDER;
            let inked = border
                || match mark {
                    Mark::Empty => false,
                    Mark::Filled => true,
                    Mark::Cross => (dx - dy).abs() <= 1 || (dx + dy - (BOX_SIDE - 1)).abs() <= 1,
                };
            if inked {
                put(img, left + dx, top + dy, BLACK);
            }
        }
    }
}

/// Draws a solid dark bar, standing in for a printed header.
pub fn draw_bar(img: &mut GrayImage, left: i32, top: i32, width: u32, height: u32) {
    draw_filled_rect_mut(img, Rect::at(left, top).of_size(width, height), BLACK);
}

fn put(img: &mut GrayImage, x: i32, y: i32, luma: Luma<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, luma);
    }
}

/// Moves the content of `img` by `(dx, dy)`, filling with white.
pub fn translated(img: &GrayImage, dx: i32, dy: i32) -> GrayImage {
    let mut out = blank_page(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        put(&mut out, x as i32 + dx, y as i32 + dy, *pixel);
    }
    out
}

/// Header rectangle used by the synthetic forms.
pub fn form_header() -> HeaderRect {
    HeaderRect::new(20, 10, 380, 70)
}

/// Question centers used by the synthetic forms: a yes/no question and a
/// three-way choice.
pub fn form_coords() -> (Vec<Coord>, Vec<Coord>) {
    (vec![(120, 120), (200, 120)], vec![(120, 180), (200, 180), (280, 180)])
}

/// A 400×260 form with a header bar and the boxes of `form_coords`, marked as
/// given, shifted by `(dx, dy)`.
pub fn synthetic_form(yes_no: [Mark; 2], choice: [Mark; 3], dx: i32, dy: i32) -> GrayImage {
    let mut page = blank_page(400, 260);
    draw_bar(&mut page, 40 + dx, 25 + dy, 300, 24);
    let (yes_no_coords, choice_coords) = form_coords();
    for (center, mark) in yes_no_coords.iter().zip(yes_no) {
        draw_checkbox(&mut page, (center.0 + dx, center.1 + dy), mark);
    }
    for (center, mark) in choice_coords.iter().zip(choice) {
        draw_checkbox(&mut page, (center.0 + dx, center.1 + dy), mark);
    }
    page
}
