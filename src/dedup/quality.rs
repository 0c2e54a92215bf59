//! Sharpness scoring via Laplacian variance.
//!
//! The Laplacian responds to rapid intensity changes, so a sharp image has
//! more high-frequency content and a higher variance of the response. Blurry
//! photos score low.

use image::GrayImage;

/// Variance of the 3x3 Laplacian response over a grayscale image.
///
/// Images smaller than the kernel score 0.0.
pub fn sharpness(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();

    if width < 3 || height < 3 {
        return 0.0;
    }

    // [ 0  1  0 ]
    // [ 1 -4  1 ]
    // [ 0  1  0 ]
    let mut responses = Vec::with_capacity(((width - 2) * (height - 2)) as usize);
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let center = gray.get_pixel(x, y)[0] as i32;
            let top = gray.get_pixel(x, y - 1)[0] as i32;
            let bottom = gray.get_pixel(x, y + 1)[0] as i32;
            let left = gray.get_pixel(x - 1, y)[0] as i32;
            let right = gray.get_pixel(x + 1, y)[0] as i32;

            responses.push((top + bottom + left + right - 4 * center) as f64);
        }
    }

    variance(&responses)
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}
