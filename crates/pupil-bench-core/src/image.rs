use image::{GrayImage, RgbImage};
use imageproc::contrast::{threshold, ThresholdType};

/// Decoded color frame as handed out by the dataset readers.
pub type Frame = RgbImage;

/// Luma conversion applied to every frame before it reaches a detector.
#[inline]
pub fn to_gray(frame: &Frame) -> GrayImage {
    image::imageops::grayscale(frame)
}

/// Binary image: pixels strictly above `level` become 255, the rest 0.
#[inline]
pub fn binarize(gray: &GrayImage, level: u8) -> GrayImage {
    threshold(gray, level, ThresholdType::Binary)
}

/// Inverted binary image: pixels at or below `level` become 255.
#[inline]
pub fn binarize_dark(gray: &GrayImage, level: u8) -> GrayImage {
    threshold(gray, level, ThresholdType::BinaryInverted)
}

/// Intensity below which `fraction` of the pixels fall.
pub fn dark_percentile(gray: &GrayImage, fraction: f64) -> u8 {
    let total = gray.as_raw().len();
    if total == 0 {
        return 0;
    }
    let mut hist = [0usize; 256];
    for &v in gray.as_raw() {
        hist[v as usize] += 1;
    }
    let wanted = ((total as f64) * fraction.clamp(0.0, 1.0)).ceil() as usize;
    let mut acc = 0usize;
    for (level, &count) in hist.iter().enumerate() {
        acc += count;
        if acc >= wanted.max(1) {
            return level as u8;
        }
    }
    u8::MAX
}
