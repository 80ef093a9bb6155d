//! Container decoding through OpenCV's `VideoCapture`.

use std::path::{Path, PathBuf};

use image::RgbImage;
use opencv::core::{Mat, CV_8UC3};
use opencv::prelude::*;
use opencv::videoio::{VideoCapture, CAP_ANY};

use crate::video::{FrameStream, VideoBackend};
use crate::VideoError;

#[derive(Clone, Copy, Debug, Default)]
pub struct OpenCvBackend;

fn backend_error(path: &Path, err: impl std::fmt::Display) -> VideoError {
    VideoError::Backend {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

impl VideoBackend for OpenCvBackend {
    fn name(&self) -> &'static str {
        "opencv"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn FrameStream>, VideoError> {
        if !path.is_file() {
            return Err(VideoError::NotFound(path.to_path_buf()));
        }
        let name = path
            .to_str()
            .ok_or_else(|| backend_error(path, "path is not valid UTF-8"))?;
        let capture = VideoCapture::from_file(name, CAP_ANY).map_err(|e| backend_error(path, e))?;
        if !capture.is_opened().map_err(|e| backend_error(path, e))? {
            return Err(backend_error(path, "cannot open video"));
        }
        Ok(Box::new(OpenCvStream {
            path: path.to_path_buf(),
            capture,
        }))
    }
}

struct OpenCvStream {
    path: PathBuf,
    capture: VideoCapture,
}

impl FrameStream for OpenCvStream {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, VideoError> {
        let mut mat = Mat::default();
        let ok = self
            .capture
            .read(&mut mat)
            .map_err(|e| backend_error(&self.path, e))?;
        if !ok || mat.rows() <= 0 || mat.cols() <= 0 {
            return Ok(None);
        }
        if mat.typ() != CV_8UC3 {
            return Err(backend_error(&self.path, "expected 8-bit BGR frames"));
        }
        let bgr = if mat.is_continuous() {
            mat
        } else {
            mat.try_clone().map_err(|e| backend_error(&self.path, e))?
        };
        let (width, height) = (bgr.cols() as u32, bgr.rows() as u32);
        let bytes = bgr.data_bytes().map_err(|e| backend_error(&self.path, e))?;
        let mut rgb = Vec::with_capacity(bytes.len());
        for px in bytes.chunks_exact(3) {
            rgb.extend_from_slice(&[px[2], px[1], px[0]]);
        }
        RgbImage::from_raw(width, height, rgb)
            .map(Some)
            .ok_or_else(|| backend_error(&self.path, "frame buffer size mismatch"))
    }
}
