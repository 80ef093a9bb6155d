//! Video decoding seam.
//!
//! Readers never decode containers themselves. They ask a [`VideoBackend`]
//! to open a path and then pull frames from the returned [`FrameStream`]
//! until it reports end-of-stream with `Ok(None)`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::RgbImage;

use crate::VideoError;

/// Forward-only frame source with explicit end-of-stream.
pub trait FrameStream {
    /// Next decoded frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, VideoError>;

    /// Discard up to `count` frames; returns how many were actually skipped.
    fn skip_frames(&mut self, count: usize) -> Result<usize, VideoError> {
        for skipped in 0..count {
            if self.next_frame()?.is_none() {
                return Ok(skipped);
            }
        }
        Ok(count)
    }
}

/// Opens video paths into frame streams.
pub trait VideoBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn open(&self, path: &Path) -> Result<Box<dyn FrameStream>, VideoError>;

    /// Video paths with the given extension directly inside `dir`, sorted.
    fn list_videos(&self, dir: &Path, extension: &str) -> Result<Vec<PathBuf>, VideoError> {
        list_files_with_extension(dir, extension)
    }
}

pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

fn list_files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, VideoError> {
    let entries = fs::read_dir(dir).map_err(|source| VideoError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut out = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| VideoError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if path.is_file() && has_extension(&path, extension) {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// File name of frame `index` inside an image-sequence directory.
pub fn sequence_frame_name(index: usize) -> String {
    format!("{index:04}.png")
}

/// Directory holding the frames of `video` for the image-sequence backend.
pub fn sequence_dir(video: &Path) -> PathBuf {
    video.with_extension("")
}

/// Reads a video `<dir>/<stem>.<ext>` from the numbered PNG frames in
/// `<dir>/<stem>/` (`0000.png`, `0001.png`, ...). The stream ends at the
/// first missing index.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageSequenceBackend;

impl VideoBackend for ImageSequenceBackend {
    fn name(&self) -> &'static str {
        "image_sequence"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn FrameStream>, VideoError> {
        let dir = sequence_dir(path);
        if !dir.is_dir() {
            return Err(VideoError::NotFound(path.to_path_buf()));
        }
        Ok(Box::new(ImageSequenceStream { dir, next: 0 }))
    }

    fn list_videos(&self, dir: &Path, extension: &str) -> Result<Vec<PathBuf>, VideoError> {
        let mut out = list_files_with_extension(dir, extension)?;
        let entries = fs::read_dir(dir).map_err(|source| VideoError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() && path.join(sequence_frame_name(0)).is_file() {
                out.push(path.with_extension(extension));
            }
        }
        out.sort();
        out.dedup();
        Ok(out)
    }
}

struct ImageSequenceStream {
    dir: PathBuf,
    next: usize,
}

impl FrameStream for ImageSequenceStream {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, VideoError> {
        let path = self.dir.join(sequence_frame_name(self.next));
        if !path.is_file() {
            return Ok(None);
        }
        let frame = image::open(&path)
            .map_err(|source| VideoError::Decode {
                path: path.clone(),
                index: self.next,
                source,
            })?
            .to_rgb8();
        self.next += 1;
        Ok(Some(frame))
    }

    fn skip_frames(&mut self, count: usize) -> Result<usize, VideoError> {
        let mut skipped = 0;
        while skipped < count && self.dir.join(sequence_frame_name(self.next)).is_file() {
            self.next += 1;
            skipped += 1;
        }
        Ok(skipped)
    }
}

/// In-memory videos keyed by path, for fixtures and dry runs.
#[derive(Default)]
pub struct MemoryBackend {
    videos: HashMap<PathBuf, Vec<RgbImage>>,
    opened: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, frames: Vec<RgbImage>) {
        self.videos.insert(path.into(), frames);
    }

    pub fn with_video(mut self, path: impl Into<PathBuf>, frames: Vec<RgbImage>) -> Self {
        self.insert(path, frames);
        self
    }

    /// Number of successful `open` calls so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}

impl VideoBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn FrameStream>, VideoError> {
        let frames = self
            .videos
            .get(path)
            .ok_or_else(|| VideoError::NotFound(path.to_path_buf()))?;
        self.opened.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(MemoryStream {
            frames: frames.clone().into_iter(),
        }))
    }

    fn list_videos(&self, dir: &Path, extension: &str) -> Result<Vec<PathBuf>, VideoError> {
        let mut out: Vec<PathBuf> = self
            .videos
            .keys()
            .filter(|p| p.parent() == Some(dir) && has_extension(p, extension))
            .cloned()
            .collect();
        out.sort();
        Ok(out)
    }
}

struct MemoryStream {
    frames: std::vec::IntoIter<RgbImage>,
}

impl FrameStream for MemoryStream {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, VideoError> {
        Ok(self.frames.next())
    }
}
