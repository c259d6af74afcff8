/// Recording session - capture the master bus and hand it out as a download
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub mod filename;
pub mod object_url;

pub use filename::safe_file_base_name;
pub use object_url::{ObjectUrl, ObjectUrlStore, RELEASE_DELAY};

use crate::sequencer::transport::TransportClock;
use crate::sequencer::SynthPool;
use crate::{Error, Result};

/// Finalized audio with its declared media type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl Blob {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Captures the mixed output between `start` and `stop`.
pub trait Recorder {
    fn start(&mut self);
    fn stop(&mut self) -> Result<Blob>;
}

/// File extension for a blob's declared type.
///
/// A guess from the type string, not from the container itself.
pub fn extension_for_mime(mime: &str) -> &'static str {
    let mime = mime.to_ascii_lowercase();
    if mime.contains("ogg") {
        "ogg"
    } else if mime.contains("wav") {
        "wav"
    } else {
        "webm"
    }
}

/// A finished recording offered for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub url: ObjectUrl,
    pub filename: String,
    pub mime: String,
}

/// Write the blob behind `download` into `dir` under its suggested file name.
pub fn save_download(dir: &Path, download: &Download, urls: &ObjectUrlStore) -> Result<PathBuf> {
    let blob = urls
        .resolve(&download.url)
        .ok_or_else(|| Error::RevokedUrl(download.url.to_string()))?;

    fs::create_dir_all(dir)?;
    let path = dir.join(&download.filename);
    fs::write(&path, &blob.bytes)?;
    tracing::info!(path = %path.display(), bytes = blob.len(), "recording saved");
    Ok(path)
}

pub struct RecordingSession<R> {
    recorder: R,
    recording: bool,
    urls: ObjectUrlStore,
    preview: Option<ObjectUrl>,
}

impl<R: Recorder> RecordingSession<R> {
    pub fn new(recorder: R) -> Self {
        Self {
            recorder,
            recording: false,
            urls: ObjectUrlStore::new(),
            preview: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    pub fn urls(&self) -> &ObjectUrlStore {
        &self.urls
    }

    /// URL currently attached to the preview player
    pub fn preview(&self) -> Option<&ObjectUrl> {
        self.preview.as_ref()
    }

    pub fn preview_blob(&self) -> Option<&Blob> {
        self.preview.as_ref().and_then(|url| self.urls.resolve(url))
    }

    /// Unlock audio, start capturing and make sure the transport runs.
    /// A second call while recording is ignored.
    pub fn start<S, C>(&mut self, synths: &mut S, clock: &mut C) -> Result<()>
    where
        S: SynthPool + ?Sized,
        C: TransportClock + ?Sized,
    {
        if self.recording {
            tracing::debug!("already recording, start ignored");
            return Ok(());
        }

        synths.unlock()?;
        self.recording = true;
        self.recorder.start();

        if !clock.state().is_started() {
            clock.start();
        }
        tracing::info!("recording started");
        Ok(())
    }

    /// Finalize the capture into a download named after `track_name`.
    /// Returns `None` when nothing was being recorded.
    pub fn stop(&mut self, track_name: &str, now: Instant) -> Result<Option<Download>> {
        if !self.recording {
            return Ok(None);
        }
        self.recording = false;

        let blob = self.recorder.stop()?;
        let filename = format!(
            "{}.{}",
            safe_file_base_name(track_name),
            extension_for_mime(&blob.mime)
        );
        let mime = blob.mime.clone();
        let size = blob.len();

        let url = self.urls.create(blob, now);
        self.preview = Some(url.clone());
        self.urls.release_after(&url, now, RELEASE_DELAY);

        tracing::info!(%filename, bytes = size, "recording stopped");
        Ok(Some(Download {
            url,
            filename,
            mime,
        }))
    }

    /// Release object URLs whose delay has run out.
    pub fn sweep(&mut self, now: Instant) -> Vec<ObjectUrl> {
        let released = self.urls.sweep(now);
        if self.preview.as_ref().is_some_and(|url| released.contains(url)) {
            self.preview = None;
        }
        released
    }
}
