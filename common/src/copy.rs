use std::io::{Read, Seek, Write};
use std::num::NonZeroUsize;

use tracing::instrument;

use crate::clock::Clock;
use crate::preserve;
use crate::progress::{self, Eta, Frame, Renderer};

/// Chunk size for local disks, small enough to keep the bar responsive.
pub const LOCAL_CHUNK_SIZE: NonZeroUsize = NonZeroUsize::new(8 * 1024 * 1024).unwrap();

/// Chunk size for network mounts, where fewer and larger requests pay off.
pub const NETWORK_CHUNK_SIZE: NonZeroUsize = NonZeroUsize::new(64 * 1024 * 1024).unwrap();

/// Minimum time between throughput samples.
pub const SAMPLE_INTERVAL: std::time::Duration = std::time::Duration::from_millis(250);

/// Minimum time between ETA recomputations.
pub const ETA_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// Error type for copy operations.
///
/// Every variant names the file involved; the I/O error that caused it is the `source`, so
/// logging with `{:#}` through anyhow shows the whole chain on one line.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot open source file {path:?}")]
    OpenSource {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot create destination file {path:?}")]
    CreateDest {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot determine the size of {path:?}")]
    SizeProbe {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("read from {path:?} failed after {copied} bytes")]
    Read {
        path: std::path::PathBuf,
        copied: u64,
        #[source]
        source: std::io::Error,
    },
    #[error("write to {path:?} failed after {copied} bytes")]
    Write {
        path: std::path::PathBuf,
        copied: u64,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Bytes that made it to the destination before the failure.
    #[must_use]
    pub fn bytes_copied(&self) -> u64 {
        match self {
            Error::Read { copied, .. } | Error::Write { copied, .. } => *copied,
            _ => 0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Settings {
    pub chunk_size: NonZeroUsize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: LOCAL_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub bytes_copied: u64,
    pub chunks: u64,
    pub elapsed: std::time::Duration,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{:.2}MB copied in {:.3}s",
            progress::megabytes(self.bytes_copied),
            self.elapsed.as_secs_f64()
        )
    }
}

/// Byte counters and sampling timestamps of a single transfer.
///
/// Timestamps are offsets from the start of the copy loop. The session is fed by the loop only and
/// decides when a new frame is due: a throughput sample every [`SAMPLE_INTERVAL`] and an ETA
/// refresh every [`ETA_INTERVAL`], each on its own timer.
#[derive(Debug, Clone)]
pub struct Session {
    total: u64,
    copied: u64,
    chunks: u64,
    last_sample_at: std::time::Duration,
    last_sample_bytes: u64,
    last_eta_at: std::time::Duration,
    sampled: bool,
    speed: f64,
    eta: Eta,
}

impl Session {
    #[must_use]
    pub fn new(total: u64) -> Self {
        Self {
            total,
            copied: 0,
            chunks: 0,
            last_sample_at: std::time::Duration::ZERO,
            last_sample_bytes: 0,
            last_eta_at: std::time::Duration::ZERO,
            sampled: false,
            speed: 0.0,
            eta: Eta::default(),
        }
    }

    #[must_use]
    pub fn copied(&self) -> u64 {
        self.copied
    }

    /// Last sampled throughput in bytes per second.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    #[must_use]
    pub fn eta(&self) -> Eta {
        self.eta
    }

    fn frame(&self) -> Frame {
        Frame::new(self.copied, self.total, self.speed, self.eta)
    }

    /// Accounts for another chunk of `bytes` finished at `now` and returns the frames to draw.
    pub fn advance(
        &mut self,
        bytes: u64,
        now: std::time::Duration,
    ) -> impl Iterator<Item = Frame> + use<> {
        self.copied += bytes;
        self.chunks += 1;
        let mut sample_frame = None;
        let since_sample = now.saturating_sub(self.last_sample_at);
        if since_sample >= SAMPLE_INTERVAL {
            self.speed =
                (self.copied - self.last_sample_bytes) as f64 / since_sample.as_secs_f64();
            self.sampled = true;
            self.last_sample_at = now;
            self.last_sample_bytes = self.copied;
            sample_frame = Some(self.frame());
        }
        let mut eta_frame = None;
        if now.saturating_sub(self.last_eta_at) >= ETA_INTERVAL {
            // an unknown speed keeps the previous estimate
            if let Some(eta) = Eta::estimate(self.total.saturating_sub(self.copied), self.speed) {
                self.eta = eta;
            }
            self.last_eta_at = now;
            eta_frame = Some(self.frame());
        }
        sample_frame.into_iter().chain(eta_frame)
    }

    /// The closing 100% frame.
    ///
    /// Shows the last sampled speed, or the overall average when the copy finished before the
    /// first sample was taken.
    #[must_use]
    pub fn final_frame(&self, elapsed: std::time::Duration) -> Frame {
        let speed = if self.sampled || elapsed.is_zero() {
            self.speed
        } else {
            self.copied as f64 / elapsed.as_secs_f64()
        };
        Frame {
            percent: 100.0,
            speed_mbps: speed / progress::BYTES_PER_MB,
            eta: Eta::default(),
        }
    }

    #[must_use]
    pub fn summary(&self, elapsed: std::time::Duration) -> Summary {
        Summary {
            bytes_copied: self.copied,
            chunks: self.chunks,
            elapsed,
        }
    }
}

/// Best effort: a failure is logged as a warning and does not fail the copy.
fn propagate_permissions(src: &std::path::Path, dst: &std::path::Path) {
    tracing::debug!("setting permissions");
    if let Err(error) = preserve::copy_permissions(src, dst) {
        tracing::warn!("permissions not propagated: {:#}", &error);
    }
}

/// Streams one file into another, drawing progress to `out` as it goes.
pub struct Engine<'a, C: Clock, O: Write> {
    settings: Settings,
    clock: &'a C,
    renderer: Renderer<'a>,
    out: O,
    drawn: bool,
}

impl<'a, C: Clock, O: Write> Engine<'a, C, O> {
    pub fn new(settings: Settings, clock: &'a C, renderer: Renderer<'a>, out: O) -> Self {
        Self {
            settings,
            clock,
            renderer,
            out,
            drawn: false,
        }
    }

    /// Gives back the progress output, e.g. to inspect what was drawn.
    pub fn into_output(self) -> O {
        self.out
    }

    fn draw(&mut self, frame: &Frame) {
        self.drawn = true;
        if let Err(error) = self.renderer.render(&mut self.out, frame) {
            tracing::debug!("failed drawing progress: {}", &error);
        }
    }

    fn print_line(&mut self, line: std::fmt::Arguments) {
        if let Err(error) = self.out.write_fmt(line).and_then(|()| self.out.flush()) {
            tracing::debug!("failed writing to progress output: {}", &error);
        }
    }

    /// Copies `src` into `dst`, creating or truncating it, then copies the permission bits over.
    #[instrument(skip(self))]
    pub fn copy_file(
        &mut self,
        src: &std::path::Path,
        dst: &std::path::Path,
    ) -> Result<Summary, Error> {
        tracing::debug!("opening 'src' for reading and 'dst' for writing");
        let mut reader = std::fs::File::open(src).map_err(|source| Error::OpenSource {
            path: src.to_owned(),
            source,
        })?;
        let mut writer = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(dst)
            .map_err(|source| Error::CreateDest {
                path: dst.to_owned(),
                source,
            })?;
        let summary = self.copy_stream(&mut reader, &mut writer, src, dst)?;
        drop(writer);
        drop(reader);
        propagate_permissions(src, dst);
        Ok(summary)
    }

    /// Core copy loop over already opened endpoints.
    ///
    /// `src` and `dst` only label errors. Each chunk is written with a single `write` call and a
    /// short write is an error: nothing is retried and whatever was written stays in place.
    #[instrument(skip(self, reader, writer))]
    pub fn copy_stream<R: Read + Seek, W: Write>(
        &mut self,
        reader: &mut R,
        writer: &mut W,
        src: &std::path::Path,
        dst: &std::path::Path,
    ) -> Result<Summary, Error> {
        let probe = |source| Error::SizeProbe {
            path: src.to_owned(),
            source,
        };
        let total = reader.seek(std::io::SeekFrom::End(0)).map_err(probe)?;
        reader.rewind().map_err(probe)?;
        tracing::debug!(
            "copying {} in chunks of {}",
            bytesize::ByteSize(total),
            bytesize::ByteSize(self.settings.chunk_size.get() as u64)
        );
        let start = self.clock.elapsed();
        let mut session = Session::new(total);
        let result = self.stream_chunks(&mut session, start, reader, writer, src, dst);
        if let Err(error) = result {
            if self.drawn {
                // keep the diagnostic off the progress line
                self.print_line(format_args!("\n"));
            }
            return Err(error);
        }
        let elapsed = self.clock.elapsed().saturating_sub(start);
        let frame = session.final_frame(elapsed);
        self.draw(&frame);
        let summary = session.summary(elapsed);
        self.print_line(format_args!("\n{}\n", summary));
        tracing::info!(
            "copied {} in {} chunks",
            bytesize::ByteSize(summary.bytes_copied),
            summary.chunks
        );
        Ok(summary)
    }

    fn stream_chunks<R: Read, W: Write>(
        &mut self,
        session: &mut Session,
        start: std::time::Duration,
        reader: &mut R,
        writer: &mut W,
        src: &std::path::Path,
        dst: &std::path::Path,
    ) -> Result<(), Error> {
        let mut buffer = vec![0u8; self.settings.chunk_size.get()];
        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => return Ok(()),
                Ok(read) => read,
                Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(Error::Read {
                        path: src.to_owned(),
                        copied: session.copied(),
                        source,
                    });
                }
            };
            let written = writer
                .write(&buffer[..read])
                .map_err(|source| Error::Write {
                    path: dst.to_owned(),
                    copied: session.copied(),
                    source,
                })?;
            if written != read {
                return Err(Error::Write {
                    path: dst.to_owned(),
                    copied: session.copied() + written as u64,
                    source: std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        format!("short write: {written} of {read} bytes"),
                    ),
                });
            }
            let now = self.clock.elapsed().saturating_sub(start);
            for frame in session.advance(written as u64, now) {
                self.draw(&frame);
            }
        }
    }
}
