//! Progress line rendering.
//!
//! Everything here is a pure function of the values passed in: the renderer never looks at the
//! clock or at the transfer itself, which keeps the copy loop in charge of when a frame is drawn.

use crate::palette::Style;

pub const BYTES_PER_MB: f64 = 1_048_576.0;

/// Estimated time remaining, split for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Eta {
    pub minutes: u64,
    pub seconds: u8,
}

impl Eta {
    #[must_use]
    pub fn from_secs(secs: u64) -> Self {
        Self {
            minutes: secs / 60,
            seconds: (secs % 60) as u8,
        }
    }

    /// Whole seconds needed to move `remaining` bytes at `bytes_per_sec`.
    ///
    /// Returns `None` while the speed is zero or not a finite number.
    #[must_use]
    pub fn estimate(remaining: u64, bytes_per_sec: f64) -> Option<Self> {
        if !bytes_per_sec.is_finite() || bytes_per_sec <= 0.0 {
            return None;
        }
        // float to int casts saturate, so a crawling transfer just shows a huge ETA
        let secs = (remaining as f64 / bytes_per_sec) as u64;
        Some(Self::from_secs(secs))
    }
}

impl std::fmt::Display for Eta {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}m{}s", self.minutes, self.seconds)
    }
}

/// One redraw worth of values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub percent: f64,
    pub speed_mbps: f64,
    pub eta: Eta,
}

impl Frame {
    #[must_use]
    pub fn new(copied: u64, total: u64, bytes_per_sec: f64, eta: Eta) -> Self {
        Self {
            percent: percent(copied, total),
            speed_mbps: bytes_per_sec / BYTES_PER_MB,
            eta,
        }
    }
}

/// Share of `total` already copied, in percent. An empty transfer is complete.
#[must_use]
pub fn percent(copied: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    100.0 * copied as f64 / total as f64
}

#[must_use]
pub fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}

/// How a bar of a given width splits into full, partial and empty cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarCells {
    pub full: usize,
    /// Fill step of the single partially filled cell, if there is one.
    pub partial: Option<usize>,
    pub empty: usize,
}

/// Splits `width` cells, each holding `steps_per_cell` fill steps, for the given percentage.
#[must_use]
pub fn bar_cells(percent: f64, width: usize, steps_per_cell: usize) -> BarCells {
    let percent = clamp_percent(percent);
    let total_steps = width * steps_per_cell;
    let filled_steps = ((percent / 100.0 * total_steps as f64) as usize).min(total_steps);
    let full = filled_steps / steps_per_cell;
    let remainder = filled_steps % steps_per_cell;
    let partial = (remainder > 0 && full < width).then_some(remainder);
    let empty = width - full - usize::from(partial.is_some());
    BarCells {
        full,
        partial,
        empty,
    }
}

/// Draws progress lines in a fixed style and bar width.
#[derive(Debug, Clone, Copy)]
pub struct Renderer<'a> {
    style: &'a Style,
    bar_width: usize,
}

impl<'a> Renderer<'a> {
    #[must_use]
    pub fn new(style: &'a Style, bar_width: usize) -> Self {
        Self {
            style,
            bar_width: bar_width.max(1),
        }
    }

    #[must_use]
    pub fn bar_width(&self) -> usize {
        self.bar_width
    }

    /// Just the glyph cells, without colors.
    #[must_use]
    pub fn bar(&self, percent: f64) -> String {
        let glyphs = &self.style.glyphs;
        let cells = bar_cells(percent, self.bar_width, glyphs.steps_per_cell());
        let mut bar = glyphs.full().repeat(cells.full);
        if let Some(step) = cells.partial {
            bar.push_str(glyphs.partial(step));
        }
        bar.push_str(&glyphs.empty().repeat(cells.empty));
        bar
    }

    /// Full progress line, starting with a carriage return so it overwrites the previous one.
    #[must_use]
    pub fn line(&self, frame: &Frame) -> String {
        let colors = &self.style.colors;
        let percent = clamp_percent(frame.percent);
        format!(
            "\r{}{}{}{}{} {}{:6.2}% {}{:4.1}MB/s {}{}{}",
            colors.clear_line,
            colors.bar_bg,
            colors.bar_fg,
            self.bar(percent),
            colors.reset,
            colors.percent,
            percent,
            colors.speed,
            frame.speed_mbps,
            colors.time,
            frame.eta,
            colors.reset,
        )
    }

    /// Writes the line for `frame` and flushes so it shows up right away.
    pub fn render<W: std::io::Write>(&self, out: &mut W, frame: &Frame) -> std::io::Result<()> {
        out.write_all(self.line(frame).as_bytes())?;
        out.flush()
    }
}
