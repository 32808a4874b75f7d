//! Glyph and color tables for the progress bar.
//!
//! A [`Style`] is built once from the display mode chosen on the command line and then only ever
//! borrowed; switching modes means building a new value.

use anyhow::anyhow;

/// Block elements rising from empty to a full cell in eighths.
const UNICODE_BLOCKS: &[&str] = &[" ", "▁", "▂", "▃", "▄", "▅", "▆", "▇", "█"];

/// Shade characters for terminals limited to the CP437 repertoire.
const LEGACY_BLOCKS: &[&str] = &["░", "▒", "▓", "█"];

/// How the progress line should be drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayMode {
    /// Eighth-block glyphs with 256-color escapes.
    #[default]
    Unicode,
    /// Four shade glyphs and no escape sequences at all.
    Legacy,
}

/// Ordered fill glyphs: index 0 is an empty cell, the last index is a full cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphPalette {
    glyphs: &'static [&'static str],
}

impl GlyphPalette {
    pub fn new(glyphs: &'static [&'static str]) -> anyhow::Result<Self> {
        if glyphs.len() < 2 {
            return Err(anyhow!(
                "glyph palette needs at least 2 glyphs, got {}",
                glyphs.len()
            ));
        }
        Ok(Self { glyphs })
    }

    #[must_use]
    pub const fn unicode() -> Self {
        Self {
            glyphs: UNICODE_BLOCKS,
        }
    }

    #[must_use]
    pub const fn legacy() -> Self {
        Self {
            glyphs: LEGACY_BLOCKS,
        }
    }

    /// Fill steps within a single cell.
    #[must_use]
    pub fn steps_per_cell(&self) -> usize {
        self.glyphs.len() - 1
    }

    #[must_use]
    pub fn empty(&self) -> &'static str {
        self.glyphs[0]
    }

    #[must_use]
    pub fn full(&self) -> &'static str {
        self.glyphs[self.glyphs.len() - 1]
    }

    /// Glyph for a cell filled `step` steps out of [`Self::steps_per_cell`].
    #[must_use]
    pub fn partial(&self, step: usize) -> &'static str {
        self.glyphs[step.min(self.steps_per_cell())]
    }
}

/// Escape sequences keyed by what they color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorPalette {
    pub bar_fg: &'static str,
    pub bar_bg: &'static str,
    pub percent: &'static str,
    pub speed: &'static str,
    pub time: &'static str,
    pub reset: &'static str,
    pub clear_line: &'static str,
}

impl ColorPalette {
    /// 256-color and truecolor escapes.
    pub const ANSI: Self = Self {
        bar_fg: "\x1b[38;5;26m",
        bar_bg: "\x1b[48;2;0;0;30m",
        percent: "\x1b[38;5;220m",
        speed: "\x1b[38;5;160m",
        time: "\x1b[38;5;91m",
        reset: "\x1b[0m",
        clear_line: "\x1b[K",
    };

    /// Every role collapses to the empty string.
    pub const PLAIN: Self = Self {
        bar_fg: "",
        bar_bg: "",
        percent: "",
        speed: "",
        time: "",
        reset: "",
        clear_line: "",
    };
}

/// Everything the renderer needs to know about how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    pub glyphs: GlyphPalette,
    pub colors: ColorPalette,
}

impl Style {
    #[must_use]
    pub const fn for_mode(mode: DisplayMode) -> Self {
        match mode {
            DisplayMode::Unicode => Self {
                glyphs: GlyphPalette::unicode(),
                colors: ColorPalette::ANSI,
            },
            DisplayMode::Legacy => Self {
                glyphs: GlyphPalette::legacy(),
                colors: ColorPalette::PLAIN,
            },
        }
    }
}

impl Default for Style {
    fn default() -> Self {
        Self::for_mode(DisplayMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unicode_style() {
        let style = Style::for_mode(DisplayMode::Unicode);
        assert_eq!(style.glyphs.steps_per_cell(), 8);
        assert_eq!(style.glyphs.empty(), " ");
        assert_eq!(style.glyphs.full(), "█");
        assert_eq!(style.colors, ColorPalette::ANSI);
    }

    #[test]
    fn legacy_style_has_no_escapes() {
        let style = Style::for_mode(DisplayMode::Legacy);
        assert_eq!(style.glyphs.steps_per_cell(), 3);
        assert_eq!(style.glyphs.empty(), "░");
        assert_eq!(style.glyphs.full(), "█");
        let colors = style.colors;
        for code in [
            colors.bar_fg,
            colors.bar_bg,
            colors.percent,
            colors.speed,
            colors.time,
            colors.reset,
            colors.clear_line,
        ] {
            assert!(code.is_empty());
        }
    }

    #[test]
    fn palette_needs_two_glyphs() {
        assert!(GlyphPalette::new(&["x"]).is_err());
        assert!(GlyphPalette::new(&[]).is_err());
        let palette = GlyphPalette::new(&["-", "="]).unwrap();
        assert_eq!(palette.steps_per_cell(), 1);
        assert_eq!(palette.partial(5), "=");
    }
}
