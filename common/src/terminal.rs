//! Terminal width queries used to size the progress bar.

/// Width assumed when no query succeeds.
pub const DEFAULT_COLUMNS: u16 = 80;

/// The bar takes a quarter of the terminal, leaving room for the numeric fields.
const BAR_FRACTION: u16 = 4;

/// A way of asking how wide the output terminal is.
pub trait TerminalMetrics {
    /// Number of columns, or `None` when this source cannot tell.
    fn columns(&self) -> Option<u16>;
}

/// Asks the terminal attached to stdout via `TIOCGWINSZ`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TtyMetrics;

impl TerminalMetrics for TtyMetrics {
    fn columns(&self) -> Option<u16> {
        // SAFETY: winsize is plain old data and all-zeroes is a valid value
        let mut size: libc::winsize = unsafe { std::mem::zeroed() };
        // SAFETY: TIOCGWINSZ only writes into the winsize we pass in
        let rc = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut size) };
        if rc == 0 && size.ws_col > 0 {
            Some(size.ws_col)
        } else {
            tracing::debug!("TIOCGWINSZ unavailable on stdout");
            None
        }
    }
}

/// Reads the `COLUMNS` environment variable exported by most shells.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvMetrics;

impl TerminalMetrics for EnvMetrics {
    fn columns(&self) -> Option<u16> {
        std::env::var("COLUMNS")
            .ok()
            .and_then(|value| parse_columns(&value))
    }
}

/// Always reports the same width.
#[derive(Debug, Clone, Copy)]
pub struct FixedMetrics(pub u16);

impl Default for FixedMetrics {
    fn default() -> Self {
        Self(DEFAULT_COLUMNS)
    }
}

impl TerminalMetrics for FixedMetrics {
    fn columns(&self) -> Option<u16> {
        Some(self.0)
    }
}

fn parse_columns(value: &str) -> Option<u16> {
    value.trim().parse::<u16>().ok().filter(|&cols| cols > 0)
}

/// Tries each source in order and falls back to [`DEFAULT_COLUMNS`].
pub fn detect_columns(sources: &[&dyn TerminalMetrics]) -> u16 {
    sources
        .iter()
        .find_map(|source| source.columns())
        .unwrap_or(DEFAULT_COLUMNS)
}

/// Width of the progress bar, in cells, for a terminal of `columns` columns.
#[must_use]
pub fn bar_width(columns: u16) -> usize {
    usize::from((columns / BAR_FRACTION).max(1))
}

/// Bar width for the current process: stdout terminal, then `COLUMNS`, then the default.
pub fn detect_bar_width() -> usize {
    let columns = detect_columns(&[&TtyMetrics, &EnvMetrics]);
    tracing::debug!("terminal columns: {}", columns);
    bar_width(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unknown;

    impl TerminalMetrics for Unknown {
        fn columns(&self) -> Option<u16> {
            None
        }
    }

    #[test]
    fn falls_back_to_default() {
        assert_eq!(detect_columns(&[&Unknown]), DEFAULT_COLUMNS);
        assert_eq!(detect_columns(&[]), DEFAULT_COLUMNS);
    }

    #[test]
    fn first_answer_wins() {
        assert_eq!(
            detect_columns(&[&Unknown, &FixedMetrics(120), &FixedMetrics(40)]),
            120
        );
    }

    #[test]
    fn bar_is_a_quarter_of_the_terminal() {
        assert_eq!(bar_width(80), 20);
        assert_eq!(bar_width(121), 30);
        assert_eq!(bar_width(3), 1);
    }

    #[test]
    fn columns_parsing() {
        assert_eq!(parse_columns("132"), Some(132));
        assert_eq!(parse_columns(" 90\n"), Some(90));
        assert_eq!(parse_columns("0"), None);
        assert_eq!(parse_columns("wide"), None);
    }
}
