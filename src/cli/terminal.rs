//! Terminal styling

use std::sync::OnceLock;

use owo_colors::{OwoColorize, colors::css};

/// Whether stdout accepts colour. Detected once per process.
fn supports_color() -> bool {
    static SUPPORTED: OnceLock<bool> = OnceLock::new();
    *SUPPORTED.get_or_init(|| supports_color::on(supports_color::Stream::Stdout).is_some())
}

/// Extension trait for styling output
pub trait Colorize {
    /// Green, for completed mutations
    fn success(&self) -> String;
    /// Amber, for refusals and field errors
    fn warning(&self) -> String;
    /// Blue, for headings
    fn info(&self) -> String;
    /// Dimmed, for labels and metadata
    fn dim(&self) -> String;
}

impl<T: AsRef<str> + ?Sized> Colorize for T {
    fn success(&self) -> String {
        paint(self.as_ref(), |s| s.fg::<css::Green>().to_string())
    }

    fn warning(&self) -> String {
        paint(self.as_ref(), |s| s.fg::<css::Orange>().to_string())
    }

    fn info(&self) -> String {
        paint(self.as_ref(), |s| s.fg::<css::LightBlue>().to_string())
    }

    fn dim(&self) -> String {
        paint(self.as_ref(), |s| s.dimmed().to_string())
    }
}

fn paint(text: &str, style: impl FnOnce(&str) -> String) -> String {
    if supports_color() {
        style(text)
    } else {
        text.to_string()
    }
}
