// Line-oriented rendering of the screen regions

use nameit_eye::controller::View;
use nameit_eye::presenter::Region;
use std::io::{self, Write};

/// Prints every region update as one line on stdout
pub struct TerminalView {
    out: io::Stdout,
}

impl TerminalView {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl View for TerminalView {
    fn render_region(&mut self, region: &Region) {
        let mut out = self.out.lock();
        let _ = writeln!(out, "{}", render_line(region));
        let _ = out.flush();
    }

    fn preview_changed(&mut self, live: bool) {
        let message = if live {
            "-- camera live, press Enter to capture --"
        } else {
            "-- captured, press Enter to scan again --"
        };
        let _ = writeln!(self.out.lock(), "{}", message);
    }
}

fn render_line(region: &Region) -> String {
    match region.visible_results() {
        Some((top, second)) => format!("[{}] {} | {}", region.title, top, second),
        None => format!("[{}] ...", region.title),
    }
}
