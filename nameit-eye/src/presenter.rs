//! Display text for the per-model screen regions

use crate::models::{LabelStyle, ModelKind};
use crate::prediction::{ClassificationResult, Prediction};
use std::time::Duration;

pub const TOP_PLACEHOLDER: &str = "Top prediction";
pub const SECOND_PLACEHOLDER: &str = "Second best prediction";
pub const NO_RESULT: &str = "?";
pub const ERROR_TEXT: &str = "An error occurred";

/// Title, two result lines and busy indicator of one model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub kind: ModelKind,
    pub title: String,
    pub top: String,
    pub second: String,
    /// Spinner shown, result lines hidden
    pub busy: bool,
}

impl Region {
    pub fn new(kind: ModelKind) -> Self {
        let mut region = Self {
            kind,
            title: String::new(),
            top: String::new(),
            second: String::new(),
            busy: false,
        };
        region.reset();
        region
    }

    /// Back to the placeholder pair, idle
    pub fn reset(&mut self) {
        self.title = self.kind.name().to_string();
        self.top = TOP_PLACEHOLDER.to_string();
        self.second = SECOND_PLACEHOLDER.to_string();
        self.busy = false;
    }

    pub fn set_busy(&mut self) {
        self.busy = true;
    }

    /// Show ranked results and latency, idle
    pub fn show_prediction(&mut self, prediction: &Prediction) {
        let style = self.kind.label_style();
        let mut lines = prediction
            .results
            .iter()
            .map(|result| format_result(result, style));

        self.title = format_title(self.kind, prediction.latency);
        self.top = lines.next().unwrap_or_else(|| NO_RESULT.to_string());
        self.second = lines.next().unwrap_or_else(|| NO_RESULT.to_string());
        self.busy = false;
    }

    /// Show the error text in both lines, idle
    pub fn show_error(&mut self) {
        self.title = self.kind.name().to_string();
        self.top = ERROR_TEXT.to_string();
        self.second = ERROR_TEXT.to_string();
        self.busy = false;
    }

    /// Result lines, or `None` while the spinner is shown
    pub fn visible_results(&self) -> Option<(&str, &str)> {
        if self.busy {
            None
        } else {
            Some((self.top.as_str(), self.second.as_str()))
        }
    }
}

/// Label as shown on screen
pub fn display_label(label: &str, style: LabelStyle) -> &str {
    match style {
        LabelStyle::Raw => label,
        LabelStyle::SynsetPrefixed => match label.split_once(' ') {
            Some((_, rest)) => rest,
            None => label,
        },
    }
}

/// `<label> (<percent with 3 decimals>%)`
pub fn format_result(result: &ClassificationResult, style: LabelStyle) -> String {
    format!(
        "{} ({:.3}%)",
        display_label(&result.label, style),
        result.confidence * 100.0
    )
}

/// `<model name> <seconds with 2 decimals>s`
pub fn format_title(kind: ModelKind, latency: Duration) -> String {
    format!("{} {:.2}s", kind.name(), latency.as_secs_f64())
}
