use std::fmt::Display;

use skein_core::CaptureCell;

/// What a scenario program prints, in the order it printed it.
#[derive(Clone, Default)]
pub struct Transcript(CaptureCell<Vec<String>>);

impl Transcript {
    pub fn println(&self, line: impl Display) {
        let line = line.to_string();
        self.0.update(|lines| lines.push(line));
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.get()
    }
}
