//! Terminal output channel.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use qazure_hal::{OutputChannel, UpdatableDisplay};

/// Writes lines to stdout and shows updatable content as a spinner.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleChannel;

impl OutputChannel for ConsoleChannel {
    fn write_line(&self, text: &str) {
        println!("{text}");
    }

    fn display_updatable(&self, content: &str) -> Box<dyn UpdatableDisplay> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        bar.set_message(content.to_string());
        Box::new(SpinnerDisplay { bar })
    }
}

struct SpinnerDisplay {
    bar: ProgressBar,
}

impl UpdatableDisplay for SpinnerDisplay {
    fn update(&mut self, content: &str) {
        self.bar.set_message(content.to_string());
    }
}

impl Drop for SpinnerDisplay {
    fn drop(&mut self) {
        // Leave the last message on screen.
        self.bar.finish();
    }
}
