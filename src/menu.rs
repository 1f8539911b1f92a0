use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use tracing::{error, info};

use crate::console::Console;
use crate::error::ChatError;

pub type RunnerFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a>>;

/// An interactive session the menu can launch.
pub trait SessionRunner {
    fn name(&self) -> &str;

    fn run<'a>(&'a self, console: &'a mut dyn Console) -> RunnerFuture<'a>;
}

/// Numbered menu over an explicitly assembled list of runners.
#[derive(Default)]
pub struct SessionMenu<'a> {
    runners: Vec<Box<dyn SessionRunner + 'a>>,
}

impl<'a> SessionMenu<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, runner: impl SessionRunner + 'a) {
        info!(runner = runner.name(), "registered session runner");
        self.runners.push(Box::new(runner));
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }

    /// Loops until the operator quits or input ends. Runner failures are
    /// reported and never end the menu.
    pub async fn run(&self, console: &mut dyn Console) -> Result<()> {
        if self.runners.is_empty() {
            return Err(ChatError::NoRunnersAvailable.into());
        }

        loop {
            self.print_options(console);
            let Some(input) =
                console.read_line("Enter the number of your choice, or 'q' to quit: ")?
            else {
                break;
            };
            let choice = input.trim();
            if choice.eq_ignore_ascii_case("q") {
                console.say("Exiting.");
                break;
            }

            let runner = match parse_selection(choice, self.runners.len()) {
                Ok(index) => &self.runners[index],
                Err(err) => {
                    console.report_error(&err.to_string());
                    continue;
                }
            };

            let name = runner.name();
            console.say(&format!("\n--- Running: {name} ---"));
            if let Err(err) = runner.run(console).await {
                error!(runner = name, error = %format!("{err:#}"), "session runner failed");
                console.report_error(&format!("An error occurred while running {name}: {err:#}"));
            }
            console.say(&format!("--- Finished: {name} ---"));
        }

        Ok(())
    }

    fn print_options(&self, console: &mut dyn Console) {
        console.say("\nAvailable options:");
        for (idx, runner) in self.runners.iter().enumerate() {
            console.say(&format!("  {}. {}", idx + 1, runner.name()));
        }
        console.say("  q. Quit");
    }
}

/// Maps 1-based menu input to a runner index.
fn parse_selection(input: &str, count: usize) -> Result<usize, ChatError> {
    input
        .parse::<usize>()
        .ok()
        .filter(|choice| (1..=count).contains(choice))
        .map(|choice| choice - 1)
        .ok_or_else(|| ChatError::InvalidSelection {
            input: input.to_string(),
            max: count,
        })
}
