//! Interactive prompts and styled output.
//!
//! Flows talk to the user only through the [`Prompter`] trait. Every method
//! returns `Ok(None)` when the user dismisses the prompt (Esc / Ctrl-C);
//! callers treat that as a silent abort of the current flow.

pub mod prompt;
pub mod style;

use anyhow::Result;

pub use prompt::TerminalPrompter;

pub trait Prompter {
    /// Pick one option; returns its index.
    fn select(&mut self, title: &str, options: &[String]) -> Result<Option<usize>>;

    /// Toggle any number of options; `preselected[i]` seeds option `i`.
    /// Returns the chosen indices in ascending order.
    fn multi_select(
        &mut self,
        title: &str,
        options: &[String],
        preselected: &[bool],
    ) -> Result<Option<Vec<usize>>>;

    fn confirm(&mut self, title: &str) -> Result<Option<bool>>;

    /// Free text entry. The answer is returned untrimmed.
    fn input(&mut self, title: &str, description: &str, placeholder: &str)
        -> Result<Option<String>>;
}
