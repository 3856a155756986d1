//! Interactive input, abstracted so resolvers can run unattended.

use crate::domain::Result;

/// Asks the user for values. Implementations map cancellation and terminal
/// errors to `ProvisionError::Prompt`.
pub trait Prompter: Send + Sync {
    /// Free text, with an optional pre-filled default.
    fn get(&self, message: &str, help: &str, default: Option<&str>) -> Result<String>;

    fn select_one(&self, message: &str, help: &str, options: &[String]) -> Result<String>;

    /// Several of `options`, with `defaults` pre-selected.
    fn multi_select(
        &self,
        message: &str,
        help: &str,
        options: &[String],
        defaults: &[String],
    ) -> Result<Vec<String>>;
}
