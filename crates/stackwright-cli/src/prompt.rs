//! Terminal prompts backed by `dialoguer`.

use dialoguer::{Input, MultiSelect, Select};
use stackwright_core::{ProvisionError, Prompter, Result};

/// Prompts on the controlling terminal. Help text is printed above the
/// prompt when present.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

fn prompt_err(e: dialoguer::Error) -> ProvisionError {
    ProvisionError::Prompt(e.to_string())
}

fn show_help(help: &str) {
    if !help.is_empty() {
        eprintln!("{}", help);
    }
}

impl Prompter for TerminalPrompter {
    fn get(&self, message: &str, help: &str, default: Option<&str>) -> Result<String> {
        show_help(help);
        let mut input = Input::<String>::new().with_prompt(message);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        input.interact_text().map_err(prompt_err)
    }

    fn select_one(&self, message: &str, help: &str, options: &[String]) -> Result<String> {
        show_help(help);
        let index = Select::new()
            .with_prompt(message)
            .items(options)
            .default(0)
            .interact()
            .map_err(prompt_err)?;
        options
            .get(index)
            .cloned()
            .ok_or_else(|| ProvisionError::Prompt(format!("no option at index {}", index)))
    }

    fn multi_select(
        &self,
        message: &str,
        help: &str,
        options: &[String],
        defaults: &[String],
    ) -> Result<Vec<String>> {
        show_help(help);
        let checked: Vec<bool> = options.iter().map(|o| defaults.contains(o)).collect();
        let indices = MultiSelect::new()
            .with_prompt(message)
            .items(options)
            .defaults(&checked)
            .interact()
            .map_err(prompt_err)?;
        Ok(indices
            .into_iter()
            .filter_map(|i| options.get(i).cloned())
            .collect())
    }
}
