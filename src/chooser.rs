//! Interactive disambiguation of virtual packages

use crate::ui;
use dialoguer::Select;
use provision::{Answers, Chooser, FirstCandidate};
use std::collections::{BTreeMap, HashMap};
use std::io::IsTerminal;

/// Asks the user which provider to use, once per virtual package
///
/// Without a terminal (or with `--yes`) the first candidate is taken.
pub struct PromptChooser {
    interactive: bool,
    remembered: HashMap<String, String>,
}

impl PromptChooser {
    pub fn new(assume_yes: bool) -> Self {
        Self {
            interactive: !assume_yes && std::io::stdin().is_terminal(),
            remembered: HashMap::new(),
        }
    }

    fn prompt(&self, virtual_name: &str, candidates: &[&str]) -> provision::Result<String> {
        if !self.interactive {
            let choice = FirstCandidate.choose(virtual_name, candidates)?;
            ui::warn(&format!(
                "Multiple packages provide {virtual_name}; using {choice} (candidates: {})",
                candidates.join(", ")
            ));
            return Ok(choice);
        }

        let index = Select::new()
            .with_prompt(format!("Multiple choices for virtual package {virtual_name}"))
            .items(candidates)
            .default(0)
            .interact()
            .map_err(|e| provision::Error::Config(format!("Failed to read selection: {e}")))?;

        Ok(candidates[index].to_string())
    }
}

impl Chooser for PromptChooser {
    fn choose(&mut self, virtual_name: &str, candidates: &[&str]) -> provision::Result<String> {
        if let Some(choice) = self.remembered.get(virtual_name) {
            if candidates.contains(&choice.as_str()) {
                return Ok(choice.clone());
            }
        }

        let choice = self.prompt(virtual_name, candidates)?;
        self.remembered
            .insert(virtual_name.to_string(), choice.clone());
        Ok(choice)
    }
}

/// Script `[choices]` plus `--answer` flags in front of the prompt
pub fn for_run(
    choices: &BTreeMap<String, String>,
    answers: &[(String, String)],
    assume_yes: bool,
) -> Answers<PromptChooser> {
    let mut all: HashMap<String, String> = choices
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    all.extend(answers.iter().cloned());
    Answers::new(all, PromptChooser::new(assume_yes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn non_interactive() -> PromptChooser {
        PromptChooser {
            interactive: false,
            remembered: HashMap::new(),
        }
    }

    #[test]
    fn test_non_interactive_takes_first() {
        let mut chooser = non_interactive();
        assert_eq!(chooser.choose("db", &["mysql", "postgres"]).unwrap(), "mysql");
    }

    #[test]
    fn test_remembers_answer_per_virtual_name() {
        let mut chooser = non_interactive();
        chooser
            .remembered
            .insert("db".to_string(), "postgres".to_string());

        assert_eq!(chooser.choose("db", &["mysql", "postgres"]).unwrap(), "postgres");
        assert_eq!(chooser.choose("db", &["mysql", "postgres"]).unwrap(), "postgres");
    }

    #[test]
    fn test_stale_memory_is_ignored() {
        let mut chooser = non_interactive();
        chooser
            .remembered
            .insert("db".to_string(), "oracle".to_string());
        assert_eq!(chooser.choose("db", &["mysql", "postgres"]).unwrap(), "mysql");
        assert_eq!(chooser.remembered["db"], "mysql");
    }

    #[test]
    fn test_cli_answers_override_script_choices() {
        let mut choices = BTreeMap::new();
        choices.insert("db".to_string(), "mysql".to_string());
        let answers = vec![("db".to_string(), "postgres".to_string())];

        let mut chooser = for_run(&choices, &answers, true);
        assert_eq!(chooser.choose("db", &["mysql", "postgres"]).unwrap(), "postgres");
    }

    #[test]
    fn test_unanswered_falls_back_to_prompt() {
        let mut chooser = for_run(&BTreeMap::new(), &[], true);
        assert_eq!(chooser.choose("web", &["apache", "nginx"]).unwrap(), "apache");
    }
}
