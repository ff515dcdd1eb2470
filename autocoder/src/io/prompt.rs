//! Prompt assembly for the generation step.

use minijinja::{Environment, context};

const DEVELOPER_TEMPLATE: &str = include_str!("prompts/developer.md");

/// System instruction sent with every generation request.
pub const SYSTEM_INSTRUCTION: &str = "You are an expert Python developer. Analyze \
the problem, record your reasoning inside a <think> tag, and answer with exactly \
one action in the required reply format.";

/// Everything the prompt template needs for one iteration.
#[derive(Debug, Clone)]
pub struct PromptInputs {
    pub goal: String,
    pub notes: String,
    /// Most recent generated filenames, oldest first (bounded by the caller).
    pub recent_files: Vec<String>,
    /// Most recent error-log entries, oldest first (bounded by the caller).
    pub recent_errors: Vec<String>,
    pub current_step: String,
    pub progress: f64,
    pub next_steps: Vec<String>,
    /// User-supplied expected output, when one exists.
    pub expected_output: Option<String>,
    pub auto_expect: bool,
}

/// Template engine wrapper around minijinja.
pub struct PromptBuilder {
    env: Environment<'static>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("developer", DEVELOPER_TEMPLATE)
            .expect("developer template should be valid");
        Self { env }
    }

    /// Render the user prompt for one generation step.
    pub fn build(&self, input: &PromptInputs) -> String {
        let template = self
            .env
            .get_template("developer")
            .expect("developer template is registered");
        template
            .render(context! {
                goal => input.goal.trim(),
                notes => Some(input.notes.trim()).filter(|s| !s.is_empty()),
                recent_files => join_or_none(&input.recent_files),
                recent_errors => join_or_none(&input.recent_errors),
                current_step => input.current_step,
                progress_percent => format!("{:.0}", input.progress * 100.0),
                next_steps => join_or_none(&input.next_steps),
                expected_output => input.expected_output.as_deref().map(str::trim).filter(|s| !s.is_empty()),
                auto_expect => input.auto_expect,
            })
            .expect("developer template rendering should not fail")
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_inputs() -> PromptInputs {
        PromptInputs {
            goal: "print Pascal's triangle".to_string(),
            notes: String::new(),
            recent_files: Vec::new(),
            recent_errors: Vec::new(),
            current_step: "initialize".to_string(),
            progress: 0.0,
            next_steps: Vec::new(),
            expected_output: None,
            auto_expect: false,
        }
    }

    #[test]
    fn renders_goal_and_reply_contract() {
        let prompt = PromptBuilder::new().build(&sample_inputs());
        assert!(prompt.contains("print Pascal's triangle"));
        assert!(prompt.contains("[ACTION]"));
        assert!(prompt.contains("[CONTENT]"));
        assert!(prompt.contains("[NEXT STEPS]"));
        assert!(prompt.contains("<think>"));
        assert!(prompt.contains("generated files: none"));
    }

    #[test]
    fn empty_notes_section_is_omitted() {
        let prompt = PromptBuilder::new().build(&sample_inputs());
        assert!(!prompt.contains("[IMPORTANT NOTES]"));

        let with_notes = PromptInputs {
            notes: "never call input()".to_string(),
            ..sample_inputs()
        };
        let prompt = PromptBuilder::new().build(&with_notes);
        assert!(prompt.contains("[IMPORTANT NOTES]"));
        assert!(prompt.contains("never call input()"));
    }

    #[test]
    fn progress_context_is_rendered() {
        let inputs = PromptInputs {
            recent_files: vec!["main.py".to_string(), "fix.py".to_string()],
            recent_errors: vec!["exited with status 1".to_string()],
            current_step: "fix execution error".to_string(),
            progress: 0.4,
            next_steps: vec!["handle the traceback".to_string()],
            ..sample_inputs()
        };
        let prompt = PromptBuilder::new().build(&inputs);
        assert!(prompt.contains("main.py, fix.py"));
        assert!(prompt.contains("exited with status 1"));
        assert!(prompt.contains("fix execution error (40%)"));
        assert!(prompt.contains("handle the traceback"));
    }

    #[test]
    fn auto_expect_adds_the_prediction_requirement() {
        let prompt = PromptBuilder::new().build(&sample_inputs());
        assert!(!prompt.contains("predict the program output"));

        let inputs = PromptInputs {
            auto_expect: true,
            ..sample_inputs()
        };
        let prompt = PromptBuilder::new().build(&inputs);
        assert!(prompt.contains("predict the program output"));
    }

    #[test]
    fn user_expected_output_is_included_when_present() {
        let inputs = PromptInputs {
            expected_output: Some("1\n1 1".to_string()),
            ..sample_inputs()
        };
        let prompt = PromptBuilder::new().build(&inputs);
        assert!(prompt.contains("[USER EXPECTED OUTPUT]"));
        assert!(prompt.contains("1\n1 1"));
    }
}
