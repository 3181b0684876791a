//! Prompt templates for the retrieval pipeline
//!
//! PRIVATE MODULE - Not exported from crate
//!
//! Exact wording is not part of any contract; only the inputs
//! substituted in and the output shapes parsed back out are.

pub const INTENT_EXTRACT: &str = include_str!("../assets/prompts/intent_extract.txt");
pub const RELEVANCE_FILTER: &str = include_str!("../assets/prompts/relevance_filter.txt");
pub const GATE: &str = include_str!("../assets/prompts/gate.txt");
pub const SQL_SYSTEM: &str = include_str!("../assets/prompts/sql_system.txt");
pub const SQL_USER: &str = include_str!("../assets/prompts/sql_user.txt");
pub const SQL_FIX: &str = include_str!("../assets/prompts/sql_fix.txt");
pub const ANSWER: &str = include_str!("../assets/prompts/answer.txt");

pub fn format_prompt(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}
