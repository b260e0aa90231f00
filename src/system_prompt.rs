//! System instruction assembly.
//!
//! The persona comes from configuration; the current date/time is appended so the
//! model can resolve relative questions ("yesterday", "this morning") against the
//! timestamps returned by the recentMessages tool.

use chrono::{Local, Utc};

/// ```text
/// Current date/time: Wednesday, February 05, 2025, 14:30:15 UTC (2025-02-05T14:30:15+00:00)
/// Local time: Wednesday, February 05, 2025, 09:30:15 -05:00 (2025-02-05T09:30:15-05:00)
/// ```
pub fn get_datetime_context() -> String {
    let utc_now = Utc::now();
    let local_now = Local::now();

    format!(
        "Current date/time: {}, {} UTC ({})\nLocal time: {}, {} ({})",
        utc_now.format("%A, %B %d, %Y"),
        utc_now.format("%H:%M:%S"),
        utc_now.to_rfc3339(),
        local_now.format("%A, %B %d, %Y"),
        local_now.format("%H:%M:%S %Z"),
        local_now.to_rfc3339()
    )
}

pub fn build_system_instruction(persona: &str) -> String {
    let persona = persona.trim();
    if persona.is_empty() {
        return get_datetime_context();
    }
    format!("{}\n\n{}", persona, get_datetime_context())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime_context_format() {
        let context = get_datetime_context();
        assert!(context.contains("Current date/time:"));
        assert!(context.contains("UTC"));
        assert!(context.contains("Local time:"));
        assert!(context.contains("T")); // RFC3339
    }

    #[test]
    fn test_persona_comes_first() {
        let instruction = build_system_instruction("  You are SEV0.  ");
        assert!(instruction.starts_with("You are SEV0.\n\n"));
        assert!(instruction.contains("Current date/time:"));
    }

    #[test]
    fn test_empty_persona_still_carries_time() {
        let instruction = build_system_instruction("");
        assert!(instruction.starts_with("Current date/time:"));
    }
}
