//! Prompt treatments
//!
//! A treatment is a named prompting strategy. Every treatment asks for the
//! same machine-readable last line, `Final:<LETTER>`, and differs only in
//! what the model must write before it.

use serde::{Deserialize, Serialize};

use crate::dataset::{Letter, QuestionRecord};

/// Error type for prompt rendering
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("Unknown treatment: {0} (expected one of T0, T1, T2, T3, T4, T5)")]
    UnknownTreatment(String),
}

/// Prompting strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Treatment {
    /// Free-form answer
    T0,
    /// Concise, final line only
    T1,
    /// Short reasoning steps
    T2,
    /// One evidence line quoting the chosen option
    T3,
    /// Steps plus evidence
    T4,
    /// Self-check against one alternative
    T5,
}

impl Treatment {
    pub fn all() -> Vec<Treatment> {
        vec![
            Treatment::T0,
            Treatment::T1,
            Treatment::T2,
            Treatment::T3,
            Treatment::T4,
            Treatment::T5,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Treatment::T0 => "T0",
            Treatment::T1 => "T1",
            Treatment::T2 => "T2",
            Treatment::T3 => "T3",
            Treatment::T4 => "T4",
            Treatment::T5 => "T5",
        }
    }

    /// Parse a list of treatment names, failing on the first unknown one
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<Treatment>, PromptError> {
        names.iter().map(|n| n.as_ref().parse()).collect()
    }

    fn instructions(&self) -> &'static str {
        match self {
            Treatment::T0 => "Answer normally.",
            Treatment::T1 => "Be concise. Output only the Final line.",
            Treatment::T2 => {
                "Before the Final line, write 2-4 short steps (each at most 12 words) under the heading:\n\
                 STEPS:\n\
                 Then output only the Final line."
            }
            Treatment::T3 => {
                "Choose the best option and justify it using only the text of the selected option as evidence.\n\
                 Before the Final line, output exactly one line of the form:\n\
                 Evidence: <short phrase quoted from the option you selected>\n\
                 Then output only the Final line."
            }
            Treatment::T4 => {
                "Work through 2-4 short steps (each at most 12 words), then justify your choice using only the text of the selected option as evidence.\n\
                 Before the Final line, output both sections in this order:\n\
                 STEPS:\n\
                 <your steps>\n\
                 Evidence: <short phrase quoted from the option you selected>\n\
                 Then output only the Final line."
            }
            Treatment::T5 => {
                "After selecting an answer, self-check it: briefly consider one alternative and why it is wrong (at most 20 words).\n\
                 Before the Final line, output exactly one line of the form:\n\
                 Self-Check:<ALT_LETTER> - <reason>\n\
                 Then output only the Final line."
            }
        }
    }
}

impl std::fmt::Display for Treatment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Treatment {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "T0" => Ok(Treatment::T0),
            "T1" => Ok(Treatment::T1),
            "T2" => Ok(Treatment::T2),
            "T3" => Ok(Treatment::T3),
            "T4" => Ok(Treatment::T4),
            "T5" => Ok(Treatment::T5),
            _ => Err(PromptError::UnknownTreatment(s.to_string())),
        }
    }
}

/// Render the question and its present choices, A to E
pub fn format_question(question: &QuestionRecord) -> String {
    let choice_lines: Vec<String> = question
        .choices
        .iter()
        .map(|(letter, text)| format!("{}. {}", letter, text))
        .collect();

    format!(
        "Question (QID={}):\n{}\n\nChoices:\n{}\n",
        question.qid,
        question.stem,
        choice_lines.join("\n")
    )
}

/// Slash-joined list of valid answer letters, e.g. `A/B/C/D`
pub fn valid_letters(question: &QuestionRecord) -> String {
    question
        .letters()
        .iter()
        .map(Letter::as_str)
        .collect::<Vec<_>>()
        .join("/")
}

/// Build the full prompt for a question under a treatment
pub fn build_prompt(treatment: Treatment, question: &QuestionRecord) -> String {
    let rules = format!(
        "You are answering a multiple-choice question.\n\
         Valid answer letters: {}.\n\
         Output rules:\n\
         - The last line must be exactly: Final:<LETTER>\n\
         - Do NOT output anything after the Final line.\n",
        valid_letters(question)
    );

    format!(
        "{}\n{}\n{}",
        format_question(question),
        rules,
        treatment.instructions()
    )
}

/// Build a prompt from a treatment name
pub fn treatment_prompt(name: &str, question: &QuestionRecord) -> Result<String, PromptError> {
    let treatment: Treatment = name.parse()?;
    Ok(build_prompt(treatment, question))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QuestionRecord {
        QuestionRecord::new(12, "Which species is amphoteric?")
            .with_choice(Letter::D, "HCO3-")
            .with_choice(Letter::A, "Na+")
            .with_choice(Letter::B, "Cl-")
            .with_gold(Letter::D)
    }

    #[test]
    fn test_choices_rendered_in_letter_order() {
        let text = format_question(&sample());
        assert!(text.starts_with("Question (QID=12):\nWhich species is amphoteric?\n\nChoices:\n"));
        let a = text.find("A. Na+").unwrap();
        let b = text.find("B. Cl-").unwrap();
        let d = text.find("D. HCO3-").unwrap();
        assert!(a < b && b < d);
        assert!(!text.contains("C. "));
    }

    #[test]
    fn test_valid_letters_only_present_ones() {
        assert_eq!(valid_letters(&sample()), "A/B/D");
    }

    #[test]
    fn test_every_treatment_demands_final_line() {
        for treatment in Treatment::all() {
            let prompt = build_prompt(treatment, &sample());
            assert!(prompt.contains("Final:<LETTER>"), "{treatment} missing final rule");
            assert!(prompt.contains("Valid answer letters: A/B/D."));
        }
    }

    #[test]
    fn test_treatment_specific_sections() {
        let q = sample();
        assert!(build_prompt(Treatment::T1, &q).contains("Be concise"));
        assert!(build_prompt(Treatment::T2, &q).contains("STEPS:"));

        let t3 = build_prompt(Treatment::T3, &q);
        assert!(t3.contains("Evidence:"));
        assert!(!t3.contains("STEPS:"));

        let t4 = build_prompt(Treatment::T4, &q);
        assert!(t4.contains("STEPS:") && t4.contains("Evidence:"));

        assert!(build_prompt(Treatment::T5, &q).contains("Self-Check:<ALT_LETTER> - <reason>"));
    }

    #[test]
    fn test_unknown_treatment_rejected() {
        let err = treatment_prompt("T9", &sample()).unwrap_err();
        assert_eq!(err, PromptError::UnknownTreatment("T9".to_string()));
    }

    #[test]
    fn test_parse_list_stops_at_unknown() {
        assert_eq!(
            Treatment::parse_list(&["T0", "t3"]).unwrap(),
            vec![Treatment::T0, Treatment::T3]
        );
        assert!(Treatment::parse_list(&["T0", "baseline"]).is_err());
    }
}
