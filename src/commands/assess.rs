//! Guided symptom checker
//!
//! Walks through the server's assessment questions one at a time, then
//! prints the differential diagnosis. The main symptom is screened locally
//! for emergency keywords before it is sent.

use crate::chat::screen_symptom;
use crate::client::{AnswerOutcome, EmergencyNotice, MedibotClient, Question};
use crate::config::Config;
use crate::error::{MedibotError, Result};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;

const MAIN_SYMPTOM: &str = "main_symptom";

/// Run the symptom checker
pub async fn run_assessment(config: Config) -> Result<()> {
    tracing::info!("Starting symptom assessment");

    let client = MedibotClient::new(&config.api)?;
    let mut rl = DefaultEditor::new()?;

    let start = client.start_assessment().await?;
    println!("\n{}", "Symptom checker".bold());
    println!(
        "{}\n",
        "Educational use only. This is not a medical diagnosis.".dimmed()
    );

    let mut question = start.question;
    let mut position = 1;
    let total = start.total_questions;

    let answers = loop {
        println!(
            "{} {}",
            format!("[{}/{}]", position, total).dimmed(),
            question.question.bold()
        );
        print_choices(&question);

        let Some(answer) = ask(&mut rl, &question)? else {
            println!("Assessment cancelled.");
            return Ok(());
        };

        if question.id == MAIN_SYMPTOM {
            if let Some(text) = answer.as_str() {
                if let Err(MedibotError::Emergency { keyword }) = screen_symptom(text) {
                    print_emergency(&EmergencyNotice {
                        message: format!(
                            "Your symptom '{}' may require immediate medical attention.",
                            keyword
                        ),
                        keyword,
                        action: "Call your local emergency number or go to the nearest emergency room."
                            .to_string(),
                    });
                    return Ok(());
                }
            }
        }

        match client.submit_answer(&question.id, &answer).await? {
            AnswerOutcome::Continue {
                question: next,
                current,
                ..
            } => {
                question = next;
                position = current;
            }
            AnswerOutcome::Complete { answers } => break answers,
            AnswerOutcome::Emergency { emergency } => {
                print_emergency(&emergency);
                return Ok(());
            }
        }
    };

    println!("\n{}", "Analyzing your answers...".cyan());
    let diagnosis = client.diagnosis(Some(&answers)).await?;
    println!("\n{}\n", diagnosis.diagnosis);
    if !diagnosis.disclaimer.is_empty() {
        println!("{}\n", diagnosis.disclaimer.trim().dimmed());
    }

    Ok(())
}

/// Prompt until the answer parses; `None` when the user gives up
fn ask(rl: &mut DefaultEditor, question: &Question) -> Result<Option<Value>> {
    loop {
        match rl.readline("> ") {
            Ok(line) => match parse_answer(question, &line) {
                Ok(value) => return Ok(Some(value)),
                Err(reason) => eprintln!("{}", reason.yellow()),
            },
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(None),
            Err(e) => return Err(e.into()),
        }
    }
}

fn print_choices(question: &Question) {
    match question.kind.as_str() {
        "choice" | "multiselect" => {
            for (i, option) in question.options.iter().enumerate() {
                println!("  {} {}", format!("{}.", i + 1).cyan(), option);
            }
            if question.kind == "multiselect" {
                println!("{}", "Enter numbers separated by commas, or leave empty.".dimmed());
            }
        }
        "scale" => {
            let (min, max) = (question.min.unwrap_or(1), question.max.unwrap_or(10));
            println!("{}", format!("Enter a number from {} to {}.", min, max).dimmed());
        }
        _ => {
            if let Some(placeholder) = &question.placeholder {
                println!("{}", placeholder.dimmed());
            }
        }
    }
}

/// Turn typed input into the JSON answer the server expects
///
/// Choices accept either the option number or its text.
pub(crate) fn parse_answer(question: &Question, input: &str) -> std::result::Result<Value, String> {
    let input = input.trim();
    if input.is_empty() {
        return if question.required {
            Err("An answer is required.".to_string())
        } else if question.kind == "multiselect" {
            Ok(Value::Array(Vec::new()))
        } else {
            Ok(Value::String(String::new()))
        };
    }

    match question.kind.as_str() {
        "choice" => pick_option(question, input).map(Value::String),
        "multiselect" => input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| pick_option(question, s).map(Value::String))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Value::Array),
        "scale" | "number" => {
            let n: i64 = input
                .parse()
                .map_err(|_| format!("'{}' is not a whole number.", input))?;
            let min = question.min.unwrap_or(i64::MIN);
            let max = question.max.unwrap_or(i64::MAX);
            if n < min || n > max {
                return Err(format!("Enter a number from {} to {}.", min, max));
            }
            Ok(Value::from(n))
        }
        _ => Ok(Value::String(input.to_string())),
    }
}

fn pick_option(question: &Question, input: &str) -> std::result::Result<String, String> {
    if let Ok(n) = input.parse::<usize>() {
        return question
            .options
            .get(n.wrapping_sub(1))
            .cloned()
            .ok_or_else(|| format!("Choose a number from 1 to {}.", question.options.len()));
    }
    question
        .options
        .iter()
        .find(|o| o.eq_ignore_ascii_case(input))
        .cloned()
        .ok_or_else(|| format!("'{}' is not one of the options.", input))
}

fn print_emergency(notice: &EmergencyNotice) {
    println!();
    println!("{}", format!("EMERGENCY: {}", notice.message).red().bold());
    if !notice.action.is_empty() {
        println!("{}", notice.action.red());
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(kind: &str, required: bool) -> Question {
        Question {
            id: "q".to_string(),
            question: "?".to_string(),
            kind: kind.to_string(),
            options: vec!["Fever".to_string(), "Cough".to_string(), "Nausea".to_string()],
            min: Some(1),
            max: Some(10),
            placeholder: None,
            required,
        }
    }

    #[test]
    fn test_parse_choice_by_number_or_text() {
        let q = question("choice", true);
        assert_eq!(parse_answer(&q, "2").unwrap(), Value::from("Cough"));
        assert_eq!(parse_answer(&q, "fever").unwrap(), Value::from("Fever"));
        assert!(parse_answer(&q, "4").is_err());
        assert!(parse_answer(&q, "0").is_err());
    }

    #[test]
    fn test_parse_multiselect() {
        let q = question("multiselect", false);
        assert_eq!(
            parse_answer(&q, "1, nausea").unwrap(),
            serde_json::json!(["Fever", "Nausea"])
        );
        assert_eq!(parse_answer(&q, "").unwrap(), serde_json::json!([]));
    }

    #[test]
    fn test_parse_scale_bounds() {
        let q = question("scale", true);
        assert_eq!(parse_answer(&q, "7").unwrap(), Value::from(7));
        assert!(parse_answer(&q, "11").is_err());
        assert!(parse_answer(&q, "seven").is_err());
    }

    #[test]
    fn test_required_answer() {
        assert!(parse_answer(&question("text", true), "  ").is_err());
        assert_eq!(
            parse_answer(&question("text", false), "").unwrap(),
            Value::from("")
        );
    }
}
