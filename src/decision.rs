//! Next-step decisions for the hop loop.
//!
//! The model answers in three labeled lines. When they cannot be read, the
//! same answer is sent back once with a request for a strict JSON object. If
//! that fails too the outcome is [`DecisionOutcome::Undecided`]; a decision is
//! never partially filled.

use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, OnceLock};

use crate::error::Result;
use crate::llm::output::{extract_json_object, parse_string_list, render_string_list};
use crate::llm::LanguageModel;
use crate::prompts;

/// The three operations the model may choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// Follow neighbour relationships named in the parameters
    ExpandHop,
    /// Re-run retrieval with a revised entity set
    RefineEntities,
    Finalize,
}

impl Operation {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Operation::ExpandHop),
            2 => Some(Operation::RefineEntities),
            3 => Some(Operation::Finalize),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Operation::ExpandHop => 1,
            Operation::RefineEntities => 2,
            Operation::Finalize => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub operation: Operation,
    pub reason: String,
    pub parameters: Vec<String>,
}

/// Which parser produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsePath {
    Labeled,
    Reformatted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    Decided { decision: Decision, path: ParsePath },
    /// Neither parser could read the model's answer
    Undecided { raw: String },
}

fn labeled_patterns() -> &'static (Regex, Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"操作选择[:：]\s*(\d)").expect("Invalid regex pattern"),
            Regex::new(r"操作理由[:：][ \t]*(.*)").expect("Invalid regex pattern"),
            Regex::new(r"操作参数[:：][ \t]*(.*)").expect("Invalid regex pattern"),
        )
    })
}

/// Parse the three labeled lines. `None` when a line is missing, the
/// operation digit is not 1-3, or the parameters are not a list literal.
pub fn parse_labeled(text: &str) -> Option<Decision> {
    let (op_re, reason_re, params_re) = labeled_patterns();
    let code: i64 = op_re.captures(text)?.get(1)?.as_str().parse().ok()?;
    let operation = Operation::from_code(code)?;
    let reason = reason_re.captures(text)?.get(1)?.as_str().trim().to_string();
    let params_raw = params_re.captures(text)?.get(1)?.as_str().trim();
    let parameters = parse_string_list(params_raw).ok()?;
    Some(Decision {
        operation,
        reason,
        parameters,
    })
}

/// Parse the JSON reformat answer. `operation` may be a number or a numeric
/// string; missing `parameters` means none.
pub fn parse_reformatted(text: &str) -> Option<Decision> {
    let value = extract_json_object(text).ok()?;
    let code = match &value["operation"] {
        serde_json::Value::Number(n) => n.as_i64()?,
        serde_json::Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    let operation = Operation::from_code(code)?;
    let reason = match &value["reason"] {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Null => String::new(),
        _ => return None,
    };
    let parameters = match &value["parameters"] {
        serde_json::Value::Null => Vec::new(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()?,
        serde_json::Value::String(s) if s.trim().is_empty() => Vec::new(),
        serde_json::Value::String(s) => parse_string_list(s).ok()?,
        _ => return None,
    };
    Some(Decision {
        operation,
        reason,
        parameters,
    })
}

/// Asks the model what to do next.
pub struct DecisionEngine {
    model: Arc<dyn LanguageModel>,
}

impl DecisionEngine {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// One decision call, plus at most one reformat call. Model I/O errors
    /// propagate; unreadable answers become `Undecided`.
    pub async fn decide(&self, question: &str, entities: &[String], contexts: &str) -> Result<DecisionOutcome> {
        let entities = render_string_list(entities);
        let prompt = prompts::fill(
            prompts::DECISION,
            &[
                ("question", question),
                ("entities", entities.as_str()),
                ("contexts", contexts),
            ],
        );
        let raw = self.model.complete(&prompt, None).await?;

        if let Some(decision) = parse_labeled(&raw) {
            log::debug!("Decision parsed from labeled lines: {:?}", decision.operation);
            return Ok(DecisionOutcome::Decided {
                decision,
                path: ParsePath::Labeled,
            });
        }

        log::debug!("Decision lines unreadable, asking for JSON reformat");
        let reformat_prompt = prompts::fill(prompts::JSON_REFORMAT, &[("decision_result", raw.as_str())]);
        let reformatted = self.model.complete(&reformat_prompt, None).await?;

        match parse_reformatted(&reformatted) {
            Some(decision) => {
                log::debug!("Decision parsed from JSON reformat: {:?}", decision.operation);
                Ok(DecisionOutcome::Decided {
                    decision,
                    path: ParsePath::Reformatted,
                })
            }
            None => {
                log::warn!("Decision could not be parsed after reformat");
                Ok(DecisionOutcome::Undecided { raw })
            }
        }
    }
}
