//! Persona prompt construction.

use std::path::Path;

use crate::error::{Error, Result};

/// Portfolio text shipped with the binary
pub const PORTFOLIO: &str = include_str!("portfolio.txt");

const PERSONA_INSTRUCTIONS: &str = "\
You are Soren's portfolio assistant. Answer questions about Soren's background, projects, \
and skills based on the following information. Be conversational, friendly, and enthusiastic \
about his work, especially his ramen adventures! Keep responses concise but informative \
(under 150 words).

If asked about something not in the portfolio data, politely redirect to contacting Soren \
directly via his LinkedIn or GitHub.";

/// Load the portfolio text, preferring `path` over the embedded copy
pub fn load_portfolio(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|source| Error::Portfolio {
            path: path.display().to_string(),
            source,
        }),
        None => Ok(PORTFOLIO.to_string()),
    }
}

/// The two text segments sent upstream for one question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub question: String,
}

/// Renders the persona instructions once and pairs them with each question
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system: String,
}

impl PromptBuilder {
    pub fn new(portfolio: &str) -> Self {
        Self {
            system: format!(
                "{PERSONA_INSTRUCTIONS}\n\nPortfolio Information:\n{}\n",
                portfolio.trim_end()
            ),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system
    }

    pub fn build(&self, message: &str) -> Prompt {
        Prompt {
            system: self.system.clone(),
            question: format!("User question: {message}"),
        }
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(PORTFOLIO)
    }
}
