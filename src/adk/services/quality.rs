// SPDX-License-Identifier: MIT

//! Quality/SEO scoring

use super::{QualityReport, QualityScorer};
use crate::adk::agent::LlmAgent;
use crate::adk::error::CollaboratorError;
use crate::adk::model::Model;
use async_trait::async_trait;
use std::sync::Arc;

const SCORER_INSTRUCTION: &str = "You are an SEO editor. Score the article from 0 to 100 for \
search quality given the target keywords. Reply with JSON only: \
{\"score\": <number>, \"suggestions\": [<short actionable strings>]}";

/// Offline heuristic scorer: keyword coverage, length, structure
#[derive(Debug, Clone)]
pub struct KeywordScorer {
    pub min_words: usize,
}

impl KeywordScorer {
    pub fn new(min_words: usize) -> Self {
        Self { min_words }
    }

    pub fn evaluate(&self, content: &str, keywords: &[String]) -> QualityReport {
        let lower = content.to_lowercase();
        let mut suggestions = Vec::new();

        let missing: Vec<&String> = keywords
            .iter()
            .filter(|k| !lower.contains(&k.to_lowercase()))
            .collect();
        let coverage = if keywords.is_empty() {
            1.0
        } else {
            (keywords.len() - missing.len()) as f32 / keywords.len() as f32
        };
        for keyword in &missing {
            suggestions.push(format!("Mention the keyword '{}'", keyword));
        }

        let words = content.split_whitespace().count();
        let length = (words as f32 / self.min_words.max(1) as f32).min(1.0);
        if words < self.min_words {
            suggestions.push(format!(
                "Expand the article to at least {} words (currently {})",
                self.min_words, words
            ));
        }

        let has_heading = content.lines().any(|l| l.trim_start().starts_with('#'));
        if !has_heading {
            suggestions.push("Add section headings".to_string());
        }

        let paragraphs = content
            .split("\n\n")
            .filter(|p| !p.trim().is_empty())
            .count();
        if paragraphs < 3 {
            suggestions.push("Break the text into at least three paragraphs".to_string());
        }

        let score = 50.0 * coverage
            + 25.0 * length
            + if has_heading { 15.0 } else { 0.0 }
            + if paragraphs >= 3 { 10.0 } else { 0.0 };

        QualityReport { score, suggestions }
    }
}

impl Default for KeywordScorer {
    fn default() -> Self {
        Self::new(300)
    }
}

#[async_trait]
impl QualityScorer for KeywordScorer {
    async fn score(
        &self,
        content: &str,
        keywords: &[String],
    ) -> Result<QualityReport, CollaboratorError> {
        Ok(self.evaluate(content, keywords))
    }
}

/// Asks a model for a JSON quality report
pub struct LlmScorer {
    agent: LlmAgent,
}

impl LlmScorer {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self {
            agent: LlmAgent::new("seo-scorer", SCORER_INSTRUCTION, model),
        }
    }
}

#[async_trait]
impl QualityScorer for LlmScorer {
    async fn score(
        &self,
        content: &str,
        keywords: &[String],
    ) -> Result<QualityReport, CollaboratorError> {
        let prompt = format!(
            "Target keywords: {}\n\nArticle:\n{}",
            keywords.join(", "),
            content
        );
        let mut report: QualityReport = self.agent.run_json(&prompt).await?;
        report.score = report.score.clamp(0.0, 100.0);
        Ok(report)
    }
}
