//! Reshapes a raw answer into a fixed academic outline.
//!
//! The preferred path asks a contributing backend to rewrite the answer with
//! explicit section headings; the result is kept only if every heading parses.
//! Otherwise the raw answer's sentences are split across the sections in
//! proportion to their marks. Neither path adds content of its own.
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use studymate_core::chunker::split_sentences;
use studymate_core::types::{section_heading, BackendId, CombinedAnswer, GenerationRequest, OutlineKind, RestructureRequest};

use crate::combine::is_attribution_line;
use crate::orchestrator::Orchestrator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatMethod {
    Reprompted(BackendId),
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub marks: u8,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredAnswer {
    pub outline: OutlineKind,
    pub sections: Vec<Section>,
    pub method: FormatMethod,
}

impl StructuredAnswer {
    /// Markdown with one bold heading per section and the mark allocation footer.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for s in &self.sections {
            out.push_str(&section_heading(&s.title, s.marks));
            out.push('\n');
            if !s.body.is_empty() {
                out.push_str(&s.body);
                out.push('\n');
            }
            out.push('\n');
        }
        let parts: Vec<String> = self.sections.iter().map(|s| format!("{} ({})", s.title, s.marks)).collect();
        out.push_str(&format!("**Mark Allocation:** {} = {} Marks", parts.join(" + "), self.outline.total_marks()));
        out
    }
}

/// Index of the outline section `line` is a heading for, if any.
fn heading_index(line: &str, outline: OutlineKind) -> Option<usize> {
    let stripped = line.trim().trim_start_matches(|c: char| c == '#' || c == '*' || c.is_whitespace());
    let lower = stripped.to_lowercase();
    outline.sections().iter().position(|(title, _)| {
        lower.strip_prefix(&title.to_lowercase()).is_some_and(|rest| {
            let rest = rest.trim_matches(|c: char| c == '*' || c == ':' || c.is_whitespace());
            rest.is_empty() || (rest.starts_with('(') && rest.ends_with(')'))
        })
    })
}

fn looks_like_heading(line: &str) -> bool {
    let t = line.trim();
    t.starts_with('#') || (t.starts_with("**") && (t.ends_with("**") || t.ends_with(":**")))
}

/// Distinct outline headings present in `text`; without an outline, any markdown heading lines.
pub fn count_outline_headings(text: &str, outline: Option<OutlineKind>) -> usize {
    match outline {
        Some(outline) => {
            let mut seen = vec![false; outline.sections().len()];
            for line in text.lines() {
                if let Some(i) = heading_index(line, outline) {
                    seen[i] = true;
                }
            }
            seen.into_iter().filter(|s| *s).count()
        }
        None => text.lines().filter(|l| looks_like_heading(l)).count(),
    }
}

/// Parse a restructured answer. Every section heading must appear, in order,
/// each followed by a non-empty body.
pub fn parse_sections(text: &str, outline: OutlineKind) -> Option<Vec<Section>> {
    let skeleton = outline.sections();
    let mut bodies: Vec<Vec<&str>> = Vec::new();
    for line in text.lines() {
        match heading_index(line, outline) {
            Some(i) if i == bodies.len() => bodies.push(Vec::new()),
            Some(_) => return None,
            None => {
                if let Some(body) = bodies.last_mut() {
                    if !line.trim().is_empty() {
                        body.push(line.trim());
                    }
                }
            }
        }
    }
    if bodies.len() != skeleton.len() || bodies.iter().any(|b| b.is_empty()) {
        return None;
    }
    Some(
        skeleton
            .iter()
            .zip(bodies)
            .map(|((title, marks), body)| Section { title: title.to_string(), marks: *marks, body: body.join("\n") })
            .collect(),
    )
}

/// Sentence counts per section: proportional to marks by largest remainder,
/// at least one each when there are enough sentences.
fn allocate(sentences: usize, outline: OutlineKind) -> Vec<usize> {
    let skeleton = outline.sections();
    let m = skeleton.len();
    if sentences < m {
        // too few sentences: fill sections in priority order
        let priority = ["Analysis", "Introduction", "Conclusion", "Evaluation"];
        let mut counts = vec![0; m];
        for title in priority.iter().take(sentences) {
            if let Some(i) = skeleton.iter().position(|(t, _)| t == title) {
                counts[i] = 1;
            }
        }
        return counts;
    }

    let total = f64::from(outline.total_marks());
    let quotas: Vec<f64> = skeleton.iter().map(|(_, marks)| sentences as f64 * f64::from(*marks) / total).collect();
    let mut counts: Vec<usize> = quotas.iter().map(|q| (q.floor() as usize).max(1)).collect();

    let mut assigned: usize = counts.iter().sum();
    while assigned < sentences {
        let i = (0..m)
            .max_by(|&a, &b| {
                let ra = quotas[a] - counts[a] as f64;
                let rb = quotas[b] - counts[b] as f64;
                ra.total_cmp(&rb).then(b.cmp(&a))
            })
            .unwrap_or(0);
        counts[i] += 1;
        assigned += 1;
    }
    while assigned > sentences {
        let i = (0..m)
            .filter(|&i| counts[i] > 1)
            .max_by(|&a, &b| {
                let ea = counts[a] as f64 - quotas[a];
                let eb = counts[b] as f64 - quotas[b];
                ea.total_cmp(&eb).then(b.cmp(&a))
            });
        let Some(i) = i else { break };
        counts[i] -= 1;
        assigned -= 1;
    }
    counts
}

/// Drop the combined-answer header and `**OpenAI Insights:**` style labels before splitting.
fn strip_labels(raw: &str) -> String {
    raw.lines().filter(|l| !is_attribution_line(l)).collect::<Vec<_>>().join("\n")
}

/// Split the raw answer's sentences contiguously and in order across the outline.
pub fn heuristic_split(raw: &str, outline: OutlineKind) -> StructuredAnswer {
    let sentences = split_sentences(&strip_labels(raw));
    let counts = allocate(sentences.len(), outline);
    let mut rest = sentences.as_slice();
    let sections = outline
        .sections()
        .iter()
        .zip(counts)
        .map(|((title, marks), n)| {
            let (take, tail) = rest.split_at(n.min(rest.len()));
            rest = tail;
            Section { title: title.to_string(), marks: *marks, body: take.join(" ") }
        })
        .collect();
    StructuredAnswer { outline, sections, method: FormatMethod::Heuristic }
}

/// Format `combined` into `outline`, re-prompting the first contributor that can restructure.
pub async fn structure(orchestrator: &Orchestrator, question: &str, combined: &CombinedAnswer, outline: OutlineKind) -> StructuredAnswer {
    let candidate = combined
        .contributors
        .iter()
        .filter_map(|c| orchestrator.backend(&c.backend))
        .find(|b| b.supports_restructure());

    if let Some(backend) = candidate {
        let request = GenerationRequest {
            question: question.to_string(),
            passages: Vec::new(),
            restructure: Some(RestructureRequest { outline, raw_answer: combined.text.clone() }),
        };
        match tokio::time::timeout(orchestrator.timeout(), backend.generate(&request)).await {
            Ok(Ok(text)) => match parse_sections(&text, outline) {
                Some(sections) => {
                    debug!(backend = %backend.id(), ?outline, "restructured answer");
                    return StructuredAnswer { outline, sections, method: FormatMethod::Reprompted(backend.id().clone()) };
                }
                None => warn!(backend = %backend.id(), "restructured answer is missing section headings"),
            },
            Ok(Err(e)) => warn!(backend = %backend.id(), error = %e, "restructure request failed"),
            Err(_) => warn!(backend = %backend.id(), "restructure request timed out"),
        }
    }
    heuristic_split(&combined.text, outline)
}
