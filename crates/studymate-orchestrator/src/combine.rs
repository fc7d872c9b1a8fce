use studymate_core::config::CombineStrategy;
use studymate_core::types::{BackendId, OutlineKind};

use crate::formatter::count_outline_headings;

/// One successful answer with the label it is attributed under.
#[derive(Debug, Clone, Copy)]
pub struct Contribution<'a> {
    pub backend: &'a BackendId,
    pub label: &'a str,
    pub answer: &'a str,
}

/// Merges two or more successful answers into one text.
///
/// Implementations must be pure: the same contributions (given in BackendId
/// order) always produce the same text.
pub trait CombinePolicy: Send + Sync {
    fn name(&self) -> &'static str;
    fn combine(&self, contributions: &[Contribution<'_>], outline: Option<OutlineKind>) -> String;
}

const HEADER_PREFIX: &str = "**Comprehensive Answer (Combined from ";
const LABEL_SUFFIX: &str = " Insights:**";

/// True for the header and per-backend label lines written by `LabeledConcatenation`.
pub fn is_attribution_line(line: &str) -> bool {
    let t = line.trim();
    (t.starts_with(HEADER_PREFIX) && t.ends_with("):**")) || (t.starts_with("**") && t.ends_with(LABEL_SUFFIX))
}

pub fn policy_for(strategy: CombineStrategy) -> Box<dyn CombinePolicy> {
    match strategy {
        CombineStrategy::Concatenate => Box::new(LabeledConcatenation),
        CombineStrategy::MostStructured => Box::new(MostStructured),
    }
}

/// Header naming every contributor, then one labeled block per distinct answer.
/// Identical answers share a block under a joint label.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabeledConcatenation;

impl CombinePolicy for LabeledConcatenation {
    fn name(&self) -> &'static str {
        "concatenate"
    }

    fn combine(&self, contributions: &[Contribution<'_>], _outline: Option<OutlineKind>) -> String {
        let labels: Vec<&str> = contributions.iter().map(|c| c.label).collect();
        let mut groups: Vec<(Vec<&str>, &str)> = Vec::new();
        for c in contributions {
            let answer = c.answer.trim();
            match groups.iter_mut().find(|(_, a)| *a == answer) {
                Some((group, _)) => group.push(c.label),
                None => groups.push((vec![c.label], answer)),
            }
        }

        let mut out = format!("{HEADER_PREFIX}{}):**\n\n", labels.join(", "));
        for (group, answer) in groups {
            out.push_str(&format!("**{}{LABEL_SUFFIX}\n{}\n\n", group.join(" & "), answer));
        }
        out.trim_end().to_string()
    }
}

/// Picks the answer that already follows the requested outline most closely.
/// Ties go to the lowest BackendId.
#[derive(Debug, Clone, Copy, Default)]
pub struct MostStructured;

impl CombinePolicy for MostStructured {
    fn name(&self) -> &'static str {
        "most_structured"
    }

    fn combine(&self, contributions: &[Contribution<'_>], outline: Option<OutlineKind>) -> String {
        let mut best: Option<(usize, &Contribution<'_>)> = None;
        for c in contributions {
            let score = count_outline_headings(c.answer, outline);
            let better = best.map_or(true, |(s, b)| score > s || (score == s && c.backend < b.backend));
            if better {
                best = Some((score, c));
            }
        }
        best.map(|(_, c)| c.answer.trim().to_string()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_answers_share_a_block() {
        let (a, b, c) = (BackendId::new("a"), BackendId::new("b"), BackendId::new("c"));
        let contributions = [
            Contribution { backend: &a, label: "A", answer: "Same." },
            Contribution { backend: &b, label: "B", answer: "Other." },
            Contribution { backend: &c, label: "C", answer: " Same. " },
        ];
        let text = LabeledConcatenation.combine(&contributions, None);
        assert_eq!(
            text,
            "**Comprehensive Answer (Combined from A, B, C):**\n\n**A & C Insights:**\nSame.\n\n**B Insights:**\nOther."
        );
    }

    #[test]
    fn most_structured_prefers_outline() {
        let (a, b) = (BackendId::new("a"), BackendId::new("b"));
        let plain = Contribution { backend: &a, label: "A", answer: "Just text." };
        let shaped = Contribution {
            backend: &b,
            label: "B",
            answer: "**Introduction (1 mark)**\nx\n**Analysis (5 marks)**\ny\n**Conclusion (1 mark)**\nz",
        };
        assert_eq!(MostStructured.combine(&[plain, shaped], Some(OutlineKind::SevenMark)), shaped.answer);
        assert_eq!(MostStructured.combine(&[shaped, plain], Some(OutlineKind::SevenMark)), shaped.answer);
    }

    #[test]
    fn most_structured_tie_goes_to_lowest_backend_id() {
        let (a, b) = (BackendId::new("alpha"), BackendId::new("beta"));
        let first = Contribution { backend: &b, label: "Beta", answer: "From beta." };
        let second = Contribution { backend: &a, label: "Alpha", answer: "From alpha." };
        assert_eq!(MostStructured.combine(&[first, second], None), "From alpha.");
    }
}
