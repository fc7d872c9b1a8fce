use studymate_core::types::{section_heading, GenerationRequest, OutlineKind};

pub const SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant that answers questions based on documents. Provide accurate, detailed responses.";

pub const EMPTY_CONTEXT: &str = "No specific context provided.";

/// Join passages with blank lines until `max_chars` is reached. A first passage that is
/// too long on its own is cut at a character boundary.
pub fn build_context(passages: &[String], max_chars: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    for passage in passages {
        let sep = if out.is_empty() { 0 } else { 2 };
        let len = passage.chars().count();
        if used + sep + len > max_chars {
            if out.is_empty() {
                out = passage.chars().take(max_chars).collect();
            }
            break;
        }
        if sep > 0 {
            out.push_str("\n\n");
        }
        out.push_str(passage);
        used += sep + len;
    }
    out
}

/// User prompt for a request: either the grounded question or, when
/// `restructure` is set, the outline rewrite instruction.
pub fn build_prompt(request: &GenerationRequest, max_context_chars: usize) -> String {
    if let Some(r) = &request.restructure {
        return restructure_prompt(&request.question, r.outline, &r.raw_answer);
    }
    let mut context = build_context(&request.passages, max_context_chars);
    if context.trim().is_empty() {
        context = EMPTY_CONTEXT.to_string();
    }
    format!(
        "Based on the following document content, answer the question accurately and comprehensively.\n\n\
         Context from document:\n{context}\n\n\
         Question: {question}\n\n\
         Please provide a detailed, accurate answer based on the document content. \
         If the information isn't in the document, mention that clearly.",
        question = request.question
    )
}

fn restructure_prompt(question: &str, outline: OutlineKind, raw_answer: &str) -> String {
    let headings: Vec<String> = outline.sections().iter().map(|(t, m)| section_heading(t, *m)).collect();
    format!(
        "Rewrite the answer below as a {total}-mark academic answer. Use exactly these sections, in this order, \
         each starting with its heading on its own line:\n{headings}\n\n\
         Use only information contained in the answer; do not add new facts.\n\n\
         Question: {question}\n\nAnswer:\n{raw_answer}",
        total = outline.total_marks(),
        headings = headings.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use studymate_core::types::RestructureRequest;

    #[test]
    fn context_respects_budget() {
        let passages = vec!["aaaa".to_string(), "bbbb".to_string(), "cccc".to_string()];
        assert_eq!(build_context(&passages, 10), "aaaa\n\nbbbb");
        assert_eq!(build_context(&passages, 3), "aaa");
    }

    #[test]
    fn empty_context_is_announced() {
        let prompt = build_prompt(&GenerationRequest::new("Why?", vec![]), 100);
        assert!(prompt.contains(EMPTY_CONTEXT));
        assert!(prompt.contains("Question: Why?"));
    }

    #[test]
    fn restructure_prompt_lists_every_heading() {
        let mut request = GenerationRequest::new("Explain osmosis", vec!["ignored".into()]);
        request.restructure = Some(RestructureRequest { outline: OutlineKind::FourteenMark, raw_answer: "Osmosis is diffusion of water.".into() });
        let prompt = build_prompt(&request, 100);
        for h in ["**Introduction (2 marks)**", "**Analysis (8 marks)**", "**Evaluation (3 marks)**", "**Conclusion (1 mark)**"] {
            assert!(prompt.contains(h), "missing {h}");
        }
        assert!(prompt.contains("14-mark"));
        assert!(!prompt.contains("ignored"));
    }
}
