//! Prompt personas and user-message templates for the two response modes.

/// System persona for conversational answers.
pub const SYSTEM_PROMPT_CHAT: &str = "\
You are a knowledgeable assistant specializing in pharmaceutical procedures, \
regulations, and documentation. Your task is to provide accurate, clear, and \
concise responses based on the context provided. Maintain a professional tone \
while being helpful and informative.

Your capabilities:
- Explaining pharmaceutical procedures and protocols
- Clarifying regulatory requirements
- Helping with document interpretation
- Providing step-by-step guidance on processes

If the user greets you, greet them back, ignore the context below, and ask how \
you can assist them today.
Always base your answers on the provided context. If you're unsure or the \
context doesn't contain relevant information, admit that and suggest what might \
help instead of making up information. Don't answer questions unrelated to \
pharmaceutical documentation.";

/// System persona for structured report generation.
pub const SYSTEM_PROMPT_REPORT: &str = "\
You are a pharmaceutical documentation specialist tasked with creating \
comprehensive, detailed reports based on the provided context. Your reports \
should be thorough, well-structured, and professionally written. Create your \
reports with the given structure. Your report should be approximately 3 pages \
in length, comprehensive yet focused on the specific query. Use precise \
language, industry-standard terminology, and maintain a formal tone throughout.";

/// Streamed verbatim when retrieval comes back empty.
pub const NO_CONTEXT_NOTICE: &str = "I couldn't find any relevant information \
to answer your question. Please try rephrasing your query or check if the \
documents contain the information you're looking for.";

/// User message wrapping context and question for chat mode.
pub fn chat_user_message(context: &str, query: &str) -> String {
    format!(
        "Answer general user queries and greet properly, ignoring the context \
below if the user asks a general question or greets. Otherwise, answer the \
following question based on the provided context. Don't add any extra or \
false information.

Context:
{context}

Question: {query}"
    )
}

/// User message carrying the full report structure for report mode.
pub fn report_user_message(context: &str, query: &str) -> String {
    format!(
        "Generate an extremely detailed, comprehensive, professional report \
based on the query and context below. Use beautiful Markdown formatting.

Context:
{context}

Query: {query}

Report Structure:

# [Informative Title]

## Executive Summary (min 300 words): Comprehensive overview, key findings, critical details, recommendations.

## Introduction (min 250 words): Context, purpose, background, relevance.

## Scope (min 200 words): Coverage, limitations, specific procedures/regulations addressed.

## Methodology (min 200 words): Information sourcing, analysis, synthesis, references to specific documents.

## Findings (min 800-1000 words): MOST SUBSTANTIAL SECTION. Present ALL relevant info with extensive detail. Use subsections, lists, bullet points. Include procedures, steps, regulations, technical details, parameters, specifications. Explain concepts and connections. Highlight critical points.

## Analysis (min 300-400 words): Assess findings, evaluate information completeness, identify strengths/gaps, compare to best practices, discuss challenges, assess compliance.

## Recommendations (min 300 words): Detailed, actionable steps based on findings. Suggest improvements, controls, documentation changes. Prioritize.

## Conclusion (min 200 words): Summarize key findings, implications, path forward.

## References: List all sources (SOPs, guidelines, regulations).

---

FORMATTING & INSTRUCTIONS:
- Use proper Markdown (headings, subheadings, bold, lists, tables if needed, blockquotes for references).
- Be highly detailed and comprehensive (target 8-10 printed pages)."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_embeds_context_and_question() {
        let msg = chat_user_message("CTX-42", "How is cleaning validated?");
        assert!(msg.contains("Context:\nCTX-42"));
        assert!(msg.contains("Question: How is cleaning validated?"));
    }

    #[test]
    fn report_message_carries_every_section() {
        let msg = report_user_message("ctx", "q");
        for section in [
            "Executive Summary",
            "Introduction",
            "Scope",
            "Methodology",
            "Findings",
            "Analysis",
            "Recommendations",
            "Conclusion",
            "References",
        ] {
            assert!(msg.contains(section), "missing section {section}");
        }
    }
}
