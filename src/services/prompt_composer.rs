use crate::models::Tone;

const BASE_INSTRUCTION: &str = "Rewrite the text below so it reads naturally and fluently, \
as if a person wrote it. Keep the original meaning intact.";

const COMMON_RULES: &str = "Never use the dash characters \"\u{2014}\" or \"-\" in your answer. \
Return only the rewritten text, without labels, headings, quotes or explanations.";

fn tone_clause(tone: Tone) -> &'static str {
    match tone {
        Tone::Default => "Use a clear, neutral tone.",
        Tone::Professional => {
            "Use formal, polished business language suited to professional communication."
        }
        Tone::Casual => "Use relaxed, conversational language, as if talking to a friend.",
        Tone::Seo => {
            "Keep the important keywords and phrase the text so it stays readable \
             and search engine friendly."
        }
        Tone::Friendly => "Use warm, approachable language that feels welcoming.",
    }
}

/// Builds the instruction sent upstream for `text` in the given `tone`.
pub fn compose(text: &str, tone: Tone) -> String {
    format!(
        "{BASE_INSTRUCTION} {} {COMMON_RULES}\n\nText:\n\"{}\"",
        tone_clause(tone),
        text
    )
}
