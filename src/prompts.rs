use crate::events::{ChatMode, Locale};

/// Reply the assistant must give for anything outside its legal scope.
pub const REFUSAL_PHRASE: &str =
    "My expertise is strictly limited to legal matters in East Africa. I cannot answer questions about that topic.";

/// Appended by the assistant to every reply.
pub const DISCLAIMER: &str =
    "**Disclaimer: This is for educational purposes only. Consult a qualified Advocate.**";

/// Acknowledgement used as the model side of a priming exchange.
pub const PRIMING_ACK: &str = "Understood. I will follow this mandate for every reply.";

pub const UNAUTHORIZED_REPLY: &str = "Error 403: API Key Invalid or Restricted.";

pub const GENERIC_FAILURE_REPLY: &str =
    "I encountered an error processing your request. Please try again.";

/// Persona mandate for a session scoped to `country`.
pub fn mandate_prompt(country: &str) -> String {
    format!(
        r#"You are SheriaSenseEA, a specialized legal assistant for East Africa.

**CURRENT CONTEXT:**
You are currently assisting a user in **{country}**.
Prioritize the Constitution and Laws of **{country}**.

**YOUR STRICT MANDATE:**
1. **SCOPE:** You deal ONLY with the Laws, Constitutions, Legal Procedures, and Civic Matters of **Kenya, Uganda, and Tanzania**.
2. **REFUSAL PROTOCOL:** If a user asks about:
   - Politics (unrelated to law)
   - General Knowledge (e.g., "Who is the President of USA?")
   - Laws of countries outside East Africa (e.g., US Law)
   - Sports, Entertainment, or Personal advice

   **YOU MUST REPLY:** "{refusal}"

**RESPONSE FORMAT:**
1. **IF "How to..." / "Steps for...":** Prerequisites -> Numbered Steps.
2. **IF Document Analysis:** Summary -> Key Risks/Clauses.
3. **IF General Legal Question:** Direct Answer -> Legal Basis (Cite laws).

4. **DISCLAIMER:** End EVERY message with: "{disclaimer}"
"#,
        country = country,
        refusal = REFUSAL_PHRASE,
        disclaimer = DISCLAIMER,
    )
}

/// Bracketed directive prefixed to every outgoing prompt.
pub fn country_directive(country: &str) -> String {
    format!(
        "[Context: The user is located in {country}. Answer strictly according to {country} laws.]"
    )
}

/// Suffix asking for a reply in the secondary locale.
pub const SWAHILI_DIRECTIVE: &str = " (Reply in fluent Swahili, use simple legal terms)";

/// Outgoing prompt text: country directive, raw input, optional language directive.
pub fn decorate_prompt(user_text: &str, country: &str, locale: Locale) -> String {
    let mut prompt = format!("{} {}", country_directive(country), user_text);
    if locale.is_secondary() {
        prompt.push_str(SWAHILI_DIRECTIVE);
    }
    prompt
}

/// Turn text used when a file is sent without any accompanying text.
pub fn default_document_prompt(country: &str) -> String {
    format!("Analyze this document based on the laws of {country}. Summarize legal risks.")
}

pub fn model_not_found_reply(model: &str) -> String {
    format!("Error 404: The model '{model}' was not found. Please verify your API key access.")
}

/// History placeholder for a submission carrying only a file.
pub fn attachment_placeholder(locale: Locale) -> &'static str {
    match locale {
        Locale::English => "Analyze this document",
        Locale::Swahili => "Chambua hati hii",
    }
}

/// Assistant entry appended when dispatch fails outright.
pub fn request_failed_reply(locale: Locale) -> &'static str {
    match locale {
        Locale::English => "Error processing request. Please try again.",
        Locale::Swahili => "Hitilafu imetokea. Tafadhali jaribu tena.",
    }
}

pub fn welcome_message(country: &str, mode: ChatMode, locale: Locale) -> String {
    match (mode, locale) {
        (ChatMode::Analyze, Locale::Swahili) => format!(
            "Jambo! Uko katika **Hali ya Kuchambua Hati** 📄\nNiko tayari kupitia hati zako za kisheria za **{country}**.\n**Tafadhali pakia picha au PDF** ukitumia amri ya /attach (📎)."
        ),
        (ChatMode::Analyze, Locale::English) => format!(
            "Jambo! You are in **Document Analysis Mode** 📄\nI am ready to review your **{country}** legal documents.\n**Please upload an image or PDF** using the /attach command (📎)."
        ),
        (ChatMode::Guide, Locale::Swahili) => format!(
            "Jambo! Uko katika **Hali ya Mwongozo wa Hatua kwa Hatua** 🗺️\nNaweza kukuongoza kupitia taratibu rasmi za **{country}**.\n**Andika tu unachotaka kufanya.**"
        ),
        (ChatMode::Guide, Locale::English) => format!(
            "Jambo! You are in **Step-by-Step Guide Mode** 🗺️\nI can walk you through official **{country}** procedures.\n**Just type what you want to do.**"
        ),
        (ChatMode::General, Locale::Swahili) => format!(
            "Jambo! Karibu kwa **SheriaSenseEA**.\nNiko tayari kuelezea sheria za **{country}**.\n**Naweza kukusaidia aje leo?**"
        ),
        (ChatMode::General, Locale::English) => format!(
            "Jambo! Welcome to **SheriaSenseEA**.\nI am currently set to explain **{country}** laws.\n**How can I help you today?**"
        ),
    }
}

/// Canned prompt offered as a one-key shortcut
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionChip {
    pub label: &'static str,
    pub text: &'static str,
}

const CHIPS_EN: [SuggestionChip; 4] = [
    SuggestionChip { label: "Arrested?", text: "I have been arrested. What are my immediate rights?" },
    SuggestionChip { label: "Rent Dispute", text: "My landlord wants to evict me. What is the law?" },
    SuggestionChip { label: "Fired?", text: "I was fired without notice. Is this legal?" },
    SuggestionChip { label: "Contract Review", text: "What should I look for before signing a contract?" },
];

const CHIPS_SW: [SuggestionChip; 4] = [
    SuggestionChip { label: "Nimekamatwa?", text: "Nimekamatwa na polisi. Haki zangu ni zipi?" },
    SuggestionChip { label: "Mzozo wa Kodi", text: "Mwenye nyumba anataka kunifukuza. Sheria inasemaje?" },
    SuggestionChip { label: "Nimefutwa?", text: "Nimefutwa kazi bila notisi. Hii ni halali?" },
    SuggestionChip { label: "Kagua Mkataba", text: "Niangalie nini kabla ya kutia saini mkataba?" },
];

pub fn suggestion_chips(locale: Locale) -> &'static [SuggestionChip] {
    match locale {
        Locale::English => &CHIPS_EN,
        Locale::Swahili => &CHIPS_SW,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mandate_contains_fixed_phrases() {
        let prompt = mandate_prompt("Tanzania");
        assert!(prompt.contains("assisting a user in **Tanzania**"));
        assert!(prompt.contains(REFUSAL_PHRASE));
        assert!(prompt.contains(DISCLAIMER));
    }

    #[test]
    fn test_decorate_prompt_english() {
        let prompt = decorate_prompt("Can I be evicted?", "Uganda", Locale::English);
        assert_eq!(
            prompt,
            "[Context: The user is located in Uganda. Answer strictly according to Uganda laws.] Can I be evicted?"
        );
    }

    #[test]
    fn test_decorate_prompt_swahili_appends_directive() {
        let prompt = decorate_prompt("Nimekamatwa na polisi", "Kenya", Locale::Swahili);
        assert!(prompt.starts_with("[Context: The user is located in Kenya."));
        assert!(prompt.ends_with("(Reply in fluent Swahili, use simple legal terms)"));
        assert!(prompt.contains("Nimekamatwa na polisi"));
    }

    #[test]
    fn test_welcome_varies_by_locale_and_mode() {
        let en = welcome_message("Kenya", ChatMode::General, Locale::English);
        let sw = welcome_message("Kenya", ChatMode::General, Locale::Swahili);
        assert_ne!(en, sw);
        assert!(en.contains("**Kenya**"));
        assert!(welcome_message("Uganda", ChatMode::Analyze, Locale::English).contains("Document Analysis Mode"));
        assert!(welcome_message("Uganda", ChatMode::Guide, Locale::Swahili).contains("Mwongozo"));
    }

    #[test]
    fn test_chips_swap_with_locale() {
        assert_eq!(suggestion_chips(Locale::English).len(), 4);
        assert_eq!(suggestion_chips(Locale::Swahili)[0].text, "Nimekamatwa na polisi. Haki zangu ni zipi?");
    }
}
