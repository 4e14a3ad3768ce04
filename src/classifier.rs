//! Document-type resolution
//!
//! Maps free text to one of the producible documents:
//! - `KeywordResolver`: deterministic keyword matching, no external calls
//! - `LlmResolver`: asks a text-classification model for a single-field JSON answer
//!
//! Both return `None` for "unknown"; neither ever fails or retries.

use crate::llm::CompletionClient;
use crate::models::DocumentType;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

#[async_trait]
pub trait DocumentTypeResolver: Send + Sync {
    async fn resolve(&self, input: &str) -> Option<DocumentType>;
}

/// Static keyword lists, checked in priority order
const ACT_KEYWORDS: &[&str] = &["акт", "act"];
const INVOICE_KEYWORDS: &[&str] = &["счёт", "счет", "invoice"];
const ORG_CARD_KEYWORDS: &[&str] = &["карточка", "реквизиты", "карт", "card"];

fn keywords(doc_type: DocumentType) -> &'static [&'static str] {
    match doc_type {
        DocumentType::Act => ACT_KEYWORDS,
        DocumentType::Invoice => INVOICE_KEYWORDS,
        DocumentType::OrganizationCard => ORG_CARD_KEYWORDS,
    }
}

/// Keyword resolver
pub struct KeywordResolver;

impl KeywordResolver {
    /// First type (Act, then Invoice, then card) with any keyword present wins.
    pub fn detect(input: &str) -> Option<DocumentType> {
        let text = input.to_lowercase();

        DocumentType::ALL
            .into_iter()
            .find(|doc_type| keywords(*doc_type).iter().any(|kw| text.contains(*kw)))
    }
}

#[async_trait]
impl DocumentTypeResolver for KeywordResolver {
    async fn resolve(&self, input: &str) -> Option<DocumentType> {
        Self::detect(input)
    }
}

/// Resolver backed by a language model
pub struct LlmResolver<C> {
    client: C,
}

impl<C: CompletionClient> LlmResolver<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    fn build_prompt(user_input: &str) -> String {
        let labels: Vec<String> = DocumentType::ALL
            .iter()
            .map(|doc_type| format!("\"{}\"", doc_type.label()))
            .collect();

        format!(
            r#"Определи тип документа, который хочет сформировать пользователь.
Ответь только JSON, без пояснений.
Формат ответа: {{"type": "<вид документа>"}}
Вместо <вид документа> используй один из: [{}]
Если определить не удалось, верни {{"type": null}}.
Запрос пользователя: {}"#,
            labels.join(", "),
            user_input.trim()
        )
    }
}

#[async_trait]
impl<C: CompletionClient> DocumentTypeResolver for LlmResolver<C> {
    async fn resolve(&self, input: &str) -> Option<DocumentType> {
        if input.trim().is_empty() {
            return None;
        }

        let prompt = Self::build_prompt(input);
        match self.client.complete(&prompt).await {
            Ok(response) => parse_classification(&response),
            Err(e) => {
                warn!("Classifier call failed, treating as unknown: {}", e);
                None
            }
        }
    }
}

/// Parse `{"type": ...}` from a model answer.
///
/// `null`, `"None"`, an empty string, malformed JSON, a missing field or a
/// label outside the closed set all mean "unknown".
pub fn parse_classification(response: &str) -> Option<DocumentType> {
    let cleaned = response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let json: Value = match serde_json::from_str(cleaned) {
        Ok(json) => json,
        Err(e) => {
            warn!("Classifier returned malformed JSON: {} | raw={}", e, response);
            return None;
        }
    };

    let raw_type = match json.get("type") {
        Some(Value::String(s)) => s.trim(),
        Some(Value::Null) | None => {
            debug!("Classifier found no document type");
            return None;
        }
        Some(other) => {
            warn!("Classifier returned non-string type: {}", other);
            return None;
        }
    };

    if raw_type.is_empty() || raw_type.eq_ignore_ascii_case("none") {
        return None;
    }

    let resolved = DocumentType::from_name(raw_type);
    if resolved.is_none() {
        warn!("Classifier returned a type outside the closed set: {}", raw_type);
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocsError;
    use std::sync::Mutex;

    /// Replays a canned answer and remembers the prompts it saw
    struct ScriptedClient {
        answer: std::result::Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn answering(answer: &str) -> Self {
            Self {
                answer: Ok(answer.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                answer: Err(message.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, prompt: &str) -> crate::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answer.clone().map_err(DocsError::LlmError)
        }
    }

    #[test]
    fn test_act_keywords() {
        let cases = vec!["акт", "Нужен АКТ выполненных работ", "please make an act", "ACT"];

        for c in cases {
            assert_eq!(KeywordResolver::detect(c), Some(DocumentType::Act), "{}", c);
        }
    }

    #[test]
    fn test_invoice_and_card_keywords() {
        assert_eq!(KeywordResolver::detect("выставь счёт"), Some(DocumentType::Invoice));
        assert_eq!(KeywordResolver::detect("нужен счет"), Some(DocumentType::Invoice));
        assert_eq!(KeywordResolver::detect("Invoice please"), Some(DocumentType::Invoice));
        assert_eq!(
            KeywordResolver::detect("пришлите реквизиты"),
            Some(DocumentType::OrganizationCard)
        );
        assert_eq!(
            KeywordResolver::detect("карточка организации"),
            Some(DocumentType::OrganizationCard)
        );
    }

    #[test]
    fn test_priority_order() {
        assert_eq!(
            KeywordResolver::detect("счёт и акт"),
            Some(DocumentType::Act)
        );
        assert_eq!(
            KeywordResolver::detect("карточка и счёт"),
            Some(DocumentType::Invoice)
        );
    }

    #[test]
    fn test_unknown_inputs() {
        let cases = vec!["", "   ", "привет", "добрый день", "hello there"];

        for c in cases {
            assert_eq!(KeywordResolver::detect(c), None, "{}", c);
        }
    }

    #[test]
    fn test_keyword_resolver_trait() {
        let resolver: Box<dyn DocumentTypeResolver> = Box::new(KeywordResolver);
        assert_eq!(
            tokio_test::block_on(resolver.resolve("акт")),
            Some(DocumentType::Act)
        );
    }

    #[test]
    fn test_parse_classification() {
        assert_eq!(parse_classification(r#"{"type": "Акт"}"#), Some(DocumentType::Act));
        assert_eq!(
            parse_classification("```json\n{\"type\": \"Карточка организации\"}\n```"),
            Some(DocumentType::OrganizationCard)
        );
        assert_eq!(parse_classification(r#"{"type": "invoice"}"#), Some(DocumentType::Invoice));
    }

    #[test]
    fn test_absence_marker_is_unknown() {
        assert_eq!(parse_classification(r#"{"type": "None"}"#), None);
        assert_eq!(parse_classification(r#"{"type": null}"#), None);
        assert_eq!(parse_classification(r#"{"type": ""}"#), None);
    }

    #[test]
    fn test_malformed_responses_are_unknown() {
        assert_eq!(parse_classification("Это акт"), None);
        assert_eq!(parse_classification(r#"{"kind": "Акт"}"#), None);
        assert_eq!(parse_classification(r#"{"type": 3}"#), None);
        assert_eq!(parse_classification(r#"{"type": "Договор"}"#), None);
        assert_eq!(parse_classification("[]"), None);
    }

    #[tokio::test]
    async fn test_llm_resolver_sends_closed_list() {
        let resolver = LlmResolver::new(ScriptedClient::answering(r#"{"type": "Счёт"}"#));

        assert_eq!(resolver.resolve("оплата за сервис").await, Some(DocumentType::Invoice));

        let prompts = resolver.client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        for doc_type in DocumentType::ALL {
            assert!(prompts[0].contains(doc_type.label()));
        }
        assert!(prompts[0].contains("оплата за сервис"));
    }

    #[tokio::test]
    async fn test_llm_resolver_failure_is_unknown() {
        let resolver = LlmResolver::new(ScriptedClient::failing("timeout"));
        assert_eq!(resolver.resolve("акт").await, None);
    }

    #[tokio::test]
    async fn test_llm_resolver_skips_empty_input() {
        let resolver = LlmResolver::new(ScriptedClient::answering(r#"{"type": "Акт"}"#));

        assert_eq!(resolver.resolve("  ").await, None);
        assert!(resolver.client.prompts.lock().unwrap().is_empty());
    }
}
