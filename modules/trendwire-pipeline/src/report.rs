use anyhow::Result;
use async_trait::async_trait;

use ai_client::{truncate_to_char_boundary, Claude};
use trendwire_common::{Locale, TrendItem};

use crate::traits::ReportGenerator;

const MAX_PROMPT_SNIPPET_BYTES: usize = 400;

/// Narrative reports from Claude.
pub struct ClaudeReporter {
    claude: Claude,
}

impl ClaudeReporter {
    pub fn new(claude: Claude) -> Self {
        Self { claude }
    }
}

#[async_trait]
impl ReportGenerator for ClaudeReporter {
    fn name(&self) -> &str {
        self.claude.model()
    }

    async fn generate(
        &self,
        item: &TrendItem,
        locale: &Locale,
        context_titles: &[String],
        snippets: &[String],
    ) -> Result<String> {
        let system = system_prompt(locale);
        let user = user_prompt(item, locale, context_titles, snippets);
        let text = self.claude.chat_completion(system, user).await?;
        Ok(text.trim().to_string())
    }
}

fn system_prompt(locale: &Locale) -> String {
    let language = match locale.as_str() {
        "ko" => "Korean",
        "ja" => "Japanese",
        _ => "English",
    };
    format!(
        "You write short briefings on trending search topics. \
         Write 2-3 sentences in {language}. Explain what the topic is and why people are \
         searching for it, using only the headlines and snippets provided. \
         Do not invent facts. Plain text, no markdown, no preamble."
    )
}

fn user_prompt(item: &TrendItem, locale: &Locale, context_titles: &[String], snippets: &[String]) -> String {
    let mut prompt = format!("Topic: {}\n", item.display_title(locale));
    if item.display_title(locale) != item.original_title {
        prompt.push_str(&format!("Original title: {}\n", item.original_title));
    }
    if let Some(popularity) = &item.popularity {
        prompt.push_str(&format!("Search volume: {popularity}\n"));
    }
    if !context_titles.is_empty() {
        prompt.push_str("\nHeadlines:\n");
        for title in context_titles {
            prompt.push_str(&format!("- {title}\n"));
        }
    }
    if !snippets.is_empty() {
        prompt.push_str("\nSnippets:\n");
        for snippet in snippets {
            prompt.push_str(&format!(
                "- {}\n",
                truncate_to_char_boundary(snippet, MAX_PROMPT_SNIPPET_BYTES)
            ));
        }
    }
    prompt
}

/// Deterministic narrative built only from the item's translated text.
pub fn template_report(
    item: &TrendItem,
    locale: &Locale,
    context_titles: &[String],
    snippets: &[String],
) -> String {
    let title = item.display_title(locale);
    let non_empty = |list: &[String]| -> Vec<String> {
        list.iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };
    let headlines = non_empty(context_titles);
    let snippets = non_empty(snippets);

    match locale.as_str() {
        "ko" => {
            let news = or_default(&headlines, ", ", "다양한 매체");
            let context = or_default(&snippets, " ", "관련 분야");
            format!(
                "현재 \"{title}\" 키워드가 트렌드로 급부상하고 있습니다. \
                 관련 보도에 따르면 {news} 등의 소식이 주목받고 있으며, \
                 {context} 등의 사회적 맥락이 확인됩니다. \
                 해당 이슈에 대한 대중의 관심도가 매우 높은 것으로 나타납니다."
            )
        }
        "ja" => {
            let news = or_default(&headlines, "、", "様々なメディア");
            let context = or_default(&snippets, " ", "関連分野");
            format!(
                "現在「{title}」がトレンドとして急上昇しています。\
                 {news}などのニュースが注目されており、\
                 {context}といった背景が確認されます。\
                 この話題に対する関心は非常に高いことがわかります。"
            )
        }
        _ => {
            let news = or_default(&headlines, ", ", "various media outlets");
            let context = or_default(&snippets, " ", "relevant discussions");
            format!(
                "\"{title}\" is rapidly emerging as a trend. \
                 News highlights include {news}. \
                 Contextual signals show {context}. \
                 Public interest in this topic is very high."
            )
        }
    }
}

fn or_default(list: &[String], separator: &str, default: &str) -> String {
    if list.is_empty() {
        default.to_string()
    } else {
        list.join(separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendwire_common::{OriginTag, RawTrendEntry};

    fn item_with(locale: &Locale, translated: &str) -> TrendItem {
        let mut item = TrendItem::from_raw(RawTrendEntry::new("Election", OriginTag::PrimaryFeed));
        item.translations.insert(locale.clone(), translated.to_string());
        item
    }

    fn locale(code: &str) -> Locale {
        Locale::parse(code).unwrap()
    }

    #[test]
    fn english_template_joins_headlines() {
        let en = locale("en");
        let item = item_with(&en, "Election");
        let text = template_report(
            &item,
            &en,
            &["Polls open".to_string(), "Turnout high".to_string()],
            &["Voters queue early.".to_string()],
        );
        assert!(text.starts_with("\"Election\" is rapidly emerging"));
        assert!(text.contains("Polls open, Turnout high"));
        assert!(text.contains("Voters queue early."));
    }

    #[test]
    fn empty_lists_use_default_phrases() {
        let ko = locale("ko");
        let item = item_with(&ko, "선거");
        let text = template_report(&item, &ko, &[], &["  ".to_string()]);
        assert!(text.contains("\"선거\""));
        assert!(text.contains("다양한 매체"));
        assert!(text.contains("관련 분야"));
    }

    #[test]
    fn japanese_template_is_japanese_only() {
        let ja = locale("ja");
        let item = item_with(&ja, "選挙");
        let text = template_report(&item, &ja, &["投票開始".to_string(), "出口調査".to_string()], &[]);
        assert!(text.contains("「選挙」"));
        assert!(text.contains("投票開始、出口調査"));
        assert!(!text.chars().any(|c| ('\u{AC00}'..='\u{D7A3}').contains(&c)));
    }

    #[test]
    fn untranslated_item_uses_original_title() {
        let item = TrendItem::from_raw(RawTrendEntry::new("Election", OriginTag::PrimaryFeed));
        let text = template_report(&item, &locale("ja"), &[], &[]);
        assert!(text.contains("「Election」"));
    }

    #[test]
    fn template_is_deterministic() {
        let en = locale("en");
        let item = item_with(&en, "Election");
        let a = template_report(&item, &en, &["x".to_string()], &[]);
        let b = template_report(&item, &en, &["x".to_string()], &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn prompt_lists_headlines_and_original_title() {
        let ko = locale("ko");
        let item = item_with(&ko, "선거");
        let prompt = user_prompt(&item, &ko, &["투표 시작".to_string()], &[]);
        assert!(prompt.starts_with("Topic: 선거\n"));
        assert!(prompt.contains("Original title: Election"));
        assert!(prompt.contains("- 투표 시작"));
        assert!(!prompt.contains("Snippets"));
    }
}
