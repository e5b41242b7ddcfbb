//! Deterministic heuristic policy: an ordered rule table mapping known input
//! prompts to ranked candidate values, plus screen classification.
//!
//! Rule order matters: the first rule whose keywords all appear in the
//! prompt wins, and candidate order is part of the contract (the replay
//! engine depends on crawls being reproducible without an LLM).

use tracing::debug;

use tbcrawl_core::ScreenType;
use tbcrawl_telegram::ButtonExtraction;

use crate::{Decision, DecisionPolicy, PolicyError, UiSnapshot};

/// One rule row: all `keywords` must appear (case-insensitive) in the prompt.
struct Rule {
    keywords: &'static [&'static str],
    candidates: &'static [&'static str],
}

/// Ordered rule table, most specific first.
const RULES: &[Rule] = &[
    // Customs duty rate in percent.
    Rule {
        keywords: &["ставку", "%"],
        candidates: &["5", "10", "15", "20", "25"],
    },
    // 10-digit commodity (ТН ВЭД) codes.
    Rule {
        keywords: &["10-значный", "код"],
        candidates: &["9027901000", "6109100000", "4202221000", "8471300000"],
    },
    Rule {
        keywords: &["email"],
        candidates: &["test@example.com", "user@mail.ru"],
    },
    Rule {
        keywords: &["почт"],
        candidates: &["test@example.com", "user@mail.ru"],
    },
    Rule {
        keywords: &["телефон"],
        candidates: &["+79001234567", "89001234567"],
    },
    Rule {
        keywords: &["сумм"],
        candidates: &["100", "1000", "5000"],
    },
    Rule {
        keywords: &["дату"],
        candidates: &["01.01.2025", "15.06.2025"],
    },
    Rule {
        keywords: &["назван"],
        candidates: &["Тест", "Пример"],
    },
];

/// Fallback candidates when no rule matches a free-text prompt.
const DEFAULT_CANDIDATES: &[&str] = &["Тест", "1"];

/// Ranked input-value candidates for a prompt. First matching rule wins;
/// unmatched prompts get the generic fallback.
pub fn input_candidates(prompt: &str) -> Vec<String> {
    let lowered = prompt.to_lowercase();
    for rule in RULES {
        if rule.keywords.iter().all(|k| lowered.contains(k)) {
            debug!(keywords = ?rule.keywords, "heuristic rule matched");
            return rule.candidates.iter().map(|c| c.to_string()).collect();
        }
    }
    DEFAULT_CANDIDATES.iter().map(|c| c.to_string()).collect()
}

/// Phrases that mark a screen as asking for free-text input.
const INPUT_PROMPT_MARKERS: &[&str] = &[
    "введите", "укажите", "отправьте", "напишите", "пришлите", "введи", "enter", "type",
];

/// Classifies a screen: buttons present → menu; input-prompt phrasing (or a
/// trailing colon/question mark) without buttons → input required; otherwise
/// terminal.
pub fn classify_screen(text: &str, extraction: &ButtonExtraction) -> ScreenType {
    if !extraction.is_empty() {
        return ScreenType::Menu;
    }
    let lowered = text.to_lowercase();
    let trimmed = lowered.trim_end();
    if INPUT_PROMPT_MARKERS.iter().any(|m| lowered.contains(m))
        || trimmed.ends_with(':')
        || trimmed.ends_with('?')
    {
        return ScreenType::InputRequired;
    }
    ScreenType::Terminal
}

/// Assist-mode policy: no LLM, fully deterministic.
#[derive(Debug, Default, Clone)]
pub struct HeuristicPolicy;

#[async_trait::async_trait]
impl DecisionPolicy for HeuristicPolicy {
    async fn decide(&self, snapshot: &UiSnapshot) -> Result<Decision, PolicyError> {
        if snapshot.input_required {
            let value = input_candidates(&snapshot.screen_text)
                .into_iter()
                .next()
                .unwrap_or_else(|| "Тест".to_string());
            return Ok(Decision::SendText { value });
        }
        if let Some(b) = snapshot.buttons.first() {
            let decision = match b.kind {
                tbcrawl_core::ButtonKind::Reply => Decision::ClickReply {
                    row: b.row,
                    col: b.col,
                },
                _ => Decision::ClickInline {
                    row: b.row,
                    col: b.col,
                },
            };
            return Ok(decision);
        }
        Ok(Decision::Stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_prompt_candidates_in_order() {
        let candidates = input_candidates("Укажите ставку пошлины в %");
        assert_eq!(&candidates[..3], &["5", "10", "15"]);
    }

    #[test]
    fn test_ten_digit_code_candidates_fixed_order() {
        let candidates = input_candidates("Введите 10-значный код ТН ВЭД");
        assert_eq!(
            &candidates[..3],
            &["9027901000", "6109100000", "4202221000"]
        );
    }

    #[test]
    fn test_unmatched_prompt_gets_fallback() {
        let candidates = input_candidates("Расскажите о себе");
        assert_eq!(candidates, vec!["Тест".to_string(), "1".to_string()]);
    }

    #[test]
    fn test_classify_menu_when_buttons_present() {
        let extraction = ButtonExtraction {
            inline_count: 1,
            reply_count: 0,
            buttons: vec![vec![]],
        };
        assert_eq!(classify_screen("Что угодно", &extraction), ScreenType::Menu);
    }

    #[test]
    fn test_classify_input_required_by_marker() {
        let extraction = ButtonExtraction::default();
        assert_eq!(
            classify_screen("Введите код подтверждения", &extraction),
            ScreenType::InputRequired
        );
        assert_eq!(
            classify_screen("Ваш email:", &extraction),
            ScreenType::InputRequired
        );
    }

    #[test]
    fn test_classify_terminal_otherwise() {
        let extraction = ButtonExtraction::default();
        assert_eq!(
            classify_screen("Спасибо! Заявка принята.", &extraction),
            ScreenType::Terminal
        );
    }

    #[tokio::test]
    async fn test_policy_sends_first_candidate_for_input_screen() {
        let snapshot = UiSnapshot {
            screen_text: "Укажите ставку в %".to_string(),
            screen_type: ScreenType::InputRequired,
            input_required: true,
            ..Default::default()
        };
        let decision = HeuristicPolicy.decide(&snapshot).await.unwrap();
        assert_eq!(
            decision,
            Decision::SendText {
                value: "5".to_string()
            }
        );
    }
}
