//! Query language detection and query classification
//!
//! Detection scores every supported language as
//! `0.7 * script_ratio + 0.3 * common_word_ratio` and picks the highest, with
//! ties going to the language listed first in [`Language::ALL`]. Scores under
//! [`CONFIDENCE_THRESHOLD`] fall back to English.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Minimum score for a detection to be trusted
pub const CONFIDENCE_THRESHOLD: f64 = 0.3;

const SCRIPT_WEIGHT: f64 = 0.7;
const WORD_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Chinese,
    Japanese,
    Korean,
    English,
    Spanish,
    French,
    German,
    Russian,
}

impl Language {
    /// Every supported language, in tie-break order
    pub const ALL: [Language; 8] = [
        Language::Chinese,
        Language::Japanese,
        Language::Korean,
        Language::English,
        Language::Spanish,
        Language::French,
        Language::German,
        Language::Russian,
    ];

    /// Wire name, e.g. `chinese`
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Chinese => "chinese",
            Language::Japanese => "japanese",
            Language::Korean => "korean",
            Language::English => "english",
            Language::Spanish => "spanish",
            Language::French => "french",
            Language::German => "german",
            Language::Russian => "russian",
        }
    }

    /// ISO 639-1 code
    pub fn code(&self) -> &'static str {
        match self {
            Language::Chinese => "zh",
            Language::Japanese => "ja",
            Language::Korean => "ko",
            Language::English => "en",
            Language::Spanish => "es",
            Language::French => "fr",
            Language::German => "de",
            Language::Russian => "ru",
        }
    }

    /// Name of the language in itself
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Chinese => "中文",
            Language::Japanese => "日本語",
            Language::Korean => "한국어",
            Language::English => "English",
            Language::Spanish => "Español",
            Language::French => "Français",
            Language::German => "Deutsch",
            Language::Russian => "Русский",
        }
    }

    /// Accepts either the wire name or the ISO code, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Language::ALL
            .into_iter()
            .find(|l| l.as_str() == name || l.code() == name)
    }

    /// Inclusive code point ranges of the language's script (text is lowercased first)
    fn script_ranges(&self) -> &'static [(char, char)] {
        match self {
            Language::Chinese => &[
                ('\u{4e00}', '\u{9fff}'),
                ('\u{3400}', '\u{4dbf}'),
                ('\u{f900}', '\u{faff}'),
            ],
            Language::Japanese => &[
                ('\u{3040}', '\u{309f}'),
                ('\u{30a0}', '\u{30ff}'),
                ('\u{4e00}', '\u{9fff}'),
            ],
            Language::Korean => &[
                ('\u{ac00}', '\u{d7af}'),
                ('\u{1100}', '\u{11ff}'),
                ('\u{3130}', '\u{318f}'),
            ],
            Language::English => &[('a', 'z')],
            Language::Spanish => &[
                ('a', 'z'),
                ('á', 'á'),
                ('é', 'é'),
                ('í', 'í'),
                ('ó', 'ó'),
                ('ú', 'ú'),
                ('ü', 'ü'),
                ('ñ', 'ñ'),
            ],
            Language::French => &[
                ('a', 'z'),
                ('à', 'à'),
                ('â', 'â'),
                ('ä', 'ä'),
                ('ç', 'ë'),
                ('î', 'ï'),
                ('ô', 'ô'),
                ('ö', 'ö'),
                ('ù', 'ù'),
                ('û', 'ü'),
                ('ÿ', 'ÿ'),
            ],
            Language::German => &[('a', 'z'), ('ä', 'ä'), ('ö', 'ö'), ('ü', 'ü'), ('ß', 'ß')],
            Language::Russian => &[('а', 'я'), ('ё', 'ё')],
        }
    }

    fn common_words(&self) -> &'static [&'static str] {
        match self {
            Language::Chinese => &[
                "的", "是", "在", "有", "和", "了", "不", "我", "你", "他", "她", "它", "这", "那",
                "什么", "怎么", "为什么",
            ],
            Language::Japanese => &[
                "の", "に", "は", "を", "が", "で", "と", "から", "まで", "です", "である", "した",
                "する",
            ],
            Language::Korean => &[
                "이", "가", "을", "를", "에", "에서", "와", "과", "의", "는", "은", "도", "만", "까지",
            ],
            Language::English => &[
                "the", "be", "to", "of", "and", "a", "in", "that", "have", "i", "it", "for", "not",
                "on", "with", "he", "as", "you", "do", "at",
            ],
            Language::Spanish => &[
                "el", "la", "de", "que", "y", "a", "en", "un", "es", "se", "no", "te", "lo", "le",
                "da", "su", "por", "son", "con", "para",
            ],
            Language::French => &[
                "le", "de", "et", "à", "un", "il", "être", "en", "avoir", "que", "pour", "dans",
                "ce", "son", "une", "sur", "avec", "ne", "se",
            ],
            Language::German => &[
                "der", "die", "und", "in", "den", "von", "zu", "das", "mit", "sich", "des", "auf",
                "für", "ist", "im", "dem", "nicht", "ein", "eine", "als",
            ],
            Language::Russian => &[
                "в", "и", "не", "на", "я", "быть", "тот", "он", "оно", "она", "они", "с", "а",
                "как", "это", "по", "но", "мы", "этот",
            ],
        }
    }

    /// Detection score for already-lowercased text
    fn score(&self, text: &str, words: &[&str]) -> f64 {
        let total_chars = text.chars().count();
        if total_chars == 0 {
            return 0.0;
        }

        let ranges = self.script_ranges();
        let script_chars = text
            .chars()
            .filter(|c| ranges.iter().any(|&(lo, hi)| lo <= *c && *c <= hi))
            .count();
        let script_ratio = script_chars as f64 / total_chars as f64;

        let word_ratio = if words.is_empty() {
            0.0
        } else {
            let common = self.common_words();
            let hits = words.iter().filter(|w| common.contains(w)).count();
            hits as f64 / words.len() as f64
        };

        (SCRIPT_WEIGHT * script_ratio + WORD_WEIGHT * word_ratio).min(1.0)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the language of a query. Pure, deterministic and infallible.
pub fn detect(query: &str) -> Language {
    detect_with_score(query).0
}

/// Detected language together with its winning score
pub fn detect_with_score(query: &str) -> (Language, f64) {
    let text = query.trim().to_lowercase();
    if text.is_empty() {
        return (Language::English, 0.0);
    }

    let words: Vec<&str> = text
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .collect();

    let mut best = (Language::English, f64::MIN);
    for language in Language::ALL {
        let score = language.score(&text, &words);
        // Strictly greater keeps the earlier language on ties
        if score > best.1 {
            best = (language, score);
        }
    }

    if best.1 < CONFIDENCE_THRESHOLD {
        (Language::English, best.1)
    } else {
        best
    }
}

/// Configured language policy: detect per query, or always use one language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageSetting {
    Auto,
    Fixed(Language),
}

impl LanguageSetting {
    /// Parse `auto` or a language name/code
    pub fn parse(value: &str) -> Option<Self> {
        if value.trim().eq_ignore_ascii_case("auto") {
            Some(LanguageSetting::Auto)
        } else {
            Language::from_name(value).map(LanguageSetting::Fixed)
        }
    }
}

/// Resolves the language a research session runs in
#[derive(Debug, Clone, Copy)]
pub struct LanguageResolver {
    setting: LanguageSetting,
}

impl LanguageResolver {
    pub fn new(setting: LanguageSetting) -> Self {
        Self { setting }
    }

    pub fn auto() -> Self {
        Self::new(LanguageSetting::Auto)
    }

    pub fn fixed(language: Language) -> Self {
        Self::new(LanguageSetting::Fixed(language))
    }

    pub fn is_auto(&self) -> bool {
        self.setting == LanguageSetting::Auto
    }

    pub fn resolve(&self, query: &str) -> Language {
        match self.setting {
            LanguageSetting::Auto => detect(query),
            LanguageSetting::Fixed(language) => language,
        }
    }
}

impl Default for LanguageResolver {
    fn default() -> Self {
        Self::auto()
    }
}

// ============= Query classification =============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    HowTo,
    Definition,
    Causal,
    GeneralQuestion,
    Trend,
    Comparative,
    Market,
    GeneralTopic,
}

impl QueryType {
    pub fn label(&self) -> &'static str {
        match self {
            QueryType::HowTo => "How-to / Process Inquiry",
            QueryType::Definition => "Definition / Concept Research",
            QueryType::Causal => "Causal Analysis",
            QueryType::GeneralQuestion => "General Question",
            QueryType::Trend => "Trend Analysis",
            QueryType::Comparative => "Comparative Analysis",
            QueryType::Market => "Market/Business Research",
            QueryType::GeneralTopic => "General Topic Research",
        }
    }

    pub fn focus(&self) -> Option<&'static str> {
        match self {
            QueryType::HowTo => Some("Step-by-step guides, tutorials, best practices"),
            QueryType::Definition => {
                Some("Authoritative definitions, academic sources, official documentation")
            }
            QueryType::Trend => Some("Recent publications, market reports, industry analyses"),
            QueryType::Comparative => {
                Some("Side-by-side comparisons, feature matrices, expert reviews")
            }
            QueryType::Market => Some("Market research, financial reports, industry statistics"),
            QueryType::Causal | QueryType::GeneralQuestion | QueryType::GeneralTopic => None,
        }
    }
}

const QUESTION_WORDS: &[&str] = &[
    "what", "how", "why", "when", "where", "who", "which", "什么", "如何", "怎么", "为什么",
    "哪里", "谁", "哪个", "なに", "どう", "なぜ", "いつ", "どこ", "だれ", "どの", "무엇",
    "어떻게", "왜", "언제", "어디", "누구", "어느",
];
const HOW_WORDS: &[&str] = &["how", "如何", "怎么", "どう", "어떻게"];
const WHAT_WORDS: &[&str] = &["what", "什么", "なに", "무엇"];
const WHY_WORDS: &[&str] = &["why", "为什么", "なぜ", "왜"];
const TREND_WORDS: &[&str] = &[
    "trend", "trends", "development", "future", "latest", "recent", "趋势", "发展", "未来", "最新",
    "最近", "トレンド", "発展", "트렌드", "발전", "미래", "최신", "최근",
];
const COMPARE_WORDS: &[&str] = &[
    "compare", "vs", "versus", "difference", "比较", "对比", "区别", "比較", "対比", "違い",
    "비교", "대비", "차이",
];
const MARKET_WORDS: &[&str] = &[
    "market", "industry", "business", "company", "市场", "行业", "商业", "公司", "市場", "業界",
    "ビジネス", "会社", "시장", "업계", "비즈니스", "회사",
];

/// ASCII keywords must match a whole word; other scripts match anywhere
fn mentions_any(lowered: &str, words: &[&str], keywords: &[&str]) -> bool {
    keywords.iter().any(|k| {
        if k.is_ascii() {
            words.contains(k)
        } else {
            lowered.contains(k)
        }
    })
}

/// Classify what kind of research a query asks for
pub fn classify_query(query: &str) -> QueryType {
    let lowered = query.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has = |keywords: &[&str]| mentions_any(&lowered, &words, keywords);

    if has(QUESTION_WORDS) {
        if has(HOW_WORDS) {
            QueryType::HowTo
        } else if has(WHAT_WORDS) {
            QueryType::Definition
        } else if has(WHY_WORDS) {
            QueryType::Causal
        } else {
            QueryType::GeneralQuestion
        }
    } else if has(TREND_WORDS) {
        QueryType::Trend
    } else if has(COMPARE_WORDS) {
        QueryType::Comparative
    } else if has(MARKET_WORDS) {
        QueryType::Market
    } else {
        QueryType::GeneralTopic
    }
}

/// Markdown blurb describing how a query will be researched
pub fn search_strategy(query_type: QueryType, language: Language, engines: &[&str]) -> String {
    let engines = if engines.is_empty() {
        "none configured".to_string()
    } else {
        engines.join(", ")
    };

    let mut strategy = format!(
        "**Primary Approach**: Multi-source information gathering\n\
         **Language Focus**: {} sources with English supplements\n\
         **Search Engines**: {}\n\
         **Source Types**: Academic papers, news articles, official documents, expert blogs",
        language.display_name(),
        engines
    );

    if let Some(focus) = query_type.focus() {
        strategy.push_str(&format!("\n**Specialized Focus**: {}", focus));
    }

    let regional = match language {
        Language::Chinese => Some("百度, 知乎, 学术搜索, 官方网站"),
        Language::Japanese => Some("Yahoo Japan, Goo, J-STAGE, 政府サイト"),
        Language::Korean => Some("Naver, Daum, KISS, 정부사이트"),
        _ => None,
    };
    if let Some(regional) = regional {
        strategy.push_str(&format!("\n**Regional Sources**: {}", regional));
    }

    strategy
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("What are the latest developments in quantum computing?", Language::English)]
    #[case("量子计算的最新发展是什么", Language::Chinese)]
    #[case("量子コンピュータの最新の発展はなんですか", Language::Japanese)]
    #[case("양자 컴퓨팅의 최신 발전은 무엇입니까", Language::Korean)]
    #[case("последние достижения в области квантовых вычислений", Language::Russian)]
    #[case("¿cuáles son los avances de la computación cuántica para el futuro?", Language::Spanish)]
    #[case("die Entwicklung der Quantencomputer ist nicht abgeschlossen und das ist gut", Language::German)]
    fn test_detect(#[case] query: &str, #[case] expected: Language) {
        assert_eq!(detect(query), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("12345 !!! ???")]
    fn test_low_confidence_falls_back_to_english(#[case] query: &str) {
        assert_eq!(detect(query), Language::English);
    }

    #[test]
    fn test_detect_is_deterministic() {
        let query = "Rust async runtimes compared";
        assert_eq!(detect_with_score(query), detect_with_score(query));
    }

    #[test]
    fn test_plain_latin_tie_goes_to_english() {
        // No common words from any list: every Latin-script language scores the same
        assert_eq!(detect("rust tokio axum"), Language::English);
    }

    #[test]
    fn test_resolver_fixed_ignores_query() {
        let resolver = LanguageResolver::fixed(Language::German);
        assert_eq!(resolver.resolve("量子计算"), Language::German);
        assert!(!resolver.is_auto());
        assert_eq!(LanguageResolver::auto().resolve("量子计算"), Language::Chinese);
    }

    #[rstest]
    #[case("auto", Some(LanguageSetting::Auto))]
    #[case("zh", Some(LanguageSetting::Fixed(Language::Chinese)))]
    #[case("French", Some(LanguageSetting::Fixed(Language::French)))]
    #[case("klingon", None)]
    fn test_language_setting_parse(#[case] value: &str, #[case] expected: Option<LanguageSetting>) {
        assert_eq!(LanguageSetting::parse(value), expected);
    }

    #[rstest]
    #[case("How do I tune tokio for throughput?", QueryType::HowTo)]
    #[case("What is a borrow checker", QueryType::Definition)]
    #[case("Why did the dot-com bubble burst", QueryType::Causal)]
    #[case("Where is CERN", QueryType::GeneralQuestion)]
    #[case("latest battery chemistry", QueryType::Trend)]
    #[case("PostgreSQL vs MySQL", QueryType::Comparative)]
    #[case("EV market in Europe", QueryType::Market)]
    #[case("Photosynthesis", QueryType::GeneralTopic)]
    #[case("如何学习Rust", QueryType::HowTo)]
    #[case("Slideshow design principles", QueryType::GeneralTopic)]
    fn test_classify_query(#[case] query: &str, #[case] expected: QueryType) {
        assert_eq!(classify_query(query), expected);
    }

    #[test]
    fn test_search_strategy_mentions_focus_and_region() {
        let strategy = search_strategy(QueryType::Trend, Language::Chinese, &["tavily", "wikipedia"]);
        assert!(strategy.contains("tavily, wikipedia"));
        assert!(strategy.contains("Recent publications"));
        assert!(strategy.contains("知乎"));
    }
}
