use crate::cli::AnalyzerMode;

const ENGLISH_STOP_WORDS: [&str; 33] = [
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

pub fn is_stop_word(token: &str) -> bool {
    ENGLISH_STOP_WORDS.contains(&token)
}

pub fn analyze(text: &str, mode: AnalyzerMode) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .filter(|token| !(mode.removes_stopwords() && is_stop_word(token)))
        .collect()
}

pub fn index_text(text: &str, mode: AnalyzerMode) -> String {
    if mode.removes_stopwords() {
        analyze(text, mode).join(" ")
    } else {
        text.to_string()
    }
}

pub fn fts_string(token: &str) -> String {
    format!("\"{}\"", token.replace('"', "\"\""))
}
