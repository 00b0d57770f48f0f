use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

// 英數字與日文（平假名、片假名、漢字、長音符號）的連續片段
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9ぁ-んァ-ン一-龥ー]+").unwrap());

/// 將文字切成小寫 token，去除重複並保留第一次出現的順序
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut seen = HashSet::new();
    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| seen.insert(*token))
        .map(str::to_string)
        .collect()
}
