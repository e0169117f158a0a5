use anyhow::anyhow;
use serde::Deserialize;

/// Load a list of token symbols from a JSON `["SYM", ...]` or TOML `tokens=[...]` file.
/// Accepts absolute or relative path.
pub fn load_token_list<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Vec<String>> {
    let text = std::fs::read_to_string(&path)
        .map_err(|e| anyhow!("unable to read token list {}: {}", path.as_ref().display(), e))?;
    parse_token_list(&text)
        .map_err(|e| anyhow!("token list {} {}", path.as_ref().display(), e))
}

/// Parse the contents of a token list file.
pub fn parse_token_list(text: &str) -> anyhow::Result<Vec<String>> {
    // 1. Try JSON array
    if let Ok(vec) = serde_json::from_str::<Vec<String>>(text) {
        return normalize_symbols(vec);
    }

    // 2. Try TOML with wrapper
    #[derive(Deserialize)]
    struct Wrapper { tokens: Vec<String> }
    let wrapper: Wrapper = toml::from_str(text)
        .map_err(|e| anyhow!("is not valid JSON nor TOML: {}", e))?;
    normalize_symbols(wrapper.tokens)
}

fn normalize_symbols(list: Vec<String>) -> anyhow::Result<Vec<String>> {
    list.into_iter()
        .map(|s| {
            let symbol = s.trim();
            if symbol.is_empty() {
                Err(anyhow!("empty token symbol"))
            } else {
                Ok(symbol.to_string())
            }
        })
        .collect()
}
