//! Recipe extraction from source pages.
//!
//! The rest of the crate depends only on the [`RecipeExtractor`] trait:
//! call with a URL, get back a normalized field set or a typed failure.
//! Failures are never retried here; retry policy belongs to the caller.
//!
//! [`HttpExtractor`] is the default implementation. It fetches the page
//! with a bounded timeout and reads the schema.org `Recipe` object out of
//! `application/ld+json` script blocks, which is where virtually every
//! recipe site publishes its structured data. Loosely-typed fields
//! (string-or-array authors, object-or-string instructions, ISO-8601
//! durations) are validated and normalized once at this boundary before
//! anything reaches the file store.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ExtractConfig;
use crate::error::ExtractError;

/// Maximum tag length after normalization.
const MAX_TAG_LEN: usize = 50;
/// Maximum number of tags kept per recipe.
const MAX_TAGS: usize = 20;

/// Normalized extraction result, validated at this boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedRecipe {
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub servings: Option<String>,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub total_time: Option<i64>,
    pub tags: Vec<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
}

#[async_trait]
pub trait RecipeExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<ExtractedRecipe, ExtractError>;
}

pub struct HttpExtractor {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpExtractor {
    pub fn new(config: &ExtractConfig) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ExtractError::Network(e.to_string()))?;
        Ok(Self {
            client,
            timeout_secs: config.timeout_secs,
        })
    }

    fn classify(&self, err: reqwest::Error) -> ExtractError {
        if err.is_timeout() {
            ExtractError::Timeout {
                seconds: self.timeout_secs,
            }
        } else {
            ExtractError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl RecipeExtractor for HttpExtractor {
    async fn extract(&self, url: &str) -> Result<ExtractedRecipe, ExtractError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| ExtractError::Network(format!("invalid URL '{url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(ExtractError::Network(format!("invalid URL '{url}'")));
        }
        let domain = parsed.host_str().unwrap_or("unknown").to_string();

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Network(format!("HTTP {status} from {url}")));
        }
        let html = response.text().await.map_err(|e| self.classify(e))?;
        debug!(url, bytes = html.len(), "fetched page");

        let recipe = extract_from_html(&html)
            .ok_or(ExtractError::UnsupportedSite { domain })??;
        Ok(recipe)
    }
}

/// Locate a schema.org Recipe in the page and map it. Returns `None` when
/// no recipe markup exists at all, `Some(Err(..))` when markup exists but
/// is unusable.
pub fn extract_from_html(html: &str) -> Option<Result<ExtractedRecipe, ExtractError>> {
    for block in ld_json_blocks(html) {
        let value: Value = match serde_json::from_str(block.trim()) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "skipping unparseable ld+json block");
                continue;
            }
        };
        if let Some(recipe) = find_recipe(&value) {
            return Some(map_recipe(recipe));
        }
    }
    None
}

/// Collect the contents of every `<script type="application/ld+json">` tag.
fn ld_json_blocks(html: &str) -> Vec<&str> {
    // ASCII-lowercased copy preserves byte offsets into the original.
    let lower = html.to_ascii_lowercase();
    let mut blocks = Vec::new();
    let mut cursor = 0usize;

    while let Some(rel) = lower[cursor..].find("<script") {
        let tag_start = cursor + rel;
        let Some(tag_end_rel) = lower[tag_start..].find('>') else {
            break;
        };
        let tag_end = tag_start + tag_end_rel;
        let Some(close_rel) = lower[tag_end + 1..].find("</script") else {
            break;
        };
        let close = tag_end + 1 + close_rel;

        if lower[tag_start..tag_end].contains("application/ld+json") {
            blocks.push(&html[tag_end + 1..close]);
        }
        cursor = close + 1;
    }

    blocks
}

fn is_recipe_type(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(s)) => s.eq_ignore_ascii_case("recipe"),
        Some(Value::Array(items)) => items
            .iter()
            .any(|i| i.as_str().is_some_and(|s| s.eq_ignore_ascii_case("recipe"))),
        _ => false,
    }
}

/// Walk a JSON-LD document looking for a Recipe object: top level, inside
/// an array, or inside an `@graph`.
fn find_recipe(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) => {
            if is_recipe_type(value) {
                Some(value)
            } else {
                map.get("@graph").and_then(find_recipe)
            }
        }
        Value::Array(items) => items.iter().find_map(find_recipe),
        _ => None,
    }
}

fn map_recipe(value: &Value) -> Result<ExtractedRecipe, ExtractError> {
    let title = string_field(value, "name")
        .ok_or_else(|| ExtractError::Parse("recipe has no name".to_string()))?;

    let ingredients = string_list(value.get("recipeIngredient"))
        .or_else(|| string_list(value.get("ingredients")))
        .unwrap_or_default();
    if ingredients.is_empty() {
        warn!(title = %title, "recipe has no ingredients");
    }

    let instructions = value
        .get("recipeInstructions")
        .map(instruction_steps)
        .unwrap_or_default();
    if instructions.is_empty() {
        warn!(title = %title, "recipe has no instructions");
    }

    let mut raw_tags: Vec<String> = Vec::new();
    match value.get("keywords") {
        Some(Value::String(s)) => {
            raw_tags.extend(s.split(',').map(|k| k.trim().to_string()));
        }
        Some(other) => {
            if let Some(list) = string_list(Some(other)) {
                raw_tags.extend(list);
            }
        }
        None => {}
    }
    for field in ["recipeCategory", "recipeCuisine"] {
        match value.get(field) {
            Some(Value::String(s)) => raw_tags.push(s.clone()),
            Some(other) => {
                if let Some(list) = string_list(Some(other)) {
                    raw_tags.extend(list);
                }
            }
            None => {}
        }
    }

    Ok(ExtractedRecipe {
        title,
        description: string_field(value, "description"),
        author: author_name(value.get("author")),
        servings: yield_text(value.get("recipeYield")),
        prep_time: duration_field(value, "prepTime"),
        cook_time: duration_field(value, "cookTime"),
        total_time: duration_field(value, "totalTime"),
        tags: normalize_tags(raw_tags),
        ingredients,
        instructions,
    })
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// Flatten `recipeInstructions`: a plain string, a list of strings, a list
/// of HowToStep objects, or HowToSections nesting more steps.
fn instruction_steps(value: &Value) -> Vec<String> {
    let mut steps = Vec::new();
    collect_steps(value, &mut steps);
    steps
}

fn collect_steps(value: &Value, steps: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            steps.extend(
                s.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string),
            );
        }
        Value::Array(items) => {
            for item in items {
                collect_steps(item, steps);
            }
        }
        Value::Object(map) => {
            if let Some(text) = map.get("text").and_then(Value::as_str) {
                let text = text.trim();
                if !text.is_empty() {
                    steps.push(text.to_string());
                }
            } else if let Some(nested) = map.get("itemListElement") {
                collect_steps(nested, steps);
            }
        }
        _ => {}
    }
}

fn author_name(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Object(map) => map
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        Value::Array(items) => items.iter().find_map(|i| author_name(Some(i))),
        _ => None,
    }
}

fn yield_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.iter().find_map(|i| yield_text(Some(i))),
        _ => None,
    }
}

fn duration_field(value: &Value, key: &str) -> Option<i64> {
    value
        .get(key)
        .and_then(Value::as_str)
        .and_then(parse_minutes)
}

/// Parse a duration into whole minutes.
///
/// Accepts ISO-8601 durations (`PT1H30M`, `P1DT2H`) and, as a fallback,
/// human text like `"1 hour 30 minutes"` or `"45 min"`.
pub fn parse_minutes(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let minutes = if text.starts_with('P') || text.starts_with('p') {
        parse_iso_duration(text)?
    } else {
        parse_human_duration(text)?
    };
    (minutes > 0).then_some(minutes)
}

fn parse_iso_duration(text: &str) -> Option<i64> {
    let upper = text.to_ascii_uppercase();
    let rest = upper.strip_prefix('P')?;
    let mut minutes: i64 = 0;
    let mut in_time = false;
    let mut digits = String::new();

    for ch in rest.chars() {
        match ch {
            'T' => in_time = true,
            '0'..='9' => digits.push(ch),
            '.' | ',' => digits.push('.'),
            unit => {
                let amount: f64 = digits.parse().ok()?;
                digits.clear();
                minutes += match (unit, in_time) {
                    ('W', false) => (amount * 7.0 * 24.0 * 60.0) as i64,
                    ('D', false) => (amount * 24.0 * 60.0) as i64,
                    ('H', true) => (amount * 60.0) as i64,
                    ('M', true) => amount as i64,
                    ('S', true) => (amount / 60.0) as i64,
                    // Calendar years/months (and misplaced units) are not
                    // meaningful cooking times.
                    _ => return None,
                };
            }
        }
    }
    if !digits.is_empty() {
        return None;
    }
    Some(minutes)
}

fn parse_human_duration(text: &str) -> Option<i64> {
    let lower = text.to_lowercase();
    let mut minutes: i64 = 0;
    let mut found = false;
    let mut pending: Option<i64> = None;

    for token in lower.split(|c: char| !c.is_ascii_alphanumeric()) {
        if token.is_empty() {
            continue;
        }
        if token.chars().all(|c| c.is_ascii_digit()) {
            pending = token.parse().ok();
            continue;
        }
        // Tokens like "30min" carry the digits inline.
        let (num_part, unit_part) = split_leading_digits(token);
        let amount = if num_part.is_empty() {
            pending.take()
        } else {
            num_part.parse().ok()
        };
        let Some(amount) = amount else { continue };
        let added = match unit_part {
            u if u.starts_with("hour") || u == "hr" || u == "hrs" || u == "h" => {
                Some(amount * 60)
            }
            u if u.starts_with("min") || u == "m" => Some(amount),
            _ => None,
        };
        if let Some(add) = added {
            minutes += add;
            found = true;
        }
    }
    found.then_some(minutes)
}

fn split_leading_digits(token: &str) -> (&str, &str) {
    let split = token
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    (&token[..split], &token[split..])
}

/// Normalize raw tag strings: trimmed, lowercased, punctuation dropped,
/// spaces hyphenated, length-bounded, deduplicated in display order.
pub fn normalize_tags(raw: Vec<String>) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw {
        let mut cleaned = String::with_capacity(tag.len());
        for ch in tag.trim().to_lowercase().chars() {
            if ch.is_alphanumeric() || ch == '-' || ch == '_' {
                cleaned.push(ch);
            } else if ch == ' ' {
                cleaned.push('-');
            }
        }
        let cleaned = cleaned.trim_matches('-').to_string();
        if cleaned.is_empty() || cleaned.len() > MAX_TAG_LEN {
            continue;
        }
        if !tags.contains(&cleaned) {
            tags.push(cleaned);
        }
        if tags.len() == MAX_TAGS {
            break;
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head>
<script type="application/ld+json">
{"@context":"https://schema.org","@graph":[
  {"@type":"WebSite","name":"Example Cooking"},
  {"@type":"Recipe",
   "name":"Chicken Curry (Pressure Cooker)",
   "description":"A weeknight curry.",
   "author":{"@type":"Person","name":"Jane Tester"},
   "recipeIngredient":["2 chicken breasts","1 onion"],
   "recipeInstructions":[
     {"@type":"HowToStep","text":"Brown the chicken."},
     {"@type":"HowToStep","text":"Pressure cook for 8 minutes."}],
   "prepTime":"PT10M","cookTime":"PT15M","totalTime":"PT25M",
   "recipeYield":"4 servings",
   "recipeCategory":"Main Course",
   "keywords":"curry, Indian, pressure cooker"}
]}
</script>
</head><body></body></html>"#;

    #[test]
    fn test_extract_from_graph_page() {
        let recipe = extract_from_html(PAGE).unwrap().unwrap();
        assert_eq!(recipe.title, "Chicken Curry (Pressure Cooker)");
        assert_eq!(recipe.author.as_deref(), Some("Jane Tester"));
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(
            recipe.instructions,
            vec!["Brown the chicken.", "Pressure cook for 8 minutes."]
        );
        assert_eq!(recipe.prep_time, Some(10));
        assert_eq!(recipe.cook_time, Some(15));
        assert_eq!(recipe.total_time, Some(25));
        assert_eq!(recipe.servings.as_deref(), Some("4 servings"));
        assert_eq!(
            recipe.tags,
            vec!["curry", "indian", "pressure-cooker", "main-course"]
        );
    }

    #[test]
    fn test_extract_no_recipe_markup() {
        let html = r#"<html><script type="application/ld+json">{"@type":"WebSite"}</script></html>"#;
        assert!(extract_from_html(html).is_none());
        assert!(extract_from_html("<html><body>plain page</body></html>").is_none());
    }

    #[test]
    fn test_extract_recipe_without_name_is_parse_error() {
        let html = r#"<script type="application/ld+json">{"@type":"Recipe","recipeIngredient":["x"]}</script>"#;
        let result = extract_from_html(html).unwrap();
        assert!(matches!(result, Err(ExtractError::Parse(_))));
    }

    #[test]
    fn test_extract_string_instructions() {
        let html = r#"<script type="application/ld+json">
{"@type":"Recipe","name":"Toast","recipeIngredient":["bread"],
 "recipeInstructions":"Toast the bread.\nButter it."}
</script>"#;
        let recipe = extract_from_html(html).unwrap().unwrap();
        assert_eq!(recipe.instructions, vec!["Toast the bread.", "Butter it."]);
    }

    #[test]
    fn test_extract_type_array_and_numeric_yield() {
        let html = r#"<script type="APPLICATION/LD+JSON">
{"@type":["Recipe","NewsArticle"],"name":"Stew","recipeYield":6}
</script>"#;
        let recipe = extract_from_html(html).unwrap().unwrap();
        assert_eq!(recipe.title, "Stew");
        assert_eq!(recipe.servings.as_deref(), Some("6"));
    }

    #[test]
    fn test_parse_minutes_iso() {
        assert_eq!(parse_minutes("PT30M"), Some(30));
        assert_eq!(parse_minutes("PT1H30M"), Some(90));
        assert_eq!(parse_minutes("PT2H"), Some(120));
        assert_eq!(parse_minutes("P1DT2H"), Some(1560));
        assert_eq!(parse_minutes("pt45m"), Some(45));
        assert_eq!(parse_minutes("PT0M"), None);
        assert_eq!(parse_minutes("PTXM"), None);
    }

    #[test]
    fn test_parse_minutes_human_text() {
        assert_eq!(parse_minutes("1 hour 30 minutes"), Some(90));
        assert_eq!(parse_minutes("45 minutes"), Some(45));
        assert_eq!(parse_minutes("2 hours"), Some(120));
        assert_eq!(parse_minutes("30min"), Some(30));
        assert_eq!(parse_minutes("soon"), None);
        assert_eq!(parse_minutes(""), None);
    }

    #[test]
    fn test_normalize_tags() {
        let tags = normalize_tags(vec![
            "  Curry ".to_string(),
            "Pressure Cooker!".to_string(),
            "curry".to_string(),
            "".to_string(),
            "x".repeat(60),
        ]);
        assert_eq!(tags, vec!["curry", "pressure-cooker"]);
    }

    #[test]
    fn test_normalize_tags_caps_count() {
        let raw: Vec<String> = (0..30).map(|i| format!("tag {i}")).collect();
        assert_eq!(normalize_tags(raw).len(), 20);
    }

    #[test]
    fn test_ld_json_blocks_handles_multiple_scripts() {
        let html = r#"<script src="app.js"></script>
<script type="application/ld+json">{"a":1}</script>
<script type="application/ld+json">{"b":2}</script>"#;
        let blocks = ld_json_blocks(html);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("\"a\""));
        assert!(blocks[1].contains("\"b\""));
    }
}
