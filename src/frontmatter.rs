//! Recipe file format: YAML frontmatter header plus a markdown body.
//!
//! The on-disk contract is fixed: a `---` fenced header with `title` and
//! `source_url` required, then a body containing exactly one
//! `## Ingredients` list followed by exactly one `## Instructions` list,
//! with an optional trailing `## Notes` section. [`render`] and [`parse`]
//! are exact inverses for every recipe produced by this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Recipe;

/// Structured header block. Field order here is the serialization order.
#[derive(Debug, Serialize, Deserialize)]
struct FrontMatter {
    title: String,
    source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    author: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prep_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cook_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    servings: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
}

/// Serialize a recipe into the file format.
pub fn render(recipe: &Recipe) -> Result<String, String> {
    let fm = FrontMatter {
        title: recipe.title.clone(),
        source_url: recipe.source_url.clone(),
        author: recipe.author.clone(),
        created_at: recipe.created_at,
        updated_at: recipe.updated_at,
        prep_time: recipe.prep_time,
        cook_time: recipe.cook_time,
        total_time: recipe.total_time,
        servings: recipe.servings.clone(),
        tags: recipe.tags.clone(),
    };
    let header =
        serde_yaml::to_string(&fm).map_err(|e| format!("serialize frontmatter: {e}"))?;

    let mut out = String::with_capacity(header.len() + 256);
    out.push_str("---\n");
    out.push_str(&header);
    out.push_str("---\n\n");

    out.push_str("# ");
    out.push_str(&recipe.title);
    out.push('\n');

    if let Some(desc) = non_empty(recipe.description.as_deref()) {
        out.push('\n');
        out.push_str(desc);
        out.push('\n');
    }

    out.push_str("\n## Ingredients\n\n");
    for item in &recipe.ingredients {
        out.push_str("- ");
        out.push_str(item);
        out.push('\n');
    }

    out.push_str("\n## Instructions\n\n");
    for (i, step) in recipe.instructions.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, step));
    }

    if let Some(notes) = non_empty(recipe.notes.as_deref()) {
        out.push_str("\n## Notes\n\n");
        out.push_str(notes);
        out.push('\n');
    }

    Ok(out)
}

/// Parse file content back into a recipe. The returned `slug` is empty;
/// the file store fills it in from the file basename.
pub fn parse(content: &str) -> Result<Recipe, String> {
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
        .ok_or_else(|| "missing frontmatter opening fence".to_string())?;

    let (header, body) = split_closing_fence(rest)?;

    let fm: FrontMatter =
        serde_yaml::from_str(header).map_err(|e| format!("invalid frontmatter: {e}"))?;
    if fm.title.trim().is_empty() {
        return Err("frontmatter field 'title' is empty".to_string());
    }
    if fm.source_url.trim().is_empty() {
        return Err("frontmatter field 'source_url' is empty".to_string());
    }

    let parts = parse_body(body)?;

    Ok(Recipe {
        slug: String::new(),
        title: fm.title,
        description: parts.description,
        author: fm.author,
        servings: fm.servings,
        source_url: fm.source_url,
        prep_time: fm.prep_time,
        cook_time: fm.cook_time,
        total_time: fm.total_time,
        tags: fm.tags,
        ingredients: parts.ingredients,
        instructions: parts.instructions,
        notes: parts.notes,
        created_at: fm.created_at,
        updated_at: fm.updated_at,
    })
}

fn split_closing_fence(rest: &str) -> Result<(&str, &str), String> {
    if let Some(pos) = rest.find("\n---\n") {
        Ok((&rest[..pos + 1], &rest[pos + 5..]))
    } else if let Some(header) = rest.strip_suffix("\n---") {
        Ok((header, ""))
    } else {
        Err("missing frontmatter closing fence".to_string())
    }
}

#[derive(Default)]
struct BodyParts {
    description: Option<String>,
    ingredients: Vec<String>,
    instructions: Vec<String>,
    notes: Option<String>,
}

enum Section {
    Preamble,
    Ingredients,
    Instructions,
    Notes,
}

fn parse_body(body: &str) -> Result<BodyParts, String> {
    let mut parts = BodyParts::default();
    let mut section = Section::Preamble;
    let mut seen_ingredients = false;
    let mut seen_instructions = false;
    let mut description = String::new();
    let mut notes = String::new();

    for raw in body.lines() {
        let line = raw.trim_end();

        if let Some(heading) = line.strip_prefix("## ") {
            match heading.trim() {
                "Ingredients" => {
                    if seen_ingredients {
                        return Err("duplicate Ingredients section".to_string());
                    }
                    if seen_instructions {
                        return Err("Ingredients section after Instructions".to_string());
                    }
                    seen_ingredients = true;
                    section = Section::Ingredients;
                }
                "Instructions" => {
                    if seen_instructions {
                        return Err("duplicate Instructions section".to_string());
                    }
                    if !seen_ingredients {
                        return Err("Instructions section before Ingredients".to_string());
                    }
                    seen_instructions = true;
                    section = Section::Instructions;
                }
                "Notes" => {
                    if !seen_instructions {
                        return Err("Notes section before Instructions".to_string());
                    }
                    section = Section::Notes;
                }
                other => return Err(format!("unexpected section: {other}")),
            }
            continue;
        }

        match section {
            Section::Preamble => {
                // The `# <title>` line is display-only; the header is canonical.
                if line.starts_with("# ") {
                    continue;
                }
                description.push_str(line);
                description.push('\n');
            }
            Section::Ingredients => {
                if line.is_empty() {
                    continue;
                }
                match line.strip_prefix("- ") {
                    Some(item) => parts.ingredients.push(item.trim().to_string()),
                    None => {
                        return Err(format!("Ingredients section is not a list: {line:?}"))
                    }
                }
            }
            Section::Instructions => {
                if line.is_empty() {
                    continue;
                }
                parts.instructions.push(strip_step_number(line).to_string());
            }
            Section::Notes => {
                notes.push_str(line);
                notes.push('\n');
            }
        }
    }

    if !seen_ingredients {
        return Err("missing Ingredients section".to_string());
    }
    if !seen_instructions {
        return Err("missing Instructions section".to_string());
    }

    parts.description = non_empty(Some(description.as_str())).map(str::to_string);
    parts.notes = non_empty(Some(notes.as_str())).map(str::to_string);
    Ok(parts)
}

/// Strip a leading `<digits>. ` step marker, if present.
fn strip_step_number(line: &str) -> &str {
    let trimmed = line.trim_start();
    if let Some(dot) = trimmed.find(". ") {
        if dot > 0 && trimmed[..dot].bytes().all(|b| b.is_ascii_digit()) {
            return trimmed[dot + 2..].trim_start();
        }
    }
    trimmed
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_recipe() -> Recipe {
        Recipe {
            slug: String::new(),
            title: "Chicken Curry (Pressure Cooker)".to_string(),
            description: Some("A weeknight curry that cooks in fifteen minutes.".to_string()),
            author: Some("Jane Tester".to_string()),
            servings: Some("4 servings".to_string()),
            source_url: "https://x.test/a".to_string(),
            prep_time: Some(10),
            cook_time: Some(15),
            total_time: Some(25),
            tags: vec!["curry".to_string(), "indian".to_string()],
            ingredients: vec![
                "2 chicken breasts".to_string(),
                "1 onion, diced".to_string(),
                "400ml coconut milk".to_string(),
            ],
            instructions: vec![
                "Brown the chicken.".to_string(),
                "Add onion and spices.".to_string(),
                "Pressure cook for 8 minutes.".to_string(),
            ],
            notes: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 3, 2, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_round_trip_lossless() {
        let recipe = sample_recipe();
        let text = render(&recipe).unwrap();
        let parsed = parse(&text).unwrap();

        assert_eq!(parsed.title, recipe.title);
        assert_eq!(parsed.description, recipe.description);
        assert_eq!(parsed.author, recipe.author);
        assert_eq!(parsed.servings, recipe.servings);
        assert_eq!(parsed.source_url, recipe.source_url);
        assert_eq!(parsed.prep_time, recipe.prep_time);
        assert_eq!(parsed.cook_time, recipe.cook_time);
        assert_eq!(parsed.total_time, recipe.total_time);
        assert_eq!(parsed.tags, recipe.tags);
        assert_eq!(parsed.ingredients, recipe.ingredients);
        assert_eq!(parsed.instructions, recipe.instructions);
        assert_eq!(parsed.created_at, recipe.created_at);
        assert_eq!(parsed.updated_at, recipe.updated_at);
    }

    #[test]
    fn test_round_trip_minimal_recipe() {
        let mut recipe = sample_recipe();
        recipe.description = None;
        recipe.author = None;
        recipe.servings = None;
        recipe.prep_time = None;
        recipe.cook_time = None;
        recipe.total_time = None;
        recipe.tags = vec![];
        recipe.ingredients = vec![];
        recipe.instructions = vec![];

        let text = render(&recipe).unwrap();
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed.description, None);
        assert_eq!(parsed.tags, Vec::<String>::new());
        assert!(parsed.ingredients.is_empty());
        assert!(parsed.instructions.is_empty());
    }

    #[test]
    fn test_round_trip_notes() {
        let mut recipe = sample_recipe();
        recipe.notes = Some("Freezes well for up to a month.".to_string());
        let text = render(&recipe).unwrap();
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed.notes, recipe.notes);
    }

    #[test]
    fn test_sections_rendered_in_order() {
        let text = render(&sample_recipe()).unwrap();
        assert!(text.starts_with("---\ntitle:"));
        let ing = text.find("## Ingredients").unwrap();
        let ins = text.find("## Instructions").unwrap();
        assert!(ing < ins);
        assert!(text.contains("- 2 chicken breasts"));
        assert!(text.contains("1. Brown the chicken."));
        assert!(text.contains("3. Pressure cook for 8 minutes."));
    }

    #[test]
    fn test_parse_missing_opening_fence() {
        assert!(parse("title: nope\n").is_err());
    }

    #[test]
    fn test_parse_missing_closing_fence() {
        assert!(parse("---\ntitle: nope\n").is_err());
    }

    #[test]
    fn test_parse_missing_required_fields() {
        let text = "---\ntitle: Soup\ncreated_at: 2024-01-01T00:00:00Z\nupdated_at: 2024-01-01T00:00:00Z\n---\n\n## Ingredients\n\n## Instructions\n";
        let err = parse(text).unwrap_err();
        assert!(err.contains("source_url"), "unexpected error: {err}");
    }

    #[test]
    fn test_parse_missing_body_sections() {
        let text = "---\ntitle: Soup\nsource_url: https://x.test/soup\ncreated_at: 2024-01-01T00:00:00Z\nupdated_at: 2024-01-01T00:00:00Z\n---\n\n# Soup\n";
        let err = parse(text).unwrap_err();
        assert!(err.contains("Ingredients"), "unexpected error: {err}");
    }

    #[test]
    fn test_parse_sections_out_of_order() {
        let text = "---\ntitle: Soup\nsource_url: https://x.test/soup\ncreated_at: 2024-01-01T00:00:00Z\nupdated_at: 2024-01-01T00:00:00Z\n---\n\n## Instructions\n\n1. Stir.\n\n## Ingredients\n\n- water\n";
        let err = parse(text).unwrap_err();
        assert!(err.contains("before Ingredients"), "unexpected error: {err}");
    }

    #[test]
    fn test_parse_duplicate_section() {
        let text = "---\ntitle: Soup\nsource_url: https://x.test/soup\ncreated_at: 2024-01-01T00:00:00Z\nupdated_at: 2024-01-01T00:00:00Z\n---\n\n## Ingredients\n\n- water\n\n## Ingredients\n\n- salt\n\n## Instructions\n\n1. Stir.\n";
        let err = parse(text).unwrap_err();
        assert!(err.contains("duplicate"), "unexpected error: {err}");
    }

    #[test]
    fn test_parse_accepts_unnumbered_instructions() {
        let text = "---\ntitle: Soup\nsource_url: https://x.test/soup\ncreated_at: 2024-01-01T00:00:00Z\nupdated_at: 2024-01-01T00:00:00Z\n---\n\n## Ingredients\n\n- water\n\n## Instructions\n\nBoil the water.\n2. Add salt.\n";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.instructions, vec!["Boil the water.", "Add salt."]);
    }

    #[test]
    fn test_parse_multi_paragraph_description() {
        let mut recipe = sample_recipe();
        recipe.description = Some("First paragraph.\n\nSecond paragraph.".to_string());
        let text = render(&recipe).unwrap();
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed.description, recipe.description);
    }
}
