//! Topic decomposition into ordered learning units.
//!
//! [`UnitDecomposer`] asks the notebook's query service to split a topic into
//! a numbered list of units and parses the free-form reply. The requested
//! count is only a hint: whatever the service returns is kept, in the order
//! it was returned, as the learning order.

use std::ops::RangeInclusive;

use tracing::{debug, info, warn};

use crate::error::CurriculaError;
use crate::service::QueryService;
use crate::state_machine::Unit;

/// Target unit count for a notebook with `source_count` sources.
pub fn target_unit_range(source_count: usize) -> RangeInclusive<usize> {
    match source_count {
        0..=4 => 3..=4,
        5..=9 => 4..=5,
        _ => 5..=7,
    }
}

/// The prompt sent to the query service. Deterministic for a given input.
pub fn decomposition_prompt(topic: &str, range: &RangeInclusive<usize>) -> String {
    format!(
        "Break the topic \"{topic}\" into between {min} and {max} learning units \
         that together cover what the sources in this notebook say about it.\n\
         \n\
         Rules:\n\
         - Order the units from foundational to advanced; each unit may build on the ones before it\n\
         - Each unit must be self-contained enough to be studied on its own\n\
         - Give each unit a short title and a one-sentence description\n\
         \n\
         Respond with ONLY a numbered list, one unit per line, in this form:\n\
         1. <short title> - <one-sentence description>",
        min = range.start(),
        max = range.end(),
    )
}

/// Turns a topic into an ordered sequence of [`Unit`]s.
pub struct UnitDecomposer<'a, Q> {
    query: &'a Q,
}

impl<'a, Q: QueryService> UnitDecomposer<'a, Q> {
    pub fn new(query: &'a Q) -> Self {
        Self { query }
    }

    pub async fn decompose(
        &self,
        target_id: &str,
        topic: &str,
        source_count: usize,
    ) -> Result<Vec<Unit>, CurriculaError> {
        let range = target_unit_range(source_count);
        info!(topic, source_count, min = range.start(), max = range.end(), "Decomposing topic");

        let prompt = decomposition_prompt(topic, &range);
        let reply = self
            .query
            .query(target_id, &prompt)
            .await
            .map_err(|e| CurriculaError::DecompositionFailed(format!("query failed: {e}")))?;

        let units = parse_units(&reply);
        if units.is_empty() {
            return Err(CurriculaError::DecompositionFailed(
                "reply contained no parseable numbered units".into(),
            ));
        }
        if !range.contains(&units.len()) {
            warn!(
                returned = units.len(),
                min = range.start(),
                max = range.end(),
                "Query service returned a unit count outside the requested range; keeping it"
            );
        }

        info!(count = units.len(), "Decomposition complete");
        Ok(units)
    }
}

/// Extracts units from a numbered list. Lines that do not parse are skipped;
/// list position, not the printed number, becomes the unit index.
pub fn parse_units(text: &str) -> Vec<Unit> {
    text.lines()
        .filter_map(parse_unit_line)
        .enumerate()
        .map(|(index, (_, title, description))| Unit {
            index,
            title,
            description,
        })
        .collect()
}

/// Words that may precede the number, as in "Unit 2: ..." or "Step 2. ...".
const ORDINAL_PREFIXES: [&str; 5] = ["unit", "step", "part", "module", "lesson"];

/// Parses "3. Title - description" and its common variants: `)` or `:`
/// after the number, em/en dashes or a colon as separator, markdown bold
/// around the title, an optional leading bullet or heading marker, and a
/// `Unit N` style prefix. Outline sub-items such as `1.2 ...` are not units.
fn parse_unit_line(line: &str) -> Option<(usize, String, String)> {
    let trimmed = line
        .trim()
        .trim_start_matches(['#', '-', '*', '>'])
        .trim_start();
    let (prefixed, trimmed) = match strip_ordinal_prefix(trimmed) {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let digits_end = trimmed.find(|c: char| !c.is_ascii_digit())?;
    if digits_end == 0 {
        return None;
    }
    let number = trimmed[..digits_end].parse::<usize>().ok()?;

    let rest = &trimmed[digits_end..];
    let rest = match rest.strip_prefix(['.', ')', ':']) {
        Some(after) => after,
        None if prefixed => {
            let after = rest.trim_start_matches('*').trim_start();
            after
                .strip_prefix(['-', '\u{2014}', '\u{2013}'])
                .unwrap_or(after)
        }
        None => return None,
    };
    if rest.starts_with(|c: char| c.is_ascii_digit()) {
        debug!(line, "Skipping outline sub-item");
        return None;
    }

    let rest = rest.replace("**", "").replace("__", "");
    let rest = rest.trim();
    if rest.is_empty() {
        debug!(line, "Skipping numbered line without a title");
        return None;
    }

    let (title, description) = split_title(rest);
    let title = title.trim().trim_end_matches([':', '.']).trim().to_string();
    if title.is_empty() {
        return None;
    }
    Some((number, title, description.trim().to_string()))
}

/// Strips a case-insensitive `Unit `/`Step `... word when a number follows it.
fn strip_ordinal_prefix(text: &str) -> Option<&str> {
    let word_end = text.find(char::is_whitespace)?;
    let word = &text[..word_end];
    if !ORDINAL_PREFIXES.iter().any(|p| word.eq_ignore_ascii_case(p)) {
        return None;
    }
    let rest = text[word_end..].trim_start();
    rest.starts_with(|c: char| c.is_ascii_digit()).then_some(rest)
}

fn split_title(text: &str) -> (&str, &str) {
    const SEPARATORS: [&str; 4] = [" - ", " \u{2014} ", " \u{2013} ", ": "];

    SEPARATORS
        .iter()
        .filter_map(|sep| text.find(sep).map(|pos| (pos, sep.len())))
        .min_by_key(|&(pos, _)| pos)
        .map(|(pos, len)| (&text[..pos], &text[pos + len..]))
        .unwrap_or((text, ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedQuery;

    #[test]
    fn target_range_is_a_step_function_of_sources() {
        for sources in 0..5 {
            assert_eq!(target_unit_range(sources), 3..=4);
        }
        for sources in 5..10 {
            assert_eq!(target_unit_range(sources), 4..=5);
        }
        for sources in [10, 11, 50, 1000] {
            assert_eq!(target_unit_range(sources), 5..=7);
        }
    }

    #[test]
    fn prompt_embeds_topic_and_range() {
        let prompt = decomposition_prompt("Rust ownership", &target_unit_range(7));
        assert!(prompt.contains("\"Rust ownership\""));
        assert!(prompt.contains("between 4 and 5"));
        assert!(prompt.contains("foundational to advanced"));
        assert_eq!(prompt, decomposition_prompt("Rust ownership", &(4..=5)));
    }

    #[test]
    fn parses_common_list_formats() {
        let reply = "\
Here is a plan:

1. Variables - How values are bound to names.
2) **Ownership**: Every value has a single owner.
3. Borrowing \u{2014} References without taking ownership.
### 4. Lifetimes: How long references stay valid.
";
        let units = parse_units(reply);
        assert_eq!(units.len(), 4);
        assert_eq!(units[0].title, "Variables");
        assert_eq!(units[0].description, "How values are bound to names.");
        assert_eq!(units[1].title, "Ownership");
        assert_eq!(units[1].description, "Every value has a single owner.");
        assert_eq!(units[2].title, "Borrowing");
        assert_eq!(units[3].title, "Lifetimes");
        assert_eq!(
            units.iter().map(|u| u.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn list_position_wins_over_printed_number() {
        let units = parse_units("3. Advanced - last\n1. Basics - first");
        assert_eq!(units[0].title, "Advanced");
        assert_eq!(units[0].index, 0);
        assert_eq!(units[1].title, "Basics");
        assert_eq!(units[1].index, 1);
    }

    #[test]
    fn unparseable_lines_are_skipped() {
        let reply = "1. Intro - start\n2.\nnot a unit\n- 3 things\n3. Wrap up";
        let units = parse_units(reply);
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].title, "Wrap up");
        assert_eq!(units[1].description, "");
    }

    #[test]
    fn outline_sub_items_are_not_units() {
        let reply = "\
1. Basics - Start here.
   1.1 Variables and types
   1.2 Control flow
2. Ownership - Who frees what.
   2.1. Moves
3. Borrowing - Shared and mutable references.";
        let units = parse_units(reply);
        assert_eq!(
            units.iter().map(|u| u.title.as_str()).collect::<Vec<_>>(),
            vec!["Basics", "Ownership", "Borrowing"]
        );
        assert_eq!(units[2].index, 2);
    }

    #[test]
    fn numbers_inside_titles_are_kept() {
        let units = parse_units("1. 1990s consoles - The cartridge era.");
        assert_eq!(units[0].title, "1990s consoles");
    }

    #[test]
    fn unit_and_step_prefixes() {
        let reply = "\
Unit 1: Basics - Start here.
**Unit 2** - Ownership: Who frees what.
step 3. Borrowing - Shared and mutable references.
Module 4 \u{2014} Lifetimes";
        let units = parse_units(reply);
        assert_eq!(
            units.iter().map(|u| u.title.as_str()).collect::<Vec<_>>(),
            vec!["Basics", "Ownership", "Borrowing", "Lifetimes"]
        );
        assert_eq!(units[0].description, "Start here.");
        assert_eq!(units[1].description, "Who frees what.");
    }

    #[test]
    fn prefix_word_without_number_is_skipped() {
        assert!(parse_units("Unit overview follows.\nStep by step guide").is_empty());
    }

    #[test]
    fn hyphenated_titles_survive() {
        let units = parse_units("1. Copy-on-write - Sharing until mutation.");
        assert_eq!(units[0].title, "Copy-on-write");
    }

    #[tokio::test]
    async fn decompose_keeps_service_count_and_order() {
        // Six sources ask for 4-5 units; the service returns 6 and they are kept.
        let query = ScriptedQuery::ok("1. A - a\n2. B - b\n3. C - c\n4. D - d\n5. E - e\n6. F - f");
        let units = UnitDecomposer::new(&query).decompose("nb", "Topic", 6).await.unwrap();
        assert_eq!(units.len(), 6);
        assert_eq!(units[5].title, "F");

        let prompts = query.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("between 4 and 5"));
    }

    #[tokio::test]
    async fn decompose_fails_on_empty_reply() {
        let query = ScriptedQuery::ok("I could not find anything about that topic.");
        let err = UnitDecomposer::new(&query).decompose("nb", "Topic", 2).await.unwrap_err();
        assert!(matches!(err, CurriculaError::DecompositionFailed(_)));
    }

    #[tokio::test]
    async fn decompose_fails_when_query_errors() {
        let query = ScriptedQuery::err("API error (status 500): boom");
        let err = UnitDecomposer::new(&query).decompose("nb", "Topic", 2).await.unwrap_err();
        assert!(matches!(err, CurriculaError::DecompositionFailed(_)));
    }
}
