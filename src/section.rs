//! Section extraction with per-format boundary detection.
//!
//! A section starts at the first line matching a header label and runs
//! until the next line that is a header of equal or higher rank (lower
//! rank number), or the end of the text. What counts as a header depends
//! on the source format, so boundary detection is a [`BoundaryDetector`]
//! strategy chosen from the document's [`DocumentFormat`].
//!
//! ```rust
//! use kb_assistant::section::{extract, MarkdownBoundaries};
//!
//! let text = "## Dues\n- $50\n## Events\n- Social";
//! let section = extract(text, "## Dues", &MarkdownBoundaries).unwrap();
//! assert_eq!(section, "## Dues\n- $50");
//! ```

use crate::models::DocumentFormat;

/// Rank given to markdown label lines (`Label:` or a fully bold line),
/// below every `#` heading depth.
const MARKDOWN_LABEL_RANK: usize = 7;
/// Word count below which an ALL-CAPS line is treated as a heading.
const CAPS_HEADING_MAX_WORDS: usize = 6;

/// Decides whether a line is a section header and, if so, its rank.
///
/// Rank 1 is the highest. Returns `None` for body lines.
pub trait BoundaryDetector {
    fn header_rank(&self, line: &str) -> Option<usize>;
}

/// Markdown source: `#` headings rank by depth; label lines rank below
/// all headings.
pub struct MarkdownBoundaries;

impl BoundaryDetector for MarkdownBoundaries {
    fn header_rank(&self, line: &str) -> Option<usize> {
        if let Some(depth) = heading_depth(line) {
            return Some(depth);
        }
        if is_label_line(line) {
            return Some(MARKDOWN_LABEL_RANK);
        }
        None
    }
}

/// Flattened text (Word, spreadsheet, PDF): a short ALL-CAPS line stands
/// in for a heading; label lines rank below it.
pub struct PlainTextBoundaries;

impl BoundaryDetector for PlainTextBoundaries {
    fn header_rank(&self, line: &str) -> Option<usize> {
        if is_caps_heading(line) {
            Some(1)
        } else if is_label_line(line) {
            Some(2)
        } else {
            None
        }
    }
}

/// Picks the boundary strategy for a source format.
pub fn boundaries_for(format: DocumentFormat) -> &'static dyn BoundaryDetector {
    match format {
        DocumentFormat::Markdown => &MarkdownBoundaries,
        DocumentFormat::Word | DocumentFormat::Spreadsheet | DocumentFormat::Pdf => {
            &PlainTextBoundaries
        }
    }
}

/// Extracts the section headed by `header_label`, header line included.
///
/// Only the first occurrence of the header is used. Returns `None` when
/// the header never appears or no body line follows it.
pub fn extract(text: &str, header_label: &str, detector: &dyn BoundaryDetector) -> Option<String> {
    let label = header_label.trim();
    if label.is_empty() {
        return None;
    }
    let mut lines = text.lines();
    let start = lines.by_ref().find(|line| header_matches(line, label))?;
    let start_rank = detector.header_rank(start).unwrap_or(usize::MAX);

    let mut section = vec![start];
    for line in lines {
        if matches!(detector.header_rank(line), Some(rank) if rank <= start_rank) {
            break;
        }
        section.push(line);
    }

    if section[1..].iter().all(|line| line.trim().is_empty()) {
        return None;
    }
    Some(section.join("\n").trim().to_string())
}

/// Body lines of a section, without the header line, list markers, or
/// blank lines.
pub fn body_items(section: &str) -> Vec<String> {
    section
        .lines()
        .skip(1)
        .map(strip_list_marker)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Case-sensitive header match. Labels given without a heading marker also
/// match headings and bold labels whose visible text starts with them.
fn header_matches(line: &str, label: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.starts_with(label) {
        return true;
    }
    if label.starts_with('#') {
        return false;
    }
    visible_header_text(trimmed).starts_with(label)
}

fn visible_header_text(line: &str) -> &str {
    let without_hashes = line.trim_start_matches('#').trim_start();
    without_hashes
        .trim_start_matches("**")
        .trim_start_matches("__")
        .trim_start()
}

fn heading_depth(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let depth = trimmed.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&depth) {
        return None;
    }
    let rest = &trimmed[depth..];
    if rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t') {
        Some(depth)
    } else {
        None
    }
}

/// `Label:` on its own line, or a line that is entirely bold.
fn is_label_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || is_list_item(line) || line.starts_with(char::is_whitespace) {
        return false;
    }
    let bold = trimmed.len() > 4
        && ((trimmed.starts_with("**") && trimmed.ends_with("**"))
            || (trimmed.starts_with("__") && trimmed.ends_with("__")));
    let unbolded = trimmed.trim_matches(|c| c == '*' || c == '_').trim_end();
    bold || unbolded.ends_with(':')
}

/// A short line whose letters are all uppercase and which starts with a
/// letter, so bullets, figures and dates such as `3.0 GPA`, `- TBD` or
/// `1/22/25 6:00PM` stay body lines.
fn is_caps_heading(line: &str) -> bool {
    let trimmed = line.trim();
    if is_list_item(line) || !trimmed.starts_with(char::is_alphabetic) {
        return false;
    }
    let words = trimmed.split_whitespace().count();
    words < CAPS_HEADING_MAX_WORDS
        && trimmed
            .chars()
            .filter(|c| c.is_alphabetic())
            .all(char::is_uppercase)
}

pub(crate) fn is_list_item(line: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.starts_with("- ") || trimmed.starts_with("* ") || trimmed.starts_with("+ ") {
        return true;
    }
    if trimmed.starts_with('•') {
        return true;
    }
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && trimmed[digits..].starts_with(". ")
}

/// Removes a leading bullet or ordered-list marker and surrounding space.
pub(crate) fn strip_list_marker(line: &str) -> &str {
    let trimmed = line.trim();
    for marker in ["- ", "* ", "+ ", "• ", "•"] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            return rest.trim_start();
        }
    }
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        if let Some(rest) = trimmed[digits..].strip_prefix(". ") {
            return rest.trim_start();
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIREMENTS_MD: &str = "\
# Membership

## Candidate Eligibility
- Declared accounting major
- Junior standing

### Notes
- Transfer students welcome

## Candidacy Requirements
- 3.0 GPA

## Academic Standards

**GPA Requirements:**
- Minimum 3.0 overall
- Minimum 3.0 in major

**Attendance Requirements:**
- 3 meetings
";

    #[test]
    fn stops_at_next_same_level_heading() {
        let section = extract(REQUIREMENTS_MD, "## Candidate Eligibility", &MarkdownBoundaries)
            .unwrap();
        assert!(section.starts_with("## Candidate Eligibility"));
        assert!(section.contains("### Notes"));
        assert!(section.contains("Transfer students welcome"));
        assert!(!section.contains("Candidacy Requirements"));
        assert!(!section.contains("3.0 GPA"));
    }

    #[test]
    fn label_without_marker_matches_heading() {
        let section = extract(REQUIREMENTS_MD, "Candidacy Requirements", &MarkdownBoundaries)
            .unwrap();
        assert_eq!(section, "## Candidacy Requirements\n- 3.0 GPA");
    }

    #[test]
    fn bold_label_section_ends_at_next_label() {
        let section = extract(REQUIREMENTS_MD, "GPA Requirements:", &MarkdownBoundaries).unwrap();
        assert_eq!(
            body_items(&section),
            vec!["Minimum 3.0 overall", "Minimum 3.0 in major"]
        );
    }

    #[test]
    fn missing_header_is_absent() {
        assert_eq!(extract(REQUIREMENTS_MD, "## Dues", &MarkdownBoundaries), None);
        assert_eq!(extract("", "## Dues", &MarkdownBoundaries), None);
        assert_eq!(extract(REQUIREMENTS_MD, "  ", &MarkdownBoundaries), None);
    }

    #[test]
    fn extraction_is_idempotent() {
        let a = extract(REQUIREMENTS_MD, "## Candidate Eligibility", &MarkdownBoundaries);
        let b = extract(REQUIREMENTS_MD, "## Candidate Eligibility", &MarkdownBoundaries);
        assert_eq!(a, b);
    }

    #[test]
    fn first_occurrence_wins() {
        let text = "## Dues\nfirst\n## Other\nx\n## Dues\nsecond";
        assert_eq!(
            extract(text, "## Dues", &MarkdownBoundaries).unwrap(),
            "## Dues\nfirst"
        );
    }

    #[test]
    fn header_match_is_case_sensitive() {
        assert_eq!(extract("## dues\nx", "## Dues", &MarkdownBoundaries), None);
    }

    #[test]
    fn plain_text_stops_at_caps_heading() {
        let text = "Member Requirements\nAttend 3 meetings\nPay dues\nTUTORING SCHEDULE\nMonday 5pm";
        let section = extract(text, "Member Requirements", &PlainTextBoundaries).unwrap();
        assert_eq!(section, "Member Requirements\nAttend 3 meetings\nPay dues");
    }

    #[test]
    fn caps_heading_section_spans_label_lines() {
        let text = "MEMBER CHECKLIST\nBefore initiation:\nPay dues\nREFLECTION PAPERS POLICY\n500 words";
        let section = extract(text, "MEMBER CHECKLIST", &PlainTextBoundaries).unwrap();
        assert_eq!(section, "MEMBER CHECKLIST\nBefore initiation:\nPay dues");
    }

    #[test]
    fn long_caps_line_is_not_a_heading() {
        assert!(!is_caps_heading("ALL MEMBERS MUST ATTEND EVERY SINGLE MEETING"));
        assert!(is_caps_heading("TUTORING SCHEDULE"));
        assert!(!is_caps_heading("2/5/25"));
    }

    #[test]
    fn figures_and_bullets_are_not_caps_headings() {
        assert!(!is_caps_heading("3.0 GPA"));
        assert!(!is_caps_heading("- TBD"));
        assert!(!is_caps_heading("• BAP"));
        assert!(!is_caps_heading("1/22/25 6:00PM"));
        assert!(is_caps_heading("ATTENDANCE"));
    }

    #[test]
    fn plain_text_section_keeps_figure_lines() {
        let text = "GPA Requirements:\n3.0 GPA\n2.5 in major\nATTENDANCE\nx";
        let section = extract(text, "GPA Requirements:", &PlainTextBoundaries).unwrap();
        assert_eq!(body_items(&section), vec!["3.0 GPA", "2.5 in major"]);
    }

    #[test]
    fn plain_text_section_keeps_acronym_bullets() {
        let text = "Member Requirements\n- Pay BAP dues\n- TBD\n- Attend 3 meetings";
        let section = extract(text, "Member Requirements", &PlainTextBoundaries).unwrap();
        assert_eq!(section, text);
    }

    #[test]
    fn plain_text_schedule_keeps_dated_lines() {
        let text = "SPRING SCHEDULE\n1/22/25 6:00PM Kickoff\n2/5/25 6:30PM Workshop\nFALL\nTBD";
        let section = extract(text, "SPRING SCHEDULE", &PlainTextBoundaries).unwrap();
        assert_eq!(
            section,
            "SPRING SCHEDULE\n1/22/25 6:00PM Kickoff\n2/5/25 6:30PM Workshop"
        );
    }

    #[test]
    fn header_without_body_is_absent() {
        let text = "GPA Requirements:\n\nATTENDANCE REQUIREMENTS\n3 meetings";
        assert_eq!(extract(text, "GPA Requirements:", &PlainTextBoundaries), None);
        assert_eq!(extract("## Dues\n## Events\n- Social", "## Dues", &MarkdownBoundaries), None);
    }

    #[test]
    fn strategy_follows_format() {
        let md = boundaries_for(DocumentFormat::Markdown);
        let plain = boundaries_for(DocumentFormat::Word);
        assert_eq!(md.header_rank("## Title"), Some(2));
        assert_eq!(plain.header_rank("## Title"), None);
        assert_eq!(plain.header_rank("TITLE"), Some(1));
        assert_eq!(md.header_rank("#hashtag"), None);
    }

    #[test]
    fn list_markers_are_stripped() {
        assert_eq!(strip_list_marker("  - item"), "item");
        assert_eq!(strip_list_marker("• item"), "item");
        assert_eq!(strip_list_marker("12. item"), "item");
        assert_eq!(strip_list_marker("plain"), "plain");
    }
}
