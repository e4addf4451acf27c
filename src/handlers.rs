//! Keyword-triggered handlers for recurring questions.
//!
//! [`RULES`] is an ordered trigger table. The router evaluates it top to
//! bottom against the lower-cased query and runs only the first rule that
//! matches, so earlier rules mask later ones ("when is the meeting
//! schedule" is a next-meeting question, not a full-schedule one).
//!
//! Each handler reads the knowledge base through [`HandlerContext`] and
//! returns either extracted text or a "couldn't find" sentinel.

use chrono::NaiveDateTime;

use crate::config::HandlersConfig;
use crate::extract::CELL_SEPARATOR;
use crate::models::{Document, DocumentFormat};
use crate::schedule;
use crate::section;
use crate::store::KnowledgeBase;

/// Inputs shared by every handler.
pub struct HandlerContext<'a> {
    pub kb: &'a KnowledgeBase,
    pub config: &'a HandlersConfig,
    /// Lower-cased query.
    pub query: &'a str,
    pub now: NaiveDateTime,
}

/// What a handler produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    Found(String),
    /// Nothing extracted; carries the user-facing sentinel.
    Missing(String),
}

impl HandlerOutcome {
    pub fn text(&self) -> &str {
        match self {
            HandlerOutcome::Found(text) | HandlerOutcome::Missing(text) => text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    NextMeeting,
    GpaRequirement,
    AttendanceRequirement,
    MembershipChecklist,
    ReflectionPolicy,
    TutoringSchedule,
    CandidateRequirements,
    MemberRequirements,
    FullSchedule,
    MonthMeetings,
}

/// One row of the trigger table.
pub struct Rule {
    pub kind: HandlerKind,
    pub trigger: fn(&str) -> bool,
}

/// Trigger table, evaluated in order. Queries are lower-cased.
pub const RULES: &[Rule] = &[
    Rule {
        kind: HandlerKind::NextMeeting,
        trigger: |q| q.contains("next meeting") || (q.contains("when") && q.contains("meeting")),
    },
    Rule {
        kind: HandlerKind::GpaRequirement,
        trigger: |q| {
            q.contains("gpa")
                && (q.contains("requirement") || q.contains("need") || q.contains("join"))
        },
    },
    Rule {
        kind: HandlerKind::AttendanceRequirement,
        trigger: |q| q.contains("attendance") && q.contains("requirement"),
    },
    Rule {
        kind: HandlerKind::MembershipChecklist,
        trigger: |q| q.contains("checklist"),
    },
    Rule {
        kind: HandlerKind::ReflectionPolicy,
        trigger: |q| q.contains("reflection") && q.contains("paper"),
    },
    Rule {
        kind: HandlerKind::TutoringSchedule,
        trigger: |q| q.contains("tutoring") && q.contains("schedule"),
    },
    Rule {
        kind: HandlerKind::CandidateRequirements,
        trigger: |q| q.contains("candidate") && q.contains("requirement"),
    },
    Rule {
        kind: HandlerKind::MemberRequirements,
        trigger: |q| q.contains("member") && q.contains("requirement"),
    },
    Rule {
        kind: HandlerKind::FullSchedule,
        trigger: |q| q.contains("meeting schedule") || q.contains("schedule for this semester"),
    },
    Rule {
        kind: HandlerKind::MonthMeetings,
        trigger: |q| schedule::month_in_query(q).is_some(),
    },
];

/// The first rule whose trigger matches the lower-cased query.
pub fn route(query_lower: &str) -> Option<HandlerKind> {
    RULES
        .iter()
        .find(|rule| (rule.trigger)(query_lower))
        .map(|rule| rule.kind)
}

impl HandlerKind {
    pub fn name(self) -> &'static str {
        match self {
            HandlerKind::NextMeeting => "next-meeting",
            HandlerKind::GpaRequirement => "gpa-requirement",
            HandlerKind::AttendanceRequirement => "attendance-requirement",
            HandlerKind::MembershipChecklist => "membership-checklist",
            HandlerKind::ReflectionPolicy => "reflection-policy",
            HandlerKind::TutoringSchedule => "tutoring-schedule",
            HandlerKind::CandidateRequirements => "candidate-requirements",
            HandlerKind::MemberRequirements => "member-requirements",
            HandlerKind::FullSchedule => "full-schedule",
            HandlerKind::MonthMeetings => "month-meetings",
        }
    }

    pub fn run(self, ctx: &HandlerContext<'_>) -> HandlerOutcome {
        match self {
            HandlerKind::NextMeeting => next_meeting(ctx),
            HandlerKind::GpaRequirement => gpa_requirement(ctx),
            HandlerKind::AttendanceRequirement => {
                requirement_section(ctx, "Attendance Requirements", "the attendance requirements")
            }
            HandlerKind::MembershipChecklist => {
                requirement_section(ctx, "Member Checklist", "the member checklist")
            }
            HandlerKind::ReflectionPolicy => {
                requirement_section(ctx, "Reflection Papers Policy", "the reflection paper policy")
            }
            HandlerKind::TutoringSchedule => {
                requirement_section(ctx, "Tutoring Schedule", "the tutoring schedule")
            }
            HandlerKind::CandidateRequirements => candidate_requirements(ctx),
            HandlerKind::MemberRequirements => member_requirements(ctx),
            HandlerKind::FullSchedule => full_schedule(ctx),
            HandlerKind::MonthMeetings => month_meetings(ctx),
        }
    }
}

fn not_found(ctx: &HandlerContext<'_>, what: &str) -> HandlerOutcome {
    HandlerOutcome::Missing(format!(
        "I couldn't find {}. Please contact {} for more information.",
        what, ctx.config.contact
    ))
}

fn requirement_section(ctx: &HandlerContext<'_>, label: &str, what: &str) -> HandlerOutcome {
    match ctx.kb.find_section(label, &ctx.config.requirements_topic) {
        Some(text) => HandlerOutcome::Found(text),
        None => not_found(ctx, what),
    }
}

/// Text of the first document (schedule topic first) that has any dated
/// lines.
fn schedule_text<'a>(ctx: &HandlerContext<'a>) -> Option<&'a str> {
    ctx.kb
        .preferred_order(&ctx.config.schedule_topic)
        .into_iter()
        .map(Document::section_text)
        .find(|text| !schedule::parse_meetings(text).is_empty())
}

fn next_meeting(ctx: &HandlerContext<'_>) -> HandlerOutcome {
    let next = schedule_text(ctx).and_then(|text| schedule::next_meeting(text, ctx.now));
    match next {
        Some(meeting) => HandlerOutcome::Found(format!("Next meeting:\n{}", meeting.block)),
        None => not_found(ctx, "an upcoming meeting on the schedule"),
    }
}

fn month_meetings(ctx: &HandlerContext<'_>) -> HandlerOutcome {
    let Some(month) = schedule::month_in_query(ctx.query) else {
        return not_found(ctx, "a month in your question");
    };
    let blocks: Vec<String> = schedule_text(ctx)
        .map(|text| schedule::meetings_in_month(text, month))
        .unwrap_or_default()
        .into_iter()
        .map(|m| m.block)
        .collect();
    if blocks.is_empty() {
        not_found(
            ctx,
            &format!("any meetings in {}", schedule::month_name(month)),
        )
    } else {
        HandlerOutcome::Found(blocks.join("\n\n"))
    }
}

fn full_schedule(ctx: &HandlerContext<'_>) -> HandlerOutcome {
    let heading = &ctx.config.schedule_heading;
    match ctx.kb.find_section(heading, &ctx.config.schedule_topic) {
        Some(text) => HandlerOutcome::Found(text),
        None => not_found(ctx, &format!("the {}", heading)),
    }
}

fn gpa_requirement(ctx: &HandlerContext<'_>) -> HandlerOutcome {
    let items = ctx
        .kb
        .find_section("GPA Requirements:", &ctx.config.requirements_topic)
        .map(|text| section::body_items(&text))
        .unwrap_or_default();
    if items.is_empty() {
        not_found(ctx, "the GPA requirements")
    } else {
        HandlerOutcome::Found(items.join("\n"))
    }
}

fn candidate_requirements(ctx: &HandlerContext<'_>) -> HandlerOutcome {
    let parts: Vec<String> = ["Candidate Eligibility", "Candidacy Requirements"]
        .iter()
        .filter_map(|label| ctx.kb.find_section(label, &ctx.config.requirements_topic))
        .collect();
    if parts.is_empty() {
        not_found(ctx, "the candidate requirements")
    } else {
        HandlerOutcome::Found(parts.join("\n\n"))
    }
}

fn member_requirements(ctx: &HandlerContext<'_>) -> HandlerOutcome {
    const LABEL: &str = "Member Requirements";
    let docs = ctx.kb.preferred_order(&ctx.config.requirements_topic);

    let from_text = docs
        .iter()
        .filter(|doc| doc.format != DocumentFormat::Spreadsheet)
        .find_map(|doc| {
            section::extract(doc.section_text(), LABEL, section::boundaries_for(doc.format))
        });
    if let Some(text) = from_text {
        return HandlerOutcome::Found(text);
    }

    let from_rows = docs
        .iter()
        .filter(|doc| doc.format == DocumentFormat::Spreadsheet)
        .find_map(|doc| spreadsheet_row(&doc.rendered_text, LABEL));
    match from_rows {
        Some(text) => HandlerOutcome::Found(text),
        None => not_found(ctx, "the member requirements"),
    }
}

/// Finds a row whose first cell equals `label` (ignoring case) and returns
/// its remaining cells, one per line.
fn spreadsheet_row(text: &str, label: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let mut cells = line.split(CELL_SEPARATOR).map(str::trim);
        let first = cells.next()?;
        if !first.eq_ignore_ascii_case(label) {
            return None;
        }
        let rest: Vec<&str> = cells.filter(|c| !c.is_empty()).collect();
        if rest.is_empty() {
            None
        } else {
            Some(rest.join("\n"))
        }
    })
}
