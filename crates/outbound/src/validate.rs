//! Structural limits for outbound payloads.
//!
//! Ceilings match the transport's interactive-message limits. Each
//! violation is a stable machine-readable code so tests and logs can
//! assert on exact sets.

use std::collections::HashSet;

use crate::payload::ReplyPayload;

pub const MAX_BODY_CHARS: usize = 1024;
pub const MAX_HEADER_CHARS: usize = 60;
pub const MAX_FOOTER_CHARS: usize = 60;
pub const MAX_BUTTONS: usize = 3;
pub const MAX_BUTTON_TITLE_CHARS: usize = 20;
pub const MAX_SECTIONS: usize = 10;
pub const MAX_ROWS_TOTAL: usize = 10;
pub const MAX_ROW_TITLE_CHARS: usize = 24;
pub const MAX_ROW_DESCRIPTION_CHARS: usize = 72;

/// A single named structural violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationIssue {
    BodyMissing,
    BodyTooLong,
    HeaderTooLong,
    FooterTooLong,
    TooManyButtons,
    ButtonTitleTooLong,
    TooManySections,
    TooManyRows,
    RowTitleTooLong,
    RowDescriptionTooLong,
    EmptySection,
    DuplicateRowId,
}

impl ValidationIssue {
    /// Stable machine code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BodyMissing => "body_missing",
            Self::BodyTooLong => "body_too_long",
            Self::HeaderTooLong => "header_too_long",
            Self::FooterTooLong => "footer_too_long",
            Self::TooManyButtons => "too_many_buttons",
            Self::ButtonTitleTooLong => "button_title_too_long",
            Self::TooManySections => "too_many_sections",
            Self::TooManyRows => "too_many_rows",
            Self::RowTitleTooLong => "row_title_too_long",
            Self::RowDescriptionTooLong => "row_description_too_long",
            Self::EmptySection => "empty_section",
            Self::DuplicateRowId => "duplicate_row_id",
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Check a payload against the transport's structural limits. Empty result
/// means valid. Pure and side-effect free; runs before every send.
pub fn validate(payload: &ReplyPayload) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if payload.body.trim().is_empty() {
        issues.push(ValidationIssue::BodyMissing);
    } else if payload.body.chars().count() > MAX_BODY_CHARS {
        issues.push(ValidationIssue::BodyTooLong);
    }

    if let Some(header) = &payload.header {
        if header.chars().count() > MAX_HEADER_CHARS {
            issues.push(ValidationIssue::HeaderTooLong);
        }
    }
    if let Some(footer) = &payload.footer {
        if footer.chars().count() > MAX_FOOTER_CHARS {
            issues.push(ValidationIssue::FooterTooLong);
        }
    }

    if payload.buttons.len() > MAX_BUTTONS {
        issues.push(ValidationIssue::TooManyButtons);
    }
    if payload
        .buttons
        .iter()
        .any(|b| b.title.chars().count() > MAX_BUTTON_TITLE_CHARS)
    {
        issues.push(ValidationIssue::ButtonTitleTooLong);
    }

    if payload.sections.len() > MAX_SECTIONS {
        issues.push(ValidationIssue::TooManySections);
    }
    if payload.sections.iter().any(|s| s.rows.is_empty()) {
        issues.push(ValidationIssue::EmptySection);
    }

    let rows: Vec<_> = payload.sections.iter().flat_map(|s| &s.rows).collect();
    if rows.len() > MAX_ROWS_TOTAL {
        issues.push(ValidationIssue::TooManyRows);
    }
    if rows
        .iter()
        .any(|r| r.title.chars().count() > MAX_ROW_TITLE_CHARS)
    {
        issues.push(ValidationIssue::RowTitleTooLong);
    }
    if rows.iter().any(|r| {
        r.description
            .as_ref()
            .is_some_and(|d| d.chars().count() > MAX_ROW_DESCRIPTION_CHARS)
    }) {
        issues.push(ValidationIssue::RowDescriptionTooLong);
    }

    let mut seen = HashSet::new();
    if rows.iter().any(|r| !seen.insert(r.id.as_str())) {
        issues.push(ValidationIssue::DuplicateRowId);
    }

    issues
}
