//! Badge printing: rendering, the print subsystem seam, and the bulk orchestrator.

mod bulk;
mod spool;

pub use bulk::{unprinted, BulkPrintRun, BulkPrinter};
pub use spool::SpoolPrinter;

use crate::model::{Record, RecordId};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrintError {
    #[error("cannot render badge: {0}")]
    Render(String),
    #[error("spool write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("print command exited with {0}")]
    Command(String),
    #[error("print did not complete within {0:?}")]
    Timeout(Duration),
}

/// Fixed page setup for badge stock: no margins, content pushed down past the pre-printed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    pub margin_px: u32,
    pub top_offset_px: u32,
}

pub const BADGE_LAYOUT: PageLayout = PageLayout {
    margin_px: 0,
    top_offset_px: 210,
};

/// Off-screen surface handed to the print subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeDocument {
    pub record_id: RecordId,
    pub title: String,
    pub firm_name: String,
    pub person_name: String,
    pub photo_url: Option<String>,
    pub layout: PageLayout,
}

/// Accepts one document at a time and resolves once the job has completed or failed.
#[async_trait]
pub trait PrintSubsystem: Send + Sync {
    async fn print(&self, doc: &BadgeDocument) -> Result<(), PrintError>;
}

/// Lay out a registration detail record as a badge.
pub fn render_badge(detail: &Record, image_base_url: &str) -> Result<BadgeDocument, PrintError> {
    let record_id = detail
        .id()
        .ok_or_else(|| PrintError::Render("detail record has no id".into()))?;
    let firm_name = detail.text("fair_firm_name").trim().to_string();
    let person_name = detail.text("fair_person_name").trim().to_string();
    if firm_name.is_empty() && person_name.is_empty() {
        return Err(PrintError::Render(format!(
            "record {record_id} has neither firm nor person name"
        )));
    }
    let title = if person_name.is_empty() {
        "Registration".to_string()
    } else {
        format!("Registration-{person_name}")
    };
    let photo_url = detail
        .get_str("fair_person_image")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|img| format!("{}/{}", image_base_url.trim_end_matches('/'), img));

    Ok(BadgeDocument {
        record_id,
        title,
        firm_name,
        person_name,
        photo_url,
        layout: BADGE_LAYOUT,
    })
}

impl BadgeDocument {
    /// Standalone HTML page for the badge, including the print page setup.
    pub fn to_html(&self) -> String {
        let photo = self
            .photo_url
            .as_deref()
            .map(|url| format!(r#"<img class="photo" src="{}" alt="Registrant">"#, escape_html(url)))
            .unwrap_or_default();
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
@page {{ size: auto; margin: {margin}px; }}
body {{ margin: {margin}px; -webkit-print-color-adjust: exact; }}
body > div {{ position: absolute; top: {top}px; left: 0; width: 100%; text-align: center; }}
.photo {{ width: 7rem; height: 7rem; object-fit: cover; }}
</style>
</head>
<body>
<div>
{photo}
<h2>{firm}</h2>
<h3 style="text-transform: uppercase">{person}</h3>
</div>
</body>
</html>
"#,
            title = escape_html(&self.title),
            margin = self.layout.margin_px,
            top = self.layout.top_offset_px,
            photo = photo,
            firm = escape_html(&self.firm_name),
            person = escape_html(&self.person_name),
        )
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
