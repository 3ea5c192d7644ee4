use super::{BadgeDocument, PrintError, PrintSubsystem};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;

/// Writes each badge as an HTML page into a spool directory and optionally hands the
/// file to an external print command (e.g. `lp -o fit-to-page`).
pub struct SpoolPrinter {
    dir: PathBuf,
    command: Option<String>,
}

impl SpoolPrinter {
    pub fn new(dir: impl Into<PathBuf>, command: Option<String>) -> Self {
        Self {
            dir: dir.into(),
            command: command.filter(|c| !c.trim().is_empty()),
        }
    }

    fn file_name(doc: &BadgeDocument) -> String {
        let stamp = OffsetDateTime::now_utc()
            .format(format_description!(
                "[year][month][day]-[hour][minute][second]-[subsecond digits:3]"
            ))
            .unwrap_or_else(|_| "now".into());
        let id: String = doc
            .record_id
            .0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("badge-{id}-{stamp}.html")
    }

    async fn run_command(&self, command: &str, file: &Path) -> Result<(), PrintError> {
        let mut parts = command.split_whitespace();
        let Some(program) = parts.next() else {
            return Ok(());
        };
        let status = tokio::process::Command::new(program)
            .args(parts)
            .arg(file)
            .kill_on_drop(true)
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(PrintError::Command(status.to_string()))
        }
    }
}

#[async_trait]
impl PrintSubsystem for SpoolPrinter {
    async fn print(&self, doc: &BadgeDocument) -> Result<(), PrintError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(Self::file_name(doc));
        tokio::fs::write(&path, doc.to_html()).await?;
        tracing::debug!(path = %path.display(), "badge spooled");
        if let Some(command) = &self.command {
            self.run_command(command, &path).await?;
        }
        Ok(())
    }
}
