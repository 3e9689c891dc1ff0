use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};
use url::Url;

use crate::menu::{self, MenuDate};
use crate::notify::Notifier;
use crate::store::ObjectStore;
use crate::utils::fetch::MenuFetcher;
use crate::utils::pdf;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub menu_url: Url,
    /// Dish to look for; matched as a substring of any normalized line.
    pub keyword: String,
    pub bucket: String,
    pub channel: String,
    /// Check and report, but neither post nor upload.
    pub dry_run: bool,
}

/// What a single menu check ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    NoKeyword,
    NoDate,
    AlreadyArchived { key: String },
    DryRun { key: String, message: String },
    Alerted { key: String },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::NoKeyword => write!(f, "menu does not mention the dish"),
            Outcome::NoDate => write!(f, "menu date could not be determined"),
            Outcome::AlreadyArchived { key } => write!(f, "menu already uploaded: {}", key),
            Outcome::DryRun { key, .. } => write!(f, "dry run, would upload: {}", key),
            Outcome::Alerted { key } => write!(f, "alert posted, uploaded menu: {}", key),
        }
    }
}

/// Text of the chat alert, e.g.
/// `*Ramen Shop is serving tsukemen* on *Friday, Mar 15*\nMenu: https://...`.
pub fn alert_message(dish: &str, date: &MenuDate, link: &str) -> String {
    format!(
        "*Ramen Shop is serving {}* on *{}*\nMenu: {}",
        dish,
        date.label(),
        link
    )
}

pub struct MenuWatcher<S, N> {
    fetcher: MenuFetcher,
    store: S,
    notifier: N,
    settings: WatchSettings,
}

impl<S: ObjectStore, N: Notifier> MenuWatcher<S, N> {
    pub fn new(fetcher: MenuFetcher, store: S, notifier: N, settings: WatchSettings) -> Self {
        Self {
            fetcher,
            store,
            notifier,
            settings,
        }
    }

    /// Fetches the current menu and runs one check against it. The downloaded file
    /// lives only for the duration of this call.
    pub async fn check(&self, today: NaiveDate) -> Result<Outcome> {
        let fetched = self
            .fetcher
            .fetch(&self.settings.menu_url)
            .await
            .context("failed to fetch menu")?;

        let pages = pdf::extract_pages(fetched.path())?;
        let lines = menu::normalize(&pages);
        info!(
            target: "menu_check",
            pages = pages.len(),
            lines = lines.len(),
            size = fetched.size(),
            "Extracted menu text"
        );

        self.process(&lines, fetched.path(), today).await
    }

    /// Decides what to do with an already extracted menu stored at `pdf_path`.
    pub async fn process(
        &self,
        lines: &[String],
        pdf_path: &Path,
        today: NaiveDate,
    ) -> Result<Outcome> {
        let settings = &self.settings;

        // No need to do anything if the menu doesn't have what we're looking for.
        if !menu::contains_keyword(lines, &settings.keyword) {
            info!(target: "menu_check", keyword = %settings.keyword, "Menu does not contain search pattern");
            return Ok(Outcome::NoKeyword);
        }

        let extracted =
            menu::extract(lines, today).context("menu date is not a valid calendar date")?;
        let Some(date) = extracted else {
            warn!(target: "menu_check", "Menu mentions the dish but no date was found");
            return Ok(Outcome::NoDate);
        };

        let key = date.archive_key();
        let archived = self
            .store
            .list_keys(&settings.bucket)
            .await
            .context("failed to list archived menus")?;
        if archived.contains(&key) {
            info!(target: "menu_check", key = %key, "Menu already uploaded");
            return Ok(Outcome::AlreadyArchived { key });
        }

        let link = self.store.object_url(&settings.bucket, &key);
        let message = alert_message(&settings.keyword, &date, &link);

        if settings.dry_run {
            info!(target: "menu_check", key = %key, "Dry run; skipping alert and upload");
            return Ok(Outcome::DryRun { key, message });
        }

        self.notifier
            .post_message(&settings.channel, &message)
            .await
            .context("failed to post alert")?;

        self.store
            .upload(&settings.bucket, &key, pdf_path, PDF_CONTENT_TYPE)
            .await
            .with_context(|| format!("failed to upload menu {}", key))?;
        info!(target: "menu_check", key = %key, "Uploaded menu");

        Ok(Outcome::Alerted { key })
    }
}
