use std::time::Duration;

use thirtyfour::prelude::*;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::browser::Session;
use crate::domain::{RowOutcome, SampleRecord};
use crate::error::HarvestError;
use crate::extract;
use crate::store::OutputStore;

const PORTAL_URL: &str = "https://platform.gisaid.org/epi3/frontend";
const RESULTS_TABLE_CLASS: &str = "yui-dt-data";
const GENOME_FILTER_CLASS: &str = "sys-form-fi-cb";
const EPICOV_LINK: &str = "EpiCoV™";
const BROWSE_XPATH: &str = "//*[contains(text(), 'Browse')]";
const TOTAL_XPATH: &str = "//*[contains(text(), 'Total:')]";
const NEXT_PAGE_XPATH: &str = "//*[contains(text(), 'next >')]";

const PAGE_SETTLE: Duration = Duration::from_secs(2);
const MENU_SETTLE: Duration = Duration::from_secs(3);
const ROW_SETTLE: Duration = Duration::from_secs(1);
const LOGIN_WAIT: Duration = Duration::from_secs(30);
const LOGIN_POLL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Drives one authenticated EpiCoV browse session against one output
/// directory. Strictly sequential; the caller owns the page loop and stops
/// on `finished()`.
pub struct Harvester {
    session: Session,
    store: OutputStore,
    whole_genome_only: bool,
}

impl Harvester {
    pub fn new(session: Session, store: OutputStore, whole_genome_only: bool) -> Self {
        Self {
            session,
            store,
            whole_genome_only,
        }
    }

    pub fn store(&self) -> &OutputStore {
        &self.store
    }

    pub fn finished(&self) -> bool {
        self.store.is_finished()
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<(), HarvestError> {
        info!(url = PORTAL_URL, "opening portal login page");
        self.session.goto(PORTAL_URL).await?;
        sleep(PAGE_SETTLE).await;

        let driver = self.session.driver();
        let login = driver
            .find(By::Name("login"))
            .await
            .map_err(|_| HarvestError::MissingElement("login field".to_string()))?;
        login
            .send_keys(&credentials.username)
            .await
            .map_err(HarvestError::browser)?;
        let password = driver
            .find(By::Name("password"))
            .await
            .map_err(|_| HarvestError::MissingElement("password field".to_string()))?;
        password
            .send_keys(&credentials.password)
            .await
            .map_err(HarvestError::browser)?;

        let submit = driver
            .find(By::ClassName("form_button_submit"))
            .await
            .map_err(|_| HarvestError::MissingElement("login submit button".to_string()))?;
        self.session.remove_curtain().await?;
        self.session
            .run_script("document.getElementsByClassName('form_button_submit')[0].click();")
            .await?;
        submit
            .wait_until()
            .wait(LOGIN_WAIT, LOGIN_POLL)
            .stale()
            .await
            .map_err(|err| HarvestError::LoginStuck(err.to_string()))?;
        info!(user = credentials.username.as_str(), "login accepted");
        Ok(())
    }

    /// Walks from the landing page to the sequence browse listing, applies
    /// the whole-genome filter when requested, and reads the initial total.
    pub async fn open_listing(&mut self) -> Result<(), HarvestError> {
        sleep(PAGE_SETTLE).await;
        let driver = self.session.driver();

        self.session.remove_curtain().await?;
        let epicov = driver
            .find(By::LinkText(EPICOV_LINK))
            .await
            .map_err(|_| HarvestError::MissingElement("EpiCoV menu entry".to_string()))?;
        self.session.click(&epicov).await?;
        sleep(MENU_SETTLE).await;

        self.session.remove_curtain().await?;
        let browse = driver
            .find(By::XPath(BROWSE_XPATH))
            .await
            .map_err(|_| HarvestError::MissingElement("Browse control".to_string()))?;
        self.session.click(&browse).await?;

        if self.whole_genome_only {
            sleep(PAGE_SETTLE).await;
            let filter_form = driver
                .find(By::ClassName(GENOME_FILTER_CLASS))
                .await
                .map_err(|_| {
                    HarvestError::MissingElement("whole-genome filter form".to_string())
                })?;
            let checkbox = filter_form.find(By::Tag("input")).await.map_err(|_| {
                HarvestError::MissingElement("whole-genome filter checkbox".to_string())
            })?;
            self.session.click(&checkbox).await?;
            sleep(PAGE_SETTLE).await;
        }

        self.refresh_total().await
    }

    /// Re-reads the listing's `Total:` label and re-scans the destination
    /// directory, so `finished()` reflects both the portal and the disk.
    pub async fn refresh_total(&mut self) -> Result<(), HarvestError> {
        let label = self
            .session
            .driver()
            .find(By::XPath(TOTAL_XPATH))
            .await
            .map_err(|_| HarvestError::MissingElement("total count label".to_string()))?;
        let text = label.text().await.map_err(HarvestError::browser)?;
        let total = extract::parse_total(&text).ok_or(HarvestError::TotalCount(text))?;
        self.store.set_target(total);
        self.store.rescan()?;
        match self.store.remaining() {
            Some(0) => info!(total, "all samples already on disk"),
            Some(left) => info!(total, left, "samples left to download"),
            None => {}
        }
        Ok(())
    }

    /// Visits every row of the rendered results page. Per-row failures are
    /// folded into the outcome list and the loop keeps going.
    pub async fn download_current_page(&mut self) -> Result<Vec<RowOutcome>, HarvestError> {
        sleep(ROW_SETTLE).await;
        let rows = self.row_count().await?;
        info!(rows, "downloading current page");

        let mut outcomes = Vec::with_capacity(rows);
        for index in 0..rows {
            match self.download_row(index).await {
                Ok(outcome) => {
                    if let RowOutcome::Downloaded { name, length, .. } = &outcome {
                        debug!(name = name.as_str(), length, "record written");
                    }
                    outcomes.push(outcome);
                }
                Err(err) => {
                    error!(row = index, %err, "row download failed, continuing");
                    if let Err(frame_err) = self.session.leave_frame().await {
                        debug!(%frame_err, "could not restore default content");
                    }
                    outcomes.push(RowOutcome::Failed {
                        row: index,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(outcomes)
    }

    async fn row_count(&self) -> Result<usize, HarvestError> {
        let table = self.results_table().await?;
        let rows = table
            .find_all(By::Tag("tr"))
            .await
            .map_err(HarvestError::browser)?;
        Ok(rows.len())
    }

    async fn results_table(&self) -> Result<WebElement, HarvestError> {
        self.session
            .driver()
            .find(By::ClassName(RESULTS_TABLE_CLASS))
            .await
            .map_err(|_| HarvestError::MissingElement("results table".to_string()))
    }

    // Rows are re-queried per visit: opening and closing the detail frame
    // re-renders the table and stales previously fetched elements.
    async fn download_row(&mut self, index: usize) -> Result<RowOutcome, HarvestError> {
        let table = self.results_table().await?;
        let rows = table
            .find_all(By::Tag("tr"))
            .await
            .map_err(HarvestError::browser)?;
        let row = rows
            .get(index)
            .ok_or_else(|| HarvestError::MissingElement(format!("results row {index}")))?;
        let cells = row.find_all(By::Tag("td")).await.map_err(HarvestError::browser)?;
        let name = cells
            .get(2)
            .ok_or(HarvestError::MissingName(index))?
            .text()
            .await
            .map_err(HarvestError::browser)?;
        if self.store.contains(&name) {
            debug!(name = name.as_str(), "already on disk, skipping");
            return Ok(RowOutcome::Skipped { name });
        }

        let opener = cells
            .get(1)
            .ok_or_else(|| HarvestError::MissingElement(format!("detail cell in row {index}")))?;
        self.session.click(opener).await?;

        self.session.enter_first_frame().await?;
        sleep(PAGE_SETTLE).await;
        let html = self
            .session
            .driver()
            .source()
            .await
            .map_err(HarvestError::browser)?;
        let detail = extract::parse_detail(&html)?;
        let record = SampleRecord::new(&name, detail.fields, &detail.sequence);

        let short = self.whole_genome_only && record.is_suspiciously_short();
        if short {
            warn!(
                name = name.as_str(),
                length = record.sequence_length(),
                "sequence shorter than a whole genome, a rerun will be needed"
            );
        }
        self.store.write_record(&record)?;

        let buttons = self
            .session
            .driver()
            .find_all(By::Tag("button"))
            .await
            .map_err(HarvestError::browser)?;
        let back = buttons
            .get(1)
            .ok_or_else(|| HarvestError::MissingElement("record frame back button".to_string()))?;
        self.session.click(back).await?;
        self.session.leave_frame().await?;
        sleep(ROW_SETTLE).await;

        Ok(RowOutcome::Downloaded {
            length: record.sequence_length(),
            short,
            name,
        })
    }

    /// Advances to the next results page and refreshes the count/cache
    /// state. Depth is unbounded; the caller stops on `finished()`.
    pub async fn next_page(&mut self) -> Result<(), HarvestError> {
        let next = self
            .session
            .driver()
            .find(By::XPath(NEXT_PAGE_XPATH))
            .await
            .map_err(|_| HarvestError::MissingElement("next page control".to_string()))?;
        self.session.click(&next).await?;
        self.refresh_total().await
    }

    pub async fn close(self) -> Result<(), HarvestError> {
        self.session.close().await
    }
}
