use std::time::Duration;

use thirtyfour::error::WebDriverError;
use thirtyfour::prelude::*;
use tracing::debug;

use crate::error::HarvestError;

const NAV_BAR_HEIGHT: i64 = 120;
const SESSION_TIMEOUT: Duration = Duration::from_secs(30);
const IMPLICIT_WAIT: Duration = Duration::from_secs(10);
const CURTAIN_SCRIPT: &str =
    "var curtain = document.getElementById('sys_curtain'); if (curtain) { curtain.remove(); }";

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub webdriver_url: String,
    pub headless: bool,
}

/// The two transient click failures the portal is known to produce; anything
/// else propagates untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickObstruction {
    OutOfView,
    Intercepted,
}

pub fn classify_obstruction(message: &str) -> Option<ClickObstruction> {
    let message = message.to_ascii_lowercase();
    if message.contains("move target out of bounds") {
        Some(ClickObstruction::OutOfView)
    } else if message.contains("element click intercepted") {
        Some(ClickObstruction::Intercepted)
    } else {
        None
    }
}

/// One Firefox session behind a WebDriver endpoint. Owns the only handle to
/// the browser; callers go through it for every interaction.
pub struct Session {
    driver: WebDriver,
}

impl Session {
    pub async fn open(options: &SessionOptions) -> Result<Self, HarvestError> {
        let mut caps = DesiredCapabilities::firefox();
        if options.headless {
            caps.set_headless().map_err(HarvestError::browser)?;
        }
        let driver = WebDriver::new(&options.webdriver_url, caps)
            .await
            .map_err(|err| HarvestError::Connect {
                url: options.webdriver_url.clone(),
                message: err.to_string(),
            })?;
        driver
            .set_window_rect(0, 0, 1366, 2000)
            .await
            .map_err(HarvestError::browser)?;
        let timeouts = TimeoutConfiguration::new(
            Some(SESSION_TIMEOUT),
            Some(SESSION_TIMEOUT),
            Some(IMPLICIT_WAIT),
        );
        driver
            .update_timeouts(timeouts)
            .await
            .map_err(HarvestError::browser)?;
        Ok(Self { driver })
    }

    pub fn driver(&self) -> &WebDriver {
        &self.driver
    }

    pub async fn goto(&self, url: &str) -> Result<(), HarvestError> {
        self.driver.goto(url).await.map_err(HarvestError::browser)
    }

    pub async fn remove_curtain(&self) -> Result<(), HarvestError> {
        self.driver
            .execute(CURTAIN_SCRIPT, Vec::new())
            .await
            .map_err(HarvestError::browser)?;
        Ok(())
    }

    pub async fn run_script(&self, script: &str) -> Result<(), HarvestError> {
        self.driver
            .execute(script, Vec::new())
            .await
            .map_err(HarvestError::browser)?;
        Ok(())
    }

    /// Click with the enumerated recovery policy: scroll an out-of-view
    /// target back under the fixed navigation bar, or strip the curtain
    /// overlay that intercepts clicks. One retry per failure.
    pub async fn click(&self, element: &WebElement) -> Result<(), HarvestError> {
        let Err(err) = self.raw_click(element).await else {
            return Ok(());
        };
        match classify_obstruction(&err.to_string()) {
            Some(ClickObstruction::OutOfView) => {
                debug!("click target out of view, scrolling to it");
                self.scroll_to(element).await?;
            }
            Some(ClickObstruction::Intercepted) => {
                debug!("click intercepted by overlay, removing curtain");
                self.remove_curtain().await?;
            }
            None => return Err(HarvestError::browser(err)),
        }
        self.raw_click(element)
            .await
            .map_err(HarvestError::browser)
    }

    async fn raw_click(&self, element: &WebElement) -> Result<(), WebDriverError> {
        self.driver
            .action_chain()
            .move_to_element_center(element)
            .perform()
            .await?;
        element.click().await
    }

    async fn scroll_to(&self, element: &WebElement) -> Result<(), HarvestError> {
        let rect = element.rect().await.map_err(HarvestError::browser)?;
        let scroll = format!(
            "window.scrollTo({}, {});",
            rect.x as i64, rect.y as i64
        );
        self.run_script(&scroll).await?;
        self.run_script(&format!("window.scrollBy(0, -{NAV_BAR_HEIGHT});"))
            .await
    }

    pub async fn enter_first_frame(&self) -> Result<(), HarvestError> {
        let frame = self
            .driver
            .find(By::Tag("iframe"))
            .await
            .map_err(|_| HarvestError::MissingElement("record detail iframe".to_string()))?;
        frame.enter_frame().await.map_err(HarvestError::browser)
    }

    pub async fn leave_frame(&self) -> Result<(), HarvestError> {
        self.driver
            .enter_default_frame()
            .await
            .map_err(HarvestError::browser)
    }

    pub async fn close(self) -> Result<(), HarvestError> {
        self.driver.quit().await.map_err(HarvestError::browser)
    }
}
