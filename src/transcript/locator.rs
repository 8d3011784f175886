/// Strategies for opening the transcript panel
use super::page::{ClickTarget, Page};
use crate::error::Result;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info};

const TRANSCRIPT_PANEL: &str =
    r#"ytd-engagement-panel-section-list-renderer[target-id="engagement-panel-searchable-transcript"]"#;
const PANEL_EXPANDED: &str = "ENGAGEMENT_PANEL_VISIBILITY_EXPANDED";
const PANEL_HIDDEN: &str = "ENGAGEMENT_PANEL_VISIBILITY_HIDDEN";

const EXPAND_SELECTORS: &[&str] = &[
    "#description-inline-expander #expand",
    "tp-yt-paper-button#expand",
    "#description #expand",
];

const DESCRIPTION_BUTTON_SELECTORS: &[&str] = &[
    "#description button",
    "#description ytd-button-renderer",
    "ytd-watch-metadata button",
];

const OVERFLOW_MENU_SELECTORS: &[&str] = &[
    r#"ytd-menu-renderer button[aria-label="More actions"]"#,
    "ytd-menu-renderer yt-icon-button#button button",
    "ytd-menu-renderer #button-shape button",
];

const MENU_ITEM_SELECTORS: &[&str] = &[
    "ytd-menu-service-item-renderer",
    "tp-yt-paper-item",
    r#"[role="menuitem"]"#,
];

const TRANSCRIPT_SECTION_SELECTORS: &[&str] = &[
    "ytd-video-description-transcript-section-renderer button",
    "ytd-video-description-transcript-section-renderer ytd-button-renderer",
    r#"ytd-video-description-transcript-section-renderer [role="button"]"#,
];

/// One way of getting the transcript panel open.
///
/// `PanelLocator::ORDER` lists the strategies in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelLocator {
    /// Expand the description and click its "Show transcript" button
    DescriptionButton,
    /// Open the "More actions" menu and pick the transcript item
    OverflowMenu,
    /// The transcript engagement panel is already expanded
    OpenEngagementPanel,
    /// Click the button inside the structured description's transcript section
    StructuredDescription,
}

impl PanelLocator {
    pub const ORDER: [PanelLocator; 4] = [
        PanelLocator::DescriptionButton,
        PanelLocator::OverflowMenu,
        PanelLocator::OpenEngagementPanel,
        PanelLocator::StructuredDescription,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PanelLocator::DescriptionButton => "description transcript button",
            PanelLocator::OverflowMenu => "overflow menu item",
            PanelLocator::OpenEngagementPanel => "already open panel",
            PanelLocator::StructuredDescription => "structured description section",
        }
    }

    /// Try to open the panel. `Ok(false)` means this strategy found nothing to act on.
    ///
    /// `settle` is how long to wait after an intermediate click (expanding the
    /// description, opening a menu) before reading the DOM again.
    pub async fn try_open(&self, page: &dyn Page, settle: Duration) -> Result<bool> {
        match self {
            PanelLocator::DescriptionButton => {
                let html = page.html().await?;
                if let Some(expand) = find_first(&html, EXPAND_SELECTORS, "expand description") {
                    debug!("Expanding description");
                    page.click(&expand).await?;
                    settle_for(settle).await;
                }

                let html = page.html().await?;
                match find_labelled(&html, DESCRIPTION_BUTTON_SELECTORS, "transcript") {
                    Some(target) => {
                        page.click(&target).await?;
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            PanelLocator::OverflowMenu => {
                let html = page.html().await?;
                let Some(menu) = find_first(&html, OVERFLOW_MENU_SELECTORS, "more actions") else {
                    return Ok(false);
                };
                page.click(&menu).await?;
                settle_for(settle).await;

                let html = page.html().await?;
                match find_labelled(&html, MENU_ITEM_SELECTORS, "transcript") {
                    Some(target) => {
                        page.click(&target).await?;
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            PanelLocator::OpenEngagementPanel => {
                let html = page.html().await?;
                Ok(panel_is_expanded(&html))
            }
            PanelLocator::StructuredDescription => {
                let html = page.html().await?;
                match find_first(&html, TRANSCRIPT_SECTION_SELECTORS, "transcript section") {
                    Some(target) => {
                        page.click(&target).await?;
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
        }
    }
}

/// Run the strategies in order until one opens the panel
pub async fn open_with(
    locators: &[PanelLocator],
    page: &dyn Page,
    settle: Duration,
) -> Result<Option<PanelLocator>> {
    for locator in locators {
        debug!("Trying transcript locator: {}", locator.name());
        if locator.try_open(page, settle).await? {
            info!("📜 Transcript panel opened via {}", locator.name());
            return Ok(Some(*locator));
        }
    }
    Ok(None)
}

async fn settle_for(settle: Duration) {
    if !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }
}

/// Whether the element, or any ancestor, is hidden from view
pub(crate) fn is_hidden(element: &ElementRef) -> bool {
    std::iter::once(*element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .any(|node| hides_itself(&node))
}

fn hides_itself(element: &ElementRef) -> bool {
    let value = element.value();
    if value.attr("hidden").is_some()
        || value.attr("aria-hidden") == Some("true")
        || value.attr("visibility") == Some(PANEL_HIDDEN)
    {
        return true;
    }
    value
        .attr("style")
        .map(|style| style.replace(' ', "").contains("display:none"))
        .unwrap_or(false)
}

fn element_label(element: &ElementRef) -> String {
    let text = element.text().collect::<Vec<_>>().join(" ");
    let aria = element.value().attr("aria-label").unwrap_or("");
    format!("{} {}", text, aria).to_lowercase()
}

/// First visible match over a list of selectors
fn find_first(html: &str, selectors: &[&str], label: &str) -> Option<ClickTarget> {
    let document = Html::parse_document(html);
    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some((index, _)) = document
            .select(&selector)
            .enumerate()
            .find(|(_, element)| !is_hidden(element))
        {
            return Some(ClickTarget::new(*selector_str, index, label));
        }
    }
    None
}

/// First visible match whose text or aria-label contains `needle`
fn find_labelled(html: &str, selectors: &[&str], needle: &str) -> Option<ClickTarget> {
    let document = Html::parse_document(html);
    let needle = needle.to_lowercase();
    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some((index, element)) = document
            .select(&selector)
            .enumerate()
            .find(|(_, element)| !is_hidden(element) && element_label(element).contains(&needle))
        {
            let label = element.text().collect::<String>().trim().to_string();
            return Some(ClickTarget::new(*selector_str, index, label));
        }
    }
    None
}

fn panel_is_expanded(html: &str) -> bool {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(TRANSCRIPT_PANEL) else {
        return false;
    };
    document
        .select(&selector)
        .any(|panel| panel.value().attr("visibility") == Some(PANEL_EXPANDED))
}
