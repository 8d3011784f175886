/// Page abstraction the extractor drives
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;

/// An element to click, addressed as the `index`-th match of a CSS selector
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClickTarget {
    pub selector: String,
    pub index: usize,
    /// Human readable description for logs
    pub label: String,
}

impl ClickTarget {
    pub fn new(selector: impl Into<String>, index: usize, label: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            index,
            label: label.into(),
        }
    }
}

/// A rendered page whose DOM can be read and clicked
#[async_trait]
pub trait Page: Send + Sync {
    /// Page URL
    fn url(&self) -> &str;

    /// Current DOM serialized as HTML
    async fn html(&self) -> Result<String>;

    /// Click an element. Rendering triggered by the click may be asynchronous.
    async fn click(&self, target: &ClickTarget) -> Result<()>;
}

/// A fixed HTML snapshot, e.g. a saved watch page. Clicks change nothing.
pub struct SnapshotPage {
    url: String,
    html: String,
}

impl SnapshotPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }
}

#[async_trait]
impl Page for SnapshotPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn html(&self) -> Result<String> {
        Ok(self.html.clone())
    }

    async fn click(&self, target: &ClickTarget) -> Result<()> {
        debug!("Snapshot page ignoring click on {}", target.label);
        Ok(())
    }
}

#[derive(Default)]
struct ScriptState {
    current: String,
    /// Frames still to be revealed, one per `html()` call
    pending: VecDeque<String>,
    clicks: Vec<ClickTarget>,
}

/// A page whose DOM changes in response to clicks.
///
/// Each registered click reaction is a list of frames. After the click, every
/// call to `html()` reveals the next frame, so a reaction of
/// `[loading, loading, rendered]` models a panel that renders on the third poll.
pub struct ScriptedPage {
    url: String,
    reactions: HashMap<(String, usize), Vec<String>>,
    state: RwLock<ScriptState>,
}

impl ScriptedPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reactions: HashMap::new(),
            state: RwLock::new(ScriptState {
                current: html.into(),
                ..ScriptState::default()
            }),
        }
    }

    /// Replace the DOM with `html` when the first match of `selector` is clicked
    pub fn on_click(self, selector: impl Into<String>, html: impl Into<String>) -> Self {
        self.on_click_frames(selector, 0, vec![html.into()])
    }

    /// Reveal `frames` one poll at a time when the `index`-th match of `selector` is clicked
    pub fn on_click_frames(mut self, selector: impl Into<String>, index: usize, frames: Vec<String>) -> Self {
        self.reactions.insert((selector.into(), index), frames);
        self
    }

    /// Clicks received so far, in order
    pub async fn clicks(&self) -> Vec<ClickTarget> {
        self.state.read().await.clicks.clone()
    }
}

#[async_trait]
impl Page for ScriptedPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn html(&self) -> Result<String> {
        let mut state = self.state.write().await;
        if let Some(next) = state.pending.pop_front() {
            state.current = next;
        }
        Ok(state.current.clone())
    }

    async fn click(&self, target: &ClickTarget) -> Result<()> {
        let mut state = self.state.write().await;
        state.clicks.push(target.clone());

        if let Some(frames) = self.reactions.get(&(target.selector.clone(), target.index)) {
            debug!("Scripted page reacting to click on {}", target.label);
            state.pending = frames.iter().cloned().collect();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_page_is_static() {
        let page = SnapshotPage::new("https://www.youtube.com/watch?v=abc", "<p>hi</p>");
        page.click(&ClickTarget::new("p", 0, "paragraph")).await.unwrap();
        assert_eq!(page.html().await.unwrap(), "<p>hi</p>");
        assert_eq!(page.url(), "https://www.youtube.com/watch?v=abc");
    }

    #[tokio::test]
    async fn test_scripted_page_reveals_frames_per_poll() {
        let page = ScriptedPage::new("u", "start").on_click_frames(
            "#button",
            0,
            vec!["loading".to_string(), "done".to_string()],
        );

        assert_eq!(page.html().await.unwrap(), "start");
        page.click(&ClickTarget::new("#button", 0, "button")).await.unwrap();
        assert_eq!(page.html().await.unwrap(), "loading");
        assert_eq!(page.html().await.unwrap(), "done");
        assert_eq!(page.html().await.unwrap(), "done");
        assert_eq!(page.clicks().await.len(), 1);
    }

    #[tokio::test]
    async fn test_scripted_page_ignores_unregistered_clicks() {
        let page = ScriptedPage::new("u", "start").on_click("#a", "after");
        page.click(&ClickTarget::new("#a", 1, "second a")).await.unwrap();
        assert_eq!(page.html().await.unwrap(), "start");
    }
}
