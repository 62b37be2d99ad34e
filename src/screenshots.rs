//! Screenshot drill-down: details and history of one captured view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DATA_URI_PREFIX: &str = "data:image";
const PNG_BASE64_PREFIX: &str = "data:image/png;base64, ";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotPlatform {
    #[serde(default)]
    pub platform_name: Option<String>,
    #[serde(default)]
    pub platform_version: Option<String>,
    #[serde(default)]
    pub browser_name: Option<String>,
    #[serde(default)]
    pub browser_version: Option<String>,
    #[serde(default)]
    pub device_name: Option<String>,
}

impl ScreenshotPlatform {
    /// `Windows 10 (Chrome 120)`; missing parts are left out.
    pub fn label(&self) -> String {
        let mut label = String::new();
        if let Some(name) = &self.platform_name {
            label.push_str(name);
        }
        if let Some(version) = &self.platform_version {
            if !label.is_empty() {
                label.push(' ');
            }
            label.push_str(version);
        }
        if let Some(browser) = &self.browser_name {
            let browser = match &self.browser_version {
                Some(v) => format!("{} {}", browser, v),
                None => browser.clone(),
            };
            if label.is_empty() {
                label = format!("({})", browser);
            } else {
                label.push_str(&format!(" ({})", browser));
            }
        }
        label
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
    #[serde(rename = "_id")]
    pub id: String,
    pub build: String,
    #[serde(default)]
    pub view: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub platform: Option<ScreenshotPlatform>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Screenshot {
    /// Thumbnail as an image source, adding the PNG data URI prefix to raw base64.
    pub fn thumbnail_src(&self) -> String {
        if self.thumbnail.starts_with(DATA_URI_PREFIX) {
            self.thumbnail.clone()
        } else {
            format!("{}{}", PNG_BASE64_PREFIX, self.thumbnail)
        }
    }

    pub fn resolution(&self) -> String {
        format!("{} x {}", self.width, self.height)
    }

    pub fn platform_label(&self) -> String {
        self.platform
            .as_ref()
            .map(ScreenshotPlatform::label)
            .unwrap_or_default()
    }

    pub fn device_name(&self) -> Option<&str> {
        self.platform.as_ref()?.device_name.as_deref()
    }
}

/// Screenshot being inspected, its history and the baseline it is compared to.
#[derive(Debug, Clone, Default)]
pub struct ScreenshotFocus {
    pub current: Option<Screenshot>,
    pub history: Option<Vec<Screenshot>>,
    pub baseline: Option<Screenshot>,
}

impl ScreenshotFocus {
    pub fn is_selected(&self, screenshot_id: &str) -> bool {
        self.current
            .as_ref()
            .map(|s| s.id == screenshot_id)
            .unwrap_or(false)
    }

    pub fn is_baseline(&self, screenshot_id: &str) -> bool {
        self.baseline
            .as_ref()
            .map(|s| s.id == screenshot_id)
            .unwrap_or(false)
    }

    /// History with the baseline appended when it is not already part of it.
    /// `None` while the history is still loading.
    pub fn history_with_baseline(&self) -> Option<Vec<Screenshot>> {
        let mut history = self.history.clone()?;
        if let Some(baseline) = &self.baseline {
            if !history.iter().any(|s| s.id == baseline.id) {
                history.push(baseline.clone());
            }
        }
        Some(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shot(id: &str) -> Screenshot {
        Screenshot {
            id: id.to_string(),
            build: "b1".to_string(),
            view: Some("home".to_string()),
            timestamp: None,
            width: 1920,
            height: 1080,
            thumbnail: "iVBORw0KGgo=".to_string(),
            platform: None,
            tags: Vec::new(),
        }
    }

    #[test]
    fn thumbnail_prefix_added_once() {
        let mut s = shot("s1");
        assert_eq!(s.thumbnail_src(), "data:image/png;base64, iVBORw0KGgo=");
        s.thumbnail = "data:image/jpeg;base64,abc".to_string();
        assert_eq!(s.thumbnail_src(), "data:image/jpeg;base64,abc");
    }

    #[test]
    fn platform_labels() {
        let full = ScreenshotPlatform {
            platform_name: Some("Windows".into()),
            platform_version: Some("10".into()),
            browser_name: Some("Chrome".into()),
            browser_version: Some("120".into()),
            device_name: None,
        };
        assert_eq!(full.label(), "Windows 10 (Chrome 120)");

        let browser_only = ScreenshotPlatform {
            browser_name: Some("Firefox".into()),
            ..Default::default()
        };
        assert_eq!(browser_only.label(), "(Firefox)");
        assert_eq!(shot("s").platform_label(), "");
        assert_eq!(shot("s").resolution(), "1920 x 1080");
    }

    #[test]
    fn baseline_appended_when_missing() {
        let focus = ScreenshotFocus {
            current: Some(shot("s2")),
            history: Some(vec![shot("s1"), shot("s2")]),
            baseline: Some(shot("s0")),
        };
        let ids: Vec<String> = focus
            .history_with_baseline()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, ["s1", "s2", "s0"]);
        assert!(focus.is_selected("s2"));
        assert!(focus.is_baseline("s0"));
    }

    #[test]
    fn baseline_not_duplicated_and_loading_is_none() {
        let mut focus = ScreenshotFocus {
            current: None,
            history: Some(vec![shot("s1")]),
            baseline: Some(shot("s1")),
        };
        assert_eq!(focus.history_with_baseline().unwrap().len(), 1);
        focus.history = None;
        assert!(focus.history_with_baseline().is_none());
    }
}
