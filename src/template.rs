//! Page document rendering
//!
//! The layout hands rendered fragments to a [`PageTemplate`] and sends back
//! whatever string it produces. [`WrapTemplate`] is the built-in one: a
//! fixed prefix and suffix around the concatenated fragments.

use crate::config::TemplateConfig;
use crate::podlet::Fragment;

/// Everything a template gets to see for one page
#[derive(Debug)]
pub struct PageContext<'a> {
    pub title: &'a str,
    /// In podlet registration order
    pub fragments: &'a [Fragment],
}

pub trait PageTemplate: Send + Sync {
    fn render(&self, page: &PageContext<'_>) -> String;
}

#[derive(Debug, Clone)]
pub struct WrapTemplate {
    open: String,
    close: String,
    separator: String,
}

impl WrapTemplate {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
            separator: String::new(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn from_config(config: &TemplateConfig) -> Self {
        Self::new(config.open.clone(), config.close.clone()).with_separator(config.separator.clone())
    }
}

impl PageTemplate for WrapTemplate {
    fn render(&self, page: &PageContext<'_>) -> String {
        let body = page
            .fragments
            .iter()
            .map(|f| f.content.as_str())
            .collect::<Vec<_>>()
            .join(self.separator.as_str());

        format!(
            "{}{}{}",
            self.open.replace("{title}", page.title),
            body,
            self.close.replace("{title}", page.title)
        )
    }
}
