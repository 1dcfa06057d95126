//! Maps analysis evidence to a location the external viewer can open.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::Evidence;
use crate::registry::{DocumentPatch, DocumentRegistry};

/// A viewer URL split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationTarget {
    pub base: String,
    pub page: Option<u32>,
    pub search: Option<String>,
    /// Cache-busting counter, only set on repeated jumps.
    pub nonce: Option<u64>,
}

impl NavigationTarget {
    pub fn new(base: &str, page: Option<u32>, search: Option<&str>) -> Self {
        let base = base.split_once('#').map_or(base, |(b, _)| b);
        Self {
            base: base.to_string(),
            page,
            search: search
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            nonce: None,
        }
    }

    /// Parse a target produced by [`NavigationTarget::to_url`].
    pub fn parse(url: &str) -> Self {
        let Some((base, fragment)) = url.split_once('#') else {
            return Self::new(url, None, None);
        };

        let mut target = Self::new(base, None, None);
        for param in fragment.split('&') {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            match key {
                "page" => target.page = value.parse().ok(),
                "search" => {
                    target.search = urlencoding::decode(value)
                        .ok()
                        .map(|s| s.into_owned())
                        .filter(|s| !s.is_empty())
                }
                "nav" => target.nonce = value.parse().ok(),
                _ => {}
            }
        }
        target
    }

    pub fn to_url(&self) -> String {
        let mut params = Vec::new();
        if let Some(page) = self.page {
            params.push(format!("page={}", page));
        }
        if let Some(search) = &self.search {
            params.push(format!("search={}", urlencoding::encode(search)));
        }
        if let Some(nonce) = self.nonce {
            params.push(format!("nav={}", nonce));
        }

        if params.is_empty() {
            self.base.clone()
        } else {
            format!("{}#{}", self.base, params.join("&"))
        }
    }

    /// Same page and search term, ignoring the cache-busting counter.
    pub fn same_location(&self, other: &NavigationTarget) -> bool {
        self.base == other.base && self.page == other.page && self.search == other.search
    }
}

impl fmt::Display for NavigationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url())
    }
}

/// Resolves evidence references to viewer targets.
pub struct ViewerNavigator {
    registry: DocumentRegistry,
    jumps: AtomicU64,
}

impl ViewerNavigator {
    pub fn new(registry: DocumentRegistry) -> Self {
        Self {
            registry,
            jumps: AtomicU64::new(0),
        }
    }

    /// Build the target for `reference` (registry id or service id) and
    /// record it as the document's current target.
    ///
    /// Returns `None` for unknown documents and documents without a viewer
    /// URL. A target equal to the current one gets a cache-busting suffix so
    /// the viewer reloads.
    pub fn locate(
        &self,
        reference: &str,
        page: Option<u32>,
        match_text: Option<&str>,
    ) -> Option<String> {
        let doc = self.registry.find_by_ref(reference)?;

        let mut located = None;
        self.registry.update(doc.id, |current| {
            let base = current.viewer.base_url.as_deref()?;
            let mut target = NavigationTarget::new(base, page, match_text);
            if current.viewer.current_target.as_deref() == Some(target.to_url().as_str()) {
                target.nonce = Some(self.jumps.fetch_add(1, Ordering::Relaxed) + 1);
            }
            let url = target.to_url();
            located = Some(url.clone());
            Some(DocumentPatch::new().navigation_target(Some(url)))
        });

        if located.is_none() {
            tracing::debug!("No viewer location for {}", reference);
        }
        located
    }

    /// Locate a piece of evidence in its document.
    pub fn locate_evidence(&self, reference: &str, evidence: &Evidence) -> Option<String> {
        self.locate(reference, evidence.page, evidence.match_text.as_deref())
    }
}
