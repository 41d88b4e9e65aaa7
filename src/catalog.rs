//! Mask template catalog and the selector/thumbnail pair driven by it.
//!
//! The backend serves the catalog from `GET /masks` as
//! `{ "masks": [{ "type": ..., "name": ..., "thumb": ... }] }`. The catalog is
//! loaded once per session and never mutated; a mask upload reloads it wholesale.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::Result;

/// A named, reusable mask template known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MaskTemplate {
    /// Unique template id, sent back as `mask_type`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Display label.
    pub name: String,
    /// Thumbnail URL (usually relative to the backend).
    pub thumb: String,
}

#[derive(Deserialize)]
struct CatalogResponse {
    masks: Vec<MaskTemplate>,
}

/// The template list plus the lookup tables built at load time.
#[derive(Debug, Clone, Default)]
pub struct MaskCatalog {
    templates: Vec<MaskTemplate>,
    thumbs: HashMap<String, String>,
    names: HashMap<String, String>,
}

impl MaskCatalog {
    /// Build a catalog from templates in display order.
    ///
    /// A later duplicate `type` overwrites the lookup entries of an earlier one,
    /// but both stay in the option list.
    #[must_use]
    pub fn new(templates: Vec<MaskTemplate>) -> Self {
        let mut thumbs = HashMap::with_capacity(templates.len());
        let mut names = HashMap::with_capacity(templates.len());
        for t in &templates {
            thumbs.insert(t.kind.clone(), t.thumb.clone());
            names.insert(t.kind.clone(), t.name.clone());
        }
        Self {
            templates,
            thumbs,
            names,
        }
    }

    /// Parse the `/masks` response body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the body is not a valid catalog.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let resp: CatalogResponse = serde_json::from_slice(body)?;
        log::debug!("catalog holds {} mask templates", resp.masks.len());
        Ok(Self::new(resp.masks))
    }

    /// Templates in the order the backend listed them.
    #[must_use]
    pub fn templates(&self) -> &[MaskTemplate] {
        &self.templates
    }

    /// Number of templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the backend returned no templates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Thumbnail URL registered for `kind`.
    #[must_use]
    pub fn thumb(&self, kind: &str) -> Option<&str> {
        self.thumbs.get(kind).map(String::as_str)
    }

    /// Display name registered for `kind`.
    #[must_use]
    pub fn name(&self, kind: &str) -> Option<&str> {
        self.names.get(kind).map(String::as_str)
    }

    /// Whether `kind` is a known template id.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.thumbs.contains_key(kind)
    }

    /// `(value, label)` pairs for a selection control.
    pub fn options(&self) -> impl Iterator<Item = (&str, &str)> {
        self.templates
            .iter()
            .map(|t| (t.kind.as_str(), t.name.as_str()))
    }
}

/// Current value of a mask selector and the thumbnail it displays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaskSelection {
    selected: Option<String>,
    thumbnail: Option<String>,
}

impl MaskSelection {
    /// Select the first template and show its thumbnail.
    ///
    /// An empty catalog yields no selection and no thumbnail.
    #[must_use]
    pub fn initial(catalog: &MaskCatalog) -> Self {
        match catalog.templates().first() {
            Some(first) => Self {
                selected: Some(first.kind.clone()),
                thumbnail: Some(first.thumb.clone()),
            },
            None => Self::default(),
        }
    }

    /// Change the selected template.
    ///
    /// The thumbnail follows only when `kind` has a registered thumbnail; otherwise
    /// the previous thumbnail stays on screen. Returns whether the thumbnail changed.
    pub fn select(&mut self, catalog: &MaskCatalog, kind: &str) -> bool {
        self.selected = Some(kind.to_string());
        match catalog.thumb(kind) {
            Some(thumb) if !thumb.is_empty() => {
                self.thumbnail = Some(thumb.to_string());
                true
            }
            _ => false,
        }
    }

    /// Selected template id, if any.
    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Thumbnail currently displayed, if any.
    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
}
