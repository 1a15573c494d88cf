/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Placeholder discovery and validation.
//!
//! Placeholders are written `{{ expr }}`. The expression splits on its
//! first colon into a dot-notation name and an optional inline style:
//! `{{ customer.name:font-weight:bold }}`. Nested braces are not
//! supported.
//!
//! Image placeholders are the exception to the split: in
//! `{{IMAGE_PLACEHOLDER:logo}}` the text after the marker is an image key,
//! and the whole expression is looked up as a literal top-level data key.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::data::DataTree;

static PLACEHOLDER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{(.*?)\}\}").expect("placeholder pattern is a valid regex")
});

/// A placeholder as it appears in document text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Placeholder {
    /// The literal token including braces and inner whitespace.
    pub token: String,
    /// The trimmed expression between the braces.
    pub expr: String,
}

impl Placeholder {
    pub fn new(token: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expr: expr.into().trim().to_string(),
        }
    }

    /// The dot-notation path before the first colon.
    pub fn name(&self) -> &str {
        match self.expr.split_once(':') {
            Some((name, _)) => name.trim(),
            None => &self.expr,
        }
    }

    /// The inline style after the first colon, if any.
    pub fn style(&self) -> Option<&str> {
        self.expr
            .split_once(':')
            .map(|(_, style)| style.trim())
            .filter(|style| !style.is_empty())
    }

    /// The image key when this is an image placeholder for `marker`.
    pub fn image_key(&self, marker: &str) -> Option<&str> {
        self.expr
            .strip_prefix(marker)?
            .strip_prefix(':')
            .map(str::trim)
    }

    /// The data key an image placeholder refers to, `<marker>:<key>`.
    pub fn image_data_key(&self, marker: &str) -> Option<String> {
        self.image_key(marker).map(|key| format!("{}:{}", marker, key))
    }
}

/// Scans text for placeholders and checks them against data.
#[derive(Debug, Clone)]
pub struct TemplateParser {
    image_marker: String,
}

impl Default for TemplateParser {
    fn default() -> Self {
        Self::new("IMAGE_PLACEHOLDER")
    }
}

impl TemplateParser {
    pub fn new(image_marker: impl Into<String>) -> Self {
        Self {
            image_marker: image_marker.into(),
        }
    }

    pub fn image_marker(&self) -> &str {
        &self.image_marker
    }

    /// Every distinct placeholder token in `text`, in first-seen order.
    ///
    /// Repeats of the same token are collapsed. Two tokens that differ only
    /// in inner whitespace are kept apart since each must be replaced
    /// literally.
    pub fn find_placeholders(&self, text: &str) -> Vec<Placeholder> {
        let mut found: Vec<Placeholder> = Vec::new();
        for captures in PLACEHOLDER_PATTERN.captures_iter(text) {
            let token = &captures[0];
            if found.iter().any(|p| p.token == token) {
                continue;
            }
            found.push(Placeholder::new(token, &captures[1]));
        }
        found
    }

    /// Every distinct trimmed expression in `text`, in first-seen order.
    pub fn find_parameters(&self, text: &str) -> Vec<String> {
        let mut exprs: Vec<String> = Vec::new();
        for placeholder in self.find_placeholders(text) {
            if !exprs.contains(&placeholder.expr) {
                exprs.push(placeholder.expr);
            }
        }
        exprs
    }

    /// Names of parameters that have no value in `data`.
    ///
    /// The result is sorted and deduplicated, so it does not depend on the
    /// order of `parameters`.
    pub fn validate<'a>(
        &self,
        parameters: impl IntoIterator<Item = &'a str>,
        data: &DataTree,
    ) -> Vec<String> {
        let mut missing: Vec<String> = parameters
            .into_iter()
            .map(|expr| Placeholder::new(expr, expr))
            .filter_map(|placeholder| self.missing_key(&placeholder, data))
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    /// The key `placeholder` needs from `data`, if it is absent.
    fn missing_key(&self, placeholder: &Placeholder, data: &DataTree) -> Option<String> {
        if let Some(key) = placeholder.image_data_key(&self.image_marker) {
            return data.get(&key).is_none().then_some(key);
        }
        let name = placeholder.name();
        data.resolve(name).is_none().then(|| name.to_string())
    }
}
