/*
 * style.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compilation of CSS-like style strings into text style descriptors.
//!
//! The grammar is `prop:value;prop:value`. Recognized properties are
//! `color`, `background-color`, `font-weight`, `font-style`,
//! `text-decoration`, `font-size` and `font-family`; anything else is
//! ignored. Cosmetic problems never fail a compilation:
//!
//! - a color that is neither `#rrggbb` nor `rgb(r,g,b)` becomes black
//! - a font outside the allow-list is dropped
//! - a font size that does not parse becomes the default size (11pt)
//!
//! Each of these fallbacks is reported as a [`SubstitutionWarning`] on the
//! [`CompiledStyle`] so callers can log it.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Value, json};

use crate::config::EngineConfig;
use crate::error::SubstitutionWarning;

/// Fonts the remote editor can render.
pub const SUPPORTED_FONTS: &[&str] = &[
    "Alegreya",
    "Amatic SC",
    "Arial",
    "Calibri",
    "Cambria",
    "Caveat",
    "Comfortaa",
    "Comic Sans MS",
    "Courier New",
    "EB Garamond",
    "Georgia",
    "Impact",
    "Lato",
    "Lexend",
    "Lobster",
    "Lora",
    "Merriweather",
    "Montserrat",
    "Nunito",
    "Open Sans",
    "Oswald",
    "Pacifico",
    "Playfair Display",
    "Roboto",
    "Roboto Mono",
    "Source Code Pro",
    "Spectral",
    "Times New Roman",
    "Trebuchet MS",
    "Verdana",
];

/// An opaque RGB color with channels in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RgbColor {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl RgbColor {
    pub const BLACK: RgbColor = RgbColor {
        red: 0.0,
        green: 0.0,
        blue: 0.0,
    };

    /// Build a color from 8-bit channels.
    pub fn from_u8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: f64::from(red) / 255.0,
            green: f64::from(green) / 255.0,
            blue: f64::from(blue) / 255.0,
        }
    }

    fn to_wire(self) -> Value {
        json!({
            "color": {
                "rgbColor": { "red": self.red, "green": self.green, "blue": self.blue }
            }
        })
    }
}

/// Structured text style. Unset fields are left untouched by the remote
/// service.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StyleDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreground: Option<RgbColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<RgbColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
    /// Font size in points
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
}

impl StyleDescriptor {
    /// True when no field is set. An empty descriptor must not produce a
    /// style request.
    pub fn is_empty(&self) -> bool {
        self == &StyleDescriptor::default()
    }

    /// Comma-separated list of the remote field names this descriptor sets.
    pub fn field_mask(&self) -> String {
        let mut fields = Vec::new();
        if self.foreground.is_some() {
            fields.push("foregroundColor");
        }
        if self.background.is_some() {
            fields.push("backgroundColor");
        }
        if self.bold.is_some() {
            fields.push("bold");
        }
        if self.italic.is_some() {
            fields.push("italic");
        }
        if self.underline.is_some() {
            fields.push("underline");
        }
        if self.strikethrough.is_some() {
            fields.push("strikethrough");
        }
        if self.font_size.is_some() {
            fields.push("fontSize");
        }
        if self.font_family.is_some() {
            fields.push("weightedFontFamily");
        }
        fields.join(",")
    }

    /// The remote `TextStyle` object for this descriptor.
    pub fn to_text_style(&self) -> Value {
        let mut style = serde_json::Map::new();
        if let Some(color) = self.foreground {
            style.insert("foregroundColor".into(), color.to_wire());
        }
        if let Some(color) = self.background {
            style.insert("backgroundColor".into(), color.to_wire());
        }
        if let Some(bold) = self.bold {
            style.insert("bold".into(), Value::Bool(bold));
        }
        if let Some(italic) = self.italic {
            style.insert("italic".into(), Value::Bool(italic));
        }
        if let Some(underline) = self.underline {
            style.insert("underline".into(), Value::Bool(underline));
        }
        if let Some(strike) = self.strikethrough {
            style.insert("strikethrough".into(), Value::Bool(strike));
        }
        if let Some(size) = self.font_size {
            style.insert("fontSize".into(), json!({ "magnitude": size, "unit": "PT" }));
        }
        if let Some(family) = &self.font_family {
            style.insert("weightedFontFamily".into(), json!({ "fontFamily": family }));
        }
        Value::Object(style)
    }
}

/// A compiled descriptor together with the fallbacks taken to produce it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledStyle {
    pub descriptor: StyleDescriptor,
    pub warnings: Vec<SubstitutionWarning>,
}

/// Compiles CSS-like style strings.
#[derive(Debug, Clone)]
pub struct StyleCompiler {
    fonts: BTreeSet<String>,
    default_font_size: f64,
}

impl Default for StyleCompiler {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl StyleCompiler {
    /// Create a compiler using the built-in font list plus any extra fonts
    /// from the configuration.
    pub fn new(config: &EngineConfig) -> Self {
        let fonts = SUPPORTED_FONTS
            .iter()
            .map(|f| f.to_string())
            .chain(config.extra_fonts.iter().cloned())
            .collect();
        Self {
            fonts,
            default_font_size: config.default_font_size,
        }
    }

    /// Whether a font family is on the allow-list.
    pub fn supports_font(&self, font: &str) -> bool {
        self.fonts.contains(font)
    }

    /// Compile a style string.
    pub fn compile(&self, style: &str) -> CompiledStyle {
        let mut compiled = CompiledStyle::default();

        for declaration in style.split(';') {
            let declaration = declaration.trim();
            if declaration.is_empty() {
                continue;
            }
            let Some((key, value)) = declaration.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            self.apply(&key, value, &mut compiled);
        }

        compiled
    }

    /// Compile a style given either as a string or as an object of
    /// property/value pairs. Other JSON values compile to an empty style.
    pub fn compile_value(&self, style: &Value) -> CompiledStyle {
        match style {
            Value::String(s) => self.compile(s),
            Value::Object(props) => {
                let joined = props
                    .iter()
                    .map(|(k, v)| match v {
                        Value::String(s) => format!("{}:{}", k, s),
                        other => format!("{}:{}", k, other),
                    })
                    .collect::<Vec<_>>()
                    .join(";");
                self.compile(&joined)
            }
            _ => CompiledStyle::default(),
        }
    }

    fn apply(&self, key: &str, value: &str, compiled: &mut CompiledStyle) {
        let descriptor = &mut compiled.descriptor;
        match key {
            "color" => descriptor.foreground = Some(parse_color(value, &mut compiled.warnings)),
            "background-color" => {
                descriptor.background = Some(parse_color(value, &mut compiled.warnings))
            }
            "font-weight" => descriptor.bold = Some(value.eq_ignore_ascii_case("bold")),
            "font-style" => descriptor.italic = Some(value.eq_ignore_ascii_case("italic")),
            "text-decoration" => {
                let value = value.to_ascii_lowercase();
                descriptor.underline = Some(value.contains("underline"));
                descriptor.strikethrough = Some(value.contains("line-through"));
            }
            "font-size" => {
                let size = parse_font_size(value).unwrap_or(self.default_font_size);
                descriptor.font_size = Some(size);
            }
            "font-family" => {
                let font = value.trim_matches(|c| c == '\'' || c == '"').trim();
                if self.supports_font(font) {
                    descriptor.font_family = Some(font.to_string());
                } else {
                    compiled.warnings.push(SubstitutionWarning::UnsupportedFont {
                        font: font.to_string(),
                    });
                }
            }
            _ => {}
        }
    }
}

/// Read `12`, `12pt` or `12px` as 12 points. No unit conversion is done.
fn parse_font_size(value: &str) -> Option<f64> {
    let value = value.trim().to_ascii_lowercase();
    let number = value
        .strip_suffix("px")
        .or_else(|| value.strip_suffix("pt"))
        .unwrap_or(&value);
    number.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_color(value: &str, warnings: &mut Vec<SubstitutionWarning>) -> RgbColor {
    parse_hex(value)
        .or_else(|| parse_rgb_function(value))
        .unwrap_or_else(|| {
            warnings.push(SubstitutionWarning::UnrecognizedColor {
                value: value.to_string(),
            });
            RgbColor::BLACK
        })
}

fn parse_hex(value: &str) -> Option<RgbColor> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(RgbColor::from_u8(channel(0)?, channel(2)?, channel(4)?))
}

fn parse_rgb_function(value: &str) -> Option<RgbColor> {
    let lower = value.to_ascii_lowercase();
    let inner = lower.strip_prefix("rgb(")?.strip_suffix(')')?;
    let channels: Vec<u8> = inner
        .split(',')
        .map(|c| c.trim().parse::<u8>().ok())
        .collect::<Option<_>>()?;
    match channels.as_slice() {
        [r, g, b] => Some(RgbColor::from_u8(*r, *g, *b)),
        _ => None,
    }
}
