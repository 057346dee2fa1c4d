//! Ordered overlay layers rendered as an FFmpeg filter chain.
//!
//! A [`DrawList`] is the explicit stack of boxes and captions painted on top
//! of a canvas, bottom layer first. The same list drives clip branding, the
//! shorts call-to-action band, title slides and the thumbnail text pass.

use std::path::{Path, PathBuf};

use reel_models::parse_hex_color;

/// An RGB colour with opacity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub rgb: [u8; 3],
    /// 0.0 is transparent, 1.0 opaque
    pub alpha: f64,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            rgb: [r, g, b],
            alpha: 1.0,
        }
    }

    /// Parse `#rrggbb`.
    pub fn from_hex(value: &str) -> Option<Self> {
        parse_hex_color(value).map(|[r, g, b]| Self::rgb(r, g, b))
    }

    /// Parse `#rrggbb`, falling back to `default` on malformed input.
    pub fn from_hex_or(value: &str, default: Color) -> Self {
        Self::from_hex(value).unwrap_or(default)
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha.clamp(0.0, 1.0);
        self
    }

    /// FFmpeg colour syntax: `0xRRGGBB` or `0xRRGGBB@alpha`.
    pub fn to_ffmpeg(&self) -> String {
        let [r, g, b] = self.rgb;
        if self.alpha >= 1.0 {
            format!("0x{:02X}{:02X}{:02X}", r, g, b)
        } else {
            format!("0x{:02X}{:02X}{:02X}@{:.2}", r, g, b, self.alpha)
        }
    }
}

/// A filled rectangle. Geometry is in canvas pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct FillRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
    pub color: Color,
}

/// A single line of text.
///
/// `x`/`y` are drawtext expressions, so layouts can refer to the rendered
/// text size (`text_w`, `text_h`) and the canvas size (`w`, `h`).
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayer {
    pub text: String,
    pub size: u32,
    pub color: Color,
    pub x: String,
    pub y: String,
    pub border: Option<(u32, Color)>,
    pub shadow: Option<(i32, Color)>,
}

impl TextLayer {
    pub fn new(text: impl Into<String>, size: u32, color: Color) -> Self {
        Self {
            text: text.into(),
            size: size.max(1),
            color,
            x: "0".to_string(),
            y: "0".to_string(),
            border: None,
            shadow: None,
        }
    }

    pub fn at(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.x = x.into();
        self.y = y.into();
        self
    }

    /// Horizontally centred at a fixed top offset.
    pub fn centered_at(self, y: impl Into<String>) -> Self {
        self.at("(w-text_w)/2", y)
    }

    /// Centred on the point (`cx`, `cy`).
    pub fn centered_on(self, cx: i64, cy: i64) -> Self {
        self.at(format!("{}-text_w/2", cx), format!("{}-text_h/2", cy))
    }

    pub fn with_border(mut self, width: u32, color: Color) -> Self {
        self.border = Some((width, color));
        self
    }

    pub fn with_shadow(mut self, offset: i32, color: Color) -> Self {
        self.shadow = Some((offset, color));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Fill(FillRect),
    Text(TextLayer),
}

/// Ordered overlay layers, bottom first.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    font_file: Option<PathBuf>,
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new(font_file: Option<&Path>) -> Self {
        Self {
            font_file: font_file.map(Path::to_path_buf),
            commands: Vec::new(),
        }
    }

    pub fn fill(&mut self, rect: FillRect) -> &mut Self {
        self.commands.push(DrawCommand::Fill(rect));
        self
    }

    pub fn text(&mut self, layer: TextLayer) -> &mut Self {
        if !layer.text.trim().is_empty() {
            self.commands.push(DrawCommand::Text(layer));
        }
        self
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Render as a comma-joined filter chain (`null` when empty).
    pub fn to_filter_chain(&self) -> String {
        if self.commands.is_empty() {
            return "null".to_string();
        }
        self.commands
            .iter()
            .map(|command| match command {
                DrawCommand::Fill(rect) => drawbox(rect),
                DrawCommand::Text(layer) => self.drawtext(layer),
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn drawtext(&self, layer: &TextLayer) -> String {
        let mut opts = Vec::with_capacity(10);
        if let Some(font) = &self.font_file {
            opts.push(format!(
                "fontfile={}",
                escape_filter_value(&font.to_string_lossy())
            ));
        }
        opts.push("expansion=none".to_string());
        opts.push(format!("text={}", escape_filter_value(&layer.text)));
        opts.push(format!("fontsize={}", layer.size));
        opts.push(format!("fontcolor={}", layer.color.to_ffmpeg()));
        if let Some((width, color)) = layer.border {
            opts.push(format!("borderw={}", width));
            opts.push(format!("bordercolor={}", color.to_ffmpeg()));
        }
        if let Some((offset, color)) = layer.shadow {
            opts.push(format!("shadowx={}", offset));
            opts.push(format!("shadowy={}", offset));
            opts.push(format!("shadowcolor={}", color.to_ffmpeg()));
        }
        opts.push(format!("x={}", escape_filter_value(&layer.x)));
        opts.push(format!("y={}", escape_filter_value(&layer.y)));
        format!("drawtext={}", opts.join(":"))
    }
}

fn drawbox(rect: &FillRect) -> String {
    format!(
        "drawbox=x={}:y={}:w={}:h={}:color={}:t=fill",
        rect.x,
        rect.y,
        rect.width,
        rect.height,
        rect.color.to_ffmpeg()
    )
}

/// Escape a value for use as a filter option inside a filter graph.
///
/// Option values are unescaped twice: once by the graph parser (which
/// treats `[],;` as delimiters) and once by the option parser (which
/// treats `:` as a delimiter). Both honour `\` and `'`.
pub fn escape_filter_value(value: &str) -> String {
    let mut option_level = String::with_capacity(value.len() * 2);
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            option_level.push('\\');
        }
        option_level.push(c);
    }

    let mut graph_level = String::with_capacity(option_level.len() * 2);
    for c in option_level.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            graph_level.push('\\');
        }
        graph_level.push(c);
    }
    graph_level
}
