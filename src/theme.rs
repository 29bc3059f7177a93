use anyhow::{anyhow, Context, Result};
use eframe::egui::{Color32, IconData, Visuals};
use rust_embed::RustEmbed;
use serde::Deserialize;

/// Theme directories baked into the binary: `<name>/style.json` with the
/// palette and `<name>/icon.png` for the window icon.
#[derive(RustEmbed)]
#[folder = "themes/"]
struct ThemeAssets;

/// Palette file format.
#[derive(Debug, Deserialize)]
struct Palette {
    dark: bool,
    panel: String,
    text: String,
    accent: String,
}

/// A loaded theme, ready to hand to eframe.
pub struct Theme {
    pub visuals: Visuals,
    pub icon: IconData,
}

/// Loads the named theme. Any missing or malformed asset is a startup
/// failure; there is no fallback theme.
pub fn load(name: &str) -> Result<Theme> {
    let style = ThemeAssets::get(&format!("{name}/style.json"))
        .ok_or_else(|| anyhow!("theme '{name}' has no style.json"))?;
    let palette: Palette = serde_json::from_slice(&style.data)
        .with_context(|| format!("theme '{name}': invalid style.json"))?;

    let icon_png = ThemeAssets::get(&format!("{name}/icon.png"))
        .ok_or_else(|| anyhow!("theme '{name}' has no icon.png"))?;
    let icon = decode_icon(&icon_png.data)
        .with_context(|| format!("theme '{name}': invalid icon.png"))?;

    Ok(Theme {
        visuals: build_visuals(&palette)?,
        icon,
    })
}

fn build_visuals(palette: &Palette) -> Result<Visuals> {
    let mut visuals = if palette.dark {
        Visuals::dark()
    } else {
        Visuals::light()
    };
    let panel = parse_hex(&palette.panel)?;
    let accent = parse_hex(&palette.accent)?;

    visuals.panel_fill = panel;
    visuals.window_fill = panel;
    visuals.override_text_color = Some(parse_hex(&palette.text)?);
    visuals.selection.bg_fill = accent;
    visuals.hyperlink_color = accent;
    Ok(visuals)
}

fn decode_icon(png: &[u8]) -> Result<IconData> {
    let img = image::load_from_memory(png)?.to_rgba8();
    Ok(IconData {
        width: img.width(),
        height: img.height(),
        rgba: img.into_raw(),
    })
}

/// `#rrggbb` only; themes have no use for alpha here.
fn parse_hex(hex: &str) -> Result<Color32> {
    let raw = hex.strip_prefix('#').unwrap_or(hex);
    if raw.len() != 6 {
        return Err(anyhow!("bad color '{hex}', expected #rrggbb"));
    }
    let r = u8::from_str_radix(&raw[0..2], 16)?;
    let g = u8::from_str_radix(&raw[2..4], 16)?;
    let b = u8::from_str_radix(&raw[4..6], 16)?;
    Ok(Color32::from_rgb(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_themes_load() {
        for name in ["dark", "light"] {
            let theme = load(name).unwrap_or_else(|e| panic!("theme {name}: {e}"));
            assert!(theme.icon.width > 0 && theme.icon.height > 0);
        }
    }

    #[test]
    fn unknown_theme_is_an_error() {
        assert!(load("no_such_theme").is_err());
    }

    #[test]
    fn hex_colors_parse() {
        assert_eq!(parse_hex("#ff8000").unwrap(), Color32::from_rgb(255, 128, 0));
        assert!(parse_hex("#abc").is_err());
        assert!(parse_hex("zzzzzz").is_err());
    }
}
