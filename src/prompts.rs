//! Prompts for composition generation, image analysis, and illustration.
//!
//! Centralising every prompt here keeps behaviour changes in one place and
//! lets unit tests inspect prompts without a live model. The JSON shapes
//! embedded below are the exact shapes the Composition Validator and the
//! analysis parser consume; changing one side means changing the other.

/// System prompt for turning input text into a slide composition.
pub const COMPOSITION_SYSTEM_PROMPT: &str = r#"You are an expert presentation designer. Your task is to analyze content and create a professional slide deck composition.

You must output valid JSON following this schema:
- slideConfig: global deck settings (size, theme)
- pages: array of page definitions, each with text and image elements

Each element carries precise positioning, sizing, and styling. Output ONLY the JSON object, no commentary."#;

/// Build the user prompt for composition generation.
pub fn composition_prompt(content: &str, deck_size: &str, theme: &str) -> String {
    format!(
        r##"Create a professional slide deck from the following content:

{content}

Requirements:
- Deck size: {deck_size}
- Design: {theme} theme
- Generate an appropriate number of slides for the content
- Follow visual-hierarchy best practices for layout

Return a JSON object of this shape:
{{
  "slideConfig": {{"size": "{deck_size}", "theme": "{theme}"}},
  "pages": [
    {{
      "title": "Slide Title",
      "backgroundColor": "#FFFFFF",
      "elements": [
        {{
          "type": "text",
          "position": {{"x": 100, "y": 200}},
          "size": {{"width": 800, "height": 100}},
          "content": "Text content",
          "font": {{"family": "Arial", "size": 24, "color": "#000000", "bold": false}},
          "alignment": "left",
          "zIndex": 1
        }},
        {{
          "type": "image",
          "position": {{"x": 100, "y": 400}},
          "size": {{"width": 400, "height": 300}},
          "source": "placeholder_img1",
          "fitMode": "contain",
          "generate": true,
          "id": "img1",
          "prompt": "An illustration matching the slide content"
        }}
      ]
    }}
  ]
}}"##
    )
}

/// System prompt for per-page vision analysis.
pub const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are an expert in analyzing presentation slides and scanned pages.
Your task is to identify and locate the text and image elements within one page.

Output valid JSON with element positions, types, and properties. Coordinates are in the source image's own pixel grid."#;

/// Build the user prompt for analyzing one source page image.
///
/// `width`/`height` are the deck canvas dimensions the final deck targets;
/// the model reports coordinates in the source grid and the Coordinate
/// Normalizer maps them onto this canvas afterwards.
pub fn analysis_prompt(width: u32, height: u32) -> String {
    format!(
        r#"Analyze this page image and extract all elements.

For each element, identify:
- type ("text" or "image")
- position: {{"x", "y"}} in source pixels
- size: {{"width", "height"}} in source pixels
- content (for text) or source (a short identifier, for images)
- style: font, colors, alignment where visible

Also report the page background as {{"type": "color"|"image", "value": ...}}.

The deck this page becomes part of uses a {width}x{height} canvas.
Return the analysis as a JSON object:
{{"title": "...", "elements": [...], "background": {{...}}}}"#
    )
}

/// System prompt for generating one illustration asset.
pub const ILLUSTRATION_SYSTEM_PROMPT: &str =
    "You are an illustrator. Produce the requested illustration asset.";

/// Build the user prompt for one asset generation request.
pub fn illustration_prompt(description: &str, size: &str) -> String {
    format!("Generate an illustration, {size} pixels:\n\n{description}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composition_prompt_embeds_inputs() {
        let p = composition_prompt("# Quarterly review", "16:9", "corporate");
        assert!(p.contains("# Quarterly review"));
        assert!(p.contains("16:9"));
        assert!(p.contains("corporate"));
        assert!(p.contains("slideConfig"));
    }

    #[test]
    fn composition_prompt_schema_keeps_hex_colours() {
        // The embedded schema ends with the full JSON skeleton, hex colour
        // examples included.
        let p = composition_prompt("x", "16:9", "default");
        assert!(p.contains(r##""backgroundColor": "#FFFFFF""##));
        assert!(p.contains(r##""color": "#000000""##));
        assert!(p.trim_end().ends_with('}'));
    }

    #[test]
    fn analysis_prompt_embeds_canvas() {
        let p = analysis_prompt(1920, 1080);
        assert!(p.contains("1920x1080"));
        assert!(p.contains("background"));
    }
}
