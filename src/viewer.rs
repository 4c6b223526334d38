//! Generation of the in-app documentation viewer page.
//!
//! The page embeds Swagger UI and a selector listing every configured spec. Selecting a
//! spec reloads Swagger UI from that spec's published artifact. Generation is purely
//! textual and deterministic, so the page can be regenerated on every file-generation pass.

use crate::artifact::ARTIFACT_FILE_PREFIX;
use crate::config::ConfigSet;
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// URL path the viewer page is routed under.
pub const VIEWER_ROUTE_PATH: &str = "/umi/plugin/openapi";

/// Route identifier of the viewer page in the host route table.
pub const VIEWER_ROUTE_ID: &str = "umi/plugin/openapi";

/// Location of the materialized page, relative to the temp build area.
pub const VIEWER_FILE: &str = "plugin-openapi/openapi.html";

const SWAGGER_UI_CDN: &str = "https://cdn.jsdelivr.net/npm/swagger-ui-dist@5.10.0";

/// Renders the viewer page for `config_set`.
pub fn generate(config_set: &ConfigSet) -> String {
    let options: String = config_set
        .iter()
        .map(|spec| {
            let name = escape_html(spec.display_name());
            format!("\n        <option value=\"{name}\">{name}</option>")
        })
        .collect();

    format!(
        r##"<!DOCTYPE html>
<!-- This file is generated automatically. DO NOT CHANGE IT MANUALLY! -->
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>API Documentation</title>
    <link rel="stylesheet" href="{cdn}/swagger-ui.css">
    <style>
        body {{
            margin: 0;
            padding: 24px;
        }}
        #spec-selector {{
            position: fixed;
            right: 16px;
            top: 8px;
            z-index: 10;
        }}
    </style>
</head>
<body>
    <select id="spec-selector">{options}
    </select>
    <div id="swagger-ui"></div>
    <script src="{cdn}/swagger-ui-bundle.js"></script>
    <script>
        const artifactUrl = (name) => "/{prefix}" + encodeURIComponent(name) + ".json";
        const render = (name) => {{
            SwaggerUIBundle({{
                url: artifactUrl(name),
                dom_id: "#swagger-ui",
            }});
        }};
        let selected = {initial};
        const selector = document.getElementById("spec-selector");
        selector.value = selected;
        selector.addEventListener("change", (event) => {{
            selected = event.target.value;
            render(selected);
        }});
        window.onload = () => render(selected);
    </script>
</body>
</html>
"##,
        cdn = SWAGGER_UI_CDN,
        options = options,
        prefix = ARTIFACT_FILE_PREFIX,
        initial = script_string(config_set.initial_name()),
    )
}

/// Regenerates the page and writes it under `tmp_dir`, returning its path.
pub fn write_viewer_page(tmp_dir: &Path, config_set: &ConfigSet) -> Result<PathBuf> {
    let path = tmp_dir.join(VIEWER_FILE);
    let content = generate(config_set);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(&path, &content)
        .with_context(|| format!("Failed to write viewer page: {}", path.display()))?;

    debug!("Wrote viewer page ({} bytes) to {}", content.len(), path.display());
    Ok(path)
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// A JavaScript string literal that cannot close the surrounding script element.
fn script_string(raw: &str) -> String {
    serde_json::Value::String(raw.to_string())
        .to_string()
        .replace("</", "<\\/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpecConfig;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn config_set(names: &[&str]) -> ConfigSet {
        ConfigSet::new(
            names
                .iter()
                .map(|name| SpecConfig::new("schema.json").with_display_name(*name))
                .collect(),
        )
    }

    fn option_values(page: &str) -> Vec<String> {
        page.split("<option value=\"")
            .skip(1)
            .filter_map(|rest| rest.split('"').next())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_generate_is_deterministic() {
        let set = config_set(&["pets", "users"]);
        assert_eq!(generate(&set), generate(&set));
    }

    #[test]
    fn test_options_follow_configuration_order() {
        let page = generate(&config_set(&["zeta", "alpha", "mid"]));
        assert_eq!(option_values(&page), vec!["zeta", "alpha", "mid"]);
        assert!(page.contains("let selected = \"zeta\";"));
    }

    #[test]
    fn test_empty_set_has_no_options_and_fallback_selection() {
        let page = generate(&ConfigSet::default());
        assert!(option_values(&page).is_empty());
        assert!(!page.contains("<option"));
        assert!(page.contains("let selected = \"openapi\";"));
    }

    #[test]
    fn test_unnamed_spec_uses_fallback_name() {
        let set = ConfigSet::new(vec![SpecConfig::new("schema.json")]);
        let page = generate(&set);
        assert_eq!(option_values(&page), vec!["openapi"]);
    }

    #[test]
    fn test_artifact_url_matches_published_file_names() {
        let page = generate(&config_set(&["pets"]));
        assert!(page.contains("\"/umi-plugins_\" + encodeURIComponent(name) + \".json\""));
    }

    #[test]
    fn test_page_mounts_swagger_ui() {
        let page = generate(&config_set(&["pets"]));
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<div id=\"swagger-ui\"></div>"));
        assert!(page.contains("dom_id: \"#swagger-ui\","));
        assert!(page.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_names_are_escaped() {
        let page = generate(&config_set(&["<b>\"x\"</b>"]));
        assert!(page.contains("<option value=\"&lt;b&gt;&quot;x&quot;&lt;/b&gt;\">"));
        assert!(page.contains(r#"let selected = "<b>\"x\"<\/b>";"#));
        assert!(!page.contains("<b>\"x\"</b>"));
    }

    #[test]
    fn test_write_viewer_page_overwrites() {
        let temp_dir = TempDir::new().unwrap();

        let first = write_viewer_page(temp_dir.path(), &config_set(&["a"])).unwrap();
        let second = write_viewer_page(temp_dir.path(), &config_set(&["b"])).unwrap();

        assert_eq!(first, second);
        assert!(first.ends_with("plugin-openapi/openapi.html"));
        let content = fs::read_to_string(&second).unwrap();
        assert_eq!(content, generate(&config_set(&["b"])));
    }
}
