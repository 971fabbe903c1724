/* src/config/tests/parsing.rs */

use super::*;

#[test]
fn parse_minimal_config() {
  let toml_str = r#"
[project]
name = "my-app"
"#;
  let config: PaveConfig = toml::from_str(toml_str).unwrap();
  assert_eq!(config.project.name, "my-app");
  assert_eq!(config.dev.port, 3000);
  assert_eq!(config.paths.public_dir, "public");
  assert_eq!(config.paths.icon_dir, "node_modules/feather-icons/dist/icons");
  assert_eq!(config.paths.style_entry, "src-scss/main.scss");
  assert_eq!(config.paths.script_entry, "src-js/main.js");
  assert_eq!(config.paths.script_out, "main.js");
}

#[test]
fn parse_full_config() {
  let toml_str = r#"
[project]
name = "full-app"

[dev]
port = 8080

[paths]
public_dir = "dist"
icon_dir = "assets/icons"
icon_out_dir = "dist/icons"
style_dir = "styles"
style_entry = "styles/app.scss"
style_out_dir = "dist/css"
script_dir = "client"
script_entry = "client/index.js"
script_out = "app.js"
"#;
  let config: PaveConfig = toml::from_str(toml_str).unwrap();
  assert_eq!(config.project.name, "full-app");
  assert_eq!(config.dev.port, 8080);
  assert_eq!(config.paths.public_dir, "dist");
  assert_eq!(config.paths.icon_out_dir, "dist/icons");
  assert_eq!(config.paths.style_entry, "styles/app.scss");
  assert_eq!(config.paths.style_out_dir, "dist/css");
  assert_eq!(config.paths.script_dir, "client");
  assert_eq!(config.paths.script_out, "app.js");
}

#[test]
fn parse_partial_paths_keeps_other_defaults() {
  let toml_str = r#"
[project]
name = "my-app"

[paths]
style_entry = "scss/site.scss"
"#;
  let config: PaveConfig = toml::from_str(toml_str).unwrap();
  assert_eq!(config.paths.style_entry, "scss/site.scss");
  assert_eq!(config.paths.public_dir, "public");
  assert_eq!(config.paths.script_entry, "src-js/main.js");
}

#[test]
fn missing_project_section_fails() {
  let toml_str = r#"
[dev]
port = 3000
"#;
  assert!(toml::from_str::<PaveConfig>(toml_str).is_err());
}

#[test]
fn mode_flag_is_explicit() {
  assert!(Mode::Production.is_production());
  assert!(!Mode::Development.is_production());
}
