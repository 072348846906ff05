use anyhow::Result;
use clap::ValueEnum;
use std::path::Path;

/// Output format of `render`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Yaml,
    Json,
}

pub fn render(path: &Path, env: Option<&str>, format: Format, validate: bool) -> Result<String> {
    let dice = super::load(path, env, validate)?;
    let text = match format {
        Format::Yaml => dice.yaml()?,
        Format::Json => dice.json_pretty()?,
    };
    Ok(text)
}

pub fn run(path: &Path, env: Option<&str>, format: Format, validate: bool) -> Result<()> {
    let text = render(path, env, format, validate)?;
    println!("{}", text.trim_end());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::descriptor;

    const DOC: &str = r#"
services:
  web:
    image: nginx
    ports:
      - 80
    resources:
      cpu: 0.5
      mem: 128
environments:
  staging:
    services:
      web:
        deployments:
          replicas: 3
"#;

    #[test]
    fn test_render_json_for_environment() {
        let file = descriptor(DOC);
        let text = render(file.path(), Some("staging"), Format::Json, true).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["services"]["web"]["deployments"]["replicas"], 3);
        assert_eq!(json["services"]["web"]["image"], "nginx");
        assert!(json.get("environments").is_none());
    }

    #[test]
    fn test_render_yaml_keeps_overlays() {
        let file = descriptor(DOC);
        let text = render(file.path(), None, Format::Yaml, true).unwrap();
        assert!(text.contains("staging"));
    }

    #[test]
    fn test_render_validation() {
        let file = descriptor("services:\n  web:\n    resources:\n      cpu: 0\n      mem: 1\n");
        assert!(render(file.path(), None, Format::Yaml, true).is_err());
        assert!(render(file.path(), None, Format::Yaml, false).is_ok());
    }
}
