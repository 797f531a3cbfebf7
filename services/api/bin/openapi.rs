//! Writes the relay's OpenAPI document to disk.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use utoipa::OpenApi;
use voicewidget_api::router::ApiDoc;

#[derive(Parser, Debug)]
#[clap(name = "openapi", about = "Export the voice widget relay OpenAPI document")]
struct Cli {
    /// Where to write the document.
    #[clap(default_value = "openapi.json")]
    output: PathBuf,
}

fn write_document(api_doc: utoipa::openapi::OpenApi, path: &Path) -> anyhow::Result<()> {
    let json = api_doc
        .to_pretty_json()
        .context("Failed to serialize OpenAPI document")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    write_document(ApiDoc::openapi(), &cli.output)?;
    println!("Wrote {}", cli.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_agent_routes() {
        let dir = std::env::temp_dir().join(format!("voicewidget-openapi-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("openapi.json");

        write_document(ApiDoc::openapi(), &path).unwrap();
        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(doc["paths"]["/api/agent/{agent_id}"].is_object());
        assert!(doc["paths"]["/api/agent/{agent_id}/connect"].is_object());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_output_defaults_to_openapi_json() {
        let cli = Cli::try_parse_from(["openapi"]).unwrap();
        assert_eq!(cli.output, PathBuf::from("openapi.json"));
        let cli = Cli::try_parse_from(["openapi", "docs/api.json"]).unwrap();
        assert_eq!(cli.output, PathBuf::from("docs/api.json"));
    }
}
