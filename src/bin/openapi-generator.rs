//! Print the OpenAPI document of the HTTP API as pretty JSON.

use anyhow::Context;
use party_sync_back::services::documentation::ApiDoc;
use utoipa::OpenApi;

fn main() -> anyhow::Result<()> {
    let doc = ApiDoc::openapi();
    let json = doc.to_pretty_json().context("serialising OpenAPI document")?;
    println!("{json}");
    Ok(())
}
