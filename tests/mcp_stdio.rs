use std::path::{Path, PathBuf};

use rmcp::{
    ServiceExt,
    model::CallToolRequestParams,
    transport::{ConfigureCommandExt, TokioChildProcess},
};
use roadview::{DocumentInput, Roadview, SourceType, StoreDb};
use serde_json::json;

fn setup_fixture(data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = StoreDb::open(&data_dir.join("roadview.redb"))?;
    let service = Roadview::open(store)?;
    service.bulk_index(&[
        DocumentInput::new(
            "Hello",
            "https://notes.example/hello",
            SourceType::Blog,
            "Hello world from the notes blog",
        ),
        DocumentInput::new(
            "Weather",
            "https://weather.example/today",
            SourceType::News,
            "Sunny with light wind",
        ),
    ])?;
    Ok(())
}

fn call(
    name: &str,
    args: serde_json::Value,
) -> CallToolRequestParams {
    let mut params = CallToolRequestParams::new(name.to_string());
    params.arguments = args.as_object().cloned();
    params
}

#[tokio::test]
async fn mcp_stdio_search_roundtrip() -> Result<(), Box<dyn std::error::Error>>
{
    let tempdir = tempfile::tempdir()?;
    setup_fixture(tempdir.path())?;

    let bin = roadview_bin()?;
    let transport = TokioChildProcess::new(
        tokio::process::Command::new(bin).configure(|cmd| {
            cmd.arg("mcp").env("ROADVIEW_DATA_DIR", tempdir.path());
        }),
    )?;

    let client = ().serve(transport).await?;

    let result = client
        .peer()
        .call_tool(call("roadview_search", json!({ "query": "hello world" })))
        .await?;

    let structured = result.structured_content.expect("structured content");
    let results = structured
        .get("results")
        .and_then(|v| v.as_array())
        .expect("results array");
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].get("url").and_then(|v| v.as_str()),
        Some("https://notes.example/hello")
    );

    let upsert = client
        .peer()
        .call_tool(call(
            "roadview_upsert_domain",
            json!({ "domain": "notes.example", "policy": "noindex" }),
        ))
        .await?;
    let upserted = upsert.structured_content.expect("structured content");
    assert_eq!(upserted["domain"]["policy"], "noindex");

    let hidden = client
        .peer()
        .call_tool(call("roadview_search", json!({ "query": "hello world" })))
        .await?;
    let hidden = hidden.structured_content.expect("structured content");
    assert_eq!(hidden["meta"]["total"], 0);

    let indexed = client
        .peer()
        .call_tool(call(
            "roadview_index_bulk",
            json!({
                "docs": [
                    {
                        "title": "Storm",
                        "url": "https://weather.example/storm",
                        "sourceType": "news",
                        "content": "Storm warning with strong wind"
                    },
                    { "title": "Broken", "url": "ftp:" }
                ]
            }),
        ))
        .await?;
    let report = indexed.structured_content.expect("structured content");
    assert_eq!(report["indexed"], 1);
    assert_eq!(report["rejected"][0]["position"], 1);

    let wind = client
        .peer()
        .call_tool(call(
            "roadview_search",
            json!({ "query": "wind", "sort": "domain", "pageSize": 1 }),
        ))
        .await?;
    let wind = wind.structured_content.expect("structured content");
    assert_eq!(wind["meta"]["total"], 2);
    assert_eq!(wind["results"].as_array().map(Vec::len), Some(1));
    assert_eq!(wind["facets"]["domains"]["weather.example"], 2);

    client.cancel().await?;
    Ok(())
}

fn roadview_bin() -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Ok(bin) = std::env::var("CARGO_BIN_EXE_roadview") {
        return Ok(PathBuf::from(bin));
    }

    let mut path = std::env::current_exe()?;
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("roadview");

    if cfg!(windows) {
        path.set_extension("exe");
    }

    Ok(path)
}
