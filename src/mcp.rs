use std::{str::FromStr, sync::Arc};

use chrono::{DateTime, Utc};
use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    error,
    indexer::IndexReport,
    models::{Domain, parse_published_at},
    search::{SearchFilters, SearchRequest, SearchResponse, SortMode},
    service::{DomainUpdate, Roadview},
};

#[derive(Clone)]
pub struct RoadviewMcpServer {
    service: Arc<Roadview>,
    tool_router: ToolRouter<Self>,
}

impl RoadviewMcpServer {
    pub fn new(service: Arc<Roadview>) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl RoadviewMcpServer {
    /// Rank indexed documents against a free-text query.
    #[tool(
        name = "roadview_search",
        description = "Search indexed documents by TF-IDF relevance. Supports bias, sourceType, domain, minCred and date filters, sort modes and pagination. Documents from noindex or blocked domains are never returned."
    )]
    pub async fn roadview_search(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let request = params.0.into_request()?;
        let response = self.service.search(&request);

        let summary = format_search_summary(&response, &request.query);
        let structured = serde_json::to_value(&response)
            .map_err(|e| mcp_error("failed to serialize search results", e))?;

        let mut result = CallToolResult::success(vec![Content::text(summary)]);
        result.structured_content = Some(structured);
        Ok(result)
    }

    /// Validate and index a batch of documents.
    #[tool(
        name = "roadview_index_bulk",
        description = "Index a batch of documents ({title, url, sourceType, content, bias?, publishedAt?, author?}). Invalid entries are rejected individually; documents from blocked domains are skipped."
    )]
    pub async fn roadview_index_bulk(
        &self,
        params: Parameters<IndexBulkParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let report = self
            .service
            .bulk_index_values(params.0.docs)
            .map_err(|e| mcp_error("indexing failed", e))?;

        let summary = format_index_summary(&report);
        let structured = serde_json::to_value(&report)
            .map_err(|e| mcp_error("failed to serialize index report", e))?;

        let mut result = CallToolResult::success(vec![Content::text(summary)]);
        result.structured_content = Some(structured);
        Ok(result)
    }

    /// Create or update a domain record.
    #[tool(
        name = "roadview_upsert_domain",
        description = "Create or update a domain. policy is index (default), noindex (stored but hidden from search) or block (never ingested; existing documents are removed). Omitted fields keep their current value."
    )]
    pub async fn roadview_upsert_domain(
        &self,
        params: Parameters<UpsertDomainParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let update = DomainUpdate {
            policy: parse_opt(params.policy.as_deref())?,
            bias: parse_opt(params.bias.as_deref())?,
            base_cred: params.base_cred.map(|c| c.min(100)),
            display_name: params.display_name,
        };

        let (domain, created) = self
            .service
            .update_domain(&params.domain, update)
            .map_err(|e| match e {
                error::Error::InvalidArgument(_) => invalid_params(e),
                other => mcp_error("domain upsert failed", other),
            })?;

        let verb = if created { "Created" } else { "Updated" };
        let summary = format!("{verb} domain {} ({})", domain.name, domain.policy);
        let structured = serde_json::to_value(UpsertDomainResponse {
            domain,
            created,
        })
        .map_err(|e| mcp_error("failed to serialize domain", e))?;

        let mut result = CallToolResult::success(vec![Content::text(summary)]);
        result.structured_content = Some(structured);
        Ok(result)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for RoadviewMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_server_info(
                Implementation::new("roadview", env!("CARGO_PKG_VERSION"))
                    .with_title("roadview MCP"),
            )
            .with_instructions(
                "Use roadview_index_bulk to add documents, roadview_search to rank them, and roadview_upsert_domain to hide or block a source.",
            )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Search query string.
    pub query: String,
    /// Only documents with this bias: left, center, right, na.
    pub bias: Option<String>,
    /// Only documents of this type: news, blog, gov, edu, wiki, forum, other.
    pub source_type: Option<String>,
    /// Only documents from this domain.
    pub domain: Option<String>,
    /// Minimum credibility score (0-100).
    pub min_cred: Option<u8>,
    /// Earliest publication date (RFC 3339 or YYYY-MM-DD).
    pub from: Option<String>,
    /// Latest publication date (RFC 3339 or YYYY-MM-DD).
    pub to: Option<String>,
    /// relevance (default), recency, credibility or domain.
    pub sort: Option<String>,
    /// Page number, starting at 1 (default: 1).
    pub page: Option<usize>,
    /// Results per page (default: 25).
    pub page_size: Option<usize>,
}

impl SearchParams {
    fn into_request(self) -> Result<SearchRequest, rmcp::ErrorData> {
        Ok(SearchRequest {
            filters: SearchFilters {
                bias: parse_opt(self.bias.as_deref())?,
                source_type: parse_opt(self.source_type.as_deref())?,
                domain: self.domain.filter(|d| !d.trim().is_empty()),
                min_cred: self.min_cred,
                from: parse_date(self.from.as_deref())?,
                to: parse_date(self.to.as_deref())?,
            },
            sort: parse_opt::<SortMode>(self.sort.as_deref())?
                .unwrap_or_default(),
            page: self.page,
            page_size: self.page_size,
            query: self.query,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IndexBulkParams {
    /// Documents to index.
    pub docs: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertDomainParams {
    /// Domain name (host), case-insensitive.
    pub domain: String,
    /// index, noindex or block.
    pub policy: Option<String>,
    /// Default bias for the domain's documents: left, center, right, na.
    pub bias: Option<String>,
    /// Credibility score (0-100) copied onto the domain's documents.
    pub base_cred: Option<u8>,
    /// Human-readable name.
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertDomainResponse {
    domain: Domain,
    created: bool,
}

fn parse_opt<T>(value: Option<&str>) -> Result<Option<T>, rmcp::ErrorData>
where
    T: FromStr<Err = error::Error>,
{
    value
        .filter(|v| !v.trim().is_empty())
        .map(str::parse)
        .transpose()
        .map_err(invalid_params)
}

fn parse_date(
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, rmcp::ErrorData> {
    match value.filter(|v| !v.trim().is_empty()) {
        None => Ok(None),
        Some(raw) => parse_published_at(raw).map(Some).ok_or_else(|| {
            rmcp::ErrorData::invalid_params(
                format!("unrecognized date: {raw}"),
                None,
            )
        }),
    }
}

fn format_search_summary(response: &SearchResponse, query: &str) -> String {
    if response.results.is_empty() {
        return format!("No results found for \"{query}\"");
    }

    let mut lines = Vec::with_capacity(response.results.len() + 1);
    let suffix = if response.meta.total == 1 { "" } else { "s" };
    lines.push(format!(
        "Found {} result{} for \"{query}\" (page {}):",
        response.meta.total, suffix, response.meta.page
    ));

    for r in &response.results {
        lines.push(format!("#{} {:.3} {} {}", r.id, r.score, r.url, r.title));
    }

    lines.join("\n")
}

fn format_index_summary(report: &IndexReport) -> String {
    let mut lines = vec![format!(
        "Indexed {}, blocked {}, rejected {}",
        report.indexed,
        report.blocked,
        report.rejected.len()
    )];
    for rejection in &report.rejected {
        lines.push(format!("  [{}] {}", rejection.position, rejection.reason));
    }
    lines.join("\n")
}

fn invalid_params(error: error::Error) -> rmcp::ErrorData {
    rmcp::ErrorData::invalid_params(error.to_string(), None)
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

pub fn run_mcp(service: Roadview) -> error::Result<()> {
    let server = RoadviewMcpServer::new(Arc::new(service));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        let transport = rmcp::transport::stdio();
        let running = server.serve(transport).await.map_err(|e| {
            error::Error::Config(format!(
                "MCP server initialization failed: {e}"
            ))
        })?;
        running.waiting().await.map_err(|e| {
            error::Error::Config(format!("MCP server error: {e}"))
        })?;
        Ok(())
    })
}
