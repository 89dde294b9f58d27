//! MCP service implementation using rmcp.
//!
//! This module defines the VerticaService struct with the eight Vertica tools
//! exposed via the MCP protocol using the rmcp framework's macros, plus the
//! schema resources.

use crate::config::Config;
use crate::db::QueryBackend;
use crate::error::DbError;
use crate::mcp::resources;
use crate::tools::explain::{ExplainInput, ExplainOutput, ExplainToolHandler};
use crate::tools::export::{ExportInput, ExportOutput, ExportToolHandler};
use crate::tools::query::{ExecuteQueryInput, ExecuteQueryOutput, QueryToolHandler};
use crate::tools::samples::{SampleQueriesInput, SampleQueriesOutput, SampleQueryToolHandler};
use crate::tools::schema::{
    DescribeTableInput, DescribeTableOutput, ListProjectionsInput, ListProjectionsOutput,
    ListTablesInput, ListTablesOutput, ListViewsInput, ListViewsOutput, SchemaToolHandler,
};
use crate::tools::sql_guard::SqlGuard;
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::{ToolCallContext, ToolRouter},
    handler::server::wrapper::Parameters,
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListResourcesResult,
        ListToolsResult, PaginatedRequestParam, ProtocolVersion, ReadResourceRequestParam,
        ReadResourceResult, ResourceContents, ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SERVER_NAME: &str = "vertica-mcp-server";

#[derive(Clone)]
pub struct VerticaService {
    backend: Arc<dyn QueryBackend>,
    /// Statement guard holding the default limit and whitelist
    guard: Arc<SqlGuard>,
    max_rows_export: u32,
    tool_router: ToolRouter<Self>,
}

impl VerticaService {
    pub fn new(backend: Arc<dyn QueryBackend>, guard: SqlGuard, max_rows_export: u32) -> Self {
        Self {
            backend,
            guard: Arc::new(guard),
            max_rows_export,
            tool_router: Self::tool_router(),
        }
    }

    /// Build the service from limits and whitelists in the configuration.
    pub fn from_config(backend: Arc<dyn QueryBackend>, config: &Config) -> Self {
        let guard = SqlGuard::new(config.query_limit_size, config.whitelist());
        Self::new(backend, guard, config.max_rows_export)
    }

    /// Release the database connection.
    pub async fn shutdown(&self) {
        info!("Closing database connection");
        self.backend.close().await;
    }

    fn schema_handler(&self) -> SchemaToolHandler {
        SchemaToolHandler::new(self.backend.clone(), self.guard.clone())
    }
}

#[tool_router]
impl VerticaService {
    #[tool(
        description = "Execute a read-only SQL query against Vertica.\nOnly SELECT, WITH ... SELECT, DESCRIBE and EXPLAIN are accepted; one statement per call.\nA LIMIT is appended when the query has none (default QUERY_LIMIT_SIZE, max 10000)."
    )]
    async fn execute_query(
        &self,
        Parameters(input): Parameters<ExecuteQueryInput>,
    ) -> Result<Json<ExecuteQueryOutput>, McpError> {
        QueryToolHandler::new(self.backend.clone(), self.guard.clone())
            .execute_query(input)
            .await
            .map(Json)
            .map_err(|e: DbError| e.into())
    }

    #[tool(
        description = "Describe a table's columns in declared order: name, type, nullability, default, length, precision and scale.\nAccepts `schema.table` or a separate schema_name."
    )]
    async fn describe_table(
        &self,
        Parameters(input): Parameters<DescribeTableInput>,
    ) -> Result<Json<DescribeTableOutput>, McpError> {
        self.schema_handler()
            .describe_table(input)
            .await
            .map(Json)
            .map_err(|e: DbError| e.into())
    }

    #[tool(
        description = "List user tables with type, estimated row count, storage size and comment.\nCan filter by schema_name."
    )]
    async fn list_tables(
        &self,
        Parameters(input): Parameters<ListTablesInput>,
    ) -> Result<Json<ListTablesOutput>, McpError> {
        self.schema_handler()
            .list_tables(input)
            .await
            .map(Json)
            .map_err(|e: DbError| e.into())
    }

    #[tool(description = "List user views with their definitions.\nCan filter by schema_name.")]
    async fn list_views(
        &self,
        Parameters(input): Parameters<ListViewsInput>,
    ) -> Result<Json<ListViewsOutput>, McpError> {
        self.schema_handler()
            .list_views(input)
            .await
            .map(Json)
            .map_err(|e: DbError| e.into())
    }

    #[tool(
        description = "List Vertica projections: anchor table, sort order, segmentation, super-projection and up-to-date flags, statistics, created epoch and fault tolerance.\nCan filter by schema_name."
    )]
    async fn list_projections(
        &self,
        Parameters(input): Parameters<ListProjectionsInput>,
    ) -> Result<Json<ListProjectionsOutput>, McpError> {
        self.schema_handler()
            .list_projections(input)
            .await
            .map(Json)
            .map_err(|e: DbError| e.into())
    }

    #[tool(
        description = "Show the Vertica execution plan for a SELECT query without running it.\nReturns the plan text as printed by EXPLAIN."
    )]
    async fn explain_query(
        &self,
        Parameters(input): Parameters<ExplainInput>,
    ) -> Result<Json<ExplainOutput>, McpError> {
        ExplainToolHandler::new(self.backend.clone(), self.guard.clone())
            .explain(input)
            .await
            .map(Json)
            .map_err(|e: DbError| e.into())
    }

    #[tool(
        description = "Generate ready-to-run exploration queries for a table: preview, row count and per-column statistics for the first five columns."
    )]
    async fn generate_sample_queries(
        &self,
        Parameters(input): Parameters<SampleQueriesInput>,
    ) -> Result<Json<SampleQueriesOutput>, McpError> {
        let schema = self.schema_handler();
        SampleQueryToolHandler::new(&schema)
            .generate(input)
            .await
            .map(Json)
            .map_err(|e: DbError| e.into())
    }

    #[tool(
        description = "Export the results of a read-only query as JSON (default) or CSV.\nResults are capped at MAX_ROWS_EXPORT rows; `truncated` tells whether rows were dropped."
    )]
    async fn export_query_results(
        &self,
        Parameters(input): Parameters<ExportInput>,
    ) -> Result<Json<ExportOutput>, McpError> {
        ExportToolHandler::new(
            self.backend.clone(),
            self.guard.clone(),
            self.max_rows_export,
        )
        .export(input)
        .await
        .map(Json)
        .map_err(|e: DbError| e.into())
    }
}

impl ServerHandler for VerticaService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: SERVER_NAME.to_owned(),
                title: Some("Vertica MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Read-only tools for exploring a Vertica database.\n\
                \n\
                ## Workflow\n\
                1. Call `list_tables` (or read `vertica://schema/overview`) to see what is available\n\
                2. Call `describe_table` or `generate_sample_queries` for a table of interest\n\
                3. Run queries with `execute_query`; use `explain_query` to check expensive ones\n\
                4. Use `export_query_results` for larger JSON or CSV extracts\n\
                \n\
                ## Rules\n\
                - Only SELECT, WITH ... SELECT, DESCRIBE and EXPLAIN are accepted, one statement per call\n\
                - A LIMIT is appended to queries that have none\n\
                - Tables and columns may be restricted by a whitelist\n\
                \n\
                ## Vertica Notes\n\
                - Tables are backed by projections; `list_projections` shows sort order and segmentation\n\
                - System catalogs live in `v_catalog` and `v_monitor`"
                    .to_string(),
            ),
        }
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        if !self.tool_router.has_route(request.name.as_ref()) {
            warn!(tool = %request.name, "Unknown tool requested");
            return Err(DbError::unknown_tool(request.name.as_ref()).into());
        }
        debug!(tool = %request.name, "Calling tool");
        let tcc = ToolCallContext::new(self, request, context);
        self.tool_router.call(tcc).await
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.tool_router.list_all()))
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let resources = resources::build_resource_list(&self.schema_handler()).await?;
        Ok(ListResourcesResult::with_all_items(resources))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let text = resources::read_resource(&self.schema_handler(), &request.uri).await?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, request.uri)],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbResult;
    use crate::models::QueryResult;
    use futures_util::FutureExt;
    use futures_util::future::BoxFuture;

    struct NoopBackend;

    impl QueryBackend for NoopBackend {
        fn fetch<'a>(
            &'a self,
            _sql: &'a str,
            _max_rows: usize,
        ) -> BoxFuture<'a, DbResult<QueryResult>> {
            async { Ok(QueryResult::empty(0)) }.boxed()
        }

        fn close(&self) -> BoxFuture<'_, ()> {
            async {}.boxed()
        }
    }

    fn create_test_service() -> VerticaService {
        VerticaService::from_config(Arc::new(NoopBackend), &Config::default_config())
    }

    #[test]
    fn test_server_info() {
        let service = create_test_service();
        let info = service.get_info();
        assert_eq!(info.server_info.name, SERVER_NAME);
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_some());
    }

    #[test]
    fn test_all_tools_are_routed() {
        let service = create_test_service();
        let mut names: Vec<String> = service
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "describe_table",
                "execute_query",
                "explain_query",
                "export_query_results",
                "generate_sample_queries",
                "list_projections",
                "list_tables",
                "list_views",
            ]
        );
        assert!(!service.tool_router.has_route("drop_table"));
    }
}
