//! MCP Server Implementation
//!
//! This module contains the core MCP server implementation including:
//! - JSON-RPC 2.0 request/response structures
//! - The `Tool` trait and the registry that dispatches to tools
//! - STDIO server implementation for line-based communication
//! - HTTP server setup with Actix Web
//! - Request handlers for MCP protocol methods

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use actix_web::{
    middleware::{Compress, DefaultHeaders, Logger},
    web, App, HttpResponse, HttpServer,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use crate::core::reply::ToolReply;
use crate::core::utils::{ServerConfig, TransportMode};

/// MCP protocol revision announced in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC error codes used by the server.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Server metadata reported in `initialize` responses.
#[derive(Clone, Debug)]
pub struct AppState {
    pub server_name: String,
    pub server_version: String,
}

/// JSON-RPC 2.0 request structure for MCP protocol.
///
/// `id` is `None` for notifications, which never get a response.
#[derive(Deserialize, Debug)]
pub struct MCPRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response structure for MCP protocol.
#[derive(Serialize, Debug)]
pub struct MCPResponse {
    jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MCPError>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Serialize, Debug)]
pub struct MCPError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl MCPResponse {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(MCPError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// MCP tool definition, as listed by `tools/list`.
#[derive(Serialize, Debug, Clone)]
pub struct MCPTool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// A named operation exposed to the calling agent.
///
/// Arguments are validated into `Params` at the transport boundary; `handle`
/// only ever sees well-formed input and always produces a reply, folding any
/// downstream failure into an error reply.
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    type Params: DeserializeOwned + Send;

    /// Name, description and JSON schema.
    fn definition(&self) -> MCPTool;

    /// Turn raw JSON arguments into typed parameters.
    fn validate(&self, arguments: Value) -> Result<Self::Params, String> {
        serde_json::from_value(arguments).map_err(|e| format!("Invalid arguments: {e}"))
    }

    async fn handle(&self, params: Self::Params) -> ToolReply;
}

/// Type-erased tool as stored in the registry.
///
/// `Err` means the arguments failed validation; tool failures are replies.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> Result<ToolReply, String>;
}

#[async_trait]
impl<T: Tool> ToolHandler for T {
    async fn call(&self, arguments: Value) -> Result<ToolReply, String> {
        let params = self.validate(arguments)?;
        Ok(self.handle(params).await)
    }
}

/// Registry of available MCP tools.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Default)]
pub struct ToolRegistry {
    /// Definitions in registration order (for tools/list)
    tools: Vec<MCPTool>,
    /// Tool name to handler (for tools/call)
    handlers: HashMap<String, Box<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A second tool with an existing name is ignored.
    pub fn register<T: Tool>(&mut self, tool: T) {
        let definition = tool.definition();
        if self.handlers.contains_key(&definition.name) {
            warn!(tool = %definition.name, "Duplicate tool name, keeping first registration");
            return;
        }
        self.handlers
            .insert(definition.name.clone(), Box::new(tool));
        self.tools.push(definition);
    }

    pub fn tools(&self) -> &[MCPTool] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.handlers.get(name).map(|h| h.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Route one JSON-RPC request to its method handler.
///
/// Returns `None` for notifications.
pub async fn handle_request(
    state: &AppState,
    registry: &ToolRegistry,
    req: MCPRequest,
) -> Option<MCPResponse> {
    let Some(id) = req.id else {
        debug!(method = %req.method, "Notification received");
        return None;
    };
    let id = Some(id);

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(state, id),
        "ping" => MCPResponse::success(id, json!({})),
        "tools/list" => handle_tools_list(registry, id),
        "tools/call" => handle_tools_call(registry, id, req.params).await,
        _ => MCPResponse::failure(
            id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };
    Some(response)
}

/// Handle MCP initialize method.
fn handle_initialize(state: &AppState, id: Option<Value>) -> MCPResponse {
    MCPResponse::success(
        id,
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": state.server_name,
                "version": state.server_version
            }
        }),
    )
}

/// Handle MCP tools/list method.
fn handle_tools_list(registry: &ToolRegistry, id: Option<Value>) -> MCPResponse {
    MCPResponse::success(id, json!({ "tools": registry.tools() }))
}

/// Handle MCP tools/call method.
///
/// Validation failures become JSON-RPC `Invalid params` errors; anything the
/// tool itself reports comes back as a normal result with `isError` set.
async fn handle_tools_call(
    registry: &ToolRegistry,
    id: Option<Value>,
    params: Option<Value>,
) -> MCPResponse {
    let Some(tool_params) = params else {
        return MCPResponse::failure(id, error_codes::INVALID_PARAMS, "Invalid params");
    };

    let tool_name = tool_params
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    // Missing or null arguments mean "no arguments"
    let arguments = match tool_params.get("arguments") {
        None | Some(Value::Null) => json!({}),
        Some(args) => args.clone(),
    };

    let Some(handler) = registry.get(tool_name) else {
        return MCPResponse::failure(
            id,
            error_codes::METHOD_NOT_FOUND,
            format!("Unknown tool: {tool_name}"),
        );
    };

    debug!(tool = %tool_name, "Calling tool");
    match handler.call(arguments).await {
        Ok(reply) => match serde_json::to_value(&reply) {
            Ok(result) => MCPResponse::success(id, result),
            Err(e) => {
                error!(tool = %tool_name, error = %e, "Failed to serialize tool reply");
                MCPResponse::failure(id, error_codes::INTERNAL_ERROR, e.to_string())
            }
        },
        Err(message) => {
            warn!(tool = %tool_name, error = %message, "Rejected tool arguments");
            MCPResponse::failure(id, error_codes::INVALID_PARAMS, message)
        }
    }
}

/// Handle one raw input line. Returns the serialized response, if any.
pub async fn handle_line(state: &AppState, registry: &ToolRegistry, line: &str) -> Option<String> {
    let response = match serde_json::from_str::<MCPRequest>(line) {
        Ok(req) => handle_request(state, registry, req).await?,
        Err(e) => {
            warn!(error = %e, "Parse error");
            // Only answer when an id can be recovered from the line
            let partial = serde_json::from_str::<Value>(line).ok()?;
            let id = partial.get("id")?.clone();
            MCPResponse::failure(
                Some(id),
                error_codes::PARSE_ERROR,
                format!("Parse error: {e}"),
            )
        }
    };

    match serde_json::to_string(&response) {
        Ok(json) => Some(json),
        Err(e) => {
            error!(error = %e, "Error serializing response");
            None
        }
    }
}

/// Serve line-delimited JSON-RPC from `reader` to `writer` until EOF.
///
/// Requests are processed one at a time; each response is written on its own
/// line and flushed immediately.
pub async fn serve_lines<R, W>(
    reader: R,
    mut writer: W,
    state: &AppState,
    registry: &ToolRegistry,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(response) = handle_line(state, registry, &line).await {
            writer.write_all(response.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }

    Ok(())
}

/// Run the MCP server in STDIO mode.
///
/// Reads JSON-RPC requests line-by-line from stdin and writes responses to
/// stdout. All logging goes elsewhere so the protocol stream stays clean.
pub async fn run_server_stdio(state: AppState, registry: Arc<ToolRegistry>) -> std::io::Result<()> {
    use tokio::io::{BufReader, BufWriter};

    info!(
        name = %state.server_name,
        version = %state.server_version,
        tools = registry.len(),
        "MCP server starting (STDIO mode)"
    );

    let stdin = BufReader::with_capacity(8192, tokio::io::stdin());
    let stdout = BufWriter::with_capacity(8192, tokio::io::stdout());

    let result = serve_lines(stdin, stdout, &state, &registry).await;
    info!("STDIO input closed, shutting down");
    result
}

/// Health check endpoint handler.
async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": state.server_name
    }))
}

/// Request counter for monitoring.
async fn metrics_handler(counter: web::Data<AtomicU64>) -> HttpResponse {
    let count = counter.load(Ordering::Relaxed);
    HttpResponse::Ok().json(json!({
        "requests_total": count,
        "status": "ok"
    }))
}

/// MCP JSON-RPC request handler for HTTP mode.
async fn mcp_handler(
    state: web::Data<AppState>,
    registry: web::Data<ToolRegistry>,
    counter: web::Data<AtomicU64>,
    req: web::Json<MCPRequest>,
) -> HttpResponse {
    counter.fetch_add(1, Ordering::Relaxed);

    match handle_request(&state, &registry, req.into_inner()).await {
        Some(response) => HttpResponse::Ok().json(response),
        None => HttpResponse::Accepted().finish(),
    }
}

/// Routes served in HTTP mode. Expects `AppState`, `ToolRegistry` and the
/// `AtomicU64` request counter as app data.
fn mcp_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics_handler))
        .route("/mcp", web::post().to(mcp_handler))
        .route("/", web::post().to(mcp_handler))
        .route("/", web::get().to(health));
}

/// Run the MCP server in HTTP mode.
///
/// `POST /mcp` (and `POST /`) take one JSON-RPC request per call.
pub async fn run_server_http(
    state: AppState,
    registry: Arc<ToolRegistry>,
    host: String,
    port: u16,
    workers: usize,
) -> std::io::Result<()> {
    use std::time::Duration;

    let bind_addr = format!("{host}:{port}");

    info!(
        name = %state.server_name,
        version = %state.server_version,
        bind = %bind_addr,
        workers,
        "MCP server starting (HTTP mode)"
    );

    let app_state = web::Data::new(state);
    let tool_registry = web::Data::from(registry);
    let request_count = web::Data::new(AtomicU64::new(0));

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(tool_registry.clone())
            .app_data(request_count.clone())
            .wrap(Compress::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY")),
            )
            // %r = request line, %s = status, %Dms = duration
            .wrap(Logger::new("%r %s %Dms"))
            .configure(mcp_routes)
    })
    .workers(workers)
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_secs(30))
    .shutdown_timeout(10)
    .bind(&bind_addr)?
    .run()
    .await
}

/// Start the configured transport(s) and serve until they stop.
pub async fn run(config: ServerConfig, registry: ToolRegistry) -> std::io::Result<()> {
    let state = AppState {
        server_name: config.name.clone(),
        server_version: config.version.clone(),
    };
    let registry = Arc::new(registry);

    match config.transport {
        TransportMode::Stdio => run_server_stdio(state, registry).await,
        TransportMode::Http => {
            run_server_http(state, registry, config.host, config.port, config.workers).await
        }
        TransportMode::Both => {
            let stdio_state = state.clone();
            let stdio_registry = Arc::clone(&registry);

            // STDIO in the background, HTTP in the foreground
            let stdio_handle = tokio::spawn(async move {
                if let Err(e) = run_server_stdio(stdio_state, stdio_registry).await {
                    error!(error = %e, "STDIO server error");
                }
            });

            let http_result =
                run_server_http(state, registry, config.host, config.port, config.workers).await;
            stdio_handle.abort();
            http_result
        }
    }
}
