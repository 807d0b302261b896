//! MCP Server implementation
//!
//! Binds the dispatcher to MCP tools on stdio. Every tool answers with a JSON
//! document; failures are mapped by error class so that bad input, unknown
//! servers and transport problems stay distinguishable for the caller.

use std::sync::Arc;

use rmcp::{
    handler::server::ServerHandler,
    model::*,
    service::{RequestContext, RoleServer},
    ErrorData as McpError,
};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::directory::ServerDirectory;
use crate::dispatch::{Connector, ConnectivityRequest, Dispatcher};
use crate::error::{ConsoleError, ErrorBody, ErrorClass, Result};
use crate::tools::{
    ConnectivityTestParams, ListServersParams, ServerParams, ServiceOperationParams,
    ServiceStatusParams, TailLogParams,
};

type ToolResult<T = CallToolResult> = std::result::Result<T, McpError>;

/// Operations console MCP server
#[derive(Clone)]
pub struct ConsoleServer {
    config: Config,
    dispatcher: Arc<Dispatcher>,
}

impl ConsoleServer {
    pub fn new(
        config: Config,
        directory: Arc<dyn ServerDirectory>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let dispatcher = Dispatcher::new(directory, connector)
            .with_settle(config.settle)
            .with_max_chars(config.max_chars);
        Self {
            config,
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Sessions are per request, so there is nothing long-lived to release
    pub async fn shutdown(&self) {
        info!("Shutting down operations console...");
    }

    /// Explicit server id, or the configured default
    fn server_id(&self, requested: Option<String>) -> Result<String> {
        requested
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| self.config.default_server.clone())
            .ok_or_else(|| {
                ConsoleError::invalid_params("server_id is required (no default server configured)")
            })
    }

    async fn call(&self, name: &str, args: JsonObject) -> Result<CallToolResult> {
        match name {
            "service-status" => {
                let p: ServiceStatusParams = parse(args)?;
                let server = self.server_id(p.server_id)?;
                let report = self.dispatcher.status(&server, &p.service_id).await?;
                Ok(respond(&report, report.success))
            }
            "service-operation" => {
                let p: ServiceOperationParams = parse(args)?;
                let operation = p.operation()?;
                let server = self.server_id(p.server_id)?;
                let report = self
                    .dispatcher
                    .operation(&server, &p.service_id, operation)
                    .await?;
                Ok(respond(&report, report.success))
            }
            "connectivity-test" => {
                let p: ConnectivityTestParams = parse(args)?;
                let server = self.server_id(p.server_id)?;
                let request = ConnectivityRequest {
                    service_id: p.service_id,
                    port: p.port,
                    health_check_url: p.health_check_url,
                    check_command: p.check_command,
                };
                let report = self.dispatcher.connectivity_test(&server, &request).await?;
                // A failed probe is a result, not a tool error
                Ok(respond(&report, true))
            }
            "test-connection" => {
                let p: ServerParams = parse(args)?;
                let server = self.server_id(p.server_id)?;
                let result = self.dispatcher.test_connection(&server).await?;
                Ok(respond(&result, result.success))
            }
            "list-servers" => {
                let _: ListServersParams = parse(args)?;
                Ok(respond(&self.dispatcher.list_servers(), true))
            }
            "tail-log" => {
                let p: TailLogParams = parse(args)?;
                let server = self.server_id(p.server_id)?;
                let tail = self
                    .dispatcher
                    .tail_log(&server, &p.service_id, p.lines)
                    .await?;
                Ok(respond(&tail, tail.success))
            }
            _ => Err(ConsoleError::invalid_params(format!("Unknown tool: {}", name))),
        }
    }

    fn tools() -> Vec<Tool> {
        vec![
            tool::<ServiceStatusParams>(
                "service-status",
                "Check whether a service is running on a managed server. Returns {success, status, output, error}; status is running, stopped or error.",
            ),
            tool::<ServiceOperationParams>(
                "service-operation",
                "Start, stop or restart a service on a managed server, then report its status after a short settle delay.",
            ),
            tool::<ConnectivityTestParams>(
                "connectivity-test",
                "Probe a service's port, process and HTTP health URL from the target host. HTTP 404 is reported as a warning, not a failure.",
            ),
            tool::<ServerParams>(
                "test-connection",
                "Open an SSH session to a server and run an identity probe (whoami && hostname).",
            ),
            tool::<ListServersParams>(
                "list-servers",
                "List servers in the directory. Credentials are never included.",
            ),
            tool::<TailLogParams>(
                "tail-log",
                "Show the last lines of a service's start log on a managed server.",
            ),
        ]
    }
}

/// Build a tool definition with a schema derived from its parameters
fn tool<P: JsonSchema>(name: &'static str, description: &'static str) -> Tool {
    let schema = serde_json::to_value(schemars::schema_for!(P)).unwrap_or_default();

    // Convert Value to JsonObject (Map<String, Value>)
    let schema_obj = schema.as_object().cloned().unwrap_or_default();

    Tool::new(name, description, Arc::new(schema_obj))
}

fn parse<P: DeserializeOwned>(args: JsonObject) -> Result<P> {
    serde_json::from_value(serde_json::Value::Object(args))
        .map_err(|e| ConsoleError::invalid_params(e.to_string()))
}

fn respond<T: Serialize>(value: &T, success: bool) -> CallToolResult {
    let text = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"unserialisable result: {}\"}}", e));
    if success {
        CallToolResult::success(vec![Content::text(text)])
    } else {
        CallToolResult::error(vec![Content::text(text)])
    }
}

/// Map a failure onto the protocol by its class
fn into_tool_result(err: ConsoleError) -> ToolResult {
    let body = ErrorBody::from(&err);
    let data = serde_json::to_value(&body).ok();
    match err.kind().class() {
        ErrorClass::Client => Err(McpError::invalid_params(body.error, data)),
        ErrorClass::NotFound => Err(McpError::resource_not_found(body.error, data)),
        ErrorClass::Server => {
            error!("Tool call failed ({}): {}", body.kind.as_str(), body.error);
            Ok(respond(&body, false))
        }
    }
}

impl ServerHandler for ConsoleServer {
    /// Return server information
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(format!(
                "Operations console v{} - service status and control over SSH (default server: {})",
                env!("CARGO_PKG_VERSION"),
                self.config.default_server.as_deref().unwrap_or("none"),
            )),
        }
    }

    /// List available tools
    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> ToolResult<ListToolsResult> {
        debug!("list_tools called");

        Ok(ListToolsResult {
            tools: Self::tools(),
            next_cursor: None,
            meta: Default::default(),
        })
    }

    /// Call a tool
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> ToolResult {
        let tool_name: &str = request.name.as_ref();
        debug!("call_tool called: {:?}", tool_name);

        let args = request.arguments.unwrap_or_default();
        match self.call(tool_name, args).await {
            Ok(result) => Ok(result),
            Err(e) => into_tool_result(e),
        }
    }
}
