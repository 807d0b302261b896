//! MCP tool parameters
//!
//! One struct per tool. The JSON Schema advertised in `list_tools` is derived
//! from these, and `call_tool` deserialises arguments into them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::services::Operation;

/// Parameters for the service-status tool
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ServiceStatusParams {
    /// Server id from the directory; defaults to the configured server
    #[serde(default)]
    pub server_id: Option<String>,

    /// Service identifier, e.g. `vue-frontend`, `postgres-main`, `systemd:redis-server`
    pub service_id: String,
}

/// Parameters for the service-operation tool
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ServiceOperationParams {
    #[serde(default)]
    pub server_id: Option<String>,

    pub service_id: String,

    /// One of `start`, `stop`, `restart`
    pub operation: String,
}

impl ServiceOperationParams {
    pub fn operation(&self) -> crate::error::Result<Operation> {
        self.operation.parse()
    }
}

/// Parameters for the connectivity-test tool
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ConnectivityTestParams {
    #[serde(default)]
    pub server_id: Option<String>,

    pub service_id: String,

    /// Port expected to be listening; defaults to the service's own
    #[serde(default)]
    pub port: Option<u16>,

    /// URL fetched from the target host; 2xx/3xx pass, 404 warns
    #[serde(default)]
    pub health_check_url: Option<String>,

    /// Custom check: running iff exit status 0 and no `NOT_RUNNING` in output
    #[serde(default)]
    pub check_command: Option<String>,
}

/// Parameters for tools that only name a server
#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct ServerParams {
    #[serde(default)]
    pub server_id: Option<String>,
}

/// Parameters for the tail-log tool
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct TailLogParams {
    #[serde(default)]
    pub server_id: Option<String>,

    pub service_id: String,

    /// Number of lines, 1 to 2000 (default 200)
    #[serde(default)]
    pub lines: Option<u32>,
}

/// Parameters for the list-servers tool
#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct ListServersParams {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_params_server_optional() {
        let params: ServiceStatusParams =
            serde_json::from_str(r#"{"service_id": "vue-frontend"}"#).unwrap();
        assert_eq!(params.service_id, "vue-frontend");
        assert!(params.server_id.is_none());
    }

    #[test]
    fn test_operation_params_parse() {
        let params: ServiceOperationParams = serde_json::from_str(
            r#"{"server_id": "prod", "service_id": "celery", "operation": "Restart"}"#,
        )
        .unwrap();
        assert_eq!(params.operation().unwrap(), Operation::Restart);
    }

    #[test]
    fn test_connectivity_params() {
        let params: ConnectivityTestParams = serde_json::from_str(
            r#"{"service_id": "vue-frontend", "port": 3002, "health_check_url": "http://127.0.0.1:3002/"}"#,
        )
        .unwrap();
        assert_eq!(params.port, Some(3002));
        assert!(params.check_command.is_none());
    }

    #[test]
    fn test_port_out_of_range_rejected() {
        let result: Result<ConnectivityTestParams, _> =
            serde_json::from_str(r#"{"service_id": "x", "port": 70000}"#);
        assert!(result.is_err());
    }
}
