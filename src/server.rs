//! The plugin server.
//!
//! [`ProviderService`] is the provider-side API, in plain Rust types. [`serve`]
//! exposes an implementation over the gRPC plugin protocol: it binds a local
//! port, prints the handshake line `ZIA_PROVIDER|<version>|<address>` on
//! stdout, and serves until SIGTERM or SIGINT.
//!
//! # Wire conventions
//!
//! Configuration and state travel as JSON bytes. Empty bytes decode to
//! `Null`; bytes that are not JSON are rejected with an error diagnostic. A
//! `Null` state encodes to empty bytes, which on Read tells the runtime the
//! object is gone.
//!
//! # Shutdown
//!
//! On a signal the server stops accepting connections and gives in-flight
//! requests [`ServeOptions::shutdown_timeout`] to finish. The provider's
//! `stop()` runs last.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated;
use crate::schema::{Block, BlockNestingMode, Diagnostic, DiagnosticSeverity, ProviderSchema, Schema};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata, HANDSHAKE_PREFIX, PROTOCOL_VERSION};

/// Operations a provider implements.
///
/// Methods with defaults are optional; a provider without data sources or
/// import support can leave them alone.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// The provider's schema, including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Registered type names and capabilities. Derived from the schema by
    /// default.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.keys().cloned().collect(),
            data_sources: schema.data_sources.keys().cloned().collect(),
            capabilities: Default::default(),
        }
    }

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider. Error diagnostics leave it unconfigured.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Release resources before the process exits.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Validate a resource configuration.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Upgrade state written under an older schema version. Every schema is
    /// still at version 0, so state passes through.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (resource_type, version);
        Ok(state)
    }

    /// Plan a change. `prior_state` is `None` on create; a `Null`
    /// `proposed_state` is a destroy.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a resource.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Refresh a resource. `Null` means it no longer exists.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    /// Update a resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Bring existing objects under management.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::Unimplemented(format!(
            "import is not supported for {}",
            resource_type
        )))
    }

    /// Validate a data source configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    /// Read a data source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        _config: Value,
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

/// Decode a JSON payload. Empty bytes are `Null`.
fn decode_json(bytes: &[u8], field: &str) -> Result<Value, ProviderError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes)
        .map_err(|e| ProviderError::InvalidRequest(format!("{} is not valid JSON: {}", field, e)))
}

/// Encode a state payload. `Null` is empty bytes.
fn encode_json(value: &Value) -> Vec<u8> {
    if value.is_null() {
        return Vec::new();
    }
    serde_json::to_vec(value).unwrap_or_default()
}

type PlanInputs = (Option<Value>, Value, Value);

/// Prior (absent on create), proposed and config payloads of a plan request.
fn decode_plan_request(req: &generated::PlanRequest) -> Result<PlanInputs, ProviderError> {
    let prior = match decode_json(&req.prior_state, "prior_state")? {
        Value::Null => None,
        prior => Some(prior),
    };
    let proposed = decode_json(&req.proposed_state, "proposed_state")?;
    let config = decode_json(&req.config, "config")?;
    Ok((prior, proposed, config))
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<generated::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| generated::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Error => generated::diagnostic::Severity::Error as i32,
                DiagnosticSeverity::Warning => generated::diagnostic::Severity::Warning as i32,
            },
            summary: d.summary,
            detail: d.detail.unwrap_or_default(),
            attribute: d.attribute.unwrap_or_default(),
        })
        .collect()
}

fn error_to_diagnostics(err: ProviderError) -> Vec<generated::Diagnostic> {
    diagnostics_to_proto(vec![Diagnostic::error(err.to_string())])
}

/// State and diagnostics for a failed create or update. A write that landed
/// before the failure keeps its state so the runtime can track the object.
fn failed_write(err: ProviderError) -> (Vec<u8>, Vec<generated::Diagnostic>) {
    match err.take_applied_state() {
        (Some(state), cause) => {
            let diagnostic = Diagnostic::error(cause.to_string()).with_detail(
                "The change was written to ZIA and is recorded in state, but is not active yet.",
            );
            (encode_json(&state), diagnostics_to_proto(vec![diagnostic]))
        },
        (None, err) => (vec![], error_to_diagnostics(err)),
    }
}

fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

fn schema_to_proto(schema: &Schema) -> generated::Schema {
    generated::Schema {
        version: schema.version as i64,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &Block) -> generated::Block {
    generated::Block {
        attributes: block
            .attributes
            .iter()
            .map(|(name, attr)| generated::Attribute {
                name: name.clone(),
                r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
                required: attr.flags.required,
                optional: attr.flags.optional,
                computed: attr.flags.computed,
                sensitive: attr.flags.sensitive,
                description: attr.description.clone().unwrap_or_default(),
                force_new: attr.force_new,
                default_value: attr
                    .default
                    .as_ref()
                    .map(|v| serde_json::to_vec(v).unwrap_or_default())
                    .unwrap_or_default(),
                validators: if attr.validators.is_empty() {
                    Vec::new()
                } else {
                    serde_json::to_vec(&attr.validators).unwrap_or_default()
                },
            })
            .collect(),
        block_types: block
            .blocks
            .iter()
            .map(|(name, nested)| generated::NestedBlock {
                type_name: name.clone(),
                block: Some(block_to_proto(&nested.block)),
                nesting_mode: match nested.nesting_mode {
                    BlockNestingMode::Single => generated::nested_block::NestingMode::Single as i32,
                    BlockNestingMode::List => generated::nested_block::NestingMode::List as i32,
                    BlockNestingMode::Set => generated::nested_block::NestingMode::Set as i32,
                    BlockNestingMode::Map => generated::nested_block::NestingMode::Map as i32,
                },
                min_items: nested.min_items as i32,
                max_items: nested.max_items as i32,
            })
            .collect(),
        description: block.description.clone().unwrap_or_default(),
    }
}

/// Adapts a [`ProviderService`] to the generated gRPC trait.
struct ProviderGrpcService<P: ProviderService> {
    provider: Arc<P>,
}

impl<P: ProviderService> ProviderGrpcService<P> {
    fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }
}

#[tonic::async_trait]
impl<P: ProviderService> generated::provider_server::Provider for ProviderGrpcService<P> {
    #[instrument(skip(self, _request), name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: Request<generated::GetMetadataRequest>,
    ) -> Result<Response<generated::GetMetadataResponse>, Status> {
        let metadata = self.provider.metadata();
        debug!(
            resources = metadata.resources.len(),
            data_sources = metadata.data_sources.len(),
            "GetMetadata completed"
        );
        Ok(Response::new(generated::GetMetadataResponse {
            server_capabilities: Some(generated::ServerCapabilities {
                plan_destroy: metadata.capabilities.plan_destroy,
            }),
            resources: metadata.resources,
            data_sources: metadata.data_sources,
            diagnostics: vec![],
        }))
    }

    #[instrument(skip(self, _request), name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: Request<generated::GetSchemaRequest>,
    ) -> Result<Response<generated::GetSchemaResponse>, Status> {
        let schema = self.provider.schema();
        debug!(
            resources = schema.resources.len(),
            data_sources = schema.data_sources.len(),
            "GetSchema completed"
        );
        Ok(Response::new(generated::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources: schema
                .resources
                .iter()
                .map(|(k, v)| (k.clone(), schema_to_proto(v)))
                .collect(),
            data_sources: schema
                .data_sources
                .iter()
                .map(|(k, v)| (k.clone(), schema_to_proto(v)))
                .collect(),
            diagnostics: vec![],
        }))
    }

    #[instrument(skip(self, request), name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: Request<generated::ValidateProviderConfigRequest>,
    ) -> Result<Response<generated::ValidateProviderConfigResponse>, Status> {
        let req = request.into_inner();
        let result = match decode_json(&req.config, "config") {
            Ok(config) => self.provider.validate_provider_config(config).await,
            Err(e) => Err(e),
        };
        let diagnostics = match result {
            Ok(diagnostics) => {
                if has_errors(&diagnostics) {
                    warn!(diagnostics = diagnostics.len(), "ValidateProviderConfig completed with errors");
                }
                diagnostics_to_proto(diagnostics)
            },
            Err(e) => {
                error!(error = %e, "ValidateProviderConfig failed");
                error_to_diagnostics(e)
            },
        };
        Ok(Response::new(generated::ValidateProviderConfigResponse { diagnostics }))
    }

    #[instrument(skip(self, request), name = "grpc.configure")]
    async fn configure(
        &self,
        request: Request<generated::ConfigureRequest>,
    ) -> Result<Response<generated::ConfigureResponse>, Status> {
        let req = request.into_inner();
        let result = match decode_json(&req.config, "config") {
            Ok(config) => self.provider.configure(config).await,
            Err(e) => Err(e),
        };
        let diagnostics = match result {
            Ok(diagnostics) => {
                if has_errors(&diagnostics) {
                    warn!(diagnostics = diagnostics.len(), "Configure completed with errors");
                } else {
                    info!("Configure completed successfully");
                }
                diagnostics_to_proto(diagnostics)
            },
            Err(e) => {
                error!(error = %e, "Configure failed");
                error_to_diagnostics(e)
            },
        };
        Ok(Response::new(generated::ConfigureResponse { diagnostics }))
    }

    #[instrument(skip(self, _request), name = "grpc.stop")]
    async fn stop(
        &self,
        _request: Request<generated::StopRequest>,
    ) -> Result<Response<generated::StopResponse>, Status> {
        info!("Stop called");
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(e) => {
                error!(error = %e, "Stop failed");
                e.to_string()
            },
        };
        Ok(Response::new(generated::StopResponse { error }))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        request: Request<generated::ValidateResourceConfigRequest>,
    ) -> Result<Response<generated::ValidateResourceConfigResponse>, Status> {
        let req = request.into_inner();
        let result = match decode_json(&req.config, "config") {
            Ok(config) => {
                self.provider
                    .validate_resource_config(&req.resource_type, config)
                    .await
            },
            Err(e) => Err(e),
        };
        let diagnostics = match result {
            Ok(diagnostics) => {
                if has_errors(&diagnostics) {
                    warn!(diagnostics = diagnostics.len(), "ValidateResourceConfig completed with errors");
                }
                diagnostics_to_proto(diagnostics)
            },
            Err(e) => {
                error!(error = %e, "ValidateResourceConfig failed");
                error_to_diagnostics(e)
            },
        };
        Ok(Response::new(generated::ValidateResourceConfigResponse { diagnostics }))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.upgrade_resource_state")]
    async fn upgrade_resource_state(
        &self,
        request: Request<generated::UpgradeResourceStateRequest>,
    ) -> Result<Response<generated::UpgradeResourceStateResponse>, Status> {
        let req = request.into_inner();
        let result = match decode_json(&req.raw_state, "raw_state") {
            Ok(state) => {
                self.provider
                    .upgrade_resource_state(&req.resource_type, req.version, state)
                    .await
            },
            Err(e) => Err(e),
        };
        Ok(Response::new(match result {
            Ok(upgraded) => generated::UpgradeResourceStateResponse {
                upgraded_state: encode_json(&upgraded),
                diagnostics: vec![],
            },
            Err(e) => {
                error!(version = req.version, error = %e, "UpgradeResourceState failed");
                generated::UpgradeResourceStateResponse {
                    upgraded_state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }
            },
        }))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.plan")]
    async fn plan(
        &self,
        request: Request<generated::PlanRequest>,
    ) -> Result<Response<generated::PlanResponse>, Status> {
        let req = request.into_inner();
        let result = match decode_plan_request(&req) {
            Ok((prior, proposed, config)) => {
                debug!(is_create = prior.is_none(), "Plan called");
                self.provider
                    .plan(&req.resource_type, prior, proposed, config)
                    .await
            },
            Err(e) => Err(e),
        };

        Ok(Response::new(match result {
            Ok(plan) => {
                info!(
                    changes = plan.changes.len(),
                    requires_replace = plan.requires_replace,
                    "Plan completed"
                );
                generated::PlanResponse {
                    planned_state: encode_json(&plan.planned_state),
                    changes: plan.changes.into_iter().map(Into::into).collect(),
                    requires_replace: plan.requires_replace,
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(error = %e, "Plan failed");
                generated::PlanResponse {
                    planned_state: vec![],
                    changes: vec![],
                    requires_replace: false,
                    diagnostics: error_to_diagnostics(e),
                }
            },
        }))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.create")]
    async fn create(
        &self,
        request: Request<generated::CreateRequest>,
    ) -> Result<Response<generated::CreateResponse>, Status> {
        let req = request.into_inner();
        let result = match decode_json(&req.planned_state, "planned_state") {
            Ok(planned) => self.provider.create(&req.resource_type, planned).await,
            Err(e) => Err(e),
        };
        Ok(Response::new(match result {
            Ok(state) => {
                info!("Create completed successfully");
                generated::CreateResponse {
                    state: encode_json(&state),
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(error = %e, "Create failed");
                let (state, diagnostics) = failed_write(e);
                generated::CreateResponse { state, diagnostics }
            },
        }))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.read")]
    async fn read(
        &self,
        request: Request<generated::ReadRequest>,
    ) -> Result<Response<generated::ReadResponse>, Status> {
        let req = request.into_inner();
        let result = match decode_json(&req.current_state, "current_state") {
            Ok(current) => self.provider.read(&req.resource_type, current).await,
            Err(e) => Err(e),
        };
        Ok(Response::new(match result {
            Ok(state) => {
                debug!(removed = state.is_null(), "Read completed");
                generated::ReadResponse {
                    state: encode_json(&state),
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(error = %e, "Read failed");
                generated::ReadResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }
            },
        }))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.update")]
    async fn update(
        &self,
        request: Request<generated::UpdateRequest>,
    ) -> Result<Response<generated::UpdateResponse>, Status> {
        let req = request.into_inner();
        let decoded = decode_json(&req.prior_state, "prior_state").and_then(|prior| {
            decode_json(&req.planned_state, "planned_state").map(|planned| (prior, planned))
        });
        let result = match decoded {
            Ok((prior, planned)) => {
                self.provider
                    .update(&req.resource_type, prior, planned)
                    .await
            },
            Err(e) => Err(e),
        };
        Ok(Response::new(match result {
            Ok(state) => {
                info!("Update completed successfully");
                generated::UpdateResponse {
                    state: encode_json(&state),
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(error = %e, "Update failed");
                let (state, diagnostics) = failed_write(e);
                generated::UpdateResponse { state, diagnostics }
            },
        }))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.delete")]
    async fn delete(
        &self,
        request: Request<generated::DeleteRequest>,
    ) -> Result<Response<generated::DeleteResponse>, Status> {
        let req = request.into_inner();
        let result = match decode_json(&req.current_state, "current_state") {
            Ok(current) => self.provider.delete(&req.resource_type, current).await,
            Err(e) => Err(e),
        };
        let diagnostics = match result {
            Ok(()) => {
                info!("Delete completed successfully");
                vec![]
            },
            Err(e) => {
                error!(error = %e, "Delete failed");
                error_to_diagnostics(e)
            },
        };
        Ok(Response::new(generated::DeleteResponse { diagnostics }))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type, id = %request.get_ref().id), name = "grpc.import_resource_state")]
    async fn import_resource_state(
        &self,
        request: Request<generated::ImportResourceStateRequest>,
    ) -> Result<Response<generated::ImportResourceStateResponse>, Status> {
        let req = request.into_inner();
        Ok(Response::new(
            match self.provider.import_resource(&req.resource_type, &req.id).await {
                Ok(imported) => {
                    info!(imported = imported.len(), "ImportResourceState completed");
                    generated::ImportResourceStateResponse {
                        imported: imported
                            .into_iter()
                            .map(|r| generated::ImportedResource {
                                resource_type: r.resource_type,
                                state: encode_json(&r.state),
                            })
                            .collect(),
                        diagnostics: vec![],
                    }
                },
                Err(e) => {
                    error!(error = %e, "ImportResourceState failed");
                    generated::ImportResourceStateResponse {
                        imported: vec![],
                        diagnostics: error_to_diagnostics(e),
                    }
                },
            },
        ))
    }

    #[instrument(skip(self, request), fields(data_source_type = %request.get_ref().data_source_type), name = "grpc.validate_data_source_config")]
    async fn validate_data_source_config(
        &self,
        request: Request<generated::ValidateDataSourceConfigRequest>,
    ) -> Result<Response<generated::ValidateDataSourceConfigResponse>, Status> {
        let req = request.into_inner();
        let result = match decode_json(&req.config, "config") {
            Ok(config) => {
                self.provider
                    .validate_data_source_config(&req.data_source_type, config)
                    .await
            },
            Err(e) => Err(e),
        };
        let diagnostics = match result {
            Ok(diagnostics) => {
                if has_errors(&diagnostics) {
                    warn!(diagnostics = diagnostics.len(), "ValidateDataSourceConfig completed with errors");
                }
                diagnostics_to_proto(diagnostics)
            },
            Err(e) => {
                error!(error = %e, "ValidateDataSourceConfig failed");
                error_to_diagnostics(e)
            },
        };
        Ok(Response::new(generated::ValidateDataSourceConfigResponse { diagnostics }))
    }

    #[instrument(skip(self, request), fields(data_source_type = %request.get_ref().data_source_type), name = "grpc.read_data_source")]
    async fn read_data_source(
        &self,
        request: Request<generated::ReadDataSourceRequest>,
    ) -> Result<Response<generated::ReadDataSourceResponse>, Status> {
        let req = request.into_inner();
        let result = match decode_json(&req.config, "config") {
            Ok(config) => {
                self.provider
                    .read_data_source(&req.data_source_type, config)
                    .await
            },
            Err(e) => Err(e),
        };
        Ok(Response::new(match result {
            Ok(state) => {
                debug!("ReadDataSource completed");
                generated::ReadDataSourceResponse {
                    state: encode_json(&state),
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(error = %e, "ReadDataSource failed");
                generated::ReadDataSourceResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }
            },
        }))
    }
}

/// Server options.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long in-flight requests may run after a shutdown signal.
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,
    /// Address to listen on. Default: an ephemeral loopback port.
    pub bind_addr: SocketAddr,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        }
    }
}

impl ServeOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Listen on `addr` instead of an ephemeral port.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }
}

/// Resolves on SIGTERM or SIGINT (CTRL+C elsewhere).
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                    _ = sigint.recv() => info!("Received SIGINT, shutting down"),
                }
                return;
            },
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Could not install signal handlers, falling back to CTRL+C");
            },
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received CTRL+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Could not listen for CTRL+C, serving until killed");
            std::future::pending::<()>().await;
        },
    }
}

/// Serve `provider` over the plugin protocol with default options.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), Box<dyn std::error::Error>> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// Serve `provider` over the plugin protocol.
///
/// Prints the handshake line once the listener is bound, then serves until
/// a shutdown signal.
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(options.bind_addr).await?;
    let addr = listener.local_addr()?;

    println!("{}|{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION, addr);
    info!(address = %addr, "Provider server starting");

    let provider = Arc::new(provider);
    let service = generated::provider_server::ProviderServer::new(ProviderGrpcService::new(
        Arc::clone(&provider),
    ));

    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let server = Server::builder().add_service(service).serve_with_incoming_shutdown(
        tokio_stream::wrappers::TcpListenerStream::new(listener),
        async move {
            wait_for_shutdown_signal().await;
            let _ = signalled_tx.send(());
        },
    );
    tokio::pin!(server);

    // The timeout only bounds the drain that follows a signal.
    let outcome = tokio::select! {
        biased;
        result = &mut server => Some(result),
        _ = signalled_rx => None,
    };
    let outcome = match outcome {
        Some(result) => Some(result),
        None => match tokio::time::timeout(options.shutdown_timeout, &mut server).await {
            Ok(result) => Some(result),
            Err(_) => {
                warn!(timeout = ?options.shutdown_timeout, "Shutdown timeout exceeded, abandoning in-flight requests");
                None
            },
        },
    };
    if let Some(Err(e)) = outcome {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    if let Err(e) = provider.stop().await {
        warn!(error = %e, "Provider stop returned an error");
    }
    info!("Provider shutdown complete");
    Ok(())
}
