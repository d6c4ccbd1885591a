//! Event value types
//!
//! Every event shares one envelope (id, type, timestamp, source, data,
//! metadata) and carries exactly one category payload. Payload fields are
//! merged into `data` at construction so consumers that only look at the
//! envelope still see them.
//!
//! Events are validated once, in [`EventBuilder::build`], and are immutable
//! afterwards. `data()` and `metadata()` hand out copies.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Well-known event type strings
pub mod types {
    /// A hostname was added to (or changed in) the record store
    pub const DNS_RECORD_ADDED: &str = "dns.record.added";
    /// A hostname was removed from the record store
    pub const DNS_RECORD_REMOVED: &str = "dns.record.removed";
    /// A detector tick changed the hosts snapshot
    pub const FILE_HOSTS_CHANGED: &str = "file.hosts.changed";
    /// The service finished starting
    pub const SYSTEM_STARTED: &str = "system.started";
    /// The service is shutting down
    pub const SYSTEM_STOPPED: &str = "system.stopped";
}

/// Category tag of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Dns,
    Container,
    Node,
    File,
    System,
    Error,
    Health,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Dns => "dns",
            EventKind::Container => "container",
            EventKind::Node => "node",
            EventKind::File => "file",
            EventKind::System => "system",
            EventKind::Error => "error",
            EventKind::Health => "health",
        };
        f.write_str(name)
    }
}

/// Severity of an error event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            other => Err(Error::invalid_event(format!(
                "Severity must be one of debug, info, warning, error, critical; got '{}'",
                other
            ))),
        }
    }
}

/// Overall status reported by a health event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "healthy" => Ok(HealthStatus::Healthy),
            "degraded" => Ok(HealthStatus::Degraded),
            "unhealthy" => Ok(HealthStatus::Unhealthy),
            other => Err(Error::invalid_event(format!(
                "Health status must be one of healthy, degraded, unhealthy; got '{}'",
                other
            ))),
        }
    }
}

/// DNS record change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsPayload {
    pub record_name: String,
    pub record_type: String,
    pub record_value: Option<String>,
    pub ttl: u32,
}

impl DnsPayload {
    /// A-record payload for `record_name`
    pub fn a_record(record_name: impl Into<String>, record_value: Option<String>) -> Self {
        Self {
            record_name: record_name.into(),
            record_type: "A".to_string(),
            record_value,
            ttl: 300,
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(&self.record_name, "DNS record name")?;
        require_non_empty(&self.record_type, "DNS record type")
    }
}

/// Container lifecycle change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerPayload {
    pub container_id: String,
    pub container_name: String,
    pub image: String,
    pub labels: HashMap<String, String>,
    pub networks: Map<String, Value>,
    pub ports: Map<String, Value>,
    pub status: Option<String>,
}

impl ContainerPayload {
    pub fn new(
        container_id: impl Into<String>,
        container_name: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            container_id: container_id.into(),
            container_name: container_name.into(),
            image: image.into(),
            labels: HashMap::new(),
            networks: Map::new(),
            ports: Map::new(),
            status: None,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(&self.container_id, "Container ID")?;
        require_non_empty(&self.container_name, "Container name")?;
        require_non_empty(&self.image, "Container image")
    }
}

/// Cluster membership change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePayload {
    pub node_id: String,
    pub node_address: String,
    pub node_port: u16,
    pub node_state: String,
    pub cluster_size: Option<usize>,
    pub node_metadata: Map<String, Value>,
}

impl NodePayload {
    pub fn new(
        node_id: impl Into<String>,
        node_address: impl Into<String>,
        node_port: u16,
        node_state: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            node_address: node_address.into(),
            node_port,
            node_state: node_state.into(),
            cluster_size: None,
            node_metadata: Map::new(),
        }
    }

    pub fn with_cluster_size(mut self, size: usize) -> Self {
        self.cluster_size = Some(size);
        self
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(&self.node_id, "Node ID")?;
        require_non_empty(&self.node_address, "Node address")?;
        if self.node_port == 0 {
            return Err(Error::invalid_event("Node port must be a positive integer"));
        }
        require_non_empty(&self.node_state, "Node state")
    }
}

/// One hostname mapping carried by a file event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub hostname: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// Hosts file change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePayload {
    pub file_path: String,
    pub operation: String,
    pub records: Vec<FileRecord>,
    pub file_size: Option<u64>,
    pub file_mtime: Option<DateTime<Utc>>,
}

impl FilePayload {
    pub fn new(file_path: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            operation: operation.into(),
            records: Vec::new(),
            file_size: None,
            file_mtime: None,
        }
    }

    pub fn with_records(mut self, records: Vec<FileRecord>) -> Self {
        self.records = records;
        self
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(&self.file_path, "File path")?;
        require_non_empty(&self.operation, "File operation")
    }
}

/// Application lifecycle change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPayload {
    pub component: String,
    pub operation: String,
    pub status: String,
    pub error_message: Option<String>,
    pub configuration: Map<String, Value>,
}

impl SystemPayload {
    pub fn new(
        component: impl Into<String>,
        operation: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            component: component.into(),
            operation: operation.into(),
            status: status.into(),
            error_message: None,
            configuration: Map::new(),
        }
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_configuration(mut self, configuration: Map<String, Value>) -> Self {
        self.configuration = configuration;
        self
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(&self.component, "Component name")?;
        require_non_empty(&self.operation, "Operation")?;
        require_non_empty(&self.status, "Status")
    }
}

/// Error condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error_type: String,
    pub error_message: String,
    pub error_code: Option<String>,
    pub stack_trace: Option<String>,
    pub context: Map<String, Value>,
    pub severity: Severity,
}

impl ErrorPayload {
    pub fn new(error_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            error_message: error_message.into(),
            error_code: None,
            stack_trace: None,
            context: Map::new(),
            severity: Severity::Error,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(&self.error_type, "Error type")?;
        require_non_empty(&self.error_message, "Error message")
    }
}

/// Health check outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthPayload {
    pub component: String,
    pub health_status: HealthStatus,
    pub check_name: String,
    pub check_result: bool,
    pub check_message: Option<String>,
    pub check_duration: Option<f64>,
    pub metrics: Map<String, Value>,
}

impl HealthPayload {
    pub fn new(
        component: impl Into<String>,
        health_status: HealthStatus,
        check_name: impl Into<String>,
        check_result: bool,
    ) -> Self {
        Self {
            component: component.into(),
            health_status,
            check_name: check_name.into(),
            check_result,
            check_message: None,
            check_duration: None,
            metrics: Map::new(),
        }
    }

    pub fn with_check_duration(mut self, seconds: f64) -> Self {
        self.check_duration = Some(seconds);
        self
    }

    pub fn with_check_message(mut self, message: impl Into<String>) -> Self {
        self.check_message = Some(message.into());
        self
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(&self.component, "Component name")?;
        require_non_empty(&self.check_name, "Check name")?;
        match self.check_duration {
            Some(d) if d.is_nan() || d < 0.0 => {
                Err(Error::invalid_event("Check duration must be non-negative"))
            }
            _ => Ok(()),
        }
    }
}

/// Category-specific payload of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Dns(DnsPayload),
    Container(ContainerPayload),
    Node(NodePayload),
    File(FilePayload),
    System(SystemPayload),
    Error(ErrorPayload),
    Health(HealthPayload),
}

impl EventPayload {
    /// Category tag of this payload
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Dns(_) => EventKind::Dns,
            EventPayload::Container(_) => EventKind::Container,
            EventPayload::Node(_) => EventKind::Node,
            EventPayload::File(_) => EventKind::File,
            EventPayload::System(_) => EventKind::System,
            EventPayload::Error(_) => EventKind::Error,
            EventPayload::Health(_) => EventKind::Health,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            EventPayload::Dns(p) => p.validate(),
            EventPayload::Container(p) => p.validate(),
            EventPayload::Node(p) => p.validate(),
            EventPayload::File(p) => p.validate(),
            EventPayload::System(p) => p.validate(),
            EventPayload::Error(p) => p.validate(),
            EventPayload::Health(p) => p.validate(),
        }
    }

    /// Payload fields as a flat JSON object, without the category tag
    fn fields(&self) -> Result<Map<String, Value>> {
        let value = match self {
            EventPayload::Dns(p) => serde_json::to_value(p)?,
            EventPayload::Container(p) => serde_json::to_value(p)?,
            EventPayload::Node(p) => serde_json::to_value(p)?,
            EventPayload::File(p) => serde_json::to_value(p)?,
            EventPayload::System(p) => serde_json::to_value(p)?,
            EventPayload::Error(p) => serde_json::to_value(p)?,
            EventPayload::Health(p) => serde_json::to_value(p)?,
        };
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(Error::invalid_event("Event payload must serialize to an object")),
        }
    }
}

impl From<DnsPayload> for EventPayload {
    fn from(p: DnsPayload) -> Self {
        EventPayload::Dns(p)
    }
}

impl From<ContainerPayload> for EventPayload {
    fn from(p: ContainerPayload) -> Self {
        EventPayload::Container(p)
    }
}

impl From<NodePayload> for EventPayload {
    fn from(p: NodePayload) -> Self {
        EventPayload::Node(p)
    }
}

impl From<FilePayload> for EventPayload {
    fn from(p: FilePayload) -> Self {
        EventPayload::File(p)
    }
}

impl From<SystemPayload> for EventPayload {
    fn from(p: SystemPayload) -> Self {
        EventPayload::System(p)
    }
}

impl From<ErrorPayload> for EventPayload {
    fn from(p: ErrorPayload) -> Self {
        EventPayload::Error(p)
    }
}

impl From<HealthPayload> for EventPayload {
    fn from(p: HealthPayload) -> Self {
        EventPayload::Health(p)
    }
}

/// An immutable, validated event
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    id: String,
    event_type: String,
    timestamp: DateTime<Utc>,
    source: String,
    data: Map<String, Value>,
    metadata: Map<String, Value>,
    payload: EventPayload,
}

impl Event {
    /// Start building an event of `event_type` produced by `source`
    pub fn builder(event_type: impl Into<String>, source: impl Into<String>) -> EventBuilder {
        EventBuilder {
            event_type: event_type.into(),
            source: source.into(),
            id: None,
            timestamp: None,
            data: Map::new(),
            metadata: Map::new(),
        }
    }

    /// Build an event with no extra data or metadata
    pub fn new(
        event_type: impl Into<String>,
        source: impl Into<String>,
        payload: impl Into<EventPayload>,
    ) -> Result<Self> {
        Self::builder(event_type, source).build(payload)
    }

    /// Globally unique identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Dotted event type, e.g. `dns.record.added`
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Creation instant
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Producer identifier
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Copy of the event data
    pub fn data(&self) -> Map<String, Value> {
        self.data.clone()
    }

    /// Copy of the event metadata
    pub fn metadata(&self) -> Map<String, Value> {
        self.metadata.clone()
    }

    /// Copy of a single data value
    pub fn get_data(&self, key: &str) -> Option<Value> {
        self.data.get(key).cloned()
    }

    /// Copy of a single metadata value
    pub fn get_metadata(&self, key: &str) -> Option<Value> {
        self.metadata.get(key).cloned()
    }

    /// Category of this event
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Typed category payload
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Serialize the event as a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Builder for [`Event`]
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event_type: String,
    source: String,
    id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    data: Map<String, Value>,
    metadata: Map<String, Value>,
}

impl EventBuilder {
    /// Use a caller-supplied id instead of a fresh UUID
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Use a caller-supplied timestamp instead of now
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Add a data entry; payload fields with the same key take precedence
    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Add a metadata entry
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Validate and freeze the event
    pub fn build(self, payload: impl Into<EventPayload>) -> Result<Event> {
        let payload = payload.into();

        require_non_empty(&self.event_type, "Event type")?;
        require_non_empty(&self.source, "Event source")?;
        if let Some(id) = &self.id {
            require_non_empty(id, "Event ID")?;
        }
        payload.validate()?;

        let mut data = self.data;
        data.extend(payload.fields()?);

        Ok(Event {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            event_type: self.event_type,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            source: self.source,
            data,
            metadata: self.metadata,
            payload,
        })
    }
}

fn require_non_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid_event(format!("{} cannot be empty", field)));
    }
    Ok(())
}
