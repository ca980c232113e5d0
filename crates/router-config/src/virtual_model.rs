use indexmap::IndexMap;
use serde::Deserialize;

/// A named logical endpoint that resolves to one or more concrete targets.
///
/// Defined in configuration; immutable during a request's lifetime. A new
/// `ConfigSnapshot` may swap the whole set atomically between requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VirtualModel {
    /// Unique id, referenced by callers as `virtual_model_id`
    pub id: String,
    /// Human-readable display name
    #[serde(default)]
    pub display_name: Option<String>,
    /// Capability tags advertised by this virtual model
    #[serde(default)]
    pub capabilities: VirtualModelCapabilities,
    /// Ordered set of targets eligible to serve this virtual model
    pub targets: Vec<Target>,
    /// Load-balancing policy used to pick among active targets
    #[serde(default)]
    pub policy: LoadBalancingPolicy,
}

/// Capability tags a virtual model may advertise
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VirtualModelCapabilities {
    #[serde(default = "default_true")]
    pub chat: bool,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub vision: bool,
    #[serde(default)]
    pub tools: bool,
}

const fn default_true() -> bool {
    true
}

/// A (provider-id, model-id) pair with policy attributes
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Target {
    /// Unique id within the virtual model's target list; used for the
    /// deterministic ascending tiebreak load-balancing policies require
    pub id: String,
    /// Which provider serves this target
    pub provider_id: String,
    /// Concrete upstream model identifier
    pub model_id: String,
    /// Positive integer weight, used by the `weighted` policy
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Lower value is preferred by the `priority` policy
    #[serde(default)]
    pub priority: u32,
    /// Administrative status
    #[serde(default)]
    pub status: TargetStatus,
}

const fn default_weight() -> u32 {
    1
}

/// Administrative status of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    #[default]
    Active,
    Disabled,
    Blacklisted,
}

/// Load-balancing policy for selecting among a virtual model's active targets
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalancingPolicy {
    #[default]
    RoundRobin,
    Weighted,
    Priority,
    LeastConnections,
    HealthBased,
    Random,
}

/// Upstream service descriptor
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Provider {
    /// Unique provider id, referenced by `Target::provider_id`
    pub id: String,
    /// Protocol family this provider speaks
    pub protocol: ProtocolFamily,
    /// Base URL for outbound calls
    pub base_url: url::Url,
    /// Authentication descriptor
    #[serde(default)]
    pub auth: crate::auth::AuthDescriptor,
    /// Whether this provider supports streaming responses
    #[serde(default)]
    pub streaming: bool,
    /// Maximum tokens this provider accepts in a single request
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Request timeout in seconds for non-streaming calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Upper-bound wall-clock deadline for a streaming call, in seconds
    #[serde(default = "default_stream_deadline_secs")]
    pub stream_deadline_secs: u64,
    /// Declared health-check path, relative to `base_url`
    #[serde(default)]
    pub health_check_path: Option<String>,
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_stream_deadline_secs() -> u64 {
    300
}

/// Protocol family a provider speaks on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolFamily {
    Openai,
    Anthropic,
    Qwen,
    Google,
}

/// Named set of virtual models and providers, as consumed by the Scheduler
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmTopology {
    /// Virtual models keyed by id
    #[serde(default)]
    pub virtual_models: IndexMap<String, VirtualModel>,
    /// Providers keyed by id
    #[serde(default)]
    pub providers: IndexMap<String, Provider>,
}
