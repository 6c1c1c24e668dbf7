use thiserror::Error;

/// The full cross-component error taxonomy described in the core spec's
/// error-handling design. Component crates map their local errors into this
/// enum at the boundary rather than inventing parallel variants.
#[derive(Debug, Error)]
pub enum AgoriaError {
    // ── Validation ───────────────────────────────────────────────────────────
    #[error("invalid field: {0}")]
    InvalidField(String),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("invalid DID: {0}")]
    InvalidDid(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("credential expired at {expired_at}")]
    ExpiredCredential { expired_at: i64 },

    // ── Causal ───────────────────────────────────────────────────────────────
    #[error("ordering violation: update is reverse-causal with the latest known state")]
    OrderingViolation,

    #[error("concurrent update detected for {0}")]
    ConflictDetected(String),

    // ── Capacity ─────────────────────────────────────────────────────────────
    #[error("guild {0} is full")]
    GuildFull(String),

    #[error("queue is full")]
    QueueFull,

    #[error("queue is closed")]
    QueueClosed,

    #[error("channel already exists: {0}")]
    ChannelExists(String),

    // ── State ────────────────────────────────────────────────────────────────
    #[error("guild {0} is closed")]
    GuildClosed(String),

    #[error("{0} is not a member of guild {1}")]
    NotMember(String, String),

    #[error("channel {0} is not active")]
    ChannelNotActive(String),

    #[error("channel {0} has expired")]
    ChannelExpired(String),

    #[error("sequence number out of order: expected > {expected}, got {got}")]
    SequenceOutOfOrder { expected: u64, got: u64 },

    #[error("insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: u128, have: u128 },

    // ── Discovery ────────────────────────────────────────────────────────────
    #[error("no suitable agent found for capability: {0}")]
    NoSuitableAgent(String),

    #[error("peer unreachable: {0}")]
    PeerUnreachable(String),

    #[error("card not found for DID: {0}")]
    CardNotFound(String),

    // ── Execution ────────────────────────────────────────────────────────────
    #[error("execution timed out after {0:?}")]
    ExecutionTimeout(std::time::Duration),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("binary hash mismatch: expected {expected}, got {got}")]
    BinaryHashMismatch { expected: String, got: String },

    // ── Control ──────────────────────────────────────────────────────────────
    #[error("operation cancelled")]
    Cancelled,

    #[error("orchestrator stopped")]
    OrchestratorStopped,

    // ── Permission ───────────────────────────────────────────────────────────
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    // ── Infra ────────────────────────────────────────────────────────────────
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("network error: {0}")]
    Network(String),
}

impl AgoriaError {
    /// True for errors the orchestrator should treat as retriable
    /// (discovery/execution/infra failures), per the core spec's
    /// error-propagation policy.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            AgoriaError::NoSuitableAgent(_)
                | AgoriaError::PeerUnreachable(_)
                | AgoriaError::CardNotFound(_)
                | AgoriaError::ExecutionTimeout(_)
                | AgoriaError::ExecutionFailed(_)
                | AgoriaError::Storage(_)
                | AgoriaError::Network(_)
        )
    }
}
