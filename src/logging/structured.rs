use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Context information for log messages
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Component name (e.g., "token", "prices", "scheduler")
    pub component: String,
    /// Refresh cycle the message belongs to
    pub cycle_id: Option<Uuid>,
    /// Additional context fields, kept in insertion order
    pub extra_fields: Vec<(String, String)>,
}

impl LogContext {
    /// Create a new log context
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            cycle_id: None,
            extra_fields: Vec::new(),
        }
    }

    /// Attach a refresh cycle id
    #[must_use]
    pub fn with_cycle_id(mut self, cycle_id: Uuid) -> Self {
        self.cycle_id = Some(cycle_id);
        self
    }

    /// Add extra field
    #[must_use]
    pub fn with_field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.extra_fields.push((key.to_string(), value.into()));
        self
    }
}

/// Structured logger with context
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    pub(crate) context: LogContext,
}

impl StructuredLogger {
    /// Create a new structured logger with context
    pub const fn new(context: LogContext) -> Self {
        Self { context }
    }

    /// Derive a logger for one refresh cycle
    #[must_use]
    pub fn for_cycle(&self, cycle_id: Uuid) -> Self {
        Self::new(self.context.clone().with_cycle_id(cycle_id))
    }

    /// Derive a logger with one more context field
    #[must_use]
    pub fn with_field(&self, key: &str, value: impl Into<String>) -> Self {
        Self::new(self.context.clone().with_field(key, value))
    }

    pub fn component(&self) -> &str {
        &self.context.component
    }

    /// Log an info message with context
    pub fn info(&self, message: &str) {
        let fields = self.format_fields();
        info!(%fields, "{}", message);
    }
    /// Log a warning message with context
    pub fn warn(&self, message: &str) {
        let fields = self.format_fields();
        warn!(%fields, "{}", message);
    }
    /// Log an error message with context
    pub fn error(&self, message: &str) {
        let fields = self.format_fields();
        error!(%fields, "{}", message);
    }
    /// Log a debug message with context
    pub fn debug(&self, message: &str) {
        let fields = self.format_fields();
        debug!(%fields, "{}", message);
    }

    /// Format context fields for logging
    fn format_fields(&self) -> String {
        let mut fields = vec![format!("component={}", self.context.component)];
        if let Some(cycle_id) = self.context.cycle_id {
            fields.push(format!("cycle_id={cycle_id}"));
        }
        for (key, value) in &self.context.extra_fields {
            fields.push(format!("{key}={value}"));
        }
        fields.join(",")
    }
}

/// Create a logger for a specific component
pub fn get_logger(component: &str) -> StructuredLogger {
    StructuredLogger::new(LogContext::new(component))
}

/// Create a logger with full context
pub const fn get_logger_with_context(context: LogContext) -> StructuredLogger {
    StructuredLogger::new(context)
}
