use paychan::{ChannelAdmission, GateConfig};

/// Shared application state
pub struct AppState<L> {
    pub admission: ChannelAdmission<L>,
    /// Gate protecting the demo `/pay` route.
    pub gate: GateConfig,
    /// Bearer token for `/channels/*` (None = administration disabled)
    pub admin_token: Option<String>,
    /// Bearer token for `/metrics` (None = forbidden)
    pub metrics_token: Option<String>,
}

impl<L> AppState<L> {
    pub fn new(admission: ChannelAdmission<L>, gate: GateConfig) -> Self {
        Self {
            admission,
            gate,
            admin_token: None,
            metrics_token: None,
        }
    }

    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_metrics_token(mut self, token: Option<String>) -> Self {
        self.metrics_token = token.filter(|t| !t.is_empty());
        self
    }
}
