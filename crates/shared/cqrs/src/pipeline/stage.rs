use tally_domain::constants::CORRELATION_HEADER;
use tally_domain::context::{CorrelationId, RequestId};
use tally_kernel::errors::ErrorResponse;

/// Named pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum_macros::Display)]
pub enum Stage {
    Correlate,
    Authenticate,
    Authorize,
    Begin,
    Execute,
    Commit,
    Rollback,
    Translate,
}

/// Result of one pipeline run, with the stages it went through.
#[derive(Debug)]
pub struct PipelineResponse<T> {
    pub status: u16,
    pub request_id: RequestId,
    pub correlation_id: CorrelationId,
    pub body: Result<T, ErrorResponse>,
    pub stages: Vec<Stage>,
}

impl<T> PipelineResponse<T> {
    /// Outbound headers; the correlation id is always echoed.
    #[must_use]
    pub fn headers(&self) -> Vec<(&'static str, &str)> {
        vec![(CORRELATION_HEADER, self.correlation_id.as_str())]
    }

    #[must_use]
    pub fn reached(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.body.is_ok()
    }

    pub fn into_result(self) -> Result<T, ErrorResponse> {
        self.body
    }
}
