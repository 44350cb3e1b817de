use serde::Serialize;

/// Progress of a long-running operation as observed by callers
///
/// `Loading` may be emitted any number of times; `Success` and `Failure` are
/// terminal and always the last item of a progress stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Process<T> {
    #[serde(rename_all = "camelCase")]
    Loading { committed: usize },
    Success { value: T },
    Failure { message: String },
}

impl<T> Process<T> {
    pub fn loading() -> Self {
        Process::Loading { committed: 0 }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Process::Failure {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Process::Loading { .. })
    }
}

impl Process<()> {
    pub fn success() -> Self {
        Process::Success { value: () }
    }
}
