/// Session bookkeeping hook run before every request of a turn.
pub trait ContextInitializer {
    fn init_context(&self, session_id: &str, request_id: &str);
}

/// Does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopContext;

impl ContextInitializer for NoopContext {
    fn init_context(&self, _session_id: &str, _request_id: &str) {}
}

impl<F> ContextInitializer for F
where
    F: Fn(&str, &str),
{
    fn init_context(&self, session_id: &str, request_id: &str) {
        self(session_id, request_id);
    }
}
