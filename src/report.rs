use std::error::Error;

/// Fire-and-forget destination for pipeline failures.
///
/// Called from the pipeline tasks; implementations must not block.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, context: &str, error: &(dyn Error + 'static));
}

/// Reports through `tracing::error!`, including the error's source chain.
#[derive(Clone, Debug, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, context: &str, error: &(dyn Error + 'static)) {
        let mut chain = String::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push_str(": ");
            chain.push_str(&cause.to_string());
            source = cause.source();
        }
        tracing::error!(context, error = %error, causes = %chain, "flush logger failure");
    }
}
