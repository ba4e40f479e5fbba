//! Web functions

use cellcalc_core::CellError;
use tracing::debug;

use super::args::{arg, text};
use super::text::MAX_TEXT_LEN;
use super::{FunctionContext, FunctionRegistry};
use crate::value::FormulaValue;

/// Longest URL WEBSERVICE will request
pub const MAX_URL_LEN: usize = 2048;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add("WEBSERVICE", 1, Some(1), fn_webservice);
}

/// WEBSERVICE(url) - body of an HTTP GET through the configured client
pub fn fn_webservice(args: &[FormulaValue], ctx: &FunctionContext) -> FormulaValue {
    let url = match text(arg(args, 0)) {
        Ok(url) => url.trim().to_string(),
        Err(e) => return FormulaValue::Error(e),
    };

    if url.chars().count() > MAX_URL_LEN {
        return FormulaValue::Error(CellError::Value);
    }
    let lower = url.to_ascii_lowercase();
    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return FormulaValue::Error(CellError::Value);
    }

    let Some(client) = ctx.config().http_client.as_ref() else {
        debug!(%url, "WEBSERVICE called without an HTTP client");
        return FormulaValue::Error(CellError::Value);
    };

    match client.get(&url) {
        Ok(body) if body.chars().count() <= MAX_TEXT_LEN => FormulaValue::String(body),
        Ok(_) => FormulaValue::Error(CellError::Value),
        Err(err) => {
            debug!(%url, error = %err, "WEBSERVICE request failed");
            FormulaValue::Error(CellError::Value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, HttpClient, HttpError};
    use crate::evaluator::{evaluate, SimpleContext};
    use crate::program::Program;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    struct FakeClient;

    impl HttpClient for FakeClient {
        fn get(&self, url: &str) -> Result<String, HttpError> {
            match url {
                "https://example.com/ok" => Ok("hello".to_string()),
                "https://example.com/big" => Ok("x".repeat(MAX_TEXT_LEN + 1)),
                "https://example.com/missing" => Err(HttpError::Status(404)),
                _ => Err(HttpError::Transport("connection refused".to_string())),
            }
        }
    }

    fn eval_with(formula: &str, config: EngineConfig) -> FormulaValue {
        let program = Program::compile(formula).unwrap();
        evaluate(&program, &mut SimpleContext::with_config(config))
    }

    fn eval(formula: &str) -> FormulaValue {
        eval_with(formula, EngineConfig::new().with_http_client(Arc::new(FakeClient)))
    }

    #[test]
    fn test_webservice_success() {
        assert_eq!(eval("=WEBSERVICE(\"https://example.com/ok\")"), FormulaValue::from("hello"));
        assert_eq!(eval("=WEBSERVICE(\" https://example.com/ok \")"), FormulaValue::from("hello"));
    }

    #[test]
    fn test_webservice_failures() {
        let value = FormulaValue::Error(CellError::Value);
        assert_eq!(eval("=WEBSERVICE(\"ftp://example.com/ok\")"), value);
        assert_eq!(eval("=WEBSERVICE(\"https://example.com/big\")"), value);
        assert_eq!(eval("=WEBSERVICE(\"https://example.com/missing\")"), value);
        assert_eq!(eval("=WEBSERVICE(\"https://example.com/down\")"), value);
        assert_eq!(eval("=WEBSERVICE(#N/A)"), FormulaValue::Error(CellError::Na));
        assert_eq!(
            eval_with("=WEBSERVICE(\"https://example.com/ok\")", EngineConfig::new()),
            value
        );
    }

    #[test]
    fn test_webservice_url_length() {
        let long = format!("https://example.com/{}", "a".repeat(MAX_URL_LEN));
        let config = EngineConfig::new().with_http_client(Arc::new(FakeClient));
        let ctx = FunctionContext::new(&config);
        assert_eq!(
            fn_webservice(&[FormulaValue::String(long)], &ctx),
            FormulaValue::Error(CellError::Value)
        );
    }
}
