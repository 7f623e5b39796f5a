//! Per-request context handed to middleware and endpoint handlers.
//!
//! A [`Context`] pairs the parsed [`Request`] with the arguments the router captured
//! while matching it: the literal texts of every path segment that was resolved through
//! a wildcard, left to right. Handlers read them positionally.

use std::any::type_name;
use std::str::FromStr;

use thiserror::Error;

use crate::Request;

/// Errors raised when reading a captured path argument.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgError {
    #[error("no path argument at position {index}")]
    Missing { index: usize },

    #[error("path argument {index} (`{text}`) is not a valid {expected}")]
    Invalid {
        index: usize,
        text: String,
        expected: &'static str,
    },
}

/// Per-request state: the request and its captured path arguments.
#[derive(Debug)]
pub struct Context {
    request: Request,
    args: Vec<String>,
}

impl Context {
    /// Creates a context with no captured arguments.
    pub fn new(request: Request) -> Self {
        Self::with_args(request, Vec::new())
    }

    /// Creates a context carrying the arguments captured by the router.
    pub fn with_args(request: Request, args: Vec<String>) -> Self {
        Self { request, args }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// All captured arguments, in path order.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The captured argument at `index`, as text.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Parses the captured argument at `index`.
    ///
    /// # Errors
    ///
    /// [`ArgError::Missing`] if fewer arguments were captured, [`ArgError::Invalid`] if
    /// the text does not parse as `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// use waypath::{Context, Method, Request};
    ///
    /// let ctx = Context::with_args(Request::new(Method::Get, "/users/42"), vec!["42".into()]);
    /// assert_eq!(ctx.parse_arg::<u32>(0), Ok(42));
    /// assert!(ctx.parse_arg::<u32>(1).is_err());
    /// ```
    pub fn parse_arg<T: FromStr>(&self, index: usize) -> Result<T, ArgError> {
        let text = self.arg(index).ok_or(ArgError::Missing { index })?;
        text.parse().map_err(|_| ArgError::Invalid {
            index,
            text: text.to_owned(),
            expected: type_name::<T>(),
        })
    }

    /// Parses the captured argument at `index` as a boolean, accepting `true` and
    /// `false` in any letter case, the same texts that classify as `{bool}`.
    ///
    /// # Errors
    ///
    /// [`ArgError::Missing`] if fewer arguments were captured, [`ArgError::Invalid`]
    /// for any other text.
    ///
    /// # Examples
    ///
    /// ```
    /// use waypath::{Context, Method, Request};
    ///
    /// let ctx = Context::with_args(Request::new(Method::Get, "/flags/TRUE"), vec!["TRUE".into()]);
    /// assert_eq!(ctx.parse_bool_arg(0), Ok(true));
    /// ```
    pub fn parse_bool_arg(&self, index: usize) -> Result<bool, ArgError> {
        let text = self.arg(index).ok_or(ArgError::Missing { index })?;
        if text.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if text.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(ArgError::Invalid {
                index,
                text: text.to_owned(),
                expected: "bool",
            })
        }
    }

    /// Gives the request back, dropping the captured arguments.
    pub fn into_request(self) -> Request {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;

    fn ctx(args: &[&str]) -> Context {
        Context::with_args(
            Request::new(Method::Get, "/"),
            args.iter().map(|a| a.to_string()).collect(),
        )
    }

    #[test]
    fn args_are_positional() {
        let ctx = ctx(&["7", "hello"]);
        assert_eq!(ctx.arg(0), Some("7"));
        assert_eq!(ctx.arg(1), Some("hello"));
        assert_eq!(ctx.arg(2), None);
        assert_eq!(ctx.args().len(), 2);
    }

    #[test]
    fn parse_arg_converts_typed_segments() {
        let ctx = ctx(&["7", "2.5", "TRUE"]);
        assert_eq!(ctx.parse_arg::<i64>(0), Ok(7));
        assert_eq!(ctx.parse_arg::<f64>(1), Ok(2.5));
        assert_eq!(ctx.parse_arg::<String>(2), Ok("TRUE".to_owned()));
    }

    #[test]
    fn parse_arg_reports_failures() {
        let ctx = ctx(&["abc"]);
        assert_eq!(ctx.parse_arg::<u8>(3), Err(ArgError::Missing { index: 3 }));
        assert!(matches!(
            ctx.parse_arg::<u8>(0),
            Err(ArgError::Invalid { index: 0, ref text, .. }) if text == "abc"
        ));
    }

    #[test]
    fn bool_args_ignore_case() {
        let ctx = ctx(&["TRUE", "False", "tRuE", "yes"]);
        assert_eq!(ctx.parse_bool_arg(0), Ok(true));
        assert_eq!(ctx.parse_bool_arg(1), Ok(false));
        assert_eq!(ctx.parse_bool_arg(2), Ok(true));
        assert_eq!(
            ctx.parse_bool_arg(3),
            Err(ArgError::Invalid {
                index: 3,
                text: "yes".to_owned(),
                expected: "bool",
            })
        );
        assert_eq!(ctx.parse_bool_arg(4), Err(ArgError::Missing { index: 4 }));
        // The strict std parser still rejects mixed case.
        assert!(ctx.parse_arg::<bool>(0).is_err());
    }

    #[test]
    fn fresh_context_has_no_args() {
        let ctx = Context::new(Request::new(Method::Get, "/"));
        assert!(ctx.args().is_empty());
        assert_eq!(ctx.into_request().path(), "/");
    }
}
