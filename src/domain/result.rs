//! Result type alias for the orchestration engine

use super::errors::OrchError;

/// Result type alias for orchestration operations
///
/// # Examples
///
/// ```
/// use hrsn_orch::domain::result::Result;
/// use hrsn_orch::domain::errors::OrchError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(OrchError::Session("cannot create egress".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, OrchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }

    #[test]
    fn test_result_err() {
        let result: Result<i32> = Err(OrchError::Other("test error".to_string()));
        assert!(result.is_err());
    }
}
