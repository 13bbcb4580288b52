//! The `Evaluator` trait, the server's only extension point.
//!
//! turnwire does not interpret commands. The dispatch loop hands each
//! command payload to an [`Evaluator`] and sends back whatever text it
//! returns, as a result on `Ok` and as an error on `Err`.
//!
//! What a command means is up to the integrator. A typical evaluator over
//! a table of global bindings tells apart:
//!
//! - a bare name (`x`) → the current value of that binding, or, when the
//!   name is an action, run it as below with no arguments
//! - a name followed by arguments (`reset, x, y`) → run an action, empty result
//! - an assignment (`x = 1 + 2`) → bind the value, empty result
//! - anything else → evaluate it as an expression and print the value

use std::future::Future;

/// Executes a command string and reduces the outcome to text.
///
/// Connections are served concurrently and share one evaluator, so any
/// state behind `&self` needs its own synchronization.
///
/// # Example
///
/// ```rust
/// use turnwire::Evaluator;
///
/// /// Echoes every command back, refusing empty ones.
/// struct Echo;
///
/// impl Evaluator for Echo {
///     async fn evaluate(&self, command: &str) -> Result<String, String> {
///         if command.is_empty() {
///             return Err("empty command".into());
///         }
///         Ok(command.to_string())
///     }
/// }
/// ```
pub trait Evaluator: Send + Sync + 'static {
    /// Evaluates `command`.
    ///
    /// # Returns
    /// - `Ok(text)`: sent back as a result message
    /// - `Err(text)`: sent back as an error message; the connection stays open
    fn evaluate(
        &self,
        command: &str,
    ) -> impl Future<Output = Result<String, String>> + Send;
}
