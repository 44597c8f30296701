use std::future::Future;

use crate::error::TransmitError;
use crate::query::{QueryDescriptor, ResultId};

/// Sends one query to the service and decodes the ids it returned.
///
/// Implementations own their client handles; the pool clones the transmitter
/// once per worker, so keep clones cheap (an `Arc` or a pooled client).
/// The descriptor is only borrowed for the duration of the call.
///
/// # Example
/// ```rust
/// use annbench::{QueryDescriptor, ResultId, TransmitError, Transmitter};
///
/// #[derive(Clone)]
/// struct AlwaysEmpty;
///
/// impl Transmitter for AlwaysEmpty {
///     async fn transmit(
///         &self,
///         _query: &QueryDescriptor,
///         _endpoint: &str,
///     ) -> Result<Vec<ResultId>, TransmitError> {
///         Ok(Vec::new())
///     }
/// }
/// ```
pub trait Transmitter
where
    Self: Send + Sync + Clone + 'static,
{
    fn transmit(
        &self,
        query: &QueryDescriptor,
        endpoint: &str,
    ) -> impl Future<Output = Result<Vec<ResultId>, TransmitError>> + Send;
}
